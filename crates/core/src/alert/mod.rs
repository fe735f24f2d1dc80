mod events;
mod handle;
mod writer;

pub use events::AlertEvent;
pub use handle::{AlertEnvelope, AlertHandle};
pub use writer::{create_alert_system, AlertWriter};
