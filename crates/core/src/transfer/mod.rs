mod error;
mod scp_executor;
mod traits;

pub use error::TransferError;
pub use scp_executor::{dataset_size, ScpExecutor};
pub use traits::TransferExecutor;
