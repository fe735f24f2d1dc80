mod ssh_prober;
mod traits;

pub use ssh_prober::{parse_df_available, parse_du_total, SshProber};
pub use traits::{CapacityProber, ProbeError};
