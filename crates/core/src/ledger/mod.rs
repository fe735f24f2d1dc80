mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::{NewRequest, SqliteLedger};
pub use store::{Ledger, LedgerError};
pub use types::{
    DeliveryType, FileEntry, QuotaConstants, Request, RequestStatus,
    DEFAULT_PROJECT_QUOTA_BYTES,
};
