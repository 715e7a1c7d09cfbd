//! Persisted download history and catalog status.
//!
//! The ledger is the only shared mutable state the matcher touches. It
//! answers the blacklist questions asked while filtering and records each
//! dispatch as a Matched row that later moves to Snatched or Failed.

mod sqlite_store;
mod store;

pub use sqlite_store::SqliteLedger;
pub use store::{
    CatalogStatus, DownloadLedger, DownloadRecord, DownloadStatus, ItemStatus, LedgerError,
};
