//! Search orchestration across query tiers.
//!
//! For each wanted item the orchestrator walks the query tiers in order:
//! - **Search**: every provider is queried for the tier
//! - **Rank**: results are ranked per source family and gated
//! - **Dispatch**: the best accepted match is handed to the dispatcher
//!
//! The first tier that snatches (or finds the item already snatched) ends
//! the search.

mod runner;
mod types;

pub use runner::{tiers_for, SearchOrchestrator};
pub use types::SearchReport;
