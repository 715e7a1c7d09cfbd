//! Candidate selection: reject, score, pick, gate.
//!
//! Everything here is synchronous. The only I/O is the ledger lookup the
//! rejection filter does for blacklisted results.

mod filter;
mod gate;
mod ranker;
mod types;

pub use filter::RejectionFilter;
pub use gate::decide;
pub use ranker::CandidateRanker;
pub use types::{MatchDecision, RankOutcome, RejectReason, ScoredCandidate};
