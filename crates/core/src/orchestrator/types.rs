//! Types for the search orchestrator.

use serde::{Deserialize, Serialize};

use crate::dispatch::DispatchOutcome;
use crate::matcher::MatchDecision;
use crate::searcher::SearchTier;

/// Result of searching one wanted item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    /// Tier the reported decision came from. `None` when no tier produced
    /// a surviving candidate.
    pub tier: Option<SearchTier>,
    /// The dispatched decision, or else the nearest miss.
    pub decision: MatchDecision,
    pub outcome: DispatchOutcome,
}

impl SearchReport {
    pub fn is_snatched(&self) -> bool {
        self.outcome.is_snatched()
    }
}
