//! Types produced by the matcher.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::searcher::CandidateResult;

/// Why a candidate was dropped before scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    NoUrl,
    BlacklistedFailed,
    BlacklistedProcessed,
    WrongMediaType,
    InvalidUrl,
    BannedWord(String),
    /// Size in MB.
    TooLarge(f64),
    /// Size in MB.
    TooSmall(f64),
    /// Reported seeders.
    TooFewSeeders(u32),
}

impl RejectReason {
    /// Stable label for metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            RejectReason::NoUrl => "no_url",
            RejectReason::BlacklistedFailed => "blacklisted_failed",
            RejectReason::BlacklistedProcessed => "blacklisted_processed",
            RejectReason::WrongMediaType => "wrong_media_type",
            RejectReason::InvalidUrl => "invalid_url",
            RejectReason::BannedWord(_) => "banned_word",
            RejectReason::TooLarge(_) => "too_large",
            RejectReason::TooSmall(_) => "too_small",
            RejectReason::TooFewSeeders(_) => "too_few_seeders",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoUrl => write!(f, "no url"),
            RejectReason::BlacklistedFailed => write!(f, "url or title previously failed"),
            RejectReason::BlacklistedProcessed => write!(f, "url or title previously processed"),
            RejectReason::WrongMediaType => write!(f, "feed does not offer this media type"),
            RejectReason::InvalidUrl => write!(f, "invalid url for delivery mode"),
            RejectReason::BannedWord(word) => write!(f, "contains banned word {}", word),
            RejectReason::TooLarge(mb) => write!(f, "too large ({}Mb)", mb),
            RejectReason::TooSmall(mb) => write!(f, "too small ({}Mb)", mb),
            RejectReason::TooFewSeeders(n) => write!(f, "only {} seeders", n),
        }
    }
}

/// A candidate after filtering and scoring.
///
/// Rejected candidates keep zero scores and carry the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateResult,
    pub author_score: i32,
    pub title_score: i32,
    pub composite_score: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<RejectReason>,
}

impl ScoredCandidate {
    pub fn rejected(candidate: CandidateResult, reason: RejectReason) -> Self {
        Self {
            candidate,
            author_score: 0,
            title_score: 0,
            composite_score: 0,
            rejected: Some(reason),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }
}

/// Result of ranking one pool of candidates.
#[derive(Debug, Clone, Default)]
pub struct RankOutcome {
    /// Best surviving candidate, if any survived.
    pub winner: Option<ScoredCandidate>,
    /// Every candidate in input order, rejections included.
    pub scored: Vec<ScoredCandidate>,
}

impl RankOutcome {
    pub fn rejected_count(&self) -> usize {
        self.scored.iter().filter(|s| s.is_rejected()).count()
    }
}

/// Whether the winner clears the acceptance threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDecision {
    pub accepted: bool,
    /// Kept even when not accepted, for near-miss reporting.
    pub winner: Option<ScoredCandidate>,
    pub threshold: i32,
}

impl MatchDecision {
    /// A winner exists but scored below the threshold.
    pub fn is_near_miss(&self) -> bool {
        !self.accepted && self.winner.is_some()
    }

    pub fn score(&self) -> Option<i32> {
        self.winner.as_ref().map(|w| w.composite_score)
    }
}
