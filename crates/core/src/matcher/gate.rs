use super::types::{MatchDecision, ScoredCandidate};

/// Accept the winner iff its composite score reaches `threshold`.
pub fn decide(winner: Option<ScoredCandidate>, threshold: i32) -> MatchDecision {
    let accepted = winner
        .as_ref()
        .is_some_and(|w| w.composite_score >= threshold);

    MatchDecision {
        accepted,
        winner,
        threshold,
    }
}
