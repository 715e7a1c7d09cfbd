//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Matching (rejections, decisions, best-match scores)
//! - Dispatch (outcomes per delivery mode)
//! - Download clients and providers (requests, results)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Matching
// =============================================================================

/// Candidates rejected before scoring, by reason.
pub static CANDIDATES_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bookhound_candidates_rejected_total",
            "Total candidates rejected before scoring",
        ),
        &["reason"],
    )
    .unwrap()
});

/// Match decisions by outcome.
pub static MATCH_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bookhound_match_decisions_total", "Total match decisions"),
        &["outcome"], // "accepted", "near_miss", "no_candidates"
    )
    .unwrap()
});

/// Composite score of the best candidate per ranking.
pub static BEST_MATCH_SCORE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bookhound_best_match_score",
            "Distribution of best-match composite scores",
        )
        .buckets(vec![0.0, 20.0, 40.0, 60.0, 70.0, 80.0, 90.0, 95.0, 100.0, 110.0]),
        &["media_kind"],
    )
    .unwrap()
});

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatch outcomes by delivery mode.
pub static DISPATCH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("bookhound_dispatch_outcomes_total", "Total dispatch outcomes"),
        &["mode", "outcome"], // outcome: "snatched", "already_snatched", "failed", "not_accepted"
    )
    .unwrap()
});

// =============================================================================
// External services
// =============================================================================

/// Download client requests by client and status.
pub static DOWNLOAD_CLIENT_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "bookhound_download_client_requests_total",
            "Total download client submissions",
        ),
        &["client", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// Results returned per provider search.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "bookhound_search_results",
            "Number of results returned per provider search",
        )
        .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        &["source"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(CANDIDATES_REJECTED.clone()),
        Box::new(MATCH_DECISIONS.clone()),
        Box::new(BEST_MATCH_SCORE.clone()),
        Box::new(DISPATCH_OUTCOMES.clone()),
        Box::new(DOWNLOAD_CLIENT_REQUESTS.clone()),
        Box::new(SEARCH_RESULTS.clone()),
    ]
}
