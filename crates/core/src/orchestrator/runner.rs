//! Search orchestrator implementation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::config::SearchConfig;
use crate::dispatch::{DispatchError, DispatchOutcome, Dispatcher};
use crate::matcher::{decide, CandidateRanker, MatchDecision};
use crate::metrics;
use crate::searcher::{CandidateResult, ResultProvider, SearchSource, SearchTier};
use crate::wanted::WantedItem;

use super::types::SearchReport;

/// Tiers to try for an item, in order.
///
/// The short tiers only make sense when there is a parenthesised part to
/// strip.
pub fn tiers_for(wanted: &WantedItem) -> Vec<SearchTier> {
    let mut tiers = vec![SearchTier::Exact];
    if wanted.title.contains('(') {
        tiers.push(SearchTier::Short);
    }
    tiers.push(SearchTier::General);
    if wanted.search_term.contains('(') {
        tiers.push(SearchTier::ShortGeneral);
    }
    tiers.push(SearchTier::TitleOnly);
    tiers
}

/// Drives providers, ranker, gate and dispatcher for wanted items.
pub struct SearchOrchestrator {
    providers: Vec<Arc<dyn ResultProvider>>,
    ranker: CandidateRanker,
    dispatcher: Dispatcher,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(
        providers: Vec<Arc<dyn ResultProvider>>,
        ranker: CandidateRanker,
        dispatcher: Dispatcher,
        config: SearchConfig,
    ) -> Self {
        Self {
            providers,
            ranker,
            dispatcher,
            config,
        }
    }

    /// Search one item tier by tier until a match is dispatched.
    ///
    /// A failed submission moves on to the next tier. Only ledger errors
    /// abort the search.
    pub async fn search_item(&self, wanted: &WantedItem) -> Result<SearchReport, DispatchError> {
        let threshold = self.ranker.match_ratio();
        let mut report = SearchReport {
            tier: None,
            decision: decide(None, threshold),
            outcome: DispatchOutcome::NotAccepted,
        };

        for tier in tiers_for(wanted) {
            let pools = self.search_tier(wanted, tier).await;
            if pools.is_empty() {
                debug!("No results for {} using {} search", wanted.search_term, tier);
                continue;
            }

            let mut accepted: Option<MatchDecision> = None;
            let mut nearest: Option<MatchDecision> = None;

            for (source, pool) in pools {
                let ranked = self.ranker.rank(pool, wanted, tier)?;
                let (rejected, total) = (ranked.rejected_count(), ranked.scored.len());
                let decision = decide(ranked.winner, threshold);

                let label = if decision.accepted {
                    "accepted"
                } else if decision.is_near_miss() {
                    "near_miss"
                } else {
                    "no_candidates"
                };
                metrics::MATCH_DECISIONS.with_label_values(&[label]).inc();
                debug!(
                    "{} family for {}: {} ({} of {} rejected)",
                    source.as_str(),
                    wanted.search_term,
                    label,
                    rejected,
                    total
                );

                let slot = if decision.accepted {
                    &mut accepted
                } else if decision.is_near_miss() {
                    &mut nearest
                } else {
                    continue;
                };
                if beats(&decision, slot.as_ref()) {
                    *slot = Some(decision);
                }
            }

            let Some(decision) = accepted else {
                if let Some(near) = nearest {
                    if beats(&near, Some(&report.decision)) {
                        report.tier = Some(tier);
                        report.decision = near;
                    }
                }
                continue;
            };

            let outcome = self.dispatcher.dispatch(&decision, wanted).await?;
            report.tier = Some(tier);
            report.decision = decision;
            report.outcome = outcome;

            match &report.outcome {
                DispatchOutcome::Failed { reason } => {
                    warn!(
                        "Dispatch failed for {} using {} search: {}",
                        wanted.search_term, tier, reason
                    );
                }
                _ => return Ok(report),
            }
        }

        if report.decision.winner.is_none() {
            info!("No match found for {} {}", wanted.media_kind, wanted.search_term);
        }
        Ok(report)
    }

    /// Search items one after another, pausing between them.
    ///
    /// Ledger errors for one item are logged and the batch continues.
    /// Returns the number of items snatched.
    pub async fn search_all(&self, items: &[WantedItem]) -> usize {
        let mut snatched = 0;

        for (idx, wanted) in items.iter().enumerate() {
            if idx > 0 && self.config.rate_limit_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.rate_limit_ms)).await;
            }

            match self.search_item(wanted).await {
                Ok(report) if report.is_snatched() => snatched += 1,
                Ok(_) => {}
                Err(e) => error!("Search for {} failed: {}", wanted.book_id, e),
            }
        }

        info!("Search pass complete: {} of {} snatched", snatched, items.len());
        snatched
    }

    /// Query every provider for `tier` and pool the results per source
    /// family, in provider order.
    async fn search_tier(
        &self,
        wanted: &WantedItem,
        tier: SearchTier,
    ) -> Vec<(SearchSource, Vec<CandidateResult>)> {
        let searches = self
            .providers
            .iter()
            .map(|provider| async move { (provider, provider.search(wanted, tier).await) });

        let mut pools: Vec<(SearchSource, Vec<CandidateResult>)> = Vec::new();
        for (provider, result) in join_all(searches).await {
            let results = match result {
                Ok(results) => results,
                Err(e) => {
                    warn!("{} {} search failed: {}", provider.name(), tier, e);
                    continue;
                }
            };

            let source = provider.source();
            metrics::SEARCH_RESULTS
                .with_label_values(&[source.as_str()])
                .observe(results.len() as f64);

            if results.is_empty() {
                continue;
            }
            match pools.iter_mut().find(|(s, _)| *s == source) {
                Some((_, pool)) => pool.extend(results),
                None => pools.push((source, results)),
            }
        }
        pools
    }
}

/// Whether `candidate` has a strictly higher `(score, priority)` than
/// `current`. Earlier decisions keep ties, and any winner beats none.
fn beats(candidate: &MatchDecision, current: Option<&MatchDecision>) -> bool {
    let key = |d: &MatchDecision| {
        d.winner
            .as_ref()
            .map(|w| (w.composite_score, w.candidate.priority))
    };
    match current {
        None => true,
        Some(current) => key(candidate) > key(current),
    }
}
