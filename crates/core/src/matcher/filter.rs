//! Pre-scoring rejection rules.

use std::sync::Arc;

use tracing::debug;

use crate::config::{MatchingConfig, PoliciesConfig};
use crate::ledger::{DownloadLedger, DownloadStatus, LedgerError};
use crate::metrics;
use crate::searcher::{CandidateResult, DeliveryMode, SearchSource};
use crate::text::{comparable, word_list};
use crate::wanted::WantedItem;

use super::types::RejectReason;

/// Applies the rejection rules in order; the first one that fires wins.
pub struct RejectionFilter {
    matching: MatchingConfig,
    policies: PoliciesConfig,
    ledger: Arc<dyn DownloadLedger>,
}

impl RejectionFilter {
    pub fn new(
        matching: MatchingConfig,
        policies: PoliciesConfig,
        ledger: Arc<dyn DownloadLedger>,
    ) -> Self {
        Self {
            matching,
            policies,
            ledger,
        }
    }

    /// Check a candidate. `comparable_title` is the candidate title already
    /// run through [`comparable`].
    ///
    /// Returns `Ok(None)` when the candidate may be scored.
    pub fn check(
        &self,
        candidate: &CandidateResult,
        wanted: &WantedItem,
        comparable_title: &str,
    ) -> Result<Option<RejectReason>, LedgerError> {
        let reason = self.first_reason(candidate, wanted, comparable_title)?;

        if let Some(reason) = &reason {
            debug!("Rejecting {}, {}", candidate.title, reason);
            metrics::CANDIDATES_REJECTED
                .with_label_values(&[reason.metric_label()])
                .inc();
        }

        Ok(reason)
    }

    fn first_reason(
        &self,
        candidate: &CandidateResult,
        wanted: &WantedItem,
        comparable_title: &str,
    ) -> Result<Option<RejectReason>, LedgerError> {
        if candidate.url.trim().is_empty() {
            return Ok(Some(RejectReason::NoUrl));
        }

        if let Some(reason) = self.blacklist_reason(candidate)? {
            return Ok(Some(reason));
        }

        if candidate.source == SearchSource::Rss
            && !candidate.media_types.contains(wanted.media_kind)
        {
            return Ok(Some(RejectReason::WrongMediaType));
        }

        if !url_matches_mode(candidate) {
            return Ok(Some(RejectReason::InvalidUrl));
        }

        let policy = self.policies.for_kind(wanted.media_kind);

        if let Some(word) = banned_word(&policy.banned_words, comparable_title, wanted) {
            return Ok(Some(RejectReason::BannedWord(word)));
        }

        let size_mb = candidate.size_mb();
        if policy.max_size_mb > 0.0 && size_mb > policy.max_size_mb {
            return Ok(Some(RejectReason::TooLarge(size_mb)));
        }
        if policy.min_size_mb > 0.0 && candidate.size_reported() && size_mb < policy.min_size_mb {
            return Ok(Some(RejectReason::TooSmall(size_mb)));
        }

        if let Some(seeders) = self.seeders_below_minimum(candidate) {
            return Ok(Some(RejectReason::TooFewSeeders(seeders)));
        }

        Ok(None)
    }

    fn seeders_below_minimum(&self, candidate: &CandidateResult) -> Option<u32> {
        match candidate.delivery_mode {
            DeliveryMode::Torrent | DeliveryMode::Magnet => candidate
                .seeders
                .filter(|&seeders| seeders < self.matching.min_seeders),
            _ => None,
        }
    }

    fn blacklist_reason(
        &self,
        candidate: &CandidateResult,
    ) -> Result<Option<RejectReason>, LedgerError> {
        if !self.matching.blacklist_failed && !self.matching.blacklist_processed {
            return Ok(None);
        }

        // IRC urls are bot commands, only unique together with the title
        let title_key = match candidate.delivery_mode {
            DeliveryMode::Irc => Some(candidate.title.as_str()),
            _ => None,
        };

        let mut statuses: Vec<DownloadStatus> = Vec::new();
        if let Some(record) = self.ledger.find_by_url(&candidate.url, title_key)? {
            statuses.push(record.status);
        }
        statuses.extend(
            self.ledger
                .find_by_provider_title(candidate.ledger_provider(), &candidate.title)?
                .into_iter()
                .map(|r| r.status),
        );

        if self.matching.blacklist_failed && statuses.contains(&DownloadStatus::Failed) {
            return Ok(Some(RejectReason::BlacklistedFailed));
        }
        if self.matching.blacklist_processed && !statuses.is_empty() {
            return Ok(Some(RejectReason::BlacklistedProcessed));
        }

        Ok(None)
    }
}

fn url_matches_mode(candidate: &CandidateResult) -> bool {
    match candidate.delivery_mode {
        DeliveryMode::Irc => candidate.url.starts_with('!'),
        _ => candidate.url.starts_with("http") || candidate.url.starts_with("magnet"),
    }
}

/// First banned word that is a whole word of the title but not of the
/// wanted author or title.
fn banned_word(banned: &[String], comparable_title: &str, wanted: &WantedItem) -> Option<String> {
    if banned.is_empty() {
        return None;
    }

    let title_words = word_list(comparable_title);
    let mut wanted_words = word_list(&comparable(&wanted.author_name));
    wanted_words.extend(word_list(&comparable(&wanted.title)));

    banned
        .iter()
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .find(|word| title_words.contains(word) && !wanted_words.contains(word))
}
