//! Dispatch of accepted matches.
//!
//! The already-snatched checks and the claim guard against two search
//! passes racing on the same wanted item. Each call submits at most once.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::download_client::{DownloadClients, DownloadRequest};
use crate::ledger::{CatalogStatus, DownloadLedger, DownloadRecord, LedgerError};
use crate::matcher::MatchDecision;
use crate::metrics;
use crate::searcher::CandidateResult;
use crate::wanted::WantedItem;

use super::events::{DispatchEvent, EventHandle};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// What happened to an accepted match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// The decision was not accepted; nothing was touched.
    NotAccepted,
    /// Another pass already snatched (or is snatching) this item.
    AlreadySnatched,
    Snatched { download_id: String },
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_snatched(&self) -> bool {
        matches!(self, DispatchOutcome::Snatched { .. })
    }

    fn metric_label(&self) -> &'static str {
        match self {
            DispatchOutcome::NotAccepted => "not_accepted",
            DispatchOutcome::AlreadySnatched => "already_snatched",
            DispatchOutcome::Snatched { .. } => "snatched",
            DispatchOutcome::Failed { .. } => "failed",
        }
    }
}

pub struct Dispatcher {
    ledger: Arc<dyn DownloadLedger>,
    catalog: Arc<dyn CatalogStatus>,
    clients: DownloadClients,
    events: Option<EventHandle>,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn DownloadLedger>,
        catalog: Arc<dyn CatalogStatus>,
        clients: DownloadClients,
    ) -> Self {
        Self {
            ledger,
            catalog,
            clients,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    /// Record and submit the decision's winner.
    ///
    /// Backend failures become [`DispatchOutcome::Failed`]; only ledger
    /// errors are returned as `Err`.
    pub async fn dispatch(
        &self,
        decision: &MatchDecision,
        wanted: &WantedItem,
    ) -> Result<DispatchOutcome, DispatchError> {
        let winner = match (&decision.winner, decision.accepted) {
            (Some(winner), true) => winner,
            _ => return Ok(DispatchOutcome::NotAccepted),
        };
        let candidate = &winner.candidate;

        let outcome = self.dispatch_candidate(candidate, wanted).await?;

        metrics::DISPATCH_OUTCOMES
            .with_label_values(&[candidate.delivery_mode.as_str(), outcome.metric_label()])
            .inc();

        Ok(outcome)
    }

    async fn dispatch_candidate(
        &self,
        candidate: &CandidateResult,
        wanted: &WantedItem,
    ) -> Result<DispatchOutcome, DispatchError> {
        let kind = wanted.media_kind;

        if self.ledger.is_snatched(&wanted.book_id, kind)? {
            debug!("{} {} already marked snatched in ledger", wanted.book_id, kind);
            return Ok(DispatchOutcome::AlreadySnatched);
        }
        if self.catalog.is_item_snatched(&wanted.book_id, kind)? {
            debug!("{} {} already marked snatched in catalog", wanted.book_id, kind);
            return Ok(DispatchOutcome::AlreadySnatched);
        }

        let record = DownloadRecord::matched(candidate, wanted);
        if !self.ledger.claim(&record)? {
            debug!(
                "{} {} claimed by another search, not submitting {}",
                wanted.book_id, kind, candidate.title
            );
            return Ok(DispatchOutcome::AlreadySnatched);
        }

        let Some(client) = self.clients.for_mode(candidate.delivery_mode) else {
            let reason = format!("No download client for mode {}", candidate.delivery_mode);
            error!("Unhandled delivery mode {} for {}", candidate.delivery_mode, candidate.title);
            return self.fail(candidate, wanted, reason).await;
        };

        let request = DownloadRequest {
            book_id: wanted.book_id.clone(),
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            media_kind: kind,
            provider: candidate.provider.clone(),
            label: candidate.label.clone(),
        };

        match client.submit(&request).await {
            Ok(download_id) => {
                metrics::DOWNLOAD_CLIENT_REQUESTS
                    .with_label_values(&[client.name(), "success"])
                    .inc();

                self.ledger.mark_snatched(
                    &candidate.url,
                    &candidate.title,
                    &download_id,
                    client.name(),
                )?;
                self.catalog.mark_item_snatched(&wanted.book_id, kind)?;

                info!(
                    "Downloading {} {} from {} via {}",
                    kind, candidate.title, candidate.provider, client.name()
                );

                self.emit(DispatchEvent::Snatched {
                    book_id: wanted.book_id.clone(),
                    media_kind: kind,
                    title: candidate.title.clone(),
                    provider: candidate.provider.clone(),
                    mode: candidate.delivery_mode,
                    download_id: download_id.clone(),
                });
                self.emit(DispatchEvent::PostProcessRequested {
                    book_id: wanted.book_id.clone(),
                    media_kind: kind,
                });

                Ok(DispatchOutcome::Snatched { download_id })
            }
            Err(e) => {
                metrics::DOWNLOAD_CLIENT_REQUESTS
                    .with_label_values(&[client.name(), "error"])
                    .inc();
                warn!("Failed to send {} to {}: {}", candidate.title, client.name(), e);
                self.fail(candidate, wanted, e.to_string()).await
            }
        }
    }

    async fn fail(
        &self,
        candidate: &CandidateResult,
        wanted: &WantedItem,
        reason: String,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.ledger
            .mark_failed(&candidate.url, &candidate.title, &reason)?;

        self.emit(DispatchEvent::DownloadFailed {
            book_id: wanted.book_id.clone(),
            media_kind: wanted.media_kind,
            title: candidate.title.clone(),
            url: candidate.url.clone(),
            reason: reason.clone(),
        });

        Ok(DispatchOutcome::Failed { reason })
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(events) = &self.events {
            events.try_emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DownloadStatus, ItemStatus, SqliteLedger};
    use crate::matcher::{decide, ScoredCandidate};
    use crate::searcher::{DeliveryMode, SearchSource};
    use crate::testing::MockDownloadClient;
    use crate::wanted::MediaKind;

    struct Fixture {
        ledger: Arc<SqliteLedger>,
        client: Arc<MockDownloadClient>,
        dispatcher: Dispatcher,
        events: tokio::sync::mpsc::Receiver<super::super::EventEnvelope>,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let client = Arc::new(MockDownloadClient::new("sabnzbd"));
        let clients = DownloadClients {
            nzb: Some(client.clone()),
            ..DownloadClients::default()
        };
        let (handle, events) = EventHandle::channel(16);
        let dispatcher = Dispatcher::new(ledger.clone(), ledger.clone(), clients).with_events(handle);
        Fixture {
            ledger,
            client,
            dispatcher,
            events,
        }
    }

    fn wanted() -> WantedItem {
        WantedItem::new("b1", "Tom Holt", "Blonde Bombshell", None, MediaKind::EBook)
    }

    fn accepted(url: &str, mode: DeliveryMode) -> MatchDecision {
        let candidate = CandidateResult::new("Tom Holt - Blonde Bombshell", url, "indexer", mode, SearchSource::Nzb);
        decide(
            Some(ScoredCandidate {
                candidate,
                author_score: 100,
                title_score: 100,
                composite_score: 100,
                rejected: None,
            }),
            80,
        )
    }

    #[tokio::test]
    async fn test_not_accepted_touches_nothing() {
        let f = fixture();
        let mut decision = accepted("http://a", DeliveryMode::Nzb);
        decision.accepted = false;

        let outcome = f.dispatcher.dispatch(&decision, &wanted()).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NotAccepted);
        assert!(f.ledger.list_for_book("b1").unwrap().is_empty());
        assert_eq!(f.client.submit_count().await, 0);
    }

    #[tokio::test]
    async fn test_snatch_records_and_notifies() {
        let mut f = fixture();
        let outcome = f
            .dispatcher
            .dispatch(&accepted("http://a", DeliveryMode::Nzb), &wanted())
            .await
            .unwrap();

        let DispatchOutcome::Snatched { download_id } = outcome else {
            panic!("expected snatched, got {:?}", outcome);
        };

        let record = f.ledger.find_by_url("http://a", None).unwrap().unwrap();
        assert_eq!(record.status, DownloadStatus::Snatched);
        assert_eq!(record.download_id.as_deref(), Some(download_id.as_str()));
        assert_eq!(record.source.as_deref(), Some("sabnzbd"));
        assert!(f.ledger.is_item_snatched("b1", MediaKind::EBook).unwrap());

        let first = f.events.recv().await.unwrap().event;
        assert!(matches!(first, DispatchEvent::Snatched { .. }));
        let second = f.events.recv().await.unwrap().event;
        assert!(matches!(second, DispatchEvent::PostProcessRequested { .. }));
    }

    #[tokio::test]
    async fn test_second_dispatch_is_already_snatched() {
        let f = fixture();
        let decision = accepted("http://a", DeliveryMode::Nzb);

        let first = f.dispatcher.dispatch(&decision, &wanted()).await.unwrap();
        assert!(first.is_snatched());
        let second = f.dispatcher.dispatch(&decision, &wanted()).await.unwrap();
        assert_eq!(second, DispatchOutcome::AlreadySnatched);

        // A different result for the same item is also refused
        let other = accepted("http://b", DeliveryMode::Nzb);
        let third = f.dispatcher.dispatch(&other, &wanted()).await.unwrap();
        assert_eq!(third, DispatchOutcome::AlreadySnatched);

        assert_eq!(f.client.submit_count().await, 1);
    }

    #[tokio::test]
    async fn test_catalog_status_alone_blocks_dispatch() {
        let f = fixture();
        f.ledger
            .set_item_status("b1", MediaKind::EBook, ItemStatus::Snatched)
            .unwrap();

        let outcome = f
            .dispatcher
            .dispatch(&accepted("http://a", DeliveryMode::Nzb), &wanted())
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::AlreadySnatched);
        assert_eq!(f.client.submit_count().await, 0);
    }

    #[tokio::test]
    async fn test_in_flight_claim_blocks_dispatch() {
        let f = fixture();
        let other = CandidateResult::new("x", "http://racer", "indexer", DeliveryMode::Nzb, SearchSource::Nzb);
        f.ledger.claim(&DownloadRecord::matched(&other, &wanted())).unwrap();

        let outcome = f
            .dispatcher
            .dispatch(&accepted("http://a", DeliveryMode::Nzb), &wanted())
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::AlreadySnatched);
        assert_eq!(f.client.submit_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_claim_no_longer_blocks() {
        let f = fixture();
        let other = CandidateResult::new("x", "http://crashed", "indexer", DeliveryMode::Nzb, SearchSource::Nzb);
        let mut stale = DownloadRecord::matched(&other, &wanted());
        stale.requested_at = chrono::Utc::now() - chrono::Duration::hours(2);
        f.ledger.claim(&stale).unwrap();

        let outcome = f
            .dispatcher
            .dispatch(&accepted("http://a", DeliveryMode::Nzb), &wanted())
            .await
            .unwrap();
        assert!(outcome.is_snatched());
        assert_eq!(f.client.submit_count().await, 1);
    }

    fn irc_accepted(title: &str) -> MatchDecision {
        let mut candidate = CandidateResult::new(title, "!bookbot", "irc", DeliveryMode::Irc, SearchSource::Irc);
        candidate.feed = Some("#ebooks".to_string());
        decide(
            Some(ScoredCandidate {
                candidate,
                author_score: 100,
                title_score: 100,
                composite_score: 100,
                rejected: None,
            }),
            80,
        )
    }

    #[tokio::test]
    async fn test_irc_books_from_one_bot_both_snatch() {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        let client = Arc::new(MockDownloadClient::new("irc"));
        let clients = DownloadClients {
            irc: Some(client.clone()),
            ..DownloadClients::default()
        };
        let dispatcher = Dispatcher::new(ledger.clone(), ledger.clone(), clients);

        let holt = WantedItem::new("b1", "Tom Holt", "Blonde Bombshell", None, MediaKind::EBook);
        let mort = WantedItem::new("b2", "Terry Pratchett", "Mort", None, MediaKind::EBook);

        let first = dispatcher
            .dispatch(&irc_accepted("Tom Holt - Blonde Bombshell.epub"), &holt)
            .await
            .unwrap();
        let second = dispatcher
            .dispatch(&irc_accepted("Terry Pratchett - Mort.epub"), &mort)
            .await
            .unwrap();

        assert!(first.is_snatched());
        assert!(second.is_snatched());
        assert_eq!(client.submit_count().await, 2);
        assert!(ledger.is_snatched("b1", MediaKind::EBook).unwrap());
        assert!(ledger.is_snatched("b2", MediaKind::EBook).unwrap());
    }

    #[tokio::test]
    async fn test_submit_failure_marks_failed() {
        let mut f = fixture();
        f.client.set_next_error("HTTP 500").await;

        let outcome = f
            .dispatcher
            .dispatch(&accepted("http://a", DeliveryMode::Nzb), &wanted())
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));

        let record = f.ledger.find_by_url("http://a", None).unwrap().unwrap();
        assert_eq!(record.status, DownloadStatus::Failed);
        assert!(record.dl_result.unwrap().contains("HTTP 500"));
        assert!(!f.ledger.is_item_snatched("b1", MediaKind::EBook).unwrap());

        let event = f.events.recv().await.unwrap().event;
        assert!(matches!(event, DispatchEvent::DownloadFailed { .. }));

        // The failure released the claim, so a retry can go through
        let retry = f
            .dispatcher
            .dispatch(&accepted("http://b", DeliveryMode::Nzb), &wanted())
            .await
            .unwrap();
        assert!(retry.is_snatched());
    }

    #[tokio::test]
    async fn test_missing_backend_fails() {
        let f = fixture();
        let outcome = f
            .dispatcher
            .dispatch(&accepted("magnet:?xt=urn:btih:abc", DeliveryMode::Magnet), &wanted())
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Failed { .. }));
        let record = f
            .ledger
            .find_by_url("magnet:?xt=urn:btih:abc", None)
            .unwrap()
            .unwrap();
        assert_eq!(record.status, DownloadStatus::Failed);
    }

    #[tokio::test]
    async fn test_request_carries_candidate_details() {
        let f = fixture();
        let mut decision = accepted("http://a", DeliveryMode::Nzb);
        if let Some(w) = decision.winner.as_mut() {
            w.candidate.label = Some("books".to_string());
        }

        f.dispatcher.dispatch(&decision, &wanted()).await.unwrap();

        let submitted = f.client.submitted().await;
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].book_id, "b1");
        assert_eq!(submitted[0].url, "http://a");
        assert_eq!(submitted[0].label.as_deref(), Some("books"));
    }
}
