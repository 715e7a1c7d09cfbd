pub mod config;
pub mod dispatch;
pub mod download_client;
pub mod fuzzy;
pub mod ledger;
pub mod matcher;
pub mod metrics;
pub mod orchestrator;
pub mod searcher;
pub mod testing;
pub mod text;
pub mod wanted;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use dispatch::{DispatchError, DispatchEvent, DispatchOutcome, Dispatcher, EventHandle};
pub use download_client::{DownloadClient, DownloadClientError, DownloadClients};
pub use ledger::{CatalogStatus, DownloadLedger, DownloadRecord, LedgerError, SqliteLedger};
pub use matcher::{decide, CandidateRanker, MatchDecision, RejectReason, ScoredCandidate};
pub use orchestrator::{SearchOrchestrator, SearchReport};
pub use searcher::{
    candidate_from_raw, candidates_from_raw, CandidateResult, DeliveryMode, ResultProvider,
    SearchSource, SearchTier,
};
pub use wanted::{MediaKind, WantedItem};
