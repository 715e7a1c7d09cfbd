//! Testing utilities and mock implementations.
//!
//! The mocks stand in for search providers and download backends so that
//! whole search passes can run against an in-memory ledger.
//!
//! # Example
//!
//! ```rust,ignore
//! use bookhound_core::testing::{fixtures, MockDownloadClient, MockResultProvider};
//!
//! let provider = MockResultProvider::new("newznab", SearchSource::Nzb);
//! provider.set_results(SearchTier::Exact, vec![fixtures::nzb_candidate("...", "http://a")]).await;
//!
//! let client = MockDownloadClient::new("sabnzbd");
//! ```

mod mock_download_client;
mod mock_result_provider;

pub use mock_download_client::{MockDownloadClient, RecordedSubmit};
pub use mock_result_provider::{MockResultProvider, RecordedSearch};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::searcher::{CandidateResult, DeliveryMode, SearchSource};
    use crate::wanted::{MediaKind, WantedItem};

    /// An ebook wanted item with no subtitle.
    pub fn wanted_ebook(book_id: &str, author: &str, title: &str) -> WantedItem {
        WantedItem::new(book_id, author, title, None, MediaKind::EBook)
    }

    /// An NZB result of a plausible ebook size (2 MB).
    pub fn nzb_candidate(title: &str, url: &str) -> CandidateResult {
        CandidateResult::new(title, url, "mock-newznab", DeliveryMode::Nzb, SearchSource::Nzb)
            .with_size_bytes(2 * 1024 * 1024)
    }

    /// A magnet result from a torznab feed.
    pub fn magnet_candidate(title: &str, info_hash: &str) -> CandidateResult {
        CandidateResult::new(
            title,
            format!("magnet:?xt=urn:btih:{}", info_hash),
            "mock-torznab",
            DeliveryMode::Magnet,
            SearchSource::Torrent,
        )
        .with_size_bytes(2 * 1024 * 1024)
    }

    /// A direct download result with no reported size.
    pub fn direct_candidate(title: &str, url: &str) -> CandidateResult {
        CandidateResult::new(title, url, "mock-direct", DeliveryMode::Direct, SearchSource::Direct)
    }
}
