//! Mock result provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::searcher::{CandidateResult, ResultProvider, SearchError, SearchSource, SearchTier};
use crate::wanted::WantedItem;

/// A recorded search for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSearch {
    pub book_id: String,
    pub search_term: String,
    pub tier: SearchTier,
}

/// Mock implementation of the ResultProvider trait.
///
/// Results are configured per tier; tiers without results return an empty
/// list. An error configured for a tier is returned on every search of that
/// tier.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockResultProvider::new("newznab", SearchSource::Nzb);
/// provider
///     .set_results(SearchTier::Exact, vec![fixtures::nzb_candidate("Tom Holt - Blonde Bombshell", "http://a")])
///     .await;
///
/// let results = provider.search(&wanted, SearchTier::Exact).await?;
/// assert_eq!(results.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockResultProvider {
    name: String,
    source: SearchSource,
    results: Arc<RwLock<HashMap<SearchTier, Vec<CandidateResult>>>>,
    errors: Arc<RwLock<HashMap<SearchTier, String>>>,
    searches: Arc<RwLock<Vec<RecordedSearch>>>,
}

impl MockResultProvider {
    pub fn new(name: impl Into<String>, source: SearchSource) -> Self {
        Self {
            name: name.into(),
            source,
            results: Arc::new(RwLock::new(HashMap::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            searches: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_results(&self, tier: SearchTier, results: Vec<CandidateResult>) {
        self.results.write().await.insert(tier, results);
    }

    pub async fn set_error(&self, tier: SearchTier, message: impl Into<String>) {
        self.errors.write().await.insert(tier, message.into());
    }

    pub async fn recorded_searches(&self) -> Vec<RecordedSearch> {
        self.searches.read().await.clone()
    }

    /// Tiers searched so far, in order.
    pub async fn searched_tiers(&self) -> Vec<SearchTier> {
        self.searches.read().await.iter().map(|s| s.tier).collect()
    }
}

#[async_trait]
impl ResultProvider for MockResultProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> SearchSource {
        self.source
    }

    async fn search(
        &self,
        wanted: &WantedItem,
        tier: SearchTier,
    ) -> Result<Vec<CandidateResult>, SearchError> {
        self.searches.write().await.push(RecordedSearch {
            book_id: wanted.book_id.clone(),
            search_term: wanted.search_term.clone(),
            tier,
        });

        if let Some(message) = self.errors.read().await.get(&tier) {
            return Err(SearchError::ConnectionFailed(message.clone()));
        }

        Ok(self
            .results
            .read()
            .await
            .get(&tier)
            .cloned()
            .unwrap_or_default())
    }
}
