//! Mock download client for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::download_client::{DownloadClient, DownloadClientError, DownloadRequest};

/// A recorded submission for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmit {
    pub request: DownloadRequest,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the DownloadClient trait.
///
/// Records every submission and hands out a fresh uuid as the download id.
/// A queued error fails the next submission only.
///
/// # Example
///
/// ```rust,ignore
/// let client = MockDownloadClient::new("sabnzbd");
/// client.set_next_error("HTTP 500").await;
///
/// assert!(client.submit(&request).await.is_err());
/// assert!(client.submit(&request).await.is_ok());
/// assert_eq!(client.submit_count().await, 2);
/// ```
#[derive(Debug)]
pub struct MockDownloadClient {
    name: String,
    submitted: Arc<RwLock<Vec<RecordedSubmit>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockDownloadClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            submitted: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Fail the next submission with an API error carrying `message`.
    pub async fn set_next_error(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }

    /// Requests in submission order, failed ones included.
    pub async fn submitted(&self) -> Vec<DownloadRequest> {
        self.submitted
            .read()
            .await
            .iter()
            .map(|r| r.request.clone())
            .collect()
    }

    pub async fn recorded(&self) -> Vec<RecordedSubmit> {
        self.submitted.read().await.clone()
    }

    pub async fn submit_count(&self) -> usize {
        self.submitted.read().await.len()
    }

    pub async fn clear_recorded(&self) {
        self.submitted.write().await.clear();
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, request: &DownloadRequest) -> Result<String, DownloadClientError> {
        self.submitted.write().await.push(RecordedSubmit {
            request: request.clone(),
            timestamp: Utc::now(),
        });

        if let Some(message) = self.next_error.write().await.take() {
            return Err(DownloadClientError::ApiError(message));
        }

        Ok(uuid::Uuid::new_v4().to_string())
    }
}
