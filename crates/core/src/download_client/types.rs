//! Types for download client operations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::DownloadClientsConfig;
use crate::searcher::DeliveryMode;
use crate::wanted::MediaKind;

use super::{DirectHttpClient, QBittorrentClient, SabnzbdClient};

/// Errors that can occur during download client operations.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Download rejected: {0}")]
    Rejected(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Request timeout")]
    Timeout,
}

impl From<reqwest::Error> for DownloadClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DownloadClientError::Timeout
        } else if e.is_connect() {
            DownloadClientError::ConnectionFailed(e.to_string())
        } else {
            DownloadClientError::ApiError(e.to_string())
        }
    }
}

/// What a backend needs to start a download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub book_id: String,
    /// Result title, used for naming the download.
    pub title: String,
    pub url: String,
    pub media_kind: MediaKind,
    pub provider: String,
    /// Client category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A download backend.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Backend name, recorded in the ledger.
    fn name(&self) -> &str;

    /// Hand the download over. Returns the backend's download id.
    async fn submit(&self, request: &DownloadRequest) -> Result<String, DownloadClientError>;
}

/// Backends by delivery family. Any slot may be empty.
#[derive(Clone, Default)]
pub struct DownloadClients {
    pub nzb: Option<Arc<dyn DownloadClient>>,
    /// Handles both torrent files and magnet links.
    pub torrent: Option<Arc<dyn DownloadClient>>,
    pub direct: Option<Arc<dyn DownloadClient>>,
    pub irc: Option<Arc<dyn DownloadClient>>,
}

impl DownloadClients {
    /// Build the bundled backends that have a config section.
    pub fn from_config(config: &DownloadClientsConfig) -> Result<Self, DownloadClientError> {
        let mut clients = Self::default();

        if let Some(qb) = &config.qbittorrent {
            clients.torrent = Some(Arc::new(QBittorrentClient::new(qb.clone())?));
        }
        if let Some(sab) = &config.sabnzbd {
            clients.nzb = Some(Arc::new(SabnzbdClient::new(sab.clone())?));
        }
        if let Some(direct) = &config.direct {
            clients.direct = Some(Arc::new(DirectHttpClient::new(direct.clone())?));
        }

        Ok(clients)
    }

    pub fn for_mode(&self, mode: DeliveryMode) -> Option<&Arc<dyn DownloadClient>> {
        match mode {
            DeliveryMode::Nzb => self.nzb.as_ref(),
            DeliveryMode::Torrent | DeliveryMode::Magnet => self.torrent.as_ref(),
            DeliveryMode::Direct => self.direct.as_ref(),
            DeliveryMode::Irc => self.irc.as_ref(),
        }
    }
}
