//! qBittorrent Web API backend for torrent and magnet results.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{DownloadClient, DownloadClientError, DownloadRequest};

/// qBittorrent client.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Set once logged in; the session cookie itself lives in the cookie jar.
    session: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    pub fn new(config: QBittorrentConfig) -> Result<Self, DownloadClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(false)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn login(&self) -> Result<(), DownloadClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self.client.post(&url).form(&params).send().await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(DownloadClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(DownloadClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), DownloadClientError> {
        if *self.session.read().await {
            return Ok(());
        }
        self.login().await
    }

    fn add_form(&self, request: &DownloadRequest) -> multipart::Form {
        let mut form = multipart::Form::new().text("urls", request.url.clone());

        if let Some(path) = &self.config.save_path {
            form = form.text("savepath", path.clone());
        }
        if let Some(category) = &request.label {
            form = form.text("category", category.clone());
        }
        form
    }

    /// POST /api/v2/torrents/add, re-authenticating once on 403.
    async fn add(&self, request: &DownloadRequest) -> Result<(), DownloadClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}/api/v2/torrents/add", self.base_url());
        let mut response = self
            .client
            .post(&url)
            .multipart(self.add_form(request))
            .send()
            .await?;

        if response.status().as_u16() == 403 {
            warn!("qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;

            // Multipart forms are consumed by send, so build a fresh one
            response = self
                .client
                .post(&url)
                .multipart(self.add_form(request))
                .send()
                .await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        if body.contains("Fails.") {
            return Err(DownloadClientError::Rejected(
                "qBittorrent refused the torrent".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DownloadClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn submit(&self, request: &DownloadRequest) -> Result<String, DownloadClientError> {
        self.add(request).await?;

        // The info hash is only known up front for magnets
        let id = extract_hash_from_magnet(&request.url).unwrap_or_else(|| request.url.clone());
        debug!(id = %id, title = %request.title, "Torrent added to qBittorrent");
        Ok(id)
    }
}

/// Extract info hash from a magnet URI.
fn extract_hash_from_magnet(magnet: &str) -> Option<String> {
    let (_, query) = magnet.strip_prefix("magnet:")?.split_once('?')?;

    query
        .split('&')
        .find_map(|param| param.strip_prefix("xt=urn:btih:"))
        .filter(|hash| !hash.is_empty())
        .map(|hash| hash.to_lowercase())
}
