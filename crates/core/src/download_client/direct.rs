//! Plain HTTP download backend.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::DirectConfig;

use super::{DownloadClient, DownloadClientError, DownloadRequest};

const MAX_FILENAME_CHARS: usize = 200;

/// Downloads the result url straight into the configured directory.
pub struct DirectHttpClient {
    client: Client,
    config: DirectConfig,
}

impl DirectHttpClient {
    pub fn new(config: DirectConfig) -> Result<Self, DownloadClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn target_path(&self, request: &DownloadRequest, content_type: Option<&str>) -> PathBuf {
        let ext = extension_for(&request.url, content_type).unwrap_or_default();
        self.config
            .download_dir
            .join(format!("{}{}", sanitize_filename(&request.title), ext))
    }
}

/// Download id for a direct url.
pub(crate) fn url_digest(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILENAME_CHARS)
        .collect();

    let cleaned = cleaned.trim().trim_matches('.').trim();
    if cleaned.is_empty() {
        "download".to_string()
    } else {
        cleaned.to_string()
    }
}

/// File extension, with its dot, from the url path or else the content type.
fn extension_for(url: &str, content_type: Option<&str>) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = path.rsplit('/').next().unwrap_or(path);

    if let Some((_, ext)) = last_segment.rsplit_once('.') {
        if (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Some(format!(".{}", ext.to_lowercase()));
        }
    }

    let mime = content_type?.split(';').next()?.trim().to_lowercase();
    let ext = match mime.as_str() {
        "application/epub+zip" => ".epub",
        "application/pdf" => ".pdf",
        "application/x-mobipocket-ebook" => ".mobi",
        "application/vnd.amazon.ebook" => ".azw",
        "application/x-cbr" | "application/vnd.comicbook-rar" => ".cbr",
        "application/x-cbz" | "application/vnd.comicbook+zip" => ".cbz",
        "audio/mpeg" => ".mp3",
        "audio/mp4" | "audio/x-m4b" => ".m4b",
        "audio/flac" => ".flac",
        "application/zip" => ".zip",
        _ => return None,
    };
    Some(ext.to_string())
}

#[async_trait]
impl DownloadClient for DirectHttpClient {
    fn name(&self) -> &str {
        "direct"
    }

    async fn submit(&self, request: &DownloadRequest) -> Result<String, DownloadClientError> {
        let response = self.client.get(&request.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Error and login pages come back as 200 text/html
        if content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("text/html"))
        {
            return Err(DownloadClientError::Rejected(
                "expected a file, got a web page".to_string(),
            ));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(DownloadClientError::Rejected("empty download".to_string()));
        }

        let path = self.target_path(request, content_type.as_deref());
        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .map_err(|e| DownloadClientError::Io(e.to_string()))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| DownloadClientError::Io(e.to_string()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Direct download saved");
        Ok(url_digest(&request.url))
    }
}
