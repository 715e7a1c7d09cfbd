//! SABnzbd backend for NZB results.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::SabnzbdConfig;

use super::{DownloadClient, DownloadClientError, DownloadRequest};

pub struct SabnzbdClient {
    client: Client,
    config: SabnzbdConfig,
}

#[derive(Debug, Deserialize)]
struct AddUrlResponse {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    nzo_ids: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SabnzbdClient {
    pub fn new(config: SabnzbdConfig) -> Result<Self, DownloadClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| DownloadClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn add_url(&self, request: &DownloadRequest) -> String {
        let mut url = format!(
            "{}/api?mode=addurl&name={}&nzbname={}&apikey={}&output=json",
            self.config.url.trim_end_matches('/'),
            urlencoding::encode(&request.url),
            urlencoding::encode(&request.title),
            urlencoding::encode(&self.config.api_key),
        );

        if let Some(category) = request.label.as_ref().or(self.config.category.as_ref()) {
            url.push_str("&cat=");
            url.push_str(&urlencoding::encode(category));
        }
        url
    }
}

fn parse_add_response(body: &str) -> Result<String, DownloadClientError> {
    let parsed: AddUrlResponse = serde_json::from_str(body)
        .map_err(|e| DownloadClientError::ApiError(format!("Invalid SABnzbd response: {}", e)))?;

    if !parsed.status {
        return Err(DownloadClientError::Rejected(
            parsed.error.unwrap_or_else(|| "SABnzbd returned status false".to_string()),
        ));
    }

    parsed
        .nzo_ids
        .into_iter()
        .next()
        .ok_or_else(|| DownloadClientError::ApiError("SABnzbd returned no nzo_id".to_string()))
}

#[async_trait]
impl DownloadClient for SabnzbdClient {
    fn name(&self) -> &str {
        "sabnzbd"
    }

    async fn submit(&self, request: &DownloadRequest) -> Result<String, DownloadClientError> {
        let response = self.client.get(self.add_url(request)).send().await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(DownloadClientError::AuthenticationFailed(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
        }

        let body = response.text().await?;
        let id = parse_add_response(&body)?;
        debug!(id = %id, title = %request.title, "NZB sent to SABnzbd");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wanted::MediaKind;

    fn client(category: Option<&str>) -> SabnzbdClient {
        SabnzbdClient::new(SabnzbdConfig {
            url: "http://localhost:8085/".to_string(),
            api_key: "k3y".to_string(),
            category: category.map(str::to_string),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn request(label: Option<&str>) -> DownloadRequest {
        DownloadRequest {
            book_id: "b1".to_string(),
            title: "Tom Holt - Blonde Bombshell".to_string(),
            url: "http://indexer/get?id=1&r=x".to_string(),
            media_kind: MediaKind::EBook,
            provider: "indexer".to_string(),
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_add_url_encodes_parameters() {
        let url = client(None).add_url(&request(None));
        assert_eq!(
            url,
            "http://localhost:8085/api?mode=addurl&name=http%3A%2F%2Findexer%2Fget%3Fid%3D1%26r%3Dx&nzbname=Tom%20Holt%20-%20Blonde%20Bombshell&apikey=k3y&output=json"
        );
    }

    #[test]
    fn test_add_url_category() {
        assert!(client(Some("books")).add_url(&request(None)).ends_with("&cat=books"));
        // The result label wins over the configured default
        assert!(client(Some("books"))
            .add_url(&request(Some("audio")))
            .ends_with("&cat=audio"));
    }

    #[test]
    fn test_parse_add_response() {
        assert_eq!(
            parse_add_response(r#"{"status": true, "nzo_ids": ["SABnzbd_nzo_abc"]}"#).unwrap(),
            "SABnzbd_nzo_abc"
        );
        assert!(matches!(
            parse_add_response(r#"{"status": false, "error": "API Key Incorrect"}"#),
            Err(DownloadClientError::Rejected(msg)) if msg == "API Key Incorrect"
        ));
        assert!(matches!(
            parse_add_response(r#"{"status": true, "nzo_ids": []}"#),
            Err(DownloadClientError::ApiError(_))
        ));
        assert!(parse_add_response("not json").is_err());
    }
}
