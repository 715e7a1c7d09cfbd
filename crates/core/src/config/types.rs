use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wanted::MediaKind;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub policies: PoliciesConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub download_clients: DownloadClientsConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Scoring thresholds and blacklist switches
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchingConfig {
    /// Minimum composite score for a match to be accepted (0-100).
    #[serde(default = "default_match_ratio")]
    pub match_ratio: i32,
    /// Reject results that previously failed to download.
    #[serde(default = "default_true")]
    pub blacklist_failed: bool,
    /// Reject results that were ever attempted, whatever the outcome.
    #[serde(default)]
    pub blacklist_processed: bool,
    /// Torrent and magnet results reporting fewer seeders are rejected.
    /// Results that don't report seeders always pass.
    #[serde(default)]
    pub min_seeders: u32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            match_ratio: default_match_ratio(),
            blacklist_failed: true,
            blacklist_processed: false,
            min_seeders: 0,
        }
    }
}

fn default_match_ratio() -> i32 {
    80
}

fn default_true() -> bool {
    true
}

/// Size limits, banned words and preferred formats for one media kind.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MediaPolicy {
    /// 0 means no lower bound.
    #[serde(default)]
    pub min_size_mb: f64,
    /// 0 means no upper bound.
    #[serde(default)]
    pub max_size_mb: f64,
    #[serde(default)]
    pub banned_words: Vec<String>,
    /// Most preferred first.
    #[serde(default)]
    pub preferred_formats: Vec<String>,
}

impl MediaPolicy {
    pub fn with_formats(formats: &[&str]) -> Self {
        Self {
            min_size_mb: 0.0,
            max_size_mb: 0.0,
            banned_words: Vec::new(),
            preferred_formats: formats.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn is_format(&self, word: &str) -> bool {
        self.preferred_formats
            .iter()
            .any(|f| f.eq_ignore_ascii_case(word))
    }
}

/// Per-kind policies
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoliciesConfig {
    #[serde(default = "default_ebook_policy")]
    pub ebook: MediaPolicy,
    #[serde(default = "default_audiobook_policy")]
    pub audiobook: MediaPolicy,
    #[serde(default = "default_magazine_policy")]
    pub magazine: MediaPolicy,
    #[serde(default = "default_comic_policy")]
    pub comic: MediaPolicy,
}

impl PoliciesConfig {
    pub fn for_kind(&self, kind: MediaKind) -> &MediaPolicy {
        match kind {
            MediaKind::EBook => &self.ebook,
            MediaKind::AudioBook => &self.audiobook,
            MediaKind::Magazine => &self.magazine,
            MediaKind::Comic => &self.comic,
        }
    }
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            ebook: default_ebook_policy(),
            audiobook: default_audiobook_policy(),
            magazine: default_magazine_policy(),
            comic: default_comic_policy(),
        }
    }
}

fn default_ebook_policy() -> MediaPolicy {
    MediaPolicy::with_formats(&["epub", "mobi", "pdf"])
}

fn default_audiobook_policy() -> MediaPolicy {
    MediaPolicy::with_formats(&["mp3", "m4b", "flac"])
}

fn default_magazine_policy() -> MediaPolicy {
    MediaPolicy::with_formats(&["pdf"])
}

fn default_comic_policy() -> MediaPolicy {
    MediaPolicy::with_formats(&["cbr", "cbz"])
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Seconds before an unfinished claim stops blocking new downloads for
    /// its item. 0 disables expiry.
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            claim_timeout_secs: default_claim_timeout_secs(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("bookhound.db")
}

fn default_claim_timeout_secs() -> u64 {
    3600
}

/// Download backends. Each is optional; a missing backend fails dispatch
/// for its delivery modes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DownloadClientsConfig {
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
    #[serde(default)]
    pub sabnzbd: Option<SabnzbdConfig>,
    #[serde(default)]
    pub direct: Option<DirectConfig>,
}

/// qBittorrent Web API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub save_path: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// SABnzbd API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SabnzbdConfig {
    /// Base URL (e.g., "http://localhost:8085")
    pub url: String,
    pub api_key: String,
    /// Category used when the result carries no label.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Direct HTTP download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectConfig {
    pub download_dir: PathBuf,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Search pass configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Pause between wanted items in a batch search.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: default_rate_limit_ms(),
        }
    }
}

fn default_rate_limit_ms() -> u64 {
    1000
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub matching: MatchingConfig,
    pub policies: PoliciesConfig,
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qbittorrent_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sabnzbd_url: Option<String>,
    pub sabnzbd_api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_download_dir: Option<PathBuf>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let clients = &config.download_clients;
        Self {
            matching: config.matching.clone(),
            policies: config.policies.clone(),
            database: config.database.clone(),
            search: config.search.clone(),
            qbittorrent_url: clients.qbittorrent.as_ref().map(|q| q.url.clone()),
            sabnzbd_url: clients.sabnzbd.as_ref().map(|s| s.url.clone()),
            sabnzbd_api_key_configured: clients
                .sabnzbd
                .as_ref()
                .is_some_and(|s| !s.api_key.is_empty()),
            direct_download_dir: clients.direct.as_ref().map(|d| d.download_dir.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.matching.match_ratio, 80);
        assert!(config.matching.blacklist_failed);
        assert!(!config.matching.blacklist_processed);
        assert_eq!(config.matching.min_seeders, 0);
        assert_eq!(config.database.path, PathBuf::from("bookhound.db"));
        assert_eq!(config.database.claim_timeout_secs, 3600);
        assert_eq!(config.search.rate_limit_ms, 1000);
        assert!(config.download_clients.qbittorrent.is_none());
    }

    #[test]
    fn test_default_preferred_formats() {
        let policies = PoliciesConfig::default();
        assert_eq!(
            policies.for_kind(MediaKind::EBook).preferred_formats,
            vec!["epub", "mobi", "pdf"]
        );
        assert_eq!(
            policies.for_kind(MediaKind::AudioBook).preferred_formats,
            vec!["mp3", "m4b", "flac"]
        );
        assert_eq!(policies.for_kind(MediaKind::Magazine).preferred_formats, vec!["pdf"]);
        assert_eq!(
            policies.for_kind(MediaKind::Comic).preferred_formats,
            vec!["cbr", "cbz"]
        );
    }

    #[test]
    fn test_deserialize_policy_override() {
        let toml = r#"
[matching]
match_ratio = 60
blacklist_processed = true

[policies.ebook]
max_size_mb = 50
banned_words = ["sample", "excerpt"]
preferred_formats = ["azw3", "epub"]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.matching.match_ratio, 60);
        assert!(config.matching.blacklist_failed);
        assert!(config.matching.blacklist_processed);

        let ebook = config.policies.for_kind(MediaKind::EBook);
        assert_eq!(ebook.max_size_mb, 50.0);
        assert_eq!(ebook.min_size_mb, 0.0);
        assert_eq!(ebook.banned_words, vec!["sample", "excerpt"]);
        assert!(ebook.is_format("AZW3"));
        assert!(!ebook.is_format("mobi"));

        // Untouched kinds keep their defaults
        assert_eq!(
            config.policies.for_kind(MediaKind::Comic).preferred_formats,
            vec!["cbr", "cbz"]
        );
    }

    #[test]
    fn test_deserialize_download_clients() {
        let toml = r#"
[download_clients.qbittorrent]
url = "http://localhost:8080"
username = "admin"
password = "secret"

[download_clients.sabnzbd]
url = "http://localhost:8085"
api_key = "key"
category = "books"

[download_clients.direct]
download_dir = "/downloads"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let qb = config.download_clients.qbittorrent.unwrap();
        assert_eq!(qb.url, "http://localhost:8080");
        assert_eq!(qb.timeout_secs, 30);
        let sab = config.download_clients.sabnzbd.unwrap();
        assert_eq!(sab.category.as_deref(), Some("books"));
        let direct = config.download_clients.direct.unwrap();
        assert_eq!(direct.download_dir, PathBuf::from("/downloads"));
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let toml = r#"
[download_clients.sabnzbd]
url = "http://localhost:8085"
api_key = "super-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.sabnzbd_api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("super-secret"));
        assert!(json.contains("http://localhost:8085"));
    }
}
