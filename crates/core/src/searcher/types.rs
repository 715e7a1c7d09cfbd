//! Types for provider search results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::wanted::{MediaKind, WantedItem};

/// Size assumed for results whose provider did not report one.
pub const UNKNOWN_SIZE_BYTES: u64 = 1000;

/// How a result is handed to a download backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Nzb,
    Torrent,
    Magnet,
    Direct,
    Irc,
}

impl DeliveryMode {
    /// Parse a provider mode string. `torznab` results are torrents unless
    /// the url is a magnet link.
    pub fn from_provider(mode: &str, url: &str) -> Option<Self> {
        match mode.trim().to_lowercase().as_str() {
            "nzb" => Some(DeliveryMode::Nzb),
            "torznab" => {
                if url.starts_with("magnet:") {
                    Some(DeliveryMode::Magnet)
                } else {
                    Some(DeliveryMode::Torrent)
                }
            }
            "torrent" => Some(DeliveryMode::Torrent),
            "magnet" => Some(DeliveryMode::Magnet),
            "direct" => Some(DeliveryMode::Direct),
            "irc" => Some(DeliveryMode::Irc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Nzb => "nzb",
            DeliveryMode::Torrent => "torrent",
            DeliveryMode::Magnet => "magnet",
            DeliveryMode::Direct => "direct",
            DeliveryMode::Irc => "irc",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider family that produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Nzb,
    Torrent,
    Rss,
    Direct,
    Irc,
}

impl SearchSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchSource::Nzb => "nzb",
            SearchSource::Torrent => "torrent",
            SearchSource::Rss => "rss",
            SearchSource::Direct => "direct",
            SearchSource::Irc => "irc",
        }
    }
}

/// Set of media kinds a result can satisfy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaTypeFlags(u8);

impl MediaTypeFlags {
    pub fn all() -> Self {
        Self::from_kinds(&MediaKind::ALL)
    }

    pub fn none() -> Self {
        Self(0)
    }

    pub fn from_kinds(kinds: &[MediaKind]) -> Self {
        Self(kinds.iter().fold(0, |bits, kind| bits | Self::bit(*kind)))
    }

    /// Parse an RSS `types` string such as `"EA"`. Unknown letters are ignored.
    pub fn parse(flags: &str) -> Self {
        let kinds: Vec<MediaKind> = MediaKind::ALL
            .into_iter()
            .filter(|kind| flags.chars().any(|c| c.eq_ignore_ascii_case(&kind.flag())))
            .collect();
        Self::from_kinds(&kinds)
    }

    pub fn contains(self, kind: MediaKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    fn bit(kind: MediaKind) -> u8 {
        match kind {
            MediaKind::EBook => 1,
            MediaKind::AudioBook => 2,
            MediaKind::Magazine => 4,
            MediaKind::Comic => 8,
        }
    }
}

impl Default for MediaTypeFlags {
    fn default() -> Self {
        Self::all()
    }
}

/// One search result, normalized across provider families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResult {
    pub title: String,
    /// Empty when the provider returned no link.
    pub url: String,
    /// Provider display name.
    pub provider: String,
    /// Size in bytes, 0 if unknown.
    pub size_bytes: u64,
    /// Normalized to `YYYY-MM-DD HH:MM:SS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    pub delivery_mode: DeliveryMode,
    pub source: SearchSource,
    #[serde(default)]
    pub media_types: MediaTypeFlags,
    /// Provider priority, higher wins ties.
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeders: Option<u32>,
    /// Download client category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Provider titles never include the author.
    #[serde(default)]
    pub title_only: bool,
    /// IRC channel or feed that served the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed: Option<String>,
}

impl CandidateResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        provider: impl Into<String>,
        delivery_mode: DeliveryMode,
        source: SearchSource,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            provider: provider.into(),
            size_bytes: 0,
            published: None,
            delivery_mode,
            source,
            media_types: MediaTypeFlags::all(),
            priority: 0,
            seeders: None,
            label: None,
            title_only: false,
            feed: None,
        }
    }

    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_media_types(mut self, media_types: MediaTypeFlags) -> Self {
        self.media_types = media_types;
        self
    }

    pub fn size_reported(&self) -> bool {
        self.size_bytes > 0
    }

    pub fn effective_size_bytes(&self) -> u64 {
        if self.size_bytes == 0 {
            UNKNOWN_SIZE_BYTES
        } else {
            self.size_bytes
        }
    }

    /// Effective size in megabytes, rounded to two decimals.
    pub fn size_mb(&self) -> f64 {
        let mb = self.effective_size_bytes() as f64 / 1_048_576.0;
        (mb * 100.0).round() / 100.0
    }

    /// Provider name recorded in the ledger. IRC results are keyed by feed.
    pub fn ledger_provider(&self) -> &str {
        match (&self.delivery_mode, &self.feed) {
            (DeliveryMode::Irc, Some(feed)) => feed,
            _ => &self.provider,
        }
    }
}

/// Provider query strategy, tried in order until one yields an accepted match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchTier {
    /// Author and full title.
    Exact,
    /// Author and title with parenthesised details removed.
    Short,
    /// Free-text search term.
    General,
    /// Free-text search term with parenthesised details removed.
    ShortGeneral,
    /// Title alone.
    TitleOnly,
}

impl SearchTier {
    pub fn is_short(self) -> bool {
        matches!(self, SearchTier::Short | SearchTier::ShortGeneral)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchTier::Exact => "exact",
            SearchTier::Short => "short",
            SearchTier::General => "general",
            SearchTier::ShortGeneral => "shortgeneral",
            SearchTier::TitleOnly => "title",
        }
    }
}

impl fmt::Display for SearchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during provider searches.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Provider connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Provider API error: {0}")]
    ApiError(String),

    #[error("Rate limited by provider {provider}, retry in {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A search backend. Scraping and protocol details live behind this trait.
#[async_trait]
pub trait ResultProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Family the results belong to.
    fn source(&self) -> SearchSource;

    async fn search(
        &self,
        wanted: &WantedItem,
        tier: SearchTier,
    ) -> Result<Vec<CandidateResult>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_mode_from_provider() {
        assert_eq!(DeliveryMode::from_provider("nzb", "http://x"), Some(DeliveryMode::Nzb));
        assert_eq!(
            DeliveryMode::from_provider("torznab", "magnet:?xt=urn:btih:abc"),
            Some(DeliveryMode::Magnet)
        );
        assert_eq!(
            DeliveryMode::from_provider("torznab", "http://x/file.torrent"),
            Some(DeliveryMode::Torrent)
        );
        assert_eq!(DeliveryMode::from_provider("IRC", "!bot"), Some(DeliveryMode::Irc));
        assert_eq!(DeliveryMode::from_provider("usenet2", "http://x"), None);
    }

    #[test]
    fn test_media_type_flags() {
        let flags = MediaTypeFlags::parse("EA");
        assert!(flags.contains(MediaKind::EBook));
        assert!(flags.contains(MediaKind::AudioBook));
        assert!(!flags.contains(MediaKind::Magazine));
        assert!(!MediaTypeFlags::parse("").contains(MediaKind::EBook));
        assert!(MediaTypeFlags::parse("c").contains(MediaKind::Comic));
        assert!(MediaTypeFlags::all().contains(MediaKind::Comic));
        assert!(!MediaTypeFlags::none().contains(MediaKind::EBook));
    }

    #[test]
    fn test_effective_size_defaults_when_unknown() {
        let c = CandidateResult::new("t", "http://x", "p", DeliveryMode::Direct, SearchSource::Direct);
        assert!(!c.size_reported());
        assert_eq!(c.effective_size_bytes(), 1000);
        assert_eq!(c.size_mb(), 0.0);

        let c = c.with_size_bytes(24 * 1_048_576);
        assert!(c.size_reported());
        assert_eq!(c.size_mb(), 24.0);
    }

    #[test]
    fn test_size_mb_rounds_to_two_decimals() {
        let c = CandidateResult::new("t", "http://x", "p", DeliveryMode::Nzb, SearchSource::Nzb)
            .with_size_bytes(1_500_000);
        assert_eq!(c.size_mb(), 1.43);
    }

    #[test]
    fn test_ledger_provider_uses_feed_for_irc() {
        let mut c = CandidateResult::new("t", "!bot file", "irc", DeliveryMode::Irc, SearchSource::Irc);
        assert_eq!(c.ledger_provider(), "irc");
        c.feed = Some("#ebooks".to_string());
        assert_eq!(c.ledger_provider(), "#ebooks");
    }

    #[test]
    fn test_candidate_serialization_defaults() {
        let json = r#"{
            "title": "Book",
            "url": "http://x",
            "provider": "p",
            "size_bytes": 0,
            "delivery_mode": "nzb",
            "source": "nzb"
        }"#;
        let parsed: CandidateResult = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.priority, 0);
        assert!(parsed.media_types.contains(MediaKind::Magazine));
        assert!(!parsed.title_only);
    }

    #[test]
    fn test_search_tier_is_short() {
        assert!(SearchTier::Short.is_short());
        assert!(SearchTier::ShortGeneral.is_short());
        assert!(!SearchTier::Exact.is_short());
    }
}
