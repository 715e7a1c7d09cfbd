//! Ledger traits and record types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::searcher::{CandidateResult, DeliveryMode};
use crate::wanted::{MediaKind, WantedItem};

/// Error type for ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Database(e.to_string())
    }
}

/// Lifecycle of a ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadStatus {
    /// Claimed for submission, not yet confirmed by a backend.
    Matched,
    Snatched,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Matched => "Matched",
            DownloadStatus::Snatched => "Snatched",
            DownloadStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Matched" => Ok(DownloadStatus::Matched),
            "Snatched" => Ok(DownloadStatus::Snatched),
            "Failed" => Ok(DownloadStatus::Failed),
            other => Err(format!("unknown download status: {}", other)),
        }
    }
}

/// Status of a catalog item for one media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    Wanted,
    Snatched,
    Have,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Wanted => "Wanted",
            ItemStatus::Snatched => "Snatched",
            ItemStatus::Have => "Have",
            ItemStatus::Skipped => "Skipped",
        }
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Wanted" => Ok(ItemStatus::Wanted),
            "Snatched" => Ok(ItemStatus::Snatched),
            "Have" => Ok(ItemStatus::Have),
            "Skipped" => Ok(ItemStatus::Skipped),
            other => Err(format!("unknown item status: {}", other)),
        }
    }
}

/// One attempt to download a result for a wanted item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub book_id: String,
    pub media_kind: MediaKind,
    pub provider: String,
    pub url: String,
    pub title: String,
    pub delivery_mode: DeliveryMode,
    pub size_mb: f64,
    pub status: DownloadStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Backend-assigned id, set once snatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<String>,
    /// Backend that accepted the download.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl_result: Option<String>,
}

impl DownloadRecord {
    /// A fresh Matched row for an accepted candidate.
    pub fn matched(candidate: &CandidateResult, wanted: &WantedItem) -> Self {
        Self {
            book_id: wanted.book_id.clone(),
            media_kind: wanted.media_kind,
            provider: candidate.ledger_provider().to_string(),
            url: candidate.url.clone(),
            title: candidate.title.clone(),
            delivery_mode: candidate.delivery_mode,
            size_mb: candidate.size_mb(),
            status: DownloadStatus::Matched,
            requested_at: Utc::now(),
            label: candidate.label.clone(),
            download_id: None,
            source: None,
            dl_result: None,
        }
    }

    /// Title part of the row key. IRC results all share the bot command as
    /// their url, so the title tells them apart; other rows key on url alone.
    pub fn key_title(&self) -> &str {
        match self.delivery_mode {
            DeliveryMode::Irc => &self.title,
            _ => "",
        }
    }
}

/// Download history, keyed by result url (plus title for IRC).
///
/// Implementations must make [`claim`](DownloadLedger::claim) atomic: at
/// most one Matched or Snatched row may exist per book and media kind.
pub trait DownloadLedger: Send + Sync {
    /// Row for a url. IRC urls are only unique together with the title.
    fn find_by_url(
        &self,
        url: &str,
        title: Option<&str>,
    ) -> Result<Option<DownloadRecord>, LedgerError>;

    /// All rows a provider produced for a title.
    fn find_by_provider_title(
        &self,
        provider: &str,
        title: &str,
    ) -> Result<Vec<DownloadRecord>, LedgerError>;

    fn is_snatched(&self, book_id: &str, kind: MediaKind) -> Result<bool, LedgerError>;

    /// Insert or revive the Matched row for the record's key.
    ///
    /// Returns `false` without writing when the row is already Matched or
    /// Snatched, or another row holds the claim for the same book and kind.
    /// A Matched row older than the store's claim timeout no longer holds
    /// its claim.
    fn claim(&self, record: &DownloadRecord) -> Result<bool, LedgerError>;

    /// `title` only narrows the match for IRC rows.
    fn mark_snatched(
        &self,
        url: &str,
        title: &str,
        download_id: &str,
        source: &str,
    ) -> Result<(), LedgerError>;

    fn mark_failed(&self, url: &str, title: &str, reason: &str) -> Result<(), LedgerError>;

    fn list_for_book(&self, book_id: &str) -> Result<Vec<DownloadRecord>, LedgerError>;
}

/// Per-kind status kept on the catalog item itself. It can drift from the
/// ledger, so dispatch consults both.
pub trait CatalogStatus: Send + Sync {
    fn item_status(&self, item_id: &str, kind: MediaKind)
        -> Result<Option<ItemStatus>, LedgerError>;

    fn is_item_snatched(&self, item_id: &str, kind: MediaKind) -> Result<bool, LedgerError> {
        Ok(self.item_status(item_id, kind)? == Some(ItemStatus::Snatched))
    }

    fn mark_item_snatched(&self, item_id: &str, kind: MediaKind) -> Result<(), LedgerError> {
        self.set_item_status(item_id, kind, ItemStatus::Snatched)
    }

    fn set_item_status(
        &self,
        item_id: &str,
        kind: MediaKind,
        status: ItemStatus,
    ) -> Result<(), LedgerError>;
}
