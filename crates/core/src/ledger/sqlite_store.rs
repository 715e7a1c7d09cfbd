//! SQLite-backed ledger and catalog status.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, warn};

use super::{CatalogStatus, DownloadLedger, DownloadRecord, DownloadStatus, ItemStatus, LedgerError};
use crate::config::DatabaseConfig;
use crate::searcher::DeliveryMode;
use crate::wanted::MediaKind;

/// How long an unfinished Matched row holds its claim by default.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(3600);

const RECORD_COLUMNS: &str = "book_id, media_kind, provider, url, title, delivery_mode, size_mb, status, requested_at, label, download_id, source, dl_result";

/// SQLite-backed ledger.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
    claim_timeout: Option<chrono::Duration>,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at `path`.
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open the ledger described by the `[database]` config section.
    pub fn open(config: &DatabaseConfig) -> Result<Self, LedgerError> {
        Ok(Self::new(&config.path)?
            .with_claim_timeout(Duration::from_secs(config.claim_timeout_secs)))
    }

    /// Create an in-memory ledger (useful for testing).
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Age after which a Matched row that never reached Snatched or Failed
    /// stops blocking new claims. Zero keeps such rows forever.
    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = if timeout.is_zero() {
            None
        } else {
            chrono::Duration::from_std(timeout).ok()
        };
        self
    }

    fn from_connection(conn: Connection) -> Self {
        let ledger = Self {
            conn: Mutex::new(conn),
            claim_timeout: None,
        };
        ledger.with_claim_timeout(DEFAULT_CLAIM_TIMEOUT)
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LedgerError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS wanted (
                url TEXT NOT NULL,
                key_title TEXT NOT NULL DEFAULT '',
                book_id TEXT NOT NULL,
                media_kind TEXT NOT NULL,
                provider TEXT NOT NULL,
                title TEXT NOT NULL,
                delivery_mode TEXT NOT NULL,
                size_mb REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                requested_at TEXT NOT NULL,
                label TEXT,
                download_id TEXT,
                source TEXT,
                dl_result TEXT,
                PRIMARY KEY (url, key_title)
            );

            CREATE INDEX IF NOT EXISTS idx_wanted_book ON wanted(book_id, media_kind);
            CREATE INDEX IF NOT EXISTS idx_wanted_provider_title ON wanted(provider, title);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_wanted_active_claim
                ON wanted(book_id, media_kind)
                WHERE status IN ('Matched', 'Snatched');

            CREATE TABLE IF NOT EXISTS catalog_status (
                item_id TEXT NOT NULL,
                media_kind TEXT NOT NULL,
                status TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (item_id, media_kind)
            );
            "#,
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Database("ledger connection lock poisoned".to_string()))
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DownloadRecord> {
        let media_kind: String = row.get(1)?;
        let url: String = row.get(3)?;
        let delivery_mode: String = row.get(5)?;
        let status: String = row.get(7)?;
        let requested_at: String = row.get(8)?;

        let media_kind = MediaKind::from_label(&media_kind)
            .ok_or_else(|| conversion_error(1, format!("unknown media kind: {}", media_kind)))?;
        let delivery_mode = DeliveryMode::from_provider(&delivery_mode, &url)
            .ok_or_else(|| conversion_error(5, format!("unknown delivery mode: {}", delivery_mode)))?;
        let status = status
            .parse::<DownloadStatus>()
            .map_err(|e| conversion_error(7, e))?;

        // Timestamps are always written by this store in RFC 3339
        let requested_at = DateTime::parse_from_rfc3339(&requested_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(DownloadRecord {
            book_id: row.get(0)?,
            media_kind,
            provider: row.get(2)?,
            url,
            title: row.get(4)?,
            delivery_mode,
            size_mb: row.get(6)?,
            status,
            requested_at,
            label: row.get(9)?,
            download_id: row.get(10)?,
            source: row.get(11)?,
            dl_result: row.get(12)?,
        })
    }

    fn update_status(
        &self,
        url: &str,
        title: &str,
        status: DownloadStatus,
        download_id: Option<&str>,
        source: Option<&str>,
        dl_result: Option<&str>,
    ) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            r#"
            UPDATE wanted
            SET status = ?1, download_id = COALESCE(?2, download_id), source = COALESCE(?3, source), dl_result = ?4
            WHERE url = ?5 AND (key_title = '' OR key_title = ?6)
            "#,
            params![status.as_str(), download_id, source, dl_result, url, title],
        )?;

        if changed == 0 {
            return Err(LedgerError::NotFound(url.to_string()));
        }
        Ok(())
    }
}

/// Fixed-width UTC timestamps so that text order is time order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

impl DownloadLedger for SqliteLedger {
    fn find_by_url(
        &self,
        url: &str,
        title: Option<&str>,
    ) -> Result<Option<DownloadRecord>, LedgerError> {
        let conn = self.lock()?;

        let record = match title {
            Some(title) => conn
                .query_row(
                    &format!("SELECT {} FROM wanted WHERE url = ? AND title = ?", RECORD_COLUMNS),
                    params![url, title],
                    Self::row_to_record,
                )
                .optional()?,
            None => conn
                .query_row(
                    &format!("SELECT {} FROM wanted WHERE url = ?", RECORD_COLUMNS),
                    params![url],
                    Self::row_to_record,
                )
                .optional()?,
        };

        Ok(record)
    }

    fn find_by_provider_title(
        &self,
        provider: &str,
        title: &str,
    ) -> Result<Vec<DownloadRecord>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wanted WHERE provider = ? AND title = ? ORDER BY requested_at ASC",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map(params![provider, title], Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn is_snatched(&self, book_id: &str, kind: MediaKind) -> Result<bool, LedgerError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM wanted WHERE book_id = ? AND media_kind = ? AND status = 'Snatched' LIMIT 1",
                params![book_id, kind.label()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn claim(&self, record: &DownloadRecord) -> Result<bool, LedgerError> {
        let conn = self.lock()?;

        if let Some(timeout) = self.claim_timeout {
            let cutoff = timestamp(&(Utc::now() - timeout));
            let expired = conn.execute(
                "DELETE FROM wanted WHERE book_id = ? AND media_kind = ? AND status = 'Matched' AND requested_at < ?",
                params![record.book_id, record.media_kind.label(), cutoff],
            )?;
            if expired > 0 {
                warn!(
                    book_id = %record.book_id,
                    kind = %record.media_kind,
                    "Dropped {} stale claim(s) that never reached a download client",
                    expired
                );
            }
        }

        // A row already Matched or Snatched is left alone; a Failed one is
        // revived. The partial unique index rejects a second active claim
        // for the same book and kind.
        let result = conn.execute(
            r#"
            INSERT INTO wanted (book_id, media_kind, provider, url, key_title, title, delivery_mode, size_mb, status, requested_at, label, download_id, source, dl_result)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'Matched', ?9, ?10, NULL, NULL, NULL)
            ON CONFLICT(url, key_title) DO UPDATE SET
                book_id = excluded.book_id,
                media_kind = excluded.media_kind,
                provider = excluded.provider,
                title = excluded.title,
                delivery_mode = excluded.delivery_mode,
                size_mb = excluded.size_mb,
                status = 'Matched',
                requested_at = excluded.requested_at,
                label = excluded.label,
                download_id = NULL,
                source = NULL,
                dl_result = NULL
            WHERE wanted.status = 'Failed'
            "#,
            params![
                record.book_id,
                record.media_kind.label(),
                record.provider,
                record.url,
                record.key_title(),
                record.title,
                record.delivery_mode.as_str(),
                record.size_mb,
                timestamp(&record.requested_at),
                record.label,
            ],
        );

        match result {
            Ok(0) => {
                debug!(url = %record.url, title = %record.title, "Claim skipped, result already active");
                Ok(false)
            }
            Ok(_) => Ok(true),
            Err(e) if is_constraint_violation(&e) => {
                debug!(book_id = %record.book_id, kind = %record.media_kind, "Claim conflicts with an active claim");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn mark_snatched(
        &self,
        url: &str,
        title: &str,
        download_id: &str,
        source: &str,
    ) -> Result<(), LedgerError> {
        self.update_status(
            url,
            title,
            DownloadStatus::Snatched,
            Some(download_id),
            Some(source),
            None,
        )
    }

    fn mark_failed(&self, url: &str, title: &str, reason: &str) -> Result<(), LedgerError> {
        self.update_status(url, title, DownloadStatus::Failed, None, None, Some(reason))
    }

    fn list_for_book(&self, book_id: &str) -> Result<Vec<DownloadRecord>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wanted WHERE book_id = ? ORDER BY requested_at ASC",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map(params![book_id], Self::row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

impl CatalogStatus for SqliteLedger {
    fn item_status(
        &self,
        item_id: &str,
        kind: MediaKind,
    ) -> Result<Option<ItemStatus>, LedgerError> {
        let conn = self.lock()?;
        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM catalog_status WHERE item_id = ? AND media_kind = ?",
                params![item_id, kind.label()],
                |row| row.get(0),
            )
            .optional()?;

        status
            .map(|s| s.parse::<ItemStatus>().map_err(LedgerError::Database))
            .transpose()
    }

    fn set_item_status(
        &self,
        item_id: &str,
        kind: MediaKind,
        status: ItemStatus,
    ) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO catalog_status (item_id, media_kind, status, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(item_id, media_kind) DO UPDATE SET
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
            params![item_id, kind.label(), status.as_str(), timestamp(&Utc::now())],
        )?;
        Ok(())
    }
}
