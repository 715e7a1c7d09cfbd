//! Conversion of raw provider result maps into [`CandidateResult`]s.
//!
//! NZB indexers report `nzbtitle`, `nzburl`, `nzbsize`, `nzbdate`, `nzbmode`
//! and `nzbprov`. Every other family uses the `tor_*` keys, with a few
//! optional extras (`tor_feed`, `types`, `priority`, `seeders`, `label`,
//! `booksearch`, `dispname`).

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{CandidateResult, DeliveryMode, MediaTypeFlags, SearchSource};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unknown delivery mode: {0}")]
    UnknownMode(String),
}

struct KeyFamily {
    title: &'static str,
    url: &'static str,
    size: &'static str,
    date: &'static str,
    mode: &'static str,
    provider: &'static str,
}

const NZB_KEYS: KeyFamily = KeyFamily {
    title: "nzbtitle",
    url: "nzburl",
    size: "nzbsize",
    date: "nzbdate",
    mode: "nzbmode",
    provider: "nzbprov",
};

const TOR_KEYS: KeyFamily = KeyFamily {
    title: "tor_title",
    url: "tor_url",
    size: "tor_size",
    date: "tor_date",
    mode: "tor_type",
    provider: "tor_prov",
};

/// Build a candidate from one raw provider result.
///
/// A missing url is kept as an empty string so the result is rejected (and
/// logged) by the filter rather than silently dropped here.
pub fn candidate_from_raw(
    source: SearchSource,
    raw: &Map<String, Value>,
) -> Result<CandidateResult, IngestError> {
    let keys = match source {
        SearchSource::Nzb => &NZB_KEYS,
        _ => &TOR_KEYS,
    };

    let title = get_str(raw, keys.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(IngestError::MissingField(keys.title))?;

    let url = get_str(raw, keys.url).unwrap_or_default().trim().to_string();

    let mode_str = get_str(raw, keys.mode).unwrap_or_else(|| default_mode(source).to_string());
    let delivery_mode = DeliveryMode::from_provider(&mode_str, &url)
        .ok_or_else(|| IngestError::UnknownMode(mode_str.clone()))?;

    let provider = get_str(raw, "dispname")
        .filter(|p| !p.is_empty())
        .or_else(|| get_str(raw, keys.provider))
        .unwrap_or_else(|| source.as_str().to_string());

    let media_types = match source {
        SearchSource::Rss => get_str(raw, "types")
            .map(|t| MediaTypeFlags::parse(&t))
            .unwrap_or_else(MediaTypeFlags::none),
        _ => MediaTypeFlags::all(),
    };

    Ok(CandidateResult {
        title,
        url,
        provider,
        size_bytes: get_u64(raw, keys.size).unwrap_or(0),
        published: get_str(raw, keys.date).and_then(|d| normalize_date(&d)),
        delivery_mode,
        source,
        media_types,
        priority: get_i64(raw, "priority")
            .map(|p| p.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
            .unwrap_or(0),
        seeders: get_u64(raw, "seeders").map(|s| s.min(u32::MAX as u64) as u32),
        label: get_str(raw, "label").filter(|l| !l.is_empty()),
        title_only: get_str(raw, "booksearch")
            .map(|b| b.eq_ignore_ascii_case("bibliotik"))
            .unwrap_or(false),
        feed: get_str(raw, "tor_feed").filter(|f| !f.is_empty()),
    })
}

/// Convert a provider's result list, skipping malformed entries and
/// repeated results (the first listing wins).
///
/// Results repeat when they share a url. IRC results all carry the bot
/// command as their url, so there the title must match as well.
pub fn candidates_from_raw(source: SearchSource, raw: &[Value]) -> Vec<CandidateResult> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut candidates = Vec::with_capacity(raw.len());

    for entry in raw {
        let Some(map) = entry.as_object() else {
            warn!(source = source.as_str(), "Skipping non-object search result");
            continue;
        };

        match candidate_from_raw(source, map) {
            Ok(candidate) => {
                if !candidate.url.is_empty() && !seen.insert(dedup_key(&candidate)) {
                    debug!(url = %candidate.url, title = %candidate.title, "Skipping duplicate result");
                    continue;
                }
                candidates.push(candidate);
            }
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "Skipping malformed search result");
            }
        }
    }

    candidates
}

/// Normalize a provider date to `YYYY-MM-DD HH:MM:SS`.
pub fn normalize_date(date_str: &str) -> Option<String> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(date_str)
        .or_else(|_| DateTime::parse_from_rfc2822(date_str))
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(date_str, DATE_FORMAT).ok())
        .or_else(|| NaiveDateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| {
            NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|dt| dt.format(DATE_FORMAT).to_string())
}

fn dedup_key(candidate: &CandidateResult) -> (String, String) {
    let title = match candidate.source {
        SearchSource::Irc => candidate.title.clone(),
        _ => String::new(),
    };
    (candidate.url.clone(), title)
}

fn default_mode(source: SearchSource) -> &'static str {
    match source {
        SearchSource::Nzb => "nzb",
        SearchSource::Torrent | SearchSource::Rss => "torznab",
        SearchSource::Direct => "direct",
        SearchSource::Irc => "irc",
    }
}

fn get_str(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn get_u64(raw: &Map<String, Value>, key: &str) -> Option<u64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
        }
        _ => None,
    }
}

fn get_i64(raw: &Map<String, Value>, key: &str) -> Option<i64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
