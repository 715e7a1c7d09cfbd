//! The item being searched for.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of media a wanted item (and a download) belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[serde(rename = "ebook")]
    EBook,
    #[serde(rename = "audiobook")]
    AudioBook,
    Magazine,
    Comic,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [
        MediaKind::EBook,
        MediaKind::AudioBook,
        MediaKind::Magazine,
        MediaKind::Comic,
    ];

    /// Single-letter flag used by RSS wishlists to advertise supported kinds.
    pub fn flag(self) -> char {
        match self {
            MediaKind::EBook => 'E',
            MediaKind::AudioBook => 'A',
            MediaKind::Magazine => 'M',
            MediaKind::Comic => 'C',
        }
    }

    /// Label stored in the download ledger.
    pub fn label(self) -> &'static str {
        match self {
            MediaKind::EBook => "eBook",
            MediaKind::AudioBook => "AudioBook",
            MediaKind::Magazine => "magazine",
            MediaKind::Comic => "comic",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| format!("unknown media kind: {}", s))
    }
}

/// A catalog entry the user wants a copy of.
///
/// Built once per search pass and never mutated while candidates are scored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WantedItem {
    /// Opaque catalog id.
    pub book_id: String,
    pub author_name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub media_kind: MediaKind,
    /// Display phrase used for provider queries and the word-count penalty.
    pub search_term: String,
}

impl WantedItem {
    pub fn new(
        book_id: impl Into<String>,
        author_name: impl Into<String>,
        title: impl Into<String>,
        subtitle: Option<String>,
        media_kind: MediaKind,
    ) -> Self {
        let author_name = author_name.into();
        let title = title.into();
        let subtitle = subtitle.filter(|s| !s.trim().is_empty());

        let mut search_term = format!("{} {}", author_name.trim(), title.trim());
        if let Some(sub) = &subtitle {
            search_term.push_str(": ");
            search_term.push_str(sub.trim());
        }

        Self {
            book_id: book_id.into(),
            author_name,
            title,
            subtitle,
            media_kind,
            search_term,
        }
    }

    /// Override the derived search phrase.
    pub fn with_search_term(mut self, search_term: impl Into<String>) -> Self {
        self.search_term = search_term.into();
        self
    }
}
