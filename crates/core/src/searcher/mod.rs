//! Provider search results.
//!
//! Providers return loosely-typed result maps whose keys differ per family.
//! [`ingest`] turns them into [`CandidateResult`]s; the [`ResultProvider`]
//! trait is the seam behind which the actual scraping lives.

pub mod ingest;
mod types;

pub use ingest::{candidate_from_raw, candidates_from_raw, normalize_date, IngestError};
pub use types::*;
