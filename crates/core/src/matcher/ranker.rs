//! Fuzzy scoring of candidates against a wanted item.
//!
//! Scores candidates by:
//! 1. Author overlap (token-set ratio against the whole candidate title)
//! 2. Title overlap with the author removed, less one point per word of
//!    difference from the search term
//! 3. One point off per leftover word that is neither author, title nor a
//!    known format
//! 4. A bonus for preferred formats, larger for earlier entries

use std::sync::Arc;

use tracing::{info, trace};

use crate::config::{MatchingConfig, MediaPolicy, PoliciesConfig};
use crate::fuzzy::token_set_ratio;
use crate::ledger::{DownloadLedger, LedgerError};
use crate::metrics;
use crate::searcher::{CandidateResult, SearchSource, SearchTier};
use crate::text::{comparable, only_punctuation, short_title, strip_trailing_tags, word_count, word_list};
use crate::wanted::WantedItem;

use super::filter::RejectionFilter;
use super::types::{RankOutcome, ScoredCandidate};

/// The wanted item's strings in comparable form, computed once per ranking.
struct WantedTerms {
    author: String,
    title: String,
    author_words: Vec<String>,
    title_words: Vec<String>,
    search_words: i32,
}

impl WantedTerms {
    fn new(wanted: &WantedItem, tier: SearchTier) -> Self {
        let author = comparable(&wanted.author_name);

        let raw_title = if tier.is_short() {
            short_title(&wanted.title)
        } else {
            wanted.title.as_str()
        };
        let mut title = comparable(raw_title);

        if title.eq_ignore_ascii_case(&author) {
            // Titles that just repeat the author name (biographies,
            // collected works) are identified by their subtitle
            if let Some(subtitle) = &wanted.subtitle {
                title = comparable(subtitle);
            }
        } else if let Some(rest) = strip_word_prefix(&title, &author) {
            if !rest.is_empty() {
                title = rest.to_string();
            }
        }

        Self {
            author_words: word_list(&author),
            title_words: word_list(&title),
            search_words: word_count(&comparable(&wanted.search_term)) as i32,
            author,
            title,
        }
    }
}

/// Scores and picks the best candidate from one result pool.
pub struct CandidateRanker {
    filter: RejectionFilter,
    match_ratio: i32,
    policies: PoliciesConfig,
}

impl CandidateRanker {
    pub fn new(
        matching: MatchingConfig,
        policies: PoliciesConfig,
        ledger: Arc<dyn DownloadLedger>,
    ) -> Self {
        let match_ratio = matching.match_ratio;
        Self {
            filter: RejectionFilter::new(matching, policies.clone(), ledger),
            match_ratio,
            policies,
        }
    }

    pub fn match_ratio(&self) -> i32 {
        self.match_ratio
    }

    /// Filter and score every candidate, and pick the winner.
    ///
    /// The winner has the highest `(composite_score, priority)`; among equal
    /// pairs the earliest candidate wins. Only ledger failures are errors.
    pub fn rank(
        &self,
        candidates: Vec<CandidateResult>,
        wanted: &WantedItem,
        tier: SearchTier,
    ) -> Result<RankOutcome, LedgerError> {
        let terms = WantedTerms::new(wanted, tier);
        let policy = self.policies.for_kind(wanted.media_kind);

        let mut scored = Vec::with_capacity(candidates.len());
        let mut best: Option<usize> = None;

        for candidate in candidates {
            let cand_title = comparable(&candidate.title);

            if let Some(reason) = self.filter.check(&candidate, wanted, &cand_title)? {
                scored.push(ScoredCandidate::rejected(candidate, reason));
                continue;
            }

            let entry = self.score(candidate, &cand_title, &terms, policy);

            let beats_best = match best {
                None => true,
                Some(idx) => {
                    let current: &ScoredCandidate = &scored[idx];
                    (entry.composite_score, entry.candidate.priority)
                        > (current.composite_score, current.candidate.priority)
                }
            };
            if beats_best {
                best = Some(scored.len());
            }
            scored.push(entry);
        }

        let winner = best.map(|idx| scored[idx].clone());

        if let Some(w) = &winner {
            let label = if w.composite_score >= self.match_ratio {
                "Best match"
            } else {
                "Nearest match"
            };
            info!(
                "{} ({}%): {} using {} search",
                label, w.composite_score, w.candidate.title, tier
            );
            metrics::BEST_MATCH_SCORE
                .with_label_values(&[wanted.media_kind.label()])
                .observe(w.composite_score as f64);
        }

        Ok(RankOutcome { winner, scored })
    }

    fn score(
        &self,
        candidate: CandidateResult,
        cand_title: &str,
        terms: &WantedTerms,
        policy: &MediaPolicy,
    ) -> ScoredCandidate {
        let author_score = if candidate.title_only {
            100
        } else {
            token_set_ratio(&terms.author, cand_title) as i32
        };

        let bare = bare_title(cand_title, &terms.author);
        let word_diff = (terms.search_words - word_count(cand_title) as i32).abs();
        let title_score = token_set_ratio(&terms.title, &bare) as i32 - word_diff;

        let mut composite = if author_score >= self.match_ratio {
            title_score
        } else {
            // i32 division truncates toward zero
            (author_score + title_score) / 2
        };

        let leftovers = leftover_words(&candidate, cand_title, terms, policy);
        let bonus = format_bonus(cand_title, policy);
        composite = composite - leftovers + bonus;

        trace!(
            title = %candidate.title,
            author_score,
            title_score,
            leftovers,
            bonus,
            composite,
            "Scored candidate"
        );

        ScoredCandidate {
            candidate,
            author_score,
            title_score,
            composite_score: composite,
            rejected: None,
        }
    }
}

/// Candidate title with the author removed. Falls back to the full title
/// when nothing meaningful is left.
fn bare_title(cand_title: &str, author: &str) -> String {
    if author.is_empty() {
        return cand_title.to_string();
    }

    let stripped = cand_title.to_lowercase().replace(&author.to_lowercase(), " ");
    let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    if only_punctuation(&stripped) {
        cand_title.to_string()
    } else {
        stripped
    }
}

/// Words of the candidate that explain nothing about the wanted item.
fn leftover_words(
    candidate: &CandidateResult,
    cand_title: &str,
    terms: &WantedTerms,
    policy: &MediaPolicy,
) -> i32 {
    let words = match candidate.source {
        SearchSource::Rss => word_list(&comparable(strip_trailing_tags(&candidate.title))),
        _ => word_list(cand_title),
    };

    words
        .iter()
        .filter(|w| !terms.author_words.contains(w))
        .filter(|w| !terms.title_words.contains(w))
        .filter(|w| !policy.is_format(w))
        .count() as i32
}

/// `N - index` for every title word found at `index` of the preferred
/// formats list.
fn format_bonus(cand_title: &str, policy: &MediaPolicy) -> i32 {
    let formats = &policy.preferred_formats;
    let n = formats.len() as i32;

    word_list(cand_title)
        .iter()
        .filter_map(|word| formats.iter().position(|f| f.eq_ignore_ascii_case(word)))
        .map(|idx| n - idx as i32)
        .sum()
}

/// Remainder of `text` after a case-insensitive whole-word `prefix`.
fn strip_word_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }

    let mut chars = text.char_indices();
    for p in prefix.chars() {
        let (_, c) = chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }

    let rest = match chars.next() {
        Some((idx, c)) if c.is_whitespace() => &text[idx..],
        Some(_) => return None,
        None => "",
    };
    Some(rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SqliteLedger;
    use crate::matcher::RejectReason;
    use crate::searcher::DeliveryMode;
    use crate::wanted::MediaKind;

    fn ranker() -> CandidateRanker {
        ranker_with(MatchingConfig::default(), PoliciesConfig::default())
    }

    fn ranker_with(matching: MatchingConfig, policies: PoliciesConfig) -> CandidateRanker {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        CandidateRanker::new(matching, policies, ledger)
    }

    fn tom_holt() -> WantedItem {
        WantedItem::new("b1", "Tom Holt", "Blonde Bombshell", None, MediaKind::EBook)
    }

    fn nzb(title: &str, url: &str) -> CandidateResult {
        CandidateResult::new(title, url, "indexer", DeliveryMode::Nzb, SearchSource::Nzb)
    }

    #[test]
    fn test_exact_title_scores_100() {
        let outcome = ranker()
            .rank(vec![nzb("Tom Holt Blonde Bombshell", "http://a")], &tom_holt(), SearchTier::Exact)
            .unwrap();
        let winner = outcome.winner.unwrap();
        assert_eq!(winner.author_score, 100);
        assert_eq!(winner.title_score, 100);
        assert_eq!(winner.composite_score, 100);
    }

    #[test]
    fn test_tom_holt_scenario() {
        let candidates = vec![
            nzb(
                "Tom Holt - Blonde Bombshell (Dystop; SFX; Humour) ePUB+MOBI",
                "magnet:?xt=urn:btih:abc",
            )
            .with_size_bytes(24 * 1_048_576)
            .with_priority(1),
            nzb("Tom Holt Unrelated Other Book", "http://x")
                .with_size_bytes(5 * 1_048_576)
                .with_priority(5),
        ];

        let outcome = ranker().rank(candidates, &tom_holt(), SearchTier::Exact).unwrap();
        let winner = outcome.winner.unwrap();
        assert_eq!(winner.candidate.priority, 1);
        // 100 - 5 word diff - 3 leftovers (dystop sfx humour) + 3 epub + 2 mobi
        assert_eq!(winner.composite_score, 97);
        assert_eq!(outcome.scored[1].composite_score, -4);
    }

    #[test]
    fn test_empty_url_never_wins() {
        let candidates = vec![
            nzb("Tom Holt Blonde Bombshell", ""),
            nzb("Tom Holt Blonde Bombshell Other", "http://b"),
        ];
        let outcome = ranker().rank(candidates, &tom_holt(), SearchTier::Exact).unwrap();
        assert_eq!(outcome.scored[0].rejected, Some(RejectReason::NoUrl));
        assert_eq!(outcome.winner.unwrap().candidate.url, "http://b");
    }

    #[test]
    fn test_all_rejected_yields_no_winner() {
        let candidates = vec![nzb("Tom Holt Blonde Bombshell", ""), nzb("Other", "")];
        let outcome = ranker().rank(candidates, &tom_holt(), SearchTier::Exact).unwrap();
        assert!(outcome.winner.is_none());
        assert_eq!(outcome.rejected_count(), 2);

        let outcome = ranker().rank(Vec::new(), &tom_holt(), SearchTier::Exact).unwrap();
        assert!(outcome.winner.is_none());
        assert!(outcome.scored.is_empty());
    }

    #[test]
    fn test_priority_breaks_score_ties() {
        let candidates = vec![
            nzb("Tom Holt Blonde Bombshell", "http://low").with_priority(1),
            nzb("Tom Holt Blonde Bombshell", "http://high").with_priority(5),
        ];
        let outcome = ranker().rank(candidates, &tom_holt(), SearchTier::Exact).unwrap();
        assert_eq!(outcome.winner.unwrap().candidate.url, "http://high");
    }

    #[test]
    fn test_earliest_wins_full_ties() {
        let candidates = vec![
            nzb("Tom Holt Blonde Bombshell", "http://first").with_priority(2),
            nzb("Tom Holt Blonde Bombshell", "http://second").with_priority(2),
        ];
        let outcome = ranker().rank(candidates, &tom_holt(), SearchTier::Exact).unwrap();
        assert_eq!(outcome.winner.unwrap().candidate.url, "http://first");
    }

    #[test]
    fn test_score_beats_priority() {
        let candidates = vec![
            nzb("Tom Holt Blonde Bombshell Extra Words Here", "http://worse").with_priority(10),
            nzb("Tom Holt Blonde Bombshell", "http://better").with_priority(0),
        ];
        let outcome = ranker().rank(candidates, &tom_holt(), SearchTier::Exact).unwrap();
        assert_eq!(outcome.winner.unwrap().candidate.url, "http://better");
    }

    #[test]
    fn test_low_author_score_averages() {
        // Author absent from the title: (0 + 100) / 2, title has no extra words
        let wanted = tom_holt().with_search_term("Blonde Bombshell");
        let outcome = ranker()
            .rank(vec![nzb("Blonde Bombshell", "http://a")], &wanted, SearchTier::Exact)
            .unwrap();
        let winner = outcome.winner.unwrap();
        assert_eq!(winner.author_score, 0);
        assert_eq!(winner.title_score, 100);
        assert_eq!(winner.composite_score, 50);
    }

    #[test]
    fn test_averaging_truncates_toward_zero() {
        // Author 0, title 0 - 1 word diff = -1; (0 + -1) / 2 truncates to 0,
        // then both words are leftovers
        let wanted = tom_holt().with_search_term("Nothing");
        let outcome = ranker()
            .rank(vec![nzb("Unrelated Words", "http://a")], &wanted, SearchTier::Exact)
            .unwrap();
        let winner = outcome.winner.unwrap();
        assert_eq!(winner.title_score, -1);
        assert_eq!(winner.composite_score, -2);
    }

    #[test]
    fn test_title_only_provider_gets_full_author_score() {
        let mut c = nzb("Blonde Bombshell", "http://a");
        c.title_only = true;
        let wanted = tom_holt().with_search_term("Blonde Bombshell");
        let outcome = ranker().rank(vec![c], &wanted, SearchTier::Exact).unwrap();
        let winner = outcome.winner.unwrap();
        assert_eq!(winner.author_score, 100);
        assert_eq!(winner.composite_score, 100);
    }

    #[test]
    fn test_title_equal_to_author_uses_subtitle() {
        let wanted = WantedItem::new(
            "b9",
            "Jane Doe",
            "Jane Doe",
            Some("A Life".to_string()),
            MediaKind::EBook,
        )
        .with_search_term("Jane Doe A Life");
        let outcome = ranker()
            .rank(vec![nzb("Jane Doe - A Life", "http://a")], &wanted, SearchTier::Exact)
            .unwrap();
        assert_eq!(outcome.winner.unwrap().composite_score, 100);
    }

    #[test]
    fn test_title_starting_with_author_is_stripped() {
        let wanted = WantedItem::new(
            "b10",
            "Tom Holt",
            "Tom Holt Blonde Bombshell",
            None,
            MediaKind::EBook,
        )
        .with_search_term("Tom Holt Blonde Bombshell");
        let outcome = ranker()
            .rank(vec![nzb("Tom Holt Blonde Bombshell", "http://a")], &wanted, SearchTier::Exact)
            .unwrap();
        assert_eq!(outcome.winner.unwrap().composite_score, 100);
    }

    #[test]
    fn test_short_tier_drops_series_suffix() {
        let wanted = WantedItem::new(
            "b11",
            "Terry Pratchett",
            "Guards! Guards! (Discworld, #8)",
            None,
            MediaKind::EBook,
        )
        .with_search_term("Terry Pratchett Guards Guards");
        let candidates = vec![nzb("Terry Pratchett - Guards! Guards! (City Watch 2)", "http://a")];

        let short = ranker().rank(candidates.clone(), &wanted, SearchTier::Short).unwrap();
        let exact = ranker().rank(candidates, &wanted, SearchTier::Exact).unwrap();
        // 7 candidate words against 4 search words
        let short_score = short.winner.unwrap().title_score;
        assert_eq!(short_score, 97);
        assert!(exact.winner.unwrap().title_score < short_score);
    }

    #[test]
    fn test_rss_tag_tail_not_counted_as_leftovers() {
        let rss = CandidateResult::new(
            "Tom Holt Blonde Bombshell [fantasy, humour]",
            "http://feed/1",
            "wishlist",
            DeliveryMode::Torrent,
            SearchSource::Rss,
        );
        let outcome = ranker().rank(vec![rss], &tom_holt(), SearchTier::Exact).unwrap();
        let winner = outcome.winner.unwrap();
        // word diff still sees the tags, leftovers do not
        assert_eq!(winner.title_score, 98);
        assert_eq!(winner.composite_score, 98);
    }

    #[test]
    fn test_format_bonus_prefers_earlier_formats() {
        let candidates = vec![
            nzb("Tom Holt Blonde Bombshell pdf", "http://pdf"),
            nzb("Tom Holt Blonde Bombshell epub", "http://epub"),
        ];
        let outcome = ranker().rank(candidates, &tom_holt(), SearchTier::Exact).unwrap();
        assert_eq!(outcome.scored[0].composite_score, 100 - 1 + 1);
        assert_eq!(outcome.scored[1].composite_score, 100 - 1 + 3);
        assert_eq!(outcome.winner.unwrap().candidate.url, "http://epub");
    }

    #[test]
    fn test_strip_word_prefix() {
        assert_eq!(strip_word_prefix("Tom Holt Blonde", "tom holt"), Some("Blonde"));
        assert_eq!(strip_word_prefix("Tom Holt", "Tom Holt"), Some(""));
        assert_eq!(strip_word_prefix("Tom Holtby", "Tom Holt"), None);
        assert_eq!(strip_word_prefix("Tom", "Tom Holt"), None);
        assert_eq!(strip_word_prefix("anything", ""), None);
    }

    #[test]
    fn test_bare_title_falls_back_when_only_author() {
        assert_eq!(bare_title("Tom Holt", "Tom Holt"), "Tom Holt");
        assert_eq!(bare_title("Tom Holt Blonde Bombshell", "Tom Holt"), "blonde bombshell");
    }
}
