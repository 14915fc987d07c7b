//! Inverted index with BM25 scoring for the memory backend's full-text columns

use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;

const K1: f32 = 1.2;
const B: f32 = 0.75;

static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z0-9]+").expect("static token regex"));

/// One row containing a term, with the term's count in that row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Posting {
    row: usize,
    count: u32,
}

/// Full-text index over one text column; row ids are positions
pub struct Bm25Scorer {
    /// Rows ascending within each list
    postings: FxHashMap<String, Vec<Posting>>,
    doc_lengths: Vec<u32>,
    avg_doc_len: f32,
}

impl Bm25Scorer {
    pub fn build<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut postings: FxHashMap<String, Vec<Posting>> = FxHashMap::default();
        let mut doc_lengths = Vec::new();

        for (row, doc) in documents.into_iter().enumerate() {
            let tokens = tokenize(doc);
            doc_lengths.push(tokens.len() as u32);

            let mut counts: FxHashMap<String, u32> = FxHashMap::default();
            for token in tokens {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (term, count) in counts {
                postings.entry(term).or_default().push(Posting { row, count });
            }
        }

        let total: u64 = doc_lengths.iter().map(|&len| len as u64).sum();
        let avg_doc_len = if total == 0 {
            1.0
        } else {
            total as f32 / doc_lengths.len() as f32
        };

        Self {
            postings,
            doc_lengths,
            avg_doc_len,
        }
    }

    /// BM25 score of every row containing at least one query term
    ///
    /// Only the posting lists of the query's terms are visited.
    pub fn score_query(&self, query: &str) -> FxHashMap<usize, f32> {
        let num_docs = self.doc_lengths.len() as f32;
        let mut scores: FxHashMap<usize, f32> = FxHashMap::default();

        for token in tokenize(query) {
            let Some(list) = self.postings.get(&token) else {
                continue;
            };
            let df = list.len() as f32;
            let idf = ((num_docs - df + 0.5) / (df + 0.5) + 1.0).ln();

            for posting in list {
                let tf = posting.count as f32;
                let doc_len = self.doc_lengths[posting.row] as f32;
                let norm = 1.0 - B + B * (doc_len / self.avg_doc_len);
                *scores.entry(posting.row).or_insert(0.0) += idf * (tf * (K1 + 1.0)) / (tf + K1 * norm);
            }
        }

        scores
    }
}

/// Positive scores, best first (ties by row), at most `top_k`
pub fn top_scored(
    scores: impl IntoIterator<Item = (usize, f32)>,
    top_k: usize,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(top_k);
    scored
}

/// Lowercase alphanumeric tokens, single characters dropped
fn tokenize(text: &str) -> Vec<String> {
    TOKEN_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|s| s.len() > 1)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("Hello, World! This is a test.");
        assert_eq!(tokens, vec!["hello", "world", "this", "is", "test"]);
    }

    #[test]
    fn test_postings_hold_rows_in_order() {
        let scorer = Bm25Scorer::build(["fox fox den", "turtle", "the fox"]);
        assert_eq!(
            scorer.postings["fox"],
            vec![Posting { row: 0, count: 2 }, Posting { row: 2, count: 1 }]
        );
        assert!(!scorer.postings.contains_key("a"));
    }

    #[test]
    fn test_scores_only_matching_rows() {
        let docs = [
            "the quick brown fox jumps over the lazy dog",
            "a slow green turtle",
            "quick quick fox",
        ];
        let scorer = Bm25Scorer::build(docs);
        let scores = scorer.score_query("quick fox");

        assert_eq!(scores.len(), 2);
        assert!(!scores.contains_key(&1));
        assert!(scores[&2] > scores[&0]);

        let ranked = top_scored(scores, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0, 2);
    }

    #[test]
    fn test_top_scored_breaks_ties_by_row() {
        let ranked = top_scored([(3, 1.0), (1, 1.0), (2, 0.0), (0, 2.0)], 10);
        let rows: Vec<usize> = ranked.iter().map(|(row, _)| *row).collect();
        assert_eq!(rows, vec![0, 1, 3]);
    }

    #[test]
    fn test_empty_index() {
        let scorer = Bm25Scorer::build(std::iter::empty());
        assert!(scorer.score_query("anything").is_empty());
    }
}
