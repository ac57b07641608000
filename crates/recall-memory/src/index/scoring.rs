// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-signal scoring functions for hybrid search.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use recall_config::model::SignalWeights;

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;
const MS_PER_DAY: f64 = 86_400_000.0;

/// The five signal values of one search hit, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SignalScores {
    pub vector: f64,
    pub bm25: f64,
    pub graph: f64,
    pub recency: f64,
    pub entity_density: f64,
}

impl SignalScores {
    /// Weighted mean of the signals.
    pub fn fuse(&self, weights: &SignalWeights) -> f64 {
        let total = weights.total();
        if total <= 0.0 {
            return 0.0;
        }
        (weights.vector * self.vector
            + weights.bm25 * self.bm25
            + weights.graph * self.graph
            + weights.recency * self.recency
            + weights.entity_density * self.entity_density)
            / total
    }
}

/// `exp(-age * ln2 / half_life)`; future timestamps score 1.
pub fn recency(age_ms: i64, half_life_days: f64) -> f64 {
    let half_life_ms = half_life_days * MS_PER_DAY;
    if half_life_ms <= 0.0 {
        return 0.0;
    }
    (-(age_ms.max(0) as f64) * std::f64::consts::LN_2 / half_life_ms).exp()
}

/// FTS5 MATCH expression OR-ing each term as a quoted string.
pub fn fts_match_expression<'a>(terms: impl IntoIterator<Item = &'a String>) -> Option<String> {
    let mut quoted: Vec<String> = terms
        .into_iter()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if quoted.is_empty() {
        return None;
    }
    quoted.sort();
    Some(quoted.join(" OR "))
}

/// Scale raw relevance values so the best one is 1.
pub fn normalize_max(scores: HashMap<String, f64>) -> HashMap<String, f64> {
    let max = scores.values().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return HashMap::new();
    }
    scores
        .into_iter()
        .map(|(id, score)| (id, (score / max).clamp(0.0, 1.0)))
        .collect()
}

/// Corpus statistics for manual BM25.
#[derive(Debug, Clone, Default)]
pub struct Bm25Corpus {
    pub doc_count: usize,
    pub avg_len: f64,
    pub doc_freq: HashMap<String, i64>,
}

impl Bm25Corpus {
    /// Okapi BM25 of a document given as its token list.
    pub fn score(&self, terms: &HashSet<String>, doc_tokens: &[String]) -> f64 {
        if self.doc_count == 0 || doc_tokens.is_empty() {
            return 0.0;
        }
        let n = self.doc_count as f64;
        let len = doc_tokens.len() as f64;
        let avg = if self.avg_len > 0.0 { self.avg_len } else { len };
        terms
            .iter()
            .map(|term| {
                let tf = doc_tokens.iter().filter(|t| *t == term).count() as f64;
                if tf == 0.0 {
                    return 0.0;
                }
                let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * len / avg))
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::tokenize;

    #[test]
    fn recency_halves_each_half_life() {
        assert_eq!(recency(0, 7.0), 1.0);
        let week = (7.0 * MS_PER_DAY) as i64;
        assert!((recency(week, 7.0) - 0.5).abs() < 1e-12);
        assert!((recency(2 * week, 7.0) - 0.25).abs() < 1e-12);
        assert_eq!(recency(-5_000, 7.0), 1.0);
    }

    #[test]
    fn fuse_is_weighted_mean() {
        let scores = SignalScores {
            vector: 1.0,
            bm25: 1.0,
            graph: 0.0,
            recency: 1.0,
            entity_density: 0.0,
        };
        let fused = scores.fuse(&SignalWeights::default());
        assert!((fused - 0.75).abs() < 1e-12);
    }

    #[test]
    fn match_expression_quotes_terms() {
        let terms = vec!["project".to_string(), "o\"neil".to_string()];
        assert_eq!(
            fts_match_expression(&terms).as_deref(),
            Some("\"o\"\"neil\" OR \"project\"")
        );
        assert_eq!(fts_match_expression(&Vec::<String>::new()), None);
    }

    #[test]
    fn manual_bm25_prefers_rarer_and_denser_terms() {
        let corpus = Bm25Corpus {
            doc_count: 3,
            avg_len: 4.0,
            doc_freq: HashMap::from([("atlas".to_string(), 1), ("team".to_string(), 3)]),
        };
        let query: HashSet<String> = ["atlas".to_string()].into();
        let hit = corpus.score(&query, &tokenize("atlas launch atlas review"));
        let miss = corpus.score(&query, &tokenize("team weekly sync notes"));
        assert!(hit > 0.0);
        assert_eq!(miss, 0.0);

        let common: HashSet<String> = ["team".to_string()].into();
        let common_score = corpus.score(&common, &tokenize("team weekly sync notes"));
        assert!(hit > common_score);
    }

    #[test]
    fn normalize_max_scales_to_one() {
        let scores = HashMap::from([("a".to_string(), 4.0), ("b".to_string(), 1.0)]);
        let normalized = normalize_max(scores);
        assert_eq!(normalized["a"], 1.0);
        assert_eq!(normalized["b"], 0.25);
    }
}
