// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pure similarity metric implementations
//!
//! All functions return scores in [0, 1]. Empty-vs-empty is defined as 1.0
//! (identical emptiness), empty-vs-non-empty as 0.0.

use std::collections::{HashMap, HashSet};

/// Lowercase, strip punctuation, split on whitespace
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Word-set intersection over union
pub fn jaccard(text1: &str, text2: &str) -> f64 {
    let words1: HashSet<String> = tokenize(text1).into_iter().collect();
    let words2: HashSet<String> = tokenize(text2).into_iter().collect();

    if words1.is_empty() && words2.is_empty() {
        return 1.0;
    }
    if words1.is_empty() || words2.is_empty() {
        return 0.0;
    }

    let intersection = words1.intersection(&words2).count();
    let union = words1.union(&words2).count();
    intersection as f64 / union as f64
}

/// Cosine similarity over TF-IDF vectors built from the two texts only
/// (a 2-document corpus). Sublinear TF (1 + ln tf) and smoothed IDF.
pub fn cosine_tfidf(text1: &str, text2: &str) -> f64 {
    let tokens1 = tokenize(text1);
    let tokens2 = tokenize(text2);

    if tokens1.is_empty() && tokens2.is_empty() {
        return 1.0;
    }
    if tokens1.is_empty() || tokens2.is_empty() {
        return 0.0;
    }

    let tf1 = term_frequencies(&tokens1);
    let tf2 = term_frequencies(&tokens2);

    let vocabulary: HashSet<&String> = tf1.keys().chain(tf2.keys()).collect();
    let n_docs = 2.0_f64;

    let mut dot = 0.0;
    let mut norm1 = 0.0;
    let mut norm2 = 0.0;

    for term in vocabulary {
        let df = [tf1.contains_key(term), tf2.contains_key(term)]
            .iter()
            .filter(|&&present| present)
            .count() as f64;
        // Smoothed IDF, never zero so shared terms still contribute
        let idf = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;

        let weight1 = tf1.get(term).map_or(0.0, |&tf| (1.0 + (tf as f64).ln()) * idf);
        let weight2 = tf2.get(term).map_or(0.0, |&tf| (1.0 + (tf as f64).ln()) * idf);

        dot += weight1 * weight2;
        norm1 += weight1 * weight1;
        norm2 += weight2 * weight2;
    }

    if norm1 == 0.0 || norm2 == 0.0 {
        return 0.0;
    }
    (dot / (norm1.sqrt() * norm2.sqrt())).clamp(0.0, 1.0)
}

fn term_frequencies(tokens: &[String]) -> HashMap<String, usize> {
    let mut frequencies = HashMap::new();
    for token in tokens {
        *frequencies.entry(token.clone()).or_insert(0) += 1;
    }
    frequencies
}

/// 1 - (edit distance / max length), over Unicode scalar values
pub fn levenshtein_normalized(text1: &str, text2: &str) -> f64 {
    let chars1: Vec<char> = text1.chars().collect();
    let chars2: Vec<char> = text2.chars().collect();

    if chars1.is_empty() && chars2.is_empty() {
        return 1.0;
    }
    if chars1.is_empty() || chars2.is_empty() {
        return 0.0;
    }

    let distance = levenshtein_distance(&chars1, &chars2);
    let max_len = chars1.len().max(chars2.len());
    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Cosine similarity of two embedding vectors; zero vectors score 0.0
pub fn cosine_vectors(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += x as f64 * y as f64;
        norm_a += x as f64 * x as f64;
        norm_b += y as f64 * y as f64;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jaccard_identical_and_disjoint() {
        assert_eq!(jaccard("the quick brown fox", "the quick brown fox"), 1.0);
        assert_eq!(jaccard("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_jaccard_empty_cases() {
        assert_eq!(jaccard("", ""), 1.0);
        assert_eq!(jaccard("   ", "\t"), 1.0);
        assert_eq!(jaccard("", "hello"), 0.0);
    }

    #[test]
    fn test_jaccard_ignores_punctuation_and_case() {
        let score = jaccard("Hello, World!", "hello world");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_cosine_identical_texts_score_one() {
        let score = cosine_tfidf("machine learning is fun", "machine learning is fun");
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_disjoint_texts_score_zero() {
        assert_eq!(cosine_tfidf("alpha beta gamma", "delta epsilon zeta"), 0.0);
    }

    #[test]
    fn test_cosine_partial_overlap_in_range() {
        let score = cosine_tfidf("show me the users", "show me the records");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn test_levenshtein_bounds() {
        assert_eq!(levenshtein_normalized("", ""), 1.0);
        assert_eq!(levenshtein_normalized("abc", ""), 0.0);
        assert_eq!(levenshtein_normalized("kitten", "kitten"), 1.0);

        // kitten -> sitting is 3 edits over max length 7
        let score = levenshtein_normalized("kitten", "sitting");
        assert!((score - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_vectors_orthogonal_and_parallel() {
        assert_eq!(cosine_vectors(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert!((cosine_vectors(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_vectors(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_all_metrics_in_unit_range() {
        let pairs = [
            ("Show me all users", "'; DROP TABLE users; --"),
            ("a", "a very much longer text with many words"),
            ("same", "same"),
        ];
        for (a, b) in pairs {
            for score in [
                jaccard(a, b),
                cosine_tfidf(a, b),
                levenshtein_normalized(a, b),
            ] {
                assert!((0.0..=1.0).contains(&score), "{} out of range", score);
            }
        }
    }
}
