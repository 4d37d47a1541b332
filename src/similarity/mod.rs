// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multi-metric similarity engine
//!
//! Four independent metrics over a text pair: jaccard, cosine over TF-IDF
//! vectors, normalized Levenshtein, and semantic similarity over external
//! embeddings. The three local metrics are total; only the semantic metric
//! can fail, and failure is reported as "unavailable" rather than 0.0 so
//! downstream logic never mistakes unavailability for dissimilarity.

pub mod cache;
pub mod metrics;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::errors::SentinelError;
use crate::llm::LlmCapability;
use crate::types::SimilarityMetric;
use cache::ScoreCache;

/// All four similarity scores for one text pair.
///
/// `semantic` is `None` when the embedding capability failed or timed out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSet {
    pub jaccard: f64,
    pub cosine: f64,
    pub levenshtein: f64,
    pub semantic: Option<f64>,
}

impl ScoreSet {
    pub fn get(&self, metric: SimilarityMetric) -> Option<f64> {
        match metric {
            SimilarityMetric::Jaccard => Some(self.jaccard),
            SimilarityMetric::Cosine => Some(self.cosine),
            SimilarityMetric::Levenshtein => Some(self.levenshtein),
            SimilarityMetric::Semantic => self.semantic,
        }
    }

    /// Maximum over the metrics that are available
    pub fn max_available(&self) -> f64 {
        let mut best = self.jaccard.max(self.cosine).max(self.levenshtein);
        if let Some(semantic) = self.semantic {
            best = best.max(semantic);
        }
        best
    }

    pub fn is_degraded(&self) -> bool {
        self.semantic.is_none()
    }

    pub fn to_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("jaccard".to_string(), serde_json::json!(self.jaccard));
        map.insert("cosine".to_string(), serde_json::json!(self.cosine));
        map.insert(
            "levenshtein".to_string(),
            serde_json::json!(self.levenshtein),
        );
        map.insert("semantic".to_string(), serde_json::json!(self.semantic));
        map
    }
}

#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    pub cache_ttl: Duration,
    pub cache_entries: usize,
    pub embedding_cache_entries: usize,
    pub embed_timeout: Duration,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(600),
            cache_entries: 1024,
            embedding_cache_entries: 1000,
            embed_timeout: Duration::from_secs(10),
        }
    }
}

/// Stateless scoring over stateful caches. Callers pass *sanitized* text
/// only; raw text must never reach the score or embedding caches.
pub struct SimilarityEngine {
    llm: Arc<dyn LlmCapability>,
    scores: ScoreCache,
    embeddings: Mutex<LruCache<String, Vec<f32>>>,
    embed_timeout: Duration,
}

impl SimilarityEngine {
    pub fn new(llm: Arc<dyn LlmCapability>, config: SimilarityConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.embedding_cache_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            llm,
            scores: ScoreCache::new(config.cache_ttl, config.cache_entries),
            embeddings: Mutex::new(LruCache::new(capacity)),
            embed_timeout: config.embed_timeout,
        }
    }

    /// Score one metric. Only `Semantic` can return an error.
    pub async fn score(
        &self,
        text1: &str,
        text2: &str,
        metric: SimilarityMetric,
    ) -> Result<f64, SentinelError> {
        if let Some(cached) = self.scores.get(text1, text2, metric) {
            debug!(metric = %metric, "similarity cache hit");
            return Ok(cached);
        }

        let score = match metric {
            SimilarityMetric::Jaccard => metrics::jaccard(text1, text2),
            SimilarityMetric::Cosine => metrics::cosine_tfidf(text1, text2),
            SimilarityMetric::Levenshtein => metrics::levenshtein_normalized(text1, text2),
            SimilarityMetric::Semantic => self.semantic(text1, text2).await?,
        };

        self.scores.insert(text1, text2, metric, score);
        Ok(score)
    }

    /// Compute all four metrics in one call for the analyze path.
    ///
    /// Never fails: an unavailable semantic metric is reported as `None`.
    pub async fn score_all(&self, text1: &str, text2: &str) -> ScoreSet {
        let jaccard = self.scored_local(text1, text2, SimilarityMetric::Jaccard);
        let cosine = self.scored_local(text1, text2, SimilarityMetric::Cosine);
        let levenshtein = self.scored_local(text1, text2, SimilarityMetric::Levenshtein);

        let semantic = match self.score(text1, text2, SimilarityMetric::Semantic).await {
            Ok(score) => Some(score),
            Err(err) => {
                warn!(error = %err, "semantic metric unavailable, degrading to local metrics");
                None
            }
        };

        ScoreSet {
            jaccard,
            cosine,
            levenshtein,
            semantic,
        }
    }

    fn scored_local(&self, text1: &str, text2: &str, metric: SimilarityMetric) -> f64 {
        if let Some(cached) = self.scores.get(text1, text2, metric) {
            return cached;
        }
        let score = match metric {
            SimilarityMetric::Jaccard => metrics::jaccard(text1, text2),
            SimilarityMetric::Cosine => metrics::cosine_tfidf(text1, text2),
            SimilarityMetric::Levenshtein => metrics::levenshtein_normalized(text1, text2),
            SimilarityMetric::Semantic => unreachable!("semantic is not a local metric"),
        };
        self.scores.insert(text1, text2, metric, score);
        score
    }

    async fn semantic(&self, text1: &str, text2: &str) -> Result<f64, SentinelError> {
        let trimmed1 = text1.trim();
        let trimmed2 = text2.trim();
        if trimmed1.is_empty() || trimmed2.is_empty() {
            return Ok(if trimmed1 == trimmed2 { 1.0 } else { 0.0 });
        }

        let embedding1 = self.embedding(trimmed1).await?;
        let embedding2 = self.embedding(trimmed2).await?;
        Ok(metrics::cosine_vectors(&embedding1, &embedding2))
    }

    /// Embed with an LRU cache in front of the external capability.
    /// The lock is never held across the await point.
    async fn embedding(&self, text: &str) -> Result<Vec<f32>, SentinelError> {
        if let Ok(mut cache) = self.embeddings.lock() {
            if let Some(vector) = cache.get(text) {
                return Ok(vector.clone());
            }
        }

        let vector = tokio::time::timeout(self.embed_timeout, self.llm.embed(text))
            .await
            .map_err(|_| SentinelError::Capability {
                operation: "embed",
                reason: format!("timed out after {:?}", self.embed_timeout),
            })??;

        if let Ok(mut cache) = self.embeddings.lock() {
            cache.put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }
}
