// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! TTL-based similarity score caching
//!
//! Keys are SHA-256 content hashes of the *sanitized* text pair plus the
//! metric name. Callers must never pass raw input here: sanitization changes
//! text before scoring, and a raw-keyed entry would leak stale scores.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::types::SimilarityMetric;

/// TTL cache for per-metric similarity scores
pub struct ScoreCache {
    cache: RwLock<HashMap<String, CachedScore>>,
    ttl: Duration,
    max_entries: usize,
}

struct CachedScore {
    score: f64,
    inserted_at: Instant,
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub total: usize,
    pub expired: usize,
    pub max: usize,
}

impl ScoreCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Content hash over the sanitized pair and the metric name
    pub fn cache_key(text1: &str, text2: &str, metric: SimilarityMetric) -> String {
        let mut hasher = Sha256::new();
        hasher.update(metric.as_str().as_bytes());
        hasher.update([0x1f]);
        hasher.update(text1.as_bytes());
        hasher.update([0x1f]);
        hasher.update(text2.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get(&self, text1: &str, text2: &str, metric: SimilarityMetric) -> Option<f64> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(&Self::cache_key(text1, text2, metric))?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None; // Expired
        }
        Some(entry.score)
    }

    pub fn insert(&self, text1: &str, text2: &str, metric: SimilarityMetric, score: f64) {
        let mut cache = match self.cache.write() {
            Ok(c) => c,
            Err(_) => return,
        };

        if cache.len() >= self.max_entries {
            Self::evict_oldest(&mut cache);
        }

        cache.insert(
            Self::cache_key(text1, text2, metric),
            CachedScore {
                score,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let cache = match self.cache.read() {
            Ok(c) => c,
            Err(_) => {
                return CacheStats {
                    total: 0,
                    expired: 0,
                    max: self.max_entries,
                }
            }
        };
        CacheStats {
            total: cache.len(),
            expired: cache
                .values()
                .filter(|e| e.inserted_at.elapsed() > self.ttl)
                .count(),
            max: self.max_entries,
        }
    }

    fn evict_oldest(cache: &mut HashMap<String, CachedScore>) {
        if let Some(oldest_key) = cache
            .iter()
            .min_by_key(|(_, v)| v.inserted_at)
            .map(|(k, _)| k.clone())
        {
            cache.remove(&oldest_key);
        }
    }
}
