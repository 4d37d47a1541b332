// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Engine counters for operational visibility

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Default)]
struct MetricsInner {
    total_requests: u64,
    blocked_count: u64,
    similarity_sum: f64,
    similarity_samples: u64,
}

/// Point-in-time view of the engine counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetricsSnapshot {
    pub total_requests: u64,
    pub total_users: u64,
    pub blocked_count: u64,
    pub average_similarity: f64,
}

#[derive(Default)]
pub struct EngineMetrics {
    inner: RwLock<MetricsInner>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, blocked: bool, max_similarity: f64) {
        let mut inner = self.inner.write().await;
        inner.total_requests += 1;
        if blocked {
            inner.blocked_count += 1;
        }
        inner.similarity_sum += max_similarity;
        inner.similarity_samples += 1;
    }

    pub async fn snapshot(&self, total_users: u64) -> EngineMetricsSnapshot {
        let inner = self.inner.read().await;
        let average_similarity = if inner.similarity_samples > 0 {
            inner.similarity_sum / inner.similarity_samples as f64
        } else {
            0.0
        };
        EngineMetricsSnapshot {
            total_requests: inner.total_requests,
            total_users,
            blocked_count: inner.blocked_count,
            average_similarity,
        }
    }
}
