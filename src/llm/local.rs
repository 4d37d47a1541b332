// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic in-process capability for offline operation
//!
//! Embeddings are seeded from a SHA-256 digest of the input, so the same
//! text always maps to the same normalized vector and results stay
//! reproducible without any network dependency.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::LlmCapability;
use crate::errors::SentinelError;

pub struct LocalLlm {
    dimension: usize,
}

impl LocalLlm {
    pub fn new(dimension: usize) -> anyhow::Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be greater than 0");
        }
        Ok(Self { dimension })
    }
}

#[async_trait]
impl LlmCapability for LocalLlm {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SentinelError> {
        let digest = Sha256::digest(text.as_bytes());
        let mut seed = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]);

        let mut embedding = Vec::with_capacity(self.dimension);
        for i in 0..self.dimension {
            // Linear congruential step, deterministic per (text, index)
            seed = seed.wrapping_mul(1664525).wrapping_add(1013904223) ^ (i as u64);
            let value = (seed as f64 / u64::MAX as f64) * 2.0 - 1.0;
            embedding.push(value as f32);
        }

        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        Ok(embedding)
    }

    async fn complete(&self, prompt: &str) -> Result<String, SentinelError> {
        // No model attached; echo a bounded acknowledgement so the pipeline
        // stays exercisable end to end without a network dependency
        let preview: String = prompt.chars().take(120).collect();
        Ok(format!("[local completion] processed: {}", preview))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let llm = LocalLlm::new(128).unwrap();
        let first = llm.embed("test text").await.unwrap();
        let second = llm.embed("test text").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 128);

        let other = llm.embed("different text").await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_embedding_is_normalized() {
        let llm = LocalLlm::new(100).unwrap();
        let embedding = llm.embed("normalize me").await.unwrap();
        let magnitude = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(LocalLlm::new(0).is_err());
    }
}
