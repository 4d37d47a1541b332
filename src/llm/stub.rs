// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Programmable capability stub for tests and failure-injection drills
//!
//! Embeddings can be pinned per text so tests can make arbitrary pairs look
//! semantically close or distant; the failure switch simulates an
//! unavailable provider.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::LlmCapability;
use crate::errors::SentinelError;

pub struct StubLlm {
    dimension: usize,
    fail: bool,
    pinned: RwLock<HashMap<String, Vec<f32>>>,
    completion: String,
}

impl StubLlm {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            fail: false,
            pinned: RwLock::new(HashMap::new()),
            completion: "stub completion".to_string(),
        }
    }

    /// Every embed/complete call fails, simulating an unreachable provider
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn with_completion(mut self, completion: &str) -> Self {
        self.completion = completion.to_string();
        self
    }

    /// Pin the embedding returned for an exact text
    pub fn pin_embedding(&self, text: &str, vector: Vec<f32>) {
        if let Ok(mut pinned) = self.pinned.write() {
            pinned.insert(text.to_string(), vector);
        }
    }
}

#[async_trait]
impl LlmCapability for StubLlm {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SentinelError> {
        if self.fail {
            return Err(SentinelError::Capability {
                operation: "embed",
                reason: "stub configured to fail".to_string(),
            });
        }
        if let Ok(pinned) = self.pinned.read() {
            if let Some(vector) = pinned.get(text) {
                return Ok(vector.clone());
            }
        }
        // Unpinned texts get a fixed basis vector, orthogonal to nothing
        let mut vector = vec![0.0; self.dimension];
        if let Some(first) = vector.first_mut() {
            *first = 1.0;
        }
        Ok(vector)
    }

    async fn complete(&self, _prompt: &str) -> Result<String, SentinelError> {
        if self.fail {
            return Err(SentinelError::Capability {
                operation: "complete",
                reason: "stub configured to fail".to_string(),
            });
        }
        Ok(self.completion.clone())
    }
}
