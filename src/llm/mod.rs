// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! External language-model capability
//!
//! The engine treats the LLM as a capability with a contract: text in,
//! vector or text out, may fail, may be slow. Every call site wraps it in a
//! timeout and degrades gracefully when it is unavailable.

pub mod local;
pub mod remote;
pub mod stub;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{LlmBackend, Settings};
use crate::errors::SentinelError;

pub use local::LocalLlm;
pub use remote::OpenAiCompatClient;
pub use stub::StubLlm;

/// Embedding and completion capability with explicit failure signaling.
/// Implementations must never return silent empty results.
#[async_trait]
pub trait LlmCapability: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SentinelError>;

    async fn complete(&self, prompt: &str) -> Result<String, SentinelError>;
}

/// Construct the configured backend
pub fn build_capability(settings: &Settings) -> anyhow::Result<Arc<dyn LlmCapability>> {
    match settings.llm_backend {
        LlmBackend::Local => Ok(Arc::new(LocalLlm::new(settings.embedding_dimension)?)),
        LlmBackend::Remote => Ok(Arc::new(OpenAiCompatClient::new(
            &settings.llm_base_url,
            &settings.llm_api_key,
            &settings.llm_chat_model,
            &settings.llm_embedding_model,
            settings.complete_timeout,
        )?)),
    }
}
