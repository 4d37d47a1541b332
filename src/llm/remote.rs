// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OpenAI-compatible HTTP capability client
//!
//! Works against any endpoint speaking the /embeddings and /chat/completions
//! wire format. All failures, including timeouts, surface as
//! `SentinelError::Capability` so the pipeline can degrade instead of crash.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::LlmCapability;
use crate::errors::SentinelError;

pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        chat_model: &str,
        embedding_model: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            chat_model: chat_model.to_string(),
            embedding_model: embedding_model.to_string(),
        })
    }

    fn capability_error(operation: &'static str, reason: impl ToString) -> SentinelError {
        SentinelError::Capability {
            operation,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl LlmCapability for OpenAiCompatClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SentinelError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };
        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::capability_error("embed", e))?;

        if !response.status().is_success() {
            return Err(Self::capability_error(
                "embed",
                format!("endpoint returned {}", response.status()),
            ));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Self::capability_error("embed", e))?;
        let vector = body
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Self::capability_error("embed", "empty embedding response"))?;
        if vector.is_empty() {
            return Err(Self::capability_error("embed", "zero-length embedding"));
        }
        Ok(vector)
    }

    async fn complete(&self, prompt: &str) -> Result<String, SentinelError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::capability_error("complete", e))?;

        if !response.status().is_success() {
            return Err(Self::capability_error(
                "complete",
                format!("endpoint returned {}", response.status()),
            ));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::capability_error("complete", e))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Self::capability_error("complete", "empty completion response"))?;
        Ok(content)
    }
}
