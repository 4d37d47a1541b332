// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Environment-driven configuration for the analysis engine
//!
//! Every threshold the decision logic depends on is a parameter here, with
//! defaults matching the reference deployment. `Settings::from_env` reads
//! the process environment (a `.env` file is loaded by the binary first).

use std::env;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Which LLM capability backend to construct at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    /// Deterministic in-process embedder, no network calls
    Local,
    /// OpenAI-compatible HTTP endpoint
    Remote,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum accepted prompt length; longer input is rejected, never truncated
    pub max_prompt_length: usize,
    /// Default similarity threshold when the request does not specify one
    pub similarity_threshold: f64,

    // Reputation model
    pub default_reputation: f64,
    pub reputation_growth: f64,
    pub reputation_decay: f64,
    pub low_trust_threshold: f64,
    pub trusted_threshold: f64,
    /// Recent violation tags above this count trigger a SafetyAgent block
    pub violation_limit: usize,
    /// Bounded window of recent violation tags kept per user
    pub violation_window: usize,

    // Agent pipeline
    /// Block findings at or above this confidence force the final verdict
    pub high_confidence_threshold: f64,
    /// Same-pattern submissions at or above this count mark an attack lineage
    pub repetition_threshold: u64,
    /// Prior similar_to links above this count flag excessive similar prompts
    pub excessive_similar_limit: usize,

    // Similarity engine
    pub embedding_dimension: usize,
    pub score_cache_ttl: Duration,
    pub score_cache_entries: usize,
    pub embedding_cache_entries: usize,

    // External capability
    pub llm_backend: LlmBackend,
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_chat_model: String,
    pub llm_embedding_model: String,
    pub embed_timeout: Duration,
    pub complete_timeout: Duration,

    /// Words redacted by the profanity strategy, comma-separated in the env
    pub profanity_list: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_prompt_length: 2000,
            similarity_threshold: 0.7,
            default_reputation: 0.5,
            reputation_growth: 0.01,
            reputation_decay: 0.1,
            low_trust_threshold: 0.3,
            trusted_threshold: 0.5,
            violation_limit: 5,
            violation_window: 10,
            high_confidence_threshold: 0.75,
            repetition_threshold: 3,
            excessive_similar_limit: 5,
            embedding_dimension: 384,
            score_cache_ttl: Duration::from_secs(600),
            score_cache_entries: 1024,
            embedding_cache_entries: 1000,
            llm_backend: LlmBackend::Local,
            llm_base_url: "http://localhost:8080/v1".to_string(),
            llm_api_key: String::new(),
            llm_chat_model: "gpt-4o-mini".to_string(),
            llm_embedding_model: "text-embedding-3-small".to_string(),
            embed_timeout: Duration::from_secs(10),
            complete_timeout: Duration::from_secs(30),
            profanity_list: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        let llm_backend = match env::var("LLM_BACKEND").as_deref() {
            Ok("remote") | Ok("openai") => LlmBackend::Remote,
            _ => LlmBackend::Local,
        };

        let profanity_list = env::var("PROFANITY_LIST")
            .map(|raw| {
                raw.split(',')
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            max_prompt_length: env_parse("MAX_PROMPT_LENGTH", defaults.max_prompt_length),
            similarity_threshold: env_parse("SIMILARITY_THRESHOLD", defaults.similarity_threshold),
            default_reputation: env_parse("DEFAULT_REPUTATION", defaults.default_reputation),
            reputation_growth: env_parse("REPUTATION_GROWTH", defaults.reputation_growth),
            reputation_decay: env_parse("REPUTATION_DECAY", defaults.reputation_decay),
            low_trust_threshold: env_parse("LOW_TRUST_THRESHOLD", defaults.low_trust_threshold),
            trusted_threshold: env_parse("TRUSTED_THRESHOLD", defaults.trusted_threshold),
            violation_limit: env_parse("VIOLATION_LIMIT", defaults.violation_limit),
            violation_window: env_parse("VIOLATION_WINDOW", defaults.violation_window),
            high_confidence_threshold: env_parse(
                "HIGH_CONFIDENCE_THRESHOLD",
                defaults.high_confidence_threshold,
            ),
            repetition_threshold: env_parse("REPETITION_THRESHOLD", defaults.repetition_threshold),
            excessive_similar_limit: env_parse(
                "EXCESSIVE_SIMILAR_LIMIT",
                defaults.excessive_similar_limit,
            ),
            embedding_dimension: env_parse("EMBEDDING_DIMENSION", defaults.embedding_dimension),
            score_cache_ttl: Duration::from_secs(env_parse("SCORE_CACHE_TTL_SECS", 600u64)),
            score_cache_entries: env_parse("SCORE_CACHE_ENTRIES", defaults.score_cache_entries),
            embedding_cache_entries: env_parse(
                "EMBEDDING_CACHE_ENTRIES",
                defaults.embedding_cache_entries,
            ),
            llm_backend,
            llm_base_url: env::var("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_chat_model: env::var("LLM_CHAT_MODEL").unwrap_or(defaults.llm_chat_model),
            llm_embedding_model: env::var("LLM_EMBEDDING_MODEL")
                .unwrap_or(defaults.llm_embedding_model),
            embed_timeout: Duration::from_secs(env_parse("EMBED_TIMEOUT_SECS", 10u64)),
            complete_timeout: Duration::from_secs(env_parse("COMPLETE_TIMEOUT_SECS", 30u64)),
            profanity_list,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let settings = Settings::default();
        assert!(settings.low_trust_threshold < settings.trusted_threshold);
        assert!(settings.default_reputation <= settings.trusted_threshold);
        assert!(settings.similarity_threshold >= 0.0 && settings.similarity_threshold <= 1.0);
        assert!(settings.high_confidence_threshold <= 1.0);
    }
}
