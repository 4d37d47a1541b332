// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy for the prompt analysis pipeline
//!
//! Validation errors are rejected before any pipeline stage runs. Capability
//! and storage errors degrade the result instead of failing the request;
//! agent failures are absorbed by the orchestrator and never surface here.

use thiserror::Error;

/// Errors produced by the analysis engine
#[derive(Error, Debug)]
pub enum SentinelError {
    /// A submitted prompt was empty or whitespace-only
    #[error("Prompt '{0}' is empty")]
    EmptyPrompt(&'static str),

    /// A submitted prompt exceeded the configured maximum length
    #[error("Prompt is {length} characters, maximum is {max}")]
    PromptTooLong { length: usize, max: usize },

    /// Unknown similarity metric name in the request
    #[error("Unknown similarity metric: {0}")]
    InvalidMetric(String),

    /// Similarity threshold outside the [0, 1] range
    #[error("Similarity threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    /// External embedding/completion capability failed or timed out
    #[error("LLM capability '{operation}' failed: {reason}")]
    Capability {
        operation: &'static str,
        reason: String,
    },

    /// Profile or graph store could not be updated
    #[error("Storage error: {0}")]
    Storage(String),

    /// An agent failed internally; converted to a conservative finding
    /// by the orchestrator rather than aborting the pipeline
    #[error("Agent '{agent}' failed: {reason}")]
    AgentFailure { agent: String, reason: String },

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SentinelError {
    /// Get error code for logging and metrics
    pub fn error_code(&self) -> &'static str {
        match self {
            SentinelError::EmptyPrompt(_) => "EMPTY_PROMPT",
            SentinelError::PromptTooLong { .. } => "PROMPT_TOO_LONG",
            SentinelError::InvalidMetric(_) => "INVALID_METRIC",
            SentinelError::InvalidThreshold(_) => "INVALID_THRESHOLD",
            SentinelError::Capability { .. } => "CAPABILITY_FAILED",
            SentinelError::Storage(_) => "STORAGE_ERROR",
            SentinelError::AgentFailure { .. } => "AGENT_FAILURE",
            SentinelError::NotFound(_) => "NOT_FOUND",
        }
    }

    /// HTTP status the enclosing transport should map this error to
    pub fn status_code(&self) -> u16 {
        match self {
            SentinelError::EmptyPrompt(_)
            | SentinelError::PromptTooLong { .. }
            | SentinelError::InvalidMetric(_)
            | SentinelError::InvalidThreshold(_) => 400,
            SentinelError::NotFound(_) => 404,
            SentinelError::Capability { .. } => 502,
            SentinelError::Storage(_) | SentinelError::AgentFailure { .. } => 500,
        }
    }

    /// Validation errors are rejected before any pipeline stage runs
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SentinelError::EmptyPrompt(_)
                | SentinelError::PromptTooLong { .. }
                | SentinelError::InvalidMetric(_)
                | SentinelError::InvalidThreshold(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            SentinelError::EmptyPrompt("prompt1").error_code(),
            SentinelError::PromptTooLong {
                length: 9000,
                max: 2000,
            }
            .error_code(),
            SentinelError::InvalidMetric("sorensen".to_string()).error_code(),
            SentinelError::InvalidThreshold(1.5).error_code(),
            SentinelError::Capability {
                operation: "embed",
                reason: "timeout".to_string(),
            }
            .error_code(),
            SentinelError::Storage("unreachable".to_string()).error_code(),
            SentinelError::AgentFailure {
                agent: "SafetyAgent".to_string(),
                reason: "panic".to_string(),
            }
            .error_code(),
            SentinelError::NotFound("user-1".to_string()).error_code(),
        ];

        for (i, code1) in codes.iter().enumerate() {
            for (j, code2) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(code1, code2, "Duplicate error codes found: {}", code1);
                }
            }
        }
    }

    #[test]
    fn test_validation_errors_map_to_400() {
        let err = SentinelError::InvalidThreshold(2.0);
        assert!(err.is_validation());
        assert_eq!(err.status_code(), 400);

        let err = SentinelError::Capability {
            operation: "embed",
            reason: "connection refused".to_string(),
        };
        assert!(!err.is_validation());
        assert_eq!(err.status_code(), 502);
    }
}
