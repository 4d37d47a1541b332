// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multi-agent decision pipeline
//!
//! Three specialized agents run in a fixed order over one shared context:
//! the similarity agent reads the score set, the safety agent reads the
//! user's standing and the detected issues, and the decision agent folds
//! every prior finding into the final verdict. Agents never mutate state
//! outside the context; all side effects happen after the verdict.

pub mod decision;
pub mod orchestrator;
pub mod safety;
pub mod similarity;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::Settings;
use crate::errors::SentinelError;
use crate::similarity::ScoreSet;
use crate::types::{AgentFinding, Prompt, UserProfile};

pub use decision::DecisionAgent;
pub use orchestrator::{AgentOrchestrator, Adjudication};
pub use safety::SafetyAgent;
pub use similarity::SimilarityAgent;

/// Read-only evidence shared by every agent in one pipeline run.
///
/// `profile`, `pattern_stats` and `similar_count` are snapshots taken
/// before the pipeline starts; they exclude the request being decided.
pub struct AgentContext {
    pub user_id: String,
    pub prompt1: Prompt,
    pub prompt2: Prompt,
    pub scores: ScoreSet,
    pub is_similar: bool,
    pub threshold: f64,
    pub profile: UserProfile,
    /// Per-tag counts of the user's previously flagged prompts
    pub pattern_stats: HashMap<String, u64>,
    /// Prior similar_to links touching the user's prompts
    pub similar_count: usize,
    /// Findings accumulated by earlier agents in the pipeline
    pub findings: Vec<AgentFinding>,
}

impl AgentContext {
    /// Deduplicated issue tags across both prompts, in detection order
    pub fn issue_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for tag in self.prompt1.issues.iter().chain(self.prompt2.issues.iter()) {
            if !tags.contains(&tag.as_str()) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Thresholds the agents decide against
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub low_trust_threshold: f64,
    pub trusted_threshold: f64,
    pub violation_limit: usize,
    pub high_confidence_threshold: f64,
    pub repetition_threshold: u64,
    pub excessive_similar_limit: usize,
}

impl From<&Settings> for AgentConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            low_trust_threshold: settings.low_trust_threshold,
            trusted_threshold: settings.trusted_threshold,
            violation_limit: settings.violation_limit,
            high_confidence_threshold: settings.high_confidence_threshold,
            repetition_threshold: settings.repetition_threshold,
            excessive_similar_limit: settings.excessive_similar_limit,
        }
    }
}

/// One agent in the pipeline. Failure is isolated by the orchestrator and
/// replaced with a conservative low-confidence block finding.
#[async_trait]
pub trait SecurityAgent: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&self, context: &AgentContext) -> Result<AgentFinding, SentinelError>;
}
