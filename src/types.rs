// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Domain entities shared across the analysis pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::SentinelError;

/// Processing status of a submitted prompt.
///
/// Transitions exactly once per analysis, from `Pending` to a terminal
/// state, and is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptStatus {
    Pending,
    Safe,
    Suspicious,
    Blocked,
}

/// A submitted prompt with its sanitized form and detected issues
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub sanitized_content: String,
    pub issues: Vec<String>,
    pub status: PromptStatus,
    pub safety_score: f64,
    pub created_at: DateTime<Utc>,
}

impl Prompt {
    pub fn new(user_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            sanitized_content: String::new(),
            issues: Vec::new(),
            status: PromptStatus::Pending,
            safety_score: 0.0,
            created_at: Utc::now(),
        }
    }

    /// Attach the sanitizer output. Issues move status to `Suspicious`.
    pub fn apply_sanitization(&mut self, sanitized: String, issues: Vec<String>) {
        self.sanitized_content = sanitized;
        if !issues.is_empty() {
            self.status = PromptStatus::Suspicious;
        }
        self.issues = issues;
    }
}

/// Available similarity metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    Jaccard,
    Cosine,
    Levenshtein,
    Semantic,
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimilarityMetric::Jaccard => "jaccard",
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Levenshtein => "levenshtein",
            SimilarityMetric::Semantic => "semantic",
        }
    }

    pub fn all() -> [SimilarityMetric; 4] {
        [
            SimilarityMetric::Jaccard,
            SimilarityMetric::Cosine,
            SimilarityMetric::Levenshtein,
            SimilarityMetric::Semantic,
        ]
    }
}

impl FromStr for SimilarityMetric {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jaccard" => Ok(SimilarityMetric::Jaccard),
            "cosine" => Ok(SimilarityMetric::Cosine),
            "levenshtein" => Ok(SimilarityMetric::Levenshtein),
            "semantic" | "embedding" => Ok(SimilarityMetric::Semantic),
            other => Err(SentinelError::InvalidMetric(other.to_string())),
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent recommendation, ordered from least to most conservative
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Allow,
    Investigate,
    Block,
}

impl Recommendation {
    /// Conservatism rank: block > investigate > allow
    pub fn rank(&self) -> u8 {
        match self {
            Recommendation::Allow => 0,
            Recommendation::Investigate => 1,
            Recommendation::Block => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Allow => "allow",
            Recommendation::Investigate => "investigate",
            Recommendation::Block => "block",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single agent's contribution to the verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFinding {
    pub agent: String,
    pub recommendation: Recommendation,
    pub confidence: f64,
    pub details: HashMap<String, serde_json::Value>,
}

impl AgentFinding {
    pub fn new(agent: &str, recommendation: Recommendation, confidence: f64) -> Self {
        Self {
            agent: agent.to_string(),
            recommendation,
            confidence: confidence.clamp(0.0, 1.0),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }
}

/// Per-user reputation profile.
///
/// The profile is the source of truth for reputation; the graph's user-node
/// attribute is a cached snapshot refreshed on every update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub reputation_score: f64,
    pub total_prompts: u64,
    pub blocked_prompts: u64,
    pub recent_violations: Vec<String>,
    pub last_activity: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: &str, default_reputation: f64) -> Self {
        Self {
            user_id: user_id.to_string(),
            reputation_score: default_reputation.clamp(0.0, 1.0),
            total_prompts: 0,
            blocked_prompts: 0,
            recent_violations: Vec::new(),
            last_activity: Utc::now(),
        }
    }

    /// Apply the reputation update law for one analysis outcome.
    ///
    /// Allow grows the score by `growth`, block decays it by `decay`,
    /// investigate decays at half strength. The score never leaves [0, 1].
    pub fn update_reputation(&mut self, verdict: Recommendation, growth: f64, decay: f64) {
        match verdict {
            Recommendation::Allow => {
                self.reputation_score = (self.reputation_score + growth).min(1.0);
            }
            Recommendation::Investigate => {
                self.reputation_score = (self.reputation_score - decay / 2.0).max(0.0);
            }
            Recommendation::Block => {
                self.reputation_score = (self.reputation_score - decay).max(0.0);
                self.blocked_prompts += 1;
            }
        }
        self.total_prompts += 1;
        self.last_activity = Utc::now();
    }

    /// Record violation tags into the bounded recent window
    pub fn record_violations(&mut self, tags: &[String], window: usize) {
        for tag in tags {
            self.recent_violations.push(tag.clone());
        }
        if self.recent_violations.len() > window {
            let excess = self.recent_violations.len() - window;
            self.recent_violations.drain(..excess);
        }
    }

    pub fn is_trusted(&self, trusted_threshold: f64) -> bool {
        self.reputation_score > trusted_threshold
    }
}

/// Outcome of one analyze request. Immutable after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub prompt1_id: String,
    pub prompt2_id: String,
    pub scores: crate::similarity::ScoreSet,
    pub is_similar: bool,
    pub verdict: Recommendation,
    pub confidence: f64,
    pub llm_response: Option<String>,
    pub explanation: String,
    pub findings: Vec<AgentFinding>,
    /// False when the commit failed partway; earlier writes in the commit
    /// sequence may have landed, so callers must treat reputation and
    /// graph state as at most partially updated
    pub persisted: bool,
    /// True when the semantic metric or the completion call was unavailable
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}
