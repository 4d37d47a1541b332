// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Safety agent: user standing and detected threat patterns
//!
//! Checks run from strongest signal to weakest; the first that fires
//! determines the recommendation. Reputation and violation history are
//! snapshots taken before this request, so a user's first offense is judged
//! on the prompt content alone.

use async_trait::async_trait;

use super::{AgentConfig, AgentContext, SecurityAgent};
use crate::errors::SentinelError;
use crate::sanitize::PatternTag;
use crate::types::{AgentFinding, Recommendation};

pub const AGENT_NAME: &str = "safety_agent";

pub struct SafetyAgent {
    low_trust_threshold: f64,
    trusted_threshold: f64,
    violation_limit: usize,
}

impl SafetyAgent {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            low_trust_threshold: config.low_trust_threshold,
            trusted_threshold: config.trusted_threshold,
            violation_limit: config.violation_limit,
        }
    }

    fn critical_tags<'a>(&self, context: &'a AgentContext) -> Vec<&'a str> {
        context
            .issue_tags()
            .into_iter()
            .filter(|tag| {
                PatternTag::parse(tag)
                    .map(|t| t.is_critical())
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[async_trait]
impl SecurityAgent for SafetyAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn evaluate(&self, context: &AgentContext) -> Result<AgentFinding, SentinelError> {
        let reputation = context.profile.reputation_score;
        let critical = self.critical_tags(context);

        let finding = if reputation < self.low_trust_threshold {
            AgentFinding::new(AGENT_NAME, Recommendation::Block, 0.9)
                .with_detail("reason", serde_json::json!("low_reputation"))
        } else if context.profile.recent_violations.len() > self.violation_limit {
            AgentFinding::new(AGENT_NAME, Recommendation::Block, 0.85).with_detail(
                "reason",
                serde_json::json!("violation_history"),
            )
        } else if !critical.is_empty() && !context.profile.is_trusted(self.trusted_threshold) {
            AgentFinding::new(AGENT_NAME, Recommendation::Block, 0.8)
                .with_detail("reason", serde_json::json!("critical_pattern"))
        } else if !critical.is_empty() {
            // Trusted users get scrutiny instead of an outright block
            AgentFinding::new(AGENT_NAME, Recommendation::Investigate, 0.6)
                .with_detail("reason", serde_json::json!("critical_pattern_trusted_user"))
        } else {
            AgentFinding::new(AGENT_NAME, Recommendation::Allow, 0.8)
        };

        Ok(finding
            .with_detail("reputation", serde_json::json!(reputation))
            .with_detail(
                "recent_violations",
                serde_json::json!(context.profile.recent_violations.len()),
            )
            .with_detail("critical_tags", serde_json::json!(critical)))
    }
}
