// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decision agent: folds prior findings into the final verdict
//!
//! Two-stage rule. A block finding at or above the high-confidence
//! threshold forces the verdict regardless of other opinions. Otherwise
//! each recommendation class accumulates the confidence of its findings
//! and the heaviest class wins, ties resolving toward the more
//! conservative class.

use async_trait::async_trait;

use super::{AgentConfig, AgentContext, SecurityAgent};
use crate::errors::SentinelError;
use crate::types::{AgentFinding, Recommendation};

pub const AGENT_NAME: &str = "decision_agent";

pub struct DecisionAgent {
    high_confidence_threshold: f64,
}

impl DecisionAgent {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            high_confidence_threshold: config.high_confidence_threshold,
        }
    }
}

#[async_trait]
impl SecurityAgent for DecisionAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn evaluate(&self, context: &AgentContext) -> Result<AgentFinding, SentinelError> {
        if context.findings.is_empty() {
            // No evidence at all; refuse to wave the request through
            return Ok(
                AgentFinding::new(AGENT_NAME, Recommendation::Investigate, 0.5)
                    .with_detail("reason", serde_json::json!("no_findings")),
            );
        }

        if let Some(forced) = context
            .findings
            .iter()
            .filter(|f| {
                f.recommendation == Recommendation::Block
                    && f.confidence >= self.high_confidence_threshold
            })
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        {
            return Ok(
                AgentFinding::new(AGENT_NAME, Recommendation::Block, forced.confidence)
                    .with_detail("reason", serde_json::json!("high_confidence_block"))
                    .with_detail("forced_by", serde_json::json!(forced.agent)),
            );
        }

        let classes = [
            Recommendation::Allow,
            Recommendation::Investigate,
            Recommendation::Block,
        ];
        let mut verdict = Recommendation::Allow;
        let mut best_weight = f64::MIN;
        let mut best_count = 0usize;
        for class in classes {
            let mut weight = 0.0;
            let mut count = 0usize;
            for finding in &context.findings {
                if finding.recommendation == class {
                    weight += finding.confidence;
                    count += 1;
                }
            }
            // >= walks toward the conservative end on ties
            if count > 0 && weight >= best_weight {
                verdict = class;
                best_weight = weight;
                best_count = count;
            }
        }

        // Confidence is the mean confidence of the winning class
        let confidence = best_weight / best_count as f64;
        Ok(AgentFinding::new(AGENT_NAME, verdict, confidence)
            .with_detail("reason", serde_json::json!("weighted_vote"))
            .with_detail("winning_weight", serde_json::json!(best_weight)))
    }
}
