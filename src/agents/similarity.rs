// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Similarity agent: score interpretation and submission-pattern lineage
//!
//! Reads the score set plus two graph snapshots: how often the user was
//! previously flagged with the tags present on this request (attack
//! lineage) and how many similar_to links already touch their prompts.

use async_trait::async_trait;

use super::{AgentConfig, AgentContext, SecurityAgent};
use crate::errors::SentinelError;
use crate::types::{AgentFinding, Recommendation};

pub const AGENT_NAME: &str = "similarity_agent";

pub struct SimilarityAgent {
    repetition_threshold: u64,
    excessive_similar_limit: usize,
}

impl SimilarityAgent {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            repetition_threshold: config.repetition_threshold,
            excessive_similar_limit: config.excessive_similar_limit,
        }
    }

    /// Tags on this request the user has already been flagged with at or
    /// above the repetition threshold
    fn lineage_tags(&self, context: &AgentContext) -> Vec<String> {
        context
            .issue_tags()
            .into_iter()
            .filter(|tag| {
                context
                    .pattern_stats
                    .get(*tag)
                    .map(|count| *count >= self.repetition_threshold)
                    .unwrap_or(false)
            })
            .map(|tag| tag.to_string())
            .collect()
    }
}

#[async_trait]
impl SecurityAgent for SimilarityAgent {
    fn name(&self) -> &'static str {
        AGENT_NAME
    }

    async fn evaluate(&self, context: &AgentContext) -> Result<AgentFinding, SentinelError> {
        let lineage = self.lineage_tags(context);

        let finding = if !lineage.is_empty() {
            AgentFinding::new(AGENT_NAME, Recommendation::Block, 0.85)
                .with_detail("reason", serde_json::json!("attack_lineage"))
                .with_detail("repeated_tags", serde_json::json!(lineage))
        } else if context.is_similar && context.similar_count >= self.excessive_similar_limit {
            // Many near-duplicate submissions suggest probing, not reuse
            AgentFinding::new(AGENT_NAME, Recommendation::Investigate, 0.6).with_detail(
                "reason",
                serde_json::json!("excessive_similar_prompts"),
            )
        } else {
            AgentFinding::new(AGENT_NAME, Recommendation::Allow, 0.7)
        };

        Ok(finding
            .with_detail("scores", serde_json::json!(context.scores.to_map()))
            .with_detail(
                "max_score",
                serde_json::json!(context.scores.max_available()),
            )
            .with_detail("is_similar", serde_json::json!(context.is_similar))
            .with_detail("threshold", serde_json::json!(context.threshold))
            .with_detail(
                "prior_similar_links",
                serde_json::json!(context.similar_count),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support;

    fn agent() -> SimilarityAgent {
        SimilarityAgent {
            repetition_threshold: 3,
            excessive_similar_limit: 5,
        }
    }

    #[tokio::test]
    async fn test_normal_pair_allows() {
        let context = test_support::context("user-1");
        let finding = agent().evaluate(&context).await.unwrap();
        assert_eq!(finding.recommendation, Recommendation::Allow);
        assert!(finding.details.contains_key("scores"));
    }

    #[tokio::test]
    async fn test_repeated_pattern_blocks_as_lineage() {
        let mut context = test_support::context("user-1");
        context.prompt1.issues = vec!["sql_injection".to_string()];
        context
            .pattern_stats
            .insert("sql_injection".to_string(), 3);
        let finding = agent().evaluate(&context).await.unwrap();
        assert_eq!(finding.recommendation, Recommendation::Block);
        assert_eq!(
            finding.details["reason"],
            serde_json::json!("attack_lineage")
        );
    }

    #[tokio::test]
    async fn test_prior_flags_without_current_tag_do_not_block() {
        let mut context = test_support::context("user-1");
        context
            .pattern_stats
            .insert("sql_injection".to_string(), 10);
        let finding = agent().evaluate(&context).await.unwrap();
        assert_eq!(finding.recommendation, Recommendation::Allow);
    }

    #[tokio::test]
    async fn test_excessive_similar_links_investigate() {
        let mut context = test_support::context("user-1");
        context.is_similar = true;
        context.similar_count = 6;
        let finding = agent().evaluate(&context).await.unwrap();
        assert_eq!(finding.recommendation, Recommendation::Investigate);
        assert_eq!(
            finding.details["reason"],
            serde_json::json!("excessive_similar_prompts")
        );
    }

    #[tokio::test]
    async fn test_similar_links_without_similarity_allow() {
        let mut context = test_support::context("user-1");
        context.similar_count = 6;
        let finding = agent().evaluate(&context).await.unwrap();
        assert_eq!(finding.recommendation, Recommendation::Allow);
    }
}
