// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Analysis engine: the one entry point for prompt-pair adjudication
//!
//! Pipeline per request: validate, sanitize, score, adjudicate, then
//! commit. Nothing is persisted until the verdict exists; the commit phase
//! runs under the user's lock so concurrent requests from one user
//! serialize while different users proceed in parallel. A failed commit
//! degrades the response (`persisted: false`) instead of failing it.

use chrono::Utc;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::agents::{AgentConfig, AgentContext, AgentOrchestrator};
use crate::config::Settings;
use crate::errors::SentinelError;
use crate::graph::{BehaviorGraph, GraphView, DEFAULT_TRAVERSE_DEPTH};
use crate::llm::{build_capability, LlmCapability};
use crate::monitoring::{EngineMetrics, EngineMetricsSnapshot};
use crate::reputation::{ReputationConfig, ReputationStore};
use crate::sanitize::{issue_tags, CompositeSanitizer, PatternTag};
use crate::similarity::{SimilarityConfig, SimilarityEngine};
use crate::types::{
    AnalysisResult, Prompt, PromptStatus, Recommendation, SimilarityMetric, UserProfile,
};

/// One analyze call. `metric` names the caller's metric of interest for
/// reporting; thresholding always uses the best available score.
/// `threshold` defaults from settings.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub user_id: String,
    pub prompt1: String,
    pub prompt2: String,
    pub metric: Option<SimilarityMetric>,
    pub threshold: Option<f64>,
}

pub struct AnalysisEngine {
    sanitizer: CompositeSanitizer,
    similarity: SimilarityEngine,
    llm: Arc<dyn LlmCapability>,
    graph: BehaviorGraph,
    reputation: ReputationStore,
    orchestrator: AgentOrchestrator,
    metrics: EngineMetrics,
    settings: Settings,
}

impl AnalysisEngine {
    /// Build an engine with an explicit capability, used by tests to
    /// inject stubs
    pub fn with_capability(
        settings: Settings,
        llm: Arc<dyn LlmCapability>,
    ) -> anyhow::Result<Self> {
        let sanitizer = CompositeSanitizer::new(&settings)?;
        let similarity = SimilarityEngine::new(
            llm.clone(),
            SimilarityConfig {
                cache_ttl: settings.score_cache_ttl,
                cache_entries: settings.score_cache_entries,
                embedding_cache_entries: settings.embedding_cache_entries,
                embed_timeout: settings.embed_timeout,
            },
        );
        let reputation = ReputationStore::new(ReputationConfig {
            default_reputation: settings.default_reputation,
            growth: settings.reputation_growth,
            decay: settings.reputation_decay,
            violation_window: settings.violation_window,
        });
        let orchestrator = AgentOrchestrator::new(&AgentConfig::from(&settings));
        Ok(Self {
            sanitizer,
            similarity,
            llm,
            graph: BehaviorGraph::new(),
            reputation,
            orchestrator,
            metrics: EngineMetrics::new(),
            settings,
        })
    }

    /// Build an engine with the backend named in settings
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let llm = build_capability(&settings)?;
        Self::with_capability(settings, llm)
    }

    /// Run the full pipeline for one prompt pair
    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResult, SentinelError> {
        let threshold = self.validate(&request)?;

        let prompt1 = self.sanitized_prompt(&request.user_id, &request.prompt1)?;
        let prompt2 = self.sanitized_prompt(&request.user_id, &request.prompt2)?;

        let scores = self
            .similarity
            .score_all(&prompt1.sanitized_content, &prompt2.sanitized_content)
            .await;
        // Every computed metric informs the similarity decision; the
        // requested metric is reported back, never used to narrow it
        let max_score = scores.max_available();
        let is_similar = max_score >= threshold;

        // Evidence snapshots exclude the request being decided
        let profile = self.reputation.get_or_create(&request.user_id).await;
        let pattern_stats = self.graph.user_pattern_stats(&request.user_id).await;
        let similar_count = self.graph.user_similar_count(&request.user_id).await;

        let context = AgentContext {
            user_id: request.user_id.clone(),
            prompt1: prompt1.clone(),
            prompt2: prompt2.clone(),
            scores: scores.clone(),
            is_similar,
            threshold,
            profile,
            pattern_stats,
            similar_count,
            findings: Vec::new(),
        };
        let adjudication = self.orchestrator.run(context).await;

        let (llm_response, completion_degraded) = if adjudication.verdict == Recommendation::Allow
        {
            self.completion(&prompt1.sanitized_content).await
        } else {
            (None, false)
        };

        let persisted = self
            .commit(&request, &prompt1, &prompt2, &adjudication.verdict, is_similar, max_score)
            .await;

        self.metrics
            .record_request(adjudication.verdict == Recommendation::Block, max_score)
            .await;

        info!(
            user_id = %request.user_id,
            verdict = %adjudication.verdict,
            metric = ?request.metric,
            is_similar,
            max_score,
            persisted,
            "analysis complete"
        );

        Ok(AnalysisResult {
            prompt1_id: prompt1.id,
            prompt2_id: prompt2.id,
            degraded: scores.is_degraded() || completion_degraded,
            scores,
            is_similar,
            verdict: adjudication.verdict,
            confidence: adjudication.confidence,
            llm_response,
            explanation: adjudication.explanation,
            findings: adjudication.findings,
            persisted,
            timestamp: Utc::now(),
        })
    }

    pub async fn get_user_profile(&self, user_id: &str) -> Result<UserProfile, SentinelError> {
        self.reputation
            .get(user_id)
            .await
            .ok_or_else(|| SentinelError::NotFound(format!("user {}", user_id)))
    }

    pub async fn get_graph_view(
        &self,
        node_id: &str,
        max_depth: Option<usize>,
    ) -> Result<GraphView, SentinelError> {
        self.graph
            .traverse(node_id, max_depth.unwrap_or(DEFAULT_TRAVERSE_DEPTH))
            .await
    }

    pub async fn metrics_snapshot(&self) -> EngineMetricsSnapshot {
        let users = self.reputation.user_count().await as u64;
        self.metrics.snapshot(users).await
    }

    fn validate(&self, request: &AnalyzeRequest) -> Result<f64, SentinelError> {
        if request.prompt1.trim().is_empty() {
            return Err(SentinelError::EmptyPrompt("prompt1"));
        }
        if request.prompt2.trim().is_empty() {
            return Err(SentinelError::EmptyPrompt("prompt2"));
        }
        let threshold = request
            .threshold
            .unwrap_or(self.settings.similarity_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SentinelError::InvalidThreshold(threshold));
        }
        Ok(threshold)
    }

    fn sanitized_prompt(&self, user_id: &str, content: &str) -> Result<Prompt, SentinelError> {
        let mut prompt = Prompt::new(user_id, content);
        let (sanitized, issues) = self.sanitizer.sanitize(content)?;
        prompt.apply_sanitization(sanitized, issue_tags(&issues));
        Ok(prompt)
    }

    /// Completion for allowed requests. Unavailability degrades the
    /// response; the verdict is already fixed at this point.
    async fn completion(&self, sanitized: &str) -> (Option<String>, bool) {
        let outcome = timeout(
            self.settings.complete_timeout,
            self.llm.complete(sanitized),
        )
        .await;
        match outcome {
            Ok(Ok(response)) => match self.sanitizer.sanitize(&response) {
                Ok((clean, _)) => (Some(clean), false),
                Err(err) => {
                    warn!(error = %err, "completion output failed sanitization, dropping it");
                    (None, true)
                }
            },
            Ok(Err(err)) => {
                warn!(error = %err, "completion unavailable, degrading");
                (None, true)
            }
            Err(_) => {
                warn!("completion timed out, degrading");
                (None, true)
            }
        }
    }

    /// Commit all side effects under the user's lock: the reputation
    /// update and every graph write happen in one serialized section.
    /// Writes are sequential, not transactional; a failure partway
    /// through returns false with the earlier writes already landed,
    /// which is what `persisted = false` reports.
    async fn commit(
        &self,
        request: &AnalyzeRequest,
        prompt1: &Prompt,
        prompt2: &Prompt,
        verdict: &Recommendation,
        is_similar: bool,
        max_score: f64,
    ) -> bool {
        let _guard = self.reputation.lock_user(&request.user_id).await;

        // Violations only count against the user when the verdict did
        let violation_tags: Vec<String> = if *verdict == Recommendation::Allow {
            Vec::new()
        } else {
            let mut tags = prompt1.issues.clone();
            for tag in &prompt2.issues {
                if !tags.contains(tag) {
                    tags.push(tag.clone());
                }
            }
            tags
        };

        let profile = self
            .reputation
            .apply_outcome(&request.user_id, *verdict, &violation_tags)
            .await;

        let final_status = |prompt: &Prompt| match verdict {
            Recommendation::Block => PromptStatus::Blocked,
            Recommendation::Investigate => PromptStatus::Suspicious,
            Recommendation::Allow => {
                if prompt.issues.is_empty() {
                    PromptStatus::Safe
                } else {
                    PromptStatus::Suspicious
                }
            }
        };
        let weighted_tags = |prompt: &Prompt| -> Vec<(String, f64)> {
            prompt
                .issues
                .iter()
                .map(|tag| {
                    let confidence = PatternTag::parse(tag)
                        .map(|t| t.confidence())
                        .unwrap_or(0.5);
                    (tag.clone(), confidence)
                })
                .collect()
        };

        self.graph
            .record_prompt(
                &request.user_id,
                &prompt1.id,
                final_status(prompt1),
                profile.reputation_score,
                &weighted_tags(prompt1),
            )
            .await;
        self.graph
            .record_prompt(
                &request.user_id,
                &prompt2.id,
                final_status(prompt2),
                profile.reputation_score,
                &weighted_tags(prompt2),
            )
            .await;
        self.graph
            .refresh_user(&request.user_id, profile.reputation_score)
            .await;

        if is_similar {
            if let Err(err) = self
                .graph
                .link_similar(&prompt1.id, &prompt2.id, max_score.clamp(0.0, 1.0))
                .await
            {
                warn!(error = %err, "similar_to link failed, reporting unpersisted");
                return false;
            }
        }
        true
    }
}
