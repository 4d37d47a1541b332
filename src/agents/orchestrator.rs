// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline orchestrator with fail-secure error isolation
//!
//! Agents run sequentially; a failing agent is replaced by a
//! low-confidence block finding so one crash degrades the decision toward
//! caution instead of taking the pipeline down.

use tracing::{info, warn};

use super::{
    AgentConfig, AgentContext, DecisionAgent, SafetyAgent, SecurityAgent, SimilarityAgent,
};
use crate::types::{AgentFinding, Recommendation};

/// Confidence assigned to the substitute finding for a crashed agent
const FAILURE_CONFIDENCE: f64 = 0.2;

/// Final verdict plus the full evidence trail
pub struct Adjudication {
    pub verdict: Recommendation,
    pub confidence: f64,
    pub explanation: String,
    pub findings: Vec<AgentFinding>,
}

pub struct AgentOrchestrator {
    agents: Vec<Box<dyn SecurityAgent>>,
    decision: DecisionAgent,
}

impl AgentOrchestrator {
    pub fn new(config: &AgentConfig) -> Self {
        let agents: Vec<Box<dyn SecurityAgent>> = vec![
            Box::new(SimilarityAgent::new(config)),
            Box::new(SafetyAgent::new(config)),
        ];
        Self {
            agents,
            decision: DecisionAgent::new(config),
        }
    }

    #[cfg(test)]
    pub fn with_agents(agents: Vec<Box<dyn SecurityAgent>>, config: &AgentConfig) -> Self {
        Self {
            agents,
            decision: DecisionAgent::new(config),
        }
    }

    pub async fn run(&self, mut context: AgentContext) -> Adjudication {
        for agent in &self.agents {
            let finding = match agent.evaluate(&context).await {
                Ok(finding) => finding,
                Err(err) => {
                    warn!(agent = agent.name(), error = %err, "agent failed, substituting conservative finding");
                    AgentFinding::new(agent.name(), Recommendation::Block, FAILURE_CONFIDENCE)
                        .with_detail("reason", serde_json::json!("agent_failure"))
                        .with_detail("error", serde_json::json!(err.to_string()))
                }
            };
            context.findings.push(finding);
        }

        let decision = match self.decision.evaluate(&context).await {
            Ok(finding) => finding,
            Err(err) => {
                warn!(error = %err, "decision agent failed, blocking conservatively");
                AgentFinding::new(
                    self.decision.name(),
                    Recommendation::Block,
                    FAILURE_CONFIDENCE,
                )
                .with_detail("reason", serde_json::json!("agent_failure"))
            }
        };

        let verdict = decision.recommendation;
        let confidence = decision.confidence;
        let explanation = Self::explain(&decision, &context.findings);
        info!(
            user_id = %context.user_id,
            verdict = %verdict,
            confidence,
            "agent pipeline adjudicated"
        );

        let mut findings = context.findings;
        findings.push(decision);
        Adjudication {
            verdict,
            confidence,
            explanation,
            findings,
        }
    }

    fn explain(decision: &AgentFinding, findings: &[AgentFinding]) -> String {
        let reason = decision
            .details
            .get("reason")
            .and_then(|v| v.as_str())
            .unwrap_or("weighted_vote");
        let opinions: Vec<String> = findings
            .iter()
            .map(|f| format!("{}={} ({:.2})", f.agent, f.recommendation, f.confidence))
            .collect();
        format!(
            "{} via {}: {}",
            decision.recommendation,
            reason,
            opinions.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::test_support;
    use crate::errors::SentinelError;
    use async_trait::async_trait;

    fn config() -> AgentConfig {
        AgentConfig {
            low_trust_threshold: 0.3,
            trusted_threshold: 0.5,
            violation_limit: 5,
            high_confidence_threshold: 0.75,
            repetition_threshold: 3,
            excessive_similar_limit: 5,
        }
    }

    struct CrashingAgent;

    #[async_trait]
    impl SecurityAgent for CrashingAgent {
        fn name(&self) -> &'static str {
            "crashing_agent"
        }

        async fn evaluate(&self, _: &AgentContext) -> Result<AgentFinding, SentinelError> {
            Err(SentinelError::AgentFailure {
                agent: "crashing_agent".to_string(),
                reason: "synthetic failure".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_benign_context_allows() {
        let orchestrator = AgentOrchestrator::new(&config());
        let adjudication = orchestrator.run(test_support::context("user-1")).await;
        assert_eq!(adjudication.verdict, Recommendation::Allow);
        // similarity + safety + decision
        assert_eq!(adjudication.findings.len(), 3);
    }

    #[tokio::test]
    async fn test_critical_issue_forces_block() {
        let orchestrator = AgentOrchestrator::new(&config());
        let mut context = test_support::context("user-1");
        context.prompt1.issues = vec!["sql_injection".to_string()];
        let adjudication = orchestrator.run(context).await;
        assert_eq!(adjudication.verdict, Recommendation::Block);
        assert!(adjudication.confidence >= 0.75);
    }

    #[tokio::test]
    async fn test_agent_failure_is_isolated_and_conservative() {
        let orchestrator = AgentOrchestrator::with_agents(
            vec![Box::new(CrashingAgent), Box::new(SafetyAgent::new(&config()))],
            &config(),
        );
        let adjudication = orchestrator.run(test_support::context("user-1")).await;

        // Pipeline survives; the crash shows up as a block finding
        let substitute = adjudication
            .findings
            .iter()
            .find(|f| f.agent == "crashing_agent")
            .unwrap();
        assert_eq!(substitute.recommendation, Recommendation::Block);
        assert_eq!(substitute.confidence, 0.2);
        // One healthy allow outweighs a 0.2 block
        assert_eq!(adjudication.verdict, Recommendation::Allow);
    }

    #[tokio::test]
    async fn test_explanation_names_every_agent() {
        let orchestrator = AgentOrchestrator::new(&config());
        let adjudication = orchestrator.run(test_support::context("user-1")).await;
        assert!(adjudication.explanation.contains("similarity_agent"));
        assert!(adjudication.explanation.contains("safety_agent"));
    }
}
