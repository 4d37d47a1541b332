// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Agent pipeline integration tests over crafted contexts

use std::collections::HashMap;

use prompt_sentinel::agents::{AgentConfig, AgentContext, AgentOrchestrator};
use prompt_sentinel::similarity::ScoreSet;
use prompt_sentinel::types::{Prompt, Recommendation, UserProfile};

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

fn context(user_id: &str) -> AgentContext {
    AgentContext {
        user_id: user_id.to_string(),
        prompt1: Prompt::new(user_id, "first prompt"),
        prompt2: Prompt::new(user_id, "second prompt"),
        scores: ScoreSet {
            jaccard: 0.1,
            cosine: 0.1,
            levenshtein: 0.1,
            semantic: Some(0.1),
        },
        is_similar: false,
        threshold: 0.7,
        profile: UserProfile::new(user_id, 0.5),
        pattern_stats: HashMap::new(),
        similar_count: 0,
        findings: Vec::new(),
    }
}

#[tokio::test]
async fn test_clean_context_is_allowed() {
    let orchestrator = AgentOrchestrator::new(&config());
    let adjudication = orchestrator.run(context("user-1")).await;
    assert_eq!(adjudication.verdict, Recommendation::Allow);
    assert!(adjudication.confidence > 0.5);
}

#[tokio::test]
async fn test_critical_issue_from_default_user_is_blocked() {
    let orchestrator = AgentOrchestrator::new(&config());
    let mut context = context("user-1");
    context.prompt1.issues = vec!["sql_injection".to_string()];
    let adjudication = orchestrator.run(context).await;
    assert_eq!(adjudication.verdict, Recommendation::Block);
    assert!(adjudication.confidence >= 0.75);
}

#[tokio::test]
async fn test_trusted_user_gets_investigate_finding_not_forced_block() {
    let orchestrator = AgentOrchestrator::new(&config());
    let mut context = context("user-1");
    context.prompt1.issues = vec!["prompt_injection".to_string()];
    context.profile.reputation_score = 0.9;
    let adjudication = orchestrator.run(context).await;

    // Trust converts the hard block into scrutiny
    assert_ne!(adjudication.verdict, Recommendation::Block);
    assert!(adjudication
        .findings
        .iter()
        .any(|f| f.agent == "safety_agent"
            && f.recommendation == Recommendation::Investigate));
}

#[tokio::test]
async fn test_low_reputation_blocks_even_clean_prompts() {
    let orchestrator = AgentOrchestrator::new(&config());
    let mut context = context("user-1");
    context.profile.reputation_score = 0.05;
    let adjudication = orchestrator.run(context).await;
    assert_eq!(adjudication.verdict, Recommendation::Block);
}

#[tokio::test]
async fn test_violation_history_blocks() {
    let orchestrator = AgentOrchestrator::new(&config());
    let mut context = context("user-1");
    context.profile.recent_violations =
        (0..6).map(|_| "xss_attack".to_string()).collect();
    let adjudication = orchestrator.run(context).await;
    assert_eq!(adjudication.verdict, Recommendation::Block);
}

#[tokio::test]
async fn test_attack_lineage_blocks_via_similarity_agent() {
    let orchestrator = AgentOrchestrator::new(&config());
    let mut context = context("user-1");
    context.prompt1.issues = vec!["xss_attack".to_string()];
    context.profile.reputation_score = 0.9;
    context.pattern_stats.insert("xss_attack".to_string(), 4);
    let adjudication = orchestrator.run(context).await;

    // High reputation does not shield repeated identical attacks
    assert_eq!(adjudication.verdict, Recommendation::Block);
    assert!(adjudication
        .findings
        .iter()
        .any(|f| f.agent == "similarity_agent"
            && f.recommendation == Recommendation::Block));
}

#[tokio::test]
async fn test_explanation_lists_contributing_findings() {
    let orchestrator = AgentOrchestrator::new(&config());
    let adjudication = orchestrator.run(context("user-1")).await;
    assert!(adjudication.explanation.contains("similarity_agent"));
    assert!(adjudication.explanation.contains("safety_agent"));
    assert!(adjudication.explanation.contains("allow"));
}
