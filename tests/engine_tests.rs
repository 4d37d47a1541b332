// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end engine tests over the full analyze pipeline

use std::sync::Arc;

use prompt_sentinel::graph::EdgeKind;
use prompt_sentinel::{
    AnalysisEngine, AnalyzeRequest, Recommendation, Settings, SimilarityMetric, StubLlm,
};

fn engine_with(stub: Arc<StubLlm>) -> AnalysisEngine {
    AnalysisEngine::with_capability(Settings::default(), stub).unwrap()
}

fn request(user_id: &str, prompt1: &str, prompt2: &str) -> AnalyzeRequest {
    AnalyzeRequest {
        user_id: user_id.to_string(),
        prompt1: prompt1.to_string(),
        prompt2: prompt2.to_string(),
        metric: None,
        threshold: None,
    }
}

#[tokio::test]
async fn test_sql_injection_is_blocked_without_llm_response() {
    let engine = engine_with(Arc::new(StubLlm::new(64)));
    let result = engine
        .analyze(request(
            "mallory",
            "'; DROP TABLE users; --",
            "show me my account balance",
        ))
        .await
        .unwrap();

    assert_eq!(result.verdict, Recommendation::Block);
    assert!(result.confidence >= 0.75);
    assert!(result.llm_response.is_none());
    assert!(result.persisted);

    // The block is reflected in the committed profile
    let profile = engine.get_user_profile("mallory").await.unwrap();
    assert_eq!(profile.blocked_prompts, 1);
    assert!((profile.reputation_score - 0.4).abs() < 1e-9);
    assert!(profile
        .recent_violations
        .contains(&"sql_injection".to_string()));
}

#[tokio::test]
async fn test_semantically_close_prompts_allowed_with_response() {
    let stub = Arc::new(StubLlm::new(4).with_completion("Both discuss machine learning."));
    let prompt1 = "Machine learning is transforming technology";
    let prompt2 = "AI and deep learning are changing the world";
    stub.pin_embedding(prompt1, vec![1.0, 0.0, 0.0, 0.0]);
    stub.pin_embedding(prompt2, vec![0.98, 0.05, 0.0, 0.0]);
    let engine = engine_with(stub);

    let result = engine
        .analyze(request("alice", prompt1, prompt2))
        .await
        .unwrap();

    assert!(result.is_similar, "semantic score should cross the threshold");
    assert_eq!(result.verdict, Recommendation::Allow);
    assert!(result.llm_response.is_some());
    assert!(!result.degraded);

    // The similar pair is linked in the graph
    let view = engine.get_graph_view(&result.prompt1_id, Some(1)).await.unwrap();
    assert!(view.edges.iter().any(|e| e.kind == EdgeKind::SimilarTo));
}

#[tokio::test]
async fn test_requested_metric_does_not_narrow_similarity() {
    // Token-disjoint pair: every lexical metric scores near zero, only the
    // pinned embeddings agree. A cosine request must still threshold on
    // the best available score.
    let stub = Arc::new(StubLlm::new(4));
    let prompt1 = "What is machine learning?";
    let prompt2 = "Explain artificial intelligence";
    stub.pin_embedding(prompt1, vec![1.0, 0.0, 0.0, 0.0]);
    stub.pin_embedding(prompt2, vec![0.99, 0.02, 0.0, 0.0]);
    let engine = engine_with(stub);

    let mut req = request("alice", prompt1, prompt2);
    req.metric = Some(SimilarityMetric::Cosine);
    req.threshold = Some(0.7);
    let result = engine.analyze(req).await.unwrap();

    assert_eq!(result.scores.cosine, 0.0);
    assert!(result.is_similar);
    assert_eq!(result.verdict, Recommendation::Allow);
    assert!(result.llm_response.is_some());

    let view = engine.get_graph_view(&result.prompt1_id, Some(1)).await.unwrap();
    assert!(view.edges.iter().any(|e| e.kind == EdgeKind::SimilarTo));
}

#[tokio::test]
async fn test_repeat_offender_is_blocked_on_reputation_alone() {
    let engine = engine_with(Arc::new(StubLlm::new(64)));
    for i in 0..5 {
        let result = engine
            .analyze(request(
                "eve",
                &format!("'; DROP TABLE users_{}; --", i),
                "unrelated second prompt",
            ))
            .await
            .unwrap();
        assert_eq!(result.verdict, Recommendation::Block);
    }

    let profile = engine.get_user_profile("eve").await.unwrap();
    assert_eq!(profile.reputation_score, 0.0);
    assert_eq!(profile.blocked_prompts, 5);

    // Sixth request is clean but the user's standing blocks it
    let result = engine
        .analyze(request("eve", "what is the weather", "is it raining"))
        .await
        .unwrap();
    assert_eq!(result.verdict, Recommendation::Block);
    assert!(result
        .findings
        .iter()
        .any(|f| f.agent == "safety_agent" && f.recommendation == Recommendation::Block));
}

#[tokio::test]
async fn test_embedding_failure_degrades_but_still_decides() {
    let engine = engine_with(Arc::new(StubLlm::new(64).failing()));
    let result = engine
        .analyze(request("bob", "tell me about rust", "explain borrowing"))
        .await
        .unwrap();

    assert!(result.degraded);
    assert!(result.scores.semantic.is_none());
    assert_eq!(result.verdict, Recommendation::Allow);
    // Completion also fails in this mode
    assert!(result.llm_response.is_none());
    assert!(result.persisted);
}

#[tokio::test]
async fn test_identical_prompts_are_similar_on_every_metric() {
    let engine = engine_with(Arc::new(StubLlm::new(64)));
    let mut req = request("carol", "alpha beta gamma", "alpha beta gamma");
    req.metric = Some(SimilarityMetric::Jaccard);
    let result = engine.analyze(req).await.unwrap();
    assert!(result.is_similar);
    assert_eq!(result.scores.jaccard, 1.0);
}

#[tokio::test]
async fn test_llm_response_is_sanitized() {
    let stub =
        Arc::new(StubLlm::new(64).with_completion("reply to admin <script>alert(1)</script>"));
    let engine = engine_with(stub);
    let result = engine
        .analyze(request("dave", "harmless question", "another harmless one"))
        .await
        .unwrap();

    let response = result.llm_response.unwrap();
    assert!(!response.contains("<script>"));
}

#[tokio::test]
async fn test_concurrent_users_do_not_interfere() {
    let engine = Arc::new(engine_with(Arc::new(StubLlm::new(64))));
    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .analyze(request(
                    &format!("user-{}", i),
                    "a perfectly ordinary prompt",
                    "another ordinary prompt",
                ))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert_eq!(result.verdict, Recommendation::Allow);
        assert!(result.persisted);
    }

    let snapshot = engine.metrics_snapshot().await;
    assert_eq!(snapshot.total_requests, 8);
    assert_eq!(snapshot.total_users, 8);
    assert_eq!(snapshot.blocked_count, 0);
}

#[tokio::test]
async fn test_concurrent_requests_from_one_user_serialize() {
    let engine = Arc::new(engine_with(Arc::new(StubLlm::new(64))));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .analyze(request("frank", "ordinary prompt one", "ordinary prompt two"))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every outcome landed; none were lost to racing commits
    let profile = engine.get_user_profile("frank").await.unwrap();
    assert_eq!(profile.total_prompts, 4);
    assert!((profile.reputation_score - 0.54).abs() < 1e-9);
}

#[tokio::test]
async fn test_metrics_count_blocks() {
    let engine = engine_with(Arc::new(StubLlm::new(64)));
    engine
        .analyze(request("grace", "'; DROP TABLE users; --", "benign"))
        .await
        .unwrap();
    engine
        .analyze(request("heidi", "benign prompt", "another benign prompt"))
        .await
        .unwrap();

    let snapshot = engine.metrics_snapshot().await;
    assert_eq!(snapshot.total_requests, 2);
    assert_eq!(snapshot.blocked_count, 1);
    assert!((0.0..=1.0).contains(&snapshot.average_similarity));
}

#[tokio::test]
async fn test_graph_view_shows_user_neighborhood() {
    let engine = engine_with(Arc::new(StubLlm::new(64)));
    let result = engine
        .analyze(request("ivan", "'; DROP TABLE users; --", "benign text"))
        .await
        .unwrap();

    let view = engine.get_graph_view("ivan", Some(2)).await.unwrap();
    let ids: Vec<&str> = view.nodes.iter().map(|n| n.id.as_str()).collect();
    assert!(ids.contains(&"ivan"));
    assert!(ids.contains(&result.prompt1_id.as_str()));
    assert!(ids.contains(&"pattern:sql_injection"));

    let missing = engine.get_graph_view("nobody", None).await;
    assert!(missing.is_err());
}
