// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod agents;
pub mod config;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod llm;
pub mod monitoring;
pub mod reputation;
pub mod sanitize;
pub mod similarity;
pub mod types;

// Re-export the engine surface
pub use engine::{AnalysisEngine, AnalyzeRequest};
pub use errors::SentinelError;
pub use types::{AnalysisResult, Recommendation, SimilarityMetric, UserProfile};

// Re-export supporting types callers commonly need
pub use config::{LlmBackend, Settings};
pub use graph::{BehaviorGraph, GraphView};
pub use llm::{LlmCapability, LocalLlm, OpenAiCompatClient, StubLlm};
pub use monitoring::EngineMetricsSnapshot;
pub use similarity::ScoreSet;
