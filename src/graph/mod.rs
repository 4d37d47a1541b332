// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Behavior graph of users, prompts and detected patterns
//!
//! A mutable attributed graph that only grows during normal operation.
//! Pattern nodes are shared: one node per issue tag, created on first
//! occurrence and reused by every prompt flagged with that tag. Node and
//! edge storage is insertion-ordered so traversal output is deterministic
//! for a given graph state.
//!
//! Concurrency: reads may run concurrently with writes elsewhere in the
//! graph; mutations for the same user are serialized by the caller (the
//! engine holds the per-user lock across its commit phase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::SentinelError;
use crate::types::PromptStatus;

/// Hard cap on traversal depth, bounding response size and cost
pub const MAX_TRAVERSE_DEPTH: usize = 5;

/// Default traversal depth when the caller does not specify one
pub const DEFAULT_TRAVERSE_DEPTH: usize = 2;

const PATTERN_ID_PREFIX: &str = "pattern:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    User,
    Prompt,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Submitted,
    SimilarTo,
    FlaggedAs,
    FollowedBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    pub attrs: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// Induced subgraph returned by traversal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Default)]
struct GraphInner {
    node_index: HashMap<String, usize>,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    /// Node id -> indices into `edges`, both directions, insertion order
    adjacency: HashMap<String, Vec<usize>>,
    /// Last prompt node per user, for `followed_by` sequencing
    last_prompt: HashMap<String, String>,
}

impl GraphInner {
    fn upsert_node(&mut self, id: &str, kind: NodeKind) -> usize {
        if let Some(&index) = self.node_index.get(id) {
            return index;
        }
        let index = self.nodes.len();
        self.nodes.push(GraphNode {
            id: id.to_string(),
            kind,
            attrs: HashMap::new(),
            created_at: Utc::now(),
        });
        self.node_index.insert(id.to_string(), index);
        self.adjacency.insert(id.to_string(), Vec::new());
        index
    }

    fn add_edge(&mut self, source: &str, target: &str, kind: EdgeKind, weight: f64) {
        let index = self.edges.len();
        self.edges.push(GraphEdge {
            source: source.to_string(),
            target: target.to_string(),
            kind,
            weight,
            created_at: Utc::now(),
        });
        self.adjacency
            .entry(source.to_string())
            .or_default()
            .push(index);
        if source != target {
            self.adjacency
                .entry(target.to_string())
                .or_default()
                .push(index);
        }
    }
}

/// The exclusively-owned behavior graph component
pub struct BehaviorGraph {
    inner: RwLock<GraphInner>,
}

impl Default for BehaviorGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorGraph {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(GraphInner::default()),
        }
    }

    pub fn pattern_node_id(tag: &str) -> String {
        format!("{}{}", PATTERN_ID_PREFIX, tag)
    }

    /// Record one analyzed prompt: lookup-or-create the user node, create
    /// the prompt node and its `submitted` edge, and for each issue tag a
    /// shared pattern node plus a `flagged_as` edge weighted by strategy
    /// confidence. Consecutive prompts of the same user are chained with
    /// `followed_by` edges.
    pub async fn record_prompt(
        &self,
        user_id: &str,
        prompt_id: &str,
        status: PromptStatus,
        reputation: f64,
        issue_tags: &[(String, f64)],
    ) {
        let mut graph = self.inner.write().await;

        let user_index = graph.upsert_node(user_id, NodeKind::User);
        graph.nodes[user_index]
            .attrs
            .insert("reputation".to_string(), serde_json::json!(reputation));

        let prompt_index = graph.upsert_node(prompt_id, NodeKind::Prompt);
        graph.nodes[prompt_index]
            .attrs
            .insert("status".to_string(), serde_json::json!(status));
        graph.nodes[prompt_index]
            .attrs
            .insert("user_id".to_string(), serde_json::json!(user_id));

        graph.add_edge(user_id, prompt_id, EdgeKind::Submitted, 1.0);

        if let Some(previous) = graph.last_prompt.insert(user_id.to_string(), prompt_id.to_string())
        {
            graph.add_edge(&previous, prompt_id, EdgeKind::FollowedBy, 1.0);
        }

        for (tag, confidence) in issue_tags {
            let pattern_id = Self::pattern_node_id(tag);
            let pattern_index = graph.upsert_node(&pattern_id, NodeKind::Pattern);
            let frequency = graph.nodes[pattern_index]
                .attrs
                .get("frequency")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            graph.nodes[pattern_index]
                .attrs
                .insert("frequency".to_string(), serde_json::json!(frequency + 1));
            graph.nodes[pattern_index]
                .attrs
                .insert("tag".to_string(), serde_json::json!(tag));
            graph.add_edge(prompt_id, &pattern_id, EdgeKind::FlaggedAs, *confidence);
        }

        debug!(
            user_id,
            prompt_id,
            tags = issue_tags.len(),
            "recorded prompt in behavior graph"
        );
    }

    /// Refresh the cached reputation snapshot on a user node
    pub async fn refresh_user(&self, user_id: &str, reputation: f64) {
        let mut graph = self.inner.write().await;
        let index = graph.upsert_node(user_id, NodeKind::User);
        graph.nodes[index]
            .attrs
            .insert("reputation".to_string(), serde_json::json!(reputation));
    }

    /// Add a `similar_to` edge between two prompts. Callers only invoke
    /// this above the request threshold; the graph still validates weight.
    pub async fn link_similar(
        &self,
        prompt_a: &str,
        prompt_b: &str,
        weight: f64,
    ) -> Result<(), SentinelError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(SentinelError::Storage(format!(
                "similar_to weight {} outside [0, 1]",
                weight
            )));
        }
        let mut graph = self.inner.write().await;
        graph.upsert_node(prompt_a, NodeKind::Prompt);
        graph.upsert_node(prompt_b, NodeKind::Prompt);
        graph.add_edge(prompt_a, prompt_b, EdgeKind::SimilarTo, weight);
        Ok(())
    }

    /// Breadth-first walk bounded by `max_depth` (clamped to the hard cap),
    /// returning the induced subgraph. Terminates on cyclic structures via
    /// visited-set tracking; output ordering follows insertion order.
    pub async fn traverse(
        &self,
        node_id: &str,
        max_depth: usize,
    ) -> Result<GraphView, SentinelError> {
        let depth_limit = max_depth.min(MAX_TRAVERSE_DEPTH);
        let graph = self.inner.read().await;

        if !graph.node_index.contains_key(node_id) {
            return Err(SentinelError::NotFound(format!("graph node {}", node_id)));
        }

        let mut visited: HashMap<String, usize> = HashMap::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        visited.insert(node_id.to_string(), 0);
        queue.push_back((node_id.to_string(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= depth_limit {
                continue;
            }
            if let Some(edge_indices) = graph.adjacency.get(&current) {
                for &edge_index in edge_indices {
                    let edge = &graph.edges[edge_index];
                    let neighbor = if edge.source == current {
                        &edge.target
                    } else {
                        &edge.source
                    };
                    if !visited.contains_key(neighbor) {
                        visited.insert(neighbor.clone(), depth + 1);
                        queue.push_back((neighbor.clone(), depth + 1));
                    }
                }
            }
        }

        // Induced subgraph in insertion order
        let nodes: Vec<GraphNode> = graph
            .nodes
            .iter()
            .filter(|n| visited.contains_key(&n.id))
            .cloned()
            .collect();
        let edges: Vec<GraphEdge> = graph
            .edges
            .iter()
            .filter(|e| visited.contains_key(&e.source) && visited.contains_key(&e.target))
            .cloned()
            .collect();

        Ok(GraphView { nodes, edges })
    }

    /// Prompts linked `similar_to` the given prompt at or above `min_weight`
    pub async fn similar_neighbors(&self, prompt_id: &str, min_weight: f64) -> Vec<(String, f64)> {
        let graph = self.inner.read().await;
        let mut neighbors = Vec::new();
        if let Some(edge_indices) = graph.adjacency.get(prompt_id) {
            for &edge_index in edge_indices {
                let edge = &graph.edges[edge_index];
                if edge.kind == EdgeKind::SimilarTo && edge.weight >= min_weight {
                    let other = if edge.source == prompt_id {
                        &edge.target
                    } else {
                        &edge.source
                    };
                    neighbors.push((other.clone(), edge.weight));
                }
            }
        }
        neighbors
    }

    /// Per-tag counts of flagged prompts previously submitted by a user
    pub async fn user_pattern_stats(&self, user_id: &str) -> HashMap<String, u64> {
        let graph = self.inner.read().await;
        let mut stats: HashMap<String, u64> = HashMap::new();

        let Some(user_edges) = graph.adjacency.get(user_id) else {
            return stats;
        };
        for &edge_index in user_edges {
            let edge = &graph.edges[edge_index];
            if edge.kind != EdgeKind::Submitted || edge.source != user_id {
                continue;
            }
            let prompt_id = &edge.target;
            if let Some(prompt_edges) = graph.adjacency.get(prompt_id) {
                for &flag_index in prompt_edges {
                    let flag = &graph.edges[flag_index];
                    if flag.kind == EdgeKind::FlaggedAs && &flag.source == prompt_id {
                        let tag = flag
                            .target
                            .strip_prefix(PATTERN_ID_PREFIX)
                            .unwrap_or(&flag.target);
                        *stats.entry(tag.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
        stats
    }

    /// Count of `similar_to` edges touching any of the user's prompts
    pub async fn user_similar_count(&self, user_id: &str) -> usize {
        let graph = self.inner.read().await;
        let mut seen_edges: Vec<usize> = Vec::new();

        let Some(user_edges) = graph.adjacency.get(user_id) else {
            return 0;
        };
        for &edge_index in user_edges {
            let edge = &graph.edges[edge_index];
            if edge.kind != EdgeKind::Submitted || edge.source != user_id {
                continue;
            }
            if let Some(prompt_edges) = graph.adjacency.get(&edge.target) {
                for &similar_index in prompt_edges {
                    if graph.edges[similar_index].kind == EdgeKind::SimilarTo
                        && !seen_edges.contains(&similar_index)
                    {
                        seen_edges.push(similar_index);
                    }
                }
            }
        }
        seen_edges.len()
    }

    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pattern_nodes_are_shared() {
        let graph = BehaviorGraph::new();
        let tags = vec![("sql_injection".to_string(), 0.9)];
        graph
            .record_prompt("user-1", "prompt-1", PromptStatus::Blocked, 0.4, &tags)
            .await;
        graph
            .record_prompt("user-2", "prompt-2", PromptStatus::Blocked, 0.5, &tags)
            .await;

        // 2 users + 2 prompts + 1 shared pattern node
        assert_eq!(graph.node_count().await, 5);

        let view = graph
            .traverse(&BehaviorGraph::pattern_node_id("sql_injection"), 1)
            .await
            .unwrap();
        let flagged = view
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::FlaggedAs)
            .count();
        assert_eq!(flagged, 2);
    }

    #[tokio::test]
    async fn test_pattern_frequency_increments() {
        let graph = BehaviorGraph::new();
        let tags = vec![("xss_attack".to_string(), 0.9)];
        for i in 0..3 {
            graph
                .record_prompt(
                    "user-1",
                    &format!("prompt-{}", i),
                    PromptStatus::Suspicious,
                    0.5,
                    &tags,
                )
                .await;
        }
        let view = graph
            .traverse(&BehaviorGraph::pattern_node_id("xss_attack"), 0)
            .await
            .unwrap();
        assert_eq!(view.nodes.len(), 1);
        assert_eq!(view.nodes[0].attrs["frequency"], serde_json::json!(3));
    }

    #[tokio::test]
    async fn test_traverse_terminates_on_cycle() {
        let graph = BehaviorGraph::new();
        graph
            .record_prompt("user-1", "prompt-a", PromptStatus::Safe, 0.5, &[])
            .await;
        graph
            .record_prompt("user-1", "prompt-b", PromptStatus::Safe, 0.5, &[])
            .await;
        // Mutual similar_to edges form a cycle
        graph.link_similar("prompt-a", "prompt-b", 0.9).await.unwrap();
        graph.link_similar("prompt-b", "prompt-a", 0.9).await.unwrap();

        let view = graph.traverse("prompt-a", 5).await.unwrap();
        assert!(view.nodes.len() >= 2);
    }

    #[tokio::test]
    async fn test_traverse_depth_bound_and_determinism() {
        let graph = BehaviorGraph::new();
        graph
            .record_prompt(
                "user-1",
                "prompt-1",
                PromptStatus::Suspicious,
                0.5,
                &[("sql_injection".to_string(), 0.9)],
            )
            .await;

        // Depth 1 from the user reaches the prompt but not the pattern node
        let shallow = graph.traverse("user-1", 1).await.unwrap();
        assert_eq!(shallow.nodes.len(), 2);

        let deep = graph.traverse("user-1", 2).await.unwrap();
        assert_eq!(deep.nodes.len(), 3);

        // Deterministic ordering for the same graph state
        let again = graph.traverse("user-1", 2).await.unwrap();
        let ids: Vec<&String> = deep.nodes.iter().map(|n| &n.id).collect();
        let ids_again: Vec<&String> = again.nodes.iter().map(|n| &n.id).collect();
        assert_eq!(ids, ids_again);

        // Requests beyond the hard cap are clamped to it
        let capped = graph.traverse("user-1", 10).await.unwrap();
        let at_cap = graph.traverse("user-1", MAX_TRAVERSE_DEPTH).await.unwrap();
        let capped_ids: Vec<&String> = capped.nodes.iter().map(|n| &n.id).collect();
        let at_cap_ids: Vec<&String> = at_cap.nodes.iter().map(|n| &n.id).collect();
        assert_eq!(capped_ids, at_cap_ids);
        assert_eq!(capped.edges.len(), at_cap.edges.len());
    }

    #[tokio::test]
    async fn test_traverse_unknown_node() {
        let graph = BehaviorGraph::new();
        let err = graph.traverse("missing", 2).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_link_similar_rejects_bad_weight() {
        let graph = BehaviorGraph::new();
        assert!(graph.link_similar("a", "b", 1.5).await.is_err());
        assert!(graph.link_similar("a", "b", 0.8).await.is_ok());
    }

    #[tokio::test]
    async fn test_user_pattern_stats_counts_per_tag() {
        let graph = BehaviorGraph::new();
        for i in 0..4 {
            graph
                .record_prompt(
                    "user-1",
                    &format!("prompt-{}", i),
                    PromptStatus::Blocked,
                    0.3,
                    &[("sql_injection".to_string(), 0.9)],
                )
                .await;
        }
        let stats = graph.user_pattern_stats("user-1").await;
        assert_eq!(stats.get("sql_injection"), Some(&4));
        assert_eq!(stats.get("xss_attack"), None);
    }

    #[tokio::test]
    async fn test_followed_by_chains_submissions() {
        let graph = BehaviorGraph::new();
        graph
            .record_prompt("user-1", "prompt-1", PromptStatus::Safe, 0.5, &[])
            .await;
        graph
            .record_prompt("user-1", "prompt-2", PromptStatus::Safe, 0.5, &[])
            .await;

        let view = graph.traverse("user-1", 2).await.unwrap();
        let followed: Vec<_> = view
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::FollowedBy)
            .collect();
        assert_eq!(followed.len(), 1);
        assert_eq!(followed[0].source, "prompt-1");
        assert_eq!(followed[0].target, "prompt-2");
    }
}
