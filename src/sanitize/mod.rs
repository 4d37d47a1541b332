// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Textual-threat sanitization engine
//!
//! An ordered, composable set of independent strategies. Each strategy is
//! pure and total: it never fails on well-formed input, returns an empty
//! issue list when nothing is found, and replaces matched spans with a fixed
//! marker. The output of one strategy feeds the next; issues from all
//! strategies are unioned and deduplicated by tag.

pub mod strategies;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::Settings;
use crate::errors::SentinelError;
use strategies::{
    DataExfiltrationStrategy, PersonalInfoStrategy, ProfanityStrategy, PromptInjectionStrategy,
    SqlInjectionStrategy, UrlStrategy, XssStrategy,
};

/// Categories of detected threat patterns.
///
/// Tags are shared with the behavior graph: each tag maps to one pattern
/// node, created on first occurrence and reused afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternTag {
    SqlInjection,
    XssAttack,
    PromptInjection,
    DataExfiltration,
    SuspiciousUrl,
    PersonalInfo,
    Profanity,
}

impl PatternTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternTag::SqlInjection => "sql_injection",
            PatternTag::XssAttack => "xss_attack",
            PatternTag::PromptInjection => "prompt_injection",
            PatternTag::DataExfiltration => "data_exfiltration",
            PatternTag::SuspiciousUrl => "suspicious_url",
            PatternTag::PersonalInfo => "personal_info",
            PatternTag::Profanity => "profanity",
        }
    }

    /// Detection confidence of the producing strategy, used as the weight
    /// of the `flagged_as` edge in the behavior graph
    pub fn confidence(&self) -> f64 {
        match self {
            PatternTag::SqlInjection => 0.9,
            PatternTag::XssAttack => 0.9,
            PatternTag::PromptInjection => 0.8,
            PatternTag::DataExfiltration => 0.7,
            PatternTag::SuspiciousUrl => 0.6,
            PatternTag::PersonalInfo => 0.5,
            PatternTag::Profanity => 0.4,
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "sql_injection" => Some(PatternTag::SqlInjection),
            "xss_attack" => Some(PatternTag::XssAttack),
            "prompt_injection" => Some(PatternTag::PromptInjection),
            "data_exfiltration" => Some(PatternTag::DataExfiltration),
            "suspicious_url" => Some(PatternTag::SuspiciousUrl),
            "personal_info" => Some(PatternTag::PersonalInfo),
            "profanity" => Some(PatternTag::Profanity),
            _ => None,
        }
    }

    /// Tags that indicate an active attack rather than incidental content
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            PatternTag::SqlInjection
                | PatternTag::XssAttack
                | PatternTag::PromptInjection
                | PatternTag::DataExfiltration
        )
    }
}

impl fmt::Display for PatternTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single detected issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub tag: PatternTag,
    pub detail: String,
}

impl Issue {
    pub fn new(tag: PatternTag, detail: &str) -> Self {
        Self {
            tag,
            detail: detail.to_string(),
        }
    }
}

/// One sanitization strategy. Implementations must be pure: no state, no
/// failure modes, markers that do not re-trigger any strategy.
pub trait SanitizeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the (possibly redacted) text and the issues found
    fn apply(&self, text: &str) -> (String, Vec<Issue>);
}

/// Composite sanitizer applying all strategies in registry order
pub struct CompositeSanitizer {
    strategies: Vec<Box<dyn SanitizeStrategy>>,
    max_length: usize,
}

impl CompositeSanitizer {
    /// Build the default strategy registry from settings
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let strategies: Vec<Box<dyn SanitizeStrategy>> = vec![
            Box::new(SqlInjectionStrategy::new()?),
            Box::new(XssStrategy::new()?),
            Box::new(PromptInjectionStrategy::new()?),
            Box::new(DataExfiltrationStrategy::new()),
            Box::new(UrlStrategy::new()?),
            Box::new(PersonalInfoStrategy::new()?),
            Box::new(ProfanityStrategy::new(&settings.profanity_list)?),
        ];
        Ok(Self {
            strategies,
            max_length: settings.max_prompt_length,
        })
    }

    /// Run all strategies over the text.
    ///
    /// Oversized input is rejected before any strategy runs; sanitization
    /// never truncates silently. Empty or whitespace-only input is valid
    /// and produces no issues.
    pub fn sanitize(&self, text: &str) -> Result<(String, Vec<Issue>), SentinelError> {
        if text.chars().count() > self.max_length {
            return Err(SentinelError::PromptTooLong {
                length: text.chars().count(),
                max: self.max_length,
            });
        }

        let mut sanitized = text.to_string();
        let mut issues: Vec<Issue> = Vec::new();

        for strategy in &self.strategies {
            let (next, found) = strategy.apply(&sanitized);
            if !found.is_empty() {
                tracing::debug!(
                    strategy = strategy.name(),
                    count = found.len(),
                    "sanitization issues detected"
                );
            }
            sanitized = next;
            for issue in found {
                // Union by tag: keep the first detail seen for each tag
                if !issues.iter().any(|existing| existing.tag == issue.tag) {
                    issues.push(issue);
                }
            }
        }

        Ok((sanitized, issues))
    }
}

/// Deduplicated tag names from a set of issues, in detection order
pub fn issue_tags(issues: &[Issue]) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for issue in issues {
        let name = issue.tag.as_str().to_string();
        if !tags.contains(&name) {
            tags.push(name);
        }
    }
    tags
}
