// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! In-memory reputation store with per-user commit serialization
//!
//! Profiles live behind one RwLock; a separate registry hands out one
//! async mutex per user so the engine can hold a user's lock across its
//! whole commit phase without blocking other users.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::types::{Recommendation, UserProfile};

#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub default_reputation: f64,
    pub growth: f64,
    pub decay: f64,
    pub violation_window: usize,
}

pub struct ReputationStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    config: ReputationConfig,
}

impl ReputationStore {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            user_locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Acquire the commit lock for one user. Holders of different users'
    /// locks proceed concurrently; the guard lives until dropped.
    pub async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut registry = self.user_locks.lock().await;
            registry
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Fetch a profile, creating it at the default reputation on first sight
    pub async fn get_or_create(&self, user_id: &str) -> UserProfile {
        {
            let profiles = self.profiles.read().await;
            if let Some(profile) = profiles.get(user_id) {
                return profile.clone();
            }
        }
        let mut profiles = self.profiles.write().await;
        profiles
            .entry(user_id.to_string())
            .or_insert_with(|| {
                debug!(user_id, "creating reputation profile");
                UserProfile::new(user_id, self.config.default_reputation)
            })
            .clone()
    }

    pub async fn get(&self, user_id: &str) -> Option<UserProfile> {
        self.profiles.read().await.get(user_id).cloned()
    }

    /// Apply one analysis outcome to a user's profile and return the
    /// updated copy. Read-modify-write happens under the map's write lock,
    /// so concurrent outcomes never lose updates; callers serialize commits
    /// for the same user via `lock_user`.
    pub async fn apply_outcome(
        &self,
        user_id: &str,
        verdict: Recommendation,
        violation_tags: &[String],
    ) -> UserProfile {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(user_id.to_string())
            .or_insert_with(|| UserProfile::new(user_id, self.config.default_reputation));

        profile.update_reputation(verdict, self.config.growth, self.config.decay);
        if !violation_tags.is_empty() {
            profile.record_violations(violation_tags, self.config.violation_window);
        }
        profile.clone()
    }

    pub async fn user_count(&self) -> usize {
        self.profiles.read().await.len()
    }
}
