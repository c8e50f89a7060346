// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner registry cache (C3, §4.3): a TTL-bounded read-through cache in
//! front of [`RunnerRepository`], so hot paths (agent auth, checkpoint
//! create) don't hit Postgres on every call. Writes (admin API) go straight
//! to the repository and invalidate the cache entry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use e2epool_core::Runner;
use parking_lot::RwLock;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::runners::RunnerRepository;

const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    runner: Runner,
    inserted_at: Instant,
}

/// Read-through, write-invalidate cache keyed by both `runner_id` and
/// `token`, since both the admin API and agent auth need a lookup path.
pub struct RunnerRegistry {
    pool: PgPool,
    ttl: Duration,
    by_id: RwLock<std::collections::HashMap<String, CacheEntry>>,
    by_token: RwLock<std::collections::HashMap<String, CacheEntry>>,
}

impl RunnerRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self::with_ttl(pool, DEFAULT_TTL)
    }

    pub fn with_ttl(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            by_id: RwLock::new(std::collections::HashMap::new()),
            by_token: RwLock::new(std::collections::HashMap::new()),
        }
    }

    pub async fn by_runner_id(&self, runner_id: &str) -> Result<Option<Runner>, StoreError> {
        if let Some(hit) = self.fresh(&self.by_id, runner_id) {
            return Ok(Some(hit));
        }
        let runner = RunnerRepository::by_runner_id(&self.pool, runner_id).await?;
        if let Some(runner) = &runner {
            self.insert(runner.clone());
        }
        Ok(runner)
    }

    pub async fn by_token(&self, token: &str) -> Result<Option<Runner>, StoreError> {
        if let Some(hit) = self.fresh(&self.by_token, token) {
            return Ok(Some(hit));
        }
        let runner = RunnerRepository::by_token(&self.pool, token).await?;
        if let Some(runner) = &runner {
            self.insert(runner.clone());
        }
        Ok(runner)
    }

    /// Evicts `runner_id` from both indices. Call after any write to the
    /// underlying row (soft-delete, reactivation, admin update).
    pub fn invalidate(&self, runner_id: &str, token: &str) {
        self.by_id.write().remove(runner_id);
        self.by_token.write().remove(token);
    }

    fn fresh(
        &self,
        index: &RwLock<std::collections::HashMap<String, CacheEntry>>,
        key: &str,
    ) -> Option<Runner> {
        let guard = index.read();
        let entry = guard.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(entry.runner.clone())
        } else {
            None
        }
    }

    fn insert(&self, runner: Runner) {
        let now = Instant::now();
        self.by_id.write().insert(
            runner.runner_id.clone(),
            CacheEntry { runner: runner.clone(), inserted_at: now },
        );
        self.by_token.write().insert(
            runner.token.clone(),
            CacheEntry { runner, inserted_at: now },
        );
    }
}

/// Shared handle, cheap to clone across axum handlers and background tasks.
pub type SharedRunnerRegistry = Arc<RunnerRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_is_fresh_within_ttl() {
        let entry = CacheEntry {
            runner: e2epool_core::Runner::builder().build(),
            inserted_at: Instant::now(),
        };
        assert!(entry.inserted_at.elapsed() < Duration::from_secs(1));
    }
}
