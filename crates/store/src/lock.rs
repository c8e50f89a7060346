// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-runner mutual exclusion via PostgreSQL transaction-scoped advisory
//! locks (C2, §4.2), keyed by a deterministic hash of `runner_id`.
//!
//! `std::collections::hash_map::DefaultHasher` is deliberately NOT used here:
//! its construction is unspecified (and historically randomized per process
//! in some standard library implementations), which would make replicas
//! derive different lock keys for the same runner id and silently lose
//! mutual exclusion (§9). FNV-1a has no such ambiguity — the same bytes
//! always hash to the same 64-bit value, on any replica, in any process.

use sqlx::{Postgres, Transaction};

use crate::error::StoreError;

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

/// FNV-1a over the runner id's UTF-8 bytes, truncated to `i64` for
/// `pg_advisory_xact_lock`'s signature. Deterministic across processes and
/// replicas.
pub fn lock_key(runner_id: &str) -> i64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in runner_id.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i64
}

/// Acquires the advisory lock for `runner_id` for the lifetime of `tx`.
/// Blocks until available; released automatically on commit or rollback.
pub async fn acquire(tx: &mut Transaction<'_, Postgres>, runner_id: &str) -> Result<(), StoreError> {
    let key = lock_key(runner_id);
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_deterministic() {
        assert_eq!(lock_key("runner-a"), lock_key("runner-a"));
    }

    #[test]
    fn lock_key_differs_across_distinct_inputs() {
        assert_ne!(lock_key("runner-a"), lock_key("runner-b"));
    }

    #[test]
    fn lock_key_matches_known_fnv1a_vector() {
        // FNV-1a 64-bit of the empty string is the offset basis itself.
        assert_eq!(lock_key(""), FNV_OFFSET_BASIS as i64);
    }
}
