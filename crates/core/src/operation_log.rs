// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit record (§3.1). Never mutated after insert.

use serde::{Deserialize, Serialize};

use crate::runner::BackendKind;

/// Outcome of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Ok,
    Error,
}

crate::simple_display! {
    OperationResult {
        Ok => "ok",
        Error => "error",
    }
}

/// One row of the audit log: what happened, to which checkpoint/runner, how
/// long it took, and whether it succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub checkpoint_name: String,
    pub runner_id: String,
    pub operation: String,
    pub backend: Option<BackendKind>,
    pub detail: String,
    pub result: OperationResult,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

impl OperationLogEntry {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct OperationLogEntryBuilder => OperationLogEntry {
        into { checkpoint_name: String = "job-demo-1000-aaaaaaaa" }
        into { runner_id: String = "r1" }
        into { operation: String = "reset" }
        option { backend: BackendKind = Some(BackendKind::BareMetal) }
        into { detail: String = "" }
        set { result: OperationResult = OperationResult::Ok }
        set { started_at: chrono::DateTime<chrono::Utc> = chrono::Utc::now() }
        set { finished_at: chrono::DateTime<chrono::Utc> = chrono::Utc::now() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_ms_is_non_negative_for_well_ordered_timestamps() {
        let start = chrono::Utc::now();
        let finish = start + chrono::Duration::milliseconds(42);
        let entry = OperationLogEntry::builder()
            .started_at(start)
            .finished_at(finish)
            .build();
        assert_eq!(entry.duration_ms(), 42);
    }
}
