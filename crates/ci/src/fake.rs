// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory adapter double, following the same fake-adapter shape used
//! throughout this codebase. Used by `e2epool-controller`'s finalize-worker
//! tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adapter::{CiAdapter, JobStatus};
use crate::error::CiAdapterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCiCall {
    Pause(String),
    Unpause(String),
}

pub struct FakeCiAdapter {
    statuses: Mutex<HashMap<String, JobStatus>>,
    calls: Mutex<Vec<FakeCiCall>>,
    fail_pause: bool,
}

impl Default for FakeCiAdapter {
    fn default() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_pause: false,
        }
    }
}

impl FakeCiAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_pause() -> Self {
        Self { fail_pause: true, ..Self::default() }
    }

    pub fn set_status(&self, job_id: impl Into<String>, status: JobStatus) {
        self.statuses.lock().insert(job_id.into(), status);
    }

    pub fn calls(&self) -> Vec<FakeCiCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CiAdapter for FakeCiAdapter {
    async fn get_job_status(&self, job_id: &str) -> JobStatus {
        self.statuses.lock().get(job_id).copied().unwrap_or(JobStatus::Unknown)
    }

    async fn pause_runner(&self, ci_runner_id: &str) -> Result<(), CiAdapterError> {
        self.calls.lock().push(FakeCiCall::Pause(ci_runner_id.to_string()));
        if self.fail_pause {
            return Err(CiAdapterError::UnexpectedResponse("fake pause failure".to_string()));
        }
        Ok(())
    }

    async fn unpause_runner(&self, ci_runner_id: &str) -> Result<(), CiAdapterError> {
        self.calls.lock().push(FakeCiCall::Unpause(ci_runner_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_pause_and_unpause_calls_in_order() {
        let fake = FakeCiAdapter::new();
        fake.pause_runner("42").await.unwrap();
        fake.unpause_runner("42").await.unwrap();
        assert_eq!(
            fake.calls(),
            vec![FakeCiCall::Pause("42".to_string()), FakeCiCall::Unpause("42".to_string())]
        );
    }

    #[tokio::test]
    async fn unset_job_status_defaults_to_unknown() {
        let fake = FakeCiAdapter::new();
        assert_eq!(fake.get_job_status("123").await, JobStatus::Unknown);
    }
}
