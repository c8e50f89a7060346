// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! e2epool-ci: the CI adapter trait (C5) and the GitLab reference adapter.

pub mod adapter;
pub mod error;
pub mod gitlab;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use adapter::{CiAdapter, JobStatus};
pub use error::CiAdapterError;
pub use gitlab::GitlabAdapter;
pub use registry::resolve;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCiAdapter, FakeCiCall};
