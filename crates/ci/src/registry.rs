// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves a runner's `ci_adapter` registry key to a [`CiAdapter`]
//! instance. GitLab is the only adapter with a real implementation; the key
//! space is open so a second provider is an additive match arm.

use std::sync::Arc;

use crate::adapter::CiAdapter;
use crate::error::CiAdapterError;
use crate::gitlab::GitlabAdapter;

/// Builds a [`CiAdapter`] for the named provider key, bound to one runner's
/// `ci_base_url`/`ci_token`.
pub fn resolve(
    ci_adapter: &str,
    ci_base_url: &str,
    ci_token: &str,
) -> Result<Arc<dyn CiAdapter>, CiAdapterError> {
    match ci_adapter {
        "gitlab" => Ok(Arc::new(GitlabAdapter::new(ci_base_url, ci_token))),
        other => Err(CiAdapterError::UnknownAdapter(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_gitlab() {
        assert!(resolve("gitlab", "https://gitlab.example.com", "tok").is_ok());
    }

    #[test]
    fn rejects_unknown_adapter_key() {
        assert!(resolve("bamboo", "https://x", "tok").is_err());
    }
}
