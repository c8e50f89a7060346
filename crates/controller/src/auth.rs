// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token auth helpers for the HTTP API (§6.1): every endpoint but
//! `/healthz` and the webhooks requires `Authorization: Bearer <token>`,
//! scoped either to a specific runner (looked up by token) or to the admin
//! token from [`crate::env::Config`].

use axum::http::HeaderMap;
use e2epool_core::Runner;
use e2epool_store::SharedRunnerRegistry;

use crate::error::ServiceError;

fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .ok_or(ServiceError::Unauthorized)
}

/// Resolves the bearer token to its owning runner.
pub async fn require_runner(
    headers: &HeaderMap,
    registry: &SharedRunnerRegistry,
) -> Result<Runner, ServiceError> {
    let token = bearer_token(headers)?;
    registry
        .by_token(token)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::Unauthorized)
}

/// Validates the bearer token against the admin token, without resolving a
/// runner.
pub fn require_admin(headers: &HeaderMap, admin_token: &str) -> Result<(), ServiceError> {
    let token = bearer_token(headers)?;
    if token == admin_token {
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

/// `/internal/agent/*` accepts either the admin token or a peer replica's
/// internal call; peers are trusted by network placement (§4.6's internal
/// bind address is expected to sit behind a private network), so this is
/// just the admin check kept as a distinct name for call-site clarity.
pub fn require_admin_or_internal(headers: &HeaderMap, admin_token: &str) -> Result<(), ServiceError> {
    require_admin(headers, admin_token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with_bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn bearer_token_extracts_token_after_prefix() {
        let headers = headers_with_bearer("abc123");
        assert_eq!(bearer_token(&headers).unwrap(), "abc123");
    }

    #[test]
    fn bearer_token_rejects_missing_header() {
        let headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(ServiceError::Unauthorized)));
    }

    #[test]
    fn bearer_token_rejects_empty_token_and_wrong_scheme() {
        assert!(bearer_token(&headers_with_bearer("")).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn require_admin_matches_exact_token_only() {
        let headers = headers_with_bearer("the-admin-token");
        assert!(require_admin(&headers, "the-admin-token").is_ok());
        assert!(require_admin(&headers, "a-different-token").is_err());
    }
}
