//! # Authentication Module
//!
//! Bearer token authentication for `/api` routes.
//!
//! Tokens are configured in `[[auth.tokens]]` (or `APIWORKS_API_TOKEN` with
//! `APIWORKS_API_USER`) and each maps to one user principal. The matched
//! principal is stored in the request extensions and read back by handlers
//! through the [`Principal`] extractor.
//!
//! ```text
//! Authorization: Bearer <token>
//! ```

use crate::config::AuthConfig;
use crate::error::ApiError;
use apiworks_core::Id;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

// =============================================================================
// TOKEN TABLE
// =============================================================================

/// Configured bearer tokens and the users they authenticate.
#[derive(Default)]
pub struct TokenTable {
    entries: Vec<(Vec<u8>, Id)>,
}

impl std::fmt::Debug for TokenTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenTable")
            .field("tokens", &self.entries.len())
            .finish()
    }
}

impl TokenTable {
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            entries: config
                .tokens
                .iter()
                .filter(|t| !t.token.is_empty())
                .map(|t| (t.token.as_bytes().to_vec(), t.user_id))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The user `token` authenticates.
    ///
    /// Every configured token is compared, in constant time over the longer
    /// of the two lengths, whether or not an earlier one matched.
    pub fn resolve(&self, token: &str) -> Option<Id> {
        let provided = token.as_bytes();
        let mut found = None;
        for (expected, user) in &self.entries {
            if ct_matches(provided, expected) {
                found = Some(*user);
            }
        }
        found
    }
}

fn ct_matches(provided: &[u8], expected: &[u8]) -> bool {
    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Reject requests without a known bearer token; attach the principal to
/// the rest.
pub async fn bearer_auth_middleware(
    State(tokens): State<Arc<TokenTable>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = header_value else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return Err(ApiError::Unauthenticated);
    };

    let token = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    match tokens.resolve(token.trim()) {
        Some(user) => {
            request.extensions_mut().insert(Principal(user));
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_token",
                "Authentication failed: unknown bearer token"
            );
            Err(ApiError::Unauthenticated)
        }
    }
}

// =============================================================================
// PRINCIPAL
// =============================================================================

/// The authenticated user of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal(pub Id);

impl<S: Send + Sync> FromRequestParts<S> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or(ApiError::Unauthenticated)
    }
}

// =============================================================================
// TESTS
// =============================================================================
