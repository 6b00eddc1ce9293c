//! # Authentication Middleware
//!
//! Bearer-token authentication for the command endpoints. Tokens are
//! HS256 JWTs carrying the caller's identity:
//!
//! ```text
//! { "sub": 42, "email": "op@plant.example", "roles": ["operator"], "iat": ..., "exp": ... }
//! ```
//!
//! Every authenticated request gets a `CallerIdentity` injected into
//! the request extensions; handlers extract it via the [`Caller`]
//! extractor. Health probes are mounted outside this middleware and
//! remain unauthenticated.
//!
//! When no signing key is configured the service runs in development
//! mode: all requests are admitted with a development identity.

use std::sync::Arc;

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use topline_core::CallerIdentity;

use crate::error::{AppError, ErrorBody, ErrorDetail};
use crate::state::SecretString;

// ── Claims ──────────────────────────────────────────────────────────

/// JWT claims carried by a bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id in the identity store.
    pub sub: i64,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.
    pub exp: i64,
}

// ── Errors ──────────────────────────────────────────────────────────

/// Credential verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("missing authorization header")]
    MissingHeader,
    #[error("authorization header must use Bearer scheme")]
    InvalidScheme,
    #[error("credential expired")]
    Expired,
    #[error("credential signature invalid")]
    InvalidSignature,
    #[error("malformed credential: {0}")]
    Malformed(String),
}

// ── Credential Verifier ─────────────────────────────────────────────

/// Verifies bearer tokens and extracts the caller's identity.
///
/// Pure with respect to application state: the outcome depends only on
/// the token, the signing key, and the current time.
pub struct CredentialVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl CredentialVerifier {
    pub fn new(secret: &SecretString) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose().as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a bearer token and extract the caller identity.
    pub fn verify(&self, token: &str) -> Result<CallerIdentity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed(e.to_string()),
            }
        })?;

        Ok(CallerIdentity {
            id: data.claims.sub,
            email: data.claims.email,
            roles: data.claims.roles,
        })
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

// ── Middleware ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions. A `None`
/// verifier means authentication is disabled (development mode).
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub verifier: Option<Arc<CredentialVerifier>>,
}

impl AuthContext {
    /// Build from the configured signing key.
    pub fn from_secret(secret: Option<&SecretString>) -> Self {
        Self {
            verifier: secret.map(|s| Arc::new(CredentialVerifier::new(s))),
        }
    }
}

/// Identity the auth middleware assigns when authentication is disabled.
fn development_identity() -> CallerIdentity {
    CallerIdentity {
        id: 0,
        email: "dev@localhost".to_string(),
        roles: vec!["developer".to_string()],
    }
}

/// Extract and verify the bearer token, injecting the caller identity
/// into request extensions for downstream handlers.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .cloned()
        .unwrap_or_default();

    let Some(verifier) = context.verifier else {
        // Auth disabled — admit with a development identity.
        request.extensions_mut().insert(development_identity());
        return next.run(request).await;
    };

    let identity = bearer_token(&request)
        .and_then(|token| verifier.verify(token));

    match identity {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(reason = %err, "authentication failed");
            unauthorized_response(&err.to_string())
        }
    }
}

/// Pull the token out of the `Authorization: Bearer <token>` header.
fn bearer_token(request: &Request) -> Result<&str, AuthError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingHeader)?;

    header_value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidScheme)
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

// ── Caller extractor ────────────────────────────────────────────────

/// Extractor for the authenticated caller identity that the auth
/// middleware injected into request extensions.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}
