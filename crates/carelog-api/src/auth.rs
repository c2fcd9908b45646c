//! Bearer token authentication for the audit read path.
//!
//! Tokens are HS256 JWTs signed with the shared `JWT_SECRET`. Access is
//! binary: a token that verifies grants read access, and no claim beyond
//! `exp` (and `iss` when configured) is inspected.

use std::{collections::HashSet, time::Duration};

use axum::http::{header::AUTHORIZATION, HeaderMap};
use carelog_core::CarelogError;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Claims carried by an audit reader token.
///
/// Every field is optional: any correctly signed token grants read
/// access. `exp` is enforced when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject, typically the staff username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiry as Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    /// Issue time as Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Issuer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    /// Any other claims, carried but not inspected.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authentication failures.
///
/// Display output is the client-facing message. Expired and invalid tokens
/// read the same to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer` header.
    #[error("No token")]
    MissingToken,

    /// Bad signature, malformed token or wrong issuer.
    #[error("Invalid token")]
    InvalidToken,

    /// Token past its `exp`.
    #[error("Invalid token")]
    ExpiredToken,
}

impl From<AuthError> for CarelogError {
    fn from(err: AuthError) -> Self {
        Self::unauthorized(err.to_string())
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("leeway", &self.validation.leeway)
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    ///
    /// No claim is required. Expiry is enforced with zero leeway when the
    /// token carries `exp`.
    pub fn from_secret(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self { decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()), validation }
    }

    /// Requires the `iss` claim to equal `issuer`.
    #[must_use]
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.validation.set_issuer(&[issuer]);
        self.validation.required_spec_claims.insert("iss".to_string());
        self
    }

    /// Allows `exp` to be exceeded by up to `leeway`.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway.as_secs();
        self
    }

    /// Verifies `token` and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredToken` past `exp` and `InvalidToken` for any other
    /// failure.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    /// Extracts and verifies the bearer token from request headers.
    ///
    /// # Errors
    ///
    /// Returns `MissingToken` without a bearer header, otherwise as
    /// [`TokenVerifier::verify`].
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}
