//! Bearer tokens for the audit read path.

use carelog_api::auth::Claims;
use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
use serde_json::{json, Map, Value};

use crate::JWT_SECRET;

/// A token for `subject`, valid for ten minutes.
pub fn bearer_token(subject: &str) -> String {
    token_signed_with(JWT_SECRET, claims(subject, get_current_timestamp() + 600))
}

/// A token that expired a minute ago.
pub fn expired_token(subject: &str) -> String {
    token_signed_with(JWT_SECRET, claims(subject, get_current_timestamp() - 60))
}

/// A valid token carrying `issuer`.
pub fn token_with_issuer(subject: &str, issuer: &str) -> String {
    let mut claims = claims(subject, get_current_timestamp() + 600);
    claims.iss = Some(issuer.to_string());
    token_signed_with(JWT_SECRET, claims)
}

/// Signs arbitrary claims with `secret`.
pub fn token_signed_with(secret: &str, claims: Claims) -> String {
    sign_json(secret, &serde_json::to_value(claims).unwrap_or_default())
}

/// Signs a raw JSON claims object with `secret`, for tokens that carry
/// only some of the registered claims.
pub fn sign_json(secret: &str, claims: &Value) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes()))
        .unwrap_or_default()
}

/// Claims for `subject` expiring at `exp`.
pub fn claims(subject: &str, exp: u64) -> Claims {
    let mut extra = Map::new();
    extra.insert("role".to_string(), json!("staff"));
    Claims {
        sub: Some(subject.to_string()),
        exp: Some(exp),
        iat: Some(get_current_timestamp()),
        iss: None,
        extra,
    }
}
