//! Stripe webhook signature verification.
//!
//! The provider signs `"{t}.{raw body}"` with HMAC-SHA256 and sends the
//! result in the `Stripe-Signature` header:
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a8...,v1=9c1e0b...,v0=...
//! ```
//!
//! Several `v1` entries appear while a secret is being rolled; any one of
//! them matching is enough. Verification runs over the exact bytes
//! received, never over a re-serialized body.

use std::{sync::Arc, time::Duration};

use carelog_core::{CarelogError, Clock, ProviderEvent};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the provider signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Scheme tag of the signatures we verify.
const EXPECTED_SCHEME: &str = "v1";

/// Default maximum distance between the signed timestamp and now.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

/// Signature verification failures.
///
/// Messages are client-facing and never include the secret or the
/// expected signature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// No signature header on the request.
    #[error("No stripe-signature header value was provided")]
    MissingHeader,

    /// Header present but without a usable timestamp.
    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,

    /// Header carries no `v1` entries.
    #[error("No signatures found with expected scheme")]
    NoSignatures,

    /// Signed timestamp too far from the current time.
    #[error("Timestamp outside the tolerance zone")]
    TimestampOutsideTolerance,

    /// No `v1` entry matches the expected signature.
    #[error("No signatures found matching the expected signature for payload")]
    NoMatch,

    /// Verifier configured without a secret.
    #[error("Webhook secret is not configured")]
    EmptySecret,
}

impl From<SignatureError> for CarelogError {
    fn from(err: SignatureError) -> Self {
        Self::invalid_signature(err.to_string())
    }
}

/// Parsed `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Signed timestamp in Unix seconds.
    pub timestamp: i64,
    /// Hex-encoded `v1` signatures in header order.
    pub signatures: Vec<String>,
}

/// Parses a `Stripe-Signature` header value.
///
/// Entries without `=` and unknown schemes are ignored.
///
/// # Errors
///
/// Returns `MalformedHeader` if there is no parseable `t=` entry and
/// `NoSignatures` if there is no `v1=` entry.
pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };

        match key.trim() {
            "t" => {
                timestamp =
                    Some(value.trim().parse::<i64>().map_err(|_| SignatureError::MalformedHeader)?);
            },
            EXPECTED_SCHEME => signatures.push(value.trim().to_string()),
            _ => {},
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::NoSignatures);
    }

    Ok(SignatureHeader { timestamp, signatures })
}

/// Computes the raw HMAC-SHA256 over `"{timestamp}.{payload}"`.
pub fn compute_signature(secret: &[u8], timestamp: i64, payload: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return Vec::new();
    };

    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Builds a valid header value for `payload`.
///
/// Used by tests, benches and local tooling to produce signed requests.
pub fn generate_signature_header(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let signature = compute_signature(secret.as_bytes(), timestamp, payload);
    format!("t={timestamp},{EXPECTED_SCHEME}={}", hex::encode(signature))
}

/// Verifies webhook signatures against a shared secret.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
    tolerance: Duration,
    clock: Arc<dyn Clock>,
}

impl SignatureVerifier {
    /// Creates a verifier with the default tolerance.
    pub fn new(secret: SecretString, clock: Arc<dyn Clock>) -> Self {
        Self { secret, tolerance: DEFAULT_TOLERANCE, clock }
    }

    /// Sets the timestamp tolerance. Zero disables the timestamp check.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Checks `header` against the raw `payload`.
    ///
    /// The signature is checked before the timestamp, so a stale but
    /// authentic request reports the tolerance failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`SignatureError`] encountered.
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<(), SignatureError> {
        let secret = self.secret.expose_secret();
        if secret.is_empty() {
            return Err(SignatureError::EmptySecret);
        }

        let header = header.filter(|h| !h.trim().is_empty()).ok_or(SignatureError::MissingHeader)?;
        let parsed = parse_signature_header(header)?;

        let expected = compute_signature(secret.as_bytes(), parsed.timestamp, payload);
        let matched = parsed
            .signatures
            .iter()
            .filter_map(|candidate| hex::decode(candidate).ok())
            .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));

        if !matched {
            return Err(SignatureError::NoMatch);
        }

        if !self.tolerance.is_zero() {
            let age = self.clock.unix_timestamp().abs_diff(parsed.timestamp);
            if age > self.tolerance.as_secs() {
                return Err(SignatureError::TimestampOutsideTolerance);
            }
        }

        Ok(())
    }

    /// Verifies the signature and parses the provider event envelope.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` if verification fails and
    /// `InvalidPayload` if the authentic body is not an event envelope.
    pub fn construct_event(
        &self,
        payload: &[u8],
        header: Option<&str>,
    ) -> Result<ProviderEvent, CarelogError> {
        self.verify(payload, header)?;
        ProviderEvent::from_slice(payload)
    }
}
