#![no_main]

//! Fuzz target for signature header parsing and verification.
//!
//! The first byte splits the input into a header and a payload. Neither
//! parsing nor verification may panic, and a header that was not produced
//! with the secret must never verify.

use std::sync::Arc;

use carelog_api::crypto::{generate_signature_header, parse_signature_header, SignatureVerifier};
use carelog_core::{Clock, TestClock};
use libfuzzer_sys::fuzz_target;
use secrecy::SecretString;

const SECRET: &str = "whsec_fuzz";

fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(split).min(rest.len());
    let (header, payload) = rest.split_at(split);

    let clock = TestClock::new();
    let verifier = SignatureVerifier::new(SecretString::from(SECRET.to_string()), Arc::new(clock.clone()));

    if let Ok(header) = std::str::from_utf8(header) {
        let _ = parse_signature_header(header);
        assert!(verifier.verify(payload, Some(header)).is_err());
    }

    let signed = generate_signature_header(payload, SECRET, clock.unix_timestamp());
    assert!(verifier.verify(payload, Some(&signed)).is_ok());
});
