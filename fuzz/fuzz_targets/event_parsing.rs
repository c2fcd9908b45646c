#![no_main]

//! Fuzz target for provider event parsing and classification.
//!
//! Arbitrary bytes must either be rejected as an invalid payload or
//! classify cleanly.

use carelog_core::{classify, PaymentEvent, ProviderEvent};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = ProviderEvent::from_slice(data) else {
        return;
    };
    if let Ok(event) = PaymentEvent::try_from(envelope) {
        let _ = classify(&event);
    }
});
