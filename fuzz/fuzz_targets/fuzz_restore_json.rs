//! Fuzz target for restoring persisted ensembles.
//!
//! Arbitrary documents must be rejected with an error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sp_core::{DefaultCandidateFactory, OneOfNPrior, RestoreParams};

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let params = RestoreParams::default();
    if let Ok(prior) = OneOfNPrior::from_json(&params, json, &DefaultCandidateFactory) {
        let _ = prior.to_json();
    }
});
