//! Fuzz target for ensemble configuration parsing.
//!
//! Tests that TOML and JSON configuration parsing handles arbitrary input
//! without panicking, and that accepted configurations build.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sp_core::{EnsembleConfig, OneOfNPrior};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for config in [
        EnsembleConfig::from_toml_str(text),
        EnsembleConfig::from_json_str(text),
    ]
    .into_iter()
    .flatten()
    {
        let _ = OneOfNPrior::from_config(&config);
    }
});
