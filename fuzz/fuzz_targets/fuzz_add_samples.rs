//! Fuzz target for the ensemble update.
//!
//! Feeds arbitrary batches, including non-finite values and weights, and
//! checks that the weights stay a distribution.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sp_core::{CandidateModel, EnsembleConfig, OneOfNPrior};

#[derive(Debug, Arbitrary)]
enum Step {
    Add { values: Vec<f64>, weights: Vec<f64> },
    Propagate(f64),
}

fuzz_target!(|steps: Vec<Step>| {
    let config = EnsembleConfig {
        decay_rate: 0.01,
        ..EnsembleConfig::default()
    };
    let Ok(mut prior) = OneOfNPrior::from_config(&config) else {
        return;
    };
    for step in steps.into_iter().take(64) {
        match step {
            Step::Add { values, weights } => {
                let _ = prior.add_samples(&values, &weights);
            }
            Step::Propagate(time) => {
                let _ = prior.propagate_forwards_by_time(time);
            }
        }
        assert!(!prior.bad_weights(), "weights {}", prior.debug_weights());
        let _ = prior.marginal_likelihood_confidence_interval(95.0);
    }
});
