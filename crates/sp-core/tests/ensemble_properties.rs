//! Property-based tests for the model-selection ensemble.
//!
//! Uses proptest to check the weight and ageing invariants over random
//! sample streams.

use proptest::prelude::*;
use sp_core::{
    CandidateModel, DataType, LogNormalCandidate, NormalCandidate, OneOfNPrior, UniformCandidate,
};

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

fn ensemble(decay_rate: f64) -> OneOfNPrior {
    let models: Vec<Box<dyn CandidateModel>> = vec![
        Box::new(NormalCandidate::new(DataType::Continuous, decay_rate)),
        Box::new(LogNormalCandidate::new(DataType::Continuous, 1.0, decay_rate)),
        Box::new(UniformCandidate::new(
            DataType::Continuous,
            -100.0,
            100.0,
            decay_rate,
        )),
    ];
    OneOfNPrior::new(models, DataType::Continuous, decay_rate).unwrap()
}

fn batch() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    prop::collection::vec((-50.0..50.0f64, 0.1..5.0f64), 1..8)
        .prop_map(|pairs| pairs.into_iter().unzip())
}

fn trained(decay_rate: f64, batches: &[(Vec<f64>, Vec<f64>)]) -> OneOfNPrior {
    let mut prior = ensemble(decay_rate);
    for (values, weights) in batches {
        let _ = prior.add_samples(values, weights);
    }
    prior
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The weights form a distribution after any sequence of updates.
    #[test]
    fn weights_always_sum_to_one(
        steps in prop::collection::vec((batch(), 0.0..10.0f64), 1..12),
        decay_rate in 0.0..0.5f64,
    ) {
        let mut prior = ensemble(decay_rate);
        for ((values, weights), time) in &steps {
            let _ = prior.add_samples(values, weights);
            prior.propagate_forwards_by_time(*time).unwrap();

            prop_assert!(!prior.bad_weights(), "weights {}", prior.debug_weights());
            let total: f64 = prior.weights().iter().sum();
            prop_assert!(approx_eq(total, 1.0, 1e-9), "total {}", total);
        }
    }

    /// Ageing by `a` then `b` is ageing by `a + b`.
    #[test]
    fn propagation_composes(
        batches in prop::collection::vec(batch(), 1..6),
        a in 0.0..5.0f64,
        b in 0.0..5.0f64,
        decay_rate in 0.0..0.5f64,
    ) {
        let mut stepwise = trained(decay_rate, &batches);
        let mut direct = stepwise.clone();

        stepwise.propagate_forwards_by_time(a).unwrap();
        stepwise.propagate_forwards_by_time(b).unwrap();
        direct.propagate_forwards_by_time(a + b).unwrap();

        for (x, y) in stepwise.weights().iter().zip(direct.weights()) {
            prop_assert!(approx_eq(*x, y, 1e-8), "{} vs {}", x, y);
        }
        prop_assert!(approx_eq(stepwise.number_samples(), direct.number_samples(), 1e-9));
    }

    /// Propagating by zero time changes nothing.
    #[test]
    fn zero_propagation_is_identity(batches in prop::collection::vec(batch(), 0..6)) {
        let mut prior = trained(0.2, &batches);
        let before = prior.checksum(0);
        prior.propagate_forwards_by_time(0.0).unwrap();
        prop_assert_eq!(prior.checksum(0), before);
    }

    /// A clone evolves independently of the original.
    #[test]
    fn clones_are_independent(
        batches in prop::collection::vec(batch(), 1..6),
        (values, weights) in batch(),
    ) {
        let original = trained(0.1, &batches);
        let before = original.checksum(3);
        let mut copy = original.clone();
        prop_assert_eq!(copy.checksum(3), before);

        let _ = copy.add_samples(&values, &weights);
        copy.propagate_forwards_by_time(1.0).unwrap();
        prop_assert_eq!(original.checksum(3), before);
    }

    /// Rejected batches leave the ensemble untouched.
    #[test]
    fn invalid_batches_change_nothing(
        batches in prop::collection::vec(batch(), 0..6),
        (values, weights) in batch(),
        poison in 0usize..3,
    ) {
        let mut prior = trained(0.1, &batches);
        let before = prior.checksum(0);

        let (values, weights) = match poison {
            0 => (values.clone(), weights[1..].to_vec()),
            1 => {
                let mut values = values;
                values[0] = f64::NAN;
                (values, weights)
            }
            _ => {
                let mut weights = weights;
                weights[0] = -1.0;
                (values, weights)
            }
        };
        prop_assert!(prior.add_samples(&values, &weights).is_err());
        prop_assert_eq!(prior.checksum(0), before);
    }

    /// Indistinguishable candidates never separate.
    #[test]
    fn identical_candidates_keep_equal_weights(
        batches in prop::collection::vec(batch(), 1..8),
    ) {
        let models: Vec<Box<dyn CandidateModel>> = vec![
            Box::new(NormalCandidate::new(DataType::Continuous, 0.05)),
            Box::new(NormalCandidate::new(DataType::Continuous, 0.05)),
        ];
        let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.05).unwrap();
        for (values, weights) in &batches {
            prior.add_samples(values, weights).unwrap();
            prior.propagate_forwards_by_time(1.0).unwrap();
        }
        let weights = prior.weights();
        prop_assert!(approx_eq(weights[0], 0.5, 1e-9), "{:?}", weights);
        prop_assert!(approx_eq(weights[1], 0.5, 1e-9), "{:?}", weights);
    }
}
