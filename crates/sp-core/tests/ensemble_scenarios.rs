//! End-to-end behaviour of the model-selection ensemble.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use sp_core::{
    CandidateDocument, CandidateError, CandidateKind, CandidateModel, DataType,
    DefaultCandidateFactory, EnsembleConfig, EnsembleError, LogLikelihood, LogNormalCandidate,
    NormalCandidate, OneOfNPrior, PoissonCandidate, ProbabilityBounds, ProbabilityCalculation,
    RestoreParams, Tail, UniformCandidate, INF, MINUS_INF,
};

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

/// Candidate with a scripted likelihood and participation schedule.
#[derive(Debug, Clone)]
struct ScriptedCandidate {
    log_likelihood: LogLikelihood,
    /// Values for which the likelihood calculation fails.
    fail_on: Option<f64>,
    /// Values for which the likelihood is reported as infinite.
    infinite_on: Option<f64>,
    /// Batch counts during which the candidate sits out.
    sit_out: Range<usize>,
    batches: usize,
    number_samples: f64,
    decay_rate: f64,
}

impl ScriptedCandidate {
    fn new(log_likelihood: LogLikelihood) -> Self {
        Self {
            log_likelihood,
            fail_on: None,
            infinite_on: None,
            sit_out: 0..0,
            batches: 0,
            number_samples: 0.0,
            decay_rate: 0.0,
        }
    }
}

impl CandidateModel for ScriptedCandidate {
    fn kind(&self) -> CandidateKind {
        CandidateKind::Custom("scripted")
    }

    fn clone_box(&self) -> Box<dyn CandidateModel> {
        Box::new(self.clone())
    }

    fn data_type(&self) -> DataType {
        DataType::Continuous
    }

    fn set_data_type(&mut self, _data_type: DataType) {}

    fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    fn set_decay_rate(&mut self, decay_rate: f64) {
        self.decay_rate = decay_rate;
    }

    fn number_samples(&self) -> f64 {
        self.number_samples
    }

    fn set_to_non_informative(&mut self, _offset: f64, decay_rate: f64) {
        self.decay_rate = decay_rate;
        self.number_samples = 0.0;
        self.batches = 0;
    }

    fn is_non_informative(&self) -> bool {
        false
    }

    fn participates_in_model_selection(&self) -> bool {
        !self.sit_out.contains(&self.batches)
    }

    fn add_samples(&mut self, _values: &[f64], weights: &[f64]) -> Result<(), CandidateError> {
        self.batches += 1;
        self.number_samples += weights.iter().sum::<f64>();
        Ok(())
    }

    fn propagate_forwards_by_time(&mut self, time: f64) {
        self.number_samples *= (-self.decay_rate * time).exp();
    }

    fn marginal_likelihood_support(&self) -> (f64, f64) {
        (MINUS_INF, INF)
    }

    fn marginal_likelihood_mean(&self) -> f64 {
        0.0
    }

    fn marginal_likelihood_mode(&self) -> f64 {
        0.0
    }

    fn marginal_likelihood_variance(&self) -> f64 {
        1.0
    }

    fn marginal_likelihood_confidence_interval(&self, _percentage: f64) -> (f64, f64) {
        (-1.0, 1.0)
    }

    fn joint_log_marginal_likelihood(&self, values: &[f64], _weights: &[f64]) -> LogLikelihood {
        if values.iter().any(|x| Some(*x) == self.fail_on) {
            return LogLikelihood::failed();
        }
        if values.iter().any(|x| Some(*x) == self.infinite_on) {
            return LogLikelihood::ok(f64::INFINITY);
        }
        self.log_likelihood
    }

    fn minus_log_joint_cdf(
        &self,
        _values: &[f64],
        _weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        Ok((0.5f64.ln().abs(), 0.5f64.ln().abs()))
    }

    fn minus_log_joint_cdf_complement(
        &self,
        _values: &[f64],
        _weights: &[f64],
    ) -> Result<(f64, f64), CandidateError> {
        Ok((0.5f64.ln().abs(), 0.5f64.ln().abs()))
    }

    fn probability_of_less_likely_samples(
        &self,
        _calculation: ProbabilityCalculation,
        _values: &[f64],
        _weights: &[f64],
    ) -> Result<ProbabilityBounds, CandidateError> {
        Ok(ProbabilityBounds::exact(1.0, Tail::Undetermined))
    }

    fn sample_marginal_likelihood(&self, n: usize) -> Vec<f64> {
        vec![0.0; n]
    }

    fn checksum(&self, seed: u64) -> u64 {
        seed ^ (self.batches as u64) ^ self.number_samples.to_bits()
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
    }

    fn persist(&self) -> serde_json::Result<CandidateDocument> {
        Ok(CandidateDocument {
            tag: "scripted".to_string(),
            state: serde_json::Value::Null,
        })
    }
}

fn boxed<M: CandidateModel + 'static>(model: M) -> Box<dyn CandidateModel> {
    Box::new(model)
}

#[test]
fn normal_data_selects_the_normal_candidate() {
    let models = vec![
        boxed(NormalCandidate::new(DataType::Continuous, 0.0)),
        boxed(UniformCandidate::new(DataType::Continuous, -10.0, 10.0, 0.0)),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();

    let mut rng = StdRng::seed_from_u64(42);
    let normal = Normal::new(0.0, 1.0).unwrap();
    for _ in 0..100 {
        let x: f64 = normal.sample(&mut rng);
        prior.add_samples(&[x], &[1.0]).unwrap();
    }

    let weights = prior.weights();
    assert!(weights[0] > 0.99, "weights {weights:?}");
    assert!(approx_eq(weights.iter().sum::<f64>(), 1.0, 1e-9));
    assert!(approx_eq(prior.number_samples(), 100.0, 1e-9));
    assert!(approx_eq(prior.marginal_likelihood_mean(), 0.0, 0.35));
    assert!(approx_eq(prior.marginal_likelihood_variance(), 1.0, 0.5));
}

#[test]
fn weight_loss_per_batch_is_bounded() {
    let models = vec![
        boxed(ScriptedCandidate::new(LogLikelihood::ok(-1.0))),
        boxed(ScriptedCandidate::new(LogLikelihood::ok(-1e6))),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();

    // One sample: the deficit is capped at 10 + 1 per sample.
    prior.add_samples(&[0.0], &[1.0]).unwrap();
    let log_weights = prior.log_weights();
    assert!(approx_eq(log_weights[0] - log_weights[1], 11.0, 1e-9));

    // The cap grows with the evidence seen: 10 + 3 for the second sample.
    prior.add_samples(&[0.0, 0.0], &[1.0, 1.0]).unwrap();
    let log_weights = prior.log_weights();
    assert!(approx_eq(log_weights[0] - log_weights[1], 11.0 + 2.0 * 13.0, 1e-9));
}

#[test]
fn weight_loss_cap_saturates() {
    let models = vec![
        boxed(ScriptedCandidate::new(LogLikelihood::ok(0.0))),
        boxed(ScriptedCandidate::new(LogLikelihood::overflowed())),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();
    prior.add_samples(&[1.0; 200], &[1.0; 200]).unwrap();
    prior.add_samples(&[1.0], &[1.0]).unwrap();
    let log_weights = prior.log_weights();
    // Overflowed candidates are floored like any other: 200 * 100 then 100.
    assert!(approx_eq(log_weights[0] - log_weights[1], 20_100.0, 1e-6));
}

#[test]
fn nothing_finite_means_no_weight_change() {
    let models = vec![
        (0.3, boxed(ScriptedCandidate::new(LogLikelihood::overflowed()))),
        (0.7, boxed(ScriptedCandidate::new(LogLikelihood::overflowed()))),
    ];
    let mut prior = OneOfNPrior::with_weights(models, DataType::Continuous, 0.0).unwrap();
    let before = prior.weights();
    prior.add_samples(&[1.0, 2.0], &[1.0, 1.0]).unwrap();
    let after = prior.weights();
    assert!(approx_eq(before[0], after[0], 1e-12));
    assert!(approx_eq(after[0], 0.3, 1e-12));
    assert!(approx_eq(prior.number_samples(), 2.0, 1e-12));
}

#[test]
fn returning_candidate_reenters_at_small_weight() {
    let mut scripted = ScriptedCandidate::new(LogLikelihood::ok(-3.0));
    scripted.sit_out = 1..2;
    let models = vec![
        boxed(UniformCandidate::new(DataType::Continuous, -10.0, 10.0, 0.0)),
        boxed(scripted),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();

    prior.add_samples(&[0.0], &[1.0]).unwrap();
    assert!(!prior.models()[1].participates_in_model_selection());
    assert_eq!(prior.log_weights()[1], MINUS_INF);
    assert!(approx_eq(prior.weights()[0], 1.0, 1e-12));

    prior.add_samples(&[0.0], &[1.0]).unwrap();
    assert!(prior.models()[1].participates_in_model_selection());
    let weights = prior.weights();
    assert!(approx_eq(weights[1], 1e-6 / (1.0 + 1e-6), 1e-12));
    assert!(approx_eq(weights.iter().sum::<f64>(), 1.0, 1e-12));
}

#[test]
fn reentry_weight_is_relative_to_remaining_candidates() {
    // Dominant until it stops participating in the second batch.
    let mut leaving = ScriptedCandidate::new(LogLikelihood::ok(0.0));
    leaving.sit_out = 2..3;
    // Sits out the first batch and returns in the second.
    let mut returning = ScriptedCandidate::new(LogLikelihood::ok(0.0));
    returning.sit_out = 0..2;
    let staying = ScriptedCandidate::new(LogLikelihood::ok(-20.0));
    let models = vec![boxed(leaving), boxed(returning), boxed(staying)];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();

    prior.add_samples(&[0.0], &[1.0]).unwrap();
    assert_eq!(prior.log_weights()[1], MINUS_INF);
    assert!(prior.weights()[0] > 0.99);

    prior.add_samples(&[0.0], &[1.0]).unwrap();
    let weights = prior.weights();
    assert_eq!(weights[0], 0.0);
    assert!(weights[1] < 1e-3, "weights {weights:?}");
    assert!(approx_eq(weights[1], 1e-6 / (1.0 + 1e-6), 1e-12));
    assert!(approx_eq(weights[2], 1.0 / (1.0 + 1e-6), 1e-12));
}

#[test]
fn failed_likelihood_aborts_without_changes() {
    let mut scripted = ScriptedCandidate::new(LogLikelihood::ok(-2.0));
    scripted.fail_on = Some(-5.0);
    let models = vec![
        boxed(LogNormalCandidate::new(DataType::Continuous, 1.0, 0.0)),
        boxed(UniformCandidate::new(DataType::Continuous, -10.0, 10.0, 0.0)),
        boxed(scripted),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();
    for x in [1.0, 2.0, 1.5, 3.0] {
        prior.add_samples(&[x], &[1.0]).unwrap();
    }
    let checksum = prior.checksum(5);
    let offset = prior.models()[0].offset();

    let err = prior.add_samples(&[-5.0], &[1.0]).unwrap_err();
    assert!(matches!(err, EnsembleError::NumericFailure { ref model } if model == "scripted"));
    assert_eq!(err.code(), 72);
    assert_eq!(prior.checksum(5), checksum);
    assert_eq!(prior.models()[0].offset(), offset);
}

#[test]
fn non_finite_weights_reset_the_ensemble() {
    let mut scripted = ScriptedCandidate::new(LogLikelihood::ok(-2.0));
    scripted.infinite_on = Some(999.0);
    let models = vec![
        boxed(UniformCandidate::new(DataType::Continuous, -1000.0, 1000.0, 0.0)),
        boxed(scripted),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.1).unwrap();
    prior.add_samples(&[1.0], &[1.0]).unwrap();

    let err = prior.add_samples(&[999.0], &[1.0]).unwrap_err();
    assert!(matches!(err, EnsembleError::BadWeights { .. }));
    assert_eq!(prior.number_samples(), 0.0);
    assert!(!prior.bad_weights());
    assert!(approx_eq(prior.weights()[0], 0.5, 1e-12));
    assert_eq!(prior.decay_rate(), 0.1);
}

#[test]
fn reset_restores_the_offset_margin() {
    let mut scripted = ScriptedCandidate::new(LogLikelihood::ok(-2.0));
    scripted.infinite_on = Some(999.0);
    let models = vec![
        boxed(LogNormalCandidate::new(DataType::Continuous, 2.0, 0.0)),
        boxed(scripted),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();
    for x in [1.0, 2.0, 1.5, 3.0, 2.5, 1.2] {
        prior.add_samples(&[x], &[1.0]).unwrap();
    }
    assert!(!prior.is_non_informative());
    assert_eq!(prior.models()[0].offset(), 1.0);

    let err = prior.add_samples(&[999.0], &[1.0]).unwrap_err();
    assert!(matches!(err, EnsembleError::BadWeights { .. }));
    assert_eq!(prior.models()[0].offset(), 2.0);
    assert_eq!(prior.offset_margin(), 2.0);
}

#[test]
fn zero_time_propagation_changes_nothing() {
    let models = vec![
        boxed(NormalCandidate::new(DataType::Continuous, 0.2)),
        boxed(LogNormalCandidate::new(DataType::Continuous, 1.0, 0.2)),
        boxed(UniformCandidate::new(DataType::Continuous, -100.0, 100.0, 0.2)),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.2).unwrap();
    let _ = prior.add_samples(&[39.624, 0.0], &[0.1, 1.3265]);
    let _ = prior.add_samples(&[-49.16, 0.0], &[3.416, 0.1]);

    let checksum = prior.checksum(0);
    let log_weights = prior.log_weights();
    prior.propagate_forwards_by_time(0.0).unwrap();
    assert_eq!(prior.checksum(0), checksum);
    assert_eq!(prior.log_weights(), log_weights);
}

#[test]
fn propagation_without_decay_changes_nothing() {
    let models = vec![
        boxed(NormalCandidate::new(DataType::Continuous, 0.0)),
        boxed(UniformCandidate::new(DataType::Continuous, -10.0, 10.0, 0.0)),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.0).unwrap();
    for x in [0.3, -1.2, 0.8, 2.1, -0.4] {
        prior.add_samples(&[x], &[1.0]).unwrap();
    }
    let checksum = prior.checksum(0);
    prior.propagate_forwards_by_time(5.0).unwrap();
    assert_eq!(prior.checksum(0), checksum);
}

#[test]
fn persisted_ensemble_restores_identically() {
    let models = vec![
        boxed(NormalCandidate::new(DataType::Continuous, 0.05)),
        boxed(LogNormalCandidate::new(DataType::Continuous, 1.0, 0.05)),
        boxed(PoissonCandidate::new(DataType::Continuous, 0.05)),
    ];
    let mut prior = OneOfNPrior::new(models, DataType::Continuous, 0.05).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let normal = Normal::new(20.0, 3.0).unwrap();
    for _ in 0..50 {
        let x: f64 = normal.sample(&mut rng);
        prior.add_samples(&[x], &[1.0]).unwrap();
        prior.propagate_forwards_by_time(1.0).unwrap();
    }

    let json = prior.to_json().unwrap();
    let params = RestoreParams {
        data_type: DataType::Continuous,
        ..Default::default()
    };
    let mut restored = OneOfNPrior::from_json(&params, &json, &DefaultCandidateFactory).unwrap();
    assert_eq!(restored.checksum(0), prior.checksum(0));
    assert_eq!(restored.to_json().unwrap(), json);

    // Both copies evolve identically from here.
    for x in [18.0, 21.5, 19.0] {
        prior.add_samples(&[x], &[1.0]).unwrap();
        restored.add_samples(&[x], &[1.0]).unwrap();
    }
    for (a, b) in restored.weights().iter().zip(prior.weights()) {
        assert!(approx_eq(*a, b, 1e-12));
    }
    assert!(approx_eq(
        restored.marginal_likelihood_mean(),
        prior.marginal_likelihood_mean(),
        1e-9
    ));
}

#[test]
fn ensemble_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ensemble.toml");
    std::fs::write(
        &path,
        r#"
decay_rate = 0.01

[[candidates]]
type = "normal"
weight = 3.0

[[candidates]]
type = "uniform"
lower = -10.0
upper = 10.0
"#,
    )
    .unwrap();

    let config = EnsembleConfig::load(&path).unwrap();
    let mut prior = OneOfNPrior::from_config(&config).unwrap();
    assert!(approx_eq(prior.weights()[0], 0.75, 1e-12));
    assert_eq!(prior.decay_rate(), 0.01);
    prior.add_samples(&[0.5, 1.0, -0.5], &[1.0; 3]).unwrap();
    assert!(approx_eq(prior.number_samples(), 3.0, 1e-12));

    let missing = EnsembleConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert_eq!(missing.code(), 60);
}

#[test]
fn invalid_config_is_rejected_when_building() {
    let config = EnsembleConfig {
        decay_rate: -1.0,
        ..Default::default()
    };
    let err = OneOfNPrior::from_config(&config).unwrap_err();
    assert!(matches!(err, EnsembleError::Config(_)));
    assert_eq!(err.code(), 65);
}
