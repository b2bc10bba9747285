//! Allocation of a sample budget across weighted models.

use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Splits `n` samples into per-model counts proportional to `weights`.
///
/// Returns an empty vector when the weights are unusable (empty, negative,
/// non-finite or summing to zero).
pub trait WeightedSampler {
    fn sample(&mut self, n: usize, weights: &[f64]) -> Vec<usize>;
}

fn usable(weights: &[f64]) -> Option<f64> {
    if weights.is_empty() || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return None;
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        Some(total)
    } else {
        None
    }
}

/// Largest-remainder allocation. Counts always sum to `n`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicSampler;

impl WeightedSampler for DeterministicSampler {
    fn sample(&mut self, n: usize, weights: &[f64]) -> Vec<usize> {
        let Some(total) = usable(weights) else {
            return Vec::new();
        };
        let exact: Vec<f64> = weights.iter().map(|w| n as f64 * w / total).collect();
        let mut counts: Vec<usize> = exact.iter().map(|x| x.floor() as usize).collect();
        let allocated: usize = counts.iter().sum();
        let mut order: Vec<usize> = (0..weights.len()).collect();
        order.sort_by(|&a, &b| {
            let ra = exact[a] - exact[a].floor();
            let rb = exact[b] - exact[b].floor();
            rb.total_cmp(&ra).then(a.cmp(&b))
        });
        for &i in order.iter().take(n.saturating_sub(allocated)) {
            counts[i] += 1;
        }
        counts
    }
}

/// Multinomial draw from a seedable generator.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl WeightedSampler for RandomSampler {
    fn sample(&mut self, n: usize, weights: &[f64]) -> Vec<usize> {
        if usable(weights).is_none() {
            return Vec::new();
        }
        let Ok(index) = WeightedIndex::new(weights) else {
            return Vec::new();
        };
        let mut counts = vec![0usize; weights.len()];
        for _ in 0..n {
            counts[index.sample(&mut self.rng)] += 1;
        }
        counts
    }
}
