//! Sparse percentile summaries of real distributions which the calibrator reconstructs.

use serde::Serialize;

use crate::trace::error::CalibrationError;
use crate::trace::random::distribution::{DistributionSpecifier, COMPLETENESS_TOLERANCE};

/// Ranks reported for execution times: p0, p1, p25, p50, p75, p99, p100.
pub const EXECUTION_TIME_PERCENTILES: [f64; 7] = [0.0, 0.01, 0.25, 0.5, 0.75, 0.99, 1.0];
pub const EXECUTION_TIME_PRIORS: [f64; 7] = [0.0024, 0.0113, 0.4123, 0.1185, 0.4349, 0.019, 0.0013];

/// Ranks reported for allocated memory: p1, p5, p25, p50, p75, p95, p99, p100.
pub const MEMORY_PERCENTILES: [f64; 8] = [0.01, 0.05, 0.25, 0.5, 0.75, 0.95, 0.99, 1.0];
pub const MEMORY_PRIORS: [f64; 8] = [
    0.00001, 0.01999, 0.24, 0.24, 0.24, 0.24, 0.01999, 0.00001,
];

#[derive(Debug, Clone, PartialEq)]
pub struct PercentileTargetSet {
    /// Percentile ranks in [0,1], non-decreasing.
    pub percentiles: Vec<f64>,
    /// Observed values at `percentiles`, non-decreasing.
    pub values: Vec<f64>,
    /// Probability mass of the sampling range placed around each target value.
    pub priors: Vec<f64>,
    /// Largest possible value. Sampling ranges are expressed as fractions of it.
    pub scale: f64,
}

/// Statistics of a sample population next to the targets it was calibrated for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationSummary {
    pub mean: f64,
    pub percentiles: Vec<f64>,
    pub targets: Vec<f64>,
    pub achieved: Vec<f64>,
}

fn non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|pair| pair[0] <= pair[1])
}

impl PercentileTargetSet {
    pub fn new(
        percentiles: Vec<f64>,
        values: Vec<f64>,
        priors: Vec<f64>,
        scale: f64,
    ) -> Result<Self, CalibrationError> {
        let inconsistent = |reason: String| Err(CalibrationError::InconsistentTargets(reason));

        if percentiles.is_empty() {
            return inconsistent("no percentiles given".to_string());
        }
        if percentiles.len() != values.len() || percentiles.len() != priors.len() {
            return inconsistent(format!(
                "{} percentiles, {} values and {} priors",
                percentiles.len(),
                values.len(),
                priors.len()
            ));
        }
        if !percentiles.iter().all(|p| (0.0..=1.0).contains(p)) || !non_decreasing(&percentiles) {
            return inconsistent(format!("bad percentile ranks {:?}", percentiles));
        }
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) || !non_decreasing(&values) {
            return inconsistent(format!("values {:?} are not increasing", values));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return inconsistent(format!("scale must be positive, got {}", scale));
        }
        let total: f64 = priors.iter().sum();
        if priors.iter().any(|p| *p < 0.0) || total < COMPLETENESS_TOLERANCE {
            return inconsistent(format!("priors {:?} do not sum up to 1", priors));
        }

        Ok(Self {
            percentiles,
            values,
            priors,
            scale,
        })
    }

    /// Execution time summary of an invocation log row. `maximum` is the largest reported
    /// execution time.
    pub fn execution_time(values: [f64; 7], maximum: f64) -> Result<Self, CalibrationError> {
        Self::new(
            EXECUTION_TIME_PERCENTILES.to_vec(),
            values.to_vec(),
            EXECUTION_TIME_PRIORS.to_vec(),
            maximum,
        )
    }

    /// Allocated memory summary of an invocation log row, scaled by its p100 value.
    pub fn memory(values: [f64; 8]) -> Result<Self, CalibrationError> {
        Self::new(
            MEMORY_PERCENTILES.to_vec(),
            values.to_vec(),
            MEMORY_PRIORS.to_vec(),
            values[7],
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Builds the sampling distribution with one range centered at each target value. The
    /// half-width of a range is the distance to the nearer neighbour, so no range reaches past
    /// the neighbouring target values. The first target is sampled as a single point.
    pub fn distribution(&self) -> Result<DistributionSpecifier, CalibrationError> {
        let n = self.values.len();
        let mut dist = DistributionSpecifier::new();
        for i in 0..n {
            let value = self.values[i];
            let half_width = if i == 0 {
                0.0
            } else if i + 1 < n {
                (value - self.values[i - 1]).min(self.values[i + 1] - value)
            } else {
                (value - self.values[i - 1]).min((self.scale - value).max(0.0))
            };
            let lower = ((value - half_width) / self.scale).clamp(0.0, 1.0);
            let upper = ((value + half_width) / self.scale).clamp(0.0, 1.0);
            dist.add_range(lower, upper, self.priors[i])?;
        }
        dist.finalize_distribution()?;
        Ok(dist)
    }

    /// Index of the value at `percentile` in a sorted population of `size` values.
    pub fn rank(percentile: f64, size: usize) -> usize {
        ((percentile * size as f64).floor() as usize).min(size.saturating_sub(1))
    }

    /// Values of an ascending population at the target percentile ranks.
    pub fn achieved_values(&self, sorted: &[f64]) -> Vec<f64> {
        if sorted.is_empty() {
            return vec![];
        }
        self.percentiles
            .iter()
            .map(|p| sorted[Self::rank(*p, sorted.len())])
            .collect()
    }

    pub fn summarize(&self, samples: &[f64]) -> CalibrationSummary {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mean = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<f64>() / sorted.len() as f64
        };
        CalibrationSummary {
            mean,
            percentiles: self.percentiles.clone(),
            targets: self.values.clone(),
            achieved: self.achieved_values(&sorted),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    use super::PercentileTargetSet;
    use crate::trace::error::CalibrationError;

    #[test]
    fn test_inconsistent_targets_are_rejected() {
        assert!(matches!(
            PercentileTargetSet::execution_time([1., 2., 3., 2., 5., 6., 7.], 7.),
            Err(CalibrationError::InconsistentTargets(_))
        ));
        assert!(matches!(
            PercentileTargetSet::execution_time([0.; 7], 0.),
            Err(CalibrationError::InconsistentTargets(_))
        ));
        assert!(PercentileTargetSet::new(vec![0.5], vec![1.], vec![0.5], 1.).is_err());
        assert!(PercentileTargetSet::new(vec![0.5, 0.6], vec![1.], vec![1.], 1.).is_err());
    }

    #[test]
    fn test_ranges_stay_inside_scale() {
        let targets =
            PercentileTargetSet::execution_time([1., 2., 10., 50., 120., 600., 1000.], 1000.)
                .unwrap();
        let dist = targets.distribution().unwrap();
        let mut rng = Pcg64::seed_from_u64(3);
        for _ in 0..1000 {
            let value = dist.next_double(&mut rng).unwrap() * targets.scale;
            assert!((0.999..=1000.001).contains(&value));
        }
    }

    #[test]
    fn test_memory_priors_are_complete() {
        let targets =
            PercentileTargetSet::memory([100., 120., 140., 160., 180., 200., 250., 300.]).unwrap();
        assert_eq!(300., targets.scale);
        assert!(targets.distribution().unwrap().is_finalized());
    }

    #[test]
    fn test_rank_and_summary() {
        assert_eq!(0, PercentileTargetSet::rank(0.0, 10));
        assert_eq!(5, PercentileTargetSet::rank(0.5, 10));
        assert_eq!(9, PercentileTargetSet::rank(1.0, 10));

        let targets =
            PercentileTargetSet::new(vec![0.0, 0.5, 1.0], vec![1., 3., 5.], vec![0.2, 0.6, 0.2], 5.)
                .unwrap();
        let summary = targets.summarize(&[5., 1., 3., 2., 4.]);
        assert_eq!(3., summary.mean);
        assert_eq!(vec![1., 3., 5.], summary.achieved);
    }
}
