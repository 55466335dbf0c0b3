//! Piecewise empirical distribution over [0,1].
//!
//! A distribution is a list of ranges, each carrying a share of the probability mass. Sampling
//! picks a range by its cumulative probability and then a uniform point inside that range.

use rand::Rng;

use crate::trace::error::DistributionError;

/// Minimal total probability mass a distribution needs before it can be finalized. The
/// remainder is absorbed by the last range.
pub const COMPLETENESS_TOLERANCE: f64 = 0.999;

/// Floating point error allowed when the running total slightly exceeds 1.
const ROUNDING_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Range {
    lower: f64,
    upper: f64,
    cumulative: f64,
}

fn in_unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionSpecifier {
    ranges: Vec<Range>,
    finalized: bool,
}

impl DistributionSpecifier {
    pub fn new() -> Self {
        Default::default()
    }

    fn cumulative(&self) -> f64 {
        self.ranges.last().map_or(0.0, |range| range.cumulative)
    }

    pub fn add_range(
        &mut self,
        lower: f64,
        upper: f64,
        probability: f64,
    ) -> Result<(), DistributionError> {
        if self.finalized {
            return Err(DistributionError::AlreadyFinalized);
        }
        let mut cumulative = self.cumulative() + probability;
        if cumulative > 1.0 && cumulative <= 1.0 + ROUNDING_SLACK {
            cumulative = 1.0;
        }
        if probability < 0.0
            || !in_unit_interval(lower)
            || !in_unit_interval(upper)
            || !in_unit_interval(cumulative)
            || lower > upper
        {
            return Err(DistributionError::OutOfRange {
                lower,
                upper,
                cumulative,
            });
        }
        self.ranges.push(Range {
            lower,
            upper,
            cumulative,
        });
        Ok(())
    }

    /// Closes the distribution for new ranges and forces the total mass to exactly 1.
    pub fn finalize_distribution(&mut self) -> Result<(), DistributionError> {
        let total = match self.ranges.last() {
            Some(range) => range.cumulative,
            None => return Err(DistributionError::Empty),
        };
        if total < COMPLETENESS_TOLERANCE {
            return Err(DistributionError::Incomplete(total));
        }
        if let Some(last) = self.ranges.last_mut() {
            last.cumulative = 1.0;
        }
        self.finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn next_double<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, DistributionError> {
        if !self.finalized {
            return Err(DistributionError::NotFinalized);
        }
        let target: f64 = rng.gen();
        // finalization guarantees the last cumulative value is 1 > target
        let range = self
            .ranges
            .iter()
            .find(|range| range.cumulative > target)
            .unwrap_or(&self.ranges[self.ranges.len() - 1]);
        if range.lower == range.upper {
            return Ok(range.lower);
        }
        let offset: f64 = rng.gen();
        Ok(range.lower + offset * (range.upper - range.lower))
    }
}
