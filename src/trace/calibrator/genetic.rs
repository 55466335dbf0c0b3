//! Genetic algorithm which synthesizes a sample population matching a percentile summary.
//!
//! An individual is a sequence of values sampled from the distribution built by
//! `PercentileTargetSet::distribution`. Its fitness is the R² between the target values and the
//! values the individual achieves at the same percentile ranks. Generations are formed by
//! elitism, tournament selection and one-point crossover.

use log::debug;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::Deserialize;

use crate::trace::calibrator::targets::PercentileTargetSet;
use crate::trace::error::CalibrationError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GeneticParameters {
    pub population_size: usize,
    pub generations: usize,
    /// Share of the fittest individuals copied unchanged into the next generation.
    pub elitism_rate: f64,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub tournament_arity: usize,
}

impl Default for GeneticParameters {
    fn default() -> Self {
        Self {
            population_size: 10,
            generations: 10,
            elitism_rate: 0.3,
            crossover_rate: 0.7,
            mutation_rate: 0.1,
            tournament_arity: 2,
        }
    }
}

impl GeneticParameters {
    fn validate(&self) -> Result<(), CalibrationError> {
        let invalid = |reason: &str| Err(CalibrationError::InvalidParameters(reason.to_string()));
        if self.population_size == 0 {
            return invalid("population size must be positive");
        }
        if self.tournament_arity == 0 || self.tournament_arity > self.population_size {
            return invalid("tournament arity must be within [1, population size]");
        }
        for rate in [self.elitism_rate, self.crossover_rate, self.mutation_rate] {
            if !(0.0..=1.0).contains(&rate) {
                return invalid("rates must be within [0,1]");
            }
        }
        Ok(())
    }
}

/// Coefficient of determination of the simple linear regression of `y` on `x`. Undefined
/// values (constant `x` or `y`) are reported as 0.
pub fn r_squared(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let mean_x = x[..n].iter().sum::<f64>() / n as f64;
    let mean_y = y[..n].iter().sum::<f64>() / n as f64;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        let dy = y[i] - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return 0.0;
    }
    let r2 = sxy * sxy / (sxx * syy);
    if r2.is_finite() {
        r2
    } else {
        0.0
    }
}

/// Mutation leaves individuals untouched, samples are only recombined by crossover.
fn identity_mutation(individual: Individual) -> Individual {
    individual
}

#[derive(Debug, Clone)]
struct Individual {
    values: Vec<f64>,
    fitness: f64,
}

impl Individual {
    fn new(values: Vec<f64>, targets: &PercentileTargetSet) -> Self {
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let fitness = r_squared(&targets.values, &targets.achieved_values(&sorted));
        Self { values, fitness }
    }
}

pub struct PercentileCalibrator {
    params: GeneticParameters,
    rng: Pcg64,
}

impl PercentileCalibrator {
    pub fn new(params: GeneticParameters, seed: u64) -> Result<Self, CalibrationError> {
        params.validate()?;
        Ok(Self {
            params,
            rng: Pcg64::seed_from_u64(seed),
        })
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = Pcg64::seed_from_u64(seed);
    }

    /// Returns `total_count` values, ascending, whose percentiles approximate `targets`.
    pub fn generate(
        &mut self,
        targets: &PercentileTargetSet,
        total_count: usize,
    ) -> Result<Vec<f64>, CalibrationError> {
        if total_count == 0 {
            return Ok(vec![]);
        }
        let dist = targets.distribution()?;

        let mut population = Vec::with_capacity(self.params.population_size);
        for _ in 0..self.params.population_size {
            let mut values = Vec::with_capacity(total_count);
            for _ in 0..total_count {
                values.push(dist.next_double(&mut self.rng)? * targets.scale);
            }
            population.push(Individual::new(values, targets));
        }

        for _ in 0..self.params.generations {
            population = self.next_generation(population, targets);
        }

        let fittest = population
            .into_iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
            .ok_or_else(|| CalibrationError::InvalidParameters("empty population".to_string()))?;
        debug!(
            "Calibrated {} samples with fitness {:.4}",
            total_count, fittest.fitness
        );

        let mut values = fittest.values;
        values.sort_by(|a, b| a.total_cmp(b));
        Ok(values)
    }

    fn next_generation(
        &mut self,
        mut population: Vec<Individual>,
        targets: &PercentileTargetSet,
    ) -> Vec<Individual> {
        let size = population.len();
        population.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));

        let first_elite =
            (((1.0 - self.params.elitism_rate) * size as f64).ceil() as usize).min(size);
        let mut next: Vec<Individual> = population[first_elite..].to_vec();

        while next.len() < size {
            let first = self.tournament(&population);
            let second = self.tournament(&population);
            let (first, second) = if self.rng.gen::<f64>() < self.params.crossover_rate {
                self.crossover(&population[first], &population[second], targets)
            } else {
                (population[first].clone(), population[second].clone())
            };
            let first = self.maybe_mutate(first);
            let second = self.maybe_mutate(second);

            next.push(first);
            if next.len() < size {
                next.push(second);
            }
        }
        next
    }

    fn maybe_mutate(&mut self, individual: Individual) -> Individual {
        if self.rng.gen::<f64>() < self.params.mutation_rate {
            identity_mutation(individual)
        } else {
            individual
        }
    }

    /// Index of the fittest of `tournament_arity` distinct, randomly picked individuals.
    fn tournament(&mut self, population: &[Individual]) -> usize {
        let arity = self.params.tournament_arity.min(population.len());
        index::sample(&mut self.rng, population.len(), arity)
            .into_iter()
            .max_by(|a, b| population[*a].fitness.total_cmp(&population[*b].fitness))
            .unwrap_or(0)
    }

    fn crossover(
        &mut self,
        first: &Individual,
        second: &Individual,
        targets: &PercentileTargetSet,
    ) -> (Individual, Individual) {
        let len = first.values.len().min(second.values.len());
        if len < 3 {
            return (first.clone(), second.clone());
        }
        let point = 1 + self.rng.gen_range(0..len - 2);

        let mut child1 = first.values[..point].to_vec();
        child1.extend_from_slice(&second.values[point..]);
        let mut child2 = second.values[..point].to_vec();
        child2.extend_from_slice(&first.values[point..]);
        (
            Individual::new(child1, targets),
            Individual::new(child2, targets),
        )
    }
}
