//! Random trace generator which never oversubscribes the infrastructure it generates jobs for.
//!
//! Every job gets its size, duration and the gap to the previous submission from three
//! piecewise distributions. Before a job is committed the generator sums the processors of all
//! previously generated jobs overlapping it; while the sum exceeds the capacity the job is
//! delayed until just after the largest overlapping job finishes.

use std::path::Path;

use log::{debug, info};
use rand::SeedableRng;
use rand_pcg::Pcg64;

use crate::core::job::{Job, JobDescriptor, JobFactory};
use crate::trace::error::TraceError;
use crate::trace::interface::{TraceProducer, TraceWindow};
use crate::trace::random::distribution::DistributionSpecifier;

pub const SIZE_DIST_MARKER: &str = "sizeDist=";
pub const DURATION_DIST_MARKER: &str = "durDist=";
pub const GAP_DIST_MARKER: &str = "gapDist=";
pub const MAX_JOB_DURATION_MARKER: &str = "maxJobDuration=";
pub const MAX_JOB_DISTANCE_MARKER: &str = "maxJobDistance=";

/// Seed used when the caller does not provide one.
pub const DEFAULT_SEED: u64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParameters {
    /// Job size as a fraction of the total capacity.
    pub size: DistributionSpecifier,
    /// Job duration as a fraction of `max_job_duration`.
    pub duration: DistributionSpecifier,
    /// Gap between consecutive submissions as a fraction of `max_job_distance`.
    pub gap: DistributionSpecifier,
    pub max_job_duration: i64, // in seconds
    pub max_job_distance: i64, // in seconds
}

fn parse_range(value: &str, line_no: usize) -> Result<(f64, f64, f64), TraceError> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|e| {
            TraceError::Configuration(format!("number parsing error in line {}: {}", line_no, e))
        })?;
    match numbers[..] {
        [lower, upper, probability] => Ok((lower, upper, probability)),
        _ => Err(TraceError::Configuration(format!(
            "range in line {} needs exactly three values: lower,upper,probability",
            line_no
        ))),
    }
}

fn parse_seconds(value: &str, line_no: usize) -> Result<i64, TraceError> {
    value.trim().parse::<i64>().map_err(|e| {
        TraceError::Configuration(format!("number parsing error in line {}: {}", line_no, e))
    })
}

fn add_range(
    dist: &mut DistributionSpecifier,
    range: (f64, f64, f64),
    line_no: usize,
) -> Result<(), TraceError> {
    dist.add_range(range.0, range.1, range.2).map_err(|e| {
        TraceError::Configuration(format!("range parsing error in line {}: {}", line_no, e))
    })
}

fn finalize(dist: &mut DistributionSpecifier, marker: &str) -> Result<(), TraceError> {
    dist.finalize_distribution()
        .map_err(|e| TraceError::Configuration(format!("{} distribution: {}", marker, e)))
}

impl GeneratorParameters {
    /// Parses a generator definition made of `marker=value` lines. Unknown lines are ignored.
    pub fn from_definition(definition: &str) -> Result<Self, TraceError> {
        let mut size = DistributionSpecifier::new();
        let mut duration = DistributionSpecifier::new();
        let mut gap = DistributionSpecifier::new();
        let mut max_job_duration = None;
        let mut max_job_distance = None;

        for (line_no, line) in definition.lines().enumerate() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix(SIZE_DIST_MARKER) {
                add_range(&mut size, parse_range(value, line_no)?, line_no)?;
            } else if let Some(value) = line.strip_prefix(DURATION_DIST_MARKER) {
                add_range(&mut duration, parse_range(value, line_no)?, line_no)?;
            } else if let Some(value) = line.strip_prefix(GAP_DIST_MARKER) {
                add_range(&mut gap, parse_range(value, line_no)?, line_no)?;
            } else if let Some(value) = line.strip_prefix(MAX_JOB_DURATION_MARKER) {
                max_job_duration = Some(parse_seconds(value, line_no)?);
            } else if let Some(value) = line.strip_prefix(MAX_JOB_DISTANCE_MARKER) {
                max_job_distance = Some(parse_seconds(value, line_no)?);
            }
        }

        let max_job_duration = max_job_duration
            .filter(|v| *v >= 0)
            .ok_or_else(|| {
                TraceError::Configuration(format!("no {} was specified", MAX_JOB_DURATION_MARKER))
            })?;
        let max_job_distance = max_job_distance
            .filter(|v| *v >= 0)
            .ok_or_else(|| {
                TraceError::Configuration(format!("no {} was specified", MAX_JOB_DISTANCE_MARKER))
            })?;
        finalize(&mut size, SIZE_DIST_MARKER)?;
        finalize(&mut duration, DURATION_DIST_MARKER)?;
        finalize(&mut gap, GAP_DIST_MARKER)?;

        Ok(Self {
            size,
            duration,
            gap,
            max_job_duration,
            max_job_distance,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, TraceError> {
        let definition = std::fs::read_to_string(path).map_err(|e| {
            TraceError::Configuration(format!("cannot read generator definition {:?}: {}", path, e))
        })?;
        Self::from_definition(&definition)
    }

    fn check_finalized(&self) -> Result<(), TraceError> {
        for (dist, name) in [
            (&self.size, "size"),
            (&self.duration, "duration"),
            (&self.gap, "gap"),
        ] {
            if !dist.is_finalized() {
                return Err(TraceError::Configuration(format!(
                    "{} distribution is not finalized",
                    name
                )));
            }
        }
        Ok(())
    }
}

pub struct ResourceConstrainedRandomGenerator {
    params: GeneratorParameters,
    capacity: i64,
    window: TraceWindow,
    factory: JobFactory,
    rng: Pcg64,

    submit_cursor: i64,
    /// Already generated jobs which may still overlap the upcoming ones.
    overlap_checkers: Vec<Job>,
    /// Number of jobs generated so far, including the ones skipped before the window.
    position: usize,
    started: bool,
}

impl ResourceConstrainedRandomGenerator {
    pub fn new(
        params: GeneratorParameters,
        capacity: i64,
        window: TraceWindow,
        factory: JobFactory,
        seed: u64,
    ) -> Result<Self, TraceError> {
        params.check_finalized()?;
        if capacity < 1 {
            return Err(TraceError::Configuration(format!(
                "total capacity must be positive, got {}",
                capacity
            )));
        }
        Ok(Self {
            params,
            capacity,
            window,
            factory,
            rng: Pcg64::seed_from_u64(seed),
            submit_cursor: 0,
            overlap_checkers: vec![],
            position: 0,
            started: false,
        })
    }

    /// Restarts the random number sequence. Generation state (submit time, running jobs) is kept.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = Pcg64::seed_from_u64(seed);
    }

    fn make_job(&self, duration: i64, nprocs: i64) -> Job {
        (self.factory)(JobDescriptor::simple(
            self.position.to_string(),
            self.submit_cursor,
            0,
            duration,
            nprocs,
        ))
    }

    fn generate_one(&mut self) -> Result<Job, TraceError> {
        let duration =
            (self.params.duration.next_double(&mut self.rng)? * self.params.max_job_duration as f64)
                as i64;
        let gap = (self.params.gap.next_double(&mut self.rng)? * self.params.max_job_distance as f64)
            as i64;
        self.submit_cursor += gap;
        let size = self.params.size.next_double(&mut self.rng)?;
        let nprocs = ((size * self.capacity as f64).ceil() as i64).clamp(1, self.capacity);

        let mut candidate = self.make_job(duration, nprocs);
        loop {
            // submit times never decrease, so jobs finished before the candidate starts are done
            let start = candidate.start_time();
            self.overlap_checkers.retain(|other| other.stop_time() > start);

            let mut demand = candidate.nprocs() as i64;
            let mut largest: Option<&Job> = None;
            for other in self.overlap_checkers.iter() {
                if candidate.is_overlapping(other) {
                    demand += other.nprocs() as i64;
                    if largest.map_or(true, |l| other.nprocs() > l.nprocs()) {
                        largest = Some(other);
                    }
                }
            }

            match largest {
                Some(other) if demand > self.capacity => {
                    self.submit_cursor = other.stop_time() + 1;
                    candidate = self.make_job(duration, nprocs);
                }
                _ => break,
            }
        }

        self.overlap_checkers.push(candidate.clone());
        self.position += 1;
        Ok(candidate)
    }

    fn generate(&mut self, count: usize) -> Result<Vec<Job>, TraceError> {
        let mut jobs = Vec::with_capacity(count);
        for _ in 0..count {
            jobs.push(self.generate_one()?);
        }
        Ok(jobs)
    }

    fn skip_to_window(&mut self) -> Result<(), TraceError> {
        if !self.started {
            self.started = true;
            info!(
                "Random trace generator starts (capacity: {}, maxJobDuration: {}, maxJobDistance: {}, window: [{}, {}))",
                self.capacity,
                self.params.max_job_duration,
                self.params.max_job_distance,
                self.window.from,
                self.window.to
            );
            for _ in 0..self.window.from {
                self.generate_one()?;
            }
        }
        Ok(())
    }
}

impl TraceProducer for ResourceConstrainedRandomGenerator {
    fn get_all_jobs(&mut self) -> Result<Vec<Job>, TraceError> {
        if self.started {
            return Err(TraceError::PartialReadStarted);
        }
        self.skip_to_window()?;
        let jobs = self.generate(self.window.len())?;
        debug!("Generated {} jobs", jobs.len());
        Ok(jobs)
    }

    fn get_jobs(&mut self, num: usize) -> Result<Vec<Job>, TraceError> {
        self.skip_to_window()?;
        if self.window.is_closed_at(self.position) {
            return Err(TraceError::WindowExhausted { to: self.window.to });
        }
        let count = self.window.allowance(self.position, num);
        self.generate(count)
    }

    fn max_proc_count(&self) -> i64 {
        self.capacity
    }
}
