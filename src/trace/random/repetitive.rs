//! Random trace made of repeated parallel sections.
//!
//! A section holds `parallel` jobs whose submissions are spread over `max_start_spread`
//! seconds from the section start. The next section starts once every job of the current one
//! finished plus a random gap. Processors are taken from a per-section budget of
//! `max_total_procs`; once it is used up the remaining jobs of the section get one processor.

use std::collections::VecDeque;
use std::path::Path;

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::Deserialize;

use crate::core::job::{Job, JobDescriptor, JobFactory};
use crate::trace::error::TraceError;
use crate::trace::interface::{TraceProducer, TraceWindow};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepetitiveParameters {
    /// Jobs per parallel section.
    pub parallel: u32,
    pub max_start_spread: i64, // in seconds
    pub exec_min: i64,         // in seconds
    pub exec_max: i64,         // in seconds
    pub min_gap: i64,          // in seconds
    pub max_gap: i64,          // in seconds
    pub min_node_procs: i64,
    pub max_node_procs: i64,
    pub max_total_procs: i64,
}

impl RepetitiveParameters {
    /// Parses a yaml definition.
    pub fn from_str(definition: &str) -> Result<Self, TraceError> {
        let params: Self = serde_yaml::from_str(definition).map_err(|e| {
            TraceError::Configuration(format!("cannot parse repetitive generator: {}", e))
        })?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_file(path: &Path) -> Result<Self, TraceError> {
        let definition = std::fs::read_to_string(path).map_err(|e| {
            TraceError::Configuration(format!("cannot read generator definition {:?}: {}", path, e))
        })?;
        Self::from_str(&definition)
    }

    pub fn validate(&self) -> Result<(), TraceError> {
        let check = |valid: bool, what: &str| {
            if valid {
                Ok(())
            } else {
                Err(TraceError::Configuration(format!(
                    "repetitive generator: {}",
                    what
                )))
            }
        };
        check(self.parallel > 0, "parallel must be positive")?;
        check(self.max_start_spread >= 0, "max_start_spread must not be negative")?;
        check(
            0 <= self.exec_min && self.exec_min <= self.exec_max,
            "need 0 <= exec_min <= exec_max",
        )?;
        check(
            0 <= self.min_gap && self.min_gap <= self.max_gap,
            "need 0 <= min_gap <= max_gap",
        )?;
        check(
            1 <= self.min_node_procs && self.min_node_procs <= self.max_node_procs,
            "need 1 <= min_node_procs <= max_node_procs",
        )?;
        check(self.max_total_procs > 0, "max_total_procs must be positive")
    }
}

/// Uniform value in [low, low + span), `low` itself for an empty span.
fn uniform(rng: &mut Pcg64, low: i64, span: i64) -> i64 {
    if span > 0 {
        low + rng.gen_range(0..span)
    } else {
        low
    }
}

pub struct RepetitiveRandomGenerator {
    params: RepetitiveParameters,
    window: TraceWindow,
    factory: JobFactory,
    rng: Pcg64,

    section_start: i64,
    /// Generated jobs of the current section not handed out yet.
    section: VecDeque<Job>,
    /// Number of jobs handed out so far, including the ones skipped before the window.
    position: usize,
    started: bool,
}

impl RepetitiveRandomGenerator {
    pub fn new(
        params: RepetitiveParameters,
        window: TraceWindow,
        factory: JobFactory,
        seed: u64,
    ) -> Result<Self, TraceError> {
        params.validate()?;
        Ok(Self {
            params,
            window,
            factory,
            rng: Pcg64::seed_from_u64(seed),
            section_start: 0,
            section: VecDeque::new(),
            position: 0,
            started: false,
        })
    }

    /// Restarts the random number sequence. Already generated jobs of the current section stay.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = Pcg64::seed_from_u64(seed);
    }

    fn generate_section(&mut self) {
        let p = &self.params;
        let mut used_procs = 0;
        let mut section_end = self.section_start;
        let first_id = self.position + self.section.len();
        for i in 0..p.parallel as usize {
            let submit = uniform(&mut self.rng, self.section_start, p.max_start_spread);
            let nprocs = uniform(
                &mut self.rng,
                p.min_node_procs,
                p.max_node_procs - p.min_node_procs,
            );
            let nprocs = nprocs.min(p.max_total_procs - used_procs).max(1);
            let exec = uniform(&mut self.rng, p.exec_min, p.exec_max - p.exec_min);
            used_procs += nprocs;
            section_end = section_end.max(submit + exec);
            self.section.push_back((self.factory)(JobDescriptor::simple(
                (first_id + i).to_string(),
                submit,
                0,
                exec,
                nprocs,
            )));
        }
        let gap = uniform(&mut self.rng, p.min_gap, p.max_gap - p.min_gap);
        self.section_start = section_end + gap;
        debug!(
            "Generated parallel section of {} jobs, next one starts at {}",
            p.parallel, self.section_start
        );
    }

    fn next_job(&mut self) -> Job {
        loop {
            if let Some(job) = self.section.pop_front() {
                self.position += 1;
                return job;
            }
            self.generate_section();
        }
    }

    fn take(&mut self, count: usize) -> Vec<Job> {
        (0..count).map(|_| self.next_job()).collect()
    }

    fn skip_to_window(&mut self) {
        if !self.started {
            self.started = true;
            info!(
                "Repetitive random trace generator starts with {:?} (window: [{}, {}))",
                self.params, self.window.from, self.window.to
            );
            self.take(self.window.from);
        }
    }
}

impl TraceProducer for RepetitiveRandomGenerator {
    fn get_all_jobs(&mut self) -> Result<Vec<Job>, TraceError> {
        if self.started {
            return Err(TraceError::PartialReadStarted);
        }
        self.skip_to_window();
        Ok(self.take(self.window.len()))
    }

    fn get_jobs(&mut self, num: usize) -> Result<Vec<Job>, TraceError> {
        self.skip_to_window();
        if self.window.is_closed_at(self.position) {
            return Err(TraceError::WindowExhausted { to: self.window.to });
        }
        let count = self.window.allowance(self.position, num);
        Ok(self.take(count))
    }

    fn max_proc_count(&self) -> i64 {
        self.params.max_total_procs
    }
}
