// Interface for any producer of jobs: trace file readers and random trace generators.

use std::cmp::Ordering;

use crate::core::job::Job;
use crate::trace::error::TraceError;

/// Returned by `max_proc_count` when the capacity of the traced infrastructure is not known.
pub const UNKNOWN_PROC_COUNT: i64 = -1;

/// Range of trace items [from, to) a producer exposes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceWindow {
    pub from: usize,
    pub to: usize,
    /// If set, `get_jobs` may continue beyond `to`. `get_all_jobs` always stops at `to`.
    pub allow_reading_further: bool,
}

impl TraceWindow {
    pub fn new(from: usize, to: usize, allow_reading_further: bool) -> Self {
        Self {
            from,
            to,
            allow_reading_further,
        }
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many of `requested` items may still be produced when `position` items were consumed.
    pub fn allowance(&self, position: usize, requested: usize) -> usize {
        if self.allow_reading_further {
            requested
        } else {
            requested.min(self.to.saturating_sub(position))
        }
    }

    /// Whether a bounded window has been fully consumed.
    pub fn is_closed_at(&self, position: usize) -> bool {
        !self.allow_reading_further && position >= self.to
    }
}

pub trait TraceProducer {
    /// All jobs of the configured window. Single-shot: fails once any partial read happened.
    fn get_all_jobs(&mut self) -> Result<Vec<Job>, TraceError>;

    /// Up to `num` further jobs, continuing where the previous call stopped. Fails with
    /// `TraceError::Exhausted` only if the batch would be empty because the source ran out.
    fn get_jobs(&mut self, num: usize) -> Result<Vec<Job>, TraceError>;

    /// Processor count of the system the trace belongs to, `UNKNOWN_PROC_COUNT` if not known.
    fn max_proc_count(&self) -> i64 {
        UNKNOWN_PROC_COUNT
    }

    fn get_all_jobs_sorted_by(
        &mut self,
        compare: &dyn Fn(&Job, &Job) -> Ordering,
    ) -> Result<Vec<Job>, TraceError> {
        let mut jobs = self.get_all_jobs()?;
        jobs.sort_by(|a, b| compare(a, b));
        Ok(jobs)
    }

    fn get_jobs_sorted_by(
        &mut self,
        num: usize,
        compare: &dyn Fn(&Job, &Job) -> Ordering,
    ) -> Result<Vec<Job>, TraceError> {
        let mut jobs = self.get_jobs(num)?;
        jobs.sort_by(|a, b| compare(a, b));
        Ok(jobs)
    }
}
