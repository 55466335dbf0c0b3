//! Orderings and simple queries over job lists.

use std::cmp::Ordering;

use crate::core::job::Job;

pub fn submit_time_order(a: &Job, b: &Job) -> Ordering {
    a.submit_time().cmp(&b.submit_time())
}

pub fn start_time_order(a: &Job, b: &Job) -> Ordering {
    a.start_time().cmp(&b.start_time())
}

pub fn stop_time_order(a: &Job, b: &Job) -> Ordering {
    a.stop_time().cmp(&b.stop_time())
}

/// None for an empty list.
pub fn earliest_submission_time(jobs: &[Job]) -> Option<i64> {
    jobs.iter().map(|job| job.submit_time()).min()
}

/// None for an empty list.
pub fn last_termination_time(jobs: &[Job]) -> Option<i64> {
    jobs.iter().map(|job| job.stop_time()).max()
}

/// Highest sum of processors of jobs running at the same instant. Execution intervals are
/// half-open, so a job finishing at `t` does not compete with a job starting at `t`.
pub fn peak_processor_demand(jobs: &[Job]) -> u64 {
    let mut changes: Vec<(i64, i64)> = Vec::with_capacity(jobs.len() * 2);
    for job in jobs.iter().filter(|job| job.start_time() < job.stop_time()) {
        changes.push((job.start_time(), job.nprocs() as i64));
        changes.push((job.stop_time(), -(job.nprocs() as i64)));
    }
    // releases sort before acquisitions at the same instant
    changes.sort();

    let mut demand = 0i64;
    let mut peak = 0i64;
    for (_, change) in changes {
        demand += change;
        peak = peak.max(demand);
    }
    peak as u64
}
