//! Summary statistics of a produced trace. Used to compare replayed and synthetic workloads
//! with each other.

use average::{concatenate, Estimate, Max, Mean, Min, Variance};

use crate::core::analyser::{peak_processor_demand, submit_time_order};
use crate::core::job::Job;

concatenate!(
    Estimator,
    [Min, min],
    [Max, max],
    [Mean, mean],
    [Variance, population_variance]
);

/// Running statistics of one job attribute. Attributes without samples report zeros.
#[derive(Default)]
pub struct AttributeStats {
    estimator: Estimator,
    samples: u64,
}

impl std::fmt::Debug for AttributeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeStats")
            .field("samples", &self.samples)
            .field("min", &self.min())
            .field("max", &self.max())
            .field("mean", &self.mean())
            .field("population_variance", &self.population_variance())
            .finish()
    }
}

impl AttributeStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add(&mut self, value: f64) {
        self.samples += 1;
        self.estimator.add(value);
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    fn or_zero(&self, value: f64) -> f64 {
        if self.samples == 0 {
            0.
        } else {
            value
        }
    }

    pub fn min(&self) -> f64 {
        self.or_zero(self.estimator.min())
    }

    pub fn max(&self) -> f64 {
        self.or_zero(self.estimator.max())
    }

    pub fn mean(&self) -> f64 {
        self.or_zero(self.estimator.mean())
    }

    pub fn population_variance(&self) -> f64 {
        self.or_zero(self.estimator.population_variance())
    }
}

#[derive(Debug, Default)]
pub struct TraceMetricsCollector {
    /// The number of jobs added to the collector.
    pub total_jobs: u64,
    /// Capacity reported by the trace producer, negative if unknown.
    pub max_proc_count: i64,
    pub earliest_submission: Option<i64>,
    pub last_termination: Option<i64>,
    /// Highest number of processors requested by the jobs running at the same time.
    pub peak_processor_demand: u64,

    /// Estimations for the time between consecutive submissions. Needs jobs added in
    /// submission order.
    pub interarrival_time_stats: AttributeStats,
    pub queue_time_stats: AttributeStats,
    pub exec_time_stats: AttributeStats,
    pub nprocs_stats: AttributeStats,
    /// Only jobs with known memory usage are considered.
    pub memory_stats: AttributeStats,

    last_submission: Option<i64>,
}

impl TraceMetricsCollector {
    pub fn new(max_proc_count: i64) -> Self {
        Self {
            max_proc_count,
            ..Default::default()
        }
    }

    /// Summary of a complete list of jobs, regardless of their order.
    pub fn collect(jobs: &[Job], max_proc_count: i64) -> Self {
        let mut sorted: Vec<&Job> = jobs.iter().collect();
        sorted.sort_by(|a, b| submit_time_order(a, b));

        let mut collector = Self::new(max_proc_count);
        for job in sorted {
            collector.add_job(job);
        }
        collector.peak_processor_demand = peak_processor_demand(jobs);
        collector
    }

    pub fn add_job(&mut self, job: &Job) {
        self.total_jobs += 1;
        self.earliest_submission = Some(
            self.earliest_submission
                .map_or(job.submit_time(), |t| t.min(job.submit_time())),
        );
        self.last_termination = Some(
            self.last_termination
                .map_or(job.stop_time(), |t| t.max(job.stop_time())),
        );
        if let Some(last) = self.last_submission {
            self.interarrival_time_stats
                .add((job.submit_time() - last) as f64);
        }
        self.last_submission = Some(job.submit_time());

        self.queue_time_stats.add(job.queue_time() as f64);
        self.exec_time_stats.add(job.exec_time() as f64);
        self.nprocs_stats.add(job.nprocs() as f64);
        if job.pp_mem() >= 0 {
            self.memory_stats.add(job.pp_mem() as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TraceMetricsCollector;
    use crate::core::job::{Job, JobDescriptor};

    #[test]
    fn test_collect_unordered_jobs() {
        let jobs = vec![
            Job::new(JobDescriptor::simple("b".to_string(), 30, 2, 10, 2)),
            Job::new(JobDescriptor::simple("a".to_string(), 10, 0, 30, 4)),
        ];
        let collector = TraceMetricsCollector::collect(&jobs, 8);
        assert_eq!(2, collector.total_jobs);
        assert_eq!(Some(10), collector.earliest_submission);
        assert_eq!(Some(42), collector.last_termination);
        assert_eq!(20., collector.interarrival_time_stats.mean());
        assert_eq!(3., collector.nprocs_stats.mean());
        assert_eq!(6, collector.peak_processor_demand);
        // memory is unknown for both jobs
        assert_eq!(0, collector.memory_stats.samples());
        assert_eq!(0., collector.memory_stats.min());
    }
}
