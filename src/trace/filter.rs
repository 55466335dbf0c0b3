//! Producer wrapper dropping the jobs an acceptor does not want.

use crate::core::job::Job;
use crate::trace::error::TraceError;
use crate::trace::interface::TraceProducer;

pub trait JobAcceptor {
    fn accept(&self, job: &Job) -> bool;
}

impl<F: Fn(&Job) -> bool> JobAcceptor for F {
    fn accept(&self, job: &Job) -> bool {
        self(job)
    }
}

/// Accepts jobs that use at most the given number of processors.
pub struct MaxProcs(pub u32);

impl JobAcceptor for MaxProcs {
    fn accept(&self, job: &Job) -> bool {
        job.nprocs() <= self.0
    }
}

/// Forwards every acquisition to the wrapped producer and filters its result. A batch may end
/// up smaller than requested or empty, the position of the wrapped producer still advances.
pub struct TraceFilter {
    inner: Box<dyn TraceProducer>,
    acceptor: Box<dyn JobAcceptor>,
}

impl TraceFilter {
    pub fn new(inner: Box<dyn TraceProducer>, acceptor: impl JobAcceptor + 'static) -> Self {
        Self {
            inner,
            acceptor: Box::new(acceptor),
        }
    }

    fn retain(&self, mut jobs: Vec<Job>) -> Vec<Job> {
        jobs.retain(|job| self.acceptor.accept(job));
        jobs
    }
}

impl TraceProducer for TraceFilter {
    fn get_all_jobs(&mut self) -> Result<Vec<Job>, TraceError> {
        let jobs = self.inner.get_all_jobs()?;
        Ok(self.retain(jobs))
    }

    fn get_jobs(&mut self, num: usize) -> Result<Vec<Job>, TraceError> {
        let jobs = self.inner.get_jobs(num)?;
        Ok(self.retain(jobs))
    }

    fn max_proc_count(&self) -> i64 {
        self.inner.max_proc_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::default_job_factory;
    use crate::test_util::helpers::standard_workload_trace;
    use crate::trace::file::codec::LineCodec;
    use crate::trace::file::reader::{TraceSource, WindowedTraceReader};
    use crate::trace::file::standard_workload::StandardWorkloadCodec;
    use crate::trace::interface::TraceWindow;

    fn swf_producer(jobs: usize, window: TraceWindow) -> Box<dyn TraceProducer> {
        Box::new(WindowedTraceReader::new(
            TraceSource::Text(standard_workload_trace(jobs)),
            window,
            LineCodec::StandardWorkload(StandardWorkloadCodec::new()),
            default_job_factory(),
        ))
    }

    #[test]
    fn test_filter_all_jobs() {
        let mut filter = TraceFilter::new(
            swf_producer(10, TraceWindow::new(0, 10, false)),
            |job: &Job| job.submit_time() % 20 == 0,
        );
        let jobs = filter.get_all_jobs().unwrap();
        let ids: Vec<&str> = jobs.iter().map(|job| job.id()).collect();
        assert_eq!(vec!["0", "2", "4", "6", "8"], ids);
        assert!(matches!(
            filter.get_all_jobs(),
            Err(TraceError::PartialReadStarted)
        ));
    }

    #[test]
    fn test_filtered_batches_keep_inner_position() {
        let mut filter = TraceFilter::new(
            swf_producer(4, TraceWindow::new(0, 4, false)),
            |job: &Job| job.id() == "3",
        );
        assert!(filter.get_jobs(2).unwrap().is_empty());
        let jobs = filter.get_jobs(2).unwrap();
        assert_eq!(1, jobs.len());
        assert_eq!("3", jobs[0].id());
        assert!(matches!(
            filter.get_jobs(2),
            Err(TraceError::WindowExhausted { to: 4 })
        ));
    }

    #[test]
    fn test_max_procs_acceptor() {
        let mut filter =
            TraceFilter::new(swf_producer(3, TraceWindow::new(0, 3, false)), MaxProcs(0));
        assert!(filter.get_all_jobs().unwrap().is_empty());
        assert_eq!(-1, filter.max_proc_count());
    }
}
