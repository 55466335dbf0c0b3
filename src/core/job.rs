//! Type definition for Job record produced by traces.

use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

/// Textual fields that are not known in a trace are set to this value.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Error, PartialEq)]
pub enum JobError {
    #[error("cannot adjust job {0} as it has already ran")]
    AlreadyRan(String),
}

/// All values needed to construct a job. Decoders and generators fill this in and hand it over
/// to a `JobFactory` which creates the actual record.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    pub id: String,
    pub submit: i64, // in seconds
    pub queue: i64,  // in seconds
    pub exec: i64,   // in seconds
    pub nprocs: i64,
    /// Average cpu time spent per processor
    pub pp_cpu: f64,
    /// Used memory per processor
    pub pp_mem: i64,
    pub user: String,
    pub group: String,
    pub executable: String,
    pub preceding: Option<Rc<Job>>,
    /// Think time between the end of the preceding job and the submission of this one.
    pub think_time: i64,
}

impl JobDescriptor {
    /// Descriptor with the given timing and size, everything else is left unknown.
    pub fn simple(id: String, submit: i64, queue: i64, exec: i64, nprocs: i64) -> Self {
        Self {
            id,
            submit,
            queue,
            exec,
            nprocs,
            pp_cpu: -1.0,
            pp_mem: -1,
            user: String::new(),
            group: String::new(),
            executable: String::new(),
            preceding: None,
            think_time: 0,
        }
    }
}

/// Constructs jobs out of descriptors. Allows callers to post-process every record a producer
/// creates without knowing the trace format.
pub type JobFactory = Rc<dyn Fn(JobDescriptor) -> Job>;

pub fn default_job_factory() -> JobFactory {
    Rc::new(Job::new)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    id: String,
    submit_time: i64,
    queue_time: i64,
    exec_time: i64,
    start_time: i64,
    stop_time: i64,
    mid_exec_time: i64,
    nprocs: u32,
    pp_cpu: f64,
    pp_mem: i64,
    user: String,
    group: String,
    executable: String,
    #[serde(skip)]
    preceding: Option<Rc<Job>>,
    think_time: i64,

    // Filled in by the simulator that runs the job, -1 until then.
    real_queue_time: i64,
    real_stop_time: i64,
    ran: bool,
}

impl Job {
    pub fn new(descriptor: JobDescriptor) -> Self {
        let queue_time = descriptor.queue.max(0);
        let exec_time = descriptor.exec.max(0);
        let start_time = descriptor.submit.saturating_add(queue_time);
        let stop_time = start_time.saturating_add(exec_time);
        Self {
            id: descriptor.id,
            submit_time: descriptor.submit,
            queue_time,
            exec_time,
            start_time,
            stop_time,
            mid_exec_time: start_time.saturating_add(exec_time / 2),
            nprocs: descriptor.nprocs.clamp(1, u32::MAX as i64) as u32,
            pp_cpu: descriptor.pp_cpu,
            pp_mem: descriptor.pp_mem,
            user: descriptor.user,
            group: descriptor.group,
            executable: descriptor.executable,
            preceding: descriptor.preceding,
            think_time: descriptor.think_time,
            real_queue_time: -1,
            real_stop_time: -1,
            ran: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn submit_time(&self) -> i64 {
        self.submit_time
    }

    pub fn queue_time(&self) -> i64 {
        self.queue_time
    }

    pub fn exec_time(&self) -> i64 {
        self.exec_time
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn stop_time(&self) -> i64 {
        self.stop_time
    }

    pub fn mid_exec_time(&self) -> i64 {
        self.mid_exec_time
    }

    pub fn nprocs(&self) -> u32 {
        self.nprocs
    }

    /// Average cpu time spent per processor, negative if unknown.
    pub fn pp_cpu(&self) -> f64 {
        self.pp_cpu
    }

    /// Memory used per processor, negative if unknown.
    pub fn pp_mem(&self) -> i64 {
        self.pp_mem
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Job this one waits for, if it was found in the same batch.
    pub fn preceding(&self) -> Option<&Job> {
        self.preceding.as_deref()
    }

    pub fn think_time(&self) -> i64 {
        self.think_time
    }

    pub fn real_queue_time(&self) -> i64 {
        self.real_queue_time
    }

    pub fn real_stop_time(&self) -> i64 {
        self.real_stop_time
    }

    pub fn ran(&self) -> bool {
        self.ran
    }

    /// Execution intervals are half-open: [start, stop). Jobs touching each other at a single
    /// instant do not overlap.
    pub fn is_overlapping(&self, other: &Job) -> bool {
        self.start_time < other.stop_time && other.start_time < self.stop_time
    }

    /// Shifts the job in time. Only allowed until the job is executed.
    pub fn adjust(&mut self, offset: i64) -> Result<(), JobError> {
        if self.ran {
            return Err(JobError::AlreadyRan(self.id.clone()));
        }
        self.submit_time += offset;
        self.start_time += offset;
        self.stop_time += offset;
        self.mid_exec_time += offset;
        Ok(())
    }

    /// Called by a simulator when the job actually starts at `now`.
    pub fn started(&mut self, now: i64) {
        if !self.ran {
            self.real_queue_time = now - self.submit_time;
        }
    }

    /// Called by a simulator when the job finishes at `now`. The job is immutable afterwards.
    pub fn completed(&mut self, now: i64) {
        if !self.ran {
            self.real_stop_time = now - self.submit_time;
            self.ran = true;
        }
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Job: {} Start Time: {} Stop Time: {} Procs: {}",
            self.id, self.submit_time, self.stop_time, self.nprocs
        )
    }
}
