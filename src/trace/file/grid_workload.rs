//! Grid workload format (GWF) of the Grid Workloads Archive.

use log::warn;

use crate::core::job::{Job, JobDescriptor};
use crate::trace::error::DecodeError;
use crate::trace::file::codec::{
    parse_float_field, parse_int_field, parse_long_number, require_fields, text_field,
    DecodeContext,
};
use crate::trace::interface::UNKNOWN_PROC_COUNT;

pub const GRID_WORKLOAD_FIELDS: usize = 14;

/// Traces produced by ASKALON record submit times in milliseconds.
const ASKALON_SUFFIX: &str = "ASKALON";

#[derive(Debug, Clone)]
pub struct GridWorkloadCodec {
    max_proc_count: i64,
}

impl Default for GridWorkloadCodec {
    fn default() -> Self {
        Self {
            max_proc_count: UNKNOWN_PROC_COUNT,
        }
    }
}

impl GridWorkloadCodec {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn max_proc_count(&self) -> i64 {
        self.max_proc_count
    }

    /// Header comments may declare the total number of processors of the traced system.
    pub fn collect_metadata(&mut self, line: &str) {
        if !line.contains("Processors") {
            return;
        }
        if let Some(last) = line.split_whitespace().last() {
            match parse_long_number(last) {
                Ok(count) => self.max_proc_count = count,
                Err(_) => warn!("Ignoring processor count {:?} in trace header", last),
            }
        }
    }

    pub fn decode(
        &self,
        line: &str,
        context: &DecodeContext,
    ) -> Result<Option<Job>, DecodeError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        require_fields(&fields, GRID_WORKLOAD_FIELDS)?;

        let submit_field = if line.trim_end().ends_with(ASKALON_SUFFIX) {
            fields[1]
                .get(..fields[1].len().saturating_sub(3))
                .unwrap_or_default()
        } else {
            fields[1]
        };
        let submit = parse_int_field("submit", submit_field)?;
        let wait = parse_int_field("wait", fields[2])?;
        let run = parse_int_field("run", fields[3])?;
        let procs = parse_int_field("procs", fields[4])?;
        let completed = parse_int_field("status", fields[10])? == 1;
        if !completed && (procs < 1 || run < 0) {
            return Ok(None);
        }

        Ok(Some((context.factory)(JobDescriptor {
            id: fields[0].to_string(),
            submit,
            queue: wait.max(0),
            exec: run.max(0),
            nprocs: procs.max(1),
            pp_cpu: parse_float_field("average cpu time", fields[5])?,
            pp_mem: parse_int_field("used memory", fields[6])?,
            user: text_field(fields[11]),
            group: text_field(fields[12]),
            executable: text_field(fields[13]),
            preceding: None,
            think_time: 0,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::GridWorkloadCodec;
    use crate::core::job::{default_job_factory, Job};
    use crate::trace::error::DecodeError;
    use crate::trace::file::codec::{Batch, DecodeContext};

    fn decode(codec: &mut GridWorkloadCodec, line: &str) -> Result<Option<Job>, DecodeError> {
        let batch = Batch::new();
        let factory = default_job_factory();
        let context = DecodeContext {
            trace_line: 0,
            batch: &batch,
            factory: &factory,
        };
        codec.decode(line, &context)
    }

    #[test]
    fn test_decode_completed_job() {
        let mut codec = GridWorkloadCodec::new();
        let job = decode(&mut codec, "1 100 5 20 2 3.5 512 -1 -1 -1 1 u7 -1 app -1 -1")
            .unwrap()
            .unwrap();
        assert_eq!("1", job.id());
        assert_eq!(105, job.start_time());
        assert_eq!(125, job.stop_time());
        assert_eq!(115, job.mid_exec_time());
        assert_eq!(2, job.nprocs());
        assert_eq!(3.5, job.pp_cpu());
        assert_eq!(512, job.pp_mem());
        assert_eq!("u7", job.user());
        assert_eq!("N/A", job.group());
        assert_eq!("app", job.executable());
    }

    #[test]
    fn test_failed_job_without_processors_is_rejected() {
        let mut codec = GridWorkloadCodec::new();
        let line = "2 100 5 20 0 -1 -1 -1 -1 -1 5 u g e";
        assert_eq!(None, decode(&mut codec, line).unwrap());

        // completed jobs are clamped instead
        let line = "2 100 -3 20 0 -1 -1 -1 -1 -1 1 u g e";
        let job = decode(&mut codec, line).unwrap().unwrap();
        assert_eq!(1, job.nprocs());
        assert_eq!(0, job.queue_time());
    }

    #[test]
    fn test_askalon_submit_times() {
        let mut codec = GridWorkloadCodec::new();
        let line = "3 100000 0 10 1 -1 -1 -1 -1 -1 1 u g e ASKALON";
        let job = decode(&mut codec, line).unwrap().unwrap();
        assert_eq!(100, job.submit_time());
    }

    #[test]
    fn test_short_line_is_fatal() {
        let mut codec = GridWorkloadCodec::new();
        assert_eq!(
            Err(DecodeError::TooFewFields {
                expected: 14,
                found: 3
            }),
            decode(&mut codec, "1 2 3")
        );
    }

    #[test]
    fn test_processor_metadata() {
        let mut codec = GridWorkloadCodec::new();
        codec.collect_metadata("# Grid with lots of memory");
        assert_eq!(-1, codec.max_proc_count());
        codec.collect_metadata("# Processors: 4,096");
        assert_eq!(4096, codec.max_proc_count());
        codec.collect_metadata("# Processors: unknown");
        assert_eq!(4096, codec.max_proc_count());
    }
}
