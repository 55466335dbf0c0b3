//! Standard workload format (SWF) of the Parallel Workloads Archive.

use log::debug;

use crate::core::job::{Job, JobDescriptor};
use crate::trace::error::DecodeError;
use crate::trace::file::codec::{parse_float_field, parse_int_field, DecodeContext};

pub const STANDARD_WORKLOAD_FIELDS: usize = 18;

/// Value of the preceding job field for jobs without dependency.
const NO_PRECEDING_JOB: &str = "-1";

#[derive(Debug, Clone, Default)]
pub struct StandardWorkloadCodec {}

impl StandardWorkloadCodec {
    pub fn new() -> Self {
        Default::default()
    }

    /// Lines with less than 18 fields are skipped. The preceding job is looked up in the
    /// current batch only.
    pub fn decode(
        &self,
        line: &str,
        context: &DecodeContext,
    ) -> Result<Option<Job>, DecodeError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < STANDARD_WORKLOAD_FIELDS {
            debug!(
                "Skipping trace line {} with {} fields",
                context.trace_line,
                fields.len()
            );
            return Ok(None);
        }

        let preceding = match fields[16] {
            NO_PRECEDING_JOB => None,
            id => context.preceding(id),
        };

        Ok(Some((context.factory)(JobDescriptor {
            id: fields[0].to_string(),
            submit: parse_int_field("submit", fields[1])?,
            queue: parse_int_field("wait", fields[2])?,
            exec: parse_int_field("run", fields[3])?,
            nprocs: parse_int_field("procs", fields[4])?,
            pp_cpu: parse_float_field("average cpu time", fields[5])?,
            pp_mem: parse_int_field("used memory", fields[6])?,
            user: fields[11].to_string(),
            group: fields[12].to_string(),
            executable: fields[13].to_string(),
            preceding,
            think_time: parse_int_field("think time", fields[17])?,
        })))
    }
}
