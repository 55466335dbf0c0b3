//! One2 VM history traces: one line per VM with the timestamps of its life cycle.
//!
//! The traces carry no information about processors, memory, users or executables.

use crate::core::job::{Job, JobDescriptor};
use crate::trace::error::DecodeError;
use crate::trace::file::codec::{parse_int_field, require_fields, DecodeContext};

const SUBMIT_FIELD: usize = 7;
const EXEC_END_FIELD: usize = 8;
const QUEUE_END_FIELD: usize = 11;

#[derive(Debug, Clone, Default)]
pub struct VmHistoryCodec {}

impl VmHistoryCodec {
    pub fn new() -> Self {
        Default::default()
    }

    /// VMs which never left the queue produce no job. VMs which never finished run until the
    /// end of time.
    pub fn decode(
        &self,
        line: &str,
        context: &DecodeContext,
    ) -> Result<Option<Job>, DecodeError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        require_fields(&fields, QUEUE_END_FIELD + 1)?;

        let queue_end = parse_int_field("queue end", fields[QUEUE_END_FIELD])?;
        if queue_end == 0 {
            return Ok(None);
        }
        let submit = parse_int_field("submit", fields[SUBMIT_FIELD])?;
        let exec_end = parse_int_field("execution end", fields[EXEC_END_FIELD])?;
        let exec = if exec_end == 0 {
            i64::MAX - queue_end
        } else {
            exec_end - queue_end
        };

        Ok(Some((context.factory)(JobDescriptor {
            user: "USER".to_string(),
            group: "GROUP".to_string(),
            executable: "EXEC".to_string(),
            ..JobDescriptor::simple(
                context.trace_line.to_string(),
                submit,
                queue_end - submit,
                exec,
                1,
            )
        })))
    }
}
