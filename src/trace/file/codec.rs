//! Per-format line decoding.
//!
//! Every supported trace format is a variant of `LineCodec`. A codec classifies lines into trace
//! data and metadata, collects whatever the metadata tells about the trace and turns trace lines
//! into jobs. The state a format needs between lines (declared processor count, csv schema,
//! running id counter) is owned by its codec value.

use std::collections::HashMap;
use std::io::BufRead;
use std::rc::Rc;

use crate::core::job::{Job, JobFactory, NOT_AVAILABLE};
use crate::trace::error::{DecodeError, ReadFailure};
use crate::trace::file::grid_workload::GridWorkloadCodec;
use crate::trace::file::invocation_log::InvocationLogCodec;
use crate::trace::file::standard_workload::StandardWorkloadCodec;
use crate::trace::file::vm_history::VmHistoryCodec;
use crate::trace::interface::{TraceWindow, UNKNOWN_PROC_COUNT};

/// Jobs decoded during a single read. Later lines may refer to jobs seen earlier in the same
/// batch. A job with an already known id replaces the previous one at its position.
#[derive(Debug, Default)]
pub struct Batch {
    jobs: Vec<Job>,
    positions: HashMap<String, usize>,
}

impl Batch {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, job: Job) {
        match self.positions.get(job.id()) {
            Some(&position) => self.jobs[position] = job,
            None => {
                self.positions.insert(job.id().to_string(), self.jobs.len());
                self.jobs.push(job);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.positions.get(id).map(|&position| &self.jobs[position])
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn into_jobs(self) -> Vec<Job> {
        self.jobs
    }
}

/// Everything a codec may look at besides the line itself.
pub struct DecodeContext<'a> {
    /// Index of the line among the trace lines of the source.
    pub trace_line: usize,
    pub batch: &'a Batch,
    pub factory: &'a JobFactory,
}

impl DecodeContext<'_> {
    pub fn preceding(&self, id: &str) -> Option<Rc<Job>> {
        self.batch.get(id).map(|job| Rc::new(job.clone()))
    }
}

/// A trace line is any non-empty line not starting with the comment marker.
pub fn basic_trace_line_detector(comment: &str, line: &str) -> bool {
    let trimmed = line.trim();
    !(trimmed.is_empty() || trimmed.starts_with(comment))
}

/// Parses numbers written in human readable form, e.g. `4,096` or `4.096`.
pub fn parse_long_number(value: &str) -> Result<i64, DecodeError> {
    value
        .replace([',', '.'], "")
        .parse::<i64>()
        .map_err(|_| DecodeError::InvalidNumber {
            field: "number",
            value: value.to_string(),
        })
}

/// Integer field which some traces write with a fractional part.
pub fn parse_int_field(field: &'static str, value: &str) -> Result<i64, DecodeError> {
    value.parse::<i64>().or_else(|_| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v as i64)
            .ok_or_else(|| DecodeError::InvalidNumber {
                field,
                value: value.to_string(),
            })
    })
}

pub fn parse_float_field(field: &'static str, value: &str) -> Result<f64, DecodeError> {
    value.parse::<f64>().map_err(|_| DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Textual field where `-1` stands for an unknown value.
pub fn text_field(value: &str) -> String {
    if value == "-1" {
        NOT_AVAILABLE.to_string()
    } else {
        value.to_string()
    }
}

pub fn require_fields(fields: &[&str], expected: usize) -> Result<(), DecodeError> {
    if fields.len() < expected {
        Err(DecodeError::TooFewFields {
            expected,
            found: fields.len(),
        })
    } else {
        Ok(())
    }
}

#[derive(Debug)]
pub enum LineCodec {
    GridWorkload(GridWorkloadCodec),
    StandardWorkload(StandardWorkloadCodec),
    VmHistory(VmHistoryCodec),
    InvocationLog(InvocationLogCodec),
}

impl LineCodec {
    /// Human readable name of the format, used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            LineCodec::GridWorkload(_) => "Grid workload format",
            LineCodec::StandardWorkload(_) => "Standard workload format",
            LineCodec::VmHistory(_) => "One2 VM history",
            LineCodec::InvocationLog(_) => "Serverless invocation log",
        }
    }

    pub fn is_trace_line(&self, line: &str) -> bool {
        match self {
            LineCodec::GridWorkload(_) => basic_trace_line_detector("#", line),
            LineCodec::StandardWorkload(_) => basic_trace_line_detector(";", line),
            LineCodec::VmHistory(_) => basic_trace_line_detector("#", line),
            LineCodec::InvocationLog(codec) => codec.is_trace_line(line),
        }
    }

    /// Whether the codec has to see the whole source before decoding its first line.
    pub fn needs_measurement(&self) -> bool {
        match self {
            LineCodec::InvocationLog(codec) => codec.needs_measurement(),
            _ => false,
        }
    }

    pub fn measure(
        &mut self,
        source: Box<dyn BufRead>,
        window: TraceWindow,
    ) -> Result<(), ReadFailure> {
        match self {
            LineCodec::InvocationLog(codec) => codec.measure(source, window),
            _ => Ok(()),
        }
    }

    /// Called with every line which is not a trace line.
    pub fn collect_metadata(&mut self, line: &str) {
        match self {
            LineCodec::GridWorkload(codec) => codec.collect_metadata(line),
            LineCodec::InvocationLog(codec) => codec.collect_metadata(line),
            LineCodec::StandardWorkload(_) | LineCodec::VmHistory(_) => {}
        }
    }

    /// Jobs described by a trace line. An empty result means the line was rejected.
    pub fn decode(
        &mut self,
        line: &str,
        context: &DecodeContext,
    ) -> Result<Vec<Job>, ReadFailure> {
        let decoded = match self {
            LineCodec::GridWorkload(codec) => codec.decode(line, context)?,
            LineCodec::StandardWorkload(codec) => codec.decode(line, context)?,
            LineCodec::VmHistory(codec) => codec.decode(line, context)?,
            LineCodec::InvocationLog(codec) => return codec.decode(line, context),
        };
        Ok(decoded.into_iter().collect())
    }

    pub fn max_proc_count(&self) -> i64 {
        match self {
            LineCodec::GridWorkload(codec) => codec.max_proc_count(),
            _ => UNKNOWN_PROC_COUNT,
        }
    }
}
