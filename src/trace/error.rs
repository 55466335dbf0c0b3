//! Errors reported by trace producers and their building blocks.

use thiserror::Error;

/// A single trace line could not be turned into a job.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },
    #[error("field {field} has invalid numeric value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invocation log row has no schema, header line is missing")]
    MissingSchema,
    #[error("malformed csv row: {0}")]
    Csv(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum DistributionError {
    #[error("range [{lower}, {upper}] with cumulative probability {cumulative} is not within [0,1]")]
    OutOfRange {
        lower: f64,
        upper: f64,
        cumulative: f64,
    },
    #[error("distribution is not complete, its probabilities sum up to {0}")]
    Incomplete(f64),
    #[error("distribution has no ranges")]
    Empty,
    #[error("tried to add new range to an already finalized distribution")]
    AlreadyFinalized,
    #[error("tried to sample a not yet finalized distribution")]
    NotFinalized,
}

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("percentile targets are inconsistent: {0}")]
    InconsistentTargets(String),
    #[error("invalid genetic algorithm parameters: {0}")]
    InvalidParameters(String),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

/// Root cause of an aborted read.
#[derive(Debug, Error)]
pub enum ReadFailure {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("invalid trace producer configuration: {0}")]
    Configuration(String),
    #[error("no further jobs: {0}")]
    Exhausted(String),
    #[error("was set to stop after reaching the item {to} of the trace")]
    WindowExhausted { to: usize },
    #[error("all jobs can only be requested before any partial read")]
    PartialReadStarted,
    #[error("{kind} trace read failed at trace line {line} (line {physical_line} of the file)")]
    Read {
        kind: &'static str,
        /// Index of the trace line being processed, metadata lines not counted.
        line: usize,
        physical_line: usize,
        #[source]
        cause: ReadFailure,
    },
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

impl TraceError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, TraceError::Exhausted(_))
    }
}
