//! Serverless function invocation logs in csv form.
//!
//! Two layouts are supported, told apart by the header row:
//! - the bucketed layout of the Azure Functions dataset (merged with its duration and memory
//!   files), one row per function with per-minute invocation counts and percentile summaries
//!   of execution time and allocated memory. Every invocation of a row becomes a job; execution
//!   times and memory are synthesized by the percentile calibrator;
//! - a flat layout with one row per invocation and explicit start, duration, cpu and memory.
//!
//! Bucketed logs can be rescaled to a required number of jobs. The codec then measures the
//! accepted invocations of the window before the first row is decoded and scales every
//! per-minute count by the same factor, keeping the shape of each function's activity.

use std::io::BufRead;

use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::Deserialize;

use crate::core::job::{Job, JobDescriptor};
use crate::trace::calibrator::genetic::{GeneticParameters, PercentileCalibrator};
use crate::trace::calibrator::targets::PercentileTargetSet;
use crate::trace::error::{CalibrationError, DecodeError, ReadFailure};
use crate::trace::file::codec::{parse_float_field, parse_int_field, require_fields, DecodeContext};
use crate::trace::interface::TraceWindow;

/// Headers with more columns than this describe the bucketed layout.
pub const FLAT_SCHEMA_MAX_COLUMNS: usize = 30;
pub const MINUTES_PER_DAY: usize = 1440;
/// Submit time of the first minute bucket.
pub const INVOCATION_EPOCH: i64 = 1557656918;

const OWNER_COLUMN: usize = 0;
const FUNCTION_COLUMN: usize = 2;
const TRIGGER_COLUMN: usize = 3;
const FIRST_MINUTE_COLUMN: usize = 4;
const AVERAGE_COLUMN: usize = FIRST_MINUTE_COLUMN + MINUTES_PER_DAY;
const COUNT_COLUMN: usize = AVERAGE_COLUMN + 1;
const MAXIMUM_COLUMN: usize = AVERAGE_COLUMN + 3;
const EXECUTION_PERCENTILE_COLUMN: usize = AVERAGE_COLUMN + 4;
const MEMORY_PERCENTILE_COLUMN: usize = EXECUTION_PERCENTILE_COLUMN + 7 + 2;
pub const BUCKETED_SCHEMA_COLUMNS: usize = MEMORY_PERCENTILE_COLUMN + 8;

const FLAT_ID_COLUMN: usize = 0;
const FLAT_CPU_COLUMN: usize = 2;
const FLAT_EXECUTABLE_COLUMN: usize = 4;
const FLAT_START_COLUMN: usize = 13;
const FLAT_MEMORY_COLUMN: usize = 18;
const FLAT_DURATION_COLUMN: usize = 22;

/// Filters applied to the rows of bucketed invocation logs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InvocationLogOptions {
    /// Only functions with exactly this trigger are used, all of them if not set.
    pub trigger: Option<String>,
    pub min_invocations: i64,
    /// First minute of the day to take invocations from.
    pub min_minute: usize,
    /// Minute of the day to stop at, exclusive.
    pub max_minute: usize,
    pub min_execution_time: f64,
    /// Rescale the invocations of the window to about this many jobs.
    pub required_jobs: Option<usize>,
}

impl Default for InvocationLogOptions {
    fn default() -> Self {
        Self {
            trigger: None,
            min_invocations: 0,
            min_minute: 0,
            max_minute: MINUTES_PER_DAY,
            min_execution_time: 0.,
            required_jobs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvocationSchema {
    Bucketed,
    Flat,
}

fn split_fields(line: &str) -> Result<StringRecord, DecodeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => record.map_err(|e| DecodeError::Csv(e.to_string())),
        None => Ok(StringRecord::new()),
    }
}

/// Layout announced by a header row.
fn schema_of(header: &str) -> InvocationSchema {
    let columns = split_fields(header).map_or(0, |header| header.len());
    if columns > FLAT_SCHEMA_MAX_COLUMNS {
        InvocationSchema::Bucketed
    } else {
        InvocationSchema::Flat
    }
}

fn parse_columns<const N: usize>(
    fields: &[&str],
    first: usize,
    name: &'static str,
) -> Result<[f64; N], DecodeError> {
    let mut values = [0.; N];
    for (i, value) in values.iter_mut().enumerate() {
        *value = parse_float_field(name, fields[first + i])?;
    }
    Ok(values)
}

/// First run of digits in a field such as `"[2]"`.
fn leading_digits(value: &str) -> Option<i64> {
    let digits: String = value
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Per-minute invocation counts of an accepted bucketed row.
struct BucketedRow {
    trigger: String,
    maximum: f64,
    invocations: Vec<(usize, usize)>,
    execution: [f64; 7],
    memory: [f64; 8],
}

impl BucketedRow {
    fn total(&self) -> usize {
        self.invocations.iter().map(|(_, invoked)| invoked).sum()
    }
}

/// Scales invocation counts by a constant factor. Fractions are carried over to the following
/// counts, so the scaled total stays within one of `factor` times the original total.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationScale {
    factor: f64,
    carry: f64,
}

impl InvocationScale {
    pub fn new(required: usize, measured: usize) -> Self {
        let factor = if measured == 0 {
            1.
        } else {
            required as f64 / measured as f64
        };
        Self { factor, carry: 0. }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn apply(&mut self, count: usize) -> usize {
        let exact = count as f64 * self.factor + self.carry;
        let whole = exact.floor();
        self.carry = exact - whole;
        whole as usize
    }
}

pub struct InvocationLogCodec {
    options: InvocationLogOptions,
    schema: Option<InvocationSchema>,
    scale: Option<InvocationScale>,
    rng: Pcg64,
    calibrator: PercentileCalibrator,
    next_id: u64,
}

impl std::fmt::Debug for InvocationLogCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationLogCodec")
            .field("options", &self.options)
            .field("schema", &self.schema)
            .field("scale", &self.scale)
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl InvocationLogCodec {
    pub fn new(
        options: InvocationLogOptions,
        genetic: GeneticParameters,
        seed: u64,
    ) -> Result<Self, CalibrationError> {
        Ok(Self {
            options,
            schema: None,
            scale: None,
            rng: Pcg64::seed_from_u64(seed),
            calibrator: PercentileCalibrator::new(genetic, seed.wrapping_add(1))?,
            next_id: 0,
        })
    }

    pub fn schema(&self) -> Option<InvocationSchema> {
        self.schema
    }

    pub fn scale(&self) -> Option<&InvocationScale> {
        self.scale.as_ref()
    }

    /// Whether the log has to be measured with `measure` before decoding.
    pub fn needs_measurement(&self) -> bool {
        self.options.required_jobs.is_some() && self.scale.is_none()
    }

    /// Counts the accepted invocations of the rows in `window` and derives the scale reaching
    /// `required_jobs`. Flat logs have one job per row and are not rescaled.
    pub fn measure(
        &mut self,
        source: impl BufRead,
        window: TraceWindow,
    ) -> Result<(), ReadFailure> {
        let required = match self.options.required_jobs {
            Some(required) => required,
            None => return Ok(()),
        };
        let mut schema = None;
        let mut row_index = 0;
        let mut measured = 0;
        for line in source.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if schema.is_none() {
                schema = Some(schema_of(&line));
                continue;
            }
            if window.is_closed_at(row_index) {
                break;
            }
            if row_index >= window.from && schema == Some(InvocationSchema::Bucketed) {
                let record = split_fields(&line)?;
                let fields: Vec<&str> = record.iter().collect();
                if let Some(row) = self.accepted_row(&fields)? {
                    measured += row.total();
                }
            }
            row_index += 1;
        }

        if schema != Some(InvocationSchema::Bucketed) {
            warn!("Only bucketed invocation logs can be rescaled, reading jobs as they are");
            self.scale = Some(InvocationScale::new(1, 1));
            return Ok(());
        }
        let scale = InvocationScale::new(required, measured);
        info!(
            "Rescaling {} invocations to {} jobs (factor {:.4})",
            measured,
            required,
            scale.factor()
        );
        self.scale = Some(scale);
        Ok(())
    }

    /// The header row is the only metadata line, every later non-empty row is trace data.
    pub fn is_trace_line(&self, line: &str) -> bool {
        self.schema.is_some() && !line.trim().is_empty()
    }

    pub fn collect_metadata(&mut self, line: &str) {
        if self.schema.is_some() || line.trim().is_empty() {
            return;
        }
        let schema = schema_of(line);
        debug!("Invocation log header {:?}", schema);
        self.schema = Some(schema);
    }

    pub fn decode(
        &mut self,
        line: &str,
        context: &DecodeContext,
    ) -> Result<Vec<Job>, ReadFailure> {
        let record = split_fields(line)?;
        let fields: Vec<&str> = record.iter().collect();
        match self.schema {
            Some(InvocationSchema::Bucketed) => self.decode_bucketed(&fields, context),
            Some(InvocationSchema::Flat) => Ok(vec![self.decode_flat(&fields, context)?]),
            None => Err(DecodeError::MissingSchema.into()),
        }
    }

    fn accepts(&self, trigger: &str, count: i64, average: f64, maximum: f64) -> bool {
        if let Some(expected) = &self.options.trigger {
            if expected != trigger {
                return false;
            }
        }
        maximum != 0.
            && average != 0.
            && count >= self.options.min_invocations
            && average >= self.options.min_execution_time
    }

    /// Parses a bucketed row, `None` if the filters reject it.
    fn accepted_row(&self, fields: &[&str]) -> Result<Option<BucketedRow>, DecodeError> {
        require_fields(fields, BUCKETED_SCHEMA_COLUMNS)?;

        let trigger = fields[TRIGGER_COLUMN];
        let average = parse_float_field("average execution time", fields[AVERAGE_COLUMN])?;
        let count = parse_int_field("invocation count", fields[COUNT_COLUMN])?;
        let maximum = parse_float_field("maximum execution time", fields[MAXIMUM_COLUMN])?;
        if !self.accepts(trigger, count, average, maximum) {
            return Ok(None);
        }

        let last_minute = self.options.max_minute.min(MINUTES_PER_DAY);
        let mut invocations = Vec::new();
        for minute in self.options.min_minute..last_minute {
            let invoked = parse_int_field("invocations", fields[FIRST_MINUTE_COLUMN + minute])?;
            invocations.push((minute, invoked.max(0) as usize));
        }

        let memory: [f64; 8] = parse_columns(fields, MEMORY_PERCENTILE_COLUMN, "memory")?;
        if memory[7] <= 0. {
            debug!("Skipping function {} without memory data", fields[FUNCTION_COLUMN]);
            return Ok(None);
        }
        let execution: [f64; 7] =
            parse_columns(fields, EXECUTION_PERCENTILE_COLUMN, "execution time")?;
        Ok(Some(BucketedRow {
            trigger: trigger.to_string(),
            maximum,
            invocations,
            execution,
            memory,
        }))
    }

    fn decode_bucketed(
        &mut self,
        fields: &[&str],
        context: &DecodeContext,
    ) -> Result<Vec<Job>, ReadFailure> {
        let mut row = match self.accepted_row(fields)? {
            Some(row) => row,
            None => return Ok(vec![]),
        };
        if let Some(scale) = self.scale.as_mut() {
            for (_, invoked) in row.invocations.iter_mut() {
                *invoked = scale.apply(*invoked);
            }
        }
        let total = row.total();
        if total == 0 {
            return Ok(vec![]);
        }

        let execution_targets = PercentileTargetSet::execution_time(row.execution, row.maximum)?;
        let memory_targets = PercentileTargetSet::memory(row.memory)?;

        let runtimes = self.calibrator.generate(&execution_targets, total)?;
        let memories = self.calibrator.generate(&memory_targets, total)?;

        let mut jobs = Vec::with_capacity(total);
        let mut samples = runtimes.iter().zip(memories.iter());
        for (minute, invoked) in row.invocations {
            for (runtime, memory) in samples.by_ref().take(invoked) {
                let runtime = *runtime as i64;
                let memory = *memory as i64;
                let nprocs = if memory > 0 { runtime / memory } else { 1 };
                let submit = INVOCATION_EPOCH + minute as i64 * 60 + self.rng.gen_range(0..60);
                jobs.push((context.factory)(JobDescriptor {
                    id: self.next_id.to_string(),
                    submit,
                    queue: 1,
                    exec: runtime,
                    nprocs: nprocs.max(1),
                    pp_cpu: 0.,
                    pp_mem: memory,
                    user: fields[OWNER_COLUMN].to_string(),
                    group: row.trigger.clone(),
                    executable: fields[FUNCTION_COLUMN].to_string(),
                    preceding: None,
                    think_time: 0,
                }));
                self.next_id += 1;
            }
        }
        Ok(jobs)
    }

    fn decode_flat(&self, fields: &[&str], context: &DecodeContext) -> Result<Job, DecodeError> {
        require_fields(fields, FLAT_DURATION_COLUMN + 1)?;
        let start = parse_float_field("start", fields[FLAT_START_COLUMN])?;
        let memory = parse_float_field("memory", fields[FLAT_MEMORY_COLUMN])?;
        let duration = parse_float_field("duration", fields[FLAT_DURATION_COLUMN])?;
        let cpu = leading_digits(fields[FLAT_CPU_COLUMN]).unwrap_or(1);

        Ok((context.factory)(JobDescriptor {
            id: fields[FLAT_ID_COLUMN].to_string(),
            submit: (start / 1000.) as i64,
            queue: 0,
            exec: duration as i64,
            nprocs: cpu.max(1),
            pp_cpu: 0.,
            pp_mem: memory as i64,
            user: "U".to_string(),
            group: "G".to_string(),
            executable: fields[FLAT_EXECUTABLE_COLUMN].to_string(),
            preceding: None,
            think_time: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_layout() {
        assert_eq!(1444, AVERAGE_COLUMN);
        assert_eq!(1447, MAXIMUM_COLUMN);
        assert_eq!(1448, EXECUTION_PERCENTILE_COLUMN);
        assert_eq!(1457, MEMORY_PERCENTILE_COLUMN);
        assert_eq!(1465, BUCKETED_SCHEMA_COLUMNS);
    }

    #[test]
    fn test_schema_detection() {
        let mut codec =
            InvocationLogCodec::new(Default::default(), Default::default(), 1).unwrap();
        assert!(!codec.is_trace_line("a,b,c"));
        codec.collect_metadata("a,b,c");
        assert_eq!(Some(InvocationSchema::Flat), codec.schema());
        assert!(codec.is_trace_line("1,2,3"));

        let mut codec =
            InvocationLogCodec::new(Default::default(), Default::default(), 1).unwrap();
        codec.collect_metadata(&["c"; 40].join(","));
        assert_eq!(Some(InvocationSchema::Bucketed), codec.schema());
    }

    #[test]
    fn test_scale_keeps_total() {
        let mut scale = InvocationScale::new(10, 100);
        let scaled: usize = [30, 10, 60].iter().map(|count| scale.apply(*count)).sum();
        assert_eq!(10, scaled);

        let mut scale = InvocationScale::new(7, 3);
        let scaled: Vec<usize> = [1, 1, 1].iter().map(|count| scale.apply(*count)).collect();
        assert_eq!(7, scaled.iter().sum::<usize>());
        assert!(scaled.iter().all(|count| (2..=3).contains(count)));

        assert_eq!(1., InvocationScale::new(5, 0).factor());
    }

    #[test]
    fn test_leading_digits() {
        assert_eq!(Some(2), leading_digits("[2]"));
        assert_eq!(Some(16), leading_digits("x16y3"));
        assert_eq!(None, leading_digits("none"));
    }
}
