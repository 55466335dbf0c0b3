//! Incremental reader for line based trace files.
//!
//! The reader exposes the trace lines [from, to) of its source. Lines are classified by the
//! codec: metadata lines are handed to the codec and never count as trace lines. The source is
//! opened on the first acquisition and kept open across `get_jobs` calls until it ends.

use std::collections::VecDeque;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;

use log::{debug, info};

use crate::core::job::{Job, JobFactory};
use crate::trace::error::{ReadFailure, TraceError};
use crate::trace::file::codec::{Batch, DecodeContext, LineCodec};
use crate::trace::interface::{TraceProducer, TraceWindow};

#[derive(Debug, Clone, PartialEq)]
pub enum TraceSource {
    File(PathBuf),
    /// In-memory trace contents.
    Text(String),
}

impl TraceSource {
    fn open(&self) -> std::io::Result<Box<dyn BufRead>> {
        Ok(match self {
            TraceSource::File(path) => Box::new(BufReader::new(File::open(path)?)),
            TraceSource::Text(text) => Box::new(Cursor::new(text.clone().into_bytes())),
        })
    }
}

impl Display for TraceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceSource::File(path) => write!(f, "{}", path.display()),
            TraceSource::Text(_) => write!(f, "<in-memory trace>"),
        }
    }
}

enum ReaderState {
    Unopened,
    Reading(Box<dyn BufRead>),
    Exhausted,
}

pub struct WindowedTraceReader {
    source: TraceSource,
    window: TraceWindow,
    codec: LineCodec,
    factory: JobFactory,
    state: ReaderState,
    /// Trace lines consumed so far, including the ones skipped before the window.
    position: usize,
    /// Physical line number of the last line read from the source.
    line_number: usize,
    /// Jobs decoded beyond the amount requested by the previous `get_jobs` call.
    pending: VecDeque<Job>,
}

impl WindowedTraceReader {
    pub fn new(
        source: TraceSource,
        window: TraceWindow,
        codec: LineCodec,
        factory: JobFactory,
    ) -> Self {
        Self {
            source,
            window,
            codec,
            factory,
            state: ReaderState::Unopened,
            position: 0,
            line_number: 0,
            pending: VecDeque::new(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn codec(&self) -> &LineCodec {
        &self.codec
    }

    /// Whether the source ended and every decoded job was delivered.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.state, ReaderState::Exhausted) && self.pending.is_empty()
    }

    fn open(&mut self) -> Result<(), TraceError> {
        info!(
            "{} trace file reader starts reading {} (window: [{}, {}), further: {})",
            self.codec.kind(),
            self.source,
            self.window.from,
            self.window.to,
            self.window.allow_reading_further
        );
        if self.codec.needs_measurement() {
            let source = match self.source.open() {
                Ok(source) => source,
                Err(e) => return Err(self.fail(e.into())),
            };
            if let Err(cause) = self.codec.measure(source, self.window) {
                return Err(self.fail(cause));
            }
        }
        match self.source.open() {
            Ok(reader) => self.state = ReaderState::Reading(reader),
            Err(e) => return Err(self.fail(e.into())),
        }
        self.skip_to_window()
    }

    /// Closes the source and turns `cause` into a read error carrying the index of the trace
    /// line being processed. Partially read jobs are dropped.
    fn fail(&mut self, cause: ReadFailure) -> TraceError {
        self.state = ReaderState::Exhausted;
        self.pending.clear();
        TraceError::Read {
            kind: self.codec.kind(),
            line: self.position,
            physical_line: self.line_number,
            cause,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, TraceError> {
        let reader = match &mut self.state {
            ReaderState::Reading(reader) => reader,
            _ => return Ok(None),
        };
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                self.state = ReaderState::Exhausted;
                info!(
                    "{} trace file reader stops at line {} of {}",
                    self.codec.kind(),
                    self.line_number,
                    self.source
                );
                Ok(None)
            }
            Ok(_) => {
                self.line_number += 1;
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Ok(Some(line))
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn skip_to_window(&mut self) -> Result<(), TraceError> {
        while self.position < self.window.from {
            let line = match self.next_line()? {
                Some(line) => line,
                None => break,
            };
            if self.codec.is_trace_line(&line) {
                self.position += 1;
            } else {
                self.codec.collect_metadata(&line);
            }
        }
        Ok(())
    }

    /// Decodes trace lines until `max_lines` of them were consumed, `max_jobs` jobs were
    /// collected or the source ends. Rejected lines count towards `max_lines`. Surplus jobs of a
    /// line describing several jobs are kept for the next call.
    fn read_batch(
        &mut self,
        max_lines: Option<usize>,
        max_jobs: Option<usize>,
    ) -> Result<Vec<Job>, TraceError> {
        let mut batch = Batch::new();
        let mut lines = 0;
        while max_lines.map_or(true, |max| lines < max)
            && max_jobs.map_or(true, |max| batch.len() < max)
        {
            let line = match self.next_line()? {
                Some(line) => line,
                None => break,
            };
            if !self.codec.is_trace_line(&line) {
                self.codec.collect_metadata(&line);
                continue;
            }

            let context = DecodeContext {
                trace_line: self.position,
                batch: &batch,
                factory: &self.factory,
            };
            let jobs = match self.codec.decode(&line, &context) {
                Ok(jobs) => jobs,
                Err(cause) => return Err(self.fail(cause)),
            };
            self.position += 1;
            lines += 1;

            for job in jobs {
                if max_jobs.map_or(false, |max| batch.len() >= max) {
                    self.pending.push_back(job);
                } else {
                    batch.insert(job);
                }
            }
        }
        debug!(
            "Read {} jobs from {} trace lines, position {}",
            batch.len(),
            lines,
            self.position
        );
        Ok(batch.into_jobs())
    }

    fn exhausted_error(&self) -> TraceError {
        TraceError::Exhausted(format!(
            "{} trace {} has no more jobs after line {}",
            self.codec.kind(),
            self.source,
            self.line_number
        ))
    }
}

impl TraceProducer for WindowedTraceReader {
    fn get_all_jobs(&mut self) -> Result<Vec<Job>, TraceError> {
        if !matches!(self.state, ReaderState::Unopened) {
            return Err(TraceError::PartialReadStarted);
        }
        self.open()?;
        let lines = self.window.to.saturating_sub(self.position);
        let jobs = self.read_batch(Some(lines), None)?;
        info!(
            "{} trace file reader read {} jobs from {}",
            self.codec.kind(),
            jobs.len(),
            self.source
        );
        Ok(jobs)
    }

    fn get_jobs(&mut self, num: usize) -> Result<Vec<Job>, TraceError> {
        if num == 0 {
            return Ok(vec![]);
        }
        let mut jobs: Vec<Job> = self.pending.drain(..num.min(self.pending.len())).collect();
        if jobs.len() == num {
            return Ok(jobs);
        }

        if matches!(self.state, ReaderState::Unopened) {
            self.open()?;
        }
        if matches!(self.state, ReaderState::Exhausted) {
            return if jobs.is_empty() {
                Err(self.exhausted_error())
            } else {
                Ok(jobs)
            };
        }
        if self.window.is_closed_at(self.position) {
            return if jobs.is_empty() {
                Err(TraceError::WindowExhausted { to: self.window.to })
            } else {
                Ok(jobs)
            };
        }

        let wanted = num - jobs.len();
        let max_lines = self.window.allowance(self.position, wanted);
        let batch = self.read_batch(Some(max_lines), Some(wanted))?;
        jobs.extend(batch);

        if jobs.is_empty() && self.is_exhausted() {
            return Err(self.exhausted_error());
        }
        Ok(jobs)
    }

    fn max_proc_count(&self) -> i64 {
        self.codec.max_proc_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::job::default_job_factory;
    use crate::trace::file::standard_workload::StandardWorkloadCodec;

    fn swf_trace(jobs: usize) -> String {
        let mut trace = String::from("; Version: 2.2\n; MaxJobs: many\n");
        for i in 0..jobs {
            trace += &format!("{} {} 0 10 1 -1 -1 -1 -1 -1 1 1 1 1 1 -1 -1 -1\n", i, i * 10);
        }
        trace
    }

    fn reader(trace: String, window: TraceWindow) -> WindowedTraceReader {
        WindowedTraceReader::new(
            TraceSource::Text(trace),
            window,
            LineCodec::StandardWorkload(StandardWorkloadCodec::new()),
            default_job_factory(),
        )
    }

    #[test]
    fn test_get_all_jobs_is_single_shot() {
        let mut reader = reader(swf_trace(10), TraceWindow::new(2, 6, false));
        let jobs = reader.get_all_jobs().unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.id()).collect();
        assert_eq!(vec!["2", "3", "4", "5"], ids);
        assert!(matches!(
            reader.get_all_jobs(),
            Err(TraceError::PartialReadStarted)
        ));
    }

    #[test]
    fn test_rejected_lines_use_up_request() {
        let trace = swf_trace(1)
            + "1 2 3\n1 2 3\n"
            + "3 30 0 10 1 -1 -1 -1 -1 -1 1 1 1 1 1 -1 -1 -1\n"
            + "4 40 0 10 1 -1 -1 -1 -1 -1 1 1 1 1 1 -1 -1 -1\n";
        let mut reader = reader(trace, TraceWindow::new(0, 10, true));

        let jobs = reader.get_jobs(2).unwrap();
        assert_eq!(vec!["0"], jobs.iter().map(|j| j.id()).collect::<Vec<_>>());
        assert_eq!(2, reader.position());

        let jobs = reader.get_jobs(2).unwrap();
        assert_eq!(vec!["3"], jobs.iter().map(|j| j.id()).collect::<Vec<_>>());
        assert_eq!(4, reader.position());

        assert_eq!(1, reader.get_jobs(2).unwrap().len());
        assert!(reader.get_jobs(2).unwrap_err().is_exhausted());
    }

    #[test]
    fn test_fully_rejected_request_is_not_exhaustion() {
        let trace = swf_trace(0)
            + "1 2 3\n"
            + "1 10 0 10 1 -1 -1 -1 -1 -1 1 1 1 1 1 -1 -1 -1\n";
        let mut reader = reader(trace, TraceWindow::new(0, 10, false));
        assert!(reader.get_jobs(1).unwrap().is_empty());
        assert_eq!(1, reader.get_jobs(1).unwrap().len());
    }

    #[test]
    fn test_window_beyond_trace_end() {
        let mut reader = reader(swf_trace(3), TraceWindow::new(0, 10, false));
        assert_eq!(3, reader.get_jobs(5).unwrap().len());
        assert!(reader.get_jobs(5).unwrap_err().is_exhausted());
    }

    #[test]
    fn test_broken_line_aborts_read() {
        let trace = swf_trace(2) + "3 x 0 10 1 -1 -1 -1 -1 -1 1 1 1 1 1 -1 -1 -1\n";
        let mut reader = reader(trace, TraceWindow::new(0, 10, false));
        match reader.get_jobs(10) {
            Err(TraceError::Read {
                line,
                physical_line,
                ..
            }) => {
                assert_eq!(2, line);
                assert_eq!(5, physical_line);
            }
            other => panic!("unexpected result {:?}", other.map(|jobs| jobs.len())),
        }
        assert!(reader.get_jobs(1).unwrap_err().is_exhausted());
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let mut reader = WindowedTraceReader::new(
            TraceSource::File(PathBuf::from("/nonexistent/trace.swf")),
            TraceWindow::new(0, 10, false),
            LineCodec::StandardWorkload(StandardWorkloadCodec::new()),
            default_job_factory(),
        );
        assert!(matches!(
            reader.get_all_jobs(),
            Err(TraceError::Read {
                cause: ReadFailure::Io(_),
                ..
            })
        ));
    }
}
