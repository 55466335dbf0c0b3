//! Readers of trace files and the line codecs of the supported formats.

pub mod codec;
pub mod grid_workload;
pub mod invocation_log;
pub mod reader;
pub mod standard_workload;
pub mod vm_history;
