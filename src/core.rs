pub mod analyser;
pub mod job;
