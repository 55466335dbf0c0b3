//! Config fields definitions for trace producers

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::job::default_job_factory;
use crate::metrics::printer::SummaryPrinterConfig;
use crate::trace::calibrator::genetic::GeneticParameters;
use crate::trace::error::TraceError;
use crate::trace::factory::{producer_from_file, ProducerSettings};
use crate::trace::file::invocation_log::InvocationLogOptions;
use crate::trace::interface::{TraceProducer, TraceWindow};
use crate::trace::random::generator::DEFAULT_SEED;

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TraceHelpersConfig {
    /// Trace file or random generator definition. Relative paths are resolved against the
    /// directory of the config file by `from_file`.
    pub trace_file: PathBuf,
    /// First trace line to produce.
    pub from: usize,
    /// Trace line to stop at, exclusive.
    pub to: usize,
    #[serde(default)]
    pub allow_reading_further: bool,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Capacity of the simulated infrastructure, required by random trace generators.
    pub max_proc_count: Option<i64>,
    /// If set, jobs are pulled in batches of this size instead of all at once.
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub invocation_log: InvocationLogOptions,
    #[serde(default)]
    pub calibrator: GeneticParameters,
    pub summary: Option<SummaryPrinterConfig>,
}

impl TraceHelpersConfig {
    pub fn from_str(config: &str) -> Result<Self, TraceError> {
        serde_yaml::from_str(config)
            .map_err(|e| TraceError::Configuration(format!("cannot parse config: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, TraceError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TraceError::Configuration(format!("cannot read config {:?}: {}", path, e))
        })?;
        let mut config = Self::from_str(&contents)?;
        if config.trace_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.trace_file = dir.join(&config.trace_file);
            }
        }
        Ok(config)
    }

    pub fn window(&self) -> TraceWindow {
        TraceWindow::new(self.from, self.to, self.allow_reading_further)
    }

    pub fn producer_settings(&self) -> ProducerSettings {
        ProducerSettings {
            window: self.window(),
            seed: self.seed,
            max_proc_count: self.max_proc_count,
            invocation_log: self.invocation_log.clone(),
            calibrator: self.calibrator.clone(),
            factory: default_job_factory(),
        }
    }

    pub fn producer(&self) -> Result<Box<dyn TraceProducer>, TraceError> {
        producer_from_file(&self.trace_file, &self.producer_settings())
    }
}

#[cfg(test)]
mod tests {
    use super::TraceHelpersConfig;
    use crate::metrics::printer::OutputFormat;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = TraceHelpersConfig::from_str(
            r#"
            trace_file: trace.swf
            from: 0
            to: 100
            "#,
        )
        .unwrap();
        assert!(!config.allow_reading_further);
        assert_eq!(1, config.seed);
        assert_eq!(None, config.invocation_log.trigger);
        assert_eq!(1440, config.invocation_log.max_minute);
        assert_eq!(None, config.invocation_log.required_jobs);
        assert_eq!(10, config.calibrator.population_size);
        assert_eq!(None, config.summary);
    }

    #[test]
    fn test_full_config() {
        let config = TraceHelpersConfig::from_str(
            r#"
            trace_file: azure.csv
            from: 10
            to: 30
            allow_reading_further: true
            seed: 123
            max_proc_count: 256
            batch_size: 5
            invocation_log:
              trigger: http
              min_invocations: 50
              min_minute: 60
              max_minute: 120
              required_jobs: 2000
            calibrator:
              generations: 3
            summary:
              format: PrettyTable
              output_file: summary.txt
            "#,
        )
        .unwrap();
        let window = config.window();
        assert_eq!((10, 30, true), (window.from, window.to, window.allow_reading_further));
        assert_eq!(Some("http".to_string()), config.invocation_log.trigger);
        assert_eq!(60, config.invocation_log.min_minute);
        assert_eq!(0., config.invocation_log.min_execution_time);
        assert_eq!(Some(2000), config.invocation_log.required_jobs);
        assert_eq!(3, config.calibrator.generations);
        assert_eq!(0.7, config.calibrator.crossover_rate);
        assert_eq!(OutputFormat::PrettyTable, config.summary.unwrap().format);
    }

    #[test]
    fn test_broken_config() {
        assert!(TraceHelpersConfig::from_str("from: 0").is_err());
    }
}
