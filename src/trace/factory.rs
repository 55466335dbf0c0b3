//! Creates trace producers for trace files, selected by the file extension.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::info;

use crate::core::job::{default_job_factory, JobFactory};
use crate::trace::calibrator::genetic::GeneticParameters;
use crate::trace::error::TraceError;
use crate::trace::file::codec::LineCodec;
use crate::trace::file::grid_workload::GridWorkloadCodec;
use crate::trace::file::invocation_log::{InvocationLogCodec, InvocationLogOptions};
use crate::trace::file::reader::{TraceSource, WindowedTraceReader};
use crate::trace::file::standard_workload::StandardWorkloadCodec;
use crate::trace::file::vm_history::VmHistoryCodec;
use crate::trace::interface::{TraceProducer, TraceWindow};
use crate::trace::random::generator::{
    GeneratorParameters, ResourceConstrainedRandomGenerator, DEFAULT_SEED,
};
use crate::trace::random::repetitive::{RepetitiveParameters, RepetitiveRandomGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    GridWorkload,
    StandardWorkload,
    VmHistory,
    InvocationLog,
    RandomGenerator,
    RepetitiveGenerator,
}

lazy_static! {
    pub static ref TRACE_FORMAT_REGISTRY: HashMap<&'static str, TraceFormat> = {
        HashMap::from([
            ("gwf", TraceFormat::GridWorkload),
            ("swf", TraceFormat::StandardWorkload),
            ("one2", TraceFormat::VmHistory),
            ("csv", TraceFormat::InvocationLog),
            ("srtg", TraceFormat::RandomGenerator),
            ("rrtg", TraceFormat::RepetitiveGenerator),
        ])
    };
}

/// Everything besides the path a producer may need.
#[derive(Clone)]
pub struct ProducerSettings {
    pub window: TraceWindow,
    pub seed: u64,
    /// Capacity of the infrastructure random traces are generated for.
    pub max_proc_count: Option<i64>,
    pub invocation_log: InvocationLogOptions,
    pub calibrator: GeneticParameters,
    pub factory: JobFactory,
}

impl ProducerSettings {
    pub fn new(window: TraceWindow) -> Self {
        Self {
            window,
            seed: DEFAULT_SEED,
            max_proc_count: None,
            invocation_log: Default::default(),
            calibrator: Default::default(),
            factory: default_job_factory(),
        }
    }
}

pub fn trace_format(path: &Path) -> Result<TraceFormat, TraceError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    TRACE_FORMAT_REGISTRY
        .get(extension.as_str())
        .copied()
        .ok_or_else(|| {
            TraceError::Configuration(format!("unknown trace file extension of {:?}", path))
        })
}

fn file_reader(path: &Path, settings: &ProducerSettings, codec: LineCodec) -> WindowedTraceReader {
    WindowedTraceReader::new(
        TraceSource::File(PathBuf::from(path)),
        settings.window,
        codec,
        settings.factory.clone(),
    )
}

pub fn producer_from_file(
    path: &Path,
    settings: &ProducerSettings,
) -> Result<Box<dyn TraceProducer>, TraceError> {
    let format = trace_format(path)?;
    info!("Creating {:?} trace producer for {:?}", format, path);
    Ok(match format {
        TraceFormat::GridWorkload => Box::new(file_reader(
            path,
            settings,
            LineCodec::GridWorkload(GridWorkloadCodec::new()),
        )),
        TraceFormat::StandardWorkload => Box::new(file_reader(
            path,
            settings,
            LineCodec::StandardWorkload(StandardWorkloadCodec::new()),
        )),
        TraceFormat::VmHistory => Box::new(file_reader(
            path,
            settings,
            LineCodec::VmHistory(VmHistoryCodec::new()),
        )),
        TraceFormat::InvocationLog => {
            let codec = InvocationLogCodec::new(
                settings.invocation_log.clone(),
                settings.calibrator.clone(),
                settings.seed,
            )
            .map_err(|e| TraceError::Configuration(e.to_string()))?;
            Box::new(file_reader(path, settings, LineCodec::InvocationLog(codec)))
        }
        TraceFormat::RandomGenerator => {
            let capacity = settings.max_proc_count.ok_or_else(|| {
                TraceError::Configuration(
                    "random trace generators need the max proc count of the system".to_string(),
                )
            })?;
            Box::new(ResourceConstrainedRandomGenerator::new(
                GeneratorParameters::from_file(path)?,
                capacity,
                settings.window,
                settings.factory.clone(),
                settings.seed,
            )?)
        }
        TraceFormat::RepetitiveGenerator => Box::new(RepetitiveRandomGenerator::new(
            RepetitiveParameters::from_file(path)?,
            settings.window,
            settings.factory.clone(),
            settings.seed,
        )?),
    })
}
