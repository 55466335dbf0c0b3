use clap::Parser;
use log::{info, warn};
use std::env;

use dslab_trace_helpers::config::TraceHelpersConfig;
use dslab_trace_helpers::core::analyser::submit_time_order;
use dslab_trace_helpers::core::job::Job;
use dslab_trace_helpers::metrics::collector::TraceMetricsCollector;
use dslab_trace_helpers::metrics::printer::{print_summary, print_summary_as_pretty_table};
use dslab_trace_helpers::trace::error::TraceError;
use dslab_trace_helpers::trace::interface::TraceProducer;

#[derive(Parser)]
struct Args {
    #[clap(short, long)]
    config_file: std::path::PathBuf,
    /// Overrides the trace file of the config.
    #[clap(short, long)]
    trace_file: Option<std::path::PathBuf>,
}

/// Pulls batches until the producer runs out of jobs. Producers allowed to read past the window
/// are stopped once they delivered as many jobs as the window holds.
fn read_in_batches(
    producer: &mut dyn TraceProducer,
    batch_size: usize,
    config: &TraceHelpersConfig,
) -> Result<Vec<Job>, TraceError> {
    let limit = config.window().len();
    let mut jobs = vec![];
    loop {
        match producer.get_jobs_sorted_by(batch_size, &submit_time_order) {
            Ok(batch) => jobs.extend(batch),
            Err(TraceError::Exhausted(_)) | Err(TraceError::WindowExhausted { .. }) => break,
            Err(e) => return Err(e),
        }
        if config.allow_reading_further && jobs.len() >= limit {
            break;
        }
    }
    Ok(jobs)
}

fn main() {
    // log level INFO by default
    let mut env_logger_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        env_logger_builder.filter_level(log::LevelFilter::Info);
    }
    env_logger_builder.init();

    let args = Args::parse();

    info!("Path to config file: {:?}", args.config_file);
    let mut config =
        TraceHelpersConfig::from_file(&args.config_file).expect("could not read config file");
    if let Some(trace_file) = args.trace_file {
        config.trace_file = trace_file;
    }
    info!("Path to trace file: {:?}", config.trace_file);

    let mut producer = config.producer().expect("could not create trace producer");
    let jobs = match config.batch_size {
        Some(batch_size) => read_in_batches(producer.as_mut(), batch_size, &config),
        None => producer.get_all_jobs_sorted_by(&submit_time_order),
    }
    .expect("could not read trace");
    info!("Trace producer delivered {} jobs", jobs.len());
    if jobs.is_empty() {
        warn!("No jobs in window [{}, {})", config.from, config.to);
    }

    let collector = TraceMetricsCollector::collect(&jobs, producer.max_proc_count());
    match &config.summary {
        Some(summary) => print_summary(&collector, summary).expect("could not write summary"),
        None => print_summary_as_pretty_table(&collector, &mut std::io::stdout())
            .expect("could not print summary"),
    }
}
