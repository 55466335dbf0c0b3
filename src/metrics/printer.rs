use prettytable::{row, Table};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::PathBuf};

use crate::metrics::collector::{AttributeStats, TraceMetricsCollector};

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub enum OutputFormat {
    #[default]
    JSON,
    PrettyTable,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
pub struct SummaryPrinterConfig {
    pub format: OutputFormat,
    pub output_file: PathBuf,
}

pub fn print_summary(
    collector: &TraceMetricsCollector,
    config: &SummaryPrinterConfig,
) -> std::io::Result<()> {
    let mut output = File::create(&config.output_file)?;
    match config.format {
        OutputFormat::PrettyTable => print_summary_as_pretty_table(collector, &mut output),
        OutputFormat::JSON => print_summary_as_json(collector, &mut output),
    }
}

fn format_instant(instant: Option<i64>) -> String {
    instant.map_or("-".to_string(), |t| t.to_string())
}

pub fn print_summary_as_pretty_table<W: Write>(
    collector: &TraceMetricsCollector,
    output: &mut W,
) -> std::io::Result<()> {
    let mut aggregated_table = Table::new();
    aggregated_table.add_row(row!["Metric", "Value"]);
    aggregated_table.add_row(row!["Total jobs", collector.total_jobs]);
    aggregated_table.add_row(row!["Max proc count", collector.max_proc_count]);
    aggregated_table.add_row(row![
        "Peak processor demand",
        collector.peak_processor_demand
    ]);
    aggregated_table.add_row(row![
        "Earliest submission",
        format_instant(collector.earliest_submission)
    ]);
    aggregated_table.add_row(row![
        "Last termination",
        format_instant(collector.last_termination)
    ]);

    let mut stats_table = Table::new();
    stats_table.add_row(row!["Metric", "Samples", "Min", "Max", "Mean", "Variance"]);
    for (name, stats) in [
        ("Interarrival time", &collector.interarrival_time_stats),
        ("Queue time", &collector.queue_time_stats),
        ("Execution time", &collector.exec_time_stats),
        ("Processors", &collector.nprocs_stats),
        ("Memory", &collector.memory_stats),
    ] {
        stats_table.add_row(row![
            name,
            stats.samples(),
            stats.min(),
            stats.max(),
            stats.mean(),
            stats.population_variance()
        ]);
    }

    aggregated_table.print(output)?;
    stats_table.print(output)?;
    Ok(())
}

#[derive(Serialize)]
struct SummaryJSON {
    counters: Counters,
    stats: Stats,
}

#[derive(Serialize)]
struct Counters {
    total_jobs: u64,
    max_proc_count: i64,
    peak_processor_demand: u64,
    earliest_submission: Option<i64>,
    last_termination: Option<i64>,
}

#[derive(Serialize)]
struct Stats {
    interarrival_time: AttributeSummary,
    queue_time: AttributeSummary,
    exec_time: AttributeSummary,
    nprocs: AttributeSummary,
    memory: AttributeSummary,
}

#[derive(Serialize)]
struct AttributeSummary {
    samples: u64,
    min: f64,
    max: f64,
    mean: f64,
    variance: f64,
}

impl From<&AttributeStats> for AttributeSummary {
    fn from(stats: &AttributeStats) -> Self {
        Self {
            samples: stats.samples(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            variance: stats.population_variance(),
        }
    }
}

pub fn print_summary_as_json<W: Write>(
    collector: &TraceMetricsCollector,
    output: &mut W,
) -> std::io::Result<()> {
    let summary = SummaryJSON {
        counters: Counters {
            total_jobs: collector.total_jobs,
            max_proc_count: collector.max_proc_count,
            peak_processor_demand: collector.peak_processor_demand,
            earliest_submission: collector.earliest_submission,
            last_termination: collector.last_termination,
        },
        stats: Stats {
            interarrival_time: (&collector.interarrival_time_stats).into(),
            queue_time: (&collector.queue_time_stats).into(),
            exec_time: (&collector.exec_time_stats).into(),
            nprocs: (&collector.nprocs_stats).into(),
            memory: (&collector.memory_stats).into(),
        },
    };

    let serialized_json = serde_json::to_string_pretty(&summary)?;
    output.write_all(serialized_json.as_bytes())
}
