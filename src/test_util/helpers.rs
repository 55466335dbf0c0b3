use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::TraceHelpersConfig;
use crate::trace::file::invocation_log::{BUCKETED_SCHEMA_COLUMNS, MINUTES_PER_DAY};

pub const GENERATOR_DEFINITION: &str = "sizeDist=0,0.1,0.8\nsizeDist=0.1,1,0.2\n\
    maxJobDuration=100\ndurDist=0.01,0.1,0.5\ndurDist=0.1,0.9,0.45\ndurDist=0.9,1,0.05\n\
    maxJobDistance=100\ngapDist=0,0.2,0.9\ngapDist=0.2,1,0.1";

pub const REPETITIVE_DEFINITION: &str = "parallel: 4\nmax_start_spread: 20\n\
    exec_min: 10\nexec_max: 100\nmin_gap: 5\nmax_gap: 50\n\
    min_node_procs: 1\nmax_node_procs: 4\nmax_total_procs: 8\n";

static TEMP_FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Writes `contents` into a fresh file of the system temp dir with the given extension.
pub fn write_temp_trace(extension: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("dslab_trace_helpers");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!(
        "trace_{}_{}.{}",
        std::process::id(),
        TEMP_FILE_COUNTER.fetch_add(1, Ordering::SeqCst),
        extension
    ));
    std::fs::write(&path, contents).unwrap();
    path
}

/// Jobs `0..jobs` submitted every 10 seconds, running for 10 seconds on one processor.
pub fn standard_workload_trace(jobs: usize) -> String {
    let mut trace = String::from("; Version: 2.2\n; Computer: test cluster\n; MaxProcs: 16\n");
    for i in 0..jobs {
        trace += &format!("{} {} 0 10 1 -1 -1 -1 -1 -1 1 1 1 1 1 -1 -1 -1\n", i, i * 10);
    }
    trace
}

/// Grid workload trace of a system with 64 processors.
pub fn grid_workload_trace(jobs: usize) -> String {
    let mut trace = String::from("# Grid workload\n# Processors: 64\n");
    for i in 0..jobs {
        trace += &format!("{} {} 5 20 2 -1 -1 -1 -1 -1 1 u{} g e -1 -1\n", i, i * 100, i % 3);
    }
    trace
}

pub fn bucketed_invocation_header() -> String {
    let mut columns = vec![
        "HashOwner".to_string(),
        "HashApp".to_string(),
        "HashFunction".to_string(),
        "Trigger".to_string(),
    ];
    columns.extend((1..=MINUTES_PER_DAY).map(|minute| minute.to_string()));
    columns.extend(
        ["Average", "Count", "Minimum", "Maximum"]
            .iter()
            .map(|c| c.to_string()),
    );
    for p in [0, 1, 25, 50, 75, 99, 100] {
        columns.push(format!("percentile_Average_{}", p));
    }
    columns.push("SampleCount".to_string());
    columns.push("AverageAllocatedMb".to_string());
    for p in [1, 5, 25, 50, 75, 95, 99, 100] {
        columns.push(format!("AverageAllocatedMb_pct{}", p));
    }
    assert_eq!(BUCKETED_SCHEMA_COLUMNS, columns.len());
    columns.join(",")
}

/// Row of a function invoked `count` times in each of the given minutes.
pub fn bucketed_invocation_row(
    function: &str,
    trigger: &str,
    invocations: &[(usize, u64)],
    execution: [f64; 7],
    memory: [f64; 8],
) -> String {
    let mut per_minute = vec![0u64; MINUTES_PER_DAY];
    for (minute, count) in invocations {
        per_minute[*minute] = *count;
    }
    let total: u64 = per_minute.iter().sum();
    let average = execution.iter().sum::<f64>() / execution.len() as f64;

    let mut columns = vec![
        "owner".to_string(),
        "app".to_string(),
        function.to_string(),
        trigger.to_string(),
    ];
    columns.extend(per_minute.iter().map(|count| count.to_string()));
    columns.push(average.to_string());
    columns.push(total.to_string());
    columns.push(execution[0].to_string());
    columns.push(execution[6].to_string());
    columns.extend(execution.iter().map(|v| v.to_string()));
    columns.push(total.to_string());
    columns.push((memory.iter().sum::<f64>() / memory.len() as f64).to_string());
    columns.extend(memory.iter().map(|v| v.to_string()));
    columns.join(",")
}

pub fn default_test_config(with_suffix: Option<&str>) -> TraceHelpersConfig {
    let mut default = r#"
    trace_file: trace.swf
    from: 0
    to: 100
    seed: 123
    "#
    .to_string();

    if let Some(suffix) = with_suffix {
        default.push_str(suffix);
    }

    TraceHelpersConfig::from_str(&default).unwrap()
}
