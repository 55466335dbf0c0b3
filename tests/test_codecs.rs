use dslab_trace_helpers::core::job::{default_job_factory, Job};
use dslab_trace_helpers::test_util::helpers::{
    bucketed_invocation_header, bucketed_invocation_row,
};
use dslab_trace_helpers::trace::calibrator::genetic::GeneticParameters;
use dslab_trace_helpers::trace::file::codec::LineCodec;
use dslab_trace_helpers::trace::file::grid_workload::GridWorkloadCodec;
use dslab_trace_helpers::trace::file::invocation_log::{
    InvocationLogCodec, InvocationLogOptions, INVOCATION_EPOCH,
};
use dslab_trace_helpers::trace::file::reader::{TraceSource, WindowedTraceReader};
use dslab_trace_helpers::trace::file::vm_history::VmHistoryCodec;
use dslab_trace_helpers::trace::interface::{TraceProducer, TraceWindow};

const EXECUTION: [f64; 7] = [1., 2., 10., 50., 120., 600., 1000.];
const MEMORY: [f64; 8] = [100., 120., 140., 160., 180., 200., 250., 300.];

fn read_all(trace: String, window: TraceWindow, codec: LineCodec) -> Vec<Job> {
    WindowedTraceReader::new(TraceSource::Text(trace), window, codec, default_job_factory())
        .get_all_jobs()
        .unwrap()
}

fn invocation_codec(options: InvocationLogOptions) -> LineCodec {
    let genetic = GeneticParameters {
        population_size: 4,
        generations: 2,
        ..Default::default()
    };
    LineCodec::InvocationLog(InvocationLogCodec::new(options, genetic, 42).unwrap())
}

fn bucketed_log(rows: &[String]) -> String {
    let mut log = bucketed_invocation_header();
    for row in rows {
        log.push('\n');
        log.push_str(row);
    }
    log.push('\n');
    log
}

#[test]
fn test_grid_workload_timing() {
    let trace = "# Processors: 8\n1 100 5 20 2 -1 -1 -1 -1 -1 1 alice staff solver -1 -1\n";
    let jobs = read_all(
        trace.to_string(),
        TraceWindow::new(0, 1, false),
        LineCodec::GridWorkload(GridWorkloadCodec::new()),
    );
    let job = &jobs[0];
    assert_eq!(105, job.start_time());
    assert_eq!(125, job.stop_time());
    assert_eq!(115, job.mid_exec_time());
    assert_eq!(2, job.nprocs());
    assert_eq!("alice", job.user());
    assert_eq!("staff", job.group());
    assert_eq!("solver", job.executable());
}

#[test]
fn test_vm_history_ids_follow_trace_lines() {
    let trace = "0 0 0 0 0 0 0 1000 1500 0 0 1010\n\
        0 0 0 0 0 0 0 2000 0 0 0 0\n\
        0 0 0 0 0 0 0 3000 3500 0 0 3100\n";
    let jobs = read_all(
        trace.to_string(),
        TraceWindow::new(1, 3, false),
        LineCodec::VmHistory(VmHistoryCodec::new()),
    );
    // the VM of line 1 never left the queue
    assert_eq!(1, jobs.len());
    assert_eq!("2", jobs[0].id());
    assert_eq!(100, jobs[0].queue_time());
    assert_eq!(400, jobs[0].exec_time());
}

#[test]
fn test_bucketed_invocations_become_jobs() {
    let log = bucketed_log(&[bucketed_invocation_row(
        "resize",
        "http",
        &[(0, 3), (5, 2)],
        EXECUTION,
        MEMORY,
    )]);
    let jobs = read_all(
        log,
        TraceWindow::new(0, 1, false),
        invocation_codec(Default::default()),
    );
    assert_eq!(5, jobs.len());

    let ids: Vec<&str> = jobs.iter().map(|job| job.id()).collect();
    assert_eq!(vec!["0", "1", "2", "3", "4"], ids);
    for job in &jobs[..3] {
        assert!((INVOCATION_EPOCH..INVOCATION_EPOCH + 60).contains(&job.submit_time()));
    }
    for job in &jobs[3..] {
        let minute_start = INVOCATION_EPOCH + 5 * 60;
        assert!((minute_start..minute_start + 60).contains(&job.submit_time()));
    }
    for job in &jobs {
        assert_eq!(1, job.queue_time());
        assert!(job.exec_time() <= 1000);
        // samples are truncated, the lowest target may land just below 100
        assert!((99..=300).contains(&job.pp_mem()));
        assert!(job.nprocs() >= 1);
        assert_eq!("owner", job.user());
        assert_eq!("http", job.group());
        assert_eq!("resize", job.executable());
    }
}

#[test]
fn test_trigger_filter() {
    let log = bucketed_log(&[
        bucketed_invocation_row("a", "http", &[(0, 2)], EXECUTION, MEMORY),
        bucketed_invocation_row("b", "timer", &[(0, 3)], EXECUTION, MEMORY),
    ]);
    let options = InvocationLogOptions {
        trigger: Some("timer".to_string()),
        ..Default::default()
    };
    let jobs = read_all(log, TraceWindow::new(0, 2, false), invocation_codec(options));
    assert_eq!(3, jobs.len());
    assert!(jobs.iter().all(|job| job.executable() == "b"));
}

#[test]
fn test_min_invocations_filter() {
    let log = bucketed_log(&[
        bucketed_invocation_row("rare", "http", &[(0, 2)], EXECUTION, MEMORY),
        bucketed_invocation_row("busy", "http", &[(0, 3), (1, 2)], EXECUTION, MEMORY),
    ]);
    let options = InvocationLogOptions {
        min_invocations: 3,
        ..Default::default()
    };
    let jobs = read_all(log, TraceWindow::new(0, 2, false), invocation_codec(options));
    assert_eq!(5, jobs.len());
    assert!(jobs.iter().all(|job| job.executable() == "busy"));
}

#[test]
fn test_min_execution_time_filter() {
    // averages are about 254.7 and 442.9 seconds
    let slow = [100., 200., 300., 400., 500., 600., 1000.];
    let log = bucketed_log(&[
        bucketed_invocation_row("quick", "http", &[(0, 4)], EXECUTION, MEMORY),
        bucketed_invocation_row("slow", "http", &[(0, 2)], slow, MEMORY),
    ]);
    let options = InvocationLogOptions {
        min_execution_time: 300.,
        ..Default::default()
    };
    let jobs = read_all(log, TraceWindow::new(0, 2, false), invocation_codec(options));
    assert_eq!(2, jobs.len());
    assert!(jobs.iter().all(|job| job.executable() == "slow"));
}

fn minute_of(job: &Job) -> i64 {
    (job.submit_time() - INVOCATION_EPOCH) / 60
}

#[test]
fn test_rescaling_to_required_jobs() {
    let log = bucketed_log(&[
        bucketed_invocation_row("a", "http", &[(0, 30), (1, 10)], EXECUTION, MEMORY),
        bucketed_invocation_row("b", "http", &[(2, 60)], EXECUTION, MEMORY),
    ]);
    let options = InvocationLogOptions {
        required_jobs: Some(10),
        ..Default::default()
    };
    let jobs = read_all(log, TraceWindow::new(0, 2, false), invocation_codec(options));
    assert_eq!(10, jobs.len());
    let per_minute: Vec<usize> = (0..3)
        .map(|minute| jobs.iter().filter(|job| minute_of(job) == minute).count())
        .collect();
    assert_eq!(vec![3, 1, 6], per_minute);
}

#[test]
fn test_rescaling_up_within_window() {
    let log = bucketed_log(&[
        bucketed_invocation_row("a", "http", &[(0, 30)], EXECUTION, MEMORY),
        bucketed_invocation_row("b", "http", &[(0, 2), (3, 3)], EXECUTION, MEMORY),
    ]);
    let options = InvocationLogOptions {
        required_jobs: Some(20),
        ..Default::default()
    };
    let mut reader = WindowedTraceReader::new(
        TraceSource::Text(log),
        TraceWindow::new(1, 2, false),
        invocation_codec(options),
        default_job_factory(),
    );

    let mut jobs = vec![];
    while let Ok(batch) = reader.get_jobs(6) {
        assert!(batch.len() <= 6);
        jobs.extend(batch);
    }
    assert_eq!(20, jobs.len());
    assert!(jobs.iter().all(|job| job.executable() == "b"));
    assert_eq!(8, jobs.iter().filter(|job| minute_of(job) == 0).count());
    assert_eq!(12, jobs.iter().filter(|job| minute_of(job) == 3).count());
}

#[test]
fn test_minute_window() {
    let log = bucketed_log(&[bucketed_invocation_row(
        "a",
        "http",
        &[(0, 2), (5, 4), (7, 1)],
        EXECUTION,
        MEMORY,
    )]);
    let options = InvocationLogOptions {
        min_minute: 5,
        max_minute: 6,
        ..Default::default()
    };
    let jobs = read_all(log, TraceWindow::new(0, 1, false), invocation_codec(options));
    assert_eq!(4, jobs.len());
    let minute_start = INVOCATION_EPOCH + 5 * 60;
    assert!(jobs
        .iter()
        .all(|job| (minute_start..minute_start + 60).contains(&job.submit_time())));
}

#[test]
fn test_rows_without_memory_are_skipped() {
    let log = bucketed_log(&[
        bucketed_invocation_row("a", "http", &[(0, 2)], EXECUTION, [0.; 8]),
        bucketed_invocation_row("b", "http", &[(0, 1)], EXECUTION, MEMORY),
    ]);
    let jobs = read_all(
        log,
        TraceWindow::new(0, 2, false),
        invocation_codec(Default::default()),
    );
    assert_eq!(1, jobs.len());
    assert_eq!("b", jobs[0].executable());
}

#[test]
fn test_invocations_spill_over_batches() {
    let log = bucketed_log(&[
        bucketed_invocation_row("a", "http", &[(0, 3)], EXECUTION, MEMORY),
        bucketed_invocation_row("b", "http", &[(1, 2)], EXECUTION, MEMORY),
    ]);
    let mut reader = WindowedTraceReader::new(
        TraceSource::Text(log),
        TraceWindow::new(0, 2, false),
        invocation_codec(Default::default()),
        default_job_factory(),
    );

    let mut jobs = vec![];
    loop {
        match reader.get_jobs(2) {
            Ok(batch) => {
                assert!(batch.len() <= 2);
                jobs.extend(batch);
            }
            Err(_) => break,
        }
    }
    let ids: Vec<&str> = jobs.iter().map(|job| job.id()).collect();
    assert_eq!(vec!["0", "1", "2", "3", "4"], ids);
}

#[test]
fn test_flat_invocation_rows() {
    let header: Vec<String> = (0..23).map(|i| format!("column{}", i)).collect();
    let mut row = vec!["0".to_string(); 23];
    row[0] = "inv-1".to_string();
    row[2] = "[2]".to_string();
    row[4] = "thumbnail".to_string();
    row[13] = "5000".to_string();
    row[18] = "256".to_string();
    row[22] = "30".to_string();
    let log = format!("{}\n{}\n", header.join(","), row.join(","));

    let jobs = read_all(
        log,
        TraceWindow::new(0, 1, false),
        invocation_codec(Default::default()),
    );
    let job = &jobs[0];
    assert_eq!("inv-1", job.id());
    assert_eq!(5, job.submit_time());
    assert_eq!(30, job.exec_time());
    assert_eq!(2, job.nprocs());
    assert_eq!(256, job.pp_mem());
    assert_eq!("thumbnail", job.executable());
    assert_eq!(("U", "G"), (job.user(), job.group()));
}
