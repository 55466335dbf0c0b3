use dslab_trace_helpers::core::analyser::peak_processor_demand;
use dslab_trace_helpers::core::job::{Job, JobDescriptor};

fn job(id: &str, submit: i64, exec: i64, nprocs: i64) -> Job {
    Job::new(JobDescriptor::simple(id.to_string(), submit, 0, exec, nprocs))
}

#[test]
fn test_overlap_is_symmetric() {
    let jobs = vec![
        job("a", 0, 10, 1),
        job("b", 10, 10, 1),
        job("c", 5, 10, 1),
        job("d", 3, 0, 1),
        job("e", 0, 100, 1),
    ];
    for a in &jobs {
        for b in &jobs {
            assert_eq!(a.is_overlapping(b), b.is_overlapping(a), "{} and {}", a, b);
        }
    }
    assert!(!jobs[0].is_overlapping(&jobs[1]));
    assert!(jobs[0].is_overlapping(&jobs[2]));
}

#[test]
fn test_peak_demand_of_adjacent_jobs() {
    let jobs = vec![job("a", 0, 10, 3), job("b", 10, 10, 4), job("c", 15, 10, 2)];
    assert_eq!(6, peak_processor_demand(&jobs));
    assert_eq!(0, peak_processor_demand(&[]));
}
