use std::fmt::Write as _;

use botload_core::{FailureRecord, TestReport};

use super::format::{format_ms, format_rate};

// Failures listed individually before the rest are summarized as a count.
const MAX_LISTED_FAILURES: usize = 10;

pub(crate) fn render(report: &TestReport) -> String {
    let mut out = String::new();

    writeln!(&mut out, "summary").ok();
    writeln!(&mut out, "  status: {}", report.status).ok();
    if let Some(error) = &report.error {
        writeln!(&mut out, "  error: {error}").ok();
    }
    if report.timed_out {
        out.push_str("  stopped early: execution time ceiling reached\n");
    }
    writeln!(
        &mut out,
        "  requests: {} of {} (ok {}, failed {})",
        report.attempted_requests,
        report.total_requests,
        report.successful_requests,
        report.failed_requests
    )
    .ok();
    writeln!(
        &mut out,
        "  duration: {} rps={} success={:.1}%",
        format_ms(report.duration_ms as f64),
        format_rate(report.requests_per_second),
        report.success_rate
    )
    .ok();

    if report.attempted_requests > 0 {
        writeln!(
            &mut out,
            "  latency = p50={} p90={} p99={} mean={} min={} max={}",
            format_ms(report.p50_response_time_ms),
            format_ms(report.p90_response_time_ms),
            format_ms(report.p99_response_time_ms),
            format_ms(report.average_response_time_ms),
            format_ms(report.min_response_time_ms),
            format_ms(report.max_response_time_ms),
        )
        .ok();
    } else {
        out.push_str("  latency: n/a\n");
    }

    if !report.worker_statistics.is_empty() {
        out.push_str("\nworkers\n");
        for w in &report.worker_statistics {
            writeln!(
                &mut out,
                "  {}: ok {} failed {} mean={} took={}",
                w.name,
                w.successful_requests,
                w.failed_requests,
                format_ms(w.average_response_time_ms),
                format_ms(w.execution_time_ms as f64),
            )
            .ok();
        }
    }

    if !report.failures.is_empty() {
        out.push_str("\nfailures\n");
        let mut failures: Vec<&FailureRecord> = report.failures.iter().collect();
        failures.sort_by_key(|f| f.timestamp);

        for f in failures.iter().take(MAX_LISTED_FAILURES) {
            let status = f
                .status_code
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            writeln!(
                &mut out,
                "  worker-{} #{} {} status={} {}",
                f.worker_id,
                f.sequence,
                f.kind,
                status,
                f.message.trim()
            )
            .ok();
        }
        if failures.len() > MAX_LISTED_FAILURES {
            writeln!(
                &mut out,
                "  ... and {} more",
                failures.len() - MAX_LISTED_FAILURES
            )
            .ok();
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use botload_core::{FailureKind, TestDefinition, TestStatus, WorkerSummary};
    use std::time::Duration;

    fn report() -> TestReport {
        TestReport {
            id: "run-1".to_string(),
            status: TestStatus::Completed,
            start_time: chrono::Utc::now(),
            end_time: None,
            duration_ms: 2_000,
            configuration: TestDefinition {
                chat_id: "1".to_string(),
                message_text: "m".to_string(),
                thread_count: 1,
                requests_per_worker: 20,
                delay: Duration::ZERO,
                base_url: "http://127.0.0.1:9/bot".to_string(),
                api_method: "sendMessage".to_string(),
            },
            total_requests: 20,
            attempted_requests: 20,
            successful_requests: 8,
            failed_requests: 12,
            total_response_time_ms: 200.0,
            average_response_time_ms: 10.0,
            min_response_time_ms: 5.0,
            max_response_time_ms: 20.0,
            p50_response_time_ms: 9.0,
            p90_response_time_ms: 18.0,
            p99_response_time_ms: 20.0,
            requests_per_second: 10.0,
            success_rate: 40.0,
            timed_out: false,
            error: None,
            worker_statistics: vec![WorkerSummary {
                worker_id: 0,
                name: "worker-0".to_string(),
                successful_requests: 8,
                failed_requests: 12,
                average_response_time_ms: 10.0,
                execution_time_ms: 2_000,
            }],
            failures: (1..=12)
                .map(|n| FailureRecord {
                    timestamp: chrono::Utc::now(),
                    worker_id: 0,
                    kind: FailureKind::HttpStatus,
                    message: "boom".to_string(),
                    status_code: Some(500),
                    sequence: n,
                })
                .collect(),
        }
    }

    #[test]
    fn summary_lists_counts_latency_and_workers() {
        let out = render(&report());
        assert!(out.contains("status: COMPLETED"), "{out}");
        assert!(out.contains("requests: 20 of 20 (ok 8, failed 12)"), "{out}");
        assert!(out.contains("success=40.0%"), "{out}");
        assert!(out.contains("mean=10.00ms"), "{out}");
        assert!(out.contains("worker-0: ok 8 failed 12"), "{out}");
    }

    #[test]
    fn long_failure_lists_are_truncated() {
        let out = render(&report());
        assert_eq!(out.matches("HTTP_STATUS status=500").count(), MAX_LISTED_FAILURES);
        assert!(out.contains("... and 2 more"), "{out}");
    }

    #[test]
    fn empty_runs_have_no_latency() {
        let mut r = report();
        r.attempted_requests = 0;
        r.failures.clear();
        r.worker_statistics.clear();
        r.status = TestStatus::Failed;
        r.error = Some("invalid target url".to_string());

        let out = render(&r);
        assert!(out.contains("latency: n/a"), "{out}");
        assert!(out.contains("error: invalid target url"), "{out}");
        assert!(!out.contains("failures"), "{out}");
    }
}
