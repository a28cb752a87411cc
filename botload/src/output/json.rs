use std::io::Write as _;

use botload_core::TestReport;
use serde::Serialize;

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _report: &TestReport) {}

    fn progress(&self, report: &TestReport) {
        emit_json_line(&build_progress_line(report));
    }

    fn print_summary(&self, report: &TestReport) -> anyhow::Result<()> {
        emit_json_line(&JsonSummaryLine {
            kind: "summary",
            report,
        });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonProgressLine<'a> {
    pub kind: &'static str,
    pub id: &'a str,
    pub elapsed_ms: u64,
    pub total_requests: u64,
    pub attempted_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub requests_per_second: f64,
    pub average_response_time_ms: f64,
    pub min_response_time_ms: f64,
    pub max_response_time_ms: f64,
}

/// The final report, tagged so it can be told apart from progress lines.
#[derive(Debug, Serialize)]
pub(crate) struct JsonSummaryLine<'a> {
    pub kind: &'static str,
    #[serde(flatten)]
    pub report: &'a TestReport,
}

fn build_progress_line(report: &TestReport) -> JsonProgressLine<'_> {
    JsonProgressLine {
        kind: "progress",
        id: &report.id,
        elapsed_ms: report.duration_ms,
        total_requests: report.total_requests,
        attempted_requests: report.attempted_requests,
        successful_requests: report.successful_requests,
        failed_requests: report.failed_requests,
        requests_per_second: report.requests_per_second,
        average_response_time_ms: report.average_response_time_ms,
        min_response_time_ms: report.min_response_time_ms,
        max_response_time_ms: report.max_response_time_ms,
    }
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
        let _ = out.flush();
    }
}
