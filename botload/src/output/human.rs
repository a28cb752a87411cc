mod format;
mod progress;
mod summary;

use botload_core::TestReport;

use format::{format_ms, format_rate};
use progress::HumanProgress;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: HumanProgress,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: HumanProgress::new(),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, report: &TestReport) {
        let def = &report.configuration;
        println!("target: {}/{}", def.base_url.trim_end_matches('/'), def.api_method);
        println!(
            "run: {} threads={} requests/thread={} delay={}",
            report.id,
            def.thread_count,
            def.requests_per_worker,
            format_ms(def.delay.as_secs_f64() * 1000.0),
        );
        println!();
    }

    fn progress(&self, report: &TestReport) {
        let message = format!(
            "{}/{} requests, failed {}, rps {}, avg {}",
            report.attempted_requests,
            report.total_requests,
            report.failed_requests,
            format_rate(report.requests_per_second),
            format_ms(report.average_response_time_ms),
        );
        self.progress.update(report.attempted_requests, report.total_requests, message);
    }

    fn print_summary(&self, report: &TestReport) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", summary::render(report));
        Ok(())
    }
}
