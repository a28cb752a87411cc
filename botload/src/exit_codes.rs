use botload_core::{TestReport, TestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run finished but at least one request failed.
    RequestsFailed = 10,

    /// The run was stopped before it finished (ctrl-c).
    Cancelled = 11,

    /// Invalid CLI/config/options (bad flags, invalid durations, invalid test definition, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, bind failures, a run that could not start).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_report(report: &TestReport) -> Self {
        match report.status {
            TestStatus::Cancelled => Self::Cancelled,
            TestStatus::Failed => Self::RuntimeError,
            TestStatus::Running | TestStatus::Completed if report.failed_requests > 0 => {
                Self::RequestsFailed
            }
            TestStatus::Running | TestStatus::Completed => Self::Success,
        }
    }
}
