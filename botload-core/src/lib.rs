#![forbid(unsafe_code)]

mod definition;
mod error;
mod report;
mod transport;

pub mod runner;

pub use definition::{Defaults, THREAD_COUNT_LIMIT, TestDefinition, TestRequest};
pub use error::{Error, Result};
pub use report::{FailureKind, FailureRecord, TestReport, TestStatus, WorkerSummary};
pub use transport::{HttpTransport, Transport};

pub use botload_http::{HttpRequest, HttpResponse};
