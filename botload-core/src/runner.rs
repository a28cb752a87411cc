mod aggregator;
mod coordinator;
mod failures;
mod registry;
mod target;
mod worker;

pub use aggregator::{AggregateSnapshot, Aggregator};
pub use coordinator::{Coordinator, RunSettings};
pub use failures::FailureLog;
pub use registry::Registry;
pub use target::Target;
pub use worker::{RequestOutcome, worker_name};
