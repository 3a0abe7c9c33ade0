//! Distribution domain: formats job postings, publishes them to each
//! destination once, and records every attempt in the delivery ledger.

pub mod coordinator;
pub mod cycle;
pub mod destination;
pub mod formatter;
pub mod models;
pub mod retry;

pub use coordinator::{CoordinatorError, CycleCoordinator, SchedulerStatus};
pub use cycle::{
    CycleRunner, CycleSettings, CycleState, CycleStatus, CycleSummary, CycleTrigger,
    DestinationOutcome, JobOutcome, PairStatus, PublishJobError,
};
pub use destination::Destination;
pub use formatter::MessageFormatter;
pub use retry::{publish_with_retry, RetryPolicy};
