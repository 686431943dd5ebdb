//! Job lifecycle: registry, execution, admission and retention

mod broker;
mod executor;
mod models;
mod registry;
mod retention;

#[cfg(test)]
pub(crate) mod testing;

pub use broker::JobBroker;
pub use executor::{
    Artifact, BLOCKED_HINT, ExecutorSettings, IMPERSONATION_HINT, JobExecutor, MediaDescription,
    ProgressReporter, STREAMING_TOOL_HINT, progress_percent,
};
pub use models::{JobRequest, JobState, JobStatus};
pub use registry::JobRegistry;
pub use retention::{spawn_sweeper, sweep_once};
