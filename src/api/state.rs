use std::sync::Arc;

use crate::backend::{MediaBackend, StreamingService};
use crate::capabilities::CapabilitySnapshot;
use crate::config::Config;
use crate::jobs::{ExecutorSettings, JobBroker, JobExecutor, JobRegistry};
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<JobRegistry>,
    pub executor: JobExecutor,
    pub broker: Arc<JobBroker>,
    pub capabilities: Arc<CapabilitySnapshot>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Wire the job pipeline around the given backends and start its workers.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        config: Config,
        capabilities: CapabilitySnapshot,
        backend: Arc<dyn MediaBackend>,
        streaming: Arc<dyn StreamingService>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let capabilities = Arc::new(capabilities);
        let metrics = Arc::new(Metrics::new());

        let executor = JobExecutor::new(
            Arc::clone(&registry),
            backend,
            streaming,
            Arc::clone(&capabilities),
            ExecutorSettings::from_config(&config),
            Arc::clone(&metrics),
        );
        let broker = JobBroker::start(executor.clone(), &config.jobs, Arc::clone(&metrics));

        Self {
            config: Arc::new(config),
            registry,
            executor,
            broker: Arc::new(broker),
            capabilities,
            metrics,
        }
    }
}
