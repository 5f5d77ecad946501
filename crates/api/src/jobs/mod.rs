//! Background job scheduler and job implementations.

mod pool_metrics;
mod retention;
mod scheduler;

pub use pool_metrics::PoolMetricsJob;
pub use retention::RetentionJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
