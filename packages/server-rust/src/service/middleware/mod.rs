//! Tower middleware layers for the inbound execution pipeline.
//!
//! - [`metrics`]: Execution timing and outcome via `tracing` spans
//! - [`load_shed`]: Semaphore-based concurrency limiting
//! - [`pipeline`]: Composes the layers into a single service stack

pub mod load_shed;
pub mod metrics;
pub mod pipeline;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_execute_pipeline, ExecutePipeline};
