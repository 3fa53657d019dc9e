//! Operation registry and dispatch.
//!
//! 1. **Providers** (`provider`, `local`): catalog contributors; the local
//!    provider holds implementations registered by the host
//! 2. **Facade** (`aggregator`): cross-provider discovery and execution
//! 3. **Middleware** (`middleware`, `dispatch`): Tower layers for inbound
//!    remote executions
//! 4. **Background workers** (`worker`): periodic provider synchronization

pub mod aggregator;
pub mod config;
pub mod dispatch;
pub mod local;
pub mod middleware;
pub mod operation;
pub mod ping;
pub mod provider;
pub mod worker;

pub use aggregator::OperationApi;
pub use config::{FederationConfig, LocalConfig, SopConfig};
pub use dispatch::DispatchService;
pub use local::{LocalOperationsProvider, Registration, TagsProperty};
pub use operation::{CallerOrigin, ExecuteCall, OperationError};
pub use ping::PingOperation;
pub use provider::OperationsProvider;
pub use worker::{BackgroundRunnable, BackgroundWorker, SyncRequest, SyncRunnable};
