//! # search-batch
//!
//! Batch dispatcher for remote search jobs.
//!
//! search-batch reads a list of named queries, submits them to a search
//! service's REST API while keeping at most a configured number in flight,
//! polls each one until it finishes, and writes every job's results to its
//! own CSV file. A live progress table is redrawn each cycle and a progress
//! snapshot is persisted whenever a job reaches a terminal state.
//!
//! ## Design
//!
//! - **Bounded concurrency** - a FIFO pending queue feeds an active set that
//!   never exceeds the ceiling
//! - **Single owner** - one task drives the [`Dispatcher`]; no shared locks
//! - **Per-job failure isolation** - a rejected, failed or timed-out job never
//!   stops the batch
//! - **Event-driven** - consumers may subscribe to [`Event`]s
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use search_batch::{Config, Credentials, Dispatcher, RestSearchClient, load_jobs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.credentials = Credentials::from_env()?;
//!
//!     let jobs = load_jobs(&config.output.query_file)?;
//!     let client = RestSearchClient::new(&config.service, config.credentials.clone())?;
//!     let mut dispatcher = Dispatcher::new(config, Arc::new(client), jobs)?;
//!
//!     let mut events = dispatcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             tracing::info!(?event, "batch event");
//!         }
//!     });
//!
//!     let summary = dispatcher.run().await;
//!     println!("{} done, {} failed", summary.done, summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Bounded-concurrency dispatcher
pub mod dispatcher;
/// Error types
pub mod error;
/// CSV output for results and progress
pub mod export;
/// Job list loading
pub mod jobs;
/// Job registry
pub mod registry;
/// Progress table rendering
pub mod report;
/// Remote search service client
pub mod service;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, Credentials, DispatchConfig, OutputConfig, ServiceConfig, TimeWindowConfig};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result, ServiceError};
pub use jobs::load_jobs;
pub use registry::JobRegistry;
pub use report::{NoopReporter, ProgressReporter, TerminalReporter};
pub use service::{RestSearchClient, SearchService};
pub use types::{
    BatchSummary, Event, Job, JobSpec, ProgressRecord, ResultSet, SearchId, Status,
    StatusSnapshot,
};
