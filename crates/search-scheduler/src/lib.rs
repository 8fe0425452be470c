//! Lifecycle runner for the search indexer.
//!
//! Owns the single background task that drives
//! [`EventProcessor::perform_one_tick`](search_indexing::EventProcessor::perform_one_tick)
//! in a loop, with explicit start/stop semantics and graceful shutdown via
//! a `CancellationToken`.
//!
//! # Example
//!
//! ```ignore
//! use search_scheduler::{LifecycleRunner, RunnerConfig};
//!
//! let runner = LifecycleRunner::new(Arc::new(processor), RunnerConfig::from_settings(&settings.runner));
//! runner.start().await?;
//! // ...
//! runner.stop().await?;
//! ```

mod config;
mod error;
mod runner;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use runner::LifecycleRunner;
