//! Event-driven indexing pipeline for the search indexer.
//!
//! This crate turns status events emitted by an external object store into
//! index mutations.
//!
//! ## Key Components
//!
//! - [`RetryPolicy`]: bounded fixed-backoff retry around every external call
//! - [`EventHandler`]: object store access (expand, load, reference resolution)
//! - [`StatusEventQueue`]: due parent events and their visited marking
//! - [`IndexingPipeline`]: load -> type rules -> sub-objects -> keywords -> index
//! - [`ResolutionCache`]: per-pass memo of resolved references and lookups
//! - [`EventProcessor`]: one tick over the queue, dispatching events by kind
//! - [`IndexingError`]: error taxonomy tagged retriable, fatal or permanent
//!
//! ## Architecture
//!
//! 1. A tick reads the due parent events of every registered storage code
//! 2. Each parent is expanded into sub-events by its storage handler
//! 3. Sub-events of unsupported types are skipped; the rest are dispatched
//! 4. New versions run the [`IndexingPipeline`], which recursively indexes
//!    unseen objects reached through references
//! 5. The parent is marked visited with the overall outcome
//!
//! ## Example
//!
//! ```ignore
//! use search_indexing::{EventProcessor, IndexingPipeline, PipelineConfig, StatusEventQueue};
//!
//! let pipeline = IndexingPipeline::new(handlers, index, types, PipelineConfig::default());
//! let processor = EventProcessor::new(Arc::new(pipeline), StatusEventQueue::new(events));
//! let summary = processor.perform_one_tick(&CancellationToken::new()).await?;
//! ```

pub mod cache;
pub mod error;
pub mod handler;
pub mod keywords;
pub mod memory;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod queue;
pub mod result;
pub mod retry;
pub mod storage;

pub use cache::{ResolutionCache, ResolvingLookup};
pub use error::{ErrorKind, Halt, IndexingError, TickError};
pub use handler::{EventHandler, EventList, HandlerRegistry, SubEventSource};
pub use keywords::{ExtractRequest, KeywordExtractor, ObjectLookupProvider, RuleKeywordExtractor};
pub use memory::{MemoryStatusEventStorage, MemoryTypeStorage};
pub use pipeline::{IndexingPipeline, PipelineConfig};
pub use processor::EventProcessor;
pub use queue::{clamp_limit, StatusEventQueue, StatusEventStorage, MAX_EVENT_LIMIT};
pub use result::TickSummary;
pub use retry::{Attempts, Outcome, RetryPolicy};
pub use storage::{IndexBatch, IndexingStorage, TypeStorage};
