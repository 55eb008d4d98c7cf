//! # call-telemetry-app
//!
//! Application use cases for call telemetry: per-stream buffering, flush
//! scheduling, namespace initialization, writes and paginated queries.
//! This crate depends on `ports`, `domain`, and `shared`.

pub mod buffer;
pub mod namespace;
pub mod normalize;
pub mod query;
pub mod scheduler;
pub mod streams;
pub mod write;

pub use buffer::{AppendOutcome, BufferDeps, BufferSettings, FlushOutcome, StreamBuffer};
pub use namespace::NamespaceInitializer;
pub use normalize::normalize_series;
pub use query::{QueryDeps, QueryInput, query_telemetry};
pub use scheduler::{FlushErrorHook, FlushScheduler, LoggingFlushErrorHook};
pub use streams::StreamManager;
pub use write::{
    WriteBatch, WriteDeps, write_alerts, write_call_counts, write_cdrs, write_records,
    write_system_alerts,
};
