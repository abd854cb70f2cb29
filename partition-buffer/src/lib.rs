//! Per-partition record buffering for streaming consumers.
//!
//! Producer threads hand batches of records to a [`PartitionBuffer`] tagged with
//! the partition they came from. One consumer thread takes records back out,
//! rotating across partitions, while any thread may pause, resume or flush a
//! single partition's stream. [`BufferDrain`] is a ready-made consumer loop.
//!
//! ## Error logging
//!
//! Control operations on a partition that was never added return
//! [`BufferError::UnknownPartition`]; it points at stale partition bookkeeping
//! in the caller and should be surfaced, not ignored. Log errors with
//! `error = ?e` so the source chain stays visible.

pub mod buffer;
pub mod config;
mod cursor;
pub mod drain;
pub mod error;
pub mod metrics_consts;
pub mod partition_queue;
pub mod serialization;
pub mod types;

// Re-export commonly used types for convenience
pub use buffer::PartitionBuffer;
pub use config::{DrainConfig, EnvMsDuration};
pub use drain::{BufferDrain, DrainShutdown, DrainStats};
pub use error::{BufferError, SerializationError};
pub use partition_queue::PartitionQueue;
pub use serialization::{JsonSerializer, RecordSerializer};
pub use types::Partition;
