use thiserror::Error;

/// Errors returned by control operations on a [`crate::PartitionBuffer`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The partition was never passed to `add`. Callers hold stale partition state.
    #[error("no buffered records were ever added for partition {0}")]
    UnknownPartition(String),
}

/// Errors that can occur while serializing an outbound record.
#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("failed to serialize record for topic {topic}")]
    Json {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
}
