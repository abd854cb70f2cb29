// ==== Partition buffer metrics ====
/// Counter for batches handed to the buffer by producers
pub const BUFFER_BATCHES_ADDED: &str = "partition_buffer_batches_added_total";

/// Counter for records handed to the buffer by producers
pub const BUFFER_RECORDS_ADDED: &str = "partition_buffer_records_added_total";

/// Counter for undelivered records discarded by a flush
pub const BUFFER_RECORDS_FLUSHED: &str = "partition_buffer_records_flushed_total";

/// Gauge for the number of partitions known to the buffer
pub const BUFFER_PARTITIONS: &str = "partition_buffer_partitions";

/// Counter for `next()` calls that scanned every partition without finding a record
pub const BUFFER_EMPTY_PASSES: &str = "partition_buffer_empty_passes_total";

// ==== Drain loop metrics ====
/// Counter for records handed to the drain handler
pub const DRAIN_RECORDS: &str = "partition_buffer_records_drained_total";

/// Counter for polls that found nothing and backed off
pub const DRAIN_IDLE_POLLS: &str = "partition_buffer_drain_idle_polls_total";
