//! Partition Buffer - Multiplexes per-partition record streams onto one consumer
//!
//! Producers hand over batches tagged with a partition; a single consumer
//! thread takes records back out one at a time with [`PartitionBuffer::next`].
//! The consumer stays on a partition while it has records and only rotates to
//! the following partition once the current one is paused or drained, so a
//! partition with a long run of records is emptied before the buffer moves on.
//!
//! Partitions are registered on their first batch and never forgotten. A flush
//! empties a partition's queue but keeps it registered.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::cursor::{Pass, RoundRobinCursor, Step};
use crate::error::BufferError;
use crate::metrics_consts::{
    BUFFER_BATCHES_ADDED, BUFFER_EMPTY_PASSES, BUFFER_PARTITIONS, BUFFER_RECORDS_ADDED,
    BUFFER_RECORDS_FLUSHED,
};
use crate::partition_queue::PartitionQueue;

/// A partition's queue plus the order in which the partition was first seen
struct PartitionSlot<T> {
    order: u64,
    queue: Arc<PartitionQueue<T>>,
}

/// Thread-safe buffer of records, each belonging to one of a set of partitions.
///
/// Any thread may call [`add`](Self::add) and the control operations
/// ([`pause`](Self::pause), [`resume`](Self::resume), [`flush`](Self::flush)).
/// [`next`](Self::next) is meant to be called from one consumer thread.
pub struct PartitionBuffer<K, T> {
    queues: DashMap<K, PartitionSlot<T>>,
    next_order: AtomicU64,
    cursor: Mutex<RoundRobinCursor<K>>,
}

impl<K, T> Default for PartitionBuffer<K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> PartitionBuffer<K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            next_order: AtomicU64::new(0),
            cursor: Mutex::new(RoundRobinCursor::new()),
        }
    }

    /// Buffer a batch of records for a partition, registering the partition if
    /// this is its first batch.
    pub fn add(&self, partition: K, batch: Vec<T>) {
        let records = batch.len();
        let queue = self.queue_or_insert(partition);
        queue.add(batch);

        metrics::counter!(BUFFER_BATCHES_ADDED).increment(1);
        metrics::counter!(BUFFER_RECORDS_ADDED).increment(records as u64);
    }

    /// Stop handing out records for a partition until it is resumed
    pub fn pause(&self, partition: &K) -> Result<(), BufferError> {
        self.queue(partition)?.pause();
        Ok(())
    }

    pub fn resume(&self, partition: &K) -> Result<(), BufferError> {
        self.queue(partition)?.resume();
        Ok(())
    }

    /// Discard the undelivered records of a partition, returning how many were dropped.
    ///
    /// Records added afterwards are delivered as a fresh stream.
    pub fn flush(&self, partition: &K) -> Result<usize, BufferError> {
        let discarded = self.queue(partition)?.flush();

        metrics::counter!(BUFFER_RECORDS_FLUSHED).increment(discarded as u64);
        info!(
            partition = ?partition,
            discarded = discarded,
            "Flushed partition queue"
        );

        Ok(discarded)
    }

    /// Pause every partition in `partitions`, in iteration order.
    ///
    /// Stops at the first unknown partition; the ones before it stay paused.
    pub fn pause_partitions<'a, I>(&self, partitions: I) -> Result<(), BufferError>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        for partition in partitions {
            self.pause(partition)?;
        }
        Ok(())
    }

    /// Resume every partition in `partitions`, in iteration order.
    ///
    /// Stops at the first unknown partition; the ones before it stay resumed.
    pub fn resume_partitions<'a, I>(&self, partitions: I) -> Result<(), BufferError>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        for partition in partitions {
            self.resume(partition)?;
        }
        Ok(())
    }

    /// Flush every partition in `partitions`, in iteration order, returning the
    /// total number of records discarded.
    ///
    /// Stops at the first unknown partition; the ones before it stay flushed.
    pub fn flush_partitions<'a, I>(&self, partitions: I) -> Result<usize, BufferError>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let mut discarded = 0;
        for partition in partitions {
            discarded += self.flush(partition)?;
        }
        Ok(discarded)
    }

    /// Get the next record, or `None` if no partition has one available right now.
    ///
    /// Starts at the partition the previous call returned from and keeps taking
    /// records from it until it is paused or drained, then rotates through the
    /// other partitions in first-seen order. Returns `None` after one full
    /// rotation without finding a record.
    pub fn next(&self) -> Option<T> {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

        let (mut partition, mut pass) = match cursor.current().cloned() {
            Some(current) => (current.clone(), Pass::resume(current)),
            None => match cursor.advance(|| self.snapshot_partitions()) {
                Step::Next(first) | Step::Wrapped(first) => (first.clone(), Pass::fresh(first)),
                Step::Empty => return None,
            },
        };

        loop {
            if let Some(record) = self.next_from(&partition) {
                return Some(record);
            }

            match pass.visit(cursor.advance(|| self.snapshot_partitions())) {
                Some(following) => partition = following,
                None => {
                    metrics::counter!(BUFFER_EMPTY_PASSES).increment(1);
                    return None;
                }
            }
        }
    }

    /// Number of partitions that have been added
    pub fn partition_count(&self) -> usize {
        self.queues.len()
    }

    /// Known partitions in the order they were first added
    pub fn partitions(&self) -> Vec<K> {
        self.snapshot_partitions()
    }

    pub fn has_partition(&self, partition: &K) -> bool {
        self.queues.contains_key(partition)
    }

    pub fn is_paused(&self, partition: &K) -> Result<bool, BufferError> {
        Ok(self.queue(partition)?.is_paused())
    }

    /// Number of undelivered records for a partition
    pub fn pending(&self, partition: &K) -> Result<usize, BufferError> {
        Ok(self.queue(partition)?.pending())
    }

    /// Number of undelivered records across all partitions, paused ones included
    pub fn pending_total(&self) -> usize {
        let queues: Vec<Arc<PartitionQueue<T>>> = self
            .queues
            .iter()
            .map(|entry| entry.value().queue.clone())
            .collect();
        queues.iter().map(|queue| queue.pending()).sum()
    }

    /// Look up a partition's queue, releasing the DashMap guard before returning.
    fn queue(&self, partition: &K) -> Result<Arc<PartitionQueue<T>>, BufferError> {
        self.queues
            .get(partition)
            .map(|slot| slot.queue.clone())
            .ok_or_else(|| BufferError::UnknownPartition(format!("{partition:?}")))
    }

    fn queue_or_insert(&self, partition: K) -> Arc<PartitionQueue<T>> {
        if let Some(slot) = self.queues.get(&partition) {
            return slot.queue.clone();
        }

        let mut created = false;
        let queue = self
            .queues
            .entry(partition.clone())
            .or_insert_with(|| {
                created = true;
                PartitionSlot {
                    order: self.next_order.fetch_add(1, Ordering::SeqCst),
                    queue: Arc::new(PartitionQueue::new()),
                }
            })
            .queue
            .clone();

        if created {
            debug!(partition = ?partition, "Created partition queue");
            metrics::gauge!(BUFFER_PARTITIONS).increment(1.0);
        }

        queue
    }

    /// Partitions ordered by first appearance. A partition whose queue has gone
    /// away between the snapshot and the read is simply found empty.
    fn snapshot_partitions(&self) -> Vec<K> {
        let mut slots: Vec<(u64, K)> = self
            .queues
            .iter()
            .map(|entry| (entry.value().order, entry.key().clone()))
            .collect();
        slots.sort_unstable_by_key(|(order, _)| *order);
        slots.into_iter().map(|(_, partition)| partition).collect()
    }

    fn next_from(&self, partition: &K) -> Option<T> {
        let queue = self.queues.get(partition).map(|slot| slot.queue.clone())?;
        queue.next()
    }
}

impl<K, T> Debug for PartitionBuffer<K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self
            .cursor
            .try_lock()
            .ok()
            .and_then(|cursor| cursor.current().cloned());
        f.debug_struct("PartitionBuffer")
            .field("partitions", &self.queues.len())
            .field("current", &current)
            .finish()
    }
}
