//! Partition Queue - Buffered batches for a single partition
//!
//! Batches are kept in arrival order and read front to back. The read position
//! lives in the head batch's iterator; a head batch that has nothing left is
//! evicted lazily on the next read, together with any empty batches behind it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec;

/// Thread-safe queue of record batches for one partition.
///
/// Producers append with [`PartitionQueue::add`] while the consumer reads with
/// [`PartitionQueue::next`]. All access to the batch sequence goes through one
/// mutex, so concurrent producers on the same partition can't interleave a
/// batch and a flush can't be observed half done.
pub struct PartitionQueue<T> {
    batches: Mutex<VecDeque<vec::IntoIter<T>>>,
    paused: AtomicBool,
}

impl<T> Default for PartitionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PartitionQueue<T> {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(VecDeque::new()),
            paused: AtomicBool::new(false),
        }
    }

    /// Append a batch behind everything already buffered. Empty batches are accepted.
    pub fn add(&self, batch: Vec<T>) {
        self.lock().push_back(batch.into_iter());
    }

    /// Stop handing out records. Buffered and newly added records are kept.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Discard every undelivered record, returning how many were dropped.
    ///
    /// The pause flag is left untouched.
    pub fn flush(&self) -> usize {
        let mut batches = self.lock();
        let discarded = batches.iter().map(ExactSizeIterator::len).sum();
        batches.clear();
        discarded
    }

    /// Returns the next buffered record, or `None` if the queue is paused or has
    /// nothing left.
    pub fn next(&self) -> Option<T> {
        if self.is_paused() {
            return None;
        }

        let mut batches = self.lock();
        while let Some(head) = batches.front_mut() {
            if let Some(record) = head.next() {
                return Some(record);
            }
            batches.pop_front();
        }
        None
    }

    /// Number of records added but not yet returned
    pub fn pending(&self) -> usize {
        self.lock().iter().map(ExactSizeIterator::len).sum()
    }

    /// Number of batches still held, including exhausted ones not yet evicted
    pub fn batch_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<vec::IntoIter<T>>> {
        // Every mutation leaves the deque consistent, so a poisoned lock is safe to reuse
        self.batches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for PartitionQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let batches = self.lock();
        f.debug_struct("PartitionQueue")
            .field("paused", &self.is_paused())
            .field("batches", &batches.len())
            .field(
                "pending",
                &batches.iter().map(ExactSizeIterator::len).sum::<usize>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_next_on_empty_queue() {
        let queue: PartitionQueue<i32> = PartitionQueue::new();
        assert_eq!(queue.next(), None);
        assert_eq!(queue.next(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_batches_delivered_in_order() {
        let queue = PartitionQueue::new();

        queue.add(vec![1]);
        assert_eq!(queue.next(), Some(1));
        assert_eq!(queue.next(), None);

        queue.add(vec![2]);
        queue.add(vec![3]);
        assert_eq!(queue.next(), Some(2));
        assert_eq!(queue.next(), Some(3));
        assert_eq!(queue.next(), None);

        queue.add(vec![4, 5]);
        assert_eq!(queue.next(), Some(4));
        assert_eq!(queue.next(), Some(5));
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn test_pause_resume_and_flush() {
        let queue = PartitionQueue::new();
        queue.add(vec![7, 8]);
        queue.add(vec![9, 10]);

        assert_eq!(queue.next(), Some(7));
        assert_eq!(queue.next(), Some(8));

        queue.pause();
        assert!(queue.is_paused());
        assert_eq!(queue.next(), None);

        queue.resume();
        assert_eq!(queue.next(), Some(9));

        assert_eq!(queue.flush(), 1);
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn test_empty_batches_are_skipped() {
        let queue = PartitionQueue::new();
        queue.add(vec![]);
        queue.add(vec![1]);
        queue.add(vec![]);
        queue.add(vec![]);
        queue.add(vec![2, 3]);

        assert_eq!(queue.batch_count(), 5);
        assert_eq!(queue.pending(), 3);

        assert_eq!(queue.next(), Some(1));
        assert_eq!(queue.next(), Some(2));
        assert_eq!(queue.next(), Some(3));
        assert_eq!(queue.next(), None);
        assert_eq!(queue.batch_count(), 0);
    }

    #[test]
    fn test_exhausted_head_evicted_lazily() {
        let queue = PartitionQueue::new();
        queue.add(vec![1]);
        assert_eq!(queue.next(), Some(1));

        // Still held until the next read notices it is exhausted
        assert_eq!(queue.batch_count(), 1);
        assert_eq!(queue.pending(), 0);

        queue.add(vec![2]);
        assert_eq!(queue.next(), Some(2));
        assert_eq!(queue.batch_count(), 1);
    }

    #[test]
    fn test_pause_does_not_prevent_add() {
        let queue = PartitionQueue::new();
        queue.pause();
        queue.add(vec![1, 2]);
        assert_eq!(queue.next(), None);
        assert_eq!(queue.pending(), 2);

        queue.resume();
        assert_eq!(queue.next(), Some(1));
        assert_eq!(queue.next(), Some(2));
    }

    #[test]
    fn test_pause_and_resume_are_idempotent() {
        let queue = PartitionQueue::new();
        queue.add(vec![1]);

        queue.pause();
        queue.pause();
        assert_eq!(queue.next(), None);

        queue.resume();
        queue.resume();
        assert_eq!(queue.next(), Some(1));
    }

    #[test]
    fn test_flush_is_idempotent() {
        let queue = PartitionQueue::new();
        queue.add(vec![1, 2, 3]);
        assert_eq!(queue.next(), Some(1));

        assert_eq!(queue.flush(), 2);
        assert_eq!(queue.flush(), 0);
        assert!(queue.is_empty());
        assert_eq!(queue.batch_count(), 0);
    }

    #[test]
    fn test_flush_keeps_pause_state() {
        let queue = PartitionQueue::new();
        queue.add(vec![1]);
        queue.pause();
        queue.flush();
        queue.add(vec![2]);

        assert_eq!(queue.next(), None);
        queue.resume();
        assert_eq!(queue.next(), Some(2));
    }

    #[test]
    fn test_add_after_flush_starts_fresh() {
        let queue = PartitionQueue::new();
        queue.add(vec![20, 21, 22]);
        assert_eq!(queue.next(), Some(20));

        queue.flush();
        queue.add(vec![23, 24]);

        assert_eq!(queue.next(), Some(23));
        assert_eq!(queue.next(), Some(24));
        assert_eq!(queue.next(), None);
    }

    #[test]
    fn test_concurrent_producers_same_queue() {
        let queue = Arc::new(PartitionQueue::new());
        let producers = 4;
        let batches_per_producer = 50;

        let handles: Vec<_> = (0..producers)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for batch in 0..batches_per_producer {
                        queue.add(vec![(producer, batch * 2), (producer, batch * 2 + 1)]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let mut last_seen = vec![None; producers];
        let mut delivered = 0;
        while let Some((producer, sequence)) = queue.next() {
            // Batches from one producer arrive in the order it added them
            if let Some(previous) = last_seen[producer] {
                assert_eq!(sequence, previous + 1);
            } else {
                assert_eq!(sequence, 0);
            }
            last_seen[producer] = Some(sequence);
            delivered += 1;
        }

        assert_eq!(delivered, producers * batches_per_producer * 2);
    }

    #[test]
    fn test_concurrent_add_and_next() {
        let queue = Arc::new(PartitionQueue::new());
        let total = 10_000;

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for chunk in (0..total).collect::<Vec<_>>().chunks(7) {
                    queue.add(chunk.to_vec());
                }
            })
        };

        let mut expected = 0;
        while expected < total {
            if let Some(record) = queue.next() {
                assert_eq!(record, expected);
                expected += 1;
            } else {
                thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert_eq!(queue.next(), None);
    }
}
