//! Round-robin position over the partitions of a buffer.
//!
//! The cursor remembers the partition it is parked on and the partitions left
//! in the current snapshot of the key set. A partition that first shows up
//! after a snapshot was taken is picked up when the next snapshot is taken.
//! A [`Pass`] tracks one `next()` call's walk over the partitions so the
//! "went all the way around" condition is explicit.

use std::vec;

/// Outcome of moving the cursor to the following partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step<K> {
    /// Next partition of the current snapshot
    Next(K),
    /// First partition of a fresh snapshot, the previous one was used up
    Wrapped(K),
    /// A fresh snapshot had no partitions at all
    Empty,
}

#[derive(Debug)]
pub(crate) struct RoundRobinCursor<K> {
    current: Option<K>,
    remaining: vec::IntoIter<K>,
}

impl<K: Clone + PartialEq> RoundRobinCursor<K> {
    pub fn new() -> Self {
        Self {
            current: None,
            remaining: Vec::new().into_iter(),
        }
    }

    /// Partition the cursor is parked on, if any
    pub fn current(&self) -> Option<&K> {
        self.current.as_ref()
    }

    /// Move to the following partition, taking a new snapshot from `snapshot`
    /// once the current one is used up.
    ///
    /// Partitions that appear in the new snapshot after the one the cursor is
    /// parked on are visited before wrapping around to the head of the snapshot.
    pub fn advance<F>(&mut self, snapshot: F) -> Step<K>
    where
        F: FnOnce() -> Vec<K>,
    {
        if let Some(partition) = self.remaining.next() {
            self.current = Some(partition.clone());
            return Step::Next(partition);
        }

        let mut partitions = snapshot();
        let position = self
            .current
            .as_ref()
            .and_then(|current| partitions.iter().position(|p| p == current));
        if let Some(position) = position {
            let following = partitions.split_off(position + 1);
            if !following.is_empty() {
                self.remaining = following.into_iter();
                if let Some(partition) = self.remaining.next() {
                    self.current = Some(partition.clone());
                    return Step::Next(partition);
                }
            }
        }

        self.remaining = partitions.into_iter();
        match self.remaining.next() {
            Some(partition) => {
                self.current = Some(partition.clone());
                Step::Wrapped(partition)
            }
            None => {
                self.current = None;
                Step::Empty
            }
        }
    }
}

/// A single walk over the partitions, started at `initial`.
///
/// The walk ends when it comes back to `initial`. It also ends at the second
/// snapshot boundary it crosses, so a walk whose starting partition is no longer
/// in the key set still terminates.
#[derive(Debug)]
pub(crate) struct Pass<K> {
    initial: K,
    wrapped: bool,
}

impl<K: PartialEq> Pass<K> {
    /// Walk starting mid-snapshot, at the partition the cursor was parked on
    pub fn resume(initial: K) -> Self {
        Self {
            initial,
            wrapped: false,
        }
    }

    /// Walk starting at the head of a snapshot that was just taken
    pub fn fresh(initial: K) -> Self {
        Self {
            initial,
            wrapped: true,
        }
    }

    /// Feed the cursor's step, returning the partition to try next or `None`
    /// once the walk is complete.
    pub fn visit(&mut self, step: Step<K>) -> Option<K> {
        let partition = match step {
            Step::Next(partition) => partition,
            Step::Wrapped(partition) => {
                if self.wrapped {
                    return None;
                }
                self.wrapped = true;
                partition
            }
            Step::Empty => return None,
        };

        if partition == self.initial {
            None
        } else {
            Some(partition)
        }
    }
}
