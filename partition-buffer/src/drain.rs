//! Buffer Drain - The single consumer of a [`PartitionBuffer`]
//!
//! Polls [`PartitionBuffer::next`] in a loop and hands every record to a
//! handler. When the buffer has nothing to give, the loop sleeps for a backoff
//! that doubles on each consecutive empty poll, up to a ceiling, and resets as
//! soon as a record shows up.

use std::fmt::Debug;
use std::hash::Hash;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::buffer::PartitionBuffer;
use crate::config::DrainConfig;
use crate::metrics_consts::{DRAIN_IDLE_POLLS, DRAIN_RECORDS};

/// Counters reported by a finished drain loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub records: u64,
    pub idle_polls: u64,
}

/// Asks a running [`BufferDrain`] to stop once the buffer has nothing left to give.
#[derive(Debug, Clone, Default)]
pub struct DrainShutdown {
    requested: Arc<AtomicBool>,
}

impl DrainShutdown {
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

pub struct BufferDrain<K, T> {
    buffer: Arc<PartitionBuffer<K, T>>,
    idle_backoff: Duration,
    max_idle_backoff: Duration,
    shutdown: DrainShutdown,
}

impl<K, T> BufferDrain<K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new(buffer: Arc<PartitionBuffer<K, T>>, config: &DrainConfig) -> Self {
        let idle_backoff = config.idle_backoff.0;
        let mut max_idle_backoff = config.max_idle_backoff.0;
        if max_idle_backoff < idle_backoff {
            warn!(
                idle_backoff_ms = idle_backoff.as_millis() as u64,
                max_idle_backoff_ms = max_idle_backoff.as_millis() as u64,
                "Max idle backoff is below the initial backoff, using the initial backoff"
            );
            max_idle_backoff = idle_backoff;
        }

        Self {
            buffer,
            idle_backoff,
            max_idle_backoff,
            shutdown: DrainShutdown::default(),
        }
    }

    pub fn shutdown_handle(&self) -> DrainShutdown {
        self.shutdown.clone()
    }

    /// Run the loop on the calling thread until shutdown is requested and the
    /// buffer comes up empty, or until the handler fails.
    ///
    /// Records of paused partitions are not waited for: they stay in the buffer.
    pub fn run<F, E>(self, mut handler: F) -> Result<DrainStats, E>
    where
        F: FnMut(T) -> Result<(), E>,
    {
        info!(
            partitions = self.buffer.partition_count(),
            "Starting partition buffer drain"
        );

        let mut stats = DrainStats::default();
        let mut backoff = self.idle_backoff;

        loop {
            match self.buffer.next() {
                Some(record) => {
                    handler(record)?;
                    stats.records += 1;
                    metrics::counter!(DRAIN_RECORDS).increment(1);
                    backoff = self.idle_backoff;
                }
                None => {
                    if self.shutdown.is_requested() {
                        break;
                    }
                    stats.idle_polls += 1;
                    metrics::counter!(DRAIN_IDLE_POLLS).increment(1);
                    thread::sleep(backoff);
                    backoff = (backoff * 2).min(self.max_idle_backoff);
                }
            }
        }

        info!(
            records = stats.records,
            idle_polls = stats.idle_polls,
            "Partition buffer drain stopped"
        );
        Ok(stats)
    }
}

impl<K, T> BufferDrain<K, T>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Run the loop on a dedicated thread
    pub fn spawn<F, E>(self, handler: F) -> io::Result<JoinHandle<Result<DrainStats, E>>>
    where
        F: FnMut(T) -> Result<(), E> + Send + 'static,
        E: Send + 'static,
    {
        thread::Builder::new()
            .name("partition-buffer-drain".to_string())
            .spawn(move || self.run(handler))
    }
}
