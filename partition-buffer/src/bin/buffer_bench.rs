//! Load generator for the partition buffer.
//!
//! Producer threads push synthetic batches into a shared buffer while a
//! controller thread pauses and resumes random partitions, and the drain loop
//! checks that every partition's records come out in order.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use envconfig::Envconfig;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rand::Rng;
use tracing::{info, warn};

use partition_buffer::{BufferDrain, DrainConfig, EnvMsDuration, Partition, PartitionBuffer};

#[derive(Envconfig)]
struct BenchConfig {
    #[envconfig(from = "BENCH_TOPIC", default = "events")]
    topic: String,

    #[envconfig(from = "PARTITION_COUNT", default = "16")]
    partition_count: i32,

    #[envconfig(from = "PRODUCER_THREADS", default = "4")]
    producer_threads: usize,

    #[envconfig(from = "BATCHES_PER_PRODUCER", default = "2000")]
    batches_per_producer: usize,

    #[envconfig(from = "BATCH_SIZE", default = "100")]
    batch_size: usize,

    // 0 disables the pause/resume controller
    #[envconfig(from = "PAUSE_TOGGLE_INTERVAL", default = "5")]
    pause_toggle_interval: EnvMsDuration,

    #[envconfig(from = "PRINT_METRICS", default = "false")]
    print_metrics: bool,

    #[envconfig(nested = true)]
    drain: DrainConfig,
}

#[derive(Debug, Clone, Copy)]
struct BenchRecord {
    partition: i32,
    sequence: u64,
}

/// Installs a Prometheus recorder without an HTTP listener. The benchmark is a
/// one-shot process, so the handle is rendered once at exit instead of scraped.
fn setup_metrics_recorder() -> Result<PrometheusHandle> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets(EXPONENTIAL_SECONDS)?
        .install_recorder()?;
    Ok(handle)
}

/// Each partition is owned by exactly one producer so its sequence numbers are
/// known to be contiguous.
fn spawn_producers(
    config: &BenchConfig,
    buffer: &Arc<PartitionBuffer<Partition, BenchRecord>>,
) -> Result<Vec<thread::JoinHandle<()>>> {
    let owned: Vec<Vec<i32>> = (0..config.producer_threads)
        .map(|producer| {
            (0..config.partition_count)
                .filter(|partition| *partition as usize % config.producer_threads == producer)
                .collect()
        })
        .collect();

    let mut handles = Vec::with_capacity(owned.len());
    for (producer, partitions) in owned.into_iter().enumerate() {
        if partitions.is_empty() {
            continue;
        }
        let buffer = buffer.clone();
        let topic = config.topic.clone();
        let batches = config.batches_per_producer;
        let batch_size = config.batch_size as u64;

        let handle = thread::Builder::new()
            .name(format!("bench-producer-{producer}"))
            .spawn(move || {
                let mut sequences = vec![0u64; partitions.len()];
                for batch in 0..batches {
                    let slot = batch % partitions.len();
                    let partition = partitions[slot];
                    let start = sequences[slot];
                    let records = (start..start + batch_size)
                        .map(|sequence| BenchRecord {
                            partition,
                            sequence,
                        })
                        .collect();
                    sequences[slot] += batch_size;
                    buffer.add(Partition::new(topic.clone(), partition), records);
                }
            })
            .context("failed to spawn producer thread")?;
        handles.push(handle);
    }
    Ok(handles)
}

/// Randomly pauses and resumes known partitions until `running` is cleared
fn spawn_controller(
    interval: Duration,
    buffer: &Arc<PartitionBuffer<Partition, BenchRecord>>,
    running: &Arc<AtomicBool>,
) -> Result<thread::JoinHandle<u64>> {
    let buffer = buffer.clone();
    let running = running.clone();

    thread::Builder::new()
        .name("bench-controller".to_string())
        .spawn(move || {
            let mut rng = rand::thread_rng();
            let mut toggles = 0;
            while running.load(Ordering::SeqCst) {
                thread::sleep(interval);
                let partitions = buffer.partitions();
                if partitions.is_empty() {
                    continue;
                }
                let partition = &partitions[rng.gen_range(0..partitions.len())];
                let result = if rng.gen_bool(0.5) {
                    buffer.pause(partition)
                } else {
                    buffer.resume(partition)
                };
                if let Err(e) = result {
                    warn!(error = ?e, "Failed to toggle partition");
                }
                toggles += 1;
            }
            toggles
        })
        .context("failed to spawn controller thread")
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = BenchConfig::init_from_env()
        .context("Failed to load benchmark configuration from environment variables")?;
    if config.producer_threads == 0 || config.partition_count <= 0 {
        bail!("PRODUCER_THREADS and PARTITION_COUNT must be positive");
    }

    let metrics = setup_metrics_recorder().context("failed to install metrics recorder")?;

    let buffer: Arc<PartitionBuffer<Partition, BenchRecord>> = Arc::new(PartitionBuffer::new());
    let drain = BufferDrain::new(buffer.clone(), &config.drain);
    let shutdown = drain.shutdown_handle();

    let mut next_expected: HashMap<i32, u64> = HashMap::new();
    let drain_handle = drain
        .spawn(move |record: BenchRecord| {
            let expected = next_expected.entry(record.partition).or_insert(0);
            if record.sequence != *expected {
                bail!(
                    "partition {} delivered sequence {} but {} was expected",
                    record.partition,
                    record.sequence,
                    expected
                );
            }
            *expected += 1;
            Ok(())
        })
        .context("failed to spawn drain thread")?;

    let start = Instant::now();
    info!(
        producers = config.producer_threads,
        partitions = config.partition_count,
        batches_per_producer = config.batches_per_producer,
        batch_size = config.batch_size,
        "Starting partition buffer benchmark"
    );

    let running = Arc::new(AtomicBool::new(true));
    let controller = if config.pause_toggle_interval.0.is_zero() {
        None
    } else {
        Some(spawn_controller(config.pause_toggle_interval.0, &buffer, &running)?)
    };

    for producer in spawn_producers(&config, &buffer)? {
        if producer.join().is_err() {
            bail!("producer thread panicked");
        }
    }
    running.store(false, Ordering::SeqCst);

    let toggles = match controller {
        Some(handle) => match handle.join() {
            Ok(toggles) => toggles,
            Err(_) => bail!("controller thread panicked"),
        },
        None => 0,
    };

    // Anything still paused would never drain
    buffer
        .resume_partitions(&buffer.partitions())
        .context("failed to resume partitions")?;
    shutdown.shutdown();

    let stats = match drain_handle.join() {
        Ok(result) => result?,
        Err(_) => bail!("drain thread panicked"),
    };

    let elapsed = start.elapsed();
    let producers = config.producer_threads.min(config.partition_count as usize);
    let expected_records = (producers * config.batches_per_producer * config.batch_size) as u64;
    if stats.records != expected_records {
        bail!(
            "drained {} records but {} were produced",
            stats.records,
            expected_records
        );
    }

    info!(
        records = stats.records,
        idle_polls = stats.idle_polls,
        pause_toggles = toggles,
        elapsed_ms = elapsed.as_millis() as u64,
        records_per_sec = (stats.records as f64 / elapsed.as_secs_f64()) as u64,
        "Benchmark complete"
    );

    if config.print_metrics {
        println!("{}", metrics.render());
    }

    Ok(())
}
