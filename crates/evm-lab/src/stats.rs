//! Timing and allocation measurement of engine executions.

use std::{
    alloc::{GlobalAlloc, Layout, System},
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::LabConfig;

/// Upper bound of samples in one benchmark round.
pub const MAX_BENCH_SAMPLES: u64 = 1_000_000_000;

static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static ALLOCATED_BYTES: AtomicU64 = AtomicU64::new(0);

/// Global allocator that counts allocations on top of [`System`].
///
/// Counters are process-wide. Allocation figures are only reported when a binary installs this
/// allocator with `#[global_allocator]`; otherwise they read as zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingAllocator;

impl CountingAllocator {
    /// Creates the allocator.
    pub const fn new() -> Self {
        Self
    }
}

#[inline]
fn record(size: usize) {
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    ALLOCATED_BYTES.fetch_add(size as u64, Ordering::Relaxed);
}

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        record(new_size);
        unsafe { System.realloc(ptr, layout, new_size) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[derive(Debug, Clone, Copy)]
struct AllocSnapshot {
    allocs: u64,
    bytes: u64,
}

impl AllocSnapshot {
    fn now() -> Self {
        Self {
            allocs: ALLOCATIONS.load(Ordering::Relaxed),
            bytes: ALLOCATED_BYTES.load(Ordering::Relaxed),
        }
    }
}

/// Accumulates time and allocations of the sections it is asked to time.
#[derive(Debug, Default)]
pub struct Stopwatch {
    elapsed: Duration,
    allocs: u64,
    allocated_bytes: u64,
}

impl Stopwatch {
    /// Runs `f` and adds its wall time and allocations to the totals.
    pub fn time<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let before = AllocSnapshot::now();
        let start = Instant::now();
        let out = f();
        self.elapsed += start.elapsed();
        let after = AllocSnapshot::now();
        self.allocs += after.allocs.saturating_sub(before.allocs);
        self.allocated_bytes += after.bytes.saturating_sub(before.bytes);
        out
    }

    /// Returns the accumulated wall time.
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn per_sample(&self, samples: u64) -> RunStats {
        let samples = samples.max(1);
        RunStats {
            time_ns: (self.elapsed.as_nanos() / samples as u128) as u64,
            allocs: self.allocs / samples,
            allocated_bytes: self.allocated_bytes / samples,
            samples,
        }
    }
}

/// Per-sample statistics of a measured execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Average wall time of one execution, in nanoseconds
    pub time_ns: u64,
    /// Average number of heap allocations
    pub allocs: u64,
    /// Average number of allocated bytes
    pub allocated_bytes: u64,
    /// Number of executions averaged over
    pub samples: u64,
}

impl RunStats {
    /// Returns the average wall time as a [`Duration`].
    pub const fn duration(&self) -> Duration {
        Duration::from_nanos(self.time_ns)
    }
}

/// Benchmark parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Fixed number of samples, adaptive when `None`
    pub samples: Option<u64>,
    /// Wall time an adaptive round has to reach
    pub target: Duration,
    /// Restore the pre-operation state before every sample instead of letting samples build on
    /// each other
    pub isolated: bool,
}

/// How an operation is executed and measured. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementStrategy {
    /// Execute once
    Single,
    /// Execute repeatedly and average
    Benchmark(BenchConfig),
}

impl MeasurementStrategy {
    /// Selects the strategy described by the configuration.
    pub fn from_config(config: &LabConfig) -> Self {
        if config.bench {
            Self::Benchmark(BenchConfig {
                samples: config.bench_samples,
                target: Duration::from_millis(config.bench_time_ms),
                isolated: config.bench_isolated,
            })
        } else {
            Self::Single
        }
    }

    /// Returns `true` for benchmark strategies.
    pub const fn is_benchmark(&self) -> bool {
        matches!(self, Self::Benchmark(_))
    }

    /// Returns `true` if every sample must start from the pre-operation state.
    pub const fn is_isolated(&self) -> bool {
        matches!(self, Self::Benchmark(BenchConfig { isolated: true, .. }))
    }

    /// Runs `sample` as many times as the strategy asks and returns the output of the last run
    /// together with per-sample statistics.
    ///
    /// Only the sections a sample times through its [`Stopwatch`] count towards the statistics.
    /// Adaptive benchmarks grow the sample count round by round until a round reaches the target
    /// wall time.
    pub fn measure<T>(&self, mut sample: impl FnMut(&mut Stopwatch) -> T) -> (T, RunStats) {
        let config = match self {
            Self::Single => {
                let mut watch = Stopwatch::default();
                let out = sample(&mut watch);
                return (out, watch.per_sample(1));
            }
            Self::Benchmark(config) => config,
        };

        let mut n = config.samples.unwrap_or(1).clamp(1, MAX_BENCH_SAMPLES);
        loop {
            let mut watch = Stopwatch::default();
            let mut out = sample(&mut watch);
            for _ in 1..n {
                out = sample(&mut watch);
            }
            trace!(samples = n, elapsed = ?watch.elapsed(), "Benchmark round finished");

            if config.samples.is_some() || watch.elapsed() >= config.target || n >= MAX_BENCH_SAMPLES
            {
                let stats = watch.per_sample(n);
                debug!(samples = n, time_ns = stats.time_ns, "Benchmark finished");
                return (out, stats);
            }
            n = predict_samples(config.target, n, watch.elapsed());
        }
    }
}

/// Predicts the sample count that reaches `target`, growing by at most 100x per round.
fn predict_samples(target: Duration, last: u64, elapsed: Duration) -> u64 {
    let elapsed = elapsed.as_nanos().max(1);
    let mut n = target.as_nanos().saturating_mul(last as u128) / elapsed;
    n += n / 5;
    let n = n.min(last as u128 * 100).max(last as u128 + 1).min(MAX_BENCH_SAMPLES as u128);
    n as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_runs_once() {
        let mut runs = 0;
        let (out, stats) = MeasurementStrategy::Single.measure(|_| {
            runs += 1;
            runs
        });
        assert_eq!(out, 1);
        assert_eq!(runs, 1);
        assert_eq!(stats.samples, 1);
    }

    #[test]
    fn test_fixed_samples() {
        let strategy = MeasurementStrategy::Benchmark(BenchConfig {
            samples: Some(5),
            target: Duration::from_secs(3600),
            isolated: false,
        });
        let mut runs = 0u64;
        let (out, stats) = strategy.measure(|watch| {
            runs += 1;
            watch.time(|| runs)
        });
        assert_eq!(runs, 5);
        assert_eq!(out, 5);
        assert_eq!(stats.samples, 5);
    }

    #[test]
    fn test_adaptive_rounds_reach_target() {
        let strategy = MeasurementStrategy::Benchmark(BenchConfig {
            samples: None,
            target: Duration::from_millis(20),
            isolated: false,
        });
        let mut runs = 0u64;
        let (_, stats) = strategy.measure(|watch| {
            runs += 1;
            watch.time(|| std::thread::sleep(Duration::from_micros(200)));
        });
        // the first round of one sample cannot reach the target
        assert!(runs > stats.samples);
        assert!(stats.samples > 1);
        assert!(stats.duration() >= Duration::from_micros(200));
    }

    #[test]
    fn test_untimed_work_is_excluded() {
        let (_, stats) = MeasurementStrategy::Single.measure(|watch| {
            std::thread::sleep(Duration::from_millis(20));
            watch.time(|| ());
        });
        assert!(stats.duration() < Duration::from_millis(20));
    }

    #[test]
    fn test_allocations_are_counted() {
        let (_, stats) = MeasurementStrategy::Single.measure(|watch| {
            watch.time(|| std::hint::black_box(vec![0u8; 4096]));
        });
        assert!(stats.allocs >= 1);
        assert!(stats.allocated_bytes >= 4096);
    }

    #[test]
    fn test_predict_samples_bounds() {
        // grows by at most 100x
        assert_eq!(predict_samples(Duration::from_secs(1), 1, Duration::from_nanos(1)), 100);
        // always grows
        assert_eq!(predict_samples(Duration::from_secs(1), 10, Duration::from_secs(2)), 11);
        // aims 20% past the target
        assert_eq!(predict_samples(Duration::from_secs(1), 100, Duration::from_millis(100)), 1200);
        assert_eq!(
            predict_samples(Duration::from_secs(1), MAX_BENCH_SAMPLES, Duration::from_nanos(1)),
            MAX_BENCH_SAMPLES
        );
    }
}
