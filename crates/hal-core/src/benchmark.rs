//! Deterministic, bounded micro-benchmarks and the tier classifier that
//! reduces their scores to a single [`PerformanceTier`].
//!
//! Storage and network subsystems are measured through the injected
//! [`BenchmarkIo`]/[`BenchmarkNet`] collaborator traits so running this
//! crate's test suite never touches a real disk or socket; the
//! CPU/memory subsystems run inline since they need no host resource
//! beyond the CPU itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::capability::PerformanceTier;
use crate::error::{codes, Error, ErrorCategory, HalResult};

/// One measured subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Scalar integer arithmetic throughput.
    IntegerCompute,
    /// Scalar floating point throughput.
    FloatCompute,
    /// Sequential (cache-friendly) memory scan throughput.
    SequentialMemory,
    /// Random-access memory scan throughput.
    RandomMemory,
    /// Synthetic texture/vertex byte-copy throughput.
    GraphicsThroughput,
    /// Storage read throughput, via [`BenchmarkIo`].
    StorageRead,
    /// Storage write throughput, via [`BenchmarkIo`].
    StorageWrite,
    /// Network round-trip latency, via [`BenchmarkNet`].
    NetworkLatency,
}

/// Bounds and convergence criteria for a benchmark pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkConfig {
    /// Hard wall-clock ceiling for the entire pass; exceeding it ends the
    /// pass early with whatever samples have been collected so far.
    pub max_duration: Duration,
    /// Maximum relative difference between consecutive samples (as a
    /// fraction, e.g. `0.05` = 5%) considered "converged".
    pub accuracy_threshold: f64,
    /// Upper bound on iterations collected per subsystem.
    pub max_iterations: u32,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_millis(500),
            accuracy_threshold: 0.05,
            max_iterations: 8,
        }
    }
}

/// Calibration thresholds (in the subsystem's native score unit) marking
/// the floor of each tier. These are reference placeholders: a real
/// deployment calibrates them against representative hardware per
/// platform class (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierThresholds {
    /// Score floor for [`PerformanceTier::Limited`].
    pub limited: f64,
    /// Score floor for [`PerformanceTier::Standard`].
    pub standard: f64,
    /// Score floor for [`PerformanceTier::High`].
    pub high: f64,
}

impl TierThresholds {
    fn classify(self, score: f64) -> PerformanceTier {
        if score >= self.high {
            PerformanceTier::High
        } else if score >= self.standard {
            PerformanceTier::Standard
        } else if score >= self.limited {
            PerformanceTier::Limited
        } else {
            PerformanceTier::Minimal
        }
    }
}

/// Result of benchmarking a single subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubsystemScore {
    /// The subsystem measured.
    pub subsystem: Subsystem,
    /// Native-unit score (higher is better; latency is inverted so this
    /// invariant holds uniformly).
    pub score: f64,
    /// Classified tier for this subsystem alone.
    pub tier: PerformanceTier,
    /// How many samples converged within `accuracy_threshold`, from `0.0`
    /// (no convergence) to `1.0` (converged on the first pair).
    pub confidence: f64,
    /// Samples actually collected before `max_iterations` or
    /// `max_duration` was reached.
    pub iterations_run: u32,
}

/// Aggregate benchmark outcome: every subsystem score plus the
/// weakest-link tier.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResults {
    /// Per-subsystem scores, in the order measured.
    pub scores: Vec<SubsystemScore>,
    /// `min` over every `scores[_].tier`.
    pub aggregate_tier: PerformanceTier,
    /// `true` if [`BenchmarkRunner::cancel`] stopped the pass before every
    /// subsystem ran.
    pub cancelled: bool,
}

/// Storage collaborator injected so storage benchmarks never touch a
/// real filesystem in this crate's own tests.
pub trait BenchmarkIo: Send + Sync {
    /// Performs one read sample, returning how long it took.
    fn read_sample(&self) -> HalResult<Duration>;
    /// Performs one write sample, returning how long it took.
    fn write_sample(&self) -> HalResult<Duration>;
}

/// Network collaborator injected so the latency benchmark never opens a
/// real socket in this crate's own tests.
pub trait BenchmarkNet: Send + Sync {
    /// Performs one round-trip sample, returning its latency.
    fn latency_sample(&self) -> HalResult<Duration>;
}

fn calibrated_thresholds(subsystem: Subsystem) -> TierThresholds {
    match subsystem {
        Subsystem::IntegerCompute => TierThresholds {
            limited: 5.0e7,
            standard: 2.0e8,
            high: 8.0e8,
        },
        Subsystem::FloatCompute => TierThresholds {
            limited: 2.0e7,
            standard: 1.0e8,
            high: 4.0e8,
        },
        Subsystem::SequentialMemory => TierThresholds {
            limited: 2.0e8,
            standard: 1.0e9,
            high: 4.0e9,
        },
        Subsystem::RandomMemory => TierThresholds {
            limited: 5.0e7,
            standard: 2.0e8,
            high: 8.0e8,
        },
        Subsystem::GraphicsThroughput => TierThresholds {
            limited: 1.0e7,
            standard: 1.0e8,
            high: 5.0e8,
        },
        Subsystem::StorageRead | Subsystem::StorageWrite => TierThresholds {
            limited: 1.0e6,
            standard: 5.0e7,
            high: 2.0e8,
        },
        Subsystem::NetworkLatency => TierThresholds {
            limited: 10.0,
            standard: 100.0,
            high: 1000.0,
        },
    }
}

/// Runs the deterministic subsystem benchmarks and classifies tiers.
pub struct BenchmarkRunner {
    io: Option<Arc<dyn BenchmarkIo>>,
    net: Option<Arc<dyn BenchmarkNet>>,
    cancelled: Arc<AtomicBool>,
}

impl BenchmarkRunner {
    /// Builds a runner. `io`/`net` are optional; when absent, the
    /// corresponding subsystems are skipped rather than faked.
    #[must_use]
    pub fn new(io: Option<Arc<dyn BenchmarkIo>>, net: Option<Arc<dyn BenchmarkNet>>) -> Self {
        Self {
            io,
            net,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the cancellation flag observed at every iteration boundary.
    /// In-flight probes complete; no new iteration starts after this.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Resets cancellation so the runner can be reused for another pass.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    /// Runs every available subsystem benchmark under `config`, bounded
    /// in total by `config.max_duration`. Fails with
    /// [`no_subsystems_ran`] if cancellation or an already-elapsed
    /// deadline prevented even the first subsystem from running.
    pub fn run(&self, config: &BenchmarkConfig) -> HalResult<BenchmarkResults> {
        let deadline = Instant::now() + config.max_duration;
        let mut scores = Vec::new();
        let mut cancelled = false;

        let mut subsystems: Vec<(Subsystem, fn(&Self) -> Option<Duration>)> = vec![
            (Subsystem::IntegerCompute, |_| Some(run_integer_sample())),
            (Subsystem::FloatCompute, |_| Some(run_float_sample())),
            (Subsystem::SequentialMemory, |_| Some(run_sequential_memory_sample())),
            (Subsystem::RandomMemory, |_| Some(run_random_memory_sample())),
            (Subsystem::GraphicsThroughput, |_| Some(run_graphics_sample())),
        ];
        if self.io.is_some() {
            subsystems.push((Subsystem::StorageRead, Self::io_read_sample));
            subsystems.push((Subsystem::StorageWrite, Self::io_write_sample));
        }
        if self.net.is_some() {
            subsystems.push((Subsystem::NetworkLatency, Self::net_latency_sample));
        }

        for (subsystem, sample_fn) in subsystems {
            if self.cancelled.load(Ordering::Acquire) || Instant::now() >= deadline {
                cancelled = true;
                break;
            }
            if let Some(score) = self.measure(subsystem, sample_fn, config, deadline) {
                scores.push(score);
            }
        }

        let Some(aggregate_tier) = scores.iter().map(|s| s.tier).min() else {
            return Err(no_subsystems_ran());
        };

        Ok(BenchmarkResults {
            scores,
            aggregate_tier,
            cancelled,
        })
    }

    fn io_read_sample(&self) -> Option<Duration> {
        self.io.as_ref()?.read_sample().ok()
    }

    fn io_write_sample(&self) -> Option<Duration> {
        self.io.as_ref()?.write_sample().ok()
    }

    fn net_latency_sample(&self) -> Option<Duration> {
        self.net.as_ref()?.latency_sample().ok()
    }

    fn measure(
        &self,
        subsystem: Subsystem,
        sample_fn: fn(&Self) -> Option<Duration>,
        config: &BenchmarkConfig,
        deadline: Instant,
    ) -> Option<SubsystemScore> {
        let is_latency = matches!(subsystem, Subsystem::NetworkLatency);
        let mut samples = Vec::new();
        let mut converged_at = None;

        for iteration in 0..config.max_iterations {
            if self.cancelled.load(Ordering::Acquire) || Instant::now() >= deadline {
                break;
            }
            let Some(elapsed) = sample_fn(self) else {
                return None;
            };
            let raw_score = if is_latency {
                // Invert so "higher is better" holds uniformly: score is
                // round-trips per second.
                if elapsed.as_secs_f64() <= 0.0 {
                    0.0
                } else {
                    1.0 / elapsed.as_secs_f64()
                }
            } else {
                score_from_elapsed(elapsed)
            };
            samples.push(raw_score);

            if samples.len() >= 2 && converged_at.is_none() {
                let prev = samples[samples.len() - 2];
                let relative_delta = if prev.abs() > f64::EPSILON {
                    ((raw_score - prev) / prev).abs()
                } else {
                    0.0
                };
                if relative_delta <= config.accuracy_threshold {
                    converged_at = Some(iteration);
                }
            }
        }

        if samples.is_empty() {
            return None;
        }

        let score = samples.iter().copied().sum::<f64>() / samples.len() as f64;
        let confidence = match converged_at {
            Some(0) | Some(1) => 1.0,
            Some(at) => (f64::from(config.max_iterations - at) / f64::from(config.max_iterations)).clamp(0.0, 1.0),
            None => 0.0,
        };
        let tier = calibrated_thresholds(subsystem).classify(score);

        Some(SubsystemScore {
            subsystem,
            score,
            tier,
            confidence,
            iterations_run: samples.len() as u32,
        })
    }
}

/// Converts a wall-clock sample into a "bigger is better" throughput
/// score: the reciprocal of elapsed seconds, scaled by the fixed unit of
/// work each inline benchmark performs.
fn score_from_elapsed(elapsed: Duration) -> f64 {
    const UNIT_OF_WORK: f64 = 4.0e7;
    if elapsed.as_secs_f64() <= 0.0 {
        UNIT_OF_WORK * 1.0e6
    } else {
        UNIT_OF_WORK / elapsed.as_secs_f64()
    }
}

fn run_integer_sample() -> Duration {
    let started = Instant::now();
    let mut accumulator: u64 = 0;
    for value in 0u64..4_000_000 {
        accumulator = accumulator.wrapping_add(value).wrapping_mul(2654435761);
    }
    std::hint::black_box(accumulator);
    started.elapsed()
}

fn run_float_sample() -> Duration {
    let started = Instant::now();
    let mut accumulator: f64 = 1.0;
    for value in 1..2_000_000u64 {
        accumulator = (accumulator + value as f64).sqrt();
    }
    std::hint::black_box(accumulator);
    started.elapsed()
}

fn run_sequential_memory_sample() -> Duration {
    let buffer = vec![1u8; 4 * 1024 * 1024];
    let started = Instant::now();
    let mut checksum: u64 = 0;
    for byte in &buffer {
        checksum = checksum.wrapping_add(u64::from(*byte));
    }
    std::hint::black_box(checksum);
    started.elapsed()
}

fn run_random_memory_sample() -> Duration {
    let buffer = vec![1u8; 1024 * 1024];
    let started = Instant::now();
    let mut index: usize = 0;
    let mut checksum: u64 = 0;
    for _ in 0..buffer.len() {
        index = (index.wrapping_mul(1103515245).wrapping_add(12345)) % buffer.len();
        checksum = checksum.wrapping_add(u64::from(buffer[index]));
    }
    std::hint::black_box(checksum);
    started.elapsed()
}

fn run_graphics_sample() -> Duration {
    let source = vec![0xABu8; 2 * 1024 * 1024];
    let started = Instant::now();
    let mut destination = vec![0u8; source.len()];
    destination.copy_from_slice(&source);
    std::hint::black_box(&destination);
    started.elapsed()
}

/// Builds the `Internal` error used when a pass is asked to run with no
/// subsystems available at all (e.g. both collaborators absent and the
/// inline subsystems were skipped by cancellation before the first one
/// started).
#[must_use]
pub fn no_subsystems_ran() -> Error {
    Error::new(
        ErrorCategory::Internal,
        codes::internal::INVARIANT_VIOLATION,
        "benchmark pass produced no subsystem scores",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedIo {
        read: Duration,
        write: Duration,
    }

    impl BenchmarkIo for FixedIo {
        fn read_sample(&self) -> HalResult<Duration> {
            Ok(self.read)
        }
        fn write_sample(&self) -> HalResult<Duration> {
            Ok(self.write)
        }
    }

    struct FixedNet {
        latency: Duration,
    }

    impl BenchmarkNet for FixedNet {
        fn latency_sample(&self) -> HalResult<Duration> {
            Ok(self.latency)
        }
    }

    #[test]
    fn aggregate_tier_is_minimum_over_subsystems() {
        let io = Arc::new(FixedIo {
            read: Duration::from_micros(1),
            write: Duration::from_micros(1),
        });
        let net = Arc::new(FixedNet {
            latency: Duration::from_millis(500),
        });
        let runner = BenchmarkRunner::new(Some(io), Some(net));
        let results = runner.run(&BenchmarkConfig::default()).unwrap();

        let network_score = results
            .scores
            .iter()
            .find(|s| s.subsystem == Subsystem::NetworkLatency)
            .unwrap();
        assert_eq!(network_score.tier, PerformanceTier::Minimal);
        assert_eq!(results.aggregate_tier, PerformanceTier::Minimal);
    }

    #[test]
    fn cancellation_before_the_first_subsystem_fails_with_no_subsystems_ran() {
        let runner = BenchmarkRunner::new(None, None);
        runner.cancel();
        let err = runner.run(&BenchmarkConfig::default()).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Internal);
    }

    #[test]
    fn convergence_on_first_pair_yields_full_confidence() {
        let io = Arc::new(FixedIo {
            read: Duration::from_millis(1),
            write: Duration::from_millis(1),
        });
        let runner = BenchmarkRunner::new(Some(io), None);
        let results = runner
            .run(&BenchmarkConfig {
                max_duration: Duration::from_secs(1),
                accuracy_threshold: 0.5,
                max_iterations: 4,
            })
            .unwrap();
        let read_score = results
            .scores
            .iter()
            .find(|s| s.subsystem == Subsystem::StorageRead)
            .unwrap();
        assert_eq!(read_score.confidence, 1.0);
    }

    #[test]
    fn net_only_runner_skips_storage_subsystems() {
        let net = Arc::new(FixedNet {
            latency: Duration::from_millis(1),
        });
        let runner = BenchmarkRunner::new(None, Some(net));
        let results = runner.run(&BenchmarkConfig::default()).unwrap();
        assert!(results.scores.iter().all(|s| s.subsystem != Subsystem::StorageRead));
        assert!(results.scores.iter().any(|s| s.subsystem == Subsystem::NetworkLatency));
    }

    #[test]
    fn reset_allows_rerun_after_cancel() {
        let runner = BenchmarkRunner::new(None, None);
        runner.cancel();
        assert!(runner.run(&BenchmarkConfig::default()).is_err());
        runner.reset();
        let results = runner.run(&BenchmarkConfig::default()).unwrap();
        assert!(!results.cancelled);
        assert!(!results.scores.is_empty());
    }

    #[test]
    fn thread_safety_marker() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BenchmarkRunner>();
    }
}
