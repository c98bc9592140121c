//! Ties the hardware probe and benchmark runner together into one
//! capability snapshot, diffing against the previous snapshot to publish
//! targeted change notifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::benchmark::{BenchmarkConfig, BenchmarkResults, BenchmarkRunner};
use crate::capability::{CapabilityMask, PerformanceTier, PlatformDescriptor};
use crate::error::{codes, Error, ErrorCategory, HalResult};
use crate::event::{EventBus, EventCategory, EventDraft, EventPayload, EventSeverity, HardwareEventPayload, SystemEventPayload};
use crate::probe::{HardwareProbe, ProbeResult};
use crate::sync::{self, Mutex};

/// One completed capability-detection pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResults {
    /// Capability bits derived from the probe pass.
    pub capabilities: CapabilityMask,
    /// Aggregate tier classified by the benchmark pass.
    pub tier: PerformanceTier,
    /// Platform description assembled from the probe and benchmark.
    pub platform: PlatformDescriptor,
    /// The raw probe pass this snapshot was derived from.
    pub probe: ProbeResult,
    /// The raw benchmark pass this snapshot was derived from.
    pub benchmark: BenchmarkResults,
}

const STAGE_IDLE: u8 = 0;
const STAGE_PROBING_DONE: u8 = 20;
const STAGE_BENCHMARKING_DONE: u8 = 90;
const STAGE_COMPLETE: u8 = 100;

/// Runs a probe pass followed by a benchmark pass, consolidates them into
/// a [`DetectionResults`] snapshot, and publishes diff-based change
/// notifications against the previous snapshot.
pub struct CapabilityDetector {
    probe: Arc<dyn HardwareProbe>,
    benchmark: BenchmarkRunner,
    benchmark_config: BenchmarkConfig,
    events: Option<Arc<EventBus>>,
    current: Mutex<Option<DetectionResults>>,
    in_progress: AtomicBool,
    progress_pct: AtomicU8,
}

impl CapabilityDetector {
    /// Builds a detector around `probe` and `benchmark`. `events`, if
    /// given, receives per-capability and tier-change notifications.
    #[must_use]
    pub fn new(
        probe: Arc<dyn HardwareProbe>,
        benchmark: BenchmarkRunner,
        benchmark_config: BenchmarkConfig,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        Self {
            probe,
            benchmark,
            benchmark_config,
            events,
            current: Mutex::new(None),
            in_progress: AtomicBool::new(false),
            progress_pct: AtomicU8::new(STAGE_IDLE),
        }
    }

    /// Runs (or reuses) a detection pass.
    ///
    /// With `force = false`, an already-cached result is returned without
    /// re-probing. With `force = true`, a fresh pass always runs. Calling
    /// with `force = true` while another detection pass is already
    /// running fails with `Validation/invalid_state`, naming the
    /// conflicting operation in context, rather than queuing behind it.
    pub fn detect(&self, force: bool) -> HalResult<DetectionResults> {
        if !force {
            if let Some(results) = sync::lock(&self.current).clone() {
                return Ok(results);
            }
        }

        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if force {
                return Err(conflicting_detection());
            }
            return sync::lock(&self.current)
                .clone()
                .ok_or_else(conflicting_detection);
        }

        let result = self.run_pass();
        self.in_progress.store(false, Ordering::Release);
        result
    }

    /// The most recently completed detection pass, if any has run.
    #[must_use]
    pub fn current(&self) -> Option<DetectionResults> {
        sync::lock(&self.current).clone()
    }

    /// Fraction of the current or most recent pass completed, weighted
    /// 20% probe / 70% benchmark / 10% consolidation.
    #[must_use]
    pub fn progress(&self) -> f64 {
        f64::from(self.progress_pct.load(Ordering::Acquire)) / 100.0
    }

    /// Requests cancellation of an in-flight benchmark stage. Observed at
    /// the next benchmark iteration boundary; the probe stage, being a
    /// single synchronous call, cannot be interrupted mid-flight.
    pub fn cancel(&self) {
        self.benchmark.cancel();
    }

    fn run_pass(&self) -> HalResult<DetectionResults> {
        self.benchmark.reset();
        self.progress_pct.store(STAGE_IDLE, Ordering::Release);

        let probe_result = self.probe.probe();
        self.progress_pct.store(STAGE_PROBING_DONE, Ordering::Release);

        let benchmark_results = self.benchmark.run(&self.benchmark_config)?;
        self.progress_pct.store(STAGE_BENCHMARKING_DONE, Ordering::Release);

        let tier = benchmark_results.aggregate_tier;
        let platform = PlatformDescriptor {
            name: std::env::consts::OS.to_owned(),
            architecture: std::env::consts::ARCH.to_owned(),
            tier,
            total_memory_bytes: probe_result.memory.total_bytes,
            cpu_cores: probe_result.cpu.logical_cores,
            has_fpu: probe_result.cpu.has_fpu,
            has_simd: probe_result.cpu.has_simd,
        };
        let results = DetectionResults {
            capabilities: derive_capability_mask(&probe_result),
            tier,
            platform,
            probe: probe_result,
            benchmark: benchmark_results,
        };

        let previous = sync::lock(&self.current).clone();
        self.notify_changes(previous.as_ref(), &results);
        *sync::lock(&self.current) = Some(results.clone());
        self.progress_pct.store(STAGE_COMPLETE, Ordering::Release);

        Ok(results)
    }

    fn notify_changes(&self, previous: Option<&DetectionResults>, current: &DetectionResults) {
        let Some(bus) = &self.events else { return };
        let Some(previous) = previous else { return };

        let changed = previous.capabilities ^ current.capabilities;
        for (name, bit) in CapabilityMask::all().iter_names() {
            if !changed.contains(bit) {
                continue;
            }
            let gained = current.capabilities.contains(bit);
            bus.publish(EventDraft {
                category: EventCategory::Hardware,
                severity: EventSeverity::Info,
                source_id: "capability_detector",
                description: format!("capability {name} {}", if gained { "gained" } else { "lost" }),
                attributes: HashMap::new(),
                payload: EventPayload::Hardware(HardwareEventPayload {
                    device: name,
                    detail: if gained { "gained" } else { "lost" },
                }),
            });
        }

        if previous.tier != current.tier {
            bus.publish(EventDraft {
                category: EventCategory::System,
                severity: EventSeverity::Warning,
                source_id: "capability_detector",
                description: format!("aggregate performance tier changed from {:?} to {:?}", previous.tier, current.tier),
                attributes: HashMap::new(),
                payload: EventPayload::System(SystemEventPayload {
                    subsystem: "capability_detector",
                    detail: "tier_changed",
                }),
            });
        }
    }
}

/// Maps probed hardware features onto the capability bits a probe pass
/// can actually attest to. Bits with no corresponding probe signal
/// (e.g. `AUDIO_HARDWARE_MIX`, `SANDBOX_RESTRICTED`) are driver-advertised
/// rather than probe-derived and are left unset here.
fn derive_capability_mask(probe: &ProbeResult) -> CapabilityMask {
    let mut mask = CapabilityMask::empty();
    mask.set(CapabilityMask::THREADING, probe.cpu.logical_cores > 1);
    mask.set(CapabilityMask::DMA, probe.memory.has_dma);
    mask.set(CapabilityMask::VIRTUAL_MEMORY, probe.memory.has_virtual_memory);
    mask.set(CapabilityMask::SHADER_BASIC, probe.gpu.has_basic_shaders);
    mask.set(CapabilityMask::SHADER_PROGRAMMABLE, probe.gpu.has_programmable_shaders);
    mask.set(CapabilityMask::SHADER_COMPUTE, probe.gpu.has_compute_shaders);
    mask.set(CapabilityMask::INPUT_POINTER, probe.io.has_pointer_input);
    mask.set(CapabilityMask::INPUT_GAMEPAD, probe.io.has_gamepad_input);
    mask.set(CapabilityMask::NETWORK_SOCKETS, probe.io.has_network_sockets);
    mask.set(CapabilityMask::STORAGE_BLOCK, probe.io.has_block_storage);
    mask.set(CapabilityMask::TIMING_HIGH_RESOLUTION, cfg!(not(target_os = "none")));
    mask
}

fn conflicting_detection() -> Error {
    Error::new(
        ErrorCategory::Validation,
        codes::validation::INVALID_STATE,
        "a capability detection pass is already in progress",
    )
    .with_context("detect(force=true)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSubscriber, Event, Filter};
    use crate::probe::CompileTimeProbe;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;
    use std::time::Duration;

    struct CountingProbe {
        calls: AtomicUsize,
        inner: CompileTimeProbe,
    }

    impl HardwareProbe for CountingProbe {
        fn probe(&self) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.probe()
        }
    }

    fn fast_config() -> BenchmarkConfig {
        BenchmarkConfig {
            max_duration: Duration::from_millis(50),
            accuracy_threshold: 0.5,
            max_iterations: 2,
        }
    }

    fn detector_with(probe: Arc<dyn HardwareProbe>, events: Option<Arc<EventBus>>) -> CapabilityDetector {
        CapabilityDetector::new(probe, BenchmarkRunner::new(None, None), fast_config(), events)
    }

    #[test]
    fn detect_populates_results_and_reaches_full_progress() {
        let detector = detector_with(Arc::new(CompileTimeProbe::with_known_totals(1024, 2)), None);
        let results = detector.detect(true).unwrap();
        assert!(results.capabilities.contains(CapabilityMask::THREADING));
        assert_eq!(detector.progress(), 1.0);
        assert!(detector.current().is_some());
    }

    #[test]
    fn non_forcing_detect_reuses_cached_results() {
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
            inner: CompileTimeProbe::default(),
        });
        let detector = detector_with(probe.clone(), None);

        detector.detect(false).unwrap();
        detector.detect(false).unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);

        detector.detect(true).unwrap();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn forcing_detect_while_in_progress_is_rejected() {
        let detector = detector_with(Arc::new(CompileTimeProbe::default()), None);
        detector.in_progress.store(true, Ordering::SeqCst);
        let err = detector.detect(true).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.code(), codes::validation::INVALID_STATE);
        assert_eq!(err.context(), Some("detect(force=true)"));
    }

    struct RecordingSubscriber {
        hardware_events: Mutex<Vec<String>>,
        tier_events: Mutex<Vec<String>>,
    }

    impl EventSubscriber for RecordingSubscriber {
        fn on_event(&self, event: &Event) {
            match &event.payload {
                EventPayload::Hardware(payload) => {
                    sync::lock(&self.hardware_events).push(payload.device.to_owned());
                }
                EventPayload::System(payload) if payload.detail == "tier_changed" => {
                    sync::lock(&self.tier_events).push(event.description.clone());
                }
                _ => {}
            }
        }
    }

    #[test]
    fn second_pass_notifies_only_changed_capabilities() {
        let bus = Arc::new(EventBus::with_defaults());
        let subscriber = Arc::new(RecordingSubscriber {
            hardware_events: Mutex::new(Vec::new()),
            tier_events: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn EventSubscriber> = Arc::downgrade(&(Arc::clone(&subscriber) as Arc<dyn EventSubscriber>));
        bus.subscribe(Filter::everything(), weak, false);

        let probe = Arc::new(CompileTimeProbe::with_known_totals(1024, 1));
        let detector = detector_with(probe, Some(Arc::clone(&bus)));

        detector.detect(true).unwrap();
        detector.detect(true).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        bus.shutdown();

        // Identical probe/benchmark results across both passes: no
        // capability or tier actually changed, so nothing is published.
        assert!(sync::lock(&subscriber.hardware_events).is_empty());
        assert!(sync::lock(&subscriber.tier_events).is_empty());
    }
}
