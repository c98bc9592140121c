//! Coordinates the event bus, configuration manager, capability
//! detector, driver registry, and resource manager through one
//! initialize/shutdown lifecycle.

use std::sync::Arc;

use crate::capability::CapabilityMask;
use crate::config::ConfigManager;
use crate::detector::{CapabilityDetector, DetectionResults};
use crate::error::{codes, Error, ErrorCategory, HalResult, HalUnit};
use crate::event::EventBus;
use crate::registry::{CapabilityRequirements, Driver, DriverRegistry};
use crate::resource::ResourceManager;
use crate::sync::{self, Mutex};

/// Declares one interface's place in initialization order. `dependencies`
/// names other interfaces that must already be initialized first.
#[derive(Debug, Clone)]
pub struct InterfaceSpec {
    /// The interface name, matching what was passed to
    /// [`DriverRegistry::register`].
    pub name: &'static str,
    /// Interfaces this one depends on.
    pub dependencies: Vec<&'static str>,
}

/// Coordinator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Constructed but [`Platform::initialize`] has not yet succeeded.
    Uninitialized,
    /// An [`Platform::initialize`] call is in flight.
    Initializing,
    /// Initialization completed successfully; interfaces may be queried.
    Running,
    /// A [`Platform::shutdown`] call is in flight.
    ShuttingDown,
    /// [`Platform::shutdown`] has completed.
    ShutDown,
}

/// The lifecycle operation attempted; carried in conflict errors so a
/// caller can tell which transition it collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTransition {
    /// [`Platform::initialize`].
    Initialize,
    /// [`Platform::shutdown`].
    Shutdown,
}

/// Owns the runtime's core components and sequences their lifecycle.
pub struct Platform {
    /// Shared event bus.
    pub events: Arc<EventBus>,
    /// Shared configuration manager.
    pub config: Arc<ConfigManager>,
    /// Shared capability detector.
    pub detector: Arc<CapabilityDetector>,
    /// Shared driver registry.
    pub registry: Arc<DriverRegistry>,
    /// Shared resource manager.
    pub resources: Arc<ResourceManager>,
    interfaces: Vec<&'static str>,
    state: Mutex<CoordinatorState>,
}

impl Platform {
    /// Assembles a coordinator around already-constructed components.
    /// `interfaces` is topologically sorted by dependency now, so
    /// [`Platform::initialize`]/[`Platform::shutdown`] don't repeat the
    /// sort on every call; a dependency cycle fails immediately with
    /// `Internal/invariant_violation`.
    pub fn new(
        events: Arc<EventBus>,
        config: Arc<ConfigManager>,
        detector: Arc<CapabilityDetector>,
        registry: Arc<DriverRegistry>,
        resources: Arc<ResourceManager>,
        interface_specs: Vec<InterfaceSpec>,
    ) -> HalResult<Self> {
        let interfaces = topological_order(&interface_specs)?;
        Ok(Self {
            events,
            config,
            detector,
            registry,
            resources,
            interfaces,
            state: Mutex::new(CoordinatorState::Uninitialized),
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        *sync::lock(&self.state)
    }

    /// Runs the startup sequence: a quick capability detection pass,
    /// then `initialize()` on every interface's drivers in dependency
    /// order. Fails with `Validation/invalid_state` if a transition is
    /// already in flight.
    pub fn initialize(&self) -> HalUnit {
        self.begin_transition(StateTransition::Initialize, CoordinatorState::Initializing)?;

        let _ = self.detector.detect(false);

        let mut failed = Vec::new();
        for &interface in &self.interfaces {
            if let Err(err) = self.registry.initialize(interface) {
                log::warn!("interface '{interface}' failed to initialize: {err}");
                failed.push(interface);
            }
        }

        if failed.is_empty() {
            *sync::lock(&self.state) = CoordinatorState::Running;
            Ok(())
        } else {
            *sync::lock(&self.state) = CoordinatorState::Uninitialized;
            Err(Error::new(
                ErrorCategory::Internal,
                codes::internal::AGGREGATED_FAILURE,
                "one or more interfaces failed to initialize",
            )
            .with_context("see log for failed interface names"))
        }
    }

    /// Shuts every interface down in reverse dependency order, then the
    /// event bus. Best-effort: individual driver failures are logged,
    /// never abort the pass.
    pub fn shutdown(&self) -> HalUnit {
        self.begin_transition(StateTransition::Shutdown, CoordinatorState::ShuttingDown)?;

        for &interface in self.interfaces.iter().rev() {
            self.registry.shutdown(interface);
        }
        self.events.shutdown();

        *sync::lock(&self.state) = CoordinatorState::ShutDown;
        Ok(())
    }

    /// Forwards to [`DriverRegistry::resolve`], but only while the
    /// coordinator is `Running`.
    pub fn resolve(&self, interface: &'static str, requirements: Option<&CapabilityRequirements>) -> HalResult<Arc<dyn Driver>> {
        self.require_running()?;
        self.registry.resolve(interface, requirements)
    }

    /// The most recent capability detection snapshot, if one has run.
    #[must_use]
    pub fn capabilities(&self) -> Option<DetectionResults> {
        self.detector.current()
    }

    /// Convenience check against the latest detection snapshot; `false`
    /// if no detection has run yet.
    #[must_use]
    pub fn supports(&self, capability: CapabilityMask) -> bool {
        self.detector
            .current()
            .is_some_and(|results| results.capabilities.contains(capability))
    }

    fn require_running(&self) -> HalUnit {
        if self.state() == CoordinatorState::Running {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCategory::Validation,
                codes::validation::INVALID_STATE,
                "platform is not running",
            )
            .with_context("Platform::resolve"))
        }
    }

    fn begin_transition(&self, transition: StateTransition, entering: CoordinatorState) -> HalUnit {
        let mut state = sync::lock(&self.state);
        let allowed = matches!(
            (*state, transition),
            (CoordinatorState::Uninitialized, StateTransition::Initialize)
                | (CoordinatorState::ShutDown, StateTransition::Initialize)
                | (CoordinatorState::Running, StateTransition::Shutdown)
        );
        if !allowed {
            return Err(conflicting_transition(transition));
        }
        *state = entering;
        Ok(())
    }
}

fn conflicting_transition(transition: StateTransition) -> Error {
    let context = match transition {
        StateTransition::Initialize => "Platform::initialize",
        StateTransition::Shutdown => "Platform::shutdown",
    };
    Error::new(
        ErrorCategory::Validation,
        codes::validation::INVALID_STATE,
        "a coordinator state transition is already in flight or this one is out of order",
    )
    .with_context(context)
}

/// Kahn's algorithm over the declared interface dependency graph.
fn topological_order(specs: &[InterfaceSpec]) -> HalResult<Vec<&'static str>> {
    let mut remaining: Vec<&InterfaceSpec> = specs.iter().collect();
    let mut ordered = Vec::with_capacity(specs.len());

    while !remaining.is_empty() {
        let ready_index = remaining
            .iter()
            .position(|spec| spec.dependencies.iter().all(|dep| ordered.contains(dep)));
        let Some(index) = ready_index else {
            return Err(Error::new(
                ErrorCategory::Internal,
                codes::internal::INVARIANT_VIOLATION,
                "interface dependency graph contains a cycle",
            ));
        };
        let spec = remaining.remove(index);
        ordered.push(spec.name);
    }

    Ok(ordered)
}
