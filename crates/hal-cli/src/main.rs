//! CLI entry point for the `hal-cli` reference harness.
//!
//! Exercises the HAL runtime coordinator end to end with in-memory
//! reference drivers: useful for manual smoke-testing and as a living
//! example of wiring `hal_core::platform::Platform` together.

mod drivers;

use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Weak};
use std::time::Duration;

use hal_core::{
    AcquisitionMode, BenchmarkConfig, BenchmarkRunner, CapabilityDetector, CapabilityMask,
    CapabilityProvider, CapabilityRequirements, CompileTimeProbe, ConfigManager, Driver,
    DriverInfo, DriverRegistry, Event, EventBus, EventSubscriber, Filter, HalUnit, InterfaceSpec,
    Platform, ResourceBudget, ResourceManager, ResourceType, ANY_PLATFORM,
};

const USAGE_TEXT: &str = "\
Usage: hal-cli <command> [options]

Commands:
  detect              Run hardware probe + benchmark capability detection
  demo                 Run a full platform lifecycle with reference drivers
  config <file.toml>   Load a TOML file into the Application config layer
                       and print every resolved value

Options:
  -h, --help           Show this help message
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Detect,
    Demo,
    Config(String),
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<Option<Command>, String> {
    let Some(first) = args.next() else {
        return Err("missing command".to_string());
    };
    if first == "--help" || first == "-h" {
        return Ok(None);
    }
    match first.to_string_lossy().as_ref() {
        "detect" => Ok(Some(Command::Detect)),
        "demo" => Ok(Some(Command::Demo)),
        "config" => {
            let path = args
                .next()
                .ok_or_else(|| "missing config file path".to_string())?;
            Ok(Some(Command::Config(path.to_string_lossy().into_owned())))
        }
        other => Err(format!("unknown command: {other}")),
    }
}

/// Maps `HAL_DEFAULT_LOG_LEVEL` to a log level filter, falling back to
/// `Warning` for unset or unrecognized values.
fn startup_log_level() -> log::LevelFilter {
    match env::var("HAL_DEFAULT_LOG_LEVEL") {
        Ok(value) => match value.to_ascii_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Warn,
        },
        Err(_) => log::LevelFilter::Warn,
    }
}

fn run_detect() -> Result<(), i32> {
    let probe = Arc::new(CompileTimeProbe::with_known_totals(16 * 1024 * 1024, 1));
    let detector = CapabilityDetector::new(
        probe,
        BenchmarkRunner::new(None, None),
        BenchmarkConfig::default(),
        None,
    );

    let results = match detector.detect(true) {
        Ok(results) => results,
        Err(err) => {
            eprintln!("error: detection failed: {err} ({})", err.error_id());
            return Err(1);
        }
    };

    println!("platform:     {}", results.platform.name);
    println!("architecture: {}", results.platform.architecture);
    println!("tier:         {:?}", results.tier);
    println!("cpu cores:    {}", results.platform.cpu_cores);
    println!("memory:       {} bytes", results.platform.total_memory_bytes);
    println!("capabilities:");
    for (name, _) in results.capabilities.iter_names() {
        println!("  - {name}");
    }
    println!("benchmark scores:");
    for score in &results.benchmark.scores {
        println!(
            "  {:?}: score={:.2} tier={:?} confidence={:.2}",
            score.subsystem, score.score, score.tier, score.confidence
        );
    }
    Ok(())
}

struct LoggingSubscriber;

impl EventSubscriber for LoggingSubscriber {
    fn on_event(&self, event: &Event) {
        println!(
            "[event #{} {:?}/{:?}] {}",
            event.id, event.category, event.severity, event.description
        );
    }
}

fn build_demo_platform(events: &Arc<EventBus>) -> Result<Platform, i32> {
    let config = Arc::new(ConfigManager::new(None, Some(Arc::clone(events))));
    let detector = Arc::new(CapabilityDetector::new(
        Arc::new(CompileTimeProbe::with_known_totals(16 * 1024 * 1024, 1)),
        BenchmarkRunner::new(None, None),
        BenchmarkConfig {
            max_duration: Duration::from_millis(200),
            accuracy_threshold: 0.6,
            max_iterations: 3,
        },
        Some(Arc::clone(events)),
    ));
    let registry = Arc::new(DriverRegistry::new(ANY_PLATFORM, Some(Arc::clone(events))));
    register_reference_drivers(&registry);

    let resources = Arc::new(ResourceManager::new(Some(Arc::clone(events))));
    resources
        .set_budget(
            ResourceType::Memory,
            ResourceBudget {
                max_bytes: 16 * 1024 * 1024,
                reserved_bytes: 0,
                warning_pct: 70,
                critical_pct: 90,
                allow_reclamation: true,
                timeout: Duration::from_secs(1),
            },
        )
        .map_err(|err| {
            eprintln!("error: invalid resource budget: {err}");
            1
        })?;

    Platform::new(
        Arc::clone(events),
        config,
        detector,
        registry,
        resources,
        vec![
            InterfaceSpec {
                name: "memory",
                dependencies: vec![],
            },
            InterfaceSpec {
                name: "audio",
                dependencies: vec!["memory"],
            },
        ],
    )
    .map_err(|err| {
        eprintln!("error: failed to assemble platform: {err}");
        1
    })
}

fn resolve_reference_drivers(platform: &Platform) -> Result<(), i32> {
    let memory_driver = platform.resolve("memory", None).map_err(|err| {
        eprintln!("error: failed to resolve memory driver: {err}");
        1
    })?;
    println!("resolved memory driver: {}", memory_driver.driver_name());

    let audio_requirements = CapabilityRequirements {
        required_mask: CapabilityMask::AUDIO_HARDWARE_MIX,
        ..CapabilityRequirements::none()
    };
    let audio_driver = platform
        .resolve("audio", Some(&audio_requirements))
        .map_err(|err| {
            eprintln!("error: failed to resolve audio driver: {err}");
            1
        })?;
    println!("resolved audio driver: {}", audio_driver.driver_name());
    Ok(())
}

fn exercise_resources(resources: &ResourceManager) -> Result<(), i32> {
    let handle = resources
        .acquire(
            ResourceType::Memory,
            8 * 1024 * 1024,
            "null-memory",
            AcquisitionMode::NonBlocking,
        )
        .map_err(|err| {
            eprintln!("error: failed to acquire memory: {err}");
            1
        })?;
    println!(
        "acquired {} bytes of memory; pressure now {:?}",
        handle.size_bytes(),
        resources.pressure(ResourceType::Memory)
    );

    resources.release(handle).map_err(|err| {
        eprintln!("error: failed to release memory: {err}");
        1
    })?;
    println!(
        "released memory; pressure now {:?}",
        resources.pressure(ResourceType::Memory)
    );
    Ok(())
}

fn run_demo() -> Result<(), i32> {
    let events = Arc::new(EventBus::with_defaults());
    let subscriber: Arc<dyn EventSubscriber> = Arc::new(LoggingSubscriber);
    let weak: Weak<dyn EventSubscriber> = Arc::downgrade(&subscriber);
    events.subscribe(Filter::everything(), weak, false);

    let platform = build_demo_platform(&events)?;

    if let Err(err) = platform.initialize() {
        eprintln!("error: initialize failed: {err}");
        return Err(1);
    }
    println!("platform state: {:?}", platform.state());

    resolve_reference_drivers(&platform)?;
    exercise_resources(&platform.resources)?;

    if let Err(err) = platform.shutdown() {
        eprintln!("error: shutdown failed: {err}");
        return Err(1);
    }
    println!("platform state: {:?}", platform.state());

    std::thread::sleep(Duration::from_millis(50));
    let stats = events.stats();
    println!(
        "events dispatched={} filtered={} dropped={}",
        stats.events_dispatched, stats.events_filtered, stats.events_dropped
    );

    Ok(())
}

fn register_reference_drivers(registry: &DriverRegistry) {
    register_factory_driver(registry, "memory", || drivers::as_driver(drivers::NullMemoryDriver::new()));
    register_factory_driver(registry, "audio", || drivers::as_driver(drivers::NullAudioDriver::new()));
}

fn register_factory_driver(
    registry: &DriverRegistry,
    interface: &'static str,
    make: fn() -> Arc<dyn Driver>,
) {
    let probe = make();
    let info = DriverInfo {
        name: probe.driver_name(),
        version: probe.version(),
        supported_platforms_mask: ANY_PLATFORM,
        capability_mask: probe.mask(),
        priority: probe.priority(),
        tier: probe.tier(),
        factory: Some(Arc::new(move || make())),
        dependencies: Vec::new(),
        fallback_drivers: Vec::new(),
        memory_overhead_bytes: 0,
        supports_hot_swap: false,
        description: "in-memory reference driver",
    };
    if let Err(err) = registry.register(interface, info) {
        log::warn!("failed to register reference driver for '{interface}': {err}");
    }
}

fn run_config(path: &str) -> Result<(), i32> {
    let source = hal_core::config::TomlFileConfigSource::new(path);
    let manager = ConfigManager::new(None, None);
    if let Err(err) = load_into_application_layer(&manager, &source) {
        eprintln!("error: failed to load config: {err}");
        return Err(1);
    }
    let mut keys: Vec<String> = manager.layer(hal_core::ConfigLayer::Application).into_keys().collect();
    keys.sort();
    for key in keys {
        if let Some(value) = manager.resolve(&key) {
            println!("{key} = {value:?}");
        }
    }
    Ok(())
}

fn load_into_application_layer(
    manager: &ConfigManager,
    source: &dyn hal_core::ConfigSource,
) -> HalUnit {
    manager.load_layer(hal_core::ConfigLayer::Application, source)
}

fn main() {
    env_logger::Builder::new()
        .filter_level(startup_log_level())
        .init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(None) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(Some(Command::Detect)) => run_detect().err().unwrap_or(0),
        Ok(Some(Command::Demo)) => run_demo().err().unwrap_or(0),
        Ok(Some(Command::Config(path))) => run_config(&path).err().unwrap_or(0),
        Err(error) => {
            eprintln!("error: {error}");
            eprintln!("{USAGE_TEXT}");
            1
        }
    };
    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn parses_detect_command() {
        let result = parse_args([OsString::from("detect")].into_iter()).unwrap();
        assert_eq!(result, Some(Command::Detect));
    }

    #[test]
    fn parses_demo_command() {
        let result = parse_args([OsString::from("demo")].into_iter()).unwrap();
        assert_eq!(result, Some(Command::Demo));
    }

    #[test]
    fn parses_config_command_with_path() {
        let result = parse_args([OsString::from("config"), OsString::from("hal.toml")].into_iter()).unwrap();
        assert_eq!(result, Some(Command::Config("hal.toml".to_string())));
    }

    #[test]
    fn rejects_unknown_command() {
        let err = parse_args([OsString::from("bogus")].into_iter()).unwrap_err();
        assert!(err.contains("unknown command"));
    }

    #[test]
    fn help_flag_yields_no_command() {
        let result = parse_args([OsString::from("--help")].into_iter()).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn missing_command_is_an_error() {
        let err = parse_args(std::iter::empty()).unwrap_err();
        assert!(err.contains("missing command"));
    }
}
