//! Layered configuration resolution with validation-before-apply,
//! rollback, and change notification.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{codes, Error, ErrorCategory, HalResult, HalUnit};
use crate::event::{EventBus, EventCategory, EventDraft, EventPayload, EventSeverity, SystemEventPayload};
use crate::sync::{self, Mutex, RwLock};

/// Precedence layer a configuration value was set at. Declaration order
/// is precedence order: a later variant always wins over an earlier one
/// at the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    /// Compiled-in defaults.
    System,
    /// Platform-specific overrides (e.g. a Dreamcast-only tuning).
    Platform,
    /// Values sourced from process environment variables.
    Environment,
    /// Values supplied by the embedding application.
    Application,
    /// Per-user preferences.
    User,
    /// Values set at runtime by the application itself.
    Runtime,
    /// Highest-precedence, operator/debug overrides.
    Override,
}

/// All layers, lowest to highest precedence.
const ALL_LAYERS: [ConfigLayer; 7] = [
    ConfigLayer::System,
    ConfigLayer::Platform,
    ConfigLayer::Environment,
    ConfigLayer::Application,
    ConfigLayer::User,
    ConfigLayer::Runtime,
    ConfigLayer::Override,
];

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    /// A boolean flag.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A text value.
    Text(String),
}

/// Bulk-loads a full key/value set for one layer, e.g. from a file or an
/// in-memory map baked into the binary.
pub trait ConfigSource: Send + Sync {
    /// Returns the complete set of keys this source provides.
    fn load(&self) -> HalResult<HashMap<String, ConfigValue>>;
}

/// In-memory reference [`ConfigSource`], useful for tests and for
/// embedding applications that assemble their own defaults in code.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    values: HashMap<String, ConfigValue>,
}

impl StaticConfigSource {
    /// Wraps an already-built key/value map.
    #[must_use]
    pub const fn new(values: HashMap<String, ConfigValue>) -> Self {
        Self { values }
    }
}

impl ConfigSource for StaticConfigSource {
    fn load(&self) -> HalResult<HashMap<String, ConfigValue>> {
        Ok(self.values.clone())
    }
}

/// Detects whether an external configuration source has changed since
/// it was last loaded, without re-parsing unless it has.
pub trait ConfigWatcher: Send + Sync {
    /// Returns the fresh key/value set if the underlying source changed,
    /// `None` if it is unchanged since the last successful poll.
    fn poll(&self) -> HalResult<Option<HashMap<String, ConfigValue>>>;
}

/// Validates a proposed `(layer, key, value)` write before it is applied.
/// The default [`ConfigManager::set`] path has no validator and accepts
/// anything; embedding applications install one for domain-specific
/// constraints (e.g. a known key whose value must be within range).
pub trait ConfigValidator: Send + Sync {
    /// Returns `Err` to reject the write; the manager's state is left
    /// untouched when this happens.
    fn validate(&self, layer: ConfigLayer, key: &str, value: &ConfigValue) -> HalResult<()>;
}

enum SnapshotKind {
    SingleKey { key: String, previous: Option<ConfigValue> },
    WholeLayer { previous: HashMap<String, ConfigValue> },
}

struct ConfigSnapshot {
    layer: ConfigLayer,
    kind: SnapshotKind,
}

type ChangeListener = Arc<dyn Fn(ConfigLayer, &str, Option<&ConfigValue>) + Send + Sync>;

/// Resolves configuration across precedence layers, validating writes
/// before they apply and retaining an undo stack of prior state.
pub struct ConfigManager {
    layers: RwLock<HashMap<ConfigLayer, HashMap<String, ConfigValue>>>,
    rollback_stack: Mutex<Vec<ConfigSnapshot>>,
    validator: Option<Arc<dyn ConfigValidator>>,
    listeners: Mutex<Vec<ChangeListener>>,
    events: Option<Arc<EventBus>>,
}

impl ConfigManager {
    /// Creates an empty manager. `validator` is consulted on every
    /// [`ConfigManager::set`]; `events` receives `System` category
    /// change notifications.
    #[must_use]
    pub fn new(validator: Option<Arc<dyn ConfigValidator>>, events: Option<Arc<EventBus>>) -> Self {
        Self {
            layers: RwLock::new(HashMap::new()),
            rollback_stack: Mutex::new(Vec::new()),
            validator,
            listeners: Mutex::new(Vec::new()),
            events,
        }
    }

    /// Resolves `key` by scanning layers from highest to lowest
    /// precedence, returning the first value found.
    #[must_use]
    pub fn resolve(&self, key: &str) -> Option<ConfigValue> {
        let layers = sync::read(&self.layers);
        ALL_LAYERS
            .iter()
            .rev()
            .find_map(|layer| layers.get(layer).and_then(|values| values.get(key)).cloned())
    }

    /// A snapshot of every key/value pair set at exactly `layer`, with no
    /// precedence resolution applied.
    #[must_use]
    pub fn layer(&self, layer: ConfigLayer) -> HashMap<String, ConfigValue> {
        sync::read(&self.layers).get(&layer).cloned().unwrap_or_default()
    }

    /// Sets `key` to `value` at `layer`. Validated before it is applied;
    /// a rejected write leaves all state, including `key`'s prior value,
    /// untouched.
    pub fn set(&self, layer: ConfigLayer, key: &str, value: ConfigValue) -> HalUnit {
        if let Some(validator) = &self.validator {
            validator.validate(layer, key, &value)?;
        }

        let previous = {
            let mut layers = sync::write(&self.layers);
            let bucket = layers.entry(layer).or_default();
            let previous = bucket.get(key).cloned();
            bucket.insert(key.to_owned(), value.clone());
            previous
        };

        sync::lock(&self.rollback_stack).push(ConfigSnapshot {
            layer,
            kind: SnapshotKind::SingleKey {
                key: key.to_owned(),
                previous,
            },
        });

        self.notify(layer, key, Some(&value));
        Ok(())
    }

    /// Replaces the entire contents of `layer` with whatever `source`
    /// provides. The previous contents of `layer` are pushed as a single
    /// rollback snapshot.
    pub fn load_layer(&self, layer: ConfigLayer, source: &dyn ConfigSource) -> HalUnit {
        let fresh = source.load()?;
        if let Some(validator) = &self.validator {
            for (key, value) in &fresh {
                validator.validate(layer, key, value)?;
            }
        }

        let previous = {
            let mut layers = sync::write(&self.layers);
            layers.insert(layer, fresh.clone())
        }
        .unwrap_or_default();

        sync::lock(&self.rollback_stack).push(ConfigSnapshot {
            layer,
            kind: SnapshotKind::WholeLayer { previous },
        });

        for (key, value) in &fresh {
            self.notify(layer, key, Some(value));
        }
        Ok(())
    }

    /// Polls `watcher`; if it reports a change, applies it the same way
    /// [`ConfigManager::load_layer`] would. Returns whether a change was
    /// applied.
    pub fn apply_watch_update(&self, layer: ConfigLayer, watcher: &dyn ConfigWatcher) -> HalResult<bool> {
        let Some(fresh) = watcher.poll()? else {
            return Ok(false);
        };
        self.load_layer(layer, &StaticConfigSource::new(fresh))?;
        Ok(true)
    }

    /// Undoes the most recent [`ConfigManager::set`] or
    /// [`ConfigManager::load_layer`] call. Fails with
    /// `Validation/invalid_state` if the rollback stack is empty.
    pub fn rollback(&self) -> HalUnit {
        let Some(snapshot) = sync::lock(&self.rollback_stack).pop() else {
            return Err(nothing_to_roll_back());
        };
        match snapshot.kind {
            SnapshotKind::SingleKey { key, previous } => {
                {
                    let mut layers = sync::write(&self.layers);
                    let bucket = layers.entry(snapshot.layer).or_default();
                    match &previous {
                        Some(value) => {
                            bucket.insert(key.clone(), value.clone());
                        }
                        None => {
                            bucket.remove(&key);
                        }
                    }
                }
                self.notify(snapshot.layer, &key, previous.as_ref());
            }
            SnapshotKind::WholeLayer { previous } => {
                sync::write(&self.layers).insert(snapshot.layer, previous.clone());
                for (key, value) in &previous {
                    self.notify(snapshot.layer, key, Some(value));
                }
            }
        }
        Ok(())
    }

    /// Registers a listener invoked on every applied (not rejected)
    /// configuration change, with the new value (`None` if the key was
    /// removed by a rollback).
    pub fn on_change(&self, listener: ChangeListener) {
        sync::lock(&self.listeners).push(listener);
    }

    fn notify(&self, layer: ConfigLayer, key: &str, value: Option<&ConfigValue>) {
        for listener in sync::lock(&self.listeners).iter() {
            listener(layer, key, value);
        }
        let Some(bus) = &self.events else { return };
        bus.publish(EventDraft {
            category: EventCategory::System,
            severity: EventSeverity::Info,
            source_id: "config_manager",
            description: format!("config key '{key}' changed at layer {layer:?}"),
            attributes: HashMap::new(),
            payload: EventPayload::System(SystemEventPayload {
                subsystem: "config_manager",
                detail: "config_changed",
            }),
        });
    }
}

#[cfg(feature = "toml-config")]
mod toml_source {
    use super::{ConfigSource, ConfigValue};
    use crate::error::{codes, Error, ErrorCategory, HalResult};
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;

    /// [`ConfigSource`] backed by a flat (non-nested) TOML file. Nested
    /// tables are rejected rather than silently flattened or dropped.
    #[derive(Debug, Clone)]
    pub struct TomlFileConfigSource {
        path: PathBuf,
    }

    impl TomlFileConfigSource {
        /// Points at `path`; the file is read on every [`ConfigSource::load`]
        /// call, not cached.
        #[must_use]
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }
    }

    impl ConfigSource for TomlFileConfigSource {
        fn load(&self) -> HalResult<HashMap<String, ConfigValue>> {
            let contents = fs::read_to_string(&self.path).map_err(|_| read_failed())?;
            let table: toml::Table = contents.parse().map_err(|_| parse_failed())?;
            let mut values = HashMap::with_capacity(table.len());
            for (key, value) in table {
                values.insert(key, convert(&value)?);
            }
            Ok(values)
        }
    }

    fn convert(value: &toml::Value) -> HalResult<ConfigValue> {
        match value {
            toml::Value::Boolean(value) => Ok(ConfigValue::Bool(*value)),
            toml::Value::Integer(value) => Ok(ConfigValue::Integer(*value)),
            toml::Value::Float(value) => Ok(ConfigValue::Float(*value)),
            toml::Value::String(value) => Ok(ConfigValue::Text(value.clone())),
            toml::Value::Array(_) | toml::Value::Table(_) | toml::Value::Datetime(_) => Err(unsupported_shape()),
        }
    }

    fn read_failed() -> Error {
        Error::new(
            ErrorCategory::Configuration,
            codes::configuration::MISSING_CONFIG,
            "could not read configuration file",
        )
    }

    fn parse_failed() -> Error {
        Error::new(
            ErrorCategory::Configuration,
            codes::configuration::INVALID_PARAMETER,
            "configuration file is not valid TOML",
        )
    }

    fn unsupported_shape() -> Error {
        Error::new(
            ErrorCategory::Configuration,
            codes::configuration::INVALID_PARAMETER,
            "configuration file must be a flat table of scalar values",
        )
    }
}

#[cfg(feature = "toml-config")]
pub use toml_source::TomlFileConfigSource;

fn nothing_to_roll_back() -> Error {
    Error::new(
        ErrorCategory::Validation,
        codes::validation::INVALID_STATE,
        "no configuration change to roll back",
    )
}
