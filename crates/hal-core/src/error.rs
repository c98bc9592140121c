//! Zero-allocation tagged result type and error taxonomy used pervasively
//! across the HAL runtime.

use std::fmt;

/// Broad intent classification for an [`Error`].
///
/// Categories drive recovery policy at call sites (see the crate-level
/// error handling design): `Hardware` and `Resource` are locally
/// recoverable, `Configuration`/`Validation` are caller bugs, `Internal`
/// is fatal for the affected subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[repr(u8)]
pub enum ErrorCategory {
    /// Device not found, busy, or otherwise transiently unavailable.
    Hardware = 0,
    /// Driver incompatible, unsupported, or not loaded.
    Driver = 1,
    /// Invalid, missing, or out-of-range configuration.
    Configuration = 2,
    /// Resource exhausted, locked, or out of memory.
    Resource = 3,
    /// Unsupported platform or platform constraint.
    Platform = 4,
    /// Connect/timeout failure in a networked collaborator.
    Network = 5,
    /// Failed precondition or invalid state.
    Validation = 6,
    /// Invariant violation or unimplemented path.
    Internal = 7,
}

impl ErrorCategory {
    /// Returns the raw category byte used to pack [`Error::error_id`].
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A structured, statically-allocated error value.
///
/// `message` and `context` are `&'static str`: the canonical error never
/// takes ownership of caller-owned strings, so raising an `Error` never
/// allocates.
#[derive(Debug, Clone, Copy, Error)]
#[error("{message}")]
pub struct Error {
    category: ErrorCategory,
    code: u32,
    message: &'static str,
    context: Option<&'static str>,
}

use thiserror::Error;

impl Error {
    /// Builds a new error with no additional context.
    #[must_use]
    pub const fn new(category: ErrorCategory, code: u32, message: &'static str) -> Self {
        Self {
            category,
            code,
            message,
            context: None,
        }
    }

    /// Returns a copy of this error with `context` attached.
    #[must_use]
    pub const fn with_context(mut self, context: &'static str) -> Self {
        self.context = Some(context);
        self
    }

    /// The error's category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.category
    }

    /// The category-scoped numeric code.
    #[must_use]
    pub const fn code(&self) -> u32 {
        self.code
    }

    /// The static human-readable message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// Optional additional static context, e.g. the conflicting operation
    /// name for a `Validation/invalid_state` error.
    #[must_use]
    pub const fn context(&self) -> Option<&'static str> {
        self.context
    }

    /// Stable 32-bit identifier suitable for logs and metrics:
    /// `(category << 24) | (code & 0x00FF_FFFF)`.
    #[must_use]
    pub const fn error_id(&self) -> u32 {
        ((self.category.as_u8() as u32) << 24) | (self.code & 0x00FF_FFFF)
    }
}

impl PartialEq for Error {
    /// Equality compares `(category, code)` only; `message`/`context` are
    /// presentation detail and may legitimately differ between two errors
    /// that represent the same condition.
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.code == other.code
    }
}

impl Eq for Error {}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hardware => "hardware",
            Self::Driver => "driver",
            Self::Configuration => "configuration",
            Self::Resource => "resource",
            Self::Platform => "platform",
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Convenience constructors for well-known error codes used throughout the
/// runtime. Codes are stable within a category; do not renumber.
pub mod codes {
    /// `Configuration` category codes.
    pub mod configuration {
        /// A supplied parameter failed validation.
        pub const INVALID_PARAMETER: u32 = 1;
        /// A required configuration section was missing.
        pub const MISSING_CONFIG: u32 = 2;
        /// A configuration value was outside its valid range.
        pub const OUT_OF_RANGE: u32 = 3;
    }
    /// `Driver` category codes.
    pub mod driver {
        /// No driver satisfied the query.
        pub const DRIVER_NOT_LOADED: u32 = 1;
        /// A driver is incompatible with the current platform.
        pub const INCOMPATIBLE: u32 = 2;
        /// A driver does not support a requested capability.
        pub const UNSUPPORTED: u32 = 3;
    }
    /// `Resource` category codes.
    pub mod resource {
        /// The budget for a resource type is exhausted.
        pub const RESOURCE_EXHAUSTED: u32 = 1;
        /// Acquisition timed out waiting for space.
        pub const RESOURCE_LOCKED: u32 = 2;
        /// Emergency reclamation could not free enough bytes.
        pub const OUT_OF_MEMORY: u32 = 3;
    }
    /// `Validation` category codes.
    pub mod validation {
        /// A handle did not match its recorded owner or was already released.
        pub const INVALID_STATE: u32 = 1;
    }
    /// `Internal` category codes.
    pub mod internal {
        /// One or more driver operations failed during a bulk pass.
        pub const AGGREGATED_FAILURE: u32 = 1;
        /// An invariant the runtime relies on was violated.
        pub const INVARIANT_VIOLATION: u32 = 2;
    }
    /// `Hardware` category codes.
    pub mod hardware {
        /// A probe could not reach the underlying device.
        pub const PROBE_FAILED: u32 = 1;
    }
    /// `Platform` category codes.
    pub mod platform {
        /// The current platform is unsupported for the requested operation.
        pub const UNSUPPORTED_PLATFORM: u32 = 1;
    }
    /// `Network` category codes.
    pub mod network {
        /// A networked collaborator timed out.
        pub const TIMEOUT: u32 = 1;
    }
}

/// `Result<T, Error>` alias used across every fallible HAL API.
pub type HalResult<T> = std::result::Result<T, Error>;

/// Void specialization of [`HalResult`].
pub type HalUnit = HalResult<()>;

/// Combinators over [`HalResult`] mirroring the `value_or`/`map`/
/// `and_then`/`map_err` contract fallible HAL APIs are expected to expose.
///
/// Implemented as an extension trait rather than a hand-rolled tagged
/// union: `std::result::Result<T, Error>` already is the stack-resident
/// tagged union this contract calls for, so reinventing it would only
/// reintroduce layout risk for no benefit.
pub trait ResultExt<T> {
    /// Returns the contained value, or `default` if this is `Err`.
    fn value_or(self, default: T) -> T;
    /// Maps the `Ok` value through `f`, leaving `Err` untouched.
    fn map_ok<U>(self, f: impl FnOnce(T) -> U) -> HalResult<U>;
    /// Chains a fallible continuation; short-circuits on `Err`.
    fn and_then_hal<U>(self, f: impl FnOnce(T) -> HalResult<U>) -> HalResult<U>;
    /// Maps the contained `Error` through `f`, leaving `Ok` untouched.
    fn map_err_hal(self, f: impl FnOnce(Error) -> Error) -> HalResult<T>;
}

impl<T> ResultExt<T> for HalResult<T> {
    fn value_or(self, default: T) -> T {
        self.unwrap_or(default)
    }

    fn map_ok<U>(self, f: impl FnOnce(T) -> U) -> HalResult<U> {
        self.map(f)
    }

    fn and_then_hal<U>(self, f: impl FnOnce(T) -> HalResult<U>) -> HalResult<U> {
        self.and_then(f)
    }

    fn map_err_hal(self, f: impl FnOnce(Error) -> Error) -> HalResult<T> {
        self.map_err(f)
    }
}

#[cfg(test)]
mod tests {
    use super::{codes, Error, ErrorCategory, ResultExt};

    #[test]
    fn error_id_packs_category_and_code() {
        let err = Error::new(
            ErrorCategory::Driver,
            codes::driver::DRIVER_NOT_LOADED,
            "no driver",
        );
        assert_eq!(err.error_id(), (1u32 << 24) | 1);
    }

    #[test]
    fn equality_ignores_message_and_context() {
        let a = Error::new(ErrorCategory::Resource, 1, "exhausted");
        let b = Error::new(ErrorCategory::Resource, 1, "different message").with_context("ctx");
        assert_eq!(a, b);
    }

    #[test]
    fn inequality_on_code_or_category() {
        let a = Error::new(ErrorCategory::Resource, 1, "exhausted");
        let b = Error::new(ErrorCategory::Resource, 2, "exhausted");
        let c = Error::new(ErrorCategory::Hardware, 1, "exhausted");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn result_round_trip_ok_map_and_and_then() {
        let ok: Result<i32, Error> = Ok(2);
        assert_eq!(ok.map_ok(|v| v + 1), Ok(3));

        let ok: Result<i32, Error> = Ok(2);
        assert_eq!(ok.and_then_hal(|v| Ok(v * 2)), Ok(4));
    }

    #[test]
    fn result_round_trip_err_short_circuits() {
        let err = Error::new(ErrorCategory::Internal, 9, "boom");
        let result: Result<i32, Error> = Err(err);
        assert_eq!(result.and_then_hal(|v| Ok(v + 1)), Err(err));
    }

    #[test]
    fn value_or_returns_default_on_err() {
        let err: Result<i32, Error> = Err(Error::new(ErrorCategory::Internal, 1, "boom"));
        assert_eq!(err.value_or(42), 42);
    }

    proptest::proptest! {
        /// `Ok(v).map_ok(f) == Ok(f(v))` and `Err(e).map_ok(f) == Err(e)`
        /// for any value and any error code.
        #[test]
        fn map_ok_round_trips(v in proptest::num::i32::ANY, code in proptest::num::u32::ANY) {
            let ok: Result<i32, Error> = Ok(v);
            proptest::prop_assert_eq!(ok.map_ok(|x| x.wrapping_add(1)), Ok(v.wrapping_add(1)));

            let err = Error::new(ErrorCategory::Internal, code, "boom");
            let failing: Result<i32, Error> = Err(err);
            proptest::prop_assert_eq!(failing.map_ok(|x| x.wrapping_add(1)), Err(err));
        }

        /// `and_then_hal` short-circuits on `Err` regardless of the code
        /// carried, and otherwise behaves like `Result::and_then`.
        #[test]
        fn and_then_short_circuits_on_any_error(code in proptest::num::u32::ANY) {
            let err = Error::new(ErrorCategory::Validation, code, "boom");
            let failing: Result<i32, Error> = Err(err);
            proptest::prop_assert_eq!(failing.and_then_hal(|x| Ok(x + 1)), Err(err));
        }
    }
}
