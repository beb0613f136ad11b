// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Unified error taxonomy for fieldlink clients.
//!
//! Every protocol crate maps its own error tree into [`PlcError`], so callers
//! can handle Siemens, Modbus and OPC-UA failures with one `match`.
//!
//! # Error Hierarchy
//!
//! ```text
//! PlcError
//! ├── InvalidAddress / UnsupportedArea / UnsupportedType   - address grammar
//! ├── MissingDbNumber                                      - Siemens DB resolution
//! ├── NotConnected / LockTimeout                           - client state & access
//! ├── Communication                                        - transport failures
//! ├── Device                                               - far-end protocol faults
//! ├── DriverLoad                                           - native S7 driver
//! ├── InvalidValue / UnknownMap                            - caller input
//! └── NotImplemented / Configuration / Client              - everything else
//! ```
//!
//! # Examples
//!
//! ```
//! use fieldlink_core::error::PlcError;
//! use fieldlink_core::types::DeviceFamily;
//!
//! let error = PlcError::device(DeviceFamily::Modbus, 2, "invalid register address");
//! assert_eq!(error.device_code(), Some(2));
//! assert!(!error.is_retryable());
//!
//! let error = PlcError::communication("connection reset by peer");
//! assert!(error.is_communication());
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::types::DeviceFamily;

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// PlcError
// =============================================================================

/// The error type shared by every [`DeviceClient`](crate::client::DeviceClient).
#[derive(Debug, Error)]
pub enum PlcError {
    /// The address string does not match the grammar.
    #[error("Invalid address '{address}': {message}")]
    InvalidAddress {
        /// The offending address string.
        address: String,
        /// What is wrong with it.
        message: String,
    },

    /// A Siemens DB access had no DB number in the address, argument or cache.
    #[error("No DB number specified")]
    MissingDbNumber,

    /// The area tag is not known to the device family.
    #[error("Unsupported area '{area}'")]
    UnsupportedArea {
        /// The area tag.
        area: String,
    },

    /// The type code is not known.
    #[error("Unsupported data type '{code}'")]
    UnsupportedType {
        /// The type code.
        code: String,
    },

    /// Access attempted without a live connection and auto-connect disabled.
    #[error("Not connected to device")]
    NotConnected,

    /// The access lock was not acquired in time.
    #[error("No exclusive access to the device within {duration:?}")]
    LockTimeout {
        /// How long the caller waited.
        duration: Duration,
    },

    /// Transport-level failure: refused, timed out, short read/write, socket absent.
    #[error("Communication error: {message}")]
    Communication {
        /// Error message.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<BoxError>,
    },

    /// The far-end device reported a protocol-level fault.
    #[error("{family} device error {code}: {message}")]
    Device {
        /// Protocol family that raised the fault.
        family: DeviceFamily,
        /// Device error code (S7 error, Modbus exception, OPC-UA status).
        code: u32,
        /// Human-readable reason.
        message: String,
    },

    /// The native S7 driver could not be found or loaded.
    #[error("Failed to load native driver '{library}': {message}")]
    DriverLoad {
        /// Library name or path.
        library: String,
        /// Loader message.
        message: String,
    },

    /// The operation is intentionally not provided by this client.
    #[error("Operation not implemented: {operation}")]
    NotImplemented {
        /// Operation name.
        operation: String,
    },

    /// A value cannot be represented in the requested type, or a raw payload has the wrong size.
    #[error("Invalid value for {target}: {message}")]
    InvalidValue {
        /// Target type or operation.
        target: String,
        /// What is wrong.
        message: String,
    },

    /// No variable map with this name has been registered.
    #[error("Unknown variable map '{name}'")]
    UnknownMap {
        /// Map name.
        name: String,
    },

    /// Invalid client settings.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message.
        message: String,
    },

    /// Generic client failure with no protocol code attached.
    #[error("{message}")]
    Client {
        /// Error message.
        message: String,
    },
}

impl PlcError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates an invalid address error.
    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported area error.
    pub fn unsupported_area(area: impl Into<String>) -> Self {
        Self::UnsupportedArea { area: area.into() }
    }

    /// Creates an unsupported type error.
    pub fn unsupported_type(code: impl Into<String>) -> Self {
        Self::UnsupportedType { code: code.into() }
    }

    /// Creates a lock timeout error.
    pub fn lock_timeout(duration: Duration) -> Self {
        Self::LockTimeout { duration }
    }

    /// Creates a communication error without a source.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::Communication {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a communication error wrapping its cause.
    pub fn communication_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Communication {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a device fault.
    pub fn device(family: DeviceFamily, code: u32, message: impl Into<String>) -> Self {
        Self::Device {
            family,
            code,
            message: message.into(),
        }
    }

    /// Creates a driver load error.
    pub fn driver_load(library: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DriverLoad {
            library: library.into(),
            message: message.into(),
        }
    }

    /// Creates a not-implemented error.
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::NotImplemented {
            operation: operation.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown map error.
    pub fn unknown_map(name: impl Into<String>) -> Self {
        Self::UnknownMap { name: name.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a generic client error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` for transport-level failures.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication { .. })
    }

    /// Returns the device error code, if this is a device fault.
    pub fn device_code(&self) -> Option<u32> {
        match self {
            Self::Device { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` if a later attempt may succeed.
    ///
    /// The client never retries on its own; this is advice for the caller's
    /// polling loop.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Communication { .. } | Self::LockTimeout { .. } | Self::NotConnected
        )
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::LockTimeout { .. } | Self::NotConnected => ErrorSeverity::Warning,
            Self::Communication { .. } => ErrorSeverity::Warning,
            Self::Device { .. } | Self::Client { .. } => ErrorSeverity::Error,
            Self::DriverLoad { .. } | Self::Configuration { .. } => ErrorSeverity::Critical,
            Self::InvalidAddress { .. }
            | Self::MissingDbNumber
            | Self::UnsupportedArea { .. }
            | Self::UnsupportedType { .. }
            | Self::InvalidValue { .. }
            | Self::UnknownMap { .. }
            | Self::NotImplemented { .. } => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidAddress { .. }
            | Self::UnsupportedArea { .. }
            | Self::UnsupportedType { .. }
            | Self::MissingDbNumber => "address",
            Self::NotConnected | Self::LockTimeout { .. } => "access",
            Self::Communication { .. } => "communication",
            Self::Device { .. } => "device",
            Self::DriverLoad { .. } => "driver",
            Self::InvalidValue { .. } | Self::UnknownMap { .. } => "input",
            Self::NotImplemented { .. } => "unsupported",
            Self::Configuration { .. } => "configuration",
            Self::Client { .. } => "client",
        }
    }

    /// Returns a structured error code (`PL-ccnn`).
    pub fn error_code(&self) -> ErrorCode {
        let (category, code) = match self {
            Self::InvalidAddress { .. } => (1, 1),
            Self::UnsupportedArea { .. } => (1, 2),
            Self::UnsupportedType { .. } => (1, 3),
            Self::MissingDbNumber => (1, 4),
            Self::NotConnected => (2, 1),
            Self::LockTimeout { .. } => (2, 2),
            Self::Communication { .. } => (3, 1),
            Self::Device { family, .. } => (4, family.code()),
            Self::DriverLoad { .. } => (5, 1),
            Self::InvalidValue { .. } => (6, 1),
            Self::UnknownMap { .. } => (6, 2),
            Self::NotImplemented { .. } => (7, 1),
            Self::Configuration { .. } => (8, 1),
            Self::Client { .. } => (9, 1),
        };
        ErrorCode::new("PL", category, code)
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with its code, category and the given context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code, rendered as `<prefix>-<category><code>` in hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Two-letter subsystem prefix (`PL`, `MB`, `S7`, `UA`).
    pub prefix: &'static str,
    /// Category within the subsystem.
    pub category: u8,
    /// Specific error within the category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(prefix: &'static str, category: u8, code: u8) -> Self {
        Self {
            prefix,
            category,
            code,
        }
    }

    /// Returns category and code packed into a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02X}{:02X}", self.prefix, self.category, self.code)
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A Result type with [`PlcError`].
pub type PlcResult<T> = Result<T, PlcError>;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(PlcError::communication("reset").is_retryable());
        assert!(PlcError::lock_timeout(Duration::from_secs(1)).is_retryable());
        assert!(PlcError::NotConnected.is_retryable());
        assert!(!PlcError::MissingDbNumber.is_retryable());
        assert!(!PlcError::device(DeviceFamily::Siemens, 0x0090_0000, "out of range").is_retryable());
    }

    #[test]
    fn test_device_code() {
        let error = PlcError::device(DeviceFamily::Modbus, 2, "invalid register address");
        assert_eq!(error.device_code(), Some(2));
        assert_eq!(error.to_string(), "Modbus device error 2: invalid register address");
        assert_eq!(PlcError::NotConnected.device_code(), None);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(PlcError::MissingDbNumber.error_code().to_string(), "PL-0104");
        assert_eq!(ErrorCode::new("MB", 1, 5).to_string(), "MB-0105");
        assert_eq!(ErrorCode::new("MB", 3, 5).as_u16(), 0x0305);
    }

    #[test]
    fn test_category_and_severity() {
        assert_eq!(PlcError::unsupported_area("zz").category(), "address");
        assert_eq!(PlcError::communication("x").severity(), ErrorSeverity::Warning);
        assert_eq!(
            PlcError::driver_load("snap7", "not found").severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), Level::ERROR);
    }

    #[test]
    fn test_communication_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let error = PlcError::communication_with("read failed", io);
        let source = std::error::Error::source(&error);
        assert!(source.is_some());
    }
}
