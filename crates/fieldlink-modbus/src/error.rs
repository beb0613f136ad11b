// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus error types.
//!
//! # Error Categories
//!
//! ```text
//! ModbusError
//! ├── Connection    - socket connect, send and receive failures
//! ├── Protocol      - exception responses and malformed frames
//! ├── Request       - requests rejected before reaching the wire
//! └── Configuration - invalid client settings
//! ```
//!
//! Every variant maps into [`PlcError`]: exception responses and locally
//! rejected requests become [`PlcError::Device`], transport failures become
//! [`PlcError::Communication`].
//!
//! # Examples
//!
//! ```
//! use fieldlink_modbus::error::{ModbusError, ProtocolError};
//! use fieldlink_core::PlcError;
//!
//! let error = ModbusError::exception(0x83, 2);
//! assert_eq!(error.to_string(), "Modbus exception 2 (invalid register address) for function 0x83");
//!
//! let plc: PlcError = error.into();
//! assert_eq!(plc.device_code(), Some(2));
//! ```

use std::fmt;
use std::io;
use std::time::Duration;

use fieldlink_core::{DeviceFamily, ErrorCode, ErrorSeverity, PlcError};
use thiserror::Error;
use tracing::Level;

/// Exception code for an illegal data value.
pub const ILLEGAL_DATA_VALUE: u8 = 3;

// =============================================================================
// ModbusError
// =============================================================================

/// The main error type for Modbus operations.
#[derive(Debug, Error)]
pub enum ModbusError {
    /// Socket-level errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Exception responses and framing errors.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Requests rejected locally.
    #[error("{0}")]
    Request(#[from] RequestError),

    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ModbusError {
    /// Creates an exception-response error.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Protocol(ProtocolError::exception(function_code, exception_code))
    }

    /// Creates a not-connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates an illegal-data-value rejection.
    pub fn illegal_value(message: impl Into<String>) -> Self {
        Self::Request(RequestError::IllegalDataValue {
            message: message.into(),
        })
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Protocol(e) => e.is_retryable(),
            Self::Request(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns `true` for socket-level failures.
    pub fn is_communication(&self) -> bool {
        match self {
            Self::Connection(e) => !matches!(e, ConnectionError::NotConnected),
            Self::Protocol(e) => !matches!(e, ProtocolError::Exception { .. }),
            _ => false,
        }
    }

    /// Returns `true` if the socket may still hold bytes of an unread or
    /// foreign frame, so the next response cannot be trusted.
    pub fn breaks_framing(&self) -> bool {
        matches!(
            self,
            Self::Connection(ConnectionError::ResponseTimeout(_) | ConnectionError::Io(_))
                | Self::Protocol(ProtocolError::TransactionMismatch { .. } | ProtocolError::InvalidHeader(_))
        )
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(_) => ErrorSeverity::Warning,
            Self::Protocol(ProtocolError::Exception { .. }) => ErrorSeverity::Error,
            Self::Protocol(_) => ErrorSeverity::Warning,
            Self::Request(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Request(_) => "request",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a structured error code (`MB-ccnn`).
    pub fn error_code(&self) -> ErrorCode {
        let (category, code) = match self {
            Self::Connection(e) => (1, e.code()),
            Self::Protocol(e) => (2, e.code()),
            Self::Request(e) => (3, e.code()),
            Self::Configuration(_) => (4, 1),
        };
        ErrorCode::new("MB", category, code)
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
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
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Socket-level errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The device refused the connection.
    #[error("cannot connect to device {host}:{port} (unit {unit_id})")]
    Refused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Unit id.
        unit_id: u8,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The device did not answer the connection attempt in time.
    #[error("device does not respond: {host}:{port} (unit {unit_id}) after {duration:?}")]
    TimedOut {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Unit id.
        unit_id: u8,
        /// Connect timeout.
        duration: Duration,
    },

    /// Any other connect failure.
    #[error("error connecting to device {host}:{port} (unit {unit_id}): {source}")]
    Failed {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
        /// Unit id.
        unit_id: u8,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// No open socket.
    #[error("device is disconnected")]
    NotConnected,

    /// The device did not answer a request in time.
    #[error("no response from device within {0:?}")]
    ResponseTimeout(Duration),

    /// Send or receive failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    /// Classifies a connect failure.
    pub fn from_connect(host: &str, port: u16, unit_id: u8, source: io::Error) -> Self {
        let host = host.to_string();
        match source.kind() {
            io::ErrorKind::ConnectionRefused => Self::Refused {
                host,
                port,
                unit_id,
                source,
            },
            io::ErrorKind::TimedOut => Self::TimedOut {
                host,
                port,
                unit_id,
                duration: Duration::ZERO,
            },
            _ => Self::Failed {
                host,
                port,
                unit_id,
                source,
            },
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::Refused { .. } => 1,
            Self::TimedOut { .. } => 2,
            Self::Failed { .. } => 3,
            Self::NotConnected => 4,
            Self::ResponseTimeout(_) => 5,
            Self::Io(_) => 6,
        }
    }
}

// =============================================================================
// ProtocolError
// =============================================================================

/// Exception responses and framing errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The device answered with an exception code.
    #[error("Modbus exception {exception_code} ({}) for function {function_code:#04x}", describe_exception(.exception_code))]
    Exception {
        /// Echoed function code.
        function_code: u8,
        /// Exception code.
        exception_code: u8,
    },

    /// Fewer bytes arrived than the request needs.
    #[error("received fewer bytes than requested: expected {expected}, got {actual}")]
    ShortResponse {
        /// Expected bytes.
        expected: usize,
        /// Received bytes.
        actual: usize,
    },

    /// The MBAP header is inconsistent.
    #[error("invalid MBAP header: {0}")]
    InvalidHeader(String),

    /// The response belongs to another transaction.
    #[error("transaction id mismatch: expected {expected}, got {actual}")]
    TransactionMismatch {
        /// Sent transaction id.
        expected: u16,
        /// Received transaction id.
        actual: u16,
    },
}

impl ProtocolError {
    /// Creates an exception-response error.
    pub fn exception(function_code: u8, exception_code: u8) -> Self {
        Self::Exception {
            function_code,
            exception_code,
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Exception { exception_code, .. } => matches!(exception_code, 5 | 6 | 10 | 11),
            _ => true,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::Exception { .. } => 1,
            Self::ShortResponse { .. } => 2,
            Self::InvalidHeader(_) => 3,
            Self::TransactionMismatch { .. } => 4,
        }
    }
}

fn describe_exception(code: &u8) -> &'static str {
    exception_name(*code)
}

/// Human-readable name of a Modbus exception code.
pub fn exception_name(code: u8) -> &'static str {
    match code {
        1 => "illegal function",
        2 => "invalid register address",
        3 => "illegal data value",
        4 => "device failure",
        5 => "acknowledge",
        6 => "device busy",
        8 => "memory parity error",
        10 => "gateway path unavailable",
        11 => "gateway target failed to respond",
        _ => "unknown exception",
    }
}

// =============================================================================
// RequestError
// =============================================================================

/// Requests rejected before reaching the wire.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Same meaning as exception 3, raised locally.
    #[error("illegal data value: {message}")]
    IllegalDataValue {
        /// What was wrong.
        message: String,
    },

    /// The area cannot be written.
    #[error("area '{area}' cannot be written")]
    UnsupportedArea {
        /// Area tag.
        area: String,
    },

    /// The payload length does not match the register count.
    #[error("payload has {actual} bytes, {expected} expected")]
    PayloadLength {
        /// Expected bytes.
        expected: usize,
        /// Given bytes.
        actual: usize,
    },
}

impl RequestError {
    fn code(&self) -> u8 {
        match self {
            Self::IllegalDataValue { .. } => 1,
            Self::UnsupportedArea { .. } => 2,
            Self::PayloadLength { .. } => 3,
        }
    }
}

/// A Result type with [`ModbusError`].
pub type ModbusResult<T> = Result<T, ModbusError>;

// =============================================================================
// Conversion to PlcError
// =============================================================================

impl From<ModbusError> for PlcError {
    fn from(error: ModbusError) -> Self {
        match error {
            ModbusError::Connection(ConnectionError::NotConnected) => PlcError::NotConnected,
            ModbusError::Connection(e) => {
                let message = e.to_string();
                PlcError::communication_with(message, e)
            }
            ModbusError::Protocol(ProtocolError::Exception { exception_code, .. }) => PlcError::device(
                DeviceFamily::Modbus,
                u32::from(exception_code),
                exception_name(exception_code),
            ),
            ModbusError::Protocol(e) => PlcError::communication(e.to_string()),
            ModbusError::Request(RequestError::IllegalDataValue { message }) => PlcError::device(
                DeviceFamily::Modbus,
                u32::from(ILLEGAL_DATA_VALUE),
                format!("{}: {message}", exception_name(ILLEGAL_DATA_VALUE)),
            ),
            ModbusError::Request(RequestError::UnsupportedArea { area }) => PlcError::unsupported_area(area),
            ModbusError::Request(e @ RequestError::PayloadLength { .. }) => {
                PlcError::invalid_value("Modbus write", e.to_string())
            }
            ModbusError::Configuration(message) => PlcError::configuration(message),
        }
    }
}

/// Display helper for unit ids in log fields.
pub(crate) struct UnitId(pub u8);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            write!(f, "0 (broadcast)")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
