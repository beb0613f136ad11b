// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! S7 error types.
//!
//! # Native error codes
//!
//! The snap7 client returns one 32-bit code per call:
//!
//! ```text
//!  31            20 19  16 15                              0
//! ┌────────────────┬──────┬─────────────────────────────────┐
//! │   PLC error    │ ISO  │            TCP error            │
//! └────────────────┴──────┴─────────────────────────────────┘
//! ```
//!
//! A PLC field becomes [`S7Error::Plc`] ([`PlcError::Device`]); an ISO or
//! TCP field becomes [`S7Error::Communication`]. A failed call with all
//! fields zero is a generic [`S7Error::Client`] error.

use fieldlink_core::{DeviceFamily, ErrorCode, ErrorSeverity, PlcError};
use thiserror::Error;
use tracing::Level;

/// Mask of the PLC-level error field.
pub const PLC_ERROR_MASK: u32 = 0xFFF0_0000;

/// Mask of the ISO-transport error field.
pub const ISO_ERROR_MASK: u32 = 0x000F_0000;

/// Mask of the TCP error field.
pub const TCP_ERROR_MASK: u32 = 0x0000_FFFF;

/// The main error type for S7 operations.
#[derive(Debug, Error)]
pub enum S7Error {
    /// The PLC rejected the request.
    #[error("PLC error {code:#010x}: {message}")]
    Plc {
        /// Full native code.
        code: u32,
        /// Native error text.
        message: String,
    },

    /// ISO-on-TCP or socket failure.
    #[error("communication error {code:#010x}: {message}")]
    Communication {
        /// Full native code.
        code: u32,
        /// Native error text.
        message: String,
    },

    /// Failure without a classified code.
    #[error("S7 client error: {message}")]
    Client {
        /// What failed.
        message: String,
    },

    /// A DB access without a DB number.
    #[error("no DB number given and none cached")]
    MissingDbNumber,

    /// The area tag is not an S7 area.
    #[error("unknown S7 area '{area}'")]
    UnknownArea {
        /// Area tag.
        area: String,
    },

    /// The payload length does not match the item count.
    #[error("payload has {actual} bytes, {expected} expected")]
    PayloadLength {
        /// Expected bytes.
        expected: usize,
        /// Given bytes.
        actual: usize,
    },

    /// The snap7 library could not be loaded.
    #[error("cannot load snap7 library '{library}': {message}")]
    DriverLoad {
        /// Library path or name.
        library: String,
        /// Loader message.
        message: String,
    },

    /// No connection and auto-connect disabled.
    #[error("PLC is disconnected")]
    NotConnected,

    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl S7Error {
    /// Classifies a native error code.
    pub fn from_code(code: u32, text: impl Into<String>) -> Self {
        let message = text.into();
        if code & PLC_ERROR_MASK != 0 {
            Self::Plc { code, message }
        } else if code & (ISO_ERROR_MASK | TCP_ERROR_MASK) != 0 {
            Self::Communication { code, message }
        } else {
            Self::Client { message }
        }
    }

    /// Creates a generic client error.
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Native code, if this error carries one.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Plc { code, .. } | Self::Communication { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` for transport failures.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication { .. })
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Communication { .. } | Self::NotConnected)
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Communication { .. } | Self::NotConnected => ErrorSeverity::Warning,
            Self::DriverLoad { .. } | Self::Configuration(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Plc { .. } => "plc",
            Self::Communication { .. } | Self::NotConnected => "communication",
            Self::Client { .. } => "client",
            Self::MissingDbNumber | Self::UnknownArea { .. } | Self::PayloadLength { .. } => "request",
            Self::DriverLoad { .. } => "driver",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a structured error code (`S7-ccnn`).
    pub fn error_code(&self) -> ErrorCode {
        let (category, code) = match self {
            Self::Plc { .. } => (1, 1),
            Self::Communication { .. } => (2, 1),
            Self::NotConnected => (2, 2),
            Self::Client { .. } => (3, 1),
            Self::MissingDbNumber => (4, 1),
            Self::UnknownArea { .. } => (4, 2),
            Self::PayloadLength { .. } => (4, 3),
            Self::DriverLoad { .. } => (5, 1),
            Self::Configuration(_) => (6, 1),
        };
        ErrorCode::new("S7", category, code)
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();
        let native = self.code().unwrap_or(0);
        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                native_code = native,
                category = self.category(),
                context = context,
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                native_code = native,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(error_code = %code, context = context, "{self}"),
        }
    }
}

/// A Result type with [`S7Error`].
pub type S7Result<T> = Result<T, S7Error>;

impl From<S7Error> for PlcError {
    fn from(error: S7Error) -> Self {
        match error {
            S7Error::Plc { code, message } => PlcError::device(DeviceFamily::Siemens, code, message),
            S7Error::Communication { code, message } => {
                PlcError::communication(format!("{message} (code {code:#010x})"))
            }
            S7Error::Client { message } => PlcError::client(message),
            S7Error::MissingDbNumber => PlcError::MissingDbNumber,
            S7Error::UnknownArea { area } => PlcError::unsupported_area(area),
            e @ S7Error::PayloadLength { .. } => PlcError::invalid_value("S7 write", e.to_string()),
            S7Error::DriverLoad { library, message } => PlcError::driver_load(library, message),
            S7Error::NotConnected => PlcError::NotConnected,
            S7Error::Configuration(message) => PlcError::configuration(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_split() {
        assert!(matches!(S7Error::from_code(0x0020_0000, "x"), S7Error::Plc { .. }));
        assert!(matches!(S7Error::from_code(0x0001_0000, "x"), S7Error::Communication { .. }));
        assert!(matches!(S7Error::from_code(0x0000_2751, "x"), S7Error::Communication { .. }));
        assert!(matches!(S7Error::from_code(0, "x"), S7Error::Client { .. }));
        // PLC field wins over transport fields
        assert!(matches!(S7Error::from_code(0x0090_0001, "x"), S7Error::Plc { .. }));
    }

    #[test]
    fn test_into_plc_error() {
        let plc: PlcError = S7Error::from_code(0x0070_0000, "Address out of range").into();
        assert_eq!(plc.device_code(), Some(0x0070_0000));

        let plc: PlcError = S7Error::from_code(0x0000_2751, "TCP connection reset").into();
        assert!(plc.is_communication());

        let plc: PlcError = S7Error::MissingDbNumber.into();
        assert!(matches!(plc, PlcError::MissingDbNumber));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(S7Error::MissingDbNumber.error_code().to_string(), "S7-0401");
        assert!(S7Error::from_code(0x0001_0000, "").is_retryable());
        assert!(!S7Error::from_code(0x0010_0000, "").is_retryable());
    }
}
