// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC-UA error types.
//!
//! ```text
//! OpcUaError
//! ├── Connection / NotConnected / Timeout / Transport  - session failures
//! ├── Status                                           - bad status code from the server
//! ├── Request / InvalidNodeId                          - rejected before reaching the server
//! └── Configuration                                    - invalid client settings
//! ```
//!
//! Status codes become [`PlcError::Device`] with the numeric code; session
//! failures become [`PlcError::Communication`].

use std::time::Duration;

use fieldlink_core::{DeviceFamily, ErrorCode, ErrorSeverity, PlcError};
use thiserror::Error;
use tracing::Level;

/// `BadTimeout`
pub const BAD_TIMEOUT: u32 = 0x800A_0000;
/// `BadNodeIdInvalid`
pub const BAD_NODE_ID_INVALID: u32 = 0x8033_0000;
/// `BadNodeIdUnknown`
pub const BAD_NODE_ID_UNKNOWN: u32 = 0x8034_0000;
/// `BadNotReadable`
pub const BAD_NOT_READABLE: u32 = 0x803A_0000;

/// Errors of the OPC-UA client.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// The session could not be opened.
    #[error("cannot connect to OPC-UA server {url}: {message}")]
    Connection {
        /// Endpoint URL.
        url: String,
        /// Failure reason.
        message: String,
    },

    /// No open session.
    #[error("not connected to an OPC-UA server")]
    NotConnected,

    /// The server did not answer in time.
    #[error("OPC-UA request timed out after {0:?}")]
    Timeout(Duration),

    /// The request failed below the service level.
    #[error("OPC-UA request failed: {0}")]
    Transport(String),

    /// The server answered with a bad status code.
    #[error("OPC-UA status {code:#010X} ({}) for node {node}", status_name(*.code))]
    Status {
        /// Node that was accessed.
        node: String,
        /// Status code.
        code: u32,
    },

    /// The request was rejected locally.
    #[error("OPC-UA error: {0}")]
    Request(String),

    /// A node id string does not parse.
    #[error("invalid node id '{input}': {message}")]
    InvalidNodeId {
        /// Offending input.
        input: String,
        /// What was wrong.
        message: String,
    },

    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl OpcUaError {
    /// Creates a connection error.
    pub fn connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a bad-status error.
    pub fn status(node: impl ToString, code: u32) -> Self {
        Self::Status {
            node: node.to_string(),
            code,
        }
    }

    /// Creates a locally rejected request.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Creates an invalid node id error.
    pub fn invalid_node_id(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Status code, if the server reported one.
    pub fn status_code(&self) -> Option<u32> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` for session failures.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout(_) | Self::Transport(_))
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { code, .. } => *code == BAD_TIMEOUT,
            other => other.is_communication(),
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection { .. } | Self::Timeout(_) | Self::Transport(_) | Self::NotConnected => {
                ErrorSeverity::Warning
            }
            Self::Status { .. } | Self::Request(_) | Self::InvalidNodeId { .. } => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection { .. } | Self::NotConnected | Self::Timeout(_) | Self::Transport(_) => "connection",
            Self::Status { .. } => "status",
            Self::Request(_) | Self::InvalidNodeId { .. } => "request",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a structured error code (`UA-ccnn`).
    pub fn error_code(&self) -> ErrorCode {
        let (category, code) = match self {
            Self::Connection { .. } => (1, 1),
            Self::NotConnected => (1, 2),
            Self::Timeout(_) => (1, 3),
            Self::Transport(_) => (1, 4),
            Self::Status { .. } => (2, 1),
            Self::Request(_) => (3, 1),
            Self::InvalidNodeId { .. } => (3, 2),
            Self::Configuration(_) => (4, 1),
        };
        ErrorCode::new("UA", category, code)
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
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(error_code = %code, context = context, "{self}"),
        }
    }
}

/// Symbolic name of the status codes the client reports most often.
pub fn status_name(code: u32) -> &'static str {
    match code {
        BAD_TIMEOUT => "BadTimeout",
        0x8005_0000 => "BadCommunicationError",
        0x801F_0000 => "BadUserAccessDenied",
        BAD_NODE_ID_INVALID => "BadNodeIdInvalid",
        BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
        BAD_NOT_READABLE => "BadNotReadable",
        0x8074_0000 => "BadTypeMismatch",
        0x808A_0000 => "BadNotConnected",
        c if c & 0x8000_0000 != 0 => "Bad",
        c if c & 0x4000_0000 != 0 => "Uncertain",
        _ => "Good",
    }
}

/// A Result type with [`OpcUaError`].
pub type OpcUaResult<T> = Result<T, OpcUaError>;

impl From<OpcUaError> for PlcError {
    fn from(error: OpcUaError) -> Self {
        match error {
            OpcUaError::Status { code, .. } => PlcError::device(DeviceFamily::OpcUa, code, error.to_string()),
            OpcUaError::NotConnected => PlcError::NotConnected,
            OpcUaError::Connection { .. } | OpcUaError::Timeout(_) | OpcUaError::Transport(_) => {
                PlcError::communication(error.to_string())
            }
            OpcUaError::Request(message) => PlcError::client(message),
            OpcUaError::InvalidNodeId { input, message } => PlcError::invalid_address(input, message),
            OpcUaError::Configuration(message) => PlcError::configuration(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_maps_to_device_error() {
        let error = OpcUaError::status("ns=2;s=Missing", BAD_NODE_ID_UNKNOWN);
        assert_eq!(
            error.to_string(),
            "OPC-UA status 0x80340000 (BadNodeIdUnknown) for node ns=2;s=Missing"
        );
        assert_eq!(error.error_code().to_string(), "UA-0201");

        let plc: PlcError = error.into();
        assert_eq!(plc.device_code(), Some(BAD_NODE_ID_UNKNOWN));
    }

    #[test]
    fn test_classification() {
        assert!(OpcUaError::transport("socket closed").is_communication());
        assert!(OpcUaError::Timeout(Duration::from_secs(4)).is_retryable());
        assert!(!OpcUaError::request("no node identifier specified").is_communication());

        let plc: PlcError = OpcUaError::connection("opc.tcp://10.0.0.5:4840", "refused").into();
        assert!(plc.is_communication());
        assert!(matches!(PlcError::from(OpcUaError::NotConnected), PlcError::NotConnected));
        assert!(matches!(
            PlcError::from(OpcUaError::request("no node identifier specified")),
            PlcError::Client { .. }
        ));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_name(BAD_TIMEOUT), "BadTimeout");
        assert_eq!(status_name(0x8099_0000), "Bad");
        assert_eq!(status_name(0x4000_0000), "Uncertain");
    }
}
