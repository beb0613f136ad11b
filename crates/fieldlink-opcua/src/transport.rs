// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC-UA transport abstraction.
//!
//! [`OpcUaClient`](crate::OpcUaClient) only needs a session that can be
//! opened, closed and asked for node values. Keeping that surface behind
//! [`OpcUaTransport`] lets tests run against
//! [`MockOpcUaTransport`](crate::MockOpcUaTransport) and keeps the `opcua`
//! stack optional.

use std::fmt;
use std::slice;
use std::time::Duration;

use async_trait::async_trait;
use fieldlink_core::Value;

use crate::error::{OpcUaResult, BAD_NODE_ID_UNKNOWN};
use crate::node::NodeId;

// =============================================================================
// ReadResult
// =============================================================================

/// Result of reading one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    /// The node that was read.
    pub node: NodeId,

    /// The value, when the server sent one.
    pub value: Option<OpcUaValue>,

    /// Status code of the read.
    pub status_code: u32,
}

impl ReadResult {
    /// Creates a good result.
    pub fn success(node: NodeId, value: OpcUaValue) -> Self {
        Self {
            node,
            value: Some(value),
            status_code: 0,
        }
    }

    /// Creates a result without a value.
    pub fn failure(node: NodeId, status_code: u32) -> Self {
        Self {
            node,
            value: None,
            status_code,
        }
    }

    /// Returns `true` if the status is good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code & 0xC000_0000 == 0
    }

    /// Returns `true` if the status is uncertain.
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.status_code & 0x4000_0000 != 0 && self.status_code & 0x8000_0000 == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code & 0x8000_0000 != 0
    }
}

// =============================================================================
// OpcUaValue
// =============================================================================

/// Node value as delivered by a transport.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpcUaValue {
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(chrono::DateTime<chrono::Utc>),
    /// Empty variant.
    #[default]
    Null,
}

impl OpcUaValue {
    /// Converts to a fieldlink value; `Null` has none.
    pub fn into_value(self) -> Option<Value> {
        let value = match self {
            Self::Boolean(v) => Value::Bool(v),
            Self::SByte(v) => Value::Int16(i16::from(v)),
            Self::Byte(v) => Value::Byte(v),
            Self::Int16(v) => Value::Int16(v),
            Self::UInt16(v) => Value::UInt16(v),
            Self::Int32(v) => Value::Int32(v),
            Self::UInt32(v) => Value::UInt32(v),
            Self::Int64(v) => Value::Int64(v),
            Self::UInt64(v) => Value::UInt64(v),
            Self::Float(v) => Value::Float32(v),
            Self::Double(v) => Value::Float64(v),
            Self::String(v) => Value::String(v),
            Self::DateTime(v) => Value::String(v.to_rfc3339()),
            Self::Null => return None,
        };
        Some(value)
    }

    /// Returns `true` for `Null`.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for OpcUaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::SByte(v) => write!(f, "{v}"),
            Self::Byte(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// OpcUaTransport
// =============================================================================

/// Session backend of an [`OpcUaClient`](crate::OpcUaClient).
///
/// The client serializes all calls, so implementations never see two
/// requests at once.
#[async_trait]
pub trait OpcUaTransport: Send + Sync + 'static {
    /// Opens a session on `endpoint`. Each request waits at most `timeout`.
    async fn connect(&mut self, endpoint: &str, timeout: Duration) -> OpcUaResult<()>;

    /// Closes the session, if any.
    async fn disconnect(&mut self) -> OpcUaResult<()>;

    /// Returns `true` while a session is open.
    fn is_connected(&self) -> bool;

    /// Reads the value attribute of `nodes` in one request.
    ///
    /// The result has one entry per node, in order.
    async fn read_values(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>>;

    /// Reads the value attribute of one node.
    async fn read_value(&self, node: &NodeId) -> OpcUaResult<ReadResult> {
        let mut results = self.read_values(slice::from_ref(node)).await?;
        Ok(results
            .pop()
            .unwrap_or_else(|| ReadResult::failure(node.clone(), BAD_NODE_ID_UNKNOWN)))
    }

    /// Name for logging.
    fn display_name(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classes() {
        let node = NodeId::new(2, "Temperature");
        assert!(ReadResult::success(node.clone(), OpcUaValue::Double(21.5)).is_good());

        let bad = ReadResult::failure(node.clone(), BAD_NODE_ID_UNKNOWN);
        assert!(bad.is_bad());
        assert!(!bad.is_good());

        let uncertain = ReadResult {
            status_code: 0x4000_0000,
            ..ReadResult::success(node, OpcUaValue::Int32(1))
        };
        assert!(uncertain.is_uncertain());
        assert!(!uncertain.is_good());
    }

    #[test]
    fn test_into_value() {
        assert_eq!(OpcUaValue::Double(2.5).into_value(), Some(Value::Float64(2.5)));
        assert_eq!(OpcUaValue::SByte(-3).into_value(), Some(Value::Int16(-3)));
        assert_eq!(
            OpcUaValue::String("RUN".into()).into_value(),
            Some(Value::String("RUN".into()))
        );
        assert_eq!(OpcUaValue::Null.into_value(), None);
    }
}
