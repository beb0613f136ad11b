// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! String node identifiers.
//!
//! Variable tables name nodes as `<namespace>;<identifier>`, for example
//! `2;Line1.Temperature`. The standard `ns=2;s=Line1.Temperature` notation
//! is accepted as well.

use std::fmt;
use std::str::FromStr;

use crate::error::OpcUaError;

/// A string node id in a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// Namespace index (0 = OPC-UA standard namespace).
    pub namespace: u16,

    /// String identifier inside the namespace.
    pub identifier: String,
}

impl NodeId {
    /// Creates a node id.
    ///
    /// # Examples
    ///
    /// ```
    /// use fieldlink_opcua::NodeId;
    ///
    /// let node = NodeId::new(2, "Line1.Temperature");
    /// assert_eq!(node.to_string(), "ns=2;s=Line1.Temperature");
    /// ```
    pub fn new(namespace: u16, identifier: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: identifier.into(),
        }
    }

    /// Parses `<namespace>;<identifier>`.
    ///
    /// # Errors
    ///
    /// [`OpcUaError::InvalidNodeId`] when the separator is missing, the
    /// namespace is not a `u16` or the identifier is empty.
    pub fn parse(input: &str) -> Result<Self, OpcUaError> {
        let (namespace, identifier) = input
            .trim()
            .split_once(';')
            .ok_or_else(|| OpcUaError::invalid_node_id(input, "expected '<namespace>;<identifier>'"))?;

        let namespace = namespace.trim();
        let namespace = namespace.strip_prefix("ns=").unwrap_or(namespace);
        let namespace = namespace
            .parse::<u16>()
            .map_err(|_| OpcUaError::invalid_node_id(input, format!("bad namespace index '{namespace}'")))?;

        let identifier = identifier.strip_prefix("s=").unwrap_or(identifier);
        if identifier.is_empty() {
            return Err(OpcUaError::invalid_node_id(input, "empty identifier"));
        }
        Ok(Self::new(namespace, identifier))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns={};s={}", self.namespace, self.identifier)
    }
}

impl FromStr for NodeId {
    type Err = OpcUaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let node = NodeId::parse("2;Line1.Temperature").unwrap();
        assert_eq!(node, NodeId::new(2, "Line1.Temperature"));

        // identifiers may contain the separator themselves
        let node: NodeId = "3;a;b".parse().unwrap();
        assert_eq!(node.identifier, "a;b");

        let node = NodeId::parse("ns=4;s=Tank.Level").unwrap();
        assert_eq!(node, NodeId::new(4, "Tank.Level"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in ["Temperature", "x;Temperature", "70000;T", "2;", ""] {
            assert!(
                matches!(NodeId::parse(input), Err(OpcUaError::InvalidNodeId { .. })),
                "{input} should be rejected"
            );
        }
    }
}
