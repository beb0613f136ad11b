// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory OPC-UA server for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{OpcUaError, OpcUaResult, BAD_NODE_ID_UNKNOWN};
use crate::node::NodeId;
use crate::transport::{OpcUaTransport, OpcUaValue, ReadResult};

#[derive(Debug, Default)]
struct MockServer {
    nodes: HashMap<NodeId, ReadResult>,
    endpoint: Option<String>,
    connects: u32,
    unreachable: bool,
    fail_next: Option<String>,
    batches: Vec<Vec<NodeId>>,
}

/// [`OpcUaTransport`] over an in-memory address space.
///
/// Clones share the same server, so a test keeps one clone to seed nodes
/// and inspect requests while the client owns another. Unknown nodes read
/// as `BadNodeIdUnknown`.
///
/// ```
/// use fieldlink_opcua::{MockOpcUaTransport, NodeId, OpcUaValue};
///
/// let server = MockOpcUaTransport::new();
/// server.set_value(NodeId::new(2, "Tank.Level"), OpcUaValue::Double(3.5));
/// assert_eq!(server.connects(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockOpcUaTransport {
    server: Arc<Mutex<MockServer>>,
}

impl MockOpcUaTransport {
    /// Creates a reachable server with no nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a node to a good value.
    pub fn set_value(&self, node: NodeId, value: OpcUaValue) {
        let result = ReadResult::success(node.clone(), value);
        self.server.lock().nodes.insert(node, result);
    }

    /// Makes a node read with `status_code` and no value.
    pub fn set_status(&self, node: NodeId, status_code: u32) {
        let result = ReadResult::failure(node.clone(), status_code);
        self.server.lock().nodes.insert(node, result);
    }

    /// Makes connection attempts fail.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.server.lock().unreachable = unreachable;
    }

    /// Fails the next read request at transport level.
    pub fn fail_next_read(&self, message: impl Into<String>) {
        self.server.lock().fail_next = Some(message.into());
    }

    /// Closes the session from the server side.
    pub fn drop_session(&self) {
        self.server.lock().endpoint = None;
    }

    /// Successful connects so far.
    pub fn connects(&self) -> u32 {
        self.server.lock().connects
    }

    /// Endpoint of the open session.
    pub fn endpoint(&self) -> Option<String> {
        self.server.lock().endpoint.clone()
    }

    /// Node lists of the read requests received so far.
    pub fn batches(&self) -> Vec<Vec<NodeId>> {
        self.server.lock().batches.clone()
    }
}

#[async_trait]
impl OpcUaTransport for MockOpcUaTransport {
    async fn connect(&mut self, endpoint: &str, _timeout: Duration) -> OpcUaResult<()> {
        let mut server = self.server.lock();
        if server.unreachable {
            return Err(OpcUaError::connection(endpoint, "connection refused"));
        }
        server.endpoint = Some(endpoint.to_string());
        server.connects += 1;
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        self.server.lock().endpoint = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.server.lock().endpoint.is_some()
    }

    async fn read_values(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        let mut server = self.server.lock();
        server.batches.push(nodes.to_vec());
        if let Some(message) = server.fail_next.take() {
            return Err(OpcUaError::transport(message));
        }
        if server.endpoint.is_none() {
            return Err(OpcUaError::NotConnected);
        }

        Ok(nodes
            .iter()
            .map(|node| {
                server
                    .nodes
                    .get(node)
                    .cloned()
                    .unwrap_or_else(|| ReadResult::failure(node.clone(), BAD_NODE_ID_UNKNOWN))
            })
            .collect())
    }

    fn display_name(&self) -> String {
        "mock".to_string()
    }
}
