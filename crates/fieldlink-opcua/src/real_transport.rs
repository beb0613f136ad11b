// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC-UA transport on the `opcua` crate.
//!
//! Sessions are anonymous with security mode `None`. The `opcua` client is
//! blocking, so every call runs on tokio's blocking pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opcua::client::prelude::*;
use opcua::sync::RwLock;
use tracing::{debug, trace};

use crate::error::{OpcUaError, OpcUaResult};
use crate::node::NodeId;
use crate::transport::{OpcUaTransport, OpcUaValue, ReadResult};

/// Application name announced to servers.
pub const APPLICATION_NAME: &str = "fieldlink";

/// [`OpcUaTransport`] talking to a real server.
pub struct RealOpcUaTransport {
    session: Option<Arc<RwLock<Session>>>,
    endpoint: Option<String>,
}

impl RealOpcUaTransport {
    /// Creates a transport without a session.
    pub fn new() -> Self {
        Self {
            session: None,
            endpoint: None,
        }
    }

    fn node_id(node: &NodeId) -> opcua::types::NodeId {
        opcua::types::NodeId::new(node.namespace, node.identifier.clone())
    }

    fn convert(variant: &Variant) -> OpcUaValue {
        match variant {
            Variant::Empty => OpcUaValue::Null,
            Variant::Boolean(v) => OpcUaValue::Boolean(*v),
            Variant::SByte(v) => OpcUaValue::SByte(*v),
            Variant::Byte(v) => OpcUaValue::Byte(*v),
            Variant::Int16(v) => OpcUaValue::Int16(*v),
            Variant::UInt16(v) => OpcUaValue::UInt16(*v),
            Variant::Int32(v) => OpcUaValue::Int32(*v),
            Variant::UInt32(v) => OpcUaValue::UInt32(*v),
            Variant::Int64(v) => OpcUaValue::Int64(*v),
            Variant::UInt64(v) => OpcUaValue::UInt64(*v),
            Variant::Float(v) => OpcUaValue::Float(*v),
            Variant::Double(v) => OpcUaValue::Double(*v),
            Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
            Variant::DateTime(v) => OpcUaValue::DateTime(v.as_chrono()),
            other => OpcUaValue::String(format!("{other:?}")),
        }
    }

    fn read_result(node: NodeId, data_value: &DataValue) -> ReadResult {
        let status_code = data_value.status.as_ref().map_or(0, |s| s.bits());
        match &data_value.value {
            Some(variant) => ReadResult {
                status_code,
                ..ReadResult::success(node, Self::convert(variant))
            },
            None => ReadResult::failure(node, status_code),
        }
    }
}

impl Default for RealOpcUaTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&mut self, endpoint: &str, timeout: Duration) -> OpcUaResult<()> {
        let url = endpoint.to_string();
        let session = tokio::task::spawn_blocking(move || {
            let mut client = ClientBuilder::new()
                .application_name(APPLICATION_NAME)
                .application_uri(format!("urn:{APPLICATION_NAME}"))
                .create_sample_keypair(true)
                .trust_server_certs(true)
                .session_retry_limit(0)
                .session_timeout(timeout.as_millis() as u32)
                .client()
                .ok_or_else(|| OpcUaError::connection(&url, "invalid client configuration"))?;

            client
                .connect_to_endpoint(
                    (
                        url.as_str(),
                        SecurityPolicy::None.to_str(),
                        MessageSecurityMode::None,
                        UserTokenPolicy::anonymous(),
                    ),
                    IdentityToken::Anonymous,
                )
                .map_err(|status| OpcUaError::connection(&url, status.to_string()))
        })
        .await
        .map_err(|e| OpcUaError::transport(format!("connect task failed: {e}")))??;

        debug!(endpoint = %endpoint, "OPC-UA session created");
        self.session = Some(session);
        self.endpoint = Some(endpoint.to_string());
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        self.endpoint = None;
        if let Some(session) = self.session.take() {
            tokio::task::spawn_blocking(move || session.read().disconnect())
                .await
                .map_err(|e| OpcUaError::transport(format!("disconnect task failed: {e}")))?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.read().is_connected())
    }

    async fn read_values(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        let session = self.session.clone().ok_or(OpcUaError::NotConnected)?;
        let requests: Vec<ReadValueId> = nodes
            .iter()
            .map(|node| ReadValueId {
                node_id: Self::node_id(node),
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            })
            .collect();
        let nodes = nodes.to_vec();
        trace!(count = nodes.len(), "Reading OPC-UA nodes");

        tokio::task::spawn_blocking(move || {
            let values = session
                .read()
                .read(&requests, TimestampsToReturn::Neither, 0.0)
                .map_err(|status| OpcUaError::transport(format!("read service failed: {status}")))?;
            Ok(nodes
                .into_iter()
                .zip(values.iter())
                .map(|(node, data_value)| Self::read_result(node, data_value))
                .collect())
        })
        .await
        .map_err(|e| OpcUaError::transport(format!("read task failed: {e}")))?
    }

    fn display_name(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("opcua({endpoint})"),
            None => "opcua".to_string(),
        }
    }
}
