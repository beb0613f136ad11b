// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC-UA device client.
//!
//! OPC-UA addresses nodes, not registers: variable maps hold node ids
//! (`<namespace>;<identifier>`) and are read in one batched request. The
//! register and area operations of [`DeviceClient`] and every write return
//! [`PlcError::NotImplemented`].

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Instant;

use async_trait::async_trait;
use fieldlink_core::{
    AccessGuard, Address, ClientSettings, ClientStats, ConnectionState, DataType, DeviceClient, DeviceFamily,
    PlcError, PlcResult, ReadWindow, StateCell, Value, VariableRegistry, VariableValues,
};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::config::OpcUaConfig;
use crate::error::{OpcUaError, OpcUaResult};
use crate::node::NodeId;
use crate::transport::{OpcUaTransport, ReadResult};

struct UaSession<T> {
    transport: T,
    url: String,
    connected: bool,
}

type NodeMap = BTreeMap<String, NodeId>;

/// Client for one OPC-UA server.
///
/// ```rust,ignore
/// use fieldlink_core::DeviceClient;
/// use fieldlink_opcua::OpcUaClient;
///
/// let client = OpcUaClient::new("opc.tcp://10.0.0.5:4840", None)?;
/// client.connect().await?;
/// let level = client.read_node(2, "Tank.Level").await?;
/// ```
pub struct OpcUaClient<T: OpcUaTransport> {
    config: OpcUaConfig,
    settings: ClientSettings,
    guard: AccessGuard<UaSession<T>>,
    state: StateCell,
    stats: ClientStats,
    variables: VariableRegistry,
    nodes: RwLock<HashMap<Option<String>, NodeMap>>,
}

#[cfg(feature = "real-transport")]
impl OpcUaClient<crate::RealOpcUaTransport> {
    /// Creates a disconnected client for `url`; `timeout` defaults to 4s.
    pub fn new(url: impl Into<String>, timeout: Option<std::time::Duration>) -> PlcResult<Self> {
        let mut config = OpcUaConfig::new(url);
        if let Some(timeout) = timeout {
            config.timeout = timeout;
        }
        Self::with_transport(config, crate::RealOpcUaTransport::new())
    }
}

impl<T: OpcUaTransport> OpcUaClient<T> {
    /// Creates a disconnected client on `transport`.
    pub fn with_transport(config: OpcUaConfig, transport: T) -> PlcResult<Self> {
        config.validate()?;
        let settings = config.to_settings()?;
        let session = UaSession {
            transport,
            url: config.url.clone(),
            connected: false,
        };

        Ok(Self {
            guard: AccessGuard::new(session, settings.access_timeout, settings.pacing),
            config,
            settings,
            state: StateCell::new(),
            stats: ClientStats::new(),
            variables: VariableRegistry::new(),
            nodes: RwLock::new(HashMap::new()),
        })
    }

    /// Client configuration.
    pub fn config(&self) -> &OpcUaConfig {
        &self.config
    }

    /// Request statistics.
    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    async fn timed<R>(&self, request: impl Future<Output = OpcUaResult<R>>) -> OpcUaResult<R> {
        tokio::time::timeout(self.config.timeout, request)
            .await
            .map_err(|_| OpcUaError::Timeout(self.config.timeout))?
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    /// Connects, optionally to another server.
    ///
    /// With an open session on the same URL this is a no-op; a session on
    /// another URL is closed first.
    pub async fn connect_to(&self, url: Option<&str>) -> PlcResult<()> {
        let mut session = self.guard.acquire().await?;

        let same_url = url.map_or(true, |u| u == session.url);
        if same_url && session.connected && session.transport.is_connected() {
            debug!(url = %session.url, "OPC-UA session still open");
            self.state.set(ConnectionState::Connected);
            return Ok(());
        }

        if let Some(url) = url {
            session.url = url.to_string();
        }
        let result = self.open(&mut session).await.map_err(|e| {
            e.log("connect");
            PlcError::from(e)
        });
        session.finish(result).await
    }

    async fn open(&self, session: &mut UaSession<T>) -> OpcUaResult<()> {
        if session.connected {
            if let Err(e) = session.transport.disconnect().await {
                debug!(error = %e, "Disconnect before reconnect failed");
            }
            session.connected = false;
        }
        self.state.set(ConnectionState::Connecting);

        let url = session.url.clone();
        let timeout = self.config.timeout;
        if let Err(e) = self.timed(session.transport.connect(&url, timeout)).await {
            self.state.set(ConnectionState::Error);
            return Err(e);
        }

        session.connected = true;
        self.state.set(ConnectionState::Connected);
        self.stats.record_connection();
        info!(
            url = %session.url,
            timeout_ms = timeout.as_millis() as u64,
            transport = %session.transport.display_name(),
            "Connected to OPC-UA server"
        );
        Ok(())
    }

    async fn ensure_connected(&self, session: &mut UaSession<T>) -> OpcUaResult<()> {
        if session.connected {
            return Ok(());
        }
        if self.settings.auto_connect {
            return self.open(session).await;
        }
        Err(OpcUaError::NotConnected)
    }

    async fn fail(&self, session: &mut UaSession<T>, error: OpcUaError, context: &str) -> PlcError {
        self.stats.record_error();
        error.log(context);
        if error.is_communication() && self.settings.disconnect_on_error {
            if let Err(e) = session.transport.disconnect().await {
                debug!(error = %e, "Disconnect after communication error failed");
            }
            session.connected = false;
            self.state.set(ConnectionState::Disconnected);
            warn!(url = %session.url, "Dropped OPC-UA session after communication error");
        }
        error.into()
    }

    /// One leased batch read.
    async fn read_batch(&self, nodes: &[NodeId], context: &str) -> PlcResult<Vec<ReadResult>> {
        let mut session = self.guard.acquire().await?;
        let started = Instant::now();

        let result = match self.ensure_connected(&mut session).await {
            Ok(()) => {
                trace!(count = nodes.len(), "OPC-UA read");
                self.timed(session.transport.read_values(nodes)).await
            }
            Err(e) => Err(e),
        };
        let result = match result {
            Ok(results) if results.len() == nodes.len() => {
                self.stats.record_read(0, started.elapsed());
                Ok(results)
            }
            Ok(results) => {
                let error = OpcUaError::transport(format!(
                    "{} results for {} nodes",
                    results.len(),
                    nodes.len()
                ));
                Err(self.fail(&mut session, error, context).await)
            }
            Err(e) => Err(self.fail(&mut session, e, context).await),
        };
        session.finish(result).await
    }

    // -------------------------------------------------------------------------
    // Node access
    // -------------------------------------------------------------------------

    /// Reads the node `identifier` in namespace `namespace`.
    ///
    /// # Errors
    ///
    /// - [`PlcError::Client`] for an empty identifier
    /// - [`PlcError::Device`] with the status code when the server reports a bad status
    /// - [`PlcError::Communication`] when the request fails
    pub async fn read_node(&self, namespace: u16, identifier: &str) -> PlcResult<Option<Value>> {
        if identifier.is_empty() {
            return Err(OpcUaError::request("no node identifier specified").into());
        }
        self.read_node_id(&NodeId::new(namespace, identifier)).await
    }

    /// Reads one node.
    pub async fn read_node_id(&self, node: &NodeId) -> PlcResult<Option<Value>> {
        let result = self
            .read_batch(std::slice::from_ref(node), "read node")
            .await?
            .pop()
            .unwrap_or_else(|| ReadResult::failure(node.clone(), crate::error::BAD_NODE_ID_UNKNOWN));

        if result.is_bad() {
            let error = OpcUaError::status(node, result.status_code);
            error.log("read node");
            return Err(error.into());
        }
        Ok(result.value.and_then(|v| v.into_value()))
    }

    /// Reads several nodes in one request. Nodes with a bad status read as `None`.
    pub async fn read_nodes(&self, nodes: &[NodeId]) -> PlcResult<Vec<Option<Value>>> {
        if nodes.is_empty() {
            return Ok(Vec::new());
        }
        let results = self.read_batch(nodes, "read nodes").await?;
        Ok(results.into_iter().map(node_value).collect())
    }

    /// Parses `table` (name -> `<namespace>;<identifier>`) and merges it into
    /// the map `map_name`. Malformed entries are skipped with a warning.
    ///
    /// Returns the number of mapped entries.
    pub fn map_nodes(&self, table: &BTreeMap<String, String>, map_name: Option<&str>) -> usize {
        let parsed: Vec<(String, NodeId)> = table
            .iter()
            .filter_map(|(name, text)| match NodeId::parse(text) {
                Ok(node) => Some((name.clone(), node)),
                Err(e) => {
                    warn!(variable = %name, error = %e, "Skipping OPC-UA variable");
                    None
                }
            })
            .collect();
        let mapped = parsed.len();

        let mut maps = self.nodes.write();
        let map = maps.entry(map_name.map(str::to_string)).or_default();
        map.extend(parsed);
        debug!(
            map = map_name.unwrap_or("default"),
            variables = map.len(),
            "OPC-UA node map updated"
        );
        mapped
    }

    /// Returns a copy of the node map `map_name`.
    pub fn node_map(&self, map_name: Option<&str>) -> PlcResult<BTreeMap<String, NodeId>> {
        self.nodes
            .read()
            .get(&map_name.map(str::to_string))
            .cloned()
            .ok_or_else(|| PlcError::unknown_map(map_name.unwrap_or("default")))
    }
}

fn node_value(result: ReadResult) -> Option<Value> {
    if result.is_bad() {
        debug!(node = %result.node, status = result.status_code, "Bad node status");
        return None;
    }
    result.value.and_then(|v| v.into_value())
}

fn unsupported(operation: &str) -> PlcError {
    PlcError::not_implemented(format!("OPC-UA {operation}"))
}

#[async_trait]
impl<T: OpcUaTransport> DeviceClient for OpcUaClient<T> {
    fn family(&self) -> DeviceFamily {
        DeviceFamily::OpcUa
    }

    fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Register-style maps are not used by this client; see
    /// [`map_nodes`](OpcUaClient::map_nodes).
    fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    async fn connect(&self) -> PlcResult<()> {
        self.connect_to(None).await
    }

    async fn disconnect(&self) -> PlcResult<()> {
        let mut session = self.guard.acquire().await?;
        if session.connected {
            if let Err(e) = session.transport.disconnect().await {
                debug!(error = %e, "OPC-UA disconnect failed");
            }
            session.connected = false;
            info!(url = %session.url, "Disconnected from OPC-UA server");
        }
        self.state.set(ConnectionState::Disconnected);
        Ok(())
    }

    async fn read_registers(&self, _position: u32, _count: u32) -> PlcResult<Vec<u8>> {
        Err(unsupported("read_registers"))
    }

    async fn write_registers(&self, _data: &[u8], _position: u32, _count: u32) -> PlcResult<()> {
        Err(unsupported("write_registers"))
    }

    async fn read_area(&self, _area: &str, _position: u32, _count: u32, _extra_id: Option<u32>) -> PlcResult<Vec<u8>> {
        Err(unsupported("read_area"))
    }

    async fn write_area(
        &self,
        _data: &[u8],
        _area: &str,
        _position: u32,
        _count: u32,
        _extra_id: Option<u32>,
    ) -> PlcResult<()> {
        Err(unsupported("write_area"))
    }

    async fn write_bit(&self, _address: &Address, _on: bool) -> PlcResult<()> {
        Err(unsupported("write_bit"))
    }

    async fn read_window(&self, _area: &str, _window: &ReadWindow, _offset: u32) -> PlcResult<Vec<u8>> {
        Err(unsupported("read_window"))
    }

    fn map_variables(&self, table: &BTreeMap<String, String>, map_name: Option<&str>) -> PlcResult<()> {
        self.map_nodes(table, map_name);
        Ok(())
    }

    /// Reads a node map in one request. `offset` does not apply to nodes.
    async fn read_variable_map(&self, map_name: Option<&str>, _offset: u32) -> PlcResult<VariableValues> {
        let map = self.node_map(map_name)?;
        let (names, nodes): (Vec<String>, Vec<NodeId>) = map.into_iter().unzip();
        let values = self.read_nodes(&nodes).await?;
        Ok(names.into_iter().zip(values).collect())
    }

    /// Reads a node given as `<namespace>;<identifier>`.
    async fn read_value(&self, address: &str) -> PlcResult<Option<Value>> {
        let node = NodeId::parse(address)?;
        self.read_node_id(&node).await
    }

    async fn read_address(&self, _address: &Address) -> PlcResult<Option<Value>> {
        Err(unsupported("register addresses"))
    }

    async fn write_value(&self, _value: &Value, _address: &str) -> PlcResult<()> {
        Err(unsupported("write"))
    }

    async fn write_address(&self, _value: &Value, _address: &Address) -> PlcResult<()> {
        Err(unsupported("write"))
    }

    async fn read_array(&self, _position: u32, _data_type: DataType, _n: u32) -> PlcResult<Vec<Option<Value>>> {
        Err(unsupported("read_array"))
    }

    async fn read_values(&self, _members: &BTreeMap<u32, DataType>) -> PlcResult<BTreeMap<u32, Option<Value>>> {
        Err(unsupported("read_values"))
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for OpcUaClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpcUaClient")
            .field("url", &self.config.url)
            .field("timeout", &self.config.timeout)
            .field("state", &self.state.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOpcUaTransport;

    fn client() -> OpcUaClient<MockOpcUaTransport> {
        OpcUaClient::with_transport(OpcUaConfig::new("opc.tcp://10.0.0.5:4840"), MockOpcUaTransport::new())
            .unwrap()
    }

    #[test]
    fn test_map_nodes_skips_malformed() {
        let client = client();
        let mut table = BTreeMap::new();
        table.insert("level".to_string(), "2;Tank.Level".to_string());
        table.insert("broken".to_string(), "Tank.Level".to_string());
        assert_eq!(client.map_nodes(&table, None), 1);

        let map = client.node_map(None).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["level"], NodeId::new(2, "Tank.Level"));
        assert!(matches!(client.node_map(Some("other")), Err(PlcError::UnknownMap { .. })));
    }

    #[test]
    fn test_map_nodes_merges() {
        let client = client();
        let mut first = BTreeMap::new();
        first.insert("a".to_string(), "2;A".to_string());
        let mut second = BTreeMap::new();
        second.insert("b".to_string(), "2;B".to_string());
        client.map_nodes(&first, Some("line"));
        client.map_nodes(&second, Some("line"));
        assert_eq!(client.node_map(Some("line")).unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_bad_url() {
        let result = OpcUaClient::with_transport(OpcUaConfig::new("10.0.0.5"), MockOpcUaTransport::new());
        assert!(matches!(result, Err(PlcError::Configuration { .. })));
    }
}
