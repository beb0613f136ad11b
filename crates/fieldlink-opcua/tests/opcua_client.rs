// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `OpcUaClient` against the in-memory transport.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use fieldlink_core::{ConnectionState, DeviceClient, PlcError, Value};
use fieldlink_opcua::error::{BAD_NODE_ID_UNKNOWN, BAD_NOT_READABLE};
use fieldlink_opcua::{
    MockOpcUaTransport, NodeId, OpcUaClient, OpcUaConfig, OpcUaResult, OpcUaTransport, OpcUaValue, ReadResult,
};

const URL: &str = "opc.tcp://10.0.0.5:4840";

fn config() -> OpcUaConfig {
    OpcUaConfig::new(URL).with_pacing(Duration::ZERO)
}

fn client_with(config: OpcUaConfig) -> (OpcUaClient<MockOpcUaTransport>, MockOpcUaTransport) {
    let server = MockOpcUaTransport::new();
    server.set_value(NodeId::new(2, "Tank.Level"), OpcUaValue::Double(3.5));
    server.set_value(NodeId::new(2, "Pump.Running"), OpcUaValue::Boolean(true));
    server.set_value(NodeId::new(3, "Line.Batch"), OpcUaValue::String("B-117".into()));
    let client = OpcUaClient::with_transport(config, server.clone()).unwrap();
    (client, server)
}

async fn connected() -> (OpcUaClient<MockOpcUaTransport>, MockOpcUaTransport) {
    let (client, server) = client_with(config());
    client.connect().await.unwrap();
    (client, server)
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_read_node() {
    let (client, _server) = connected().await;
    assert_eq!(client.read_node(2, "Tank.Level").await.unwrap(), Some(Value::Float64(3.5)));
    assert_eq!(
        client.read_node(3, "Line.Batch").await.unwrap(),
        Some(Value::String("B-117".into()))
    );
}

#[tokio::test]
async fn test_read_value_by_node_string() {
    let (client, _server) = connected().await;
    assert_eq!(client.read_value("2;Pump.Running").await.unwrap(), Some(Value::Bool(true)));

    let err = client.read_value("Pump.Running").await.unwrap_err();
    assert!(matches!(err, PlcError::InvalidAddress { .. }));
}

#[tokio::test]
async fn test_empty_identifier() {
    let (client, server) = connected().await;
    let err = client.read_node(2, "").await.unwrap_err();
    assert!(matches!(err, PlcError::Client { ref message } if message == "no node identifier specified"));
    assert!(server.batches().is_empty());
}

#[tokio::test]
async fn test_bad_status_is_device_error() {
    let (client, _server) = connected().await;
    let err = client.read_node(2, "Missing").await.unwrap_err();
    assert_eq!(err.device_code(), Some(BAD_NODE_ID_UNKNOWN));
    assert!(!err.is_communication());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_transport_failure_is_communication_error() {
    let (client, server) = connected().await;
    server.fail_next_read("socket closed");

    let err = client.read_node(2, "Tank.Level").await.unwrap_err();
    assert!(err.is_communication());
    assert!(client.is_connected());
    assert_eq!(client.stats().failed_requests(), 1);
}

#[tokio::test]
async fn test_disconnect_on_communication_error() {
    let (client, server) = client_with(config().with_disconnect_on_error(true));
    client.connect().await.unwrap();
    server.fail_next_read("socket closed");

    assert!(client.read_node(2, "Tank.Level").await.unwrap_err().is_communication());
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(server.endpoint(), None);

    let err = client.read_node(2, "Tank.Level").await.unwrap_err();
    assert!(matches!(err, PlcError::NotConnected));
}

// =============================================================================
// Variable maps
// =============================================================================

#[tokio::test]
async fn test_variable_map_single_batch() {
    let (client, server) = connected().await;
    server.set_status(NodeId::new(2, "Secret"), BAD_NOT_READABLE);

    let mut table = BTreeMap::new();
    table.insert("level".to_string(), "2;Tank.Level".to_string());
    table.insert("running".to_string(), "2;Pump.Running".to_string());
    table.insert("secret".to_string(), "2;Secret".to_string());
    table.insert("typo".to_string(), "Tank.Level".to_string());
    client.map_variables(&table, None).unwrap();

    let values = client.read_variable_map(None, 0).await.unwrap();
    assert_eq!(values.len(), 3);
    assert_eq!(values["level"], Some(Value::Float64(3.5)));
    assert_eq!(values["running"], Some(Value::Bool(true)));
    assert_eq!(values["secret"], None);
    assert!(!values.contains_key("typo"));

    let batches = server.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
}

#[tokio::test]
async fn test_named_maps() {
    let (client, _server) = connected().await;
    let mut table = BTreeMap::new();
    table.insert("batch".to_string(), "3;Line.Batch".to_string());
    client.map_variables(&table, Some("line")).unwrap();

    let values = client.read_variable_map(Some("line"), 0).await.unwrap();
    assert_eq!(values["batch"], Some(Value::String("B-117".into())));

    let err = client.read_variable_map(None, 0).await.unwrap_err();
    assert!(matches!(err, PlcError::UnknownMap { .. }));
}

// =============================================================================
// Unsupported operations
// =============================================================================

#[tokio::test]
async fn test_writes_are_not_implemented() {
    let (client, _server) = connected().await;

    let err = client.write_value(&Value::Float64(1.0), "2;Tank.Level").await.unwrap_err();
    assert!(matches!(err, PlcError::NotImplemented { .. }));
    assert!(matches!(
        client.read_registers(0, 2).await.unwrap_err(),
        PlcError::NotImplemented { .. }
    ));
    assert!(matches!(
        client.write_area(&[0, 1], "hr", 0, 1, None).await.unwrap_err(),
        PlcError::NotImplemented { .. }
    ));
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
async fn test_connect_same_url_is_noop() {
    let (client, server) = client_with(config());
    client.connect().await.unwrap();
    client.connect().await.unwrap();
    client.connect_to(Some(URL)).await.unwrap();
    assert_eq!(server.connects(), 1);

    server.drop_session();
    client.connect().await.unwrap();
    assert_eq!(server.connects(), 2);
}

#[tokio::test]
async fn test_connect_to_other_url() {
    let (client, server) = connected().await;
    client.connect_to(Some("opc.tcp://10.0.0.6:4840")).await.unwrap();
    assert_eq!(server.connects(), 2);
    assert_eq!(server.endpoint().as_deref(), Some("opc.tcp://10.0.0.6:4840"));
}

#[tokio::test]
async fn test_connect_failure() {
    let (client, server) = client_with(config());
    server.set_unreachable(true);

    let err = client.connect().await.unwrap_err();
    assert!(err.is_communication());
    assert_eq!(client.state(), ConnectionState::Error);
}

#[tokio::test]
async fn test_not_connected_and_auto_connect() {
    let (client, server) = client_with(config());
    let err = client.read_node(2, "Tank.Level").await.unwrap_err();
    assert!(matches!(err, PlcError::NotConnected));

    let (client, server2) = client_with(config().with_auto_connect(true));
    assert_eq!(client.read_node(2, "Tank.Level").await.unwrap(), Some(Value::Float64(3.5)));
    assert_eq!(server2.connects(), 1);
    assert_eq!(server.connects(), 0);
}

#[tokio::test]
async fn test_disconnect() {
    let (client, server) = connected().await;
    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
    assert_eq!(server.endpoint(), None);
}

// =============================================================================
// Timeouts
// =============================================================================

/// Transport whose reads never finish in time.
struct StalledTransport;

#[async_trait]
impl OpcUaTransport for StalledTransport {
    async fn connect(&mut self, _endpoint: &str, _timeout: Duration) -> OpcUaResult<()> {
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcUaResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn read_values(&self, nodes: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(nodes
            .iter()
            .map(|node| ReadResult::success(node.clone(), OpcUaValue::Null))
            .collect())
    }

    fn display_name(&self) -> String {
        "stalled".to_string()
    }
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout() {
    let client = OpcUaClient::with_transport(
        config().with_timeout(Duration::from_secs(1)),
        StalledTransport,
    )
    .unwrap();
    client.connect().await.unwrap();

    let err = client.read_node(2, "Tank.Level").await.unwrap_err();
    assert!(err.is_communication());
}
