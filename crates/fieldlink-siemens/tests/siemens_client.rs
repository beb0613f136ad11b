// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `SiemensClient` against an in-memory PLC.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use fieldlink_core::{AddressGrammar, DataType, DeviceClient, PlcError, Value};
use fieldlink_siemens::{
    DriverCall, MemoryDriver, S7Area, S7Param, SiemensClient, SiemensConfig, SiemensConfigBuilder, WordLength,
};

fn config() -> SiemensConfigBuilder {
    SiemensConfig::builder().host("10.0.0.2").pacing(Duration::ZERO)
}

fn client_with(builder: SiemensConfigBuilder) -> (SiemensClient<MemoryDriver>, MemoryDriver) {
    let plc = MemoryDriver::new();
    let client = SiemensClient::with_driver(builder.build().unwrap(), plc.clone()).unwrap();
    (client, plc)
}

async fn connected() -> (SiemensClient<MemoryDriver>, MemoryDriver) {
    let (client, plc) = client_with(config());
    client.connect().await.unwrap();
    plc.clear_calls();
    (client, plc)
}

fn read(area: S7Area, db: u16, start: u32, count: u32, word_len: WordLength) -> DriverCall {
    DriverCall::Read {
        area,
        db,
        start,
        count,
        word_len,
    }
}

fn write(area: S7Area, db: u16, start: u32, count: u32, word_len: WordLength) -> DriverCall {
    DriverCall::Write {
        area,
        db,
        start,
        count,
        word_len,
    }
}

// =============================================================================
// Addressing
// =============================================================================

#[tokio::test]
async fn test_mark_bit_reads_one_bit() {
    let address = AddressGrammar::siemens().parse("mk8.3").unwrap();
    assert_eq!(address.area, "mk");
    assert_eq!(address.data_type, DataType::Boolean);
    assert_eq!((address.position, address.bit), (8, Some(3)));

    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::Marks, 0, 8, &[0b0000_1000]);

    assert_eq!(client.read_value("mk8.3").await.unwrap(), Some(Value::Bool(true)));
    assert_eq!(plc.area_calls(), vec![read(S7Area::Marks, 0, 67, 1, WordLength::Bit)]);
}

#[tokio::test]
async fn test_db_number_is_remembered() {
    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::DataBlock, 2, 4, &[0x12, 0x34]);

    assert_eq!(client.read_value("db2.w4").await.unwrap(), Some(Value::UInt16(0x1234)));
    assert_eq!(client.read_value("w4").await.unwrap(), Some(Value::UInt16(0x1234)));
    assert_eq!(client.db_number(), Some(2));
    assert_eq!(
        plc.area_calls(),
        vec![
            read(S7Area::DataBlock, 2, 4, 2, WordLength::Byte),
            read(S7Area::DataBlock, 2, 4, 2, WordLength::Byte),
        ]
    );
}

#[tokio::test]
async fn test_missing_db_number() {
    let (client, plc) = connected().await;

    let err = client.read_value("w0").await.unwrap_err();
    assert!(matches!(err, PlcError::MissingDbNumber));
    let err = client.read_registers(0, 4).await.unwrap_err();
    assert!(matches!(err, PlcError::MissingDbNumber));
    assert!(plc.area_calls().is_empty());

    // an explicit DB argument works and is remembered
    client.read_registers_in(Some(7), 0, 4).await.unwrap();
    client.read_registers(0, 4).await.unwrap();
    assert_eq!(plc.area_calls().len(), 2);
}

#[tokio::test]
async fn test_explicit_db_argument() {
    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::DataBlock, 4, 0, &[0x00, 0x2A]);

    assert_eq!(
        client.read_value_in(Some(4), "i0").await.unwrap(),
        Some(Value::Int16(42))
    );
    client
        .write_value_in(Some(4), &Value::Int16(-2), "i2")
        .await
        .unwrap();
    assert_eq!(plc.bytes(S7Area::DataBlock, 4, 2, 2), vec![0xFF, 0xFE]);

    let values = client
        .read_array_in(Some(4), 0, DataType::SignedInt16, 2)
        .await
        .unwrap();
    assert_eq!(values, vec![Some(Value::Int16(42)), Some(Value::Int16(-2))]);
}

#[tokio::test]
async fn test_raw_counter_read_uses_counter_units() {
    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::Counters, 0, 2, &[0x00, 0x05, 0x00, 0x06]);

    let data = client.read_area("ct", 1, 2, None).await.unwrap();
    assert_eq!(data, vec![0x00, 0x05, 0x00, 0x06]);
    assert_eq!(plc.area_calls(), vec![read(S7Area::Counters, 0, 1, 2, WordLength::Counter)]);
}

#[tokio::test]
async fn test_unaligned_timer_write_merges_unit() {
    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::Timers, 0, 2, &[0x11, 0x22]);

    client.write_value(&Value::Byte(7), "tm.b3").await.unwrap();
    assert_eq!(plc.bytes(S7Area::Timers, 0, 2, 2), vec![0x11, 0x07]);
    assert_eq!(
        plc.area_calls(),
        vec![
            read(S7Area::Timers, 0, 1, 1, WordLength::Timer),
            write(S7Area::Timers, 0, 1, 1, WordLength::Timer),
        ]
    );
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_write_area_checks_payload_length() {
    let (client, plc) = connected().await;

    let err = client.write_area(&[1, 2, 3], "db1", 0, 2, None).await.unwrap_err();
    assert!(matches!(err, PlcError::InvalidValue { .. }));
    assert!(plc.area_calls().is_empty());

    client.write_area(&[1, 2], "db1", 0, 2, None).await.unwrap();
    assert_eq!(plc.bytes(S7Area::DataBlock, 1, 0, 2), vec![1, 2]);
}

#[tokio::test]
async fn test_fill() {
    let (client, plc) = connected().await;

    client.write_registers_fill(0xAA, 10, 4, Some(5)).await.unwrap();
    assert_eq!(plc.bytes(S7Area::DataBlock, 5, 10, 4), vec![0xAA; 4]);
    assert_eq!(plc.bytes(S7Area::DataBlock, 5, 14, 1), vec![0]);
    assert_eq!(client.db_number(), Some(5));
}

#[tokio::test]
async fn test_mark_write_and_read() {
    let (client, plc) = connected().await;

    client.write_value(&Value::Bool(true), "mk2.5").await.unwrap();
    assert_eq!(plc.bytes(S7Area::Marks, 0, 2, 1), vec![0b0010_0000]);
    assert_eq!(plc.area_calls(), vec![write(S7Area::Marks, 0, 21, 1, WordLength::Bit)]);

    assert!(client.read_mark(2, 5).await.unwrap());
    assert!(!client.read_mark(2, 4).await.unwrap());

    client.write_mark(2, 5, false).await.unwrap();
    assert_eq!(plc.bytes(S7Area::Marks, 0, 2, 1), vec![0]);
}

#[tokio::test]
async fn test_db_bit_write_preserves_other_bits() {
    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::DataBlock, 1, 0, &[0b1111_0000]);

    client.write_value(&Value::Bool(true), "db1.x0.1").await.unwrap();
    assert_eq!(plc.bytes(S7Area::DataBlock, 1, 0, 1), vec![0b1111_0010]);

    client.write_value(&Value::Bool(false), "db1.x0.4").await.unwrap();
    assert_eq!(plc.bytes(S7Area::DataBlock, 1, 0, 1), vec![0b1110_0010]);

    let err = client.write_value(&Value::Bool(true), "db1.x0.9").await.unwrap_err();
    assert!(matches!(err, PlcError::InvalidAddress { .. }));
}

#[tokio::test]
async fn test_bit_past_byte_width_is_rejected_on_read() {
    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::DataBlock, 1, 0, &[0xFF, 0xFF]);

    for address in ["db1.x0.8", "db1.x0.9"] {
        let err = client.read_value(address).await.unwrap_err();
        assert!(matches!(err, PlcError::InvalidAddress { .. }), "{address}: {err}");
    }
    assert!(plc.calls().is_empty());
    assert_eq!(client.read_value("db1.x0.7").await.unwrap(), Some(Value::Bool(true)));
}

#[tokio::test]
async fn test_oversized_positions_fail_before_the_wire() {
    let (client, plc) = connected().await;

    let err = client
        .read_array_in(Some(1), 0, DataType::UnsignedInt32, u32::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, PlcError::InvalidValue { .. }), "{err}");
    let err = client.read_mark(u32::MAX, 1).await.unwrap_err();
    assert!(matches!(err, PlcError::InvalidValue { .. }), "{err}");
    assert!(plc.calls().is_empty());
}

#[tokio::test]
async fn test_float_round_trip() {
    let (client, plc) = connected().await;

    client.write_value(&Value::Float32(1.5), "db3.r8").await.unwrap();
    assert_eq!(plc.bytes(S7Area::DataBlock, 3, 8, 4), vec![0x3F, 0xC0, 0x00, 0x00]);
    assert_eq!(client.read_value("db3.r8").await.unwrap(), Some(Value::Float32(1.5)));
}

#[tokio::test]
async fn test_concurrent_bit_writes() {
    let (client, plc) = connected().await;
    let client = Arc::new(client);

    let tasks: Vec<_> = (0..8)
        .map(|bit| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .write_value(&Value::Bool(true), &format!("db1.x0.{bit}"))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(plc.bytes(S7Area::DataBlock, 1, 0, 1), vec![0xFF]);
}

// =============================================================================
// Errors and connection state
// =============================================================================

#[tokio::test]
async fn test_error_code_classification() {
    let (client, plc) = connected().await;

    plc.fail_next(0x0070_0000);
    let err = client.read_value("db1.b0").await.unwrap_err();
    assert_eq!(err.device_code(), Some(0x0070_0000));

    plc.fail_next(0x0000_2751);
    let err = client.read_value("db1.b0").await.unwrap_err();
    assert!(err.is_communication());
    // without disconnect_on_error the link stays up
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_disconnect_on_communication_error() {
    let (client, plc) = client_with(config().disconnect_on_error(true));
    client.connect().await.unwrap();

    plc.fail_next(0x0001_0000);
    assert!(client.read_value("db1.b0").await.unwrap_err().is_communication());
    assert!(!client.is_connected());
    assert!(plc.calls().contains(&DriverCall::Disconnect));

    let err = client.read_value("db1.b0").await.unwrap_err();
    assert!(matches!(err, PlcError::NotConnected));
}

#[tokio::test]
async fn test_plc_error_keeps_connection() {
    let (client, plc) = client_with(config().disconnect_on_error(true));
    client.connect().await.unwrap();

    plc.fail_next(0x0090_0000);
    assert!(client.read_value("db1.b0").await.unwrap_err().device_code().is_some());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_not_connected() {
    let (client, plc) = client_with(config());
    let err = client.read_value("db1.w0").await.unwrap_err();
    assert!(matches!(err, PlcError::NotConnected));
    assert!(plc.calls().is_empty());
}

#[tokio::test]
async fn test_auto_connect() {
    let (client, plc) = client_with(config().auto_connect(true));
    client.read_value("db1.w0").await.unwrap();
    assert!(client.is_connected());
    assert_eq!(plc.connects(), 1);
}

#[tokio::test]
async fn test_reconnect_on_live_link_is_noop() {
    let (client, plc) = client_with(config());
    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(plc.connects(), 1);

    plc.drop_link();
    client.connect().await.unwrap();
    assert_eq!(plc.connects(), 2);

    client.connect_to(None, None, Some(2)).await.unwrap();
    assert_eq!(plc.connects(), 3);
    assert!(plc.calls().contains(&DriverCall::Connect {
        host: "10.0.0.2".to_string(),
        rack: 0,
        slot: 2,
    }));
}

#[tokio::test]
async fn test_connect_failure() {
    let (client, plc) = client_with(config());
    plc.set_unreachable(true);

    let err = client.connect().await.unwrap_err();
    assert!(err.is_communication());
    assert!(!client.is_connected());

    plc.set_unreachable(false);
    client.connect().await.unwrap();
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (client, plc) = connected().await;
    client.disconnect().await.unwrap();
    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
    assert_eq!(plc.calls(), vec![DriverCall::Disconnect]);
}

#[tokio::test]
async fn test_custom_port_sets_remote_port() {
    let (client, plc) = client_with(config().port(1102));
    client.connect().await.unwrap();
    assert_eq!(
        plc.calls()[0],
        DriverCall::SetParam {
            param: S7Param::RemotePort,
            value: 1102,
        }
    );
}

#[tokio::test]
async fn test_params() {
    let (client, _plc) = connected().await;
    client.set_param(S7Param::PingTimeout, 500).await.unwrap();
    assert_eq!(client.get_param(S7Param::PingTimeout).await.unwrap(), 500);

    let err = client.set_param(S7Param::RemotePort, 70_000).await.unwrap_err();
    assert!(matches!(err, PlcError::InvalidValue { .. }));
}

// =============================================================================
// Variable maps
// =============================================================================

#[tokio::test]
async fn test_variable_map_over_areas() {
    let (client, plc) = connected().await;
    plc.set_bytes(S7Area::DataBlock, 2, 0, &[0x01, 0xF4, 0x41, 0x20, 0x00, 0x00]);
    plc.set_bytes(S7Area::Marks, 0, 0, &[0b0000_0010]);
    plc.set_bytes(S7Area::Counters, 0, 4, &[0x00, 0x09]);

    let mut table = BTreeMap::new();
    table.insert("speed".to_string(), "db2.w0".to_string());
    table.insert("level".to_string(), "db2.r2".to_string());
    table.insert("running".to_string(), "mk0.1".to_string());
    table.insert("batches".to_string(), "ct.w4".to_string());
    client.map_variables(&table, None).unwrap();

    let values = client.read_variable_map(None, 0).await.unwrap();
    assert_eq!(values["speed"], Some(Value::UInt16(500)));
    assert_eq!(values["level"], Some(Value::Float32(10.0)));
    assert_eq!(values["running"], Some(Value::Bool(true)));
    assert_eq!(values["batches"], Some(Value::UInt16(9)));

    let calls = plc.area_calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.contains(&read(S7Area::DataBlock, 2, 0, 6, WordLength::Byte)));
    assert!(calls.contains(&read(S7Area::Marks, 0, 0, 1, WordLength::Byte)));
    assert!(calls.contains(&read(S7Area::Counters, 0, 2, 1, WordLength::Counter)));
}

#[tokio::test]
async fn test_stats() {
    let (client, plc) = connected().await;
    client.read_registers_in(Some(1), 0, 8).await.unwrap();
    plc.fail_next(0x0070_0000);
    let _ = client.read_registers(0, 8).await;

    assert_eq!(client.stats().connections(), 1);
    assert_eq!(client.stats().total_requests(), 2);
    assert_eq!(client.stats().failed_requests(), 1);
    assert_eq!(client.stats().bytes_read(), 8);
}
