// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `ModbusClient` against an in-process Modbus/TCP device.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fieldlink_core::{DeviceClient, PlcError, Value};
use fieldlink_modbus::{ModbusClient, ModbusConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Registers at or beyond this address raise exception 2.
const MEMORY_SIZE: usize = 1000;

/// Reads starting here answer with a single register whatever the count.
const SHORT_AT: u16 = 900;

/// Delay of a late reply, twice the response timeout of [`late_reply_config`].
const SLOW_REPLY_DELAY: Duration = Duration::from_millis(400);

#[derive(Debug)]
struct FakeDevice {
    holding: Vec<u16>,
    coils: Vec<bool>,
    /// (unit id, function code, start, count)
    requests: Vec<(u8, u8, u16, u16)>,
}

impl FakeDevice {
    fn new() -> Self {
        Self {
            holding: vec![0; MEMORY_SIZE],
            coils: vec![false; MEMORY_SIZE],
            requests: Vec::new(),
        }
    }

    fn handle(&mut self, unit_id: u8, pdu: &[u8]) -> Vec<u8> {
        let fc = pdu[0];
        let start = u16::from_be_bytes([pdu[1], pdu[2]]);
        let count = u16::from_be_bytes([pdu[3], pdu[4]]);
        self.requests.push((unit_id, fc, start, count));

        let (s, n) = (usize::from(start), usize::from(count));
        if s + n > MEMORY_SIZE {
            return vec![fc | 0x80, 2];
        }

        match fc {
            3 | 4 if start == SHORT_AT => vec![fc, 2, 0, 0],
            3 | 4 => {
                let mut out = vec![fc, (n * 2) as u8];
                for register in &self.holding[s..s + n] {
                    out.extend_from_slice(&register.to_be_bytes());
                }
                out
            }
            1 | 2 => {
                let mut packed = vec![0u8; n.div_ceil(8)];
                for (i, on) in self.coils[s..s + n].iter().enumerate() {
                    if *on {
                        packed[i / 8] |= 1 << (i % 8);
                    }
                }
                let mut out = vec![fc, packed.len() as u8];
                out.extend(packed);
                out
            }
            16 => {
                for (i, word) in pdu[6..].chunks_exact(2).enumerate() {
                    self.holding[s + i] = u16::from_be_bytes([word[0], word[1]]);
                }
                pdu[..5].to_vec()
            }
            15 => {
                for i in 0..n {
                    self.coils[s + i] = pdu[6 + i / 8] & (1 << (i % 8)) != 0;
                }
                pdu[..5].to_vec()
            }
            _ => vec![fc | 0x80, 1],
        }
    }
}

struct FakeServer {
    port: u16,
    device: Arc<Mutex<FakeDevice>>,
    accepts: Arc<AtomicUsize>,
    /// Replies still to be sent late.
    slow_replies: Arc<AtomicUsize>,
}

impl FakeServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let device = Arc::new(Mutex::new(FakeDevice::new()));
        let accepts = Arc::new(AtomicUsize::new(0));
        let slow_replies = Arc::new(AtomicUsize::new(0));

        let (dev, count, slow) = (Arc::clone(&device), Arc::clone(&accepts), Arc::clone(&slow_replies));
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(socket, Arc::clone(&dev), Arc::clone(&slow)));
            }
        });

        Self {
            port,
            device,
            accepts,
            slow_replies,
        }
    }

    fn config(&self) -> ModbusConfig {
        ModbusConfig::builder()
            .host("127.0.0.1")
            .port(self.port)
            .pacing(Duration::ZERO)
            .response_timeout(Duration::from_secs(1))
            .build()
            .unwrap()
    }

    async fn client(&self) -> ModbusClient {
        let client = ModbusClient::new(self.config()).unwrap();
        client.connect().await.unwrap();
        client
    }

    fn requests(&self) -> Vec<(u8, u8, u16, u16)> {
        self.device.lock().unwrap().requests.clone()
    }

    fn set_holding(&self, address: usize, value: u16) {
        self.device.lock().unwrap().holding[address] = value;
    }

    fn holding(&self, address: usize) -> u16 {
        self.device.lock().unwrap().holding[address]
    }

    fn coil(&self, address: usize) -> bool {
        self.device.lock().unwrap().coils[address]
    }
}

async fn serve(mut socket: TcpStream, device: Arc<Mutex<FakeDevice>>, slow_replies: Arc<AtomicUsize>) {
    loop {
        let mut head = [0u8; 7];
        if socket.read_exact(&mut head).await.is_err() {
            return;
        }
        let length = usize::from(u16::from_be_bytes([head[4], head[5]]));
        let mut pdu = vec![0u8; length - 1];
        if socket.read_exact(&mut pdu).await.is_err() {
            return;
        }

        let reply = device.lock().unwrap().handle(head[6], &pdu);
        let mut frame = vec![head[0], head[1], 0, 0];
        frame.extend_from_slice(&((reply.len() + 1) as u16).to_be_bytes());
        frame.push(head[6]);
        frame.extend(reply);

        let late = slow_replies
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if late {
            tokio::time::sleep(SLOW_REPLY_DELAY).await;
        }
        if socket.write_all(&frame).await.is_err() {
            return;
        }
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_read_single_holding_register() {
    let server = FakeServer::start().await;
    server.set_holding(2, 0x0102);
    let client = server.client().await;

    let value = client.read_value("w2").await.unwrap();
    assert_eq!(value, Some(Value::UInt16(258)));
    assert_eq!(server.requests(), vec![(0, 3, 2, 1)]);
}

#[tokio::test]
async fn test_exception_becomes_device_error() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    let err = client.read_value("w1000").await.unwrap_err();
    assert_eq!(err.device_code(), Some(2));
    assert!(err.to_string().contains("invalid register address"));
    // device faults keep the connection
    assert!(client.is_connected());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_on_live_socket_is_noop() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    client.connect().await.unwrap();
    client.connect().await.unwrap();
    assert_eq!(server.accepts.load(Ordering::SeqCst), 1);
    assert_eq!(client.stats().connections(), 1);

    client.read_value("w0").await.unwrap();
    assert_eq!(server.accepts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
    assert!(matches!(client.read_value("w0").await, Err(PlcError::NotConnected)));

    client.connect().await.unwrap();
    assert_eq!(server.accepts.load(Ordering::SeqCst), 2);
    assert!(client.read_value("w0").await.is_ok());
}

// =============================================================================
// Request validation
// =============================================================================

#[tokio::test]
async fn test_count_limit_is_rejected_locally() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    let err = client.read_area("hr", 0, 124, None).await.unwrap_err();
    assert_eq!(err.device_code(), Some(3));
    let err = client.read_area("hr", 0, 0, None).await.unwrap_err();
    assert_eq!(err.device_code(), Some(3));
    let err = client.read_area("xx", 0, 1, None).await.unwrap_err();
    assert_eq!(err.device_code(), Some(3));

    assert!(server.requests().is_empty());
    assert!(client.read_area("hr", 0, 123, None).await.is_ok());
}

#[tokio::test]
async fn test_read_only_area_write() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    let err = client.write_value(&Value::UInt16(1), "ir.w0").await.unwrap_err();
    assert!(matches!(err, PlcError::UnsupportedArea { .. }));
}

#[tokio::test]
async fn test_short_response_is_communication_error() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    let err = client.read_area("hr", u32::from(SHORT_AT), 4, None).await.unwrap_err();
    assert!(err.is_communication(), "{err}");
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_disconnect_on_error() {
    let server = FakeServer::start().await;
    let config = ModbusConfig {
        disconnect_on_error: true,
        ..server.config()
    };
    let client = ModbusClient::new(config).unwrap();
    client.connect().await.unwrap();

    assert!(client.read_area("hr", u32::from(SHORT_AT), 4, None).await.is_err());
    assert!(!client.is_connected());
    assert!(matches!(client.read_value("w0").await, Err(PlcError::NotConnected)));
}

fn late_reply_config(server: &FakeServer) -> ModbusConfig {
    ModbusConfig {
        response_timeout: Duration::from_millis(200),
        ..server.config()
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_response_timeout_drops_connection() {
    let server = FakeServer::start().await;
    server.set_holding(0, 7);
    server.slow_replies.store(1, Ordering::SeqCst);
    let client = ModbusClient::new(late_reply_config(&server)).unwrap();
    client.connect().await.unwrap();

    let err = client.read_value("w0").await.unwrap_err();
    assert!(err.is_communication(), "{err}");
    assert!(!client.is_connected());

    // the late reply must never be taken for the answer to a new request
    tokio::time::sleep(SLOW_REPLY_DELAY).await;
    assert!(matches!(client.read_value("w0").await, Err(PlcError::NotConnected)));

    client.connect().await.unwrap();
    assert_eq!(server.accepts.load(Ordering::SeqCst), 2);
    for _ in 0..3 {
        assert_eq!(client.read_value("w0").await.unwrap(), Some(Value::UInt16(7)));
    }
}

#[tokio::test]
async fn test_response_timeout_with_auto_connect_recovers() {
    let server = FakeServer::start().await;
    server.set_holding(0, 7);
    server.slow_replies.store(1, Ordering::SeqCst);
    let config = ModbusConfig {
        auto_connect: true,
        ..late_reply_config(&server)
    };
    let client = ModbusClient::new(config).unwrap();

    assert!(client.read_value("w0").await.unwrap_err().is_communication());
    assert_eq!(client.read_value("w0").await.unwrap(), Some(Value::UInt16(7)));
    assert!(client.is_connected());
    assert_eq!(server.accepts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_auto_connect() {
    let server = FakeServer::start().await;
    let config = ModbusConfig {
        auto_connect: true,
        ..server.config()
    };
    let client = ModbusClient::new(config).unwrap();

    assert!(client.read_value("w0").await.is_ok());
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = ModbusConfig::builder().host("127.0.0.1").port(port).build().unwrap();
    let client = ModbusClient::new(config).unwrap();
    let err = client.connect().await.unwrap_err();
    assert!(err.is_communication());
    assert!(err.to_string().contains("cannot connect to device"), "{err}");
}

// =============================================================================
// Units
// =============================================================================

#[tokio::test]
async fn test_unit_id_from_area_and_extra_id() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    client.read_value("hr7.w0").await.unwrap();
    client.read_value("w0").await.unwrap();
    client.read_area("hr", 0, 1, Some(9)).await.unwrap();
    client.read_value("w0").await.unwrap();

    let units: Vec<u8> = server.requests().iter().map(|r| r.0).collect();
    assert_eq!(units, vec![7, 0, 9, 9]);

    let err = client.read_area("hr", 0, 1, Some(256)).await.unwrap_err();
    assert_eq!(err.device_code(), Some(3));
}

// =============================================================================
// Values
// =============================================================================

#[tokio::test]
async fn test_float_round_trip_with_word_swap() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    client.write_value(&Value::Float32(1.0), "r10").await.unwrap();
    // 0x3F800000 with swapped words
    assert_eq!(server.holding(10), 0x0000);
    assert_eq!(server.holding(11), 0x3F80);
    assert_eq!(client.read_value("r10").await.unwrap(), Some(Value::Float32(1.0)));
}

#[tokio::test]
async fn test_bit_write_read_modify_write() {
    let server = FakeServer::start().await;
    server.set_holding(4, 0x00F0);
    let client = server.client().await;

    client.write_value(&Value::Bool(true), "x4.0").await.unwrap();
    client.write_value(&Value::Bool(false), "x4.4").await.unwrap();
    assert_eq!(server.holding(4), 0x00E1);

    let functions: Vec<u8> = server.requests().iter().map(|r| r.1).collect();
    assert_eq!(functions, vec![3, 16, 3, 16]);
}

#[tokio::test]
async fn test_coils() {
    let server = FakeServer::start().await;
    let client = server.client().await;

    client.write_value(&Value::Bool(true), "co.x5").await.unwrap();
    assert!(server.coil(5));
    assert_eq!(client.read_value("co.x5").await.unwrap(), Some(Value::Bool(true)));
    assert_eq!(client.read_value("co.x6").await.unwrap(), Some(Value::Bool(false)));

    let functions: Vec<u8> = server.requests().iter().map(|r| r.1).collect();
    assert_eq!(functions, vec![15, 1, 1]);
}

#[tokio::test]
async fn test_variable_map_over_the_wire() {
    let server = FakeServer::start().await;
    server.set_holding(0, 10);
    server.set_holding(1, 0xFFFF);
    server.set_holding(200, 7);
    let client = server.client().await;

    let table = BTreeMap::from([
        ("speed".to_string(), "w0".to_string()),
        ("delta".to_string(), "i1".to_string()),
        ("far".to_string(), "w200".to_string()),
        ("run".to_string(), "co.x3".to_string()),
    ]);
    client.map_variables(&table, None).unwrap();

    let values = client.read_variable_map(None, 0).await.unwrap();
    assert_eq!(values["speed"], Some(Value::UInt16(10)));
    assert_eq!(values["delta"], Some(Value::Int16(-1)));
    assert_eq!(values["far"], Some(Value::UInt16(7)));
    assert_eq!(values["run"], Some(Value::Bool(false)));
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn test_concurrent_requests_are_serialized() {
    let server = FakeServer::start().await;
    let client = Arc::new(server.client().await);

    let tasks: Vec<_> = (0..8u16)
        .map(|bit| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.write_value(&Value::Bool(true), &format!("x20.{bit}")).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(server.holding(20), 0x00FF);
}
