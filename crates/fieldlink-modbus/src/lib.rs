// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldlink-modbus
//!
//! Modbus/TCP client for fieldlink.
//!
//! The client speaks the MBAP framing directly over a tokio `TcpStream` and
//! implements [`DeviceClient`](fieldlink_core::DeviceClient), so addresses,
//! variable maps and typed values work the same as on every other family.
//!
//! ## Areas
//!
//! | Tag  | Table             | Read | Write |
//! |------|-------------------|------|-------|
//! | `co` | Coils             | FC1  | FC15  |
//! | `in` | Discrete inputs   | FC2  | -     |
//! | `hr` | Holding registers | FC3  | FC16  |
//! | `ir` | Input registers   | FC4  | -     |
//!
//! Digits after the tag address another unit for that variable: `hr5.w0`
//! reads holding register 0 of unit 5.
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldlink_core::{DeviceClient, Value};
//! use fieldlink_modbus::{ModbusClient, ModbusConfig};
//!
//! let client = ModbusClient::new(ModbusConfig::new("192.168.1.10"))?;
//! client.connect().await?;
//! client.write_value(&Value::Float32(21.5), "r100").await?;
//! let setpoint = client.read_value("r100").await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod frame;

pub use client::ModbusClient;
pub use config::{ModbusConfig, ModbusConfigBuilder};
pub use error::{ConnectionError, ModbusError, ModbusResult, ProtocolError, RequestError};
pub use frame::{FunctionCode, RegisterType};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
