// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldlink-opcua
//!
//! OPC-UA client for fieldlink.
//!
//! Nodes are named `<namespace>;<identifier>` and read through an
//! [`OpcUaTransport`]. The `real-transport` feature provides
//! [`RealOpcUaTransport`] on the `opcua` crate; [`MockOpcUaTransport`]
//! serves an in-memory address space for tests.
//!
//! This client reads only: writes and the register operations of
//! [`DeviceClient`](fieldlink_core::DeviceClient) return
//! [`PlcError::NotImplemented`](fieldlink_core::PlcError::NotImplemented).
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::collections::BTreeMap;
//! use fieldlink_core::DeviceClient;
//! use fieldlink_opcua::OpcUaClient;
//!
//! let client = OpcUaClient::new("opc.tcp://10.0.0.5:4840", None)?;
//! client.connect().await?;
//!
//! let mut table = BTreeMap::new();
//! table.insert("level".to_string(), "2;Tank.Level".to_string());
//! client.map_variables(&table, None)?;
//! let values = client.read_variable_map(None, 0).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod node;
pub mod transport;

#[cfg(feature = "real-transport")]
pub mod real_transport;

pub use client::OpcUaClient;
pub use config::{OpcUaConfig, DEFAULT_TIMEOUT};
pub use error::{OpcUaError, OpcUaResult};
pub use mock::MockOpcUaTransport;
pub use node::NodeId;
pub use transport::{OpcUaTransport, OpcUaValue, ReadResult};

#[cfg(feature = "real-transport")]
pub use real_transport::RealOpcUaTransport;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
