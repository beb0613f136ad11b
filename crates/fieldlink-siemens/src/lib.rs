// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldlink-siemens
//!
//! Siemens S7 client for fieldlink, built on the snap7 native library.
//!
//! snap7 is loaded at runtime with `libloading`, once per process. Its
//! blocking calls run on tokio's blocking pool behind the client's access
//! guard, and the [`S7Driver`] trait keeps the native surface small enough
//! to swap for [`MemoryDriver`] in tests.
//!
//! ## Areas
//!
//! | Tag  | Area            | Raw position unit |
//! |------|-----------------|-------------------|
//! | `db` | Data blocks     | byte              |
//! | `mk` | Marks (flags)   | bit               |
//! | `pe` | Process inputs  | byte              |
//! | `pa` | Process outputs | byte              |
//! | `ct` | Counters        | counter (2 bytes) |
//! | `tm` | Timers          | timer (2 bytes)   |
//!
//! ## Example
//!
//! ```rust,ignore
//! use fieldlink_core::DeviceClient;
//! use fieldlink_siemens::{SiemensClient, SiemensConfig};
//!
//! let client = SiemensClient::new(SiemensConfig::new("192.168.0.10"))?;
//! client.connect().await?;
//! let running = client.read_value("mk8.3").await?;
//! let speed = client.read_value_in(Some(2), "w0").await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod ffi;
pub mod types;

pub use client::SiemensClient;
pub use config::{SiemensConfig, SiemensConfigBuilder};
pub use driver::{DriverCall, MemoryDriver, NativeDriver, S7Driver};
pub use error::{S7Error, S7Result};
pub use types::{ParamKind, S7Area, S7Param, WordLength};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
