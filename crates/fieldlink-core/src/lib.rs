// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldlink-core
//!
//! Protocol-neutral building blocks for fieldlink device clients.
//!
//! - **Address**: the symbolic address grammar (`db2.w0`, `hr5.di10`, `mk8.3`)
//! - **Catalog**: register layout of each data type per device family
//! - **Codec**: raw bytes to typed values with endianness, word swap and byte swap
//! - **Plan**: range coalescing of scattered registers into bounded reads
//! - **Variables**: named variable maps with precomputed read plans
//! - **Access**: serialized, paced access to a device session
//! - **Client**: the `DeviceClient` contract implemented by every protocol crate
//! - **Error**: the shared error taxonomy
//!
//! ## Example
//!
//! ```
//! use fieldlink_core::{AddressGrammar, RangeCoalescer, TypeCatalog, DataType};
//!
//! let address = AddressGrammar::siemens().parse("mk8.3").unwrap();
//! assert_eq!(address.bit, Some(3));
//!
//! let coalescer = RangeCoalescer::new(TypeCatalog::MODBUS, 100);
//! let windows = coalescer.plan([
//!     (0, DataType::UnsignedInt16),
//!     (1, DataType::UnsignedInt16),
//!     (200, DataType::UnsignedInt16),
//! ]);
//! assert_eq!(windows.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod address;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod plan;
pub mod types;

// =============================================================================
// Client Modules
// =============================================================================

pub mod access;
pub mod client;
pub mod settings;
pub mod variables;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use access::{AccessGuard, SessionLease};
pub use address::{split_area_tag, Address, AddressGrammar, MAX_BIT_INDEX};
pub use catalog::{TypeCatalog, WireFormat};
pub use client::{scaled_position, ClientStats, ConnectionState, DeviceClient, StateCell};
pub use codec::{CodecSettings, ValueCodec};
pub use error::{BoxError, ErrorCode, ErrorSeverity, PlcError, PlcResult};
pub use plan::{RangeCoalescer, ReadWindow};
pub use settings::{ClientSettings, ClientSettingsBuilder, MODBUS_MAX_REGISTERS, SIEMENS_MAX_REGISTERS};
pub use types::{ByteOrder, DataType, DeviceFamily, Endianness, Value};
pub use variables::{parse_table, AreaVariables, VariableMap, VariableRegistry, VariableValues};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
