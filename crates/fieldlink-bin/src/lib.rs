// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # fieldlink-bin
//!
//! Command-line front end of fieldlink.
//!
//! - CLI argument parsing with clap
//! - Device file loading with the `config` crate
//! - Logging initialization
//! - Command implementations (read, write, poll, validate, version)
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │   cli.rs    │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │  config  │ │ logging  │
//!        └────┬─────┘ └────┬─────┘ └──────────┘
//!             │            │
//!             └─────┬──────┘
//!                   ▼
//!        ┌───────────────────────┐
//!        │ Arc<dyn DeviceClient> │
//!        │ modbus/siemens/opcua  │
//!        └───────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Read one address
//! fieldlink read press hr.w2
//!
//! # Write a value
//! fieldlink write line-plc db2.r4 12.5
//!
//! # Poll the default map every 500ms, 10 times
//! fieldlink poll press --interval 500ms --count 10
//!
//! # Check the device file
//! fieldlink -c /etc/fieldlink/devices.yaml validate
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands, LogFormat};
pub use config::{load_config, load_config_str, ConfigFormat, DeviceConfig, FieldlinkConfig, ProtocolConfig};
pub use error::{BinError, BinResult};

/// Binary version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Binary name.
pub const NAME: &str = "fieldlink";
