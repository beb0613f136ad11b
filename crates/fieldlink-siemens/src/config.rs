// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! S7 client configuration.
//!
//! ```
//! use fieldlink_siemens::SiemensConfig;
//!
//! let config = SiemensConfig::builder()
//!     .host("192.168.0.10")
//!     .rack(0)
//!     .slot(2)
//!     .db_number(5)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.port, 102);
//! ```

use std::net::IpAddr;
use std::time::Duration;

use fieldlink_core::{ByteOrder, ClientSettings, CodecSettings, DeviceFamily, Endianness, SIEMENS_MAX_REGISTERS};
use serde::{Deserialize, Serialize};

use crate::error::{S7Error, S7Result};

/// Default ISO-on-TCP port.
pub const DEFAULT_PORT: u16 = 102;

/// Configuration of one S7 PLC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiemensConfig {
    /// PLC IP address.
    pub host: String,

    /// ISO-on-TCP port (default: 102).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Rack of the CPU (default: 0).
    #[serde(default)]
    pub rack: u16,

    /// Slot of the CPU (default: 1).
    #[serde(default = "default_slot")]
    pub slot: u16,

    /// Initial DB number for addresses without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_number: Option<u16>,

    /// Path of the snap7 library; the platform name when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,

    /// Vendor byte-order preset; overrides the three flags below.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<ByteOrder>,

    /// Byte order of multi-byte values.
    #[serde(default)]
    pub endianness: Endianness,

    /// Reverse the word order of 32- and 64-bit values.
    #[serde(default)]
    pub word_swap: bool,

    /// Swap the bytes inside every word of 32- and 64-bit values.
    #[serde(default)]
    pub byte_swap: bool,

    /// Largest byte count per read.
    #[serde(default = "default_max_registers")]
    pub max_registers: u32,

    /// How long to wait for exclusive access to the PLC.
    #[serde(default = "default_access_timeout", with = "humantime_serde")]
    pub access_timeout: Duration,

    /// Minimum time between the start of two accesses.
    #[serde(default = "default_pacing", with = "humantime_serde")]
    pub pacing: Duration,

    /// Connect before an access when the connection is down.
    #[serde(default)]
    pub auto_connect: bool,

    /// Disconnect after a communication error.
    #[serde(default)]
    pub disconnect_on_error: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_slot() -> u16 {
    1
}

fn default_max_registers() -> u32 {
    SIEMENS_MAX_REGISTERS
}

fn default_access_timeout() -> Duration {
    ClientSettings::siemens().access_timeout
}

fn default_pacing() -> Duration {
    ClientSettings::siemens().pacing
}

impl Default for SiemensConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            rack: 0,
            slot: default_slot(),
            db_number: None,
            library: None,
            byte_order: None,
            endianness: Endianness::Big,
            word_swap: false,
            byte_swap: false,
            max_registers: SIEMENS_MAX_REGISTERS,
            access_timeout: default_access_timeout(),
            pacing: default_pacing(),
            auto_connect: false,
            disconnect_on_error: false,
        }
    }
}

impl SiemensConfig {
    /// Creates a builder.
    pub fn builder() -> SiemensConfigBuilder {
        SiemensConfigBuilder::default()
    }

    /// Creates a configuration with defaults for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Effective byte-order settings.
    pub fn codec(&self) -> CodecSettings {
        match self.byte_order {
            Some(order) => CodecSettings::from_byte_order(order),
            None => CodecSettings::new(self.endianness, self.word_swap, self.byte_swap),
        }
    }

    /// Protocol-neutral settings for the client.
    pub fn to_settings(&self) -> S7Result<ClientSettings> {
        ClientSettings::builder(DeviceFamily::Siemens)
            .codec(self.codec())
            .max_registers(self.max_registers)
            .access_timeout(self.access_timeout)
            .pacing(self.pacing)
            .auto_connect(self.auto_connect)
            .disconnect_on_error(self.disconnect_on_error)
            .build()
            .map_err(|e| S7Error::configuration(e.to_string()))
    }

    /// Validates this configuration.
    pub fn validate(&self) -> S7Result<()> {
        if self.host.is_empty() {
            return Err(S7Error::configuration("host is required"));
        }
        if self.host.parse::<IpAddr>().is_err() {
            return Err(S7Error::configuration(format!(
                "host must be an IP address, got '{}'",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(S7Error::configuration("port must be greater than 0"));
        }
        self.to_settings().map(|_| ())
    }
}

// =============================================================================
// SiemensConfigBuilder
// =============================================================================

/// Builder for [`SiemensConfig`].
#[derive(Debug, Default)]
pub struct SiemensConfigBuilder {
    config: SiemensConfig,
}

impl SiemensConfigBuilder {
    /// Sets the PLC address.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the rack.
    pub fn rack(mut self, rack: u16) -> Self {
        self.config.rack = rack;
        self
    }

    /// Sets the slot.
    pub fn slot(mut self, slot: u16) -> Self {
        self.config.slot = slot;
        self
    }

    /// Sets the initial DB number.
    pub fn db_number(mut self, db: u16) -> Self {
        self.config.db_number = Some(db);
        self
    }

    /// Sets the snap7 library path.
    pub fn library(mut self, path: impl Into<String>) -> Self {
        self.config.library = Some(path.into());
        self
    }

    /// Sets a vendor byte-order preset.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.config.byte_order = Some(order);
        self
    }

    /// Sets the per-read byte limit.
    pub fn max_registers(mut self, max: u32) -> Self {
        self.config.max_registers = max;
        self
    }

    /// Sets the access timeout.
    pub fn access_timeout(mut self, timeout: Duration) -> Self {
        self.config.access_timeout = timeout;
        self
    }

    /// Sets the pacing interval.
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.config.pacing = pacing;
        self
    }

    /// Enables auto-connect.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.config.auto_connect = enabled;
        self
    }

    /// Enables disconnect on communication errors.
    pub fn disconnect_on_error(mut self, enabled: bool) -> Self {
        self.config.disconnect_on_error = enabled;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> S7Result<SiemensConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SiemensConfig::new("10.0.0.2");
        assert_eq!((config.port, config.rack, config.slot), (102, 0, 1));
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.bytes_per_register, 1);
        assert_eq!(settings.max_registers, 65_535);
        assert!(!settings.codec.word_swap);
    }

    #[test]
    fn test_host_must_be_ip() {
        assert!(SiemensConfig::builder().host("plc.local").build().is_err());
        assert!(SiemensConfig::builder().build().is_err());
        assert!(SiemensConfig::builder().host("::1").build().is_ok());
    }

    #[test]
    fn test_deserialize() {
        let json = r#"{"host": "10.0.0.2", "slot": 2, "db_number": 7, "pacing": "20ms"}"#;
        let config: SiemensConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.slot, 2);
        assert_eq!(config.db_number, Some(7));
        assert_eq!(config.pacing, Duration::from_millis(20));
        assert_eq!(config.access_timeout, Duration::from_secs(1));
    }
}
