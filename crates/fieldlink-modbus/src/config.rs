// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Modbus/TCP client configuration.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use fieldlink_modbus::ModbusConfig;
//!
//! let config = ModbusConfig::builder()
//!     .host("192.168.1.100")
//!     .unit_id(1)
//!     .response_timeout(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.port, 502);
//! assert_eq!(config.socket_addr(), "192.168.1.100:502");
//! ```

use std::time::Duration;

use fieldlink_core::{ByteOrder, ClientSettings, CodecSettings, DeviceFamily, Endianness, MODBUS_MAX_REGISTERS};
use serde::{Deserialize, Serialize};

use crate::error::{ModbusError, ModbusResult};

/// Configuration of one Modbus/TCP device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Device host name or IP address.
    pub host: String,

    /// TCP port (default: 502).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Default unit id (default: 0).
    #[serde(default)]
    pub unit_id: u8,

    /// TCP connect timeout.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Time allowed for one request/response exchange.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub response_timeout: Duration,

    /// Vendor byte-order preset; overrides the three flags below.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<ByteOrder>,

    /// Byte order inside a register.
    #[serde(default)]
    pub endianness: Endianness,

    /// Reverse the word order of 32- and 64-bit values.
    #[serde(default = "default_true")]
    pub word_swap: bool,

    /// Swap the bytes inside every word of 32- and 64-bit values.
    #[serde(default)]
    pub byte_swap: bool,

    /// Largest register count per read (at most 123).
    #[serde(default = "default_max_registers")]
    pub max_registers: u32,

    /// How long to wait for exclusive access to the connection.
    #[serde(default = "default_access_timeout", with = "humantime_serde")]
    pub access_timeout: Duration,

    /// Minimum time between the start of two requests.
    #[serde(default = "default_pacing", with = "humantime_serde")]
    pub pacing: Duration,

    /// Connect before a request when the connection is down.
    #[serde(default)]
    pub auto_connect: bool,

    /// Close the socket after any communication error. Timeouts and
    /// out-of-step responses close it regardless.
    #[serde(default)]
    pub disconnect_on_error: bool,
}

fn default_port() -> u16 {
    502
}

fn default_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_true() -> bool {
    true
}

fn default_max_registers() -> u32 {
    MODBUS_MAX_REGISTERS
}

fn default_access_timeout() -> Duration {
    ClientSettings::modbus().access_timeout
}

fn default_pacing() -> Duration {
    ClientSettings::modbus().pacing
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            unit_id: 0,
            connect_timeout: default_timeout(),
            response_timeout: default_timeout(),
            byte_order: None,
            endianness: Endianness::Big,
            word_swap: true,
            byte_swap: false,
            max_registers: default_max_registers(),
            access_timeout: default_access_timeout(),
            pacing: default_pacing(),
            auto_connect: false,
            disconnect_on_error: false,
        }
    }
}

impl ModbusConfig {
    /// Creates a builder.
    pub fn builder() -> ModbusConfigBuilder {
        ModbusConfigBuilder::default()
    }

    /// Creates a configuration with defaults for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    /// Returns `host:port`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Effective byte-order settings.
    pub fn codec(&self) -> CodecSettings {
        match self.byte_order {
            Some(order) => CodecSettings::from_byte_order(order),
            None => CodecSettings::new(self.endianness, self.word_swap, self.byte_swap),
        }
    }

    /// Protocol-neutral settings for the client.
    pub fn to_settings(&self) -> ModbusResult<ClientSettings> {
        ClientSettings::builder(DeviceFamily::Modbus)
            .codec(self.codec())
            .max_registers(self.max_registers)
            .access_timeout(self.access_timeout)
            .pacing(self.pacing)
            .auto_connect(self.auto_connect)
            .disconnect_on_error(self.disconnect_on_error)
            .build()
            .map_err(|e| ModbusError::configuration(e.to_string()))
    }

    /// Validates this configuration.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.host.is_empty() {
            return Err(ModbusError::configuration("host is required"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ModbusError::configuration("connect_timeout must be greater than 0"));
        }
        if self.response_timeout.is_zero() {
            return Err(ModbusError::configuration("response_timeout must be greater than 0"));
        }
        if self.max_registers == 0 || self.max_registers > MODBUS_MAX_REGISTERS {
            return Err(ModbusError::configuration(format!(
                "max_registers must be in 1..={MODBUS_MAX_REGISTERS}, got {}",
                self.max_registers
            )));
        }
        self.to_settings().map(|_| ())
    }
}

// =============================================================================
// ModbusConfigBuilder
// =============================================================================

/// Builder for [`ModbusConfig`].
#[derive(Debug, Default)]
pub struct ModbusConfigBuilder {
    config: ModbusConfig,
}

impl ModbusConfigBuilder {
    /// Sets the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the default unit id.
    pub fn unit_id(mut self, unit_id: u8) -> Self {
        self.config.unit_id = unit_id;
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the response timeout.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Sets a vendor byte-order preset.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.config.byte_order = Some(order);
        self
    }

    /// Sets endianness and swap flags.
    pub fn codec(mut self, codec: CodecSettings) -> Self {
        self.config.byte_order = None;
        self.config.endianness = codec.endianness;
        self.config.word_swap = codec.word_swap;
        self.config.byte_swap = codec.byte_swap;
        self
    }

    /// Sets the per-request register limit.
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
    pub fn build(self) -> ModbusResult<ModbusConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
