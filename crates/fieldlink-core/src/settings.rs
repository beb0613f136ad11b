// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol-neutral client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::TypeCatalog;
use crate::codec::{CodecSettings, ValueCodec};
use crate::error::{PlcError, PlcResult};
use crate::plan::RangeCoalescer;
use crate::types::{ByteOrder, DeviceFamily, Endianness};

/// Largest register count per Modbus request.
pub const MODBUS_MAX_REGISTERS: u32 = 123;

/// Largest register count per S7 area request.
pub const SIEMENS_MAX_REGISTERS: u32 = 65_535;

/// Settings shared by every device client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Byte-order settings.
    #[serde(flatten)]
    pub codec: CodecSettings,

    /// Size of one register in bytes.
    pub bytes_per_register: usize,

    /// Largest register count per read request.
    pub max_registers: u32,

    /// How long to wait for exclusive access to the device.
    #[serde(with = "humantime_serde")]
    pub access_timeout: Duration,

    /// Minimum time between the start of two device accesses.
    #[serde(with = "humantime_serde")]
    pub pacing: Duration,

    /// Open the connection before the first access if it is down.
    pub auto_connect: bool,

    /// Drop the connection after a communication error.
    pub disconnect_on_error: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            codec: CodecSettings::default(),
            bytes_per_register: 1,
            max_registers: SIEMENS_MAX_REGISTERS,
            access_timeout: Duration::from_secs(1),
            pacing: Duration::from_millis(100),
            auto_connect: false,
            disconnect_on_error: false,
        }
    }
}

impl ClientSettings {
    /// Defaults for an S7 PLC.
    pub fn siemens() -> Self {
        Self::default()
    }

    /// Defaults for a Modbus/TCP device.
    pub fn modbus() -> Self {
        Self {
            codec: CodecSettings::new(Endianness::Big, true, false),
            bytes_per_register: 2,
            max_registers: MODBUS_MAX_REGISTERS,
            ..Self::default()
        }
    }

    /// Defaults for an OPC-UA server.
    pub fn opcua() -> Self {
        Self::default()
    }

    /// Defaults for a device family.
    pub fn for_family(family: DeviceFamily) -> Self {
        match family {
            DeviceFamily::Siemens => Self::siemens(),
            DeviceFamily::Modbus => Self::modbus(),
            DeviceFamily::OpcUa => Self::opcua(),
        }
    }

    /// Creates a builder starting from the family defaults.
    pub fn builder(family: DeviceFamily) -> ClientSettingsBuilder {
        ClientSettingsBuilder {
            settings: Self::for_family(family),
        }
    }

    /// Register layout.
    pub fn catalog(&self) -> TypeCatalog {
        TypeCatalog::new(self.bytes_per_register)
    }

    /// Value codec for these settings.
    pub fn value_codec(&self) -> ValueCodec {
        ValueCodec::new(self.codec, self.catalog())
    }

    /// Range coalescer for these settings.
    pub fn coalescer(&self) -> RangeCoalescer {
        RangeCoalescer::new(self.catalog(), self.max_registers)
    }

    /// Validates the settings.
    pub fn validate(&self) -> PlcResult<()> {
        if !matches!(self.bytes_per_register, 1 | 2) {
            return Err(PlcError::configuration(format!(
                "bytes_per_register must be 1 or 2, got {}",
                self.bytes_per_register
            )));
        }
        if self.max_registers == 0 {
            return Err(PlcError::configuration("max_registers must be at least 1"));
        }
        if self.access_timeout.is_zero() {
            return Err(PlcError::configuration("access_timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Builder for [`ClientSettings`].
#[derive(Debug, Clone)]
pub struct ClientSettingsBuilder {
    settings: ClientSettings,
}

impl ClientSettingsBuilder {
    /// Sets the byte-order settings.
    pub fn codec(mut self, codec: CodecSettings) -> Self {
        self.settings.codec = codec;
        self
    }

    /// Sets the byte order from a vendor preset.
    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.settings.codec = CodecSettings::from_byte_order(order);
        self
    }

    /// Sets the register size.
    pub fn bytes_per_register(mut self, bytes: usize) -> Self {
        self.settings.bytes_per_register = bytes;
        self
    }

    /// Sets the per-request register limit.
    pub fn max_registers(mut self, max: u32) -> Self {
        self.settings.max_registers = max;
        self
    }

    /// Sets the access timeout.
    pub fn access_timeout(mut self, timeout: Duration) -> Self {
        self.settings.access_timeout = timeout;
        self
    }

    /// Sets the pacing interval.
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.settings.pacing = pacing;
        self
    }

    /// Enables or disables auto-connect.
    pub fn auto_connect(mut self, enabled: bool) -> Self {
        self.settings.auto_connect = enabled;
        self
    }

    /// Enables or disables disconnect on communication errors.
    pub fn disconnect_on_error(mut self, enabled: bool) -> Self {
        self.settings.disconnect_on_error = enabled;
        self
    }

    /// Builds and validates the settings.
    pub fn build(self) -> PlcResult<ClientSettings> {
        self.settings.validate()?;
        Ok(self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_defaults() {
        let modbus = ClientSettings::modbus();
        assert!(modbus.codec.word_swap);
        assert_eq!(modbus.bytes_per_register, 2);
        assert_eq!(modbus.max_registers, 123);

        let siemens = ClientSettings::siemens();
        assert!(!siemens.codec.word_swap);
        assert_eq!(siemens.max_registers, 65_535);
        assert_eq!(siemens.access_timeout, Duration::from_secs(1));
        assert_eq!(siemens.pacing, Duration::from_millis(100));
        assert!(!siemens.auto_connect);
    }

    #[test]
    fn test_builder_validates() {
        assert!(ClientSettings::builder(DeviceFamily::Modbus).max_registers(0).build().is_err());
        assert!(ClientSettings::builder(DeviceFamily::Modbus).bytes_per_register(3).build().is_err());

        let settings = ClientSettings::builder(DeviceFamily::Siemens)
            .byte_order(ByteOrder::MidBigEndian)
            .pacing(Duration::ZERO)
            .build()
            .unwrap();
        assert!(settings.codec.word_swap);
        assert!(settings.pacing.is_zero());
    }

    #[test]
    fn test_deserialize_humantime() {
        let json = r#"{"access_timeout": "2s", "pacing": "50ms", "word_swap": true}"#;
        let settings: ClientSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.access_timeout, Duration::from_secs(2));
        assert_eq!(settings.pacing, Duration::from_millis(50));
        assert!(settings.codec.word_swap);
        assert_eq!(settings.max_registers, SIEMENS_MAX_REGISTERS);
    }
}
