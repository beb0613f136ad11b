// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Device file loading.
//!
//! The device file lists the devices the CLI can talk to:
//!
//! ```yaml
//! devices:
//!   - id: press
//!     protocol:
//!       modbus:
//!         host: 10.0.0.7
//!         unit_id: 1
//!     variables:
//!       default:
//!         speed: hr.w2
//!         running: co.x0
//!   - id: line-plc
//!     protocol:
//!       siemens:
//!         host: 10.0.0.2
//!         slot: 2
//!     variables:
//!       line:
//!         level: db2.r4
//!   - id: tank
//!     protocol:
//!       opcua:
//!         url: opc.tcp://10.0.0.5:4840
//!     variables:
//!       default:
//!         level: "2;Tank.Level"
//! ```
//!
//! The map named `default` is the map read when no map name is given.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use fieldlink_core::{parse_table, AddressGrammar, DeviceClient, DeviceFamily};
use fieldlink_modbus::{ModbusClient, ModbusConfig};
use fieldlink_opcua::{NodeId, OpcUaClient, OpcUaConfig, RealOpcUaTransport};
use fieldlink_siemens::{SiemensClient, SiemensConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BinError, BinResult};

/// Name of the map read when no map name is given.
pub const DEFAULT_MAP: &str = "default";

// =============================================================================
// Schema
// =============================================================================

/// Contents of a device file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldlinkConfig {
    /// Configured devices.
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// One device of the device file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device id used on the command line and in poll output.
    pub id: String,

    /// Protocol and connection settings.
    pub protocol: ProtocolConfig,

    /// Variable maps: map name -> variable name -> address.
    #[serde(default)]
    pub variables: BTreeMap<String, BTreeMap<String, String>>,
}

/// Protocol section of a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolConfig {
    /// Modbus/TCP device.
    Modbus(ModbusConfig),
    /// Siemens S7 PLC.
    Siemens(SiemensConfig),
    /// OPC-UA server.
    Opcua(OpcUaConfig),
}

impl ProtocolConfig {
    /// Device family of this protocol.
    pub fn family(&self) -> DeviceFamily {
        match self {
            Self::Modbus(_) => DeviceFamily::Modbus,
            Self::Siemens(_) => DeviceFamily::Siemens,
            Self::Opcua(_) => DeviceFamily::OpcUa,
        }
    }

    /// Host or endpoint, for display.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Modbus(c) => c.socket_addr(),
            Self::Siemens(c) => format!("{}:{}", c.host, c.port),
            Self::Opcua(c) => c.url.clone(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Modbus(c) => c.validate().map_err(|e| e.to_string()),
            Self::Siemens(c) => c.validate().map_err(|e| e.to_string()),
            Self::Opcua(c) => c.validate().map_err(|e| e.to_string()),
        }
    }
}

impl FieldlinkConfig {
    /// Returns the device with `id`.
    pub fn device(&self, id: &str) -> BinResult<&DeviceConfig> {
        self.devices
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| BinError::config(format!("unknown device '{id}'")))
    }

    /// Validates every device and every variable address.
    pub fn validate(&self) -> BinResult<()> {
        let mut ids = HashSet::new();
        for device in &self.devices {
            if device.id.trim().is_empty() {
                return Err(BinError::config("device id must not be empty"));
            }
            if !ids.insert(device.id.as_str()) {
                return Err(BinError::config(format!("duplicate device id '{}'", device.id)));
            }
            device.validate()?;
        }
        Ok(())
    }

    /// Non-fatal findings: devices without variables, empty maps.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.devices.is_empty() {
            warnings.push("No devices configured".to_string());
        }
        for device in &self.devices {
            if device.variables.is_empty() {
                warnings.push(format!("Device '{}' has no variable maps", device.id));
            }
            for (name, table) in &device.variables {
                if table.is_empty() {
                    warnings.push(format!("Variable map '{name}' of device '{}' is empty", device.id));
                }
            }
        }
        warnings
    }
}

impl DeviceConfig {
    /// Validates the protocol section and the variable addresses.
    pub fn validate(&self) -> BinResult<()> {
        self.protocol
            .validate()
            .map_err(|e| BinError::config(format!("device '{}': {e}", self.id)))?;

        for (map, table) in &self.variables {
            match self.protocol.family() {
                DeviceFamily::OpcUa => {
                    for (name, node) in table {
                        NodeId::parse(node).map_err(|e| {
                            BinError::config(format!("device '{}', map '{map}', variable '{name}': {e}", self.id))
                        })?;
                    }
                }
                family => {
                    parse_table(&AddressGrammar::for_family(family), table)
                        .map_err(|e| BinError::config(format!("device '{}', map '{map}': {e}", self.id)))?;
                }
            }
        }
        Ok(())
    }

    /// Creates a disconnected client with this device's variable maps registered.
    pub fn build_client(&self) -> BinResult<Arc<dyn DeviceClient>> {
        let client: Arc<dyn DeviceClient> = match &self.protocol {
            ProtocolConfig::Modbus(c) => Arc::new(ModbusClient::new(c.clone()).map_err(|e| self.init_error(e))?),
            ProtocolConfig::Siemens(c) => Arc::new(SiemensClient::new(c.clone()).map_err(|e| self.init_error(e))?),
            ProtocolConfig::Opcua(c) => Arc::new(
                OpcUaClient::with_transport(c.clone(), RealOpcUaTransport::new()).map_err(|e| self.init_error(e))?,
            ),
        };

        for (map, table) in &self.variables {
            let name = (map != DEFAULT_MAP).then_some(map.as_str());
            client.map_variables(table, name)?;
            debug!(device = %self.id, map = %map, count = table.len(), "Registered variable map");
        }

        info!(
            device = %self.id,
            family = %self.protocol.family(),
            endpoint = %self.protocol.endpoint(),
            "Device client created"
        );
        Ok(client)
    }

    fn init_error(&self, e: impl std::fmt::Display) -> BinError {
        BinError::init(format!("device '{}': {e}", self.id))
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Device file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`).
    Yaml,
    /// TOML (`.toml`).
    Toml,
}

impl ConfigFormat {
    /// Picks the format from a file extension. Anything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }

    fn file_format(self) -> config::FileFormat {
        match self {
            Self::Yaml => config::FileFormat::Yaml,
            Self::Toml => config::FileFormat::Toml,
        }
    }
}

/// Loads and validates a device file.
pub fn load_config(path: impl AsRef<Path>) -> BinResult<FieldlinkConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BinError::config(format!("Device file not found: {}", path.display())));
    }

    info!("Loading device file from: {}", path.display());
    let content = std::fs::read_to_string(path)
        .map_err(|e| BinError::io(format!("cannot read {}: {e}", path.display())))?;

    load_config_str(&content, ConfigFormat::from_path(path))
        .map_err(|e| e.with_context(format!("in {}", path.display())))
}

/// Parses and validates device file content.
pub fn load_config_str(content: &str, format: ConfigFormat) -> BinResult<FieldlinkConfig> {
    let config: FieldlinkConfig = config::Config::builder()
        .add_source(config::File::from_str(content, format.file_format()))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| BinError::config(e.to_string()))?;

    config.validate()?;
    debug!(devices = config.devices.len(), "Device file parsed");
    Ok(config)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
devices:
  - id: press
    protocol:
      modbus:
        host: 10.0.0.7
        unit_id: 1
        response_timeout: 500ms
    variables:
      default:
        speed: hr.w2
        running: co.x0
  - id: tank
    protocol:
      opcua:
        url: opc.tcp://10.0.0.5:4840
    variables:
      default:
        level: "2;Tank.Level"
"#;

    #[test]
    fn test_load_yaml() {
        let config = load_config_str(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.devices.len(), 2);

        let press = config.device("press").unwrap();
        match &press.protocol {
            ProtocolConfig::Modbus(c) => {
                assert_eq!(c.host, "10.0.0.7");
                assert_eq!(c.port, 502);
                assert_eq!(c.unit_id, 1);
                assert_eq!(c.response_timeout, std::time::Duration::from_millis(500));
            }
            other => panic!("expected modbus, got {other:?}"),
        }
        assert_eq!(press.variables["default"]["speed"], "hr.w2");
        assert_eq!(config.device("tank").unwrap().protocol.family(), DeviceFamily::OpcUa);
    }

    #[test]
    fn test_unknown_device() {
        let config = load_config_str(YAML, ConfigFormat::Yaml).unwrap();
        let err = config.device("boiler").unwrap_err();
        assert!(err.to_string().contains("unknown device 'boiler'"));
    }

    #[test]
    fn test_duplicate_id() {
        let yaml = r#"
devices:
  - id: press
    protocol:
      modbus:
        host: 10.0.0.7
  - id: press
    protocol:
      modbus:
        host: 10.0.0.8
"#;
        let err = load_config_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate device id 'press'"));
    }

    #[test]
    fn test_bad_address_rejected() {
        let yaml = r#"
devices:
  - id: press
    protocol:
      modbus:
        host: 10.0.0.7
    variables:
      default:
        speed: zz.w2
"#;
        let err = load_config_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert!(matches!(err, BinError::Configuration(_)));
        assert!(err.to_string().contains("press"));
    }

    #[test]
    fn test_bad_node_rejected() {
        let yaml = r#"
devices:
  - id: tank
    protocol:
      opcua:
        url: opc.tcp://10.0.0.5:4840
    variables:
      default:
        level: Tank.Level
"#;
        let err = load_config_str(yaml, ConfigFormat::Yaml).unwrap_err();
        assert!(err.to_string().contains("variable 'level'"));
    }

    #[test]
    fn test_protocol_validation() {
        let yaml = r#"
devices:
  - id: tank
    protocol:
      opcua:
        url: http://10.0.0.5
"#;
        assert!(load_config_str(yaml, ConfigFormat::Yaml).is_err());
    }

    #[test]
    fn test_toml() {
        let toml = r#"
[[devices]]
id = "line-plc"

[devices.protocol.siemens]
host = "10.0.0.2"
slot = 2
db_number = 5
"#;
        let config = load_config_str(toml, ConfigFormat::Toml).unwrap();
        match &config.devices[0].protocol {
            ProtocolConfig::Siemens(c) => {
                assert_eq!(c.slot, 2);
                assert_eq!(c.db_number, Some(5));
                assert_eq!(c.port, 102);
            }
            other => panic!("expected siemens, got {other:?}"),
        }
    }

    #[test]
    fn test_warnings() {
        let yaml = r#"
devices:
  - id: press
    protocol:
      modbus:
        host: 10.0.0.7
"#;
        let config = load_config_str(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.warnings(), vec!["Device 'press' has no variable maps".to_string()]);
        assert_eq!(FieldlinkConfig::default().warnings(), vec!["No devices configured".to_string()]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("devices.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("devices.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("devices")), ConfigFormat::Yaml);
    }
}
