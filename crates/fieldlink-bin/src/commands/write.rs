// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `write` command.

use fieldlink_core::{AddressGrammar, DeviceFamily, PlcResult, Value};
use tracing::info;

use crate::cli::{Cli, WriteArgs};
use crate::error::BinResult;

/// Writes one value and prints a confirmation line.
pub async fn write(cli: &Cli, args: &WriteArgs) -> BinResult<()> {
    let client = super::connect_device(cli, &args.device).await?;
    let result = async {
        let value = parse_value(client.family(), &args.address, &args.value)?;
        client.write_value(&value, &args.address).await?;
        PlcResult::Ok(value)
    }
    .await;
    super::close(client.as_ref(), &args.device).await;

    let value = result?;
    info!(device = %args.device, address = %args.address, value = %value, "Value written");
    println!("{} {} <- {}", args.device, args.address, value);
    Ok(())
}

/// Parses the value text as the data type of `address`.
///
/// OPC-UA nodes carry no type in their address, so the text is passed on
/// unchanged.
pub fn parse_value(family: DeviceFamily, address: &str, text: &str) -> PlcResult<Value> {
    match family {
        DeviceFamily::OpcUa => Ok(Value::String(text.to_string())),
        family => {
            let address = AddressGrammar::for_family(family).parse(address)?;
            Value::parse_as(text, address.data_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_core::PlcError;

    #[test]
    fn test_parse_value_by_address_type() {
        assert_eq!(parse_value(DeviceFamily::Modbus, "hr.w2", "1500").unwrap(), Value::UInt16(1500));
        assert_eq!(parse_value(DeviceFamily::Modbus, "co.x0", "on").unwrap(), Value::Bool(true));
        assert_eq!(parse_value(DeviceFamily::Siemens, "db1.r4", "-2.5").unwrap(), Value::Float32(-2.5));
        assert_eq!(parse_value(DeviceFamily::Siemens, "mk8.3", "0").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_parse_value_errors() {
        assert!(matches!(
            parse_value(DeviceFamily::Modbus, "hr.w2", "70000").unwrap_err(),
            PlcError::InvalidValue { .. }
        ));
        assert!(matches!(
            parse_value(DeviceFamily::Modbus, "zz.w2", "1").unwrap_err(),
            PlcError::UnsupportedArea { .. }
        ));
    }

    #[test]
    fn test_opcua_value_is_text() {
        assert_eq!(
            parse_value(DeviceFamily::OpcUa, "2;Tank.Level", "3.5").unwrap(),
            Value::String("3.5".into())
        );
    }
}
