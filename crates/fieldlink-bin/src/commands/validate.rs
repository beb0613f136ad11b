// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::config::load_config;
use crate::error::{BinError, BinResult};

/// Validates the device file without connecting to any device.
pub fn validate(cli: &Cli, args: &ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = load_config(config_path)?;
    let warnings = config.warnings();

    match args.format {
        OutputFormat::Text => {
            println!("✓ Device file is valid: {}", config_path.display());
            println!();
            println!("Devices: {}", config.devices.len());
            for device in &config.devices {
                println!(
                    "  {} ({}, {}): {} variable map(s)",
                    device.id,
                    device.protocol.family(),
                    device.protocol.endpoint(),
                    device.variables.len()
                );
            }

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed device file:");
                println!(
                    "{}",
                    serde_json::to_string_pretty(&config).unwrap_or_else(|_| "(serialization error)".to_string())
                );
            }
        }
        OutputFormat::Json => {
            let devices: Vec<_> = config
                .devices
                .iter()
                .map(|device| {
                    serde_json::json!({
                        "id": device.id,
                        "family": device.protocol.family(),
                        "endpoint": device.protocol.endpoint(),
                        "maps": device.variables.keys().collect::<Vec<_>>(),
                    })
                })
                .collect();
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "devices": devices,
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let text = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("cannot encode result: {e}")))?;
            println!("{text}");
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!("Strict mode: {} warning(s) found", warnings.len())));
    }

    Ok(())
}
