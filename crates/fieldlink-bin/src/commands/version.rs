// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints version information of every component.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("fieldlink - industrial field device client");
    println!();
    println!("Version Information:");
    println!("  fieldlink-bin:     {}", env!("CARGO_PKG_VERSION"));
    println!("  fieldlink-core:    {}", fieldlink_core::VERSION);
    println!("  fieldlink-modbus:  {}", fieldlink_modbus::VERSION);
    println!("  fieldlink-siemens: {}", fieldlink_siemens::VERSION);
    println!("  fieldlink-opcua:   {}", fieldlink_opcua::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
