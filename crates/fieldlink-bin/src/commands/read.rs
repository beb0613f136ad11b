// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use crate::cli::{Cli, ReadArgs};
use crate::error::BinResult;

/// Reads one address and prints `{device_id, address, value}` as JSON.
pub async fn read(cli: &Cli, args: &ReadArgs) -> BinResult<()> {
    let client = super::connect_device(cli, &args.device).await?;
    let result = client.read_value(&args.address).await;
    super::close(client.as_ref(), &args.device).await;

    let output = serde_json::json!({
        "device_id": args.device,
        "address": args.address,
        "value": result?,
    });
    println!("{output}");
    Ok(())
}
