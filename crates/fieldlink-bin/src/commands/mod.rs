// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod poll;
mod read;
mod validate;
mod version;
mod write;

pub use poll::{poll, PollRecord};
pub use read::read;
pub use validate::validate;
pub use version::version;
pub use write::{parse_value, write};

use std::sync::Arc;

use fieldlink_core::DeviceClient;
use tracing::warn;

use crate::cli::{Cli, Commands};
use crate::config::load_config;
use crate::error::{BinError, BinResult};

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match &cli.command {
        Commands::Read(args) => read::read(&cli, args).await,
        Commands::Write(args) => write::write(&cli, args).await,
        Commands::Poll(args) => poll::poll(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads the device file and connects to device `id`.
async fn connect_device(cli: &Cli, id: &str) -> BinResult<Arc<dyn DeviceClient>> {
    let config = load_config(&cli.config)?;
    let client = config.device(id)?.build_client()?;
    client
        .connect()
        .await
        .map_err(|e| BinError::from(e).with_context(format!("connecting to '{id}'")))?;
    Ok(client)
}

/// Disconnects, logging instead of failing: the command result matters more.
async fn close(client: &dyn DeviceClient, id: &str) {
    if let Err(e) = client.disconnect().await {
        warn!(device = %id, error = %e, "Disconnect failed");
    }
}
