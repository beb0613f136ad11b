// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `poll` command.
//!
//! ```text
//! {"timestamp":"2025-06-01T08:00:00.120Z","device_id":"press","values":{"running":true,"speed":1500}}
//! ```
//!
//! One JSON line per cycle on stdout. Communication faults are logged and
//! the next cycle tries again; any other error ends the command.

use chrono::{DateTime, Utc};
use fieldlink_core::{DeviceClient, PlcError, VariableValues};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cli::{Cli, PollArgs};
use crate::config::DEFAULT_MAP;
use crate::error::{BinError, BinResult};

/// One poll cycle of one device.
#[derive(Debug, Clone, Serialize)]
pub struct PollRecord {
    /// Time the read completed.
    pub timestamp: DateTime<Utc>,
    /// Device id from the device file.
    pub device_id: String,
    /// Variable values; `null` for values that could not be decoded.
    pub values: VariableValues,
}

impl PollRecord {
    /// Creates a record stamped now.
    pub fn new(device_id: impl Into<String>, values: VariableValues) -> Self {
        Self {
            timestamp: Utc::now(),
            device_id: device_id.into(),
            values,
        }
    }

    /// Serializes the record as one JSON line.
    pub fn to_json_line(&self) -> BinResult<String> {
        serde_json::to_string(self).map_err(|e| BinError::runtime(format!("cannot encode poll record: {e}")))
    }
}

/// Polls a variable map until `--count` cycles are done or Ctrl-C.
pub async fn poll(cli: &Cli, args: &PollArgs) -> BinResult<()> {
    if args.interval.is_zero() {
        return Err(BinError::config("poll interval must be greater than 0"));
    }
    let map = args.map.as_deref().filter(|name| *name != DEFAULT_MAP);

    let client = super::connect_device(cli, &args.device).await?;
    info!(device = %args.device, map = map.unwrap_or(DEFAULT_MAP), interval = ?args.interval, "Polling");

    let result = poll_loop(client.as_ref(), args, map).await;
    super::close(client.as_ref(), &args.device).await;
    result
}

async fn poll_loop(client: &dyn DeviceClient, args: &PollArgs, map: Option<&str>) -> BinResult<()> {
    let mut ticker = tokio::time::interval(args.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut cycles = 0u64;
    while args.count.map_or(true, |count| cycles < count) {
        tokio::select! {
            _ = &mut shutdown => {
                info!(cycles, "Interrupted");
                break;
            }
            _ = ticker.tick() => {}
        }
        cycles += 1;

        match client.read_variable_map(map, 0).await {
            Ok(values) => println!("{}", PollRecord::new(&args.device, values).to_json_line()?),
            Err(PlcError::NotConnected) => {
                warn!(device = %args.device, "Connection lost, reconnecting");
                if let Err(e) = client.connect().await {
                    warn!(device = %args.device, error = %e, "Reconnect failed");
                }
            }
            Err(e) if e.is_communication() => {
                warn!(device = %args.device, error = %e, "Poll cycle failed");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldlink_core::Value;

    #[test]
    fn test_record_shape() {
        let mut values = VariableValues::new();
        values.insert("speed".to_string(), Some(Value::UInt16(1500)));
        values.insert("running".to_string(), Some(Value::Bool(true)));
        values.insert("level".to_string(), None);

        let record = PollRecord::new("press", values);
        let json: serde_json::Value = serde_json::from_str(&record.to_json_line().unwrap()).unwrap();

        assert_eq!(json["device_id"], "press");
        assert_eq!(json["values"]["speed"], 1500);
        assert_eq!(json["values"]["running"], true);
        assert!(json["values"]["level"].is_null());

        let stamp = json["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
    }
}
