// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC-UA client configuration.

use std::time::Duration;

use fieldlink_core::{ClientSettings, DeviceFamily};
use serde::{Deserialize, Serialize};

use crate::error::{OpcUaError, OpcUaResult};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

/// Configuration of one OPC-UA server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpcUaConfig {
    /// Endpoint URL, e.g. `opc.tcp://10.0.0.5:4840`.
    pub url: String,

    /// Timeout of every request (default: 4s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// How long to wait for exclusive access to the session.
    #[serde(default = "default_access_timeout", with = "humantime_serde")]
    pub access_timeout: Duration,

    /// Minimum time between the start of two accesses.
    #[serde(default = "default_pacing", with = "humantime_serde")]
    pub pacing: Duration,

    /// Connect before an access when the session is down.
    #[serde(default)]
    pub auto_connect: bool,

    /// Close the session after a communication error.
    #[serde(default)]
    pub disconnect_on_error: bool,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_access_timeout() -> Duration {
    ClientSettings::opcua().access_timeout
}

fn default_pacing() -> Duration {
    ClientSettings::opcua().pacing
}

impl OpcUaConfig {
    /// Creates a configuration with defaults for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            access_timeout: default_access_timeout(),
            pacing: default_pacing(),
            auto_connect: false,
            disconnect_on_error: false,
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the pacing interval.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Enables auto-connect.
    pub fn with_auto_connect(mut self, enabled: bool) -> Self {
        self.auto_connect = enabled;
        self
    }

    /// Enables disconnect on communication errors.
    pub fn with_disconnect_on_error(mut self, enabled: bool) -> Self {
        self.disconnect_on_error = enabled;
        self
    }

    /// Protocol-neutral settings for the client.
    pub fn to_settings(&self) -> OpcUaResult<ClientSettings> {
        ClientSettings::builder(DeviceFamily::OpcUa)
            .access_timeout(self.access_timeout)
            .pacing(self.pacing)
            .auto_connect(self.auto_connect)
            .disconnect_on_error(self.disconnect_on_error)
            .build()
            .map_err(|e| OpcUaError::configuration(e.to_string()))
    }

    /// Validates this configuration.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.url.is_empty() {
            return Err(OpcUaError::configuration("url is required"));
        }
        if !self.url.starts_with("opc.tcp://") && !self.url.starts_with("https://") {
            return Err(OpcUaError::configuration(format!(
                "url must use opc.tcp:// or https://, got '{}'",
                self.url
            )));
        }
        if self.timeout.is_zero() {
            return Err(OpcUaError::configuration("timeout must be greater than 0"));
        }
        self.to_settings().map(|_| ())
    }
}
