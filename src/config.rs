use std::env;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::{Credentials, Error, Result};

pub mod envvars {
    pub const BASE_URL: &str = "MYENERGI_BASE_URL";
    pub const HUB_SERIAL: &str = "MYENERGI_HUB_SERIAL";
    pub const PASSWORD: &str = "MYENERGI_PASSWORD";
    pub const TIMEOUT_SECS: &str = "MYENERGI_TIMEOUT_SECS";
    pub const EDDI_SERIAL: &str = "MYENERGI_EDDI_SERIAL";
    pub const ZAPPI_SERIAL: &str = "MYENERGI_ZAPPI_SERIAL";

    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

pub mod defaults {
    pub const BASE_URL: &str = "https://s18.myenergi.net";
    pub const TIMEOUT_SECS: u64 = 10;
    pub const LOG_LEVEL: &str = "info";
}

fn default_base_url() -> String {
    defaults::BASE_URL.to_owned()
}

fn default_timeout_secs() -> u64 {
    defaults::TIMEOUT_SECS
}

/// Hub connection settings
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub hub_serial: String,
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub eddi_serial: Option<String>,
    #[serde(default)]
    pub zappi_serial: Option<String>,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("hub_serial", &self.hub_serial)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("eddi_serial", &self.eddi_serial)
            .field("zappi_serial", &self.zappi_serial)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(hub_serial: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            base_url: default_base_url(),
            hub_serial: hub_serial.into(),
            password: password.into(),
            timeout_secs: defaults::TIMEOUT_SECS,
            eddi_serial: None,
            zappi_serial: None,
        }
    }

    /// Read settings from `MYENERGI_*` environment variables.
    /// Hub serial and password are required, everything else has a default.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(required(envvars::HUB_SERIAL)?, required(envvars::PASSWORD)?);

        if let Some(url) = optional(envvars::BASE_URL) {
            config.base_url = url;
        }
        if let Some(secs) = optional(envvars::TIMEOUT_SECS) {
            config.timeout_secs = secs.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a whole number of seconds", envvars::TIMEOUT_SECS))
            })?;
        }
        config.eddi_serial = optional(envvars::EDDI_SERIAL);
        config.zappi_serial = optional(envvars::ZAPPI_SERIAL);

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.hub_serial.clone(), self.password.clone())
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| Error::Config(format!("{} is not set", name)))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
