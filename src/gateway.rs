//! Device operations on top of the authenticated client.

use http::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::telemetry::{device_list, normalize, normalize_all, DeviceKind, NormalizedReading};
use crate::{AuthenticatedHttpClient, Credentials, Error, GatewayConfig, Result};

const ALL_DEVICES_PATH: &str = "/cgi-jstatus-*";

/// Zappi charging mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZappiMode {
    Fast = 1,
    Eco = 2,
    EcoPlus = 3,
    Stop = 4,
}

/// Zappi boost flavour sent along with a mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZappiBoost {
    #[default]
    None = 0,
    Manual = 10,
    Smart = 11,
}

/// Manual boost code understood by the Eddi endpoint
const EDDI_MANUAL_BOOST: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    ZappiMode {
        serial: String,
        mode: ZappiMode,
        boost: ZappiBoost,
        /// Energy to add when boosting
        kwh: u32,
        /// Smart boost deadline as `HHMM`
        complete_by: String,
    },
    EddiBoost {
        serial: String,
        /// 1/2 for heater outputs, 11/12 for relays
        heater: u8,
        /// 0 cancels a running boost
        minutes: u32,
    },
}

impl ControlCommand {
    /// Plain mode change, no boost
    pub fn zappi_mode(serial: impl Into<String>, mode: ZappiMode) -> Self {
        ControlCommand::ZappiMode {
            serial: serial.into(),
            mode,
            boost: ZappiBoost::None,
            kwh: 0,
            complete_by: "0000".to_owned(),
        }
    }

    pub fn eddi_boost(serial: impl Into<String>, heater: u8, minutes: u32) -> Self {
        ControlCommand::EddiBoost {
            serial: serial.into(),
            heater,
            minutes,
        }
    }

    /// Endpoint path encoding this command
    pub fn path(&self) -> Result<String> {
        match self {
            ControlCommand::ZappiMode {
                serial,
                mode,
                boost,
                kwh,
                complete_by,
            } => {
                if !is_hhmm(complete_by) {
                    return Err(Error::InvalidCommand(format!(
                        "completion time \"{}\" is not HHMM",
                        complete_by
                    )));
                }
                Ok(format!(
                    "/cgi-zappi-mode-Z{}-{}-{}-{}-{}",
                    checked_serial(serial)?,
                    *mode as u8,
                    *boost as u8,
                    kwh,
                    complete_by
                ))
            }
            ControlCommand::EddiBoost {
                serial,
                heater,
                minutes,
            } => {
                if !matches!(heater, 1 | 2 | 11 | 12) {
                    return Err(Error::InvalidCommand(format!("no heater output {}", heater)));
                }
                Ok(format!(
                    "/cgi-eddi-boost-E{}-{}-{}-{}",
                    checked_serial(serial)?,
                    EDDI_MANUAL_BOOST,
                    heater,
                    minutes
                ))
            }
        }
    }
}

fn is_hhmm(s: &str) -> bool {
    s.len() == 4
        && s.bytes().all(|b| b.is_ascii_digit())
        && &s[..2] < "24"
        && &s[2..] < "60"
}

fn checked_serial(serial: &str) -> Result<&str> {
    if !serial.is_empty() && serial.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(serial)
    } else {
        Err(Error::InvalidCommand(format!("bad device serial \"{}\"", serial)))
    }
}

/// Status path of a single device
pub fn status_path(kind: DeviceKind, serial: &str) -> Result<String> {
    Ok(format!(
        "/cgi-jstatus-{}{}",
        kind.serial_prefix(),
        checked_serial(serial)?
    ))
}

/// Result of one device fetch, as handed to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reading: Option<NormalizedReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            reading: None,
            error: Some(message.into()),
        }
    }
}

impl From<Result<NormalizedReading>> for FetchOutcome {
    fn from(result: Result<NormalizedReading>) -> Self {
        match result {
            Ok(reading) => Self {
                success: true,
                reading: Some(reading),
                error: None,
            },
            Err(e) => Self::failed(e.to_string()),
        }
    }
}

/// Eddi and Zappi state fetched side by side
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubSnapshot {
    pub eddi: FetchOutcome,
    pub zappi: FetchOutcome,
}

/// Logical device operations against one hub.
///
/// Owns the hub credentials. Calls share nothing but the base URL and credentials, so
/// they may run concurrently and fail independently.
#[derive(Debug, Clone)]
pub struct DeviceGateway {
    client: AuthenticatedHttpClient,
    base_url: Url,
    credentials: Credentials,
    eddi_serial: Option<String>,
    zappi_serial: Option<String>,
}

impl DeviceGateway {
    pub fn new(
        client: AuthenticatedHttpClient,
        base_url: &str,
        credentials: Credentials,
    ) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            credentials,
            eddi_serial: None,
            zappi_serial: None,
        })
    }

    /// Gateway over a `reqwest` transport, with serials and timeout from the config
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let client = AuthenticatedHttpClient::with_timeout(config.timeout())?;
        Ok(Self::new(client, &config.base_url, config.credentials())?
            .with_serials(config.eddi_serial.clone(), config.zappi_serial.clone()))
    }

    /// Serials used by [`snapshot`](Self::snapshot)
    pub fn with_serials(mut self, eddi: Option<String>, zappi: Option<String>) -> Self {
        self.eddi_serial = eddi;
        self.zappi_serial = zappi;
        self
    }

    pub fn serial(&self, kind: DeviceKind) -> Option<&str> {
        match kind {
            DeviceKind::Eddi => self.eddi_serial.as_deref(),
            DeviceKind::Zappi => self.zappi_serial.as_deref(),
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.base_url.join(path)?;
        let response = self
            .client
            .send(&self.credentials, Method::GET, &url, Vec::new())
            .await?;

        if !response.status().is_success() {
            return Err(Error::UnexpectedStatus(response.status().as_u16()));
        }

        serde_json::from_slice(response.body())
            .map_err(|e| Error::MalformedResponse(format!("{}: {}", path, e)))
    }

    /// Raw status payload of one device
    #[instrument(skip(self))]
    pub async fn fetch_raw(&self, kind: DeviceKind, serial: &str) -> Result<Value> {
        self.get_json(&status_path(kind, serial)?).await
    }

    /// Raw status payload of every device on the hub
    #[instrument(skip(self))]
    pub async fn fetch_all_raw(&self) -> Result<Value> {
        self.get_json(ALL_DEVICES_PATH).await
    }

    /// Normalized status of one device. A payload without a list for `kind` is malformed;
    /// an empty list gives default values.
    pub async fn fetch_reading(&self, kind: DeviceKind, serial: &str) -> Result<NormalizedReading> {
        let payload = self.fetch_raw(kind, serial).await?;

        if device_list(kind, &payload).is_none() {
            return Err(Error::MalformedResponse(format!(
                "no \"{}\" list in response",
                kind.key()
            )));
        }

        Ok(normalize(kind, &payload))
    }

    /// Normalized status of every Eddi and Zappi on the hub
    pub async fn fetch_all_readings(&self) -> Result<Vec<NormalizedReading>> {
        let payload = self.fetch_all_raw().await?;

        if !payload.is_array() && !payload.is_object() {
            return Err(Error::MalformedResponse(format!(
                "unexpected {} payload",
                ALL_DEVICES_PATH
            )));
        }

        Ok(DeviceKind::ALL
            .iter()
            .flat_map(|&kind| normalize_all(kind, &payload))
            .collect())
    }

    /// Send a mode change or boost; returns the hub's JSON acknowledgement.
    #[instrument(skip(self))]
    pub async fn send_command(&self, command: &ControlCommand) -> Result<Value> {
        let path = command.path()?;
        let ack = self.get_json(&path).await?;
        debug!(%ack, "command acknowledged");
        Ok(ack)
    }

    /// Fetch the configured Eddi and Zappi concurrently. Never fails as a whole;
    /// each side reports its own outcome.
    pub async fn snapshot(&self) -> HubSnapshot {
        let (eddi, zappi) = tokio::join!(
            self.outcome(DeviceKind::Eddi),
            self.outcome(DeviceKind::Zappi)
        );
        HubSnapshot { eddi, zappi }
    }

    async fn outcome(&self, kind: DeviceKind) -> FetchOutcome {
        let Some(serial) = self.serial(kind) else {
            return FetchOutcome::failed(format!("no {} serial configured", kind));
        };

        let result = self.fetch_reading(kind, serial).await;
        if let Err(e) = &result {
            warn!(%kind, error = %e, "device fetch failed");
        }
        result.into()
    }
}
