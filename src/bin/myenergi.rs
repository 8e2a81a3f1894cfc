//! Command line access to a myenergi hub.
//!
//! Connection settings come from `MYENERGI_*` environment variables, see
//! [`myenergi::envvars`].
//!
//! ```bash
//! myenergi status zappi
//! myenergi all --raw
//! myenergi zappi-mode eco --boost smart --kwh 20 --complete-by 0730
//! myenergi eddi-boost --heater 1 --minutes 30
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use myenergi::{
    defaults, envvars, ControlCommand, DeviceGateway, DeviceKind, GatewayConfig, ZappiBoost,
    ZappiMode,
};

#[derive(Parser)]
#[command(name = "myenergi", version, about = "Query and control a myenergi hub")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Status of one device
    Status {
        kind: Kind,
        /// Device serial (defaults to MYENERGI_EDDI_SERIAL / MYENERGI_ZAPPI_SERIAL)
        #[arg(long)]
        serial: Option<String>,
        /// Print the hub payload as received
        #[arg(long)]
        raw: bool,
    },
    /// Status of every device on the hub
    All {
        #[arg(long)]
        raw: bool,
    },
    /// Eddi and Zappi side by side; failures are reported per device
    Snapshot,
    /// Change Zappi charging mode
    ZappiMode {
        mode: Mode,
        #[arg(long)]
        serial: Option<String>,
        #[arg(long, value_enum, default_value = "none")]
        boost: Boost,
        #[arg(long, default_value_t = 0)]
        kwh: u32,
        /// Smart boost deadline, HHMM
        #[arg(long, default_value = "0000")]
        complete_by: String,
    },
    /// Start (or with --minutes 0, cancel) a manual Eddi boost
    EddiBoost {
        #[arg(long)]
        serial: Option<String>,
        /// 1/2 for heaters, 11/12 for relays
        #[arg(long, default_value_t = 1)]
        heater: u8,
        #[arg(long)]
        minutes: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Eddi,
    Zappi,
}

impl From<Kind> for DeviceKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Eddi => DeviceKind::Eddi,
            Kind::Zappi => DeviceKind::Zappi,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Fast,
    Eco,
    EcoPlus,
    Stop,
}

impl From<Mode> for ZappiMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Fast => ZappiMode::Fast,
            Mode::Eco => ZappiMode::Eco,
            Mode::EcoPlus => ZappiMode::EcoPlus,
            Mode::Stop => ZappiMode::Stop,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Boost {
    None,
    Manual,
    Smart,
}

impl From<Boost> for ZappiBoost {
    fn from(boost: Boost) -> Self {
        match boost {
            Boost::None => ZappiBoost::None,
            Boost::Manual => ZappiBoost::Manual,
            Boost::Smart => ZappiBoost::Smart,
        }
    }
}

/// Respects RUST_LOG, then LOG_LEVEL, defaulting to "info". Logs go to stderr so stdout
/// stays clean JSON.
fn init_tracing() {
    let log_level =
        std::env::var(envvars::LOG_LEVEL).unwrap_or_else(|_| defaults::LOG_LEVEL.to_string());

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn pick_serial(explicit: Option<String>, gateway: &DeviceGateway, kind: DeviceKind) -> Result<String> {
    explicit
        .or_else(|| gateway.serial(kind).map(str::to_owned))
        .with_context(|| format!("no {} serial given and none configured", kind))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env().context("reading hub configuration")?;
    let gateway = DeviceGateway::from_config(&config)?;

    match cli.command {
        Commands::Status { kind, serial, raw } => {
            let kind = DeviceKind::from(kind);
            let serial = pick_serial(serial, &gateway, kind)?;
            if raw {
                print_json(&gateway.fetch_raw(kind, &serial).await?)?;
            } else {
                print_json(&gateway.fetch_reading(kind, &serial).await?)?;
            }
        }
        Commands::All { raw } => {
            if raw {
                print_json(&gateway.fetch_all_raw().await?)?;
            } else {
                print_json(&gateway.fetch_all_readings().await?)?;
            }
        }
        Commands::Snapshot => print_json(&gateway.snapshot().await)?,
        Commands::ZappiMode {
            mode,
            serial,
            boost,
            kwh,
            complete_by,
        } => {
            let command = ControlCommand::ZappiMode {
                serial: pick_serial(serial, &gateway, DeviceKind::Zappi)?,
                mode: mode.into(),
                boost: boost.into(),
                kwh,
                complete_by,
            };
            print_json(&gateway.send_command(&command).await?)?;
        }
        Commands::EddiBoost {
            serial,
            heater,
            minutes,
        } => {
            let serial = pick_serial(serial, &gateway, DeviceKind::Eddi)?;
            let command = ControlCommand::eddi_boost(serial, heater, minutes);
            print_json(&gateway.send_command(&command).await?)?;
        }
    }

    Ok(())
}
