//! CapeMCA UART client
//!
//! Reads the spectrum and/or packet zero from one analyzer on a serial port.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use cli::config::{McaConfig, expand_path};
use cli::output::{version_banner, write_report};
use cli::{acquire, first_device};
use common::setup_logging;
use driver::{DeviceLocation, DeviceRegistry, DeviceSession, SerialHost, SerialTransport};
use protocol::RequestType;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "capemca-uart")]
#[command(
    about = "CapeMCA UART Command Line Interface",
    disable_help_flag = true,
    disable_version_flag = true
)]
#[command(long_about = "
Read energy spectrum and/or packet zero from a CapeMCA on a serial port.
Output is streamed to the console.

EXAMPLES:
    # Read a 2048 channel spectrum from the first attached MCA
    capemca-uart

    # Read packet zero only from a given port
    capemca-uart -p=/dev/ttyACM0 -q=0

CONFIGURATION:
    The configuration file is looked up in the following order:
    1. Path specified with --config
    2. ~/.config/capemca/capemca.toml
    3. /etc/capemca/capemca.toml
    4. Built-in defaults
")]
struct Args {
    /// Display this help message
    #[arg(short = 'h', short_alias = '?', long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Print version info
    #[arg(short = 'v', long)]
    version: bool,

    /// Baud rate in bit/s (default 115200)
    #[arg(short = 'b', value_name = "BAUD")]
    baud_rate: Option<u32>,

    /// Serial port (default: first MCA found)
    #[arg(short = 'p', value_name = "PORT")]
    port: Option<String>,

    /// Request type {0,1,2,4,8,16,32+1,32+2,32+4,32+8,32+16}
    #[arg(short = 'q', value_name = "REQUEST", default_value_t = RequestType::default())]
    request: RequestType,

    /// Zero spectrum before request
    #[arg(short = 'z')]
    zero: bool,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    if args.version {
        println!("{}", version_banner("Uart Test"));
        return Ok(ExitCode::SUCCESS);
    }

    if args.save_config {
        let path = McaConfig::default_path();
        McaConfig::default()
            .save(&path)
            .context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = match args.config {
        Some(ref path) => {
            McaConfig::load(Some(expand_path(path))).context("Failed to load configuration")?
        }
        None => McaConfig::load_or_default(),
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);
    setup_logging(log_level).context("Failed to setup logging")?;

    info!("{}", version_banner("Uart Test"));

    let timeout = config.serial_timeout();
    let port = args.port.clone().or_else(|| config.serial.port.clone());
    let session = match port {
        Some(port) => {
            let settings = config.serial_settings(&port, args.baud_rate)?;
            Some(
                DeviceSession::new(
                    DeviceLocation::new(port.clone(), port),
                    SerialTransport::new(settings),
                )
                .with_timeout(timeout),
            )
        }
        None => {
            let mut host = SerialHost::new(config.serial_settings("", args.baud_rate)?);
            let filter = config.device_filter()?;
            info!("Looking for a serial MCA matching {}", filter);
            first_device(&mut host, &filter, timeout).context("Failed to list serial ports")?
        }
    };

    let Some(session) = session else {
        error!("Device not connected or COM port incorrect");
        return Ok(ExitCode::FAILURE);
    };

    let mut registry = DeviceRegistry::with_timeout(timeout);
    registry.add(session);

    info!("Connecting to MCA");
    let acquisition = acquire(&mut registry, args.request, args.zero);
    write_report(&mut io::stdout().lock(), &acquisition).context("Failed to write output")?;

    registry.unenumerate();
    info!("Done");

    Ok(if acquisition.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
