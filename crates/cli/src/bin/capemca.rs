//! CapeMCA USB client
//!
//! Reads the energy spectrum from every attached analyzer, sums the spectra
//! and streams the result to stdout as CSV.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use cli::acquire;
use cli::config::{McaConfig, expand_path};
use cli::output::{version_banner, write_report};
use common::setup_logging;
use driver::{DeviceRegistry, UsbHost};
use protocol::RequestType;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "capemca")]
#[command(
    about = "CapeMCA Command Line Interface",
    disable_help_flag = true,
    disable_version_flag = true
)]
#[command(long_about = "
Read energy spectrum from 1 or more macropixels.
Spectral output is streamed to the console.

EXAMPLES:
    # Sum the spectra of every attached MCA
    capemca

    # Zero the MCAs first, then read spectrum and packet zero
    capemca -z -q=34

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

    /// Request type {0,1,2,4,8,16,32+1,32+2,32+4,32+8,32+16}
    #[arg(short = 'q', value_name = "REQUEST")]
    request: Option<RequestType>,

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
        println!("{}", version_banner("CLI"));
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

    info!("{}", version_banner("CLI"));

    let request = args
        .request
        .unwrap_or_else(|| RequestType::spectrum(config.spectrum.channels, false));
    let filter = config.device_filter()?;

    let mut host = UsbHost::new()
        .context("Failed to initialize USB")?
        .with_config_retry(config.usb.retry_config_descriptor);
    let mut registry = DeviceRegistry::with_timeout(config.usb_timeout());

    info!("Enumerating MCAs matching {}", filter);
    let found = registry
        .enumerate(&mut host, &filter)
        .context("Failed to enumerate USB devices")?;
    info!("Found {} MCAs", found);
    if found == 0 {
        error!("Device not connected or driver not installed");
        return Ok(ExitCode::FAILURE);
    }

    let acquisition = acquire(&mut registry, request, args.zero);
    write_report(&mut io::stdout().lock(), &acquisition).context("Failed to write output")?;

    registry.unenumerate();
    info!("Done");

    Ok(if acquisition.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
