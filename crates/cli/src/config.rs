//! CLI configuration management

use anyhow::{Context, Result, anyhow};
use common::DeviceFilter;
use driver::{DataBits, Parity, SerialSettings, StopBits};
use protocol::SpectrumSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct McaConfig {
    #[serde(default)]
    pub general: GeneralSettings,
    #[serde(default)]
    pub usb: UsbSettings,
    #[serde(default)]
    pub serial: SerialPortSettings,
    #[serde(default)]
    pub spectrum: SpectrumSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsbSettings {
    /// VID:PID of the analyzers to enumerate
    pub filter: String,
    pub timeout_ms: u64,
    /// Re-read a configuration descriptor once if the first read fails
    pub retry_config_descriptor: bool,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            filter: DeviceFilter::default().to_string(),
            timeout_ms: 10_000,
            retry_config_descriptor: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialPortSettings {
    /// Port name; the first matching USB-serial port is used when unset
    pub port: Option<String>,
    pub baud_rate: u32,
    pub data_bits: u8,
    /// none, odd or even
    pub parity: String,
    pub stop_bits: u8,
    /// Maximum wait for the next byte
    pub timeout_ms: u64,
}

impl Default for SerialPortSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            data_bits: 8,
            parity: "none".to_string(),
            stop_bits: 1,
            timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SpectrumSettings {
    /// Channel count of the firmware build (512 or 4096)
    #[serde(default)]
    pub channels: SpectrumSize,
}

impl McaConfig {
    /// Load configuration from the specified path
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p
        } else {
            // Try standard locations in order
            let candidates = vec![
                Self::default_path(),
                PathBuf::from("/etc/capemca/capemca.toml"),
            ];

            candidates
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: McaConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::debug!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("{:#}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("capemca").join("capemca.toml")
        } else {
            PathBuf::from(".config/capemca/capemca.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                valid_levels.join(", ")
            ));
        }

        self.device_filter()?;

        // libusb waits forever on a zero timeout
        if self.usb.timeout_ms == 0 {
            return Err(anyhow!("[usb] timeout_ms must be greater than 0"));
        }
        if self.serial.timeout_ms == 0 {
            return Err(anyhow!("[serial] timeout_ms must be greater than 0"));
        }

        if self.serial.baud_rate == 0 {
            return Err(anyhow!("Serial baud rate must be greater than 0"));
        }
        data_bits(self.serial.data_bits)?;
        parity(&self.serial.parity)?;
        stop_bits(self.serial.stop_bits)?;

        Ok(())
    }

    pub fn device_filter(&self) -> Result<DeviceFilter> {
        DeviceFilter::parse(&self.usb.filter)
            .map_err(|e| anyhow!("Invalid [usb] filter: {}", e))
    }

    pub fn usb_timeout(&self) -> Duration {
        Duration::from_millis(self.usb.timeout_ms)
    }

    pub fn serial_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.timeout_ms)
    }

    /// Line settings for `port`, overriding the configured baud rate when given
    pub fn serial_settings(&self, port: &str, baud_rate: Option<u32>) -> Result<SerialSettings> {
        let baud_rate = baud_rate.unwrap_or(self.serial.baud_rate);
        if baud_rate == 0 {
            return Err(anyhow!("Serial baud rate must be greater than 0"));
        }

        Ok(SerialSettings {
            port: port.to_string(),
            baud_rate,
            data_bits: data_bits(self.serial.data_bits)?,
            parity: parity(&self.serial.parity)?,
            stop_bits: stop_bits(self.serial.stop_bits)?,
            timeout: self.serial_timeout(),
        })
    }
}

fn data_bits(bits: u8) -> Result<DataBits> {
    match bits {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(anyhow!("Invalid data bits {}, must be 5-8", other)),
    }
}

fn parity(parity: &str) -> Result<Parity> {
    match parity.to_ascii_lowercase().as_str() {
        "none" => Ok(Parity::None),
        "odd" => Ok(Parity::Odd),
        "even" => Ok(Parity::Even),
        other => Err(anyhow!(
            "Invalid parity '{}', must be one of: none, odd, even",
            other
        )),
    }
}

fn stop_bits(bits: u8) -> Result<StopBits> {
    match bits {
        1 => Ok(StopBits::One),
        2 => Ok(StopBits::Two),
        other => Err(anyhow!("Invalid stop bits {}, must be 1 or 2", other)),
    }
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}
