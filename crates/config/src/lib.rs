// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_name() -> String {
    "bench".to_string()
}

fn default_device_address() -> u8 {
    0x00
}

fn default_clock_hz() -> u64 {
    50_000_000
}

fn default_true() -> bool {
    true
}

/// Broadcast device address; never valid as a bench's own address.
pub const BROADCAST_ADDRESS: u8 = 0xFF;

/// Slowest clock accepted, so that one millisecond is at least one tick.
pub const MIN_CLOCK_HZ: u64 = 1_000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported schema_version '{0}'; supported versions: '1.0'")]
    SchemaVersion(String),
    #[error("clock_hz must be at least {MIN_CLOCK_HZ}, got {0}")]
    ClockTooSlow(u64),
    #[error("device_address 0xFF is the broadcast address and cannot be used as a bench address")]
    BroadcastSelfAddress,
    #[error("watchdog.max_timeout_ms must be greater than zero")]
    ZeroWatchdogCeiling,
    #[error("I2C address {0:#04x} does not fit in 7 bits")]
    EepromAddress(u8),
    #[error("peripherals.ticks_per_byte must be greater than zero")]
    ZeroByteInterval,
    #[error("session step {index}: {reason}")]
    Step { index: usize, reason: String },
    #[error("limit 'max_ticks' must be greater than zero")]
    ZeroMaxTicks,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Saturation ceiling for the watchdog register, in milliseconds.
    #[serde(default = "WatchdogConfig::default_ceiling")]
    pub max_timeout_ms: u64,
    /// Reset value of the watchdog register (0 disables the timeout).
    #[serde(default = "WatchdogConfig::default_ceiling")]
    pub default_timeout_ms: u64,
}

impl WatchdogConfig {
    fn default_ceiling() -> u64 {
        100
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            max_timeout_ms: Self::default_ceiling(),
            default_timeout_ms: Self::default_ceiling(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BootConfig {
    #[serde(default = "default_true")]
    pub auto_boot: bool,
    /// Power-on delay before the first EEPROM access.
    #[serde(default = "BootConfig::default_stabilization")]
    pub stabilization_cycles: u64,
    /// Upper bound on one EEPROM transaction before the load fails with a timeout.
    #[serde(default = "BootConfig::default_i2c_timeout")]
    pub i2c_timeout_cycles: u64,
    #[serde(default = "default_true")]
    pub verify_crc: bool,
}

impl BootConfig {
    fn default_stabilization() -> u64 {
        1_000
    }

    fn default_i2c_timeout() -> u64 {
        100_000
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            auto_boot: true,
            stabilization_cycles: Self::default_stabilization(),
            i2c_timeout_cycles: Self::default_i2c_timeout(),
            verify_crc: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EepromConfig {
    /// 7-bit I2C address of the boot EEPROM on channel 0.
    #[serde(default = "EepromConfig::default_address")]
    pub address: u8,
    #[serde(default = "EepromConfig::default_size")]
    pub size: String, // e.g. "32KB"
    /// Binary image preloaded into the simulated EEPROM.
    #[serde(default)]
    pub image: Option<PathBuf>,
}

impl EepromConfig {
    fn default_address() -> u8 {
        0x50
    }

    fn default_size() -> String {
        "32KB".to_string()
    }
}

impl Default for EepromConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            size: Self::default_size(),
            image: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PeripheralTiming {
    #[serde(default = "PeripheralTiming::default_i2c_latency")]
    pub i2c_latency_cycles: u32,
    #[serde(default = "PeripheralTiming::default_spi_cycles")]
    pub spi_cycles_per_bit: u32,
    /// Transport pacing: one byte is offered every `ticks_per_byte` ticks.
    #[serde(default = "PeripheralTiming::default_ticks_per_byte")]
    pub ticks_per_byte: u32,
}

impl PeripheralTiming {
    fn default_i2c_latency() -> u32 {
        8
    }

    fn default_spi_cycles() -> u32 {
        2
    }

    fn default_ticks_per_byte() -> u32 {
        1
    }
}

impl Default for PeripheralTiming {
    fn default() -> Self {
        Self {
            i2c_latency_cycles: Self::default_i2c_latency(),
            spi_cycles_per_bit: Self::default_spi_cycles(),
            ticks_per_byte: Self::default_ticks_per_byte(),
        }
    }
}

/// Top-level bench description.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_device_address")]
    pub device_address: u8,
    #[serde(default = "default_clock_hz")]
    pub clock_hz: u64,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub boot: BootConfig,
    #[serde(default)]
    pub eeprom: EepromConfig,
    #[serde(default)]
    pub peripherals: PeripheralTiming,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: default_name(),
            device_address: default_device_address(),
            clock_hz: default_clock_hz(),
            watchdog: WatchdogConfig::default(),
            boot: BootConfig::default(),
            eeprom: EepromConfig::default(),
            peripherals: PeripheralTiming::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bench config at {:?}", path))?;
        let mut config: Self =
            serde_yaml::from_str(&content).context("Failed to parse bench config YAML")?;
        config.validate()?;

        // Image paths are relative to the config file.
        if let Some(image) = config.eeprom.image.take() {
            let resolved = if image.is_relative() {
                path.parent().unwrap_or_else(|| Path::new(".")).join(image)
            } else {
                image
            };
            config.eeprom.image = Some(resolved);
        }

        tracing::debug!("Loaded bench config '{}' from {:?}", config.name, path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != "1.0" {
            return Err(ConfigError::SchemaVersion(self.schema_version.clone()));
        }
        if self.clock_hz < MIN_CLOCK_HZ {
            return Err(ConfigError::ClockTooSlow(self.clock_hz));
        }
        if self.device_address == BROADCAST_ADDRESS {
            return Err(ConfigError::BroadcastSelfAddress);
        }
        if self.watchdog.max_timeout_ms == 0 {
            return Err(ConfigError::ZeroWatchdogCeiling);
        }
        if self.eeprom.address > 0x7F {
            return Err(ConfigError::EepromAddress(self.eeprom.address));
        }
        if self.peripherals.ticks_per_byte == 0 {
            return Err(ConfigError::ZeroByteInterval);
        }
        Ok(())
    }

    /// Number of clock ticks in one millisecond.
    pub fn cycles_per_ms(&self) -> u64 {
        self.clock_hz / 1_000
    }

    pub fn eeprom_size(&self) -> Result<u64> {
        parse_size(&self.eeprom.size)
            .with_context(|| format!("Invalid eeprom.size '{}'", self.eeprom.size))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WriteDetails {
    pub addr: u8,
    pub value: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReadDetails {
    pub addr: u8,
    #[serde(default)]
    pub expect: Option<u64>,
    #[serde(default)]
    pub mask: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GpioDetails {
    pub bank: u8,
    pub value: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct InputDetails {
    #[serde(default)]
    pub temperature: Option<u8>,
    #[serde(default)]
    pub currents: Option<[u16; 4]>,
    #[serde(default)]
    pub voltages: Option<[u16; 2]>,
    #[serde(default)]
    pub switch_readback: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WriteStep {
    pub write: WriteDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReadStep {
    pub read: ReadDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WaitStep {
    pub wait_ticks: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GpioStep {
    pub set_gpio: GpioDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InputStep {
    pub set_inputs: InputDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WaitBootStep {
    /// Upper bound on ticks spent waiting for the boot loader to settle.
    pub wait_boot: u64,
}

/// One host-side action in a session script.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum SessionStep {
    Write(WriteStep),
    Read(ReadStep),
    Wait(WaitStep),
    SetGpio(GpioStep),
    SetInputs(InputStep),
    WaitBoot(WaitBootStep),
}

fn default_max_ticks() -> u64 {
    10_000_000
}

/// Scripted host session run against a simulated bench.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionScript {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Overall tick budget for the whole session.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Device address used in outgoing packets; defaults to the bench address.
    #[serde(default)]
    pub target_address: Option<u8>,
    #[serde(default)]
    pub steps: Vec<SessionStep>,
}

impl SessionScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_str(&contents).context("Failed to parse session script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != "1.0" {
            return Err(ConfigError::SchemaVersion(self.schema_version.clone()));
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::ZeroMaxTicks);
        }
        for (index, step) in self.steps.iter().enumerate() {
            if let SessionStep::SetGpio(GpioStep { set_gpio }) = step {
                if set_gpio.bank > 3 {
                    return Err(ConfigError::Step {
                        index,
                        reason: format!("GPIO bank {} out of range 0-3", set_gpio.bank),
                    });
                }
            }
        }
        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
