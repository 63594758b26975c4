// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::eeprom::Eeprom24;
use crate::peripherals::i2c::SimI2cMaster;
use crate::peripherals::spi::SimSpiMaster;
use crate::peripherals::uart::{HostPort, UartLink};
use crate::{Engine, EngineSettings};
use anyhow::Context;
use rfctl_config::EngineConfig;
use tracing::info;

/// Builds a simulated bench from a config: a UART link, an EEPROM on I2C
/// channel 0, an empty channel 1 and two SPI loopback masters.
/// The EEPROM image named by the config is loaded if present.
pub fn build_bench(config: &EngineConfig) -> anyhow::Result<(Engine, HostPort)> {
    let image = match &config.eeprom.image {
        Some(path) => {
            info!("Loading EEPROM image: {:?}", path);
            Some(
                std::fs::read(path)
                    .with_context(|| format!("Failed to read EEPROM image {:?}", path))?,
            )
        }
        None => None,
    };
    build_bench_with_image(config, image.as_deref())
}

/// Like [`build_bench`], with the EEPROM contents supplied directly.
pub fn build_bench_with_image(
    config: &EngineConfig,
    image: Option<&[u8]>,
) -> anyhow::Result<(Engine, HostPort)> {
    let size = usize::try_from(config.eeprom_size()?).context("EEPROM size out of range")?;
    let mut eeprom = Eeprom24::new(size);
    if let Some(bytes) = image {
        eeprom.load(bytes)?;
        info!("EEPROM image: {} bytes into {}-byte device", bytes.len(), size);
    } else {
        info!("EEPROM left blank");
    }

    let timing = &config.peripherals;
    let mut i2c0 = SimI2cMaster::new(timing.i2c_latency_cycles);
    i2c0.attach(config.eeprom.address, Box::new(eeprom));
    let i2c1 = SimI2cMaster::new(timing.i2c_latency_cycles);

    let (link, port) = UartLink::pair(timing.ticks_per_byte);
    let engine = Engine::new(
        EngineSettings::from_config(config),
        Box::new(link),
        [Box::new(i2c0), Box::new(i2c1)],
        [
            Box::new(SimSpiMaster::new(timing.spi_cycles_per_bit)),
            Box::new(SimSpiMaster::new(timing.spi_cycles_per_bit)),
        ],
    );
    info!(
        "Bench '{}' ready at address {:#04x}",
        config.name, config.device_address
    );
    Ok((engine, port))
}
