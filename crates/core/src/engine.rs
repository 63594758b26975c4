// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bist::BistSequencer;
use crate::boot::{BootLoader, BootSettings};
use crate::bus::I2cArbiter;
use crate::dispatcher::Dispatcher;
use crate::gpio_edge::{GpioEdgeDetector, GPIO_BANKS};
use crate::history::HistoryBuffer;
use crate::lut::{LutBank, LUT_COUNT};
use crate::metrics::PerformanceTracker;
use crate::signals::{TickInputs, Wires};
use crate::snapshot::EngineSnapshot;
use crate::watchdog::Watchdog;
use crate::{
    ByteTransport, EngineError, EngineObserver, EngineResult, I2cController, SpiController,
};
use rfctl_config::EngineConfig;
use std::sync::Arc;

/// Static parameters of one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EngineSettings {
    pub device_address: u8,
    pub cycles_per_ms: u64,
    pub watchdog_ceiling_ms: u64,
    /// Reset value of the watchdog register.
    pub watchdog_default_ms: u64,
    pub boot: BootSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            device_address: 0x00,
            cycles_per_ms: 50_000,
            watchdog_ceiling_ms: 100,
            watchdog_default_ms: 100,
            boot: BootSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            device_address: config.device_address,
            cycles_per_ms: config.cycles_per_ms(),
            watchdog_ceiling_ms: config.watchdog.max_timeout_ms,
            watchdog_default_ms: config.watchdog.default_timeout_ms,
            boot: BootSettings {
                auto_boot: config.boot.auto_boot,
                stabilization_cycles: config.boot.stabilization_cycles,
                i2c_timeout_cycles: config.boot.i2c_timeout_cycles,
                verify_crc: config.boot.verify_crc,
                eeprom_address: config.eeprom.address,
            },
        }
    }
}

/// Board-level inputs the harness may drive between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExternalInputs {
    pub gpio_in: [u64; GPIO_BANKS],
    pub temperature: u8,
    pub currents: [u16; 4],
    pub voltages: [u16; 2],
    pub switch_readback: u64,
}

/// The lock-step engine. Each [`Engine::tick`] samples the collaborators,
/// steps every component against the previous tick's wires, drives the
/// collaborators from the new outputs and commits the new wires.
pub struct Engine {
    settings: EngineSettings,
    transport: Box<dyn ByteTransport>,
    i2c: [Box<dyn I2cController>; 2],
    spi: [Box<dyn SpiController>; 2],
    pub inputs: ExternalInputs,
    pub observers: Vec<Arc<dyn EngineObserver>>,
    wires: Wires,
    timestamp: u64,

    dispatcher: Dispatcher,
    watchdog: Watchdog,
    gpio: GpioEdgeDetector,
    bist: BistSequencer,
    history: HistoryBuffer,
    perf: PerformanceTracker,
    boot: BootLoader,
    lut: LutBank,
    arbiter: I2cArbiter,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        settings: EngineSettings,
        transport: Box<dyn ByteTransport>,
        i2c: [Box<dyn I2cController>; 2],
        spi: [Box<dyn SpiController>; 2],
    ) -> Self {
        tracing::debug!(
            "Engine at address {:#04x}, {} cycles/ms",
            settings.device_address,
            settings.cycles_per_ms
        );
        Self {
            transport,
            i2c,
            spi,
            inputs: ExternalInputs::default(),
            observers: Vec::new(),
            wires: Wires::default(),
            timestamp: 0,
            dispatcher: Dispatcher::new(settings.device_address, settings.watchdog_default_ms),
            watchdog: Watchdog::new(settings.watchdog_ceiling_ms, settings.cycles_per_ms),
            gpio: GpioEdgeDetector::new(),
            bist: BistSequencer::new(),
            history: HistoryBuffer::new(),
            perf: PerformanceTracker::new(),
            boot: BootLoader::new(settings.boot),
            lut: LutBank::new(),
            arbiter: I2cArbiter::new(),
            settings,
        }
    }

    fn sample(&mut self) -> TickInputs {
        let rx_byte = self.transport.receive();
        TickInputs {
            timestamp: self.timestamp,
            rx_byte,
            tx_ready: self.transport.tx_ready(),
            gpio_in: self.inputs.gpio_in,
            temperature: self.inputs.temperature,
            currents: self.inputs.currents,
            voltages: self.inputs.voltages,
            switch_readback: self.inputs.switch_readback,
            i2c: [self.i2c[0].status(), self.i2c[1].status()],
            spi: [self.spi[0].status(), self.spi[1].status()],
        }
    }

    pub fn tick(&mut self) {
        let now = self.sample();
        let prev = self.wires;

        let next = Wires {
            timestamp: now.timestamp,
            dispatcher: self.dispatcher.step(&prev, &now),
            watchdog: self.watchdog.step(&prev),
            gpio: self.gpio.step(&prev, &now),
            bist: self.bist.step(&prev, &now),
            history: self.history.step(&prev, &now),
            perf: self.perf.step(&prev, &now),
            boot: self.boot.step(&prev, &now),
            lut: self.lut.step(&prev),
            bus: self.arbiter.step(&prev, &now),
        };

        if let Some(byte) = next.dispatcher.tx_byte {
            self.transport.transmit(byte);
        }
        for (ch, req) in next.bus.i2c.iter().enumerate() {
            if let Some(req) = req {
                self.i2c[ch].start(*req);
            }
        }
        for (ch, req) in next.dispatcher.spi_request.iter().enumerate() {
            if let Some(req) = req {
                self.spi[ch].start(*req);
            }
        }

        self.transport.tick();
        for ctrl in self.i2c.iter_mut() {
            ctrl.tick();
        }
        for ctrl in self.spi.iter_mut() {
            ctrl.tick();
        }

        for observer in &self.observers {
            if let Some(byte) = now.rx_byte {
                observer.on_byte_received(byte);
            }
            if let Some(byte) = next.dispatcher.tx_byte {
                observer.on_byte_sent(byte);
            }
            observer.on_tick(&next);
        }

        self.wires = next;
        self.timestamp = self.timestamp.wrapping_add(1);
    }

    /// Runs `ticks` ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Ticks until `done` holds for the committed wires, up to `max_ticks`.
    /// Returns the number of ticks taken.
    pub fn run_until<F>(&mut self, max_ticks: u64, mut done: F) -> EngineResult<u64>
    where
        F: FnMut(&Wires) -> bool,
    {
        for n in 0..max_ticks {
            if done(&self.wires) {
                return Ok(n);
            }
            self.tick();
        }
        if done(&self.wires) {
            Ok(max_ticks)
        } else {
            Err(EngineError::ResponseTimeout(max_ticks))
        }
    }

    pub fn set_gpio(&mut self, bank: usize, value: u64) -> EngineResult<()> {
        let slot = self
            .inputs
            .gpio_in
            .get_mut(bank)
            .ok_or(EngineError::GpioBank(bank))?;
        *slot = value;
        Ok(())
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn wires(&self) -> &Wires {
        &self.wires
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn boot(&self) -> &BootLoader {
        &self.boot
    }

    pub fn lut_entry(&self, table: usize, index: usize) -> EngineResult<u32> {
        if table >= LUT_COUNT {
            return Err(EngineError::LutTable(table));
        }
        self.lut
            .entry(table, index)
            .ok_or(EngineError::LutTable(table))
    }

    pub fn lut(&self) -> &LutBank {
        &self.lut
    }

    pub fn transport(&self) -> &dyn ByteTransport {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> &mut dyn ByteTransport {
        self.transport.as_mut()
    }

    pub fn i2c(&self, channel: usize) -> Option<&dyn I2cController> {
        self.i2c.get(channel).map(|c| c.as_ref())
    }

    pub fn i2c_mut(&mut self, channel: usize) -> Option<&mut (dyn I2cController + 'static)> {
        self.i2c.get_mut(channel).map(|c| c.as_mut())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let mut components = std::collections::HashMap::new();
        let mut put = |name: &str, value: serde_json::Value| {
            components.insert(name.to_string(), value);
        };
        put("dispatcher", to_json(&self.dispatcher));
        put("watchdog", to_json(&self.watchdog));
        put("gpio_edge", to_json(&self.gpio));
        put("bist", to_json(&self.bist));
        put("history", to_json(&self.history));
        put("perf", to_json(&self.perf));
        put("boot", to_json(&self.boot));
        put("lut", to_json(&self.lut));
        put("arbiter", to_json(&self.arbiter));

        let mut collaborators = std::collections::HashMap::new();
        collaborators.insert("transport".to_string(), self.transport.snapshot());
        for (ch, c) in self.i2c.iter().enumerate() {
            collaborators.insert(format!("i2c{}", ch), c.snapshot());
        }
        for (ch, c) in self.spi.iter().enumerate() {
            collaborators.insert(format!("spi{}", ch), c.snapshot());
        }

        EngineSnapshot {
            timestamp: self.timestamp,
            wires: self.wires,
            components,
            collaborators,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
