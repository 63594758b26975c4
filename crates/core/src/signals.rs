// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Per-tick signal bundles.
//!
//! Every component reads the previous tick's [`Wires`] and returns its own
//! output struct. The engine commits the new bundle at the tick boundary, so
//! each field has exactly one writer.

use crate::bist::BistOut;
use crate::boot::BootOut;
use crate::bus::BusOut;
use crate::dispatcher::DispatcherOut;
use crate::gpio_edge::{GpioEdgeOut, GPIO_BANKS};
use crate::history::HistoryOut;
use crate::lut::LutOut;
use crate::metrics::PerfOut;
use crate::watchdog::WatchdogOut;
use crate::{I2cStatus, SpiStatus};

/// Represents a digital signal level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum DigitalLevel {
    #[default]
    Low,
    High,
}

impl From<bool> for DigitalLevel {
    fn from(b: bool) -> Self {
        if b {
            DigitalLevel::High
        } else {
            DigitalLevel::Low
        }
    }
}

impl From<DigitalLevel> for bool {
    fn from(level: DigitalLevel) -> Self {
        match level {
            DigitalLevel::High => true,
            DigitalLevel::Low => false,
        }
    }
}

/// Everything sampled from outside the engine at the start of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickInputs {
    pub timestamp: u64,
    pub rx_byte: Option<u8>,
    pub tx_ready: bool,
    pub gpio_in: [u64; GPIO_BANKS],
    pub temperature: u8,
    pub currents: [u16; 4],
    pub voltages: [u16; 2],
    pub switch_readback: u64,
    pub i2c: [I2cStatus; 2],
    pub spi: [SpiStatus; 2],
}

/// Outputs of every component, as committed at the end of a tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Wires {
    pub timestamp: u64,
    pub dispatcher: DispatcherOut,
    pub watchdog: WatchdogOut,
    pub gpio: GpioEdgeOut,
    pub bist: BistOut,
    pub history: HistoryOut,
    pub perf: PerfOut,
    pub boot: BootOut,
    pub lut: LutOut,
    pub bus: BusOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digital_level_conversion() {
        assert_eq!(DigitalLevel::from(true), DigitalLevel::High);
        assert_eq!(DigitalLevel::from(false), DigitalLevel::Low);
        assert!(bool::from(DigitalLevel::High));
        assert!(!bool::from(DigitalLevel::Low));
    }

    #[test]
    fn test_wires_serialize() {
        let mut w = Wires::default();
        w.dispatcher.busy = true;
        let json = serde_json::to_string(&w).unwrap();
        let back: Wires = serde_json::from_str(&json).unwrap();
        assert_eq!(back, w);
    }
}
