// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Input synchronizers and per-pin edge latches for GPIO banks 0 and 1.

use crate::registers::EDGE_CONFIG0;
use crate::signals::{TickInputs, Wires};

pub const GPIO_BANKS: usize = 4;
pub const MONITORED_BANKS: usize = 2;
pub const MONITORED_PINS: usize = 32;

/// Per-pin edge selection, two bits per pin in the edge config words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMode {
    Disabled,
    Rising,
    Falling,
    Both,
}

impl EdgeMode {
    pub fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => EdgeMode::Disabled,
            1 => EdgeMode::Rising,
            2 => EdgeMode::Falling,
            _ => EdgeMode::Both,
        }
    }

    pub fn pin(config: u64, pin: usize) -> Self {
        Self::from_bits(config >> (pin * 2))
    }
}

/// Expands a 2-bit-per-pin config word into rising and falling masks for pins 0-31.
pub fn edge_masks(config: u64) -> (u32, u32) {
    let mut rise = 0u32;
    let mut fall = 0u32;
    for pin in 0..MONITORED_PINS {
        match EdgeMode::pin(config, pin) {
            EdgeMode::Disabled => {}
            EdgeMode::Rising => rise |= 1 << pin,
            EdgeMode::Falling => fall |= 1 << pin,
            EdgeMode::Both => {
                rise |= 1 << pin;
                fall |= 1 << pin;
            }
        }
    }
    (rise, fall)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct GpioEdgeOut {
    /// Synchronized input snapshots for all four banks.
    pub synced: [u64; GPIO_BANKS],
    /// Latched edges: bank 0 in bits 31:0, bank 1 in bits 63:32.
    pub status: u64,
    pub any_latched: bool,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GpioEdgeDetector {
    stage1: [u64; GPIO_BANKS],
    stage2: [u64; GPIO_BANKS],
    last: [u32; MONITORED_BANKS],
    status: u64,
}

impl GpioEdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, prev: &Wires, now: &TickInputs) -> GpioEdgeOut {
        let mut detected = 0u64;
        for bank in 0..MONITORED_BANKS {
            let synced = self.stage2[bank] as u32;
            let last = self.last[bank];
            let config = prev.dispatcher.control[EDGE_CONFIG0 as usize + bank];
            let (rise, fall) = edge_masks(config);
            let hits = (synced & !last & rise) | (!synced & last & fall);
            detected |= (hits as u64) << (bank * 32);
        }

        let clear = prev.dispatcher.edge_clear;
        self.status = (self.status & !clear) | detected;
        if detected != 0 {
            tracing::trace!("GPIO edge latch {:#018x}", detected);
        }

        for bank in 0..MONITORED_BANKS {
            self.last[bank] = self.stage2[bank] as u32;
        }
        self.stage2 = self.stage1;
        self.stage1 = now.gpio_in;

        GpioEdgeOut {
            synced: self.stage2,
            status: self.status,
            any_latched: self.status != 0,
        }
    }
}
