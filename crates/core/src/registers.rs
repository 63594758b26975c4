// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Register map and the host-writable control bank.

use crate::{I2cRequest, SpiRequest};

pub const SYSTEM_CTRL: u8 = 0x00;
pub const SWITCHES: u8 = 0x01;
pub const I2C_CTRL: u8 = 0x02;
pub const SPI_DATA: u8 = 0x03;
pub const SPI0_CONFIG: u8 = 0x04;
pub const SPI1_CONFIG: u8 = 0x05;
pub const GPIO_OUT0: u8 = 0x06;
pub const GPIO_OUT3: u8 = 0x09;
pub const WATCHDOG: u8 = 0x0A;
pub const IRQ_ENABLE: u8 = 0x0B;
pub const BIST_CTRL: u8 = 0x0C;
pub const EDGE_CONFIG0: u8 = 0x0D;
pub const EDGE_CONFIG1: u8 = 0x0E;
pub const HISTORY_CTRL: u8 = 0x0F;

pub const SYSTEM_STATUS: u8 = 0x10;
pub const CURRENTS: u8 = 0x11;
pub const VOLTAGES: u8 = 0x12;
pub const SPI_RX: u8 = 0x13;
pub const SWITCH_READBACK: u8 = 0x14;
pub const PACKET_COUNTERS: u8 = 0x15;
pub const GPIO_IN0: u8 = 0x16;
pub const GPIO_IN3: u8 = 0x19;
pub const DIAGNOSTICS: u8 = 0x1A;
pub const IRQ_STATUS: u8 = 0x1B;
pub const TIMESTAMP: u8 = 0x1C;
pub const BIST_STATUS: u8 = 0x1D;
pub const BIST_DIAG: u8 = 0x1E;
pub const EDGE_STATUS: u8 = 0x1F;
pub const HISTORY_POP: u8 = 0x20;
pub const PERF: u8 = 0x21;

pub const BOOT: u8 = 0x30;
pub const LUT0: u8 = 0x31;
pub const LUT3: u8 = 0x34;

/// Stored control words: 0x00..=0x0E.
pub const CONTROL_COUNT: usize = 15;
/// Highest address protected from host writes while BIST runs.
pub const PROTECTED_LAST: u8 = BIST_CTRL;
/// Registers saved, exercised and restored by BIST: 0x00..=0x09.
pub const BIST_SCOPE: usize = 10;

/// Where a host write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    Control(usize),
    HistoryControl,
    IrqClear,
    EdgeClear,
    BootControl,
    Lut(usize),
}

impl WriteTarget {
    pub fn decode(addr: u8) -> Option<Self> {
        match addr {
            0x00..=0x0E => Some(WriteTarget::Control(addr as usize)),
            HISTORY_CTRL => Some(WriteTarget::HistoryControl),
            IRQ_STATUS => Some(WriteTarget::IrqClear),
            EDGE_STATUS => Some(WriteTarget::EdgeClear),
            BOOT => Some(WriteTarget::BootControl),
            LUT0..=LUT3 => Some(WriteTarget::Lut((addr - LUT0) as usize)),
            _ => None,
        }
    }
}

/// Where a host read is sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTarget {
    Control(usize),
    HistoryCount,
    Status(u8),
    Boot,
    Lut(usize),
}

impl ReadTarget {
    pub fn decode(addr: u8) -> Option<Self> {
        match addr {
            0x00..=0x0E => Some(ReadTarget::Control(addr as usize)),
            HISTORY_CTRL => Some(ReadTarget::HistoryCount),
            SYSTEM_STATUS..=PERF => Some(ReadTarget::Status(addr)),
            BOOT => Some(ReadTarget::Boot),
            LUT0..=LUT3 => Some(ReadTarget::Lut((addr - LUT0) as usize)),
            _ => None,
        }
    }
}

/// The stored control words. Only the dispatcher holds one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ControlRegisters {
    words: [u64; CONTROL_COUNT],
}

impl ControlRegisters {
    pub fn new(watchdog_ms: u64) -> Self {
        let mut words = [0u64; CONTROL_COUNT];
        words[WATCHDOG as usize] = watchdog_ms;
        Self { words }
    }

    pub fn get(&self, index: usize) -> u64 {
        self.words.get(index).copied().unwrap_or(0)
    }

    pub fn set(&mut self, index: usize, value: u64) {
        if let Some(w) = self.words.get_mut(index) {
            *w = value;
        }
    }

    pub fn words(&self) -> &[u64; CONTROL_COUNT] {
        &self.words
    }

    pub fn enabled(&self) -> bool {
        self.get(SYSTEM_CTRL as usize) & 0x2 != 0
    }

    pub fn irq_enable(&self) -> u8 {
        self.get(IRQ_ENABLE as usize) as u8
    }

    pub fn watchdog_ms(&self) -> u64 {
        self.get(WATCHDOG as usize)
    }

    pub fn bist_ctrl(&self) -> u64 {
        self.get(BIST_CTRL as usize)
    }

    pub fn edge_config(&self, bank: usize) -> u64 {
        self.get(EDGE_CONFIG0 as usize + bank)
    }

    /// I2C requests strobed by a write of `value` to the I2C control word.
    pub fn i2c_requests(value: u64) -> [Option<I2cRequest>; 2] {
        let ch0 = (value >> 63 & 1 == 1).then(|| I2cRequest {
            device: (value >> 56) as u8 & 0x7F,
            register: Some((value >> 32) as u16),
            read: value >> 55 & 1 == 1,
            data: (value >> 8) as u8,
        });
        let ch1 = (value >> 31 & 1 == 1).then(|| I2cRequest {
            device: (value >> 24) as u8 & 0x7F,
            register: None,
            read: value >> 23 & 1 == 1,
            data: value as u8,
        });
        [ch0, ch1]
    }

    /// SPI transfers strobed by a write of `value` to the SPI data word.
    /// Only channels whose config has the enable bit set start.
    pub fn spi_requests(&self, value: u64) -> [Option<SpiRequest>; 2] {
        let data = [(value >> 32) as u32, value as u32];
        let mut out = [None, None];
        for (ch, slot) in out.iter_mut().enumerate() {
            let cfg = self.get(SPI0_CONFIG as usize + ch);
            if cfg >> 63 & 1 == 1 {
                *slot = Some(SpiRequest {
                    data: data[ch],
                    word_len: ((cfg >> 56) as u8 & 0x1F) + 1,
                    cpol: cfg >> 62 & 1 == 1,
                    cpha: cfg >> 61 & 1 == 1,
                    clk_div: (cfg >> 40) as u16,
                    chip_select: (cfg >> 32) as u8 & 0x0F,
                });
            }
        }
        out
    }
}
