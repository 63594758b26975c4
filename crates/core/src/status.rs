// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Read-side projection of the register map. Nothing here is stored: every
//! word is assembled on demand from the owners' published state.

use crate::dispatcher::PacketCounters;
use crate::interrupt::IrqSource;
use crate::registers::{self, ControlRegisters, ReadTarget};
use crate::signals::{TickInputs, Wires};

/// Everything a host read can observe on the tick it is served.
#[derive(Debug, Clone, Copy)]
pub struct StatusContext<'a> {
    pub prev: &'a Wires,
    pub now: &'a TickInputs,
    pub control: &'a ControlRegisters,
    pub irq: IrqSource,
    pub counters: &'a PacketCounters,
}

impl StatusContext<'_> {
    pub fn read(&self, target: ReadTarget) -> u64 {
        let prev = self.prev;
        match target {
            ReadTarget::Control(index) => self.control.get(index),
            ReadTarget::HistoryCount => prev.history.count as u64,
            ReadTarget::Status(addr) => self.status_word(addr),
            ReadTarget::Boot => prev.boot.status_word(prev.lut.valid_mask()),
            ReadTarget::Lut(table) => prev.lut.read_word(table),
        }
    }

    /// Bus activity byte of the system status word.
    pub fn bus_status(&self) -> u8 {
        let i2c = &self.now.i2c;
        let spi = &self.now.spi;
        (i2c[0].busy as u8)
            | (i2c[0].ack_error as u8) << 1
            | (i2c[1].busy as u8) << 2
            | (i2c[1].ack_error as u8) << 3
            | (spi[0].busy as u8) << 4
            | (spi[1].busy as u8) << 5
            | (self.prev.bus.loader_owns_ch0 as u8) << 6
            | (self.prev.bist.running as u8) << 7
    }

    /// Low byte of the system status word.
    pub fn status_bits(&self) -> u8 {
        let prev = self.prev;
        let irq_out = self.irq.bits() & self.control.irq_enable() != 0;
        (self.control.enabled() as u8)
            | (irq_out as u8) << 1
            | (prev.boot.done as u8) << 2
            | (prev.boot.error as u8) << 3
            | (prev.watchdog.counting as u8) << 4
            | ((prev.lut.valid_mask() == 0x0F) as u8) << 5
    }

    fn status_word(&self, addr: u8) -> u64 {
        let prev = self.prev;
        let now = self.now;
        let c = self.counters;
        match addr {
            registers::SYSTEM_STATUS => {
                (now.timestamp as u32 as u64) << 32
                    | (self.bus_status() as u64) << 24
                    | (self.irq.bits() as u64) << 16
                    | (now.temperature as u64) << 8
                    | self.status_bits() as u64
            }
            registers::CURRENTS => now
                .currents
                .iter()
                .enumerate()
                .fold(0, |acc, (i, &m)| acc | (m as u64) << (16 * i)),
            registers::VOLTAGES => {
                (now.voltages[1] as u64) << 48
                    | (now.voltages[0] as u64) << 32
                    | (now.i2c[0].rx_data as u64) << 16
                    | now.i2c[1].rx_data as u64
            }
            registers::SPI_RX => (now.spi[0].rx_data as u64) << 32 | now.spi[1].rx_data as u64,
            registers::SWITCH_READBACK => now.switch_readback,
            registers::PACKET_COUNTERS => (c.rx_packets as u64) << 32 | c.tx_packets as u64,
            registers::GPIO_IN0..=registers::GPIO_IN3 => {
                prev.gpio.synced[(addr - registers::GPIO_IN0) as usize]
            }
            registers::DIAGNOSTICS => {
                (c.crc_errors as u64) << 48
                    | (prev.watchdog.timeouts as u64) << 32
                    | (c.cmd_errors as u64) << 16
                    | (prev.history.count as u64) << 8
                    | c.suppressed_writes as u64
            }
            registers::IRQ_STATUS => self.irq.bits() as u64,
            registers::TIMESTAMP => now.timestamp,
            registers::BIST_STATUS => prev.bist.status_word(),
            registers::BIST_DIAG => prev.bist.diag_word(),
            registers::EDGE_STATUS => prev.gpio.status,
            registers::HISTORY_POP => prev.history.head.pack(prev.history.count > 0),
            registers::PERF => prev.perf.pack(),
            _ => 0,
        }
    }
}
