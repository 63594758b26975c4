// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Packet framer and command dispatcher.
//!
//! Owns the control registers, IRQ bits 0-6 and the packet counters. Every
//! other component is reached through a message in [`DispatcherOut`] that the
//! owner consumes on its next tick.

use crate::history::{flags, Capture};
use crate::interrupt::{IrqController, IrqSource};
use crate::lut::LutUserRequest;
use crate::packet::{Command, CommandPacket, FrameAssembler, FrameError, ResponseStream};
use crate::registers::{
    ControlRegisters, ReadTarget, WriteTarget, CONTROL_COUNT, I2C_CTRL, PROTECTED_LAST, SPI_DATA,
};
use crate::signals::{DigitalLevel, TickInputs, Wires};
use crate::status::StatusContext;
use crate::{I2cRequest, SpiRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct PacketCounters {
    pub rx_packets: u32,
    pub tx_packets: u32,
    pub crc_errors: u16,
    pub cmd_errors: u16,
    /// Host writes dropped while BIST held the bank. Saturates.
    pub suppressed_writes: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct DispatcherOut {
    /// Not idle: a frame is being received or a response transmitted.
    pub busy: bool,
    pub control: [u64; CONTROL_COUNT],
    pub irq_status: IrqSource,
    pub irq: DigitalLevel,
    pub counters: PacketCounters,
    pub tx_byte: Option<u8>,
    pub i2c_request: [Option<I2cRequest>; 2],
    pub spi_request: [Option<SpiRequest>; 2],
    /// Edge-status bits the GPIO detector must clear.
    pub edge_clear: u64,
    pub history_capture: Option<Capture>,
    pub history_pop: bool,
    pub history_clear: bool,
    pub perf_start: bool,
    pub perf_stop: bool,
    pub perf_clear: bool,
    pub boot_trigger: bool,
    pub lut_request: Option<LutUserRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
enum State {
    Idle,
    Receiving(FrameAssembler),
    Transmitting(ResponseStream),
}

/// Command errors: the frame was intact but could not be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    UnknownCommand(u8),
    BadWriteAddress(u8),
    BadReadAddress(u8),
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Dispatcher {
    address: u8,
    state: State,
    control: ControlRegisters,
    irq: IrqController,
    counters: PacketCounters,
}

impl Dispatcher {
    pub fn new(address: u8, watchdog_ms: u64) -> Self {
        Self {
            address,
            state: State::Idle,
            control: ControlRegisters::new(watchdog_ms),
            irq: IrqController::new(),
            counters: PacketCounters::default(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn control(&self) -> &ControlRegisters {
        &self.control
    }

    pub fn counters(&self) -> PacketCounters {
        self.counters
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    pub fn step(&mut self, prev: &Wires, now: &TickInputs) -> DispatcherOut {
        let mut out = DispatcherOut::default();
        let mut set = prev.bus.irq_set;
        let mut clear = IrqSource::empty();

        if let Some(w) = prev.bist.register_write {
            self.control.set(w.index, w.value);
        }

        if prev.watchdog.timeout {
            set |= IrqSource::TIMEOUT;
            if self.state != State::Idle {
                tracing::warn!("Watchdog timeout: dispatcher forced idle");
            }
            self.state = State::Idle;
        } else {
            match self.state {
                State::Transmitting(mut stream) => {
                    if now.rx_byte.is_some() {
                        tracing::trace!("RX byte discarded during response");
                    }
                    if now.tx_ready {
                        out.tx_byte = Some(stream.current());
                        out.perf_stop = stream.is_first();
                        if stream.advance() {
                            self.counters.tx_packets = self.counters.tx_packets.wrapping_add(1);
                            self.state = State::Idle;
                        } else {
                            self.state = State::Transmitting(stream);
                        }
                    }
                }
                State::Idle | State::Receiving(_) => {
                    if let Some(byte) = now.rx_byte {
                        self.receive(byte, prev, now, &mut out, &mut set, &mut clear);
                    }
                }
            }
        }

        self.irq.tick(set, clear, prev.gpio.any_latched);

        out.busy = self.state != State::Idle;
        out.control = *self.control.words();
        out.irq_status = self.irq.status();
        out.irq = self.irq.irq_out(self.control.irq_enable()).into();
        out.counters = self.counters;
        out
    }

    fn receive(
        &mut self,
        byte: u8,
        prev: &Wires,
        now: &TickInputs,
        out: &mut DispatcherOut,
        set: &mut IrqSource,
        clear: &mut IrqSource,
    ) {
        let mut frame = match self.state {
            State::Receiving(frame) => frame,
            _ => FrameAssembler::new(),
        };
        let result = match frame.push(byte) {
            None => {
                self.state = State::Receiving(frame);
                return;
            }
            Some(result) => result,
        };
        self.state = State::Idle;

        match result {
            Err(FrameError::Crc { computed, received }) => {
                tracing::warn!(
                    "CRC error: computed {:#04x}, received {:#04x}",
                    computed,
                    received
                );
                self.counters.crc_errors = self.counters.crc_errors.wrapping_add(1);
                *set |= IrqSource::CRC_ERROR;
            }
            Err(e) => tracing::warn!("Framing error: {}", e),
            Ok(packet) if !packet.addressed_to(self.address) => {
                tracing::trace!("Frame for device {:#04x} ignored", packet.device_address);
            }
            Ok(packet) => self.execute(packet, prev, now, out, set, clear),
        }
    }

    fn execute(
        &mut self,
        packet: CommandPacket,
        prev: &Wires,
        now: &TickInputs,
        out: &mut DispatcherOut,
        set: &mut IrqSource,
        clear: &mut IrqSource,
    ) {
        self.counters.rx_packets = self.counters.rx_packets.wrapping_add(1);
        out.perf_start = true;

        let sticky = self.irq.status();
        let result = match packet.kind() {
            Ok(Command::Write) => self.write(packet.register, packet.payload, prev, out, clear),
            Ok(Command::Read) => self.read(packet.register, prev, now, out, sticky),
            Err(byte) => Err(Rejection::UnknownCommand(byte)),
        };

        let mut entry_flags = 0;
        if sticky.contains(IrqSource::CRC_ERROR) {
            entry_flags |= flags::CRC_ERROR;
        }
        if sticky.contains(IrqSource::TIMEOUT) {
            entry_flags |= flags::TIMEOUT;
        }
        if let Err(rejection) = result {
            tracing::warn!("Command error: {:?}", rejection);
            self.counters.cmd_errors = self.counters.cmd_errors.wrapping_add(1);
            *set |= IrqSource::CMD_ERROR;
            entry_flags |= flags::CMD_ERROR;
        }
        out.history_capture = Some(Capture {
            command: packet.command,
            register: packet.register,
            flags: entry_flags,
        });
    }

    fn write(
        &mut self,
        addr: u8,
        value: u64,
        prev: &Wires,
        out: &mut DispatcherOut,
        clear: &mut IrqSource,
    ) -> Result<(), Rejection> {
        let target = WriteTarget::decode(addr).ok_or(Rejection::BadWriteAddress(addr))?;
        tracing::debug!("WRITE {:#04x} <- {:#018x}", addr, value);
        match target {
            WriteTarget::Control(index) => {
                if prev.bist.running && index <= PROTECTED_LAST as usize {
                    self.counters.suppressed_writes =
                        self.counters.suppressed_writes.saturating_add(1);
                    tracing::debug!("Write to {:#04x} suppressed: BIST running", addr);
                    return Ok(());
                }
                self.control.set(index, value);
                if index == I2C_CTRL as usize {
                    out.i2c_request = ControlRegisters::i2c_requests(value);
                } else if index == SPI_DATA as usize {
                    out.spi_request = self.control.spi_requests(value);
                }
            }
            WriteTarget::HistoryControl => {
                out.history_clear = value & 0x1 != 0;
                out.perf_clear = value & 0x2 != 0;
            }
            WriteTarget::IrqClear => {
                *clear |= IrqSource::from_bits_truncate(value as u8) & IrqSource::LOCAL;
                if value & 0x80 != 0 {
                    out.edge_clear = u64::MAX;
                }
            }
            WriteTarget::EdgeClear => out.edge_clear = value,
            WriteTarget::BootControl => out.boot_trigger = value & 0x1 != 0,
            WriteTarget::Lut(table) => out.lut_request = Some(LutUserRequest::decode(table, value)),
        }
        Ok(())
    }

    fn read(
        &mut self,
        addr: u8,
        prev: &Wires,
        now: &TickInputs,
        out: &mut DispatcherOut,
        irq: IrqSource,
    ) -> Result<(), Rejection> {
        let target = ReadTarget::decode(addr).ok_or(Rejection::BadReadAddress(addr))?;
        let payload = StatusContext {
            prev,
            now,
            control: &self.control,
            irq,
            counters: &self.counters,
        }
        .read(target);
        tracing::debug!("READ {:#04x} -> {:#018x}", addr, payload);
        if target == ReadTarget::Status(crate::registers::HISTORY_POP) {
            out.history_pop = true;
        }
        self.state = State::Transmitting(ResponseStream::new(payload));
        Ok(())
    }
}
