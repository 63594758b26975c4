// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

#![allow(dead_code)]

use rfctl_config::EngineConfig;
use rfctl_core::packet::{CommandPacket, ResponsePacket, COMMAND_LEN, RESPONSE_LEN};
use rfctl_core::peripherals::uart::HostPort;
use rfctl_core::system::bench::build_bench_with_image;
use rfctl_core::{Engine, EngineError, EngineResult};

pub const DEVICE: u8 = 0x12;

/// Host-side harness: frames commands, pumps the engine and decodes responses.
pub struct Bench {
    pub engine: Engine,
    pub port: HostPort,
    pub address: u8,
}

/// 1 MHz clock (1000 ticks per ms), no auto-boot.
pub fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig {
        device_address: DEVICE,
        clock_hz: 1_000_000,
        ..Default::default()
    };
    config.boot.auto_boot = false;
    config.peripherals.i2c_latency_cycles = 1;
    config
}

impl Bench {
    pub fn new() -> Self {
        Self::from_config(&quiet_config(), None)
    }

    pub fn from_config(config: &EngineConfig, image: Option<&[u8]>) -> Self {
        let (engine, port) = build_bench_with_image(config, image).unwrap();
        Self {
            engine,
            port,
            address: config.device_address,
        }
    }

    /// Sends raw bytes and ticks until the transport has consumed them,
    /// plus a couple of ticks for the resulting messages to land.
    pub fn send_raw(&mut self, bytes: &[u8]) {
        self.port.send(bytes);
        let mut guard = 0;
        while self.port.pending() > 0 {
            self.engine.tick();
            guard += 1;
            assert!(guard < 100 * COMMAND_LEN, "transport stalled");
        }
        self.engine.run(3);
    }

    pub fn write(&mut self, addr: u8, value: u64) {
        self.write_to(self.address, addr, value);
    }

    pub fn write_to(&mut self, device: u8, addr: u8, value: u64) {
        self.send_raw(&CommandPacket::write(device, addr, value).encode());
    }

    pub fn read(&mut self, addr: u8) -> u64 {
        self.try_read_from(self.address, addr, 1_000).unwrap()
    }

    /// Sends a read and waits up to `max_ticks` for the full response.
    pub fn try_read_from(&mut self, device: u8, addr: u8, max_ticks: u64) -> EngineResult<u64> {
        self.port.take_received();
        self.port.send(&CommandPacket::read(device, addr).encode());
        for _ in 0..max_ticks {
            self.engine.tick();
            if self.port.received_len() >= RESPONSE_LEN {
                break;
            }
        }
        let bytes = self.port.take_received();
        if bytes.len() < RESPONSE_LEN {
            // Let the link drain so the next command starts clean.
            while self.port.pending() > 0 {
                self.engine.tick();
            }
            self.engine.run(3);
            return Err(EngineError::ResponseTimeout(max_ticks));
        }
        self.engine.run(2);
        let mut frame = [0u8; RESPONSE_LEN];
        frame.copy_from_slice(&bytes[..RESPONSE_LEN]);
        Ok(ResponsePacket::decode(&frame)?.payload)
    }

    pub fn diagnostics(&mut self) -> Diagnostics {
        Diagnostics::unpack(self.read(0x1A))
    }

    pub fn irq_status(&mut self) -> u8 {
        self.read(0x1B) as u8
    }

    pub fn boot_status(&mut self) -> BootStatus {
        BootStatus::unpack(self.read(0x30))
    }

    /// Ticks until the boot loader reports idle, done or halted.
    pub fn wait_boot(&mut self, max_ticks: u64) -> u64 {
        // The first tick publishes the loader's initial state.
        self.engine.tick();
        self.engine
            .run_until(max_ticks, |w| !w.boot.busy)
            .unwrap()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub crc_errors: u16,
    pub timeouts: u16,
    pub cmd_errors: u16,
    pub history_count: u8,
    pub suppressed: u8,
}

impl Diagnostics {
    pub fn unpack(word: u64) -> Self {
        Self {
            crc_errors: (word >> 48) as u16,
            timeouts: (word >> 32) as u16,
            cmd_errors: (word >> 16) as u16,
            history_count: (word >> 8) as u8,
            suppressed: word as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootStatus {
    pub done: bool,
    pub error: bool,
    pub busy: bool,
    pub valid: u8,
    pub code: u8,
    pub progress: u8,
}

impl BootStatus {
    pub fn unpack(word: u64) -> Self {
        Self {
            done: word & 1 != 0,
            error: word & 2 != 0,
            busy: word & 4 != 0,
            valid: (word >> 4) as u8 & 0x0F,
            code: (word >> 8) as u8,
            progress: (word >> 16) as u8,
        }
    }
}
