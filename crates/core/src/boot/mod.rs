// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! EEPROM LUT boot loader. Reads the image one byte per I2C transaction on
//! channel 0 and streams decoded words into the LUT bank.

pub mod image;

use crate::crc::Crc32Stream;
use crate::lut::{LutWrite, LUT_COUNT};
use crate::signals::{TickInputs, Wires};
use crate::I2cRequest;
use image::{
    check_descriptors, lut_block_addr, Descriptor, ImageHeader, DESCRIPTOR_ADDR, DESCRIPTOR_LEN,
    HEADER_ADDR, HEADER_LEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[repr(u8)]
pub enum BootError {
    #[default]
    None = 0x00,
    Magic = 0x01,
    Format = 0x02,
    Nack = 0x03,
    Crc = 0x04,
    Timeout = 0x05,
}

pub mod progress {
    pub const IDLE: u8 = 0x00;
    pub const STABILIZED: u8 = 0x01;
    pub const MAGIC_OK: u8 = 0x02;
    pub const DONE: u8 = 0xFF;

    pub fn lut_loaded(n: usize) -> u8 {
        0x10 * (n as u8 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BootSettings {
    pub auto_boot: bool,
    pub stabilization_cycles: u64,
    pub i2c_timeout_cycles: u64,
    pub verify_crc: bool,
    pub eeprom_address: u8,
}

impl Default for BootSettings {
    fn default() -> Self {
        Self {
            auto_boot: true,
            stabilization_cycles: 1_000,
            i2c_timeout_cycles: 100_000,
            verify_crc: true,
            eeprom_address: 0x50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct BootOut {
    pub busy: bool,
    pub done: bool,
    pub error: bool,
    pub error_code: BootError,
    pub progress: u8,
    pub i2c_request: Option<I2cRequest>,
    pub lut_write: Option<LutWrite>,
    pub lut_validate: Option<usize>,
    pub lut_invalidate_all: bool,
}

impl BootOut {
    /// Layout of the boot register; `valid` comes from the LUT bank.
    pub fn status_word(&self, valid_mask: u8) -> u64 {
        (self.done as u64)
            | (self.error as u64) << 1
            | (self.busy as u64) << 2
            | ((valid_mask & 0x0F) as u64) << 4
            | (self.error_code as u64) << 8
            | (self.progress as u64) << 16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
enum Stage {
    Header,
    Descriptors,
    Lut(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
enum Phase {
    Idle,
    Stabilize { remaining: u64 },
    /// Waiting for the bus to go quiet before reading the next byte.
    Issue,
    Await { baseline: u32, waited: u64 },
    Halted,
    Done,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BootLoader {
    #[serde(skip)]
    settings: BootSettings,
    phase: Phase,
    stage: Stage,
    /// Bytes of the current stage received so far.
    received: usize,
    header: [u8; HEADER_LEN],
    lut_count: usize,
    descriptors: [[u8; DESCRIPTOR_LEN]; LUT_COUNT],
    word: u32,
    crc: Crc32Stream,
    progress: u8,
    error: BootError,
    last_trigger: bool,
}

impl BootLoader {
    pub fn new(settings: BootSettings) -> Self {
        let phase = if settings.auto_boot {
            tracing::debug!(
                "Auto-boot armed, stabilizing for {} cycles",
                settings.stabilization_cycles
            );
            Phase::Stabilize {
                remaining: settings.stabilization_cycles,
            }
        } else {
            Phase::Idle
        };
        Self {
            settings,
            phase,
            stage: Stage::Header,
            received: 0,
            header: [0; HEADER_LEN],
            lut_count: 0,
            descriptors: [[0; DESCRIPTOR_LEN]; LUT_COUNT],
            word: 0,
            crc: Crc32Stream::new(),
            progress: progress::IDLE,
            error: BootError::None,
            last_trigger: false,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            Phase::Stabilize { .. } | Phase::Issue | Phase::Await { .. }
        )
    }

    fn restart(&mut self) {
        self.stage = Stage::Header;
        self.received = 0;
        self.word = 0;
        self.crc = Crc32Stream::new();
        self.error = BootError::None;
        self.progress = progress::STABILIZED;
        self.phase = Phase::Issue;
    }

    fn halt(&mut self, code: BootError) {
        tracing::warn!("Boot loader halted with error {:?} ({:#04x})", code, code as u8);
        self.error = code;
        self.phase = Phase::Halted;
    }

    fn stage_len(&self) -> usize {
        match self.stage {
            Stage::Header => HEADER_LEN,
            Stage::Descriptors => self.lut_count * DESCRIPTOR_LEN,
            Stage::Lut(n) => Descriptor::parse(&self.descriptors[n]).data_len(),
        }
    }

    fn stage_offset(&self) -> u16 {
        let base = match self.stage {
            Stage::Header => HEADER_ADDR,
            Stage::Descriptors => DESCRIPTOR_ADDR,
            Stage::Lut(n) => lut_block_addr(n),
        };
        base + self.received as u16
    }

    /// Consumes one byte of the current stage; a completed LUT word goes out as a store.
    fn accept(&mut self, byte: u8, out: &mut BootOut) {
        let pos = self.received;
        self.received += 1;
        match self.stage {
            Stage::Header => self.header[pos] = byte,
            Stage::Descriptors => {
                self.descriptors[pos / DESCRIPTOR_LEN][pos % DESCRIPTOR_LEN] = byte;
            }
            Stage::Lut(n) => {
                self.crc.push(byte);
                self.word = (self.word << 8) | byte as u32;
                if pos % 4 == 3 {
                    let desc = Descriptor::parse(&self.descriptors[n]);
                    out.lut_write = Some(LutWrite {
                        table: desc.lut_type as usize,
                        index: pos / 4,
                        value: self.word,
                    });
                    self.word = 0;
                }
            }
        }
        if self.received == self.stage_len() {
            self.finish_stage(out);
        } else {
            self.phase = Phase::Issue;
        }
    }

    fn finish_stage(&mut self, out: &mut BootOut) {
        self.received = 0;
        match self.stage {
            Stage::Header => {
                let header = ImageHeader::parse(&self.header);
                if let Err(e) = header.check(&self.header, self.settings.verify_crc) {
                    tracing::warn!("Boot header rejected: {}", e);
                    return self.halt(match e {
                        image::ImageError::Magic(_) => BootError::Magic,
                        image::ImageError::HeaderCrc { .. } => BootError::Crc,
                        _ => BootError::Format,
                    });
                }
                self.progress = progress::MAGIC_OK;
                self.lut_count = header.lut_count as usize;
                self.stage = Stage::Descriptors;
                self.phase = Phase::Issue;
            }
            Stage::Descriptors => {
                let parsed: Vec<Descriptor> = self.descriptors[..self.lut_count]
                    .iter()
                    .map(Descriptor::parse)
                    .collect();
                if let Err(e) = check_descriptors(&parsed) {
                    tracing::warn!("Boot descriptor rejected: {}", e);
                    return self.halt(BootError::Format);
                }
                self.stage = Stage::Lut(0);
                self.crc = Crc32Stream::new();
                self.phase = Phase::Issue;
            }
            Stage::Lut(n) => {
                let desc = Descriptor::parse(&self.descriptors[n]);
                let computed = self.crc.finish();
                if self.settings.verify_crc && computed != desc.crc32 {
                    tracing::warn!(
                        "LUT{} CRC mismatch: stored {:#010x}, computed {:#010x}",
                        n,
                        desc.crc32,
                        computed
                    );
                    return self.halt(BootError::Crc);
                }
                out.lut_validate = Some(desc.lut_type as usize);
                self.progress = progress::lut_loaded(n);
                if n + 1 < self.lut_count {
                    self.stage = Stage::Lut(n + 1);
                    self.crc = Crc32Stream::new();
                    self.phase = Phase::Issue;
                } else {
                    self.progress = progress::DONE;
                    self.phase = Phase::Done;
                    tracing::info!("Boot complete: {} LUT(s) loaded", self.lut_count);
                }
            }
        }
    }

    pub fn step(&mut self, prev: &Wires, now: &TickInputs) -> BootOut {
        let mut out = BootOut::default();
        let trigger = prev.dispatcher.boot_trigger;
        let bus = now.i2c[0];

        if trigger && !self.last_trigger {
            if self.is_busy() {
                tracing::debug!("Manual boot trigger ignored: loader busy");
            } else {
                tracing::info!("Manual boot triggered");
                out.lut_invalidate_all = true;
                self.restart();
            }
        }
        self.last_trigger = trigger;

        match self.phase {
            Phase::Idle | Phase::Halted | Phase::Done => {}
            Phase::Stabilize { remaining } => {
                if remaining == 0 {
                    self.restart();
                } else {
                    self.phase = Phase::Stabilize {
                        remaining: remaining - 1,
                    };
                }
            }
            Phase::Issue => {
                if !bus.busy && !out.lut_invalidate_all {
                    out.i2c_request = Some(I2cRequest {
                        device: self.settings.eeprom_address,
                        register: Some(self.stage_offset()),
                        read: true,
                        data: 0,
                    });
                    self.phase = Phase::Await {
                        baseline: bus.completions,
                        waited: 0,
                    };
                }
            }
            Phase::Await { baseline, waited } => {
                if bus.completions != baseline {
                    if bus.ack_error {
                        self.halt(BootError::Nack);
                    } else {
                        self.accept(bus.rx_data, &mut out);
                    }
                } else if waited + 1 >= self.settings.i2c_timeout_cycles {
                    self.halt(BootError::Timeout);
                } else {
                    self.phase = Phase::Await {
                        baseline,
                        waited: waited + 1,
                    };
                }
            }
        }

        out.busy = self.is_busy();
        out.done = self.phase == Phase::Done;
        out.error = self.phase == Phase::Halted;
        out.error_code = self.error;
        out.progress = self.progress;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::EepromImage;

    /// Answers each request from `image` after `latency` ticks, like a bus master would.
    fn run(
        loader: &mut BootLoader,
        image: &[u8],
        latency: u64,
        max: u64,
    ) -> (BootOut, Vec<LutWrite>) {
        let mut wires = Wires::default();
        let mut inputs = TickInputs::default();
        let mut pending: Option<(u16, u64)> = None;
        let mut writes = Vec::new();
        let mut out = BootOut::default();
        for t in 0..max {
            inputs.timestamp = t;
            out = loader.step(&wires, &inputs);
            if let Some(w) = out.lut_write {
                writes.push(w);
            }
            if let Some((addr, left)) = pending {
                if left == 0 {
                    inputs.i2c[0].busy = false;
                    inputs.i2c[0].rx_data = image.get(addr as usize).copied().unwrap_or(0xFF);
                    inputs.i2c[0].completions += 1;
                    pending = None;
                } else {
                    pending = Some((addr, left - 1));
                }
            }
            if let Some(req) = out.i2c_request {
                inputs.i2c[0].busy = true;
                pending = Some((req.register.unwrap_or(0), latency));
            }
            wires.boot = out;
            if !out.busy && t > 0 {
                break;
            }
        }
        (out, writes)
    }

    fn settings() -> BootSettings {
        BootSettings {
            stabilization_cycles: 3,
            i2c_timeout_cycles: 50,
            ..Default::default()
        }
    }

    fn image() -> Vec<u8> {
        let mut img = EepromImage::new();
        for t in 0..4u8 {
            img = img
                .with_lut(3 - t, (0..256u32).map(|i| i ^ ((t as u32) << 16)).collect())
                .unwrap();
        }
        img.build(image::MIN_IMAGE_LEN).unwrap()
    }

    #[test]
    fn test_loads_all_tables() {
        let mut loader = BootLoader::new(settings());
        let (out, writes) = run(&mut loader, &image(), 2, 200_000);
        assert!(out.done && !out.error);
        assert_eq!(out.progress, progress::DONE);
        assert_eq!(writes.len(), 4 * 256);
        // Block 1 carries type 2.
        let w = writes.iter().find(|w| w.table == 2 && w.index == 5).unwrap();
        assert_eq!(w.value, 5 ^ (1 << 16));
    }

    #[test]
    fn test_bad_magic_halts() {
        let mut img = image();
        img[1] = b'X';
        let mut loader = BootLoader::new(settings());
        let (out, writes) = run(&mut loader, &img, 1, 10_000);
        assert!(out.error && !out.done);
        assert_eq!(out.error_code, BootError::Magic);
        assert!(writes.is_empty());
        assert_eq!(out.status_word(0) >> 8 & 0xFF, 0x01);
    }

    #[test]
    fn test_corrupt_lut_reports_crc() {
        let mut img = image();
        img[lut_block_addr(2) as usize] ^= 0x80;
        let mut loader = BootLoader::new(settings());
        let (out, _) = run(&mut loader, &img, 1, 100_000);
        assert_eq!(out.error_code, BootError::Crc);
        assert_eq!(out.progress, progress::lut_loaded(1));
    }

    #[test]
    fn test_duplicate_table_type_halts_before_data() {
        let mut img = image();
        // Block 2 claims type 2 like block 1.
        img[DESCRIPTOR_ADDR as usize + 2 * DESCRIPTOR_LEN + 3] = 2;
        let mut loader = BootLoader::new(settings());
        let (out, writes) = run(&mut loader, &img, 1, 10_000);
        assert!(out.error && !out.done);
        assert_eq!(out.error_code, BootError::Format);
        assert!(writes.is_empty());
    }

    #[test]
    fn test_bus_timeout() {
        let mut loader = BootLoader::new(settings());
        let wires = Wires::default();
        let inputs = TickInputs::default();
        let mut out = BootOut::default();
        for _ in 0..200 {
            out = loader.step(&wires, &inputs);
        }
        assert_eq!(out.error_code, BootError::Timeout);
        assert!(!out.busy);
    }

    #[test]
    fn test_no_auto_boot_waits_for_trigger() {
        let mut loader = BootLoader::new(BootSettings {
            auto_boot: false,
            ..settings()
        });
        let mut wires = Wires::default();
        let out = loader.step(&wires, &TickInputs::default());
        assert!(!out.busy && out.progress == progress::IDLE);
        wires.dispatcher.boot_trigger = true;
        let out = loader.step(&wires, &TickInputs::default());
        assert!(out.busy && out.lut_invalidate_all);
        assert_eq!(out.progress, progress::STABILIZED);
    }
}
