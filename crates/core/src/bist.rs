// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Built-in self test: save, stimulate, verify and restore registers 0x00..=0x09,
//! then optional CRC and timestamp checks.

use crate::crc::{crc8_update, BIST_VECTOR_EXPECTED, BIST_VECTOR_INPUT};
use crate::registers::{BIST_CTRL, BIST_SCOPE};
use crate::signals::{TickInputs, Wires};

pub const CTRL_START: u64 = 1 << 0;
pub const CTRL_CRC_CHECK: u64 = 1 << 1;
pub const CTRL_COUNTER_CHECK: u64 = 1 << 2;

/// Ticks the timestamp is observed over by the counter check.
pub const COUNTER_WINDOW: u64 = 16;

/// Test pattern for register `index`: alternating bits, skewed per register.
pub fn pattern(index: usize) -> u64 {
    let base = if index % 2 == 0 {
        0xAAAA_AAAA_AAAA_AAAA
    } else {
        0x5555_5555_5555_5555
    };
    base ^ (index as u64).wrapping_mul(0x0101_0101_0101_0101)
}

/// A store into the control bank, applied by the dispatcher with no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RegisterWrite {
    pub index: usize,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct BistOut {
    pub running: bool,
    pub done: bool,
    pub pass: bool,
    pub register_pass: bool,
    pub crc_pass: bool,
    pub counter_pass: bool,
    pub errors: u8,
    pub fail_address: u8,
    pub expected: u64,
    pub observed: u64,
    pub runs: u32,
    pub register_write: Option<RegisterWrite>,
}

impl BistOut {
    pub fn status_word(&self) -> u64 {
        (self.running as u64)
            | (self.done as u64) << 1
            | (self.pass as u64) << 2
            | (self.register_pass as u64) << 3
            | (self.crc_pass as u64) << 4
            | (self.counter_pass as u64) << 5
            | (self.errors as u64) << 8
            | (self.fail_address as u64) << 16
            | (self.runs as u64) << 32
    }

    pub fn diag_word(&self) -> u64 {
        ((self.expected as u32 as u64) << 32) | self.observed as u32 as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
enum Phase {
    Idle,
    Write(usize),
    Settle(usize),
    Verify(usize),
    Restore(usize),
    RestoreSettle,
    CrcCheck,
    CounterStart,
    CounterWait { start: u64, remaining: u64 },
    Finish,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BistSequencer {
    phase: Phase,
    last_start: bool,
    saved: [u64; BIST_SCOPE],
    crc_enabled: bool,
    counter_enabled: bool,
    out: BistOut,
}

impl Default for BistSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl BistSequencer {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_start: false,
            saved: [0; BIST_SCOPE],
            crc_enabled: false,
            counter_enabled: false,
            out: BistOut::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn step(&mut self, prev: &Wires, now: &TickInputs) -> BistOut {
        let ctrl = prev.dispatcher.control[BIST_CTRL as usize];
        let start = ctrl & CTRL_START != 0;
        let rising = start && !self.last_start;
        self.last_start = start;
        self.out.register_write = None;

        match self.phase {
            Phase::Idle => {
                if rising {
                    self.saved
                        .copy_from_slice(&prev.dispatcher.control[..BIST_SCOPE]);
                    self.crc_enabled = ctrl & CTRL_CRC_CHECK != 0;
                    self.counter_enabled = ctrl & CTRL_COUNTER_CHECK != 0;
                    let runs = self.out.runs;
                    self.out = BistOut {
                        running: true,
                        register_pass: true,
                        runs,
                        ..Default::default()
                    };
                    tracing::debug!(
                        "BIST started (crc check: {}, counter check: {})",
                        self.crc_enabled,
                        self.counter_enabled
                    );
                    self.phase = Phase::Write(0);
                }
            }
            Phase::Write(i) => {
                self.out.register_write = Some(RegisterWrite {
                    index: i,
                    value: pattern(i),
                });
                self.phase = Phase::Settle(i);
            }
            Phase::Settle(i) => self.phase = Phase::Verify(i),
            Phase::Verify(i) => {
                let observed = prev.dispatcher.control[i];
                let expected = pattern(i);
                if observed != expected {
                    if self.out.errors == 0 {
                        self.out.fail_address = i as u8;
                        self.out.expected = expected;
                        self.out.observed = observed;
                    }
                    self.out.errors = self.out.errors.saturating_add(1);
                    self.out.register_pass = false;
                    tracing::warn!(
                        "BIST mismatch at {:#04x}: expected {:#018x}, read {:#018x}",
                        i,
                        expected,
                        observed
                    );
                }
                self.phase = if i + 1 < BIST_SCOPE {
                    Phase::Write(i + 1)
                } else {
                    Phase::Restore(0)
                };
            }
            Phase::Restore(i) => {
                self.out.register_write = Some(RegisterWrite {
                    index: i,
                    value: self.saved[i],
                });
                self.phase = if i + 1 < BIST_SCOPE {
                    Phase::Restore(i + 1)
                } else {
                    Phase::RestoreSettle
                };
            }
            Phase::RestoreSettle => self.phase = Phase::CrcCheck,
            Phase::CrcCheck => {
                if self.crc_enabled {
                    self.out.crc_pass =
                        crc8_update(0x00, BIST_VECTOR_INPUT) == BIST_VECTOR_EXPECTED;
                }
                self.phase = Phase::CounterStart;
            }
            Phase::CounterStart => {
                self.phase = if self.counter_enabled {
                    Phase::CounterWait {
                        start: now.timestamp,
                        remaining: COUNTER_WINDOW,
                    }
                } else {
                    Phase::Finish
                };
            }
            Phase::CounterWait { start, remaining } => {
                if remaining > 1 {
                    self.phase = Phase::CounterWait {
                        start,
                        remaining: remaining - 1,
                    };
                } else {
                    self.out.counter_pass =
                        now.timestamp.wrapping_sub(start) == COUNTER_WINDOW;
                    self.phase = Phase::Finish;
                }
            }
            Phase::Finish => {
                let out = &mut self.out;
                out.pass = out.register_pass
                    && (!self.crc_enabled || out.crc_pass)
                    && (!self.counter_enabled || out.counter_pass);
                out.running = false;
                out.done = true;
                out.runs = out.runs.wrapping_add(1);
                tracing::info!(
                    "BIST finished: pass={} errors={} run #{}",
                    out.pass,
                    out.errors,
                    out.runs
                );
                self.phase = Phase::Idle;
            }
        }

        self.out
    }
}
