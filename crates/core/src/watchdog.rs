// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Transport stall supervisor.

use crate::registers::WATCHDOG;
use crate::signals::Wires;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct WatchdogOut {
    /// One-tick pulse: the dispatcher must drop to idle.
    pub timeout: bool,
    pub counting: bool,
    pub timeouts: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
enum State {
    Idle,
    Counting,
    /// Fired for the current stall; waits for the dispatcher to go idle.
    Tripped,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Watchdog {
    state: State,
    count: u64,
    /// Ticks allowed for the current stall; `None` means the timeout is disabled.
    budget: Option<u64>,
    timeouts: u16,
    ceiling_ms: u64,
    cycles_per_ms: u64,
}

impl Watchdog {
    pub fn new(ceiling_ms: u64, cycles_per_ms: u64) -> Self {
        Self {
            state: State::Idle,
            count: 0,
            budget: None,
            timeouts: 0,
            ceiling_ms,
            cycles_per_ms,
        }
    }

    /// Converts a configured timeout to a tick budget, saturating at the ceiling.
    pub fn budget_for(&self, timeout_ms: u64) -> Option<u64> {
        if timeout_ms == 0 {
            return None;
        }
        let ms = timeout_ms.min(self.ceiling_ms);
        Some(ms.saturating_mul(self.cycles_per_ms).max(1))
    }

    pub fn step(&mut self, prev: &Wires) -> WatchdogOut {
        let busy = prev.dispatcher.busy;
        let mut timeout = false;

        match self.state {
            State::Idle => {
                if busy {
                    self.count = 0;
                    self.budget = self.budget_for(prev.dispatcher.control[WATCHDOG as usize]);
                    self.state = State::Counting;
                }
            }
            State::Counting => {
                if !busy {
                    self.count = 0;
                    self.state = State::Idle;
                } else {
                    self.count += 1;
                    if let Some(budget) = self.budget {
                        if self.count >= budget - 1 {
                            timeout = true;
                            self.timeouts = self.timeouts.wrapping_add(1);
                            self.state = State::Tripped;
                            tracing::warn!(
                                "Watchdog timeout after {} ticks; forcing dispatcher idle",
                                self.count
                            );
                        }
                    }
                }
            }
            State::Tripped => {
                if !busy {
                    self.count = 0;
                    self.state = State::Idle;
                }
            }
        }

        WatchdogOut {
            timeout,
            counting: self.state == State::Counting,
            timeouts: self.timeouts,
        }
    }
}
