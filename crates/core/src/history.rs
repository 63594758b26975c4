// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Fixed-depth log of validated commands.

use crate::signals::{TickInputs, Wires};

pub const HISTORY_DEPTH: usize = 16;

pub mod flags {
    pub const CRC_ERROR: u8 = 1 << 0;
    pub const TIMEOUT: u8 = 1 << 1;
    pub const CMD_ERROR: u8 = 1 << 2;
}

/// What the dispatcher hands over for each validated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Capture {
    pub command: u8,
    pub register: u8,
    pub flags: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    pub timestamp: u32,
    pub command: u8,
    pub register: u8,
    pub flags: u8,
    /// Slot the entry was written to.
    pub index: u8,
}

impl HistoryEntry {
    /// Layout of the pop register: valid flag in bit 0.
    pub fn pack(&self, valid: bool) -> u64 {
        ((self.timestamp as u64) << 32)
            | ((self.command as u64) << 24)
            | ((self.register as u64) << 16)
            | ((self.flags as u64) << 8)
            | (((self.index & 0x0F) as u64) << 4)
            | valid as u64
    }

    pub fn unpack(word: u64) -> Option<Self> {
        if word & 1 == 0 {
            return None;
        }
        Some(Self {
            timestamp: (word >> 32) as u32,
            command: (word >> 24) as u8,
            register: (word >> 16) as u8,
            flags: (word >> 8) as u8,
            index: (word >> 4) as u8 & 0x0F,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct HistoryOut {
    /// Entry at the read pointer, zeroed when empty.
    pub head: HistoryEntry,
    pub count: u8,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct HistoryBuffer {
    entries: [HistoryEntry; HISTORY_DEPTH],
    write: usize,
    read: usize,
    count: usize,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capture(&mut self, timestamp: u64, capture: Capture) {
        self.entries[self.write] = HistoryEntry {
            timestamp: timestamp as u32,
            command: capture.command,
            register: capture.register,
            flags: capture.flags,
            index: self.write as u8,
        };
        self.write = (self.write + 1) % HISTORY_DEPTH;
        if self.count == HISTORY_DEPTH {
            self.read = (self.read + 1) % HISTORY_DEPTH;
        } else {
            self.count += 1;
        }
    }

    pub fn pop(&mut self) -> Option<HistoryEntry> {
        if self.count == 0 {
            return None;
        }
        let entry = self.entries[self.read];
        self.read = (self.read + 1) % HISTORY_DEPTH;
        self.count -= 1;
        Some(entry)
    }

    /// Resets pointers and count; stored entries stay in place.
    pub fn clear(&mut self) {
        self.write = 0;
        self.read = 0;
        self.count = 0;
    }

    pub fn head(&self) -> HistoryEntry {
        if self.count == 0 {
            HistoryEntry::default()
        } else {
            self.entries[self.read]
        }
    }

    pub fn step(&mut self, prev: &Wires, now: &TickInputs) -> HistoryOut {
        let d = &prev.dispatcher;
        if d.history_clear {
            self.clear();
        } else {
            if d.history_pop {
                self.pop();
            }
            if let Some(capture) = d.history_capture {
                self.capture(now.timestamp, capture);
            }
        }
        HistoryOut {
            head: self.head(),
            count: self.count as u8,
        }
    }
}
