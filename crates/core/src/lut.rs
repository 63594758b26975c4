// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Four 256-entry lookup tables. The boot loader owns a table until it is marked
//! valid; from then on only the host port may write it.

use crate::signals::Wires;

pub const LUT_COUNT: usize = 4;
pub const LUT_ENTRIES: usize = 256;

/// Host-port access decoded from a write to one of the LUT registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LutOp {
    Select { index: u8 },
    Write { index: u8, value: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LutUserRequest {
    pub table: usize,
    pub op: LutOp,
}

impl LutUserRequest {
    pub fn decode(table: usize, payload: u64) -> Self {
        let index = (payload >> 32) as u8;
        let op = if payload >> 63 & 1 == 1 {
            LutOp::Select { index }
        } else {
            LutOp::Write {
                index,
                value: payload as u32,
            }
        };
        Self { table, op }
    }
}

/// Loader-side store of one decoded word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LutWrite {
    pub table: usize,
    pub index: usize,
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct LutOut {
    pub valid: [bool; LUT_COUNT],
    pub selected: [u8; LUT_COUNT],
    /// Entry at each table's selected index.
    pub data: [u32; LUT_COUNT],
}

impl LutOut {
    pub fn valid_mask(&self) -> u8 {
        self.valid
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &v)| acc | ((v as u8) << i))
    }

    pub fn read_word(&self, table: usize) -> u64 {
        ((self.selected[table] as u64) << 32) | self.data[table] as u64
    }
}

#[derive(Debug, Clone)]
pub struct LutBank {
    tables: Box<[[u32; LUT_ENTRIES]; LUT_COUNT]>,
    valid: [bool; LUT_COUNT],
    selected: [u8; LUT_COUNT],
}

impl Default for LutBank {
    fn default() -> Self {
        Self::new()
    }
}

impl LutBank {
    pub fn new() -> Self {
        Self {
            tables: Box::new([[0; LUT_ENTRIES]; LUT_COUNT]),
            valid: [false; LUT_COUNT],
            selected: [0; LUT_COUNT],
        }
    }

    pub fn entry(&self, table: usize, index: usize) -> Option<u32> {
        self.tables.get(table)?.get(index).copied()
    }

    pub fn table(&self, table: usize) -> Option<&[u32; LUT_ENTRIES]> {
        self.tables.get(table)
    }

    pub fn is_valid(&self, table: usize) -> bool {
        self.valid.get(table).copied().unwrap_or(false)
    }

    fn loader_write(&mut self, w: LutWrite) {
        if w.table >= LUT_COUNT || w.index >= LUT_ENTRIES {
            return;
        }
        if self.valid[w.table] {
            tracing::debug!("Loader write to valid LUT{} ignored", w.table);
            return;
        }
        self.tables[w.table][w.index] = w.value;
    }

    fn user_request(&mut self, req: LutUserRequest) {
        if req.table >= LUT_COUNT {
            return;
        }
        match req.op {
            LutOp::Select { index } => self.selected[req.table] = index,
            LutOp::Write { index, value } => {
                self.selected[req.table] = index;
                if self.valid[req.table] {
                    self.tables[req.table][index as usize] = value;
                } else {
                    tracing::debug!(
                        "Host write to LUT{} ignored: table still owned by the boot loader",
                        req.table
                    );
                }
            }
        }
    }

    pub fn out(&self) -> LutOut {
        let mut data = [0u32; LUT_COUNT];
        for (t, d) in data.iter_mut().enumerate() {
            *d = self.tables[t][self.selected[t] as usize];
        }
        LutOut {
            valid: self.valid,
            selected: self.selected,
            data,
        }
    }

    pub fn step(&mut self, prev: &Wires) -> LutOut {
        let boot = &prev.boot;
        if boot.lut_invalidate_all {
            *self.tables = [[0; LUT_ENTRIES]; LUT_COUNT];
            self.valid = [false; LUT_COUNT];
        }
        if let Some(w) = boot.lut_write {
            self.loader_write(w);
        }
        if let Some(table) = boot.lut_validate {
            if table < LUT_COUNT {
                self.valid[table] = true;
            }
        }
        if let Some(req) = prev.dispatcher.lut_request {
            self.user_request(req);
        }
        self.out()
    }
}

impl serde::Serialize for LutBank {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let tables: Vec<&[u32]> = self.tables.iter().map(|t| &t[..]).collect();
        let mut s = serializer.serialize_struct("LutBank", 3)?;
        s.serialize_field("valid", &self.valid)?;
        s.serialize_field("selected", &self.selected)?;
        s.serialize_field("tables", &tables)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_wires(write: Option<LutWrite>, validate: Option<usize>) -> Wires {
        let mut w = Wires::default();
        w.boot.lut_write = write;
        w.boot.lut_validate = validate;
        w
    }

    #[test]
    fn test_decode_user_request() {
        let req = LutUserRequest::decode(1, (1u64 << 63) | (0x42u64 << 32));
        assert_eq!(req.op, LutOp::Select { index: 0x42 });
        let req = LutUserRequest::decode(2, (0x07u64 << 32) | 0xCAFE_F00D);
        assert_eq!(
            req.op,
            LutOp::Write {
                index: 7,
                value: 0xCAFE_F00D
            }
        );
    }

    #[test]
    fn test_user_write_ignored_before_valid() {
        let mut bank = LutBank::new();
        let mut w = Wires::default();
        w.dispatcher.lut_request = Some(LutUserRequest::decode(0, (3u64 << 32) | 0x55));
        let out = bank.step(&w);
        assert_eq!(bank.entry(0, 3), Some(0));
        assert_eq!(out.selected[0], 3);
    }

    #[test]
    fn test_loader_write_ignored_after_valid() {
        let mut bank = LutBank::new();
        bank.step(&loader_wires(
            Some(LutWrite {
                table: 1,
                index: 0,
                value: 9,
            }),
            Some(1),
        ));
        assert!(bank.is_valid(1));
        bank.step(&loader_wires(
            Some(LutWrite {
                table: 1,
                index: 0,
                value: 10,
            }),
            None,
        ));
        assert_eq!(bank.entry(1, 0), Some(9));

        let mut w = Wires::default();
        w.dispatcher.lut_request = Some(LutUserRequest::decode(1, 11));
        let out = bank.step(&w);
        assert_eq!(bank.entry(1, 0), Some(11));
        assert_eq!(out.read_word(1), 11);
    }

    #[test]
    fn test_invalidate_all_hands_back_to_loader() {
        let mut bank = LutBank::new();
        bank.step(&loader_wires(None, Some(2)));
        assert_eq!(bank.out().valid_mask(), 0b0100);
        let mut w = Wires::default();
        w.boot.lut_invalidate_all = true;
        assert_eq!(bank.step(&w).valid_mask(), 0);
    }
}
