// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Wire framing: 12-byte command packets in, 10-byte response packets out.

use crate::crc::{crc8, crc8_update};

pub const COMMAND_LEN: usize = 12;
pub const RESPONSE_LEN: usize = 10;
pub const RESPONSE_HEADER: u8 = 0x02;
pub const BROADCAST_ADDRESS: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[repr(u8)]
pub enum Command {
    Write = 0x01,
    Read = 0x02,
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Command::Write),
            0x02 => Ok(Command::Read),
            other => Err(other),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("CRC mismatch: computed {computed:#04x}, received {received:#04x}")]
    Crc { computed: u8, received: u8 },
    #[error("unexpected response header {0:#04x}")]
    Header(u8),
}

/// A decoded command frame. `command` keeps the raw byte so unknown commands can be
/// reported as command errors after the CRC check passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CommandPacket {
    pub device_address: u8,
    pub command: u8,
    pub register: u8,
    pub payload: u64,
}

impl CommandPacket {
    pub fn write(device_address: u8, register: u8, payload: u64) -> Self {
        Self {
            device_address,
            command: Command::Write as u8,
            register,
            payload,
        }
    }

    pub fn read(device_address: u8, register: u8) -> Self {
        Self {
            device_address,
            command: Command::Read as u8,
            register,
            payload: 0,
        }
    }

    pub fn kind(&self) -> Result<Command, u8> {
        Command::try_from(self.command)
    }

    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let mut out = [0u8; COMMAND_LEN];
        out[0] = self.device_address;
        out[1] = self.command;
        out[2] = self.register;
        out[3..11].copy_from_slice(&self.payload.to_be_bytes());
        out[11] = crc8(&out[..11]);
        out
    }

    pub fn decode(bytes: &[u8; COMMAND_LEN]) -> Result<Self, FrameError> {
        let computed = crc8(&bytes[..11]);
        if computed != bytes[11] {
            return Err(FrameError::Crc {
                computed,
                received: bytes[11],
            });
        }
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&bytes[3..11]);
        Ok(Self {
            device_address: bytes[0],
            command: bytes[1],
            register: bytes[2],
            payload: u64::from_be_bytes(payload),
        })
    }

    pub fn addressed_to(&self, own_address: u8) -> bool {
        self.device_address == own_address || self.device_address == BROADCAST_ADDRESS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ResponsePacket {
    pub payload: u64,
}

impl ResponsePacket {
    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut out = [0u8; RESPONSE_LEN];
        out[0] = RESPONSE_HEADER;
        out[1..9].copy_from_slice(&self.payload.to_be_bytes());
        out[9] = crc8(&out[..9]);
        out
    }

    pub fn decode(bytes: &[u8; RESPONSE_LEN]) -> Result<Self, FrameError> {
        if bytes[0] != RESPONSE_HEADER {
            return Err(FrameError::Header(bytes[0]));
        }
        let computed = crc8(&bytes[..9]);
        if computed != bytes[9] {
            return Err(FrameError::Crc {
                computed,
                received: bytes[9],
            });
        }
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&bytes[1..9]);
        Ok(Self {
            payload: u64::from_be_bytes(payload),
        })
    }
}

/// Receive-side accumulator. The CRC is folded in as bytes arrive, so completion
/// needs no second pass over the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct FrameAssembler {
    buf: [u8; COMMAND_LEN],
    len: usize,
    crc: u8,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Accepts one byte. Returns the decoded frame once the twelfth byte lands.
    pub fn push(&mut self, byte: u8) -> Option<Result<CommandPacket, FrameError>> {
        self.buf[self.len] = byte;
        self.len += 1;
        if self.len < COMMAND_LEN {
            self.crc = crc8_update(self.crc, byte);
            return None;
        }

        let frame = std::mem::take(self);
        let received = frame.buf[COMMAND_LEN - 1];
        if frame.crc != received {
            return Some(Err(FrameError::Crc {
                computed: frame.crc,
                received,
            }));
        }
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&frame.buf[3..11]);
        Some(Ok(CommandPacket {
            device_address: frame.buf[0],
            command: frame.buf[1],
            register: frame.buf[2],
            payload: u64::from_be_bytes(payload),
        }))
    }
}

/// Transmit-side sequencer: header, eight payload bytes, then the running CRC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ResponseStream {
    payload: u64,
    index: usize,
    crc: u8,
}

impl ResponseStream {
    pub fn new(payload: u64) -> Self {
        Self {
            payload,
            index: 0,
            crc: 0,
        }
    }

    /// Byte due at the current position.
    pub fn current(&self) -> u8 {
        match self.index {
            0 => RESPONSE_HEADER,
            1..=8 => self.payload.to_be_bytes()[self.index - 1],
            _ => self.crc,
        }
    }

    /// Marks the current byte as sent. Returns true when the stream is finished.
    pub fn advance(&mut self) -> bool {
        if self.index < RESPONSE_LEN - 1 {
            self.crc = crc8_update(self.crc, self.current());
        }
        self.index += 1;
        self.index >= RESPONSE_LEN
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn payload(&self) -> u64 {
        self.payload
    }
}
