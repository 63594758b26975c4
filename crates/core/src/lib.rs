// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bist;
pub mod boot;
pub mod bus;
pub mod crc;
pub mod dispatcher;
pub mod engine;
pub mod gpio_edge;
pub mod history;
pub mod interrupt;
pub mod lut;
pub mod metrics;
pub mod packet;
pub mod peripherals;
pub mod registers;
pub mod signals;
pub mod snapshot;
pub mod status;
pub mod system;
pub mod watchdog;

use std::any::Any;

pub use engine::{Engine, EngineSettings, ExternalInputs};
pub use signals::{TickInputs, Wires};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("EEPROM image of {len} bytes does not fit a {capacity}-byte device")]
    ImageTooLarge { len: usize, capacity: usize },
    #[error("LUT table {0} out of range 0-3")]
    LutTable(usize),
    #[error("GPIO bank {0} out of range 0-3")]
    GpioBank(usize),
    #[error("no response within {0} ticks")]
    ResponseTimeout(u64),
    #[error("malformed response: {0}")]
    Frame(#[from] packet::FrameError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Hooks for watching the engine without touching its state.
pub trait EngineObserver: std::fmt::Debug + Send + Sync {
    fn on_tick(&self, _wires: &signals::Wires) {}
    fn on_byte_received(&self, _byte: u8) {}
    fn on_byte_sent(&self, _byte: u8) {}
}

/// Byte-level link to the host. The engine pulls at most one byte per tick.
pub trait ByteTransport: std::fmt::Debug + Send {
    fn receive(&mut self) -> Option<u8>;
    fn tx_ready(&self) -> bool;
    fn transmit(&mut self, byte: u8);
    fn tick(&mut self) {}
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// One byte-wide I2C transaction. `register` is the device sub-address, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct I2cRequest {
    pub device: u8,
    pub register: Option<u16>,
    pub read: bool,
    pub data: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct I2cStatus {
    pub busy: bool,
    /// Set when the last transaction finished; cleared by the next start.
    pub done: bool,
    pub ack_error: bool,
    pub rx_data: u8,
    /// Free-running count of finished transactions.
    pub completions: u32,
}

/// Word-level I2C master. `start` takes effect immediately: `done` and
/// `ack_error` drop and `busy` rises before the next status sample.
pub trait I2cController: std::fmt::Debug + Send {
    fn start(&mut self, request: I2cRequest);
    fn status(&self) -> I2cStatus;
    fn tick(&mut self);
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SpiRequest {
    pub data: u32,
    /// Bits per word, 1..=32.
    pub word_len: u8,
    pub cpol: bool,
    pub cpha: bool,
    pub clk_div: u16,
    pub chip_select: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SpiStatus {
    pub busy: bool,
    pub done: bool,
    pub rx_data: u32,
    pub completions: u32,
}

pub trait SpiController: std::fmt::Debug + Send {
    fn start(&mut self, request: SpiRequest);
    fn status(&self) -> SpiStatus;
    fn tick(&mut self);
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
