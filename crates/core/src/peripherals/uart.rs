// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::ByteTransport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Byte-paced serial link. The host side pushes bytes through a [`HostPort`];
/// the engine side pulls at most one byte every `ticks_per_byte` ticks.
#[derive(Debug, serde::Serialize)]
pub struct UartLink {
    ticks_per_byte: u32,
    rx_holdoff: u32,
    tx_holdoff: u32,
    rx_bytes: u64,
    tx_bytes: u64,
    #[serde(skip)]
    rx: Arc<Mutex<VecDeque<u8>>>,
    #[serde(skip)]
    sink: Option<Arc<Mutex<Vec<u8>>>>,
}

/// Host end of a [`UartLink`].
#[derive(Debug, Clone)]
pub struct HostPort {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<Vec<u8>>>,
}

impl HostPort {
    pub fn send(&self, bytes: &[u8]) {
        if let Ok(mut q) = self.rx.lock() {
            q.extend(bytes.iter().copied());
        }
    }

    /// Drains everything the engine has transmitted so far.
    pub fn take_received(&self) -> Vec<u8> {
        self.tx
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default()
    }

    pub fn received_len(&self) -> usize {
        self.tx.lock().map(|v| v.len()).unwrap_or(0)
    }

    /// Bytes queued toward the engine and not yet consumed.
    pub fn pending(&self) -> usize {
        self.rx.lock().map(|q| q.len()).unwrap_or(0)
    }
}

impl UartLink {
    pub fn new(ticks_per_byte: u32) -> Self {
        Self {
            ticks_per_byte: ticks_per_byte.max(1),
            rx_holdoff: 0,
            tx_holdoff: 0,
            rx_bytes: 0,
            tx_bytes: 0,
            rx: Arc::new(Mutex::new(VecDeque::new())),
            sink: None,
        }
    }

    /// Creates a link together with its host port.
    pub fn pair(ticks_per_byte: u32) -> (Self, HostPort) {
        let mut link = Self::new(ticks_per_byte);
        let tx = Arc::new(Mutex::new(Vec::new()));
        link.set_sink(Some(tx.clone()));
        let port = HostPort {
            rx: link.rx.clone(),
            tx,
        };
        (link, port)
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>) {
        self.sink = sink;
    }
}

impl ByteTransport for UartLink {
    fn receive(&mut self) -> Option<u8> {
        if self.rx_holdoff > 0 {
            return None;
        }
        let byte = self.rx.lock().ok()?.pop_front()?;
        self.rx_holdoff = self.ticks_per_byte;
        self.rx_bytes += 1;
        Some(byte)
    }

    fn tx_ready(&self) -> bool {
        self.tx_holdoff == 0
    }

    fn transmit(&mut self, byte: u8) {
        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(byte);
            }
        }
        self.tx_holdoff = self.ticks_per_byte;
        self.tx_bytes += 1;
    }

    fn tick(&mut self) {
        self.rx_holdoff = self.rx_holdoff.saturating_sub(1);
        self.tx_holdoff = self.tx_holdoff.saturating_sub(1);
    }

    fn as_any(&self) -> Option<&dyn std::any::Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn std::any::Any> {
        Some(self)
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
