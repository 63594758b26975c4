// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{SpiController, SpiRequest, SpiStatus};

/// What the simulated slave shifts back on MISO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum SpiResponder {
    /// MOSI tied to MISO.
    Loopback,
    Constant(u32),
}

/// Word-level SPI master. A transfer lasts `word_len * cycles_per_bit * max(clk_div, 1)` ticks.
#[derive(Debug, serde::Serialize)]
pub struct SimSpiMaster {
    cycles_per_bit: u32,
    responder: SpiResponder,
    remaining: u64,
    active: Option<SpiRequest>,
    status: SpiStatus,
}

impl SimSpiMaster {
    pub fn new(cycles_per_bit: u32) -> Self {
        Self::with_responder(cycles_per_bit, SpiResponder::Loopback)
    }

    pub fn with_responder(cycles_per_bit: u32, responder: SpiResponder) -> Self {
        Self {
            cycles_per_bit: cycles_per_bit.max(1),
            responder,
            remaining: 0,
            active: None,
            status: SpiStatus::default(),
        }
    }

    fn word_mask(word_len: u8) -> u32 {
        match word_len {
            0 | 32.. => u32::MAX,
            n => (1u32 << n) - 1,
        }
    }
}

impl SpiController for SimSpiMaster {
    fn start(&mut self, request: SpiRequest) {
        if self.status.busy {
            tracing::warn!("SPI start while busy ignored (cs {})", request.chip_select);
            return;
        }
        let bits = request.word_len.clamp(1, 32) as u64;
        self.remaining = bits * self.cycles_per_bit as u64 * request.clk_div.max(1) as u64;
        self.active = Some(request);
        self.status.busy = true;
        self.status.done = false;
    }

    fn status(&self) -> SpiStatus {
        self.status
    }

    fn tick(&mut self) {
        if !self.status.busy {
            return;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return;
        }
        if let Some(req) = self.active.take() {
            let mask = Self::word_mask(req.word_len);
            self.status.rx_data = match self.responder {
                SpiResponder::Loopback => req.data & mask,
                SpiResponder::Constant(v) => v & mask,
            };
            self.status.busy = false;
            self.status.done = true;
            self.status.completions = self.status.completions.wrapping_add(1);
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spi_loopback_masks_word() {
        let mut spi = SimSpiMaster::new(1);
        spi.start(SpiRequest {
            data: 0x1234_56AB,
            word_len: 8,
            ..Default::default()
        });
        for _ in 0..7 {
            spi.tick();
            assert!(spi.status().busy);
        }
        spi.tick();
        let s = spi.status();
        assert!(s.done && !s.busy);
        assert_eq!(s.rx_data, 0xAB);
        assert_eq!(s.completions, 1);
    }

    #[test]
    fn test_spi_constant_responder() {
        let mut spi = SimSpiMaster::with_responder(2, SpiResponder::Constant(0xFFFF_0000));
        spi.start(SpiRequest {
            data: 0,
            word_len: 32,
            clk_div: 1,
            ..Default::default()
        });
        for _ in 0..64 {
            spi.tick();
        }
        assert_eq!(spi.status().rx_data, 0xFFFF_0000);
    }
}
