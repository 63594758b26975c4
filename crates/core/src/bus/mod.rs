// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Peripheral bus mediation: the I2C channel 0 priority mux and the
//! completion monitor that feeds IRQ bits 3-6.

use crate::interrupt::IrqSource;
use crate::signals::{TickInputs, Wires};
use crate::I2cRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Owner {
    #[default]
    Engine,
    Loader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct BusOut {
    /// Transactions to start on each I2C channel this tick.
    pub i2c: [Option<I2cRequest>; 2],
    /// Boot loader holds the channel 0 grant.
    pub loader_owns_ch0: bool,
    /// Completion interrupts raised this tick.
    pub irq_set: IrqSource,
    /// Host requests on channel 0 dropped because the loader held the grant.
    pub dropped: u32,
}

/// Grants I2C channel 0 to the boot loader while it reports busy, and tags
/// completions with the owner of the transaction that produced them.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct I2cArbiter {
    ch0_owner: Owner,
    i2c_seen: [u32; 2],
    spi_seen: [u32; 2],
    dropped: u32,
}

impl I2cArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&mut self, prev: &Wires, now: &TickInputs) -> BusOut {
        let mut irq = IrqSource::empty();

        // Completions first: they belong to whoever started the transaction.
        if now.i2c[0].completions != self.i2c_seen[0] {
            self.i2c_seen[0] = now.i2c[0].completions;
            if self.ch0_owner == Owner::Engine {
                irq |= IrqSource::I2C0_DONE;
            }
        }
        if now.i2c[1].completions != self.i2c_seen[1] {
            self.i2c_seen[1] = now.i2c[1].completions;
            irq |= IrqSource::I2C1_DONE;
        }
        if now.spi[0].completions != self.spi_seen[0] {
            self.spi_seen[0] = now.spi[0].completions;
            irq |= IrqSource::SPI0_DONE;
        }
        if now.spi[1].completions != self.spi_seen[1] {
            self.spi_seen[1] = now.spi[1].completions;
            irq |= IrqSource::SPI1_DONE;
        }

        let [host_ch0, host_ch1] = prev.dispatcher.i2c_request;
        let loader_owns = prev.boot.busy;
        let ch0 = if loader_owns {
            if let Some(req) = host_ch0 {
                self.dropped = self.dropped.wrapping_add(1);
                tracing::debug!(
                    "I2C0 request to {:#04x} dropped: boot loader owns the bus",
                    req.device
                );
            }
            prev.boot.i2c_request
        } else {
            host_ch0
        };
        if ch0.is_some() {
            self.ch0_owner = if loader_owns {
                Owner::Loader
            } else {
                Owner::Engine
            };
        }

        BusOut {
            i2c: [ch0, host_ch1],
            loader_owns_ch0: loader_owns,
            irq_set: irq,
            dropped: self.dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(device: u8) -> I2cRequest {
        I2cRequest {
            device,
            read: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_loader_preempts_host() {
        let mut arb = I2cArbiter::new();
        let mut prev = Wires::default();
        prev.boot.busy = true;
        prev.boot.i2c_request = Some(req(0x50));
        prev.dispatcher.i2c_request = [Some(req(0x20)), Some(req(0x21))];
        let out = arb.step(&prev, &TickInputs::default());
        assert_eq!(out.i2c[0], Some(req(0x50)));
        assert_eq!(out.i2c[1], Some(req(0x21)));
        assert!(out.loader_owns_ch0);
        assert_eq!(out.dropped, 1);
    }

    #[test]
    fn test_host_owns_when_loader_idle() {
        let mut arb = I2cArbiter::new();
        let mut prev = Wires::default();
        prev.dispatcher.i2c_request = [Some(req(0x20)), None];
        let out = arb.step(&prev, &TickInputs::default());
        assert_eq!(out.i2c[0], Some(req(0x20)));
        assert!(!out.loader_owns_ch0);
    }

    #[test]
    fn test_loader_completion_raises_no_irq() {
        let mut arb = I2cArbiter::new();
        let mut prev = Wires::default();
        prev.boot.busy = true;
        prev.boot.i2c_request = Some(req(0x50));
        arb.step(&prev, &TickInputs::default());

        let mut now = TickInputs::default();
        now.i2c[0].completions = 1;
        let out = arb.step(&Wires::default(), &now);
        assert!(out.irq_set.is_empty());

        // Host transaction on the same channel does raise bit 3.
        let mut prev = Wires::default();
        prev.dispatcher.i2c_request = [Some(req(0x20)), None];
        arb.step(&prev, &now);
        now.i2c[0].completions = 2;
        let out = arb.step(&Wires::default(), &now);
        assert_eq!(out.irq_set, IrqSource::I2C0_DONE);
    }

    #[test]
    fn test_spi_and_ch1_completions() {
        let mut arb = I2cArbiter::new();
        let mut now = TickInputs::default();
        now.i2c[1].completions = 1;
        now.spi[1].completions = 4;
        let out = arb.step(&Wires::default(), &now);
        assert_eq!(out.irq_set, IrqSource::I2C1_DONE | IrqSource::SPI1_DONE);
        let out = arb.step(&Wires::default(), &now);
        assert!(out.irq_set.is_empty());
    }
}
