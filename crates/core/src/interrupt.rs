// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use bitflags::bitflags;

bitflags! {
    /// Sticky interrupt sources, one bit per owner.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct IrqSource: u8 {
        const CRC_ERROR = 1 << 0;
        const TIMEOUT = 1 << 1;
        const CMD_ERROR = 1 << 2;
        const I2C0_DONE = 1 << 3;
        const I2C1_DONE = 1 << 4;
        const SPI0_DONE = 1 << 5;
        const SPI1_DONE = 1 << 6;
        const GPIO_EDGE = 1 << 7;
    }
}

impl Default for IrqSource {
    fn default() -> Self {
        IrqSource::empty()
    }
}

impl IrqSource {
    /// Bits 0-6; the dispatcher may clear these directly.
    pub const LOCAL: IrqSource = IrqSource::from_bits_truncate(0x7F);
}

/// The dispatcher-owned half of the IRQ status word. Bit 7 is not stored here:
/// it mirrors the edge detector's latched state and is cleared by request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IrqController {
    local: IrqSource,
    gpio: bool,
}

impl IrqController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one tick. Clears apply before sets, so a same-tick set survives.
    pub fn tick(&mut self, set: IrqSource, clear: IrqSource, gpio_latched: bool) {
        let set = set & IrqSource::LOCAL;
        let clear = clear & IrqSource::LOCAL;
        self.local = self.local.difference(clear).union(set);
        self.gpio = gpio_latched;
    }

    pub fn status(&self) -> IrqSource {
        let mut status = self.local;
        status.set(IrqSource::GPIO_EDGE, self.gpio);
        status
    }

    pub fn irq_out(&self, enable_mask: u8) -> bool {
        self.status().bits() & enable_mask != 0
    }
}
