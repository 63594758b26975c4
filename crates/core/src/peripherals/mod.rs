// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Simulated external collaborators: the host link and the bus masters.

pub mod eeprom;
pub mod i2c;
pub mod spi;
pub mod uart;
