// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::peripherals::i2c::I2cDevice;
use crate::{EngineError, EngineResult};

/// Mock 24xx-series I2C EEPROM with 16-bit word addressing.
///
/// A transaction without a sub-address continues from the internal address
/// pointer, which auto-increments and wraps at the device size.
#[derive(Debug, serde::Serialize)]
pub struct Eeprom24 {
    #[serde(skip)]
    data: Vec<u8>,
    size: usize,
    pointer: usize,
    write_protect: bool,
    reads: u64,
}

impl Eeprom24 {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0xFF; size.max(1)],
            size: size.max(1),
            pointer: 0,
            write_protect: false,
            reads: 0,
        }
    }

    pub fn with_image(size: usize, image: &[u8]) -> EngineResult<Self> {
        let mut dev = Self::new(size);
        dev.load(image)?;
        Ok(dev)
    }

    pub fn load(&mut self, image: &[u8]) -> EngineResult<()> {
        if image.len() > self.size {
            return Err(EngineError::ImageTooLarge {
                len: image.len(),
                capacity: self.size,
            });
        }
        self.data[..image.len()].copy_from_slice(image);
        Ok(())
    }

    pub fn set_write_protect(&mut self, wp: bool) {
        self.write_protect = wp;
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    fn seek(&mut self, register: Option<u16>) -> usize {
        if let Some(addr) = register {
            self.pointer = addr as usize % self.size;
        }
        let at = self.pointer;
        self.pointer = (self.pointer + 1) % self.size;
        at
    }
}

impl I2cDevice for Eeprom24 {
    fn read(&mut self, register: Option<u16>) -> Option<u8> {
        let at = self.seek(register);
        self.reads += 1;
        Some(self.data[at])
    }

    fn write(&mut self, register: Option<u16>, value: u8) -> bool {
        let at = self.seek(register);
        if !self.write_protect {
            self.data[at] = value;
        }
        // Write-protected parts still acknowledge.
        true
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_read_wraps() {
        let mut rom = Eeprom24::with_image(4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(rom.read(Some(2)), Some(3));
        assert_eq!(rom.read(None), Some(4));
        assert_eq!(rom.read(None), Some(1));
    }

    #[test]
    fn test_image_too_large() {
        let err = Eeprom24::with_image(2, &[0; 3]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ImageTooLarge {
                len: 3,
                capacity: 2
            }
        ));
    }

    #[test]
    fn test_write_protect() {
        let mut rom = Eeprom24::new(16);
        rom.set_write_protect(true);
        assert!(rom.write(Some(0), 0x12));
        assert_eq!(rom.read(Some(0)), Some(0xFF));
        rom.set_write_protect(false);
        rom.write(Some(0), 0x12);
        assert_eq!(rom.contents()[0], 0x12);
    }
}
