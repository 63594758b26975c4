// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Checksums used on the wire (CRC-8) and in the EEPROM image (CRC32).

/// Byte fed through the CRC unit by the BIST self-check.
pub const BIST_VECTOR_INPUT: u8 = 0xAA;
/// Expected CRC-8 of [`BIST_VECTOR_INPUT`] from a zero seed.
pub const BIST_VECTOR_EXPECTED: u8 = 0x53;

/// One step of the packet CRC-8 (poly 0x07, MSB first, single shift per byte).
#[inline]
pub fn crc8_update(crc: u8, byte: u8) -> u8 {
    let t = crc ^ byte;
    let shifted = t << 1;
    if t & 0x80 != 0 {
        shifted ^ 0x07
    } else {
        shifted
    }
}

pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &b| crc8_update(crc, b))
}

/// IEEE 802.3 CRC32 (reflected, poly 0xEDB88320), as produced by zlib.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// CRC32 computed incrementally, one byte at a time, as bytes arrive off the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Crc32Stream {
    state: u32,
}

impl Default for Crc32Stream {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc32Stream {
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn push(&mut self, byte: u8) {
        let mut crc = self.state ^ byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
        self.state = crc;
    }

    pub fn finish(&self) -> u32 {
        !self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bist_vector() {
        assert_eq!(crc8_update(0x00, BIST_VECTOR_INPUT), BIST_VECTOR_EXPECTED);
    }

    #[test]
    fn test_crc8_host_reference_packet() {
        // Read of 0x10 from device 0: [00][02][10][00 x 8]
        let mut packet = vec![0x00, 0x02, 0x10];
        packet.extend_from_slice(&[0u8; 8]);
        let crc = crc8(&packet);
        packet.push(crc);
        // Appending the CRC of a frame to itself always folds to zero.
        assert_eq!(crc8(&packet), 0);
    }

    #[test]
    fn test_crc8_single_bytes() {
        assert_eq!(crc8(&[0x00]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x02);
        assert_eq!(crc8(&[0x80]), 0x07);
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn test_crc32_stream_matches_oneshot() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut stream = Crc32Stream::new();
        for &b in &data {
            stream.push(b);
        }
        assert_eq!(stream.finish(), crc32(&data));
    }
}
