// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! EEPROM LUT image layout: a 12-byte header, four 8-byte descriptors and four
//! 1 KiB data blocks, all big-endian.

use crate::crc::crc32;
use crate::lut::{LUT_COUNT, LUT_ENTRIES};

pub const MAGIC: [u8; 4] = *b"LFPG";
pub const FORMAT_VERSION: u8 = 1;
pub const HEADER_ADDR: u16 = 0x0000;
pub const HEADER_LEN: usize = 12;
pub const DESCRIPTOR_ADDR: u16 = 0x0010;
pub const DESCRIPTOR_LEN: usize = 8;
pub const LUT_DATA_ADDR: u16 = 0x0030;
pub const LUT_BLOCK_LEN: usize = 0x400;
pub const ENTRY_WIDTH: u8 = 4;
/// Smallest image holding all four blocks.
pub const MIN_IMAGE_LEN: usize = LUT_DATA_ADDR as usize + LUT_COUNT * LUT_BLOCK_LEN;

pub fn lut_block_addr(n: usize) -> u16 {
    LUT_DATA_ADDR + (n * LUT_BLOCK_LEN) as u16
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("image truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("bad magic {0:02x?}")]
    Magic([u8; 4]),
    #[error("unsupported format version {0}")]
    Version(u8),
    #[error("LUT count {0} outside 1-4")]
    LutCount(u8),
    #[error("header CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    HeaderCrc { stored: u32, computed: u32 },
    #[error("descriptor {index}: {reason}")]
    Descriptor { index: usize, reason: String },
    #[error("LUT {index} CRC mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    LutCrc {
        index: usize,
        stored: u32,
        computed: u32,
    },
    #[error("descriptor {index}: LUT type {lut_type} already loaded by an earlier block")]
    DuplicateLutType { index: usize, lut_type: u8 },
    #[error("LUT {0} has more than 256 entries")]
    TooManyEntries(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ImageHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub lut_count: u8,
    pub total_size: u16,
    pub crc32: u32,
}

impl ImageHeader {
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: bytes[4],
            lut_count: bytes[5],
            total_size: u16::from_be_bytes([bytes[6], bytes[7]]),
            crc32: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }

    /// CRC32 over magic, version, count and size.
    pub fn computed_crc(bytes: &[u8; HEADER_LEN]) -> u32 {
        crc32(&bytes[..8])
    }

    pub fn check(&self, bytes: &[u8; HEADER_LEN], verify_crc: bool) -> Result<(), ImageError> {
        if self.magic != MAGIC {
            return Err(ImageError::Magic(self.magic));
        }
        if self.version != FORMAT_VERSION {
            return Err(ImageError::Version(self.version));
        }
        if self.lut_count == 0 || self.lut_count as usize > LUT_COUNT {
            return Err(ImageError::LutCount(self.lut_count));
        }
        let computed = Self::computed_crc(bytes);
        if verify_crc && computed != self.crc32 {
            return Err(ImageError::HeaderCrc {
                stored: self.crc32,
                computed,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Descriptor {
    pub entry_count: u16,
    pub entry_width: u8,
    pub lut_type: u8,
    pub crc32: u32,
}

impl Descriptor {
    pub fn parse(bytes: &[u8; DESCRIPTOR_LEN]) -> Self {
        Self {
            entry_count: u16::from_be_bytes([bytes[0], bytes[1]]),
            entry_width: bytes[2],
            lut_type: bytes[3],
            crc32: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    pub fn encode(&self) -> [u8; DESCRIPTOR_LEN] {
        let mut out = [0u8; DESCRIPTOR_LEN];
        out[..2].copy_from_slice(&self.entry_count.to_be_bytes());
        out[2] = self.entry_width;
        out[3] = self.lut_type;
        out[4..].copy_from_slice(&self.crc32.to_be_bytes());
        out
    }

    pub fn check(&self, index: usize) -> Result<(), ImageError> {
        let reason = if self.entry_count == 0 || self.entry_count as usize > LUT_ENTRIES {
            format!("entry count {} outside 1-256", self.entry_count)
        } else if self.entry_width != ENTRY_WIDTH {
            format!("entry width {} (expected 4)", self.entry_width)
        } else if self.lut_type as usize >= LUT_COUNT {
            format!("LUT type {} outside 0-3", self.lut_type)
        } else {
            return Ok(());
        };
        Err(ImageError::Descriptor { index, reason })
    }

    pub fn data_len(&self) -> usize {
        self.entry_count as usize * self.entry_width as usize
    }
}

/// Checks each descriptor and rejects a table type named by more than one block.
pub fn check_descriptors(descriptors: &[Descriptor]) -> Result<(), ImageError> {
    let mut seen = [false; LUT_COUNT];
    for (index, desc) in descriptors.iter().enumerate() {
        desc.check(index)?;
        let slot = &mut seen[desc.lut_type as usize];
        if *slot {
            return Err(ImageError::DuplicateLutType {
                index,
                lut_type: desc.lut_type,
            });
        }
        *slot = true;
    }
    Ok(())
}

/// Builds and parses EEPROM images on the host side.
#[derive(Debug, Clone, Default)]
pub struct EepromImage {
    luts: Vec<(u8, Vec<u32>)>,
}

impl EepromImage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a table of type `lut_type` (0-3). Tables are stored in call order.
    pub fn with_lut(mut self, lut_type: u8, entries: Vec<u32>) -> Result<Self, ImageError> {
        if entries.len() > LUT_ENTRIES {
            return Err(ImageError::TooManyEntries(self.luts.len()));
        }
        if self.luts.len() >= LUT_COUNT {
            return Err(ImageError::LutCount(self.luts.len() as u8 + 1));
        }
        if self.luts.iter().any(|(t, _)| *t == lut_type) {
            return Err(ImageError::DuplicateLutType {
                index: self.luts.len(),
                lut_type,
            });
        }
        self.luts.push((lut_type, entries));
        Ok(self)
    }

    /// Serializes into a buffer of `size` bytes (erased EEPROM reads 0xFF).
    pub fn build(&self, size: usize) -> Result<Vec<u8>, ImageError> {
        if size < MIN_IMAGE_LEN {
            return Err(ImageError::Truncated {
                need: MIN_IMAGE_LEN,
                have: size,
            });
        }
        if self.luts.is_empty() {
            return Err(ImageError::LutCount(0));
        }
        let mut image = vec![0xFFu8; size];
        image[..4].copy_from_slice(&MAGIC);
        image[4] = FORMAT_VERSION;
        image[5] = self.luts.len() as u8;
        let total = (self.luts.len() * LUT_BLOCK_LEN) as u16;
        image[6..8].copy_from_slice(&total.to_be_bytes());
        let header_crc = crc32(&image[..8]);
        image[8..12].copy_from_slice(&header_crc.to_be_bytes());

        for (n, (lut_type, entries)) in self.luts.iter().enumerate() {
            let mut data = Vec::with_capacity(LUT_BLOCK_LEN);
            for i in 0..LUT_ENTRIES {
                data.extend_from_slice(&entries.get(i).copied().unwrap_or(0).to_be_bytes());
            }
            let desc = Descriptor {
                entry_count: LUT_ENTRIES as u16,
                entry_width: ENTRY_WIDTH,
                lut_type: *lut_type,
                crc32: crc32(&data),
            };
            let d = DESCRIPTOR_ADDR as usize + n * DESCRIPTOR_LEN;
            image[d..d + DESCRIPTOR_LEN].copy_from_slice(&desc.encode());
            let a = lut_block_addr(n) as usize;
            image[a..a + data.len()].copy_from_slice(&data);
        }
        Ok(image)
    }
}

/// Result of checking an image offline, as the loader would.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImageReport {
    pub header: ImageHeader,
    pub header_crc_ok: bool,
    pub luts: Vec<LutReport>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LutReport {
    pub index: usize,
    pub descriptor: Descriptor,
    pub computed_crc: u32,
    pub crc_ok: bool,
}

impl ImageReport {
    pub fn is_valid(&self) -> bool {
        self.header_crc_ok && self.luts.iter().all(|l| l.crc_ok)
    }
}

/// Parses `image` and reports per-table CRC verdicts. Structural problems
/// (magic, version, count, descriptors) are errors; CRC mismatches are reported.
pub fn inspect(image: &[u8]) -> Result<ImageReport, ImageError> {
    if image.len() < HEADER_LEN {
        return Err(ImageError::Truncated {
            need: HEADER_LEN,
            have: image.len(),
        });
    }
    let mut raw = [0u8; HEADER_LEN];
    raw.copy_from_slice(&image[..HEADER_LEN]);
    let header = ImageHeader::parse(&raw);
    header.check(&raw, false)?;
    let header_crc_ok = ImageHeader::computed_crc(&raw) == header.crc32;

    let mut luts: Vec<LutReport> = Vec::new();
    for index in 0..header.lut_count as usize {
        let d = DESCRIPTOR_ADDR as usize + index * DESCRIPTOR_LEN;
        let a = lut_block_addr(index) as usize;
        let mut raw_desc = [0u8; DESCRIPTOR_LEN];
        raw_desc.copy_from_slice(image.get(d..d + DESCRIPTOR_LEN).ok_or(ImageError::Truncated {
            need: d + DESCRIPTOR_LEN,
            have: image.len(),
        })?);
        let descriptor = Descriptor::parse(&raw_desc);
        descriptor.check(index)?;
        if luts.iter().any(|l| l.descriptor.lut_type == descriptor.lut_type) {
            return Err(ImageError::DuplicateLutType {
                index,
                lut_type: descriptor.lut_type,
            });
        }
        let data = image
            .get(a..a + descriptor.data_len())
            .ok_or(ImageError::Truncated {
                need: a + descriptor.data_len(),
                have: image.len(),
            })?;
        let computed_crc = crc32(data);
        luts.push(LutReport {
            index,
            descriptor,
            computed_crc,
            crc_ok: computed_crc == descriptor.crc32,
        });
    }

    Ok(ImageReport {
        header,
        header_crc_ok,
        luts,
    })
}
