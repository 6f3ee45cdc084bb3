//! LHA/LZH archives, decoded in memory with `delharc`.
//!
//! Only the first member is unpacked; chiptune files in the wild (YM in particular)
//! are single-file LH5 archives.

use std::io::Read;

use delharc::LhaDecodeReader;

use crate::binary::Binary;
use crate::config::DetectConfig;
use crate::error::{FormatError, FormatResult};
use crate::format::BinaryFormat;
use crate::pattern::PatternSyntaxError;
use crate::plugins::{ArchiveDecoder, ArchiveEntry, Extracted, Recognizer};
use crate::properties::Properties;

/// Header size byte, checksum, `-lhN-` method, 13 bytes of sizes/date/attributes, level.
const FORMAT: &str = "? ? '- 'l 'h 30-37 '- +13+ 00-02";
const LEVEL_OFFSET: usize = 20;
const MIN_SIZE: usize = 24;

fn read_u32_le(data: &[u8], offset: usize) -> usize {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]) as usize
}

/// Bytes taken by the first member: header plus compressed data.
fn member_size(data: &[u8]) -> Option<usize> {
    let packed = read_u32_le(data, 7);
    let header = match data[LEVEL_OFFSET] {
        // level 0/1: header length excludes the two leading bytes; for level 1 the
        // packed size already covers the extended headers
        0 | 1 => usize::from(data[0]) + 2,
        _ => usize::from(u16::from_le_bytes([data[0], data[1]])),
    };
    if header < MIN_SIZE {
        return None;
    }
    header.checked_add(packed).filter(|&size| size <= data.len())
}

/// LHA archive plugin.
pub struct LhaArchive {
    format: BinaryFormat,
}

impl LhaArchive {
    /// Compile the signature.
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            format: BinaryFormat::with_min_size(FORMAT, MIN_SIZE)?,
        })
    }
}

impl Recognizer for LhaArchive {
    fn description(&self) -> &str {
        "LHA/LZH archive"
    }

    fn format(&self) -> &BinaryFormat {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data) && member_size(data).is_some()
    }
}

impl ArchiveDecoder for LhaArchive {
    fn extract(&self, config: &DetectConfig, data: &Binary) -> FormatResult<Extracted> {
        if !self.format.matches(data) {
            return Err(FormatError::InvalidSignature);
        }
        let consumed = member_size(data).ok_or(FormatError::UnexpectedEof)?;

        let reader = LhaDecodeReader::new(&data[..consumed])
            .map_err(|e| FormatError::Decompression(format!("invalid LHA header: {e}")))?;
        let declared = reader.header().original_size;
        let limit = config.max_decoded_size;
        if declared > limit as u64 {
            return Err(FormatError::LimitExceeded {
                size: usize::try_from(declared).unwrap_or(usize::MAX),
                limit,
            });
        }

        let mut unpacked = Vec::new();
        reader
            .take(limit as u64 + 1)
            .read_to_end(&mut unpacked)
            .map_err(|e| FormatError::Decompression(e.to_string()))?;
        if unpacked.len() > limit {
            return Err(FormatError::LimitExceeded {
                size: unpacked.len(),
                limit,
            });
        }
        if unpacked.is_empty() {
            return Err(FormatError::Decompression("empty LHA member".into()));
        }

        Ok(Extracted {
            entries: vec![ArchiveEntry {
                name: None,
                origin: None,
                data: Binary::new(unpacked),
            }],
            consumed,
            properties: Properties::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level0_header(method: &[u8; 5], packed: u32, name: &[u8]) -> Vec<u8> {
        let mut header = vec![0u8, 0u8];
        header.extend_from_slice(method);
        header.extend_from_slice(&packed.to_le_bytes());
        header.extend_from_slice(&packed.to_le_bytes()); // original size
        header.extend_from_slice(&[0; 4]); // timestamp
        header.push(0x20); // attributes
        header.push(0); // level
        header.push(name.len() as u8);
        header.extend_from_slice(name);
        header.extend_from_slice(&[0, 0]); // crc16
        header[0] = (header.len() - 2) as u8;
        header
    }

    #[test]
    fn member_size_level0() {
        let plugin = LhaArchive::new().unwrap();
        let mut data = level0_header(b"-lh5-", 10, b"SONG.YM");
        let header = data.len();
        data.extend_from_slice(&[0x55; 10]);
        data.extend_from_slice(b"trailing");
        assert!(plugin.check(&data));
        assert_eq!(member_size(&data), Some(header + 10));
    }

    #[test]
    fn rejects_unknown_method_and_truncation() {
        let plugin = LhaArchive::new().unwrap();
        let mut data = level0_header(b"-lh8-", 4, b"A.YM");
        data.extend_from_slice(&[0; 4]);
        assert!(!plugin.check(&data));

        let mut data = level0_header(b"-lh5-", 400, b"A.YM");
        data.extend_from_slice(&[0; 4]);
        assert!(!plugin.check(&data));
    }
}
