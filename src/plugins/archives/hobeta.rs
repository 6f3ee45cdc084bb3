//! Hobeta: a single TR-DOS file with a 17-byte header.
//!
//! Header layout (little-endian):
//! - 0..8: file name, space padded
//! - 8..11: type letter and two parameter bytes
//! - 11..13: data length
//! - 13..15: length in whole sectors (low byte always zero)
//! - 15..17: header checksum

use nom::bytes::complete::take;
use nom::combinator::map;
use nom::number::complete::le_u16;
use nom::sequence::tuple;
use nom::IResult;

use crate::binary::Binary;
use crate::config::DetectConfig;
use crate::error::{FormatError, FormatResult};
use crate::format::BinaryFormat;
use crate::pattern::PatternSyntaxError;
use crate::plugins::{ArchiveDecoder, ArchiveEntry, Extracted, Recognizer};
use crate::properties::Properties;

const HEADER_SIZE: usize = 17;
const MAX_DATA_SIZE: u16 = 0xff00;
const FORMAT: &str = "20-7f{8} 20-7f ? ? ? ? 00 01-ff ? ?";

struct Header {
    length: u16,
    full_length: u16,
    crc: u16,
}

fn header(input: &[u8]) -> IResult<&[u8], Header> {
    map(
        tuple((take(8usize), take(3usize), le_u16, le_u16, le_u16)),
        |(_name, _kind, length, full_length, crc)| Header {
            length,
            full_length,
            crc,
        },
    )(input)
}

fn checksum(header: &[u8]) -> u16 {
    let sum: u32 = header[..HEADER_SIZE - 2].iter().map(|&b| u32::from(b)).sum();
    (105u32.wrapping_add(257u32.wrapping_mul(sum)) & 0xffff) as u16
}

/// Hobeta archive plugin.
pub struct HobetaArchive {
    format: BinaryFormat,
}

impl HobetaArchive {
    /// Compile the signature.
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            format: BinaryFormat::with_min_size(FORMAT, HEADER_SIZE + 1)?,
        })
    }

    fn parse(&self, data: &[u8]) -> FormatResult<Header> {
        if !self.format.matches(data) {
            return Err(FormatError::InvalidSignature);
        }
        let (_, header) = header(data).map_err(|_| FormatError::UnexpectedEof)?;
        if header.length == 0 || header.length > MAX_DATA_SIZE {
            return Err(format!("invalid data length {}", header.length).into());
        }
        let aligned = (u32::from(header.length) + 0xff) & !0xff;
        if u32::from(header.full_length) != aligned {
            return Err(format!(
                "sector length {} does not match data length {}",
                header.full_length, header.length
            )
            .into());
        }
        let computed = checksum(data);
        if computed != header.crc {
            return Err(FormatError::ChecksumMismatch {
                stored: u32::from(header.crc),
                computed: u32::from(computed),
            });
        }
        if data.len() < HEADER_SIZE + usize::from(header.length) {
            return Err(FormatError::UnexpectedEof);
        }
        Ok(header)
    }
}

impl Recognizer for HobetaArchive {
    fn description(&self) -> &str {
        "Hobeta"
    }

    fn format(&self) -> &BinaryFormat {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.parse(data).is_ok()
    }
}

impl ArchiveDecoder for HobetaArchive {
    fn extract(&self, _config: &DetectConfig, data: &Binary) -> FormatResult<Extracted> {
        let header = self.parse(data)?;
        let length = usize::from(header.length);
        let payload = data
            .sub_container(HEADER_SIZE, length)
            .ok_or(FormatError::UnexpectedEof)?;

        Ok(Extracted {
            entries: vec![ArchiveEntry {
                name: None,
                origin: Some((HEADER_SIZE, length)),
                data: payload,
            }],
            consumed: (HEADER_SIZE + usize::from(header.full_length)).min(data.size()),
            properties: Properties::new(),
        })
    }
}

/// Wrap `payload` in a Hobeta header, as used by tests across the crate.
#[cfg(test)]
pub(crate) fn wrap(name: &[u8; 8], kind: u8, payload: &[u8]) -> Vec<u8> {
    let length = payload.len() as u16;
    let full = ((u32::from(length) + 0xff) & !0xff) as u16;
    let mut data = Vec::with_capacity(HEADER_SIZE + usize::from(full));
    data.extend_from_slice(name);
    data.extend_from_slice(&[kind, 0x00, 0x80]);
    data.extend_from_slice(&length.to_le_bytes());
    data.extend_from_slice(&full.to_le_bytes());
    let crc = checksum(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    data.extend_from_slice(payload);
    data.resize(HEADER_SIZE + usize::from(full), 0);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_header() {
        let plugin = HobetaArchive::new().unwrap();
        let data = wrap(b"TUNE    ", b'C', &[0xAA; 300]);
        assert_eq!(data.len(), HEADER_SIZE + 512);
        assert!(plugin.check(&data));

        let extracted = plugin
            .extract(&DetectConfig::default(), &Binary::new(data))
            .unwrap();
        assert_eq!(extracted.consumed, HEADER_SIZE + 512);
        assert_eq!(extracted.entries.len(), 1);
        assert!(extracted.entries[0].name.is_none());
        assert_eq!(extracted.entries[0].data.size(), 300);
    }

    #[test]
    fn rejects_bad_checksum() {
        let plugin = HobetaArchive::new().unwrap();
        let mut data = wrap(b"TUNE    ", b'C', &[1, 2, 3]);
        data[15] ^= 0x01;
        assert!(!plugin.check(&data));
        let err = plugin
            .extract(&DetectConfig::default(), &Binary::new(data))
            .unwrap_err();
        assert!(matches!(err, FormatError::ChecksumMismatch { .. }));
    }

    #[test]
    fn rejects_inconsistent_sizes() {
        let plugin = HobetaArchive::new().unwrap();
        let mut data = wrap(b"TUNE    ", b'C', &[0; 16]);
        // claim two sectors for 16 bytes and fix up the checksum
        data[14] = 2;
        let crc = checksum(&data);
        data[15..17].copy_from_slice(&crc.to_le_bytes());
        assert!(!plugin.check(&data));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let plugin = HobetaArchive::new().unwrap();
        let data = wrap(b"TUNE    ", b'C', &[7; 100]);
        assert!(!plugin.check(&data[..HEADER_SIZE + 50]));
    }
}
