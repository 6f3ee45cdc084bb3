//! SCL: TR-DOS disk image in "SINCLAIR" catalogue form.
//!
//! Layout: `SINCLAIR`, file count, one 14-byte catalogue entry per file, the files'
//! sectors back to back, then a little-endian 32-bit sum of every preceding byte.

use std::collections::HashSet;

use nom::bytes::complete::{tag, take};
use nom::combinator::map;
use nom::multi::length_count;
use nom::number::complete::{le_u16, u8 as byte};
use nom::sequence::{preceded, tuple};
use nom::IResult;
use tracing::trace;

use crate::binary::Binary;
use crate::config::DetectConfig;
use crate::error::{FormatError, FormatResult};
use crate::format::BinaryFormat;
use crate::pattern::PatternSyntaxError;
use crate::plugins::{ArchiveDecoder, ArchiveEntry, Extracted, Recognizer};
use crate::properties::Properties;
use crate::range_checker::RangeChecker;

use super::trdos_filename;

const SIGNATURE: &[u8] = b"SINCLAIR";
const ENTRY_SIZE: usize = 14;
const SECTOR_SIZE: usize = 256;
const CHECKSUM_SIZE: usize = 4;
const FORMAT: &str = "'S'I'N'C'L'A'I'R 01-ff";

struct CatalogEntry<'a> {
    name: &'a [u8],
    kind: u8,
    sectors: u8,
}

fn catalog_entry(input: &[u8]) -> IResult<&[u8], CatalogEntry<'_>> {
    map(
        tuple((take(8usize), byte, le_u16, le_u16, byte)),
        |(name, kind, _start, _length, sectors)| CatalogEntry {
            name,
            kind,
            sectors,
        },
    )(input)
}

fn catalog(input: &[u8]) -> IResult<&[u8], Vec<CatalogEntry<'_>>> {
    preceded(tag(SIGNATURE), length_count(byte, catalog_entry))(input)
}

struct Layout<'a> {
    entries: Vec<CatalogEntry<'a>>,
    data_start: usize,
    size: usize,
}

/// SCL disk image plugin.
pub struct SclArchive {
    format: BinaryFormat,
}

impl SclArchive {
    /// Compile the signature.
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            format: BinaryFormat::with_min_size(
                FORMAT,
                SIGNATURE.len() + 1 + ENTRY_SIZE + SECTOR_SIZE + CHECKSUM_SIZE,
            )?,
        })
    }

    fn layout<'a>(&self, data: &'a [u8]) -> FormatResult<Layout<'a>> {
        if !self.format.matches(data) {
            return Err(FormatError::InvalidSignature);
        }
        let (_, entries) = catalog(data).map_err(|_| FormatError::UnexpectedEof)?;
        let data_start = SIGNATURE.len() + 1 + entries.len() * ENTRY_SIZE;
        let sectors: usize = entries.iter().map(|e| usize::from(e.sectors)).sum();
        let body_end = data_start + sectors * SECTOR_SIZE;
        let size = body_end + CHECKSUM_SIZE;
        if data.len() < size {
            return Err(FormatError::UnexpectedEof);
        }

        let stored = u32::from_le_bytes([
            data[body_end],
            data[body_end + 1],
            data[body_end + 2],
            data[body_end + 3],
        ]);
        let computed = data[..body_end]
            .iter()
            .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)));
        if stored != computed {
            return Err(FormatError::ChecksumMismatch { stored, computed });
        }

        Ok(Layout {
            entries,
            data_start,
            size,
        })
    }
}

impl Recognizer for SclArchive {
    fn description(&self) -> &str {
        "SCL disk image"
    }

    fn format(&self) -> &BinaryFormat {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.layout(data).is_ok()
    }
}

impl ArchiveDecoder for SclArchive {
    fn extract(&self, _config: &DetectConfig, data: &Binary) -> FormatResult<Extracted> {
        let layout = self.layout(data)?;
        let mut files = RangeChecker::simple(layout.size);
        let mut names = HashSet::new();
        let mut entries = Vec::with_capacity(layout.entries.len());
        let mut offset = layout.data_start;

        for entry in &layout.entries {
            let size = usize::from(entry.sectors) * SECTOR_SIZE;
            let start = offset;
            offset += size;
            if !files.add_range(start, size) {
                trace!(start, size, "skipping empty or oversized SCL entry");
                continue;
            }
            let Some(content) = data.sub_container(start, size) else {
                continue;
            };

            let base = trdos_filename(entry.name, entry.kind);
            let mut name = base.clone();
            let mut copy = 1;
            while !names.insert(name.clone()) {
                copy += 1;
                name = format!("{base}~{copy}");
            }

            entries.push(ArchiveEntry {
                name: Some(name),
                origin: Some((start, size)),
                data: content,
            });
        }

        if entries.is_empty() {
            return Err("SCL image contains no files".into());
        }
        Ok(Extracted {
            entries,
            consumed: layout.size,
            properties: Properties::new(),
        })
    }
}

/// Build an SCL image from `(name, type, content)` triples, padding each file to whole
/// sectors.
#[cfg(test)]
pub(crate) fn build(files: &[(&[u8; 8], u8, &[u8])]) -> Vec<u8> {
    let mut data = SIGNATURE.to_vec();
    data.push(files.len() as u8);
    let mut body = Vec::new();
    for (name, kind, content) in files {
        let sectors = content.len().div_ceil(SECTOR_SIZE);
        data.extend_from_slice(*name);
        data.push(*kind);
        data.extend_from_slice(&0x8000u16.to_le_bytes());
        data.extend_from_slice(&(content.len() as u16).to_le_bytes());
        data.push(sectors as u8);
        body.extend_from_slice(content);
        body.resize(body.len().div_ceil(SECTOR_SIZE) * SECTOR_SIZE, 0);
    }
    data.extend_from_slice(&body);
    let sum = data.iter().fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)));
    data.extend_from_slice(&sum.to_le_bytes());
    data
}
