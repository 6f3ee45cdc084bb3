//! ICE! 2.4 packed data (Atari ST).
//!
//! Header: `ICE!`, packed size and unpacked size as big-endian 32-bit values. The
//! packed size includes the 12 header bytes. The bit stream is read backwards from
//! the end of the packed data and the output is written backwards as well.

use crate::binary::Binary;
use crate::config::DetectConfig;
use crate::error::{FormatError, FormatResult};
use crate::format::BinaryFormat;
use crate::pattern::PatternSyntaxError;
use crate::plugins::{ArchiveDecoder, ArchiveEntry, Extracted, Recognizer};
use crate::properties::Properties;

const HEADER_SIZE: usize = 12;
const FORMAT: &str = "'I'C'E'! ? ? ? ? ? ? ? ?";

fn read_u32_be(data: &[u8], offset: usize) -> usize {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]) as usize
}

/// ICE! packer plugin.
pub struct IceArchive {
    format: BinaryFormat,
}

impl IceArchive {
    /// Compile the signature.
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            format: BinaryFormat::with_min_size(FORMAT, HEADER_SIZE + 1)?,
        })
    }

    /// `(packed, unpacked)` sizes from a valid header.
    fn sizes(&self, data: &[u8]) -> Option<(usize, usize)> {
        if !self.format.matches(data) {
            return None;
        }
        let packed = read_u32_be(data, 4);
        let unpacked = read_u32_be(data, 8);
        (packed > HEADER_SIZE && packed <= data.len() && unpacked > 0).then_some((packed, unpacked))
    }
}

impl Recognizer for IceArchive {
    fn description(&self) -> &str {
        "ICE! packed data"
    }

    fn format(&self) -> &BinaryFormat {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.sizes(data).is_some()
    }
}

impl ArchiveDecoder for IceArchive {
    fn extract(&self, config: &DetectConfig, data: &Binary) -> FormatResult<Extracted> {
        let (packed, unpacked) = self.sizes(data).ok_or(FormatError::InvalidSignature)?;
        if unpacked > config.max_decoded_size {
            return Err(FormatError::LimitExceeded {
                size: unpacked,
                limit: config.max_decoded_size,
            });
        }
        let depacked = depack(&data[..packed], unpacked)?;
        Ok(Extracted {
            entries: vec![ArchiveEntry {
                name: None,
                origin: None,
                data: Binary::new(depacked),
            }],
            consumed: packed,
            properties: Properties::new(),
        })
    }
}

/// Unpack a complete ICE! stream (header included) into `unpacked` bytes.
pub fn depack(packed: &[u8], unpacked: usize) -> FormatResult<Vec<u8>> {
    let mut output = vec![0u8; unpacked];
    Depacker {
        bits: BackwardBits::new(packed, HEADER_SIZE),
        output: &mut output,
        pos: unpacked,
    }
    .run()?;
    Ok(output)
}

/// MSB-first bit reader walking backwards through the packed bytes.
struct BackwardBits<'a> {
    data: &'a [u8],
    // next byte to load is data[pos - 1]
    pos: usize,
    floor: usize,
    current: u8,
    mask: u8,
}

impl<'a> BackwardBits<'a> {
    fn new(data: &'a [u8], floor: usize) -> Self {
        Self {
            data,
            pos: data.len(),
            floor,
            current: 0,
            mask: 0,
        }
    }

    fn next_byte(&mut self) -> FormatResult<u8> {
        if self.pos <= self.floor {
            return Err(FormatError::Decompression("packed stream exhausted".into()));
        }
        self.pos -= 1;
        Ok(self.data[self.pos])
    }

    /// Load the last byte, whose lowest set bit marks where the stream begins.
    fn prime(&mut self) -> FormatResult<()> {
        let mut current = self.next_byte()?;
        let mut mask = 0x80u8;
        if current == 0 {
            return Err(FormatError::Decompression("missing stream marker".into()));
        }
        while current & 1 == 0 {
            current >>= 1;
            mask >>= 1;
        }
        self.current = current >> 1;
        self.mask = mask;
        Ok(())
    }

    fn bits(&mut self, count: u32) -> FormatResult<usize> {
        let mut value = 0usize;
        for _ in 0..count {
            self.mask >>= 1;
            if self.mask == 0 {
                self.current = self.next_byte()?;
                self.mask = 0x80;
            }
            value = (value << 1) | usize::from(self.current & self.mask != 0);
        }
        Ok(value)
    }

    fn bit(&mut self) -> FormatResult<bool> {
        Ok(self.bits(1)? != 0)
    }
}

struct Depacker<'a, 'b> {
    bits: BackwardBits<'a>,
    output: &'b mut [u8],
    // bytes below `pos` are still to be written
    pos: usize,
}

impl Depacker<'_, '_> {
    fn run(&mut self) -> FormatResult<()> {
        self.bits.prime()?;
        while self.pos > 0 {
            if self.bits.bit()? {
                let len = self.literal_length()?;
                self.copy_literal(len)?;
                if self.pos == 0 {
                    break;
                }
            }
            let (len, distance) = self.match_params()?;
            self.copy_match(len, distance)?;
        }
        Ok(())
    }

    fn literal_length(&mut self) -> FormatResult<usize> {
        const WIDTH: [u32; 6] = [1, 2, 2, 3, 8, 15];
        const ESCAPE: [usize; 6] = [1, 3, 3, 7, 255, 32768];
        const BASE: [usize; 6] = [1, 2, 5, 8, 15, 270];

        let mut step = 0;
        loop {
            let value = self.bits.bits(WIDTH[step])?;
            if value != ESCAPE[step] || step == WIDTH.len() - 1 {
                return Ok(value + BASE[step]);
            }
            step += 1;
        }
    }

    fn match_params(&mut self) -> FormatResult<(usize, usize)> {
        const LEN_EXTRA: [u32; 5] = [0, 0, 1, 2, 10];
        const LEN_BASE: [usize; 5] = [0, 1, 2, 4, 8];
        const DIST_EXTRA: [u32; 3] = [8, 5, 12];
        const DIST_BASE: [usize; 3] = [32, 0, 288];

        let mut step = 0;
        while step < 4 && self.bits.bit()? {
            step += 1;
        }
        let len = LEN_BASE[step] + self.bits.bits(LEN_EXTRA[step])?;

        let distance = if len != 0 {
            let mut step = 0;
            while step < 2 && self.bits.bit()? {
                step += 1;
            }
            let distance = DIST_BASE[step] + self.bits.bits(DIST_EXTRA[step])?;
            if distance != 0 {
                distance + len
            } else {
                0
            }
        } else if self.bits.bit()? {
            64 + self.bits.bits(9)?
        } else {
            self.bits.bits(6)?
        };

        Ok((len + 2, distance))
    }

    fn copy_literal(&mut self, len: usize) -> FormatResult<()> {
        for _ in 0..len.min(self.pos) {
            self.pos -= 1;
            self.output[self.pos] = self.bits.next_byte()?;
        }
        Ok(())
    }

    fn copy_match(&mut self, len: usize, distance: usize) -> FormatResult<()> {
        let mut source = self.pos + distance;
        for _ in 0..len.min(self.pos) {
            if source >= self.output.len() {
                return Err(FormatError::Decompression(format!(
                    "back reference {distance} outside output"
                )));
            }
            self.pos -= 1;
            self.output[self.pos] = self.output[source];
            source -= 1;
        }
        Ok(())
    }
}
