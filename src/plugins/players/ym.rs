//! YM register dumps (Atari ST).
//!
//! - `YM2!` / `YM3!`: 14 registers per frame, the rest of the data
//! - `YM3b`: as `YM3!` plus a trailing 32-bit loop frame
//! - `YM5!` / `YM6!`: 34-byte header after `LeOnArD!`, digidrums, three strings,
//!   16 registers per frame and an `End!` marker

use std::sync::Arc;

use crate::binary::Binary;
use crate::error::{FormatError, FormatResult};
use crate::format::BinaryFormat;
use crate::metadata::{self, BasicMetadata};
use crate::pattern::PatternSyntaxError;
use crate::plugins::{CreatedModule, DecodedModule, PlayerDecoder, Recognizer};

const FORMAT: &str = "'Y'M 32|33|35|36 '!|'b";
const SIGNATURE: &[u8] = b"LeOnArD!";
const HEADER_SIZE: usize = 34;
const END_MARKER: &[u8] = b"End!";
/// 100,000 frames is about 33 minutes at 50Hz
const MAX_FRAMES: usize = 100_000;

fn be_u16(data: &[u8], offset: usize) -> FormatResult<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(FormatError::UnexpectedEof)
}

fn be_u32(data: &[u8], offset: usize) -> FormatResult<usize> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize)
        .ok_or(FormatError::UnexpectedEof)
}

fn nt_string(data: &[u8], start: usize) -> FormatResult<(String, usize)> {
    let tail = data.get(start..).ok_or(FormatError::UnexpectedEof)?;
    let len = memchr::memchr(0, tail).ok_or(FormatError::UnterminatedString { start })?;
    Ok((
        String::from_utf8_lossy(&tail[..len]).into_owned(),
        start + len + 1,
    ))
}

/// Where a parsed YM file keeps its frames.
#[derive(Debug)]
struct YmLayout {
    metadata: BasicMetadata,
    frames_start: usize,
    frames_end: usize,
    size: usize,
}

fn parse_raw(data: &[u8], with_loop: bool) -> FormatResult<YmLayout> {
    let trailer = if with_loop { 4 } else { 0 };
    let body = data
        .len()
        .checked_sub(4 + trailer)
        .ok_or(FormatError::UnexpectedEof)?;
    let frames = body / 14;
    if frames == 0 {
        return Err("YM file has zero frames".into());
    }
    let mut metadata = BasicMetadata::new(if with_loop { "YM3b" } else { "YM3" });
    metadata.frame_count = Some(frames);
    Ok(YmLayout {
        metadata,
        frames_start: 4,
        frames_end: 4 + frames * 14,
        size: data.len(),
    })
}

fn parse_leonard(data: &[u8]) -> FormatResult<YmLayout> {
    if data.get(4..12) != Some(SIGNATURE) {
        return Err(FormatError::InvalidSignature);
    }
    let frames = be_u32(data, 12)?;
    let attributes = be_u32(data, 16)?;
    let digidrums = be_u16(data, 20)?;
    let frame_rate = be_u16(data, 26)?;
    let extra = be_u16(data, 32)?;
    if frames == 0 || frames > MAX_FRAMES {
        return Err(format!("invalid frame count {frames}").into());
    }

    let mut offset = HEADER_SIZE + usize::from(extra);
    for _ in 0..digidrums {
        let size = be_u32(data, offset)?;
        offset = offset
            .checked_add(4 + size)
            .filter(|&end| end <= data.len())
            .ok_or(FormatError::UnexpectedEof)?;
    }

    let (title, offset) = nt_string(data, offset)?;
    let (author, offset) = nt_string(data, offset)?;
    let (comments, offset) = nt_string(data, offset)?;

    let frames_end = offset + frames * 16;
    if data.get(frames_end..frames_end + END_MARKER.len()) != Some(END_MARKER) {
        return Err("missing End! marker".into());
    }

    let mut metadata = BasicMetadata::new(String::from_utf8_lossy(&data[..3]).into_owned());
    metadata.title = title;
    metadata.author = author;
    metadata.comments = comments;
    metadata.frame_count = Some(frames);
    if frame_rate > 0 {
        metadata.frame_rate = u32::from(frame_rate);
    }
    tracing::trace!(frames, attributes, digidrums, "parsed YM header");

    Ok(YmLayout {
        metadata,
        frames_start: offset,
        frames_end,
        size: frames_end + END_MARKER.len(),
    })
}

fn parse(data: &[u8]) -> FormatResult<YmLayout> {
    match data.get(..4) {
        Some(b"YM2!") | Some(b"YM3!") => parse_raw(data, false),
        Some(b"YM3b") => parse_raw(data, true),
        Some(b"YM5!") | Some(b"YM6!") => parse_leonard(data),
        _ => Err(FormatError::InvalidSignature),
    }
}

/// YM player plugin.
pub struct YmPlayer {
    format: BinaryFormat,
}

impl YmPlayer {
    /// Compile the signature.
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            format: BinaryFormat::with_min_size(FORMAT, 4 + 14)?,
        })
    }
}

impl Recognizer for YmPlayer {
    fn description(&self) -> &str {
        "YM register dump"
    }

    fn format(&self) -> &BinaryFormat {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data) && parse(data).is_ok()
    }
}

impl PlayerDecoder for YmPlayer {
    fn create(&self, data: &Binary) -> FormatResult<CreatedModule> {
        let layout = parse(data)?;
        let module = data
            .sub_container(0, layout.size)
            .ok_or(FormatError::UnexpectedEof)?;
        let properties = metadata::to_properties(&layout.metadata);
        Ok(CreatedModule {
            holder: Arc::new(DecodedModule::new(layout.metadata, module)),
            consumed: layout.size,
            fixed: layout.frames_start..layout.frames_end,
            properties,
        })
    }
}

#[cfg(test)]
pub(crate) fn create_minimal_ym6(frame_count: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"YM6!");
    data.extend_from_slice(SIGNATURE);
    data.extend_from_slice(&frame_count.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes()); // attributes
    data.extend_from_slice(&0u16.to_be_bytes()); // digidrums
    data.extend_from_slice(&2_000_000u32.to_be_bytes()); // master clock
    data.extend_from_slice(&50u16.to_be_bytes()); // frame rate
    data.extend_from_slice(&0u32.to_be_bytes()); // loop frame
    data.extend_from_slice(&0u16.to_be_bytes()); // extra data
    data.extend_from_slice(b"Test Song\0");
    data.extend_from_slice(b"Test Author\0");
    data.extend_from_slice(b"Test Comment\0");
    for frame in 0..frame_count {
        data.extend_from_slice(&[frame as u8; 16]);
    }
    data.extend_from_slice(END_MARKER);
    data
}
