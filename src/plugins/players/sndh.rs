//! SNDH modules (Atari ST).
//!
//! An SNDH file is 68000 replay code starting with a `BRA` over a tag header:
//! `SNDH` at offset 12, then tags up to `HDNS`. Files are often distributed as a
//! GEMDOS executable, so a `PRG` header in front of the module is accepted as a stub.

use std::sync::Arc;

use crate::binary::Binary;
use crate::error::{FormatError, FormatResult};
use crate::format::BinaryFormat;
use crate::metadata::{self, BasicMetadata};
use crate::pattern::PatternSyntaxError;
use crate::plugins::{
    DecodedModule, DecodedTracks, MultitrackDecoder, Recognizer, TrackModule,
};
use crate::properties::{keys, Properties};

const FORMAT: &str = "60 +11+ 'S'N'D'H";
/// GEMDOS executable header: `BRA.S +26`, then segment sizes and flags.
const PRG_STUB: &str = "60 1a +26+";
const MAX_SUBSONGS: usize = 128;

/// Tag header of an SNDH file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SndhHeader {
    /// `TITL` tag.
    pub title: String,
    /// `COMM` tag (composer).
    pub author: String,
    /// `YEAR` tag.
    pub year: String,
    /// `RIPP` tag.
    pub ripper: String,
    /// `CONV` tag.
    pub converter: String,
    /// `##nn` tag, at least 1.
    pub subsong_count: usize,
    /// `!#nn` tag, 1-based.
    pub default_subsong: usize,
    /// Replay rate in Hz from a timer or `!V` tag.
    pub player_rate: u32,
    /// `FRMS` tag, frames per subsong (0 = endless).
    pub subsong_frames: Vec<u32>,
    /// `TIME` tag, seconds per subsong.
    pub subsong_seconds: Vec<u16>,
    /// `#!SN` tag, subsong names.
    pub subsong_names: Vec<String>,
}

impl SndhHeader {
    fn frames(&self, subsong: usize) -> Option<usize> {
        match self.subsong_frames.get(subsong) {
            Some(&frames) if frames > 0 => Some(frames as usize),
            _ => self
                .subsong_seconds
                .get(subsong)
                .filter(|&&seconds| seconds > 0)
                .map(|&seconds| usize::from(seconds) * self.player_rate as usize),
        }
    }
}

fn read_nt_string(data: &[u8], start: usize) -> (String, usize) {
    let tail = data.get(start..).unwrap_or_default();
    let len = memchr::memchr(0, tail).unwrap_or(tail.len());
    (
        String::from_utf8_lossy(&tail[..len]).trim().to_string(),
        start + len + 1,
    )
}

fn read_decimal<T: std::str::FromStr>(data: &[u8], start: usize) -> (Option<T>, usize) {
    let (text, next) = read_nt_string(data, start);
    (text.parse().ok(), next)
}

/// Parse the tag header at the start of `data`.
pub fn parse_header(data: &[u8]) -> FormatResult<SndhHeader> {
    if data.len() < 16 {
        return Err(FormatError::UnexpectedEof);
    }
    if data[0] != 0x60 || &data[12..16] != b"SNDH" {
        return Err(FormatError::InvalidSignature);
    }

    let header_end = if data[1] != 0 {
        usize::from(data[1]) + 2
    } else {
        usize::from(u16::from_be_bytes([data[2], data[3]])) + 2
    }
    .min(data.len());

    let mut header = SndhHeader {
        subsong_count: 1,
        default_subsong: 1,
        player_rate: 50,
        ..Default::default()
    };

    let mut pos = 16;
    while pos + 4 <= header_end {
        let tag = &data[pos..pos + 4];
        match tag {
            [0, ..] => pos += 1,
            b"HDNS" => break,
            b"TITL" => (header.title, pos) = read_nt_string(data, pos + 4),
            b"COMM" => (header.author, pos) = read_nt_string(data, pos + 4),
            b"YEAR" => (header.year, pos) = read_nt_string(data, pos + 4),
            b"RIPP" => (header.ripper, pos) = read_nt_string(data, pos + 4),
            b"CONV" => (header.converter, pos) = read_nt_string(data, pos + 4),
            b"TIME" => {
                pos += 4;
                for _ in 0..header.subsong_count {
                    let Some(bytes) = data.get(pos..pos + 2) else {
                        break;
                    };
                    header.subsong_seconds.push(u16::from_be_bytes([bytes[0], bytes[1]]));
                    pos += 2;
                }
            }
            b"FRMS" => {
                pos += 4;
                for _ in 0..header.subsong_count {
                    let Some(bytes) = data.get(pos..pos + 4) else {
                        break;
                    };
                    header
                        .subsong_frames
                        .push(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
                    pos += 4;
                }
            }
            b"#!SN" => {
                let base = pos + 4;
                for idx in 0..header.subsong_count {
                    let Some(bytes) = data.get(base + idx * 2..base + idx * 2 + 2) else {
                        break;
                    };
                    let name_at = base + usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
                    header.subsong_names.push(read_nt_string(data, name_at).0);
                }
                pos = base + header.subsong_count * 2;
            }
            [b'#', b'#', ..] => {
                let count = std::str::from_utf8(&tag[2..4])
                    .ok()
                    .and_then(|digits| digits.trim().parse::<usize>().ok())
                    .unwrap_or(1);
                header.subsong_count = count.clamp(1, MAX_SUBSONGS);
                pos += 4;
            }
            [b'!', b'#', ..] => {
                let (value, next) = read_decimal::<usize>(data, pos + 2);
                header.default_subsong = value.unwrap_or(1);
                pos = next;
            }
            [b'T', b'A'..=b'D', ..] | [b'!', b'V', ..] => {
                let (value, next) = read_decimal::<u32>(data, pos + 2);
                if let Some(rate) = value.filter(|&rate| rate > 0) {
                    header.player_rate = rate;
                }
                pos = next;
            }
            _ => pos += 1,
        }
    }

    if header.default_subsong == 0 || header.default_subsong > header.subsong_count {
        header.default_subsong = 1;
    }
    Ok(header)
}

/// SNDH multitrack plugin.
pub struct SndhMultitrack {
    format: BinaryFormat,
    stubs: [BinaryFormat; 1],
}

impl SndhMultitrack {
    /// Compile the signatures.
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            format: BinaryFormat::new(FORMAT)?,
            stubs: [BinaryFormat::new(PRG_STUB)?],
        })
    }
}

impl Recognizer for SndhMultitrack {
    fn description(&self) -> &str {
        "SNDH module"
    }

    fn format(&self) -> &BinaryFormat {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data) && parse_header(data).is_ok()
    }
}

impl MultitrackDecoder for SndhMultitrack {
    fn stubs(&self) -> &[BinaryFormat] {
        &self.stubs
    }

    fn decode(&self, data: &Binary) -> FormatResult<DecodedTracks> {
        let header = parse_header(data)?;

        let mut common = BasicMetadata::new("SNDH");
        common.title = header.title.clone();
        common.author = header.author.clone();
        common.year = header.year.clone();
        common.frame_rate = header.player_rate;
        let properties: Properties = metadata::to_properties(&common);

        let tracks = (0..header.subsong_count)
            .map(|idx| {
                let mut meta = common.clone();
                if let Some(name) = header.subsong_names.get(idx).filter(|n| !n.is_empty()) {
                    meta.title = name.clone();
                }
                meta.frame_count = header.frames(idx);
                TrackModule {
                    properties: metadata::to_properties(&meta),
                    holder: Arc::new(DecodedModule::new(meta, data.clone()).with_track(idx + 1)),
                }
            })
            .collect();

        let mut decoded = DecodedTracks {
            consumed: data.size(),
            fixed: 0..data.size(),
            properties,
            tracks,
        };
        if header.default_subsong > 1 {
            decoded
                .properties
                .set(keys::DEFAULT_TRACK, header.default_subsong);
        }
        if !header.ripper.is_empty() {
            decoded.properties.set(keys::COMMENT, format!("Ripped by {}", header.ripper));
        }
        Ok(decoded)
    }
}

#[cfg(test)]
pub(crate) fn build(title: &str, subsongs: usize) -> Vec<u8> {
    build_with_tags(title, subsongs, b"")
}

#[cfg(test)]
fn build_with_tags(title: &str, subsongs: usize, extra: &[u8]) -> Vec<u8> {
    let mut tags = Vec::new();
    tags.extend_from_slice(b"TITL");
    tags.extend_from_slice(title.as_bytes());
    tags.push(0);
    tags.extend_from_slice(b"COMMJochen Hippel\0");
    tags.extend_from_slice(b"YEAR1989\0");
    tags.extend_from_slice(format!("##{subsongs:02}").as_bytes());
    tags.extend_from_slice(b"TC50\0");
    tags.extend_from_slice(extra);
    tags.extend_from_slice(b"HDNS");
    if tags.len() % 2 != 0 {
        tags.push(0);
    }

    let header_size = 16 + tags.len();
    let mut data = vec![0x60, 0x00];
    data.extend_from_slice(&((header_size - 2) as u16).to_be_bytes());
    // init/exit/play jump stubs
    data.extend_from_slice(&[0x4e, 0x75, 0x00, 0x00, 0x4e, 0x75, 0x00, 0x00]);
    data.extend_from_slice(b"SNDH");
    data.extend_from_slice(&tags);
    data.extend_from_slice(&[0x4e; 8]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::PluginKind;

    #[test]
    fn parses_tags() {
        let data = build("Wings of Death", 3);
        let header = parse_header(&data).unwrap();
        assert_eq!(header.title, "Wings of Death");
        assert_eq!(header.author, "Jochen Hippel");
        assert_eq!(header.year, "1989");
        assert_eq!(header.subsong_count, 3);
        assert_eq!(header.player_rate, 50);
        assert_eq!(header.default_subsong, 1);
    }

    #[test]
    fn decode_per_subsong() {
        let plugin = SndhMultitrack::new().unwrap();
        let data = build("Tune", 2);
        let decoded = plugin.decode(&Binary::new(data.clone())).unwrap();
        assert_eq!(decoded.consumed, data.len());
        assert_eq!(decoded.tracks.len(), 2);
        assert_eq!(decoded.properties.get_str(keys::DATE), Some("1989"));
        assert_eq!(decoded.tracks[1].holder.track(), Some(2));
    }

    #[test]
    fn default_subsong_becomes_property() {
        let plugin = SndhMultitrack::new().unwrap();
        let data = build_with_tags("Tune", 3, b"!#2\0");
        let decoded = plugin.decode(&Binary::new(data)).unwrap();
        assert_eq!(decoded.properties.get_integer(keys::DEFAULT_TRACK), Some(2));

        let data = build_with_tags("Tune", 3, b"!#9\0");
        let decoded = plugin.decode(&Binary::new(data)).unwrap();
        assert!(!decoded.properties.contains(keys::DEFAULT_TRACK));
    }

    #[test]
    fn frames_from_time_tag() {
        let header = SndhHeader {
            subsong_count: 2,
            player_rate: 50,
            subsong_seconds: vec![10, 0],
            subsong_frames: vec![0, 0],
            ..Default::default()
        };
        assert_eq!(header.frames(0), Some(500));
        assert_eq!(header.frames(1), None);
    }

    #[test]
    fn prg_stub_is_skipped() {
        let plugin = SndhMultitrack::new().unwrap();
        let mut data = vec![0x60, 0x1a];
        data.extend_from_slice(&[0u8; 26]);
        data.extend_from_slice(&build("Tune", 1));

        let kind = PluginKind::Multitrack(Box::new(plugin));
        assert!(!kind.check(&data));
        assert_eq!(kind.locate(&data), Some(28));
    }

    #[test]
    fn requires_bra_opcode() {
        let mut data = build("Tune", 1);
        data[0] = 0x4e;
        assert!(matches!(parse_header(&data), Err(FormatError::InvalidSignature)));
    }
}
