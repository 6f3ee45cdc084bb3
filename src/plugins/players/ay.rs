//! ZXAYEMUL modules (ZX Spectrum / Amstrad CPC).
//!
//! The file is a tree of big-endian structures linked by 16-bit pointers relative to
//! the pointer field itself. Each song becomes a track. The module ends at the
//! furthest byte any structure references.

use std::cell::Cell;
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

const FORMAT: &str = "'Z'X'A'Y'E'M'U'L";
const HEADER_SIZE: usize = 20;
const SONG_DATA_SIZE: usize = 14;

/// One song of an AY file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AySong {
    /// Song name, empty if the file has none.
    pub name: String,
    /// Length in 50Hz frames, `0` if unknown.
    pub length_frames: u16,
    /// Fade-out length in 50Hz frames.
    pub fade_frames: u16,
}

/// Parsed AY file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AyModule {
    /// Author field.
    pub author: String,
    /// Miscellaneous text, usually the game or demo name.
    pub misc: String,
    /// Songs in file order.
    pub songs: Vec<AySong>,
    /// 0-based index of the default song.
    pub first_song: usize,
    /// Bytes from the start of the file up to the last referenced byte.
    pub extent: usize,
}

/// Parse a `ZXAYEMUL` file from raw bytes.
pub fn parse(data: &[u8]) -> FormatResult<AyModule> {
    AyParser {
        data,
        extent: Cell::new(0),
    }
    .parse()
}

struct AyParser<'a> {
    data: &'a [u8],
    extent: Cell<usize>,
}

impl AyParser<'_> {
    fn parse(&self) -> FormatResult<AyModule> {
        self.ensure_range(0, HEADER_SIZE)?;
        if &self.data[0..8] != b"ZXAYEMUL" {
            return Err(FormatError::InvalidSignature);
        }

        let author = self.read_string_pointer(12)?;
        let misc = self.read_string_pointer(14)?;
        let song_count = usize::from(self.read_u8(16)?) + 1;
        let first_song = usize::from(self.read_u8(17)?);
        if first_song >= song_count {
            return Err(format!(
                "first song index {} outside available {} songs",
                first_song + 1,
                song_count
            )
            .into());
        }

        let songs_ptr = self.read_required_pointer(18)?;
        let songs = (0..song_count)
            .map(|idx| self.parse_song(songs_ptr + idx * 4))
            .collect::<FormatResult<Vec<_>>>()?;

        Ok(AyModule {
            author,
            misc,
            songs,
            first_song,
            extent: self.extent.get(),
        })
    }

    fn parse_song(&self, entry: usize) -> FormatResult<AySong> {
        self.ensure_range(entry, 4)?;
        let name = self.read_string_pointer(entry)?;
        let data = self.read_required_pointer(entry + 2)?;

        self.ensure_range(data, SONG_DATA_SIZE)?;
        let length_frames = self.read_u16(data + 4)?;
        let fade_frames = self.read_u16(data + 6)?;
        if let Some(points) = self.read_pointer(data + 10)? {
            self.ensure_range(points, 6)?;
        }
        if let Some(blocks) = self.read_pointer(data + 12)? {
            self.parse_blocks(blocks)?;
        }

        Ok(AySong {
            name,
            length_frames,
            fade_frames,
        })
    }

    fn parse_blocks(&self, mut offset: usize) -> FormatResult<()> {
        loop {
            let address = self.read_u16(offset)?;
            if address == 0 {
                return Ok(());
            }
            self.ensure_range(offset, 6)?;
            let length = usize::from(self.read_u16(offset + 2)?);
            // blocks never wrap past the end of Z80 memory
            let length = length.min(0x10000 - usize::from(address));
            let start = self
                .read_pointer(offset + 4)?
                .ok_or(FormatError::PointerOutOfRange { offset: offset + 4 })?;
            let available = (self.data.len() - start).min(length);
            self.touch(start + available);
            offset += 6;
        }
    }

    fn read_string_pointer(&self, offset: usize) -> FormatResult<String> {
        match self.read_pointer(offset)? {
            Some(start) => self.read_nt_string(start),
            None => Ok(String::new()),
        }
    }

    fn read_required_pointer(&self, offset: usize) -> FormatResult<usize> {
        self.read_pointer(offset)?
            .ok_or(FormatError::PointerOutOfRange { offset })
    }

    /// Resolve the relative pointer stored at `origin`; zero means "absent".
    fn read_pointer(&self, origin: usize) -> FormatResult<Option<usize>> {
        let rel = self.read_i16(origin)?;
        if rel == 0 {
            return Ok(None);
        }
        let target = origin as isize + rel as isize;
        if target < 0 || target >= self.data.len() as isize {
            return Err(FormatError::PointerOutOfRange { offset: origin });
        }
        Ok(Some(target as usize))
    }

    fn read_nt_string(&self, start: usize) -> FormatResult<String> {
        let tail = &self.data[start..];
        let len = memchr::memchr(0, tail).ok_or(FormatError::UnterminatedString { start })?;
        self.touch(start + len + 1);
        Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
    }

    fn read_u8(&self, offset: usize) -> FormatResult<u8> {
        self.ensure_range(offset, 1)?;
        Ok(self.data[offset])
    }

    fn read_u16(&self, offset: usize) -> FormatResult<u16> {
        self.ensure_range(offset, 2)?;
        Ok(u16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    fn read_i16(&self, offset: usize) -> FormatResult<i16> {
        self.ensure_range(offset, 2)?;
        Ok(i16::from_be_bytes([self.data[offset], self.data[offset + 1]]))
    }

    fn ensure_range(&self, offset: usize, size: usize) -> FormatResult<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.data.len() => {
                self.touch(end);
                Ok(())
            }
            _ => Err(FormatError::UnexpectedEof),
        }
    }

    fn touch(&self, end: usize) {
        if end > self.extent.get() {
            self.extent.set(end);
        }
    }
}

/// AY multitrack plugin.
pub struct AyMultitrack {
    format: BinaryFormat,
}

impl AyMultitrack {
    /// Compile the signature.
    pub fn new() -> Result<Self, PatternSyntaxError> {
        Ok(Self {
            format: BinaryFormat::with_min_size(FORMAT, HEADER_SIZE)?,
        })
    }
}

impl Recognizer for AyMultitrack {
    fn description(&self) -> &str {
        "ZXAYEMUL module"
    }

    fn format(&self) -> &BinaryFormat {
        &self.format
    }

    fn check(&self, data: &[u8]) -> bool {
        self.format.matches(data) && parse(data).is_ok()
    }
}

impl MultitrackDecoder for AyMultitrack {
    fn decode(&self, data: &Binary) -> FormatResult<DecodedTracks> {
        let module = parse(data)?;
        let content = data
            .sub_container(0, module.extent)
            .ok_or(FormatError::UnexpectedEof)?;

        let mut properties = Properties::new();
        properties.set_non_empty(keys::AUTHOR, module.author.trim());
        properties.set_non_empty(keys::COMMENT, module.misc.trim());
        properties.set(keys::PROGRAM, "AY");

        let tracks = module
            .songs
            .iter()
            .enumerate()
            .map(|(idx, song)| {
                let mut meta = BasicMetadata::new("AY");
                meta.title = song.name.clone();
                meta.author = module.author.clone();
                meta.comments = module.misc.clone();
                meta.frame_count = (song.length_frames > 0).then_some(usize::from(song.length_frames));
                TrackModule {
                    properties: metadata::to_properties(&meta),
                    holder: Arc::new(DecodedModule::new(meta, content.clone()).with_track(idx + 1)),
                }
            })
            .collect();

        Ok(DecodedTracks {
            consumed: module.extent,
            fixed: 0..module.extent,
            properties,
            tracks,
        })
    }
}

/// Minimal AY file with one code block per song; layout mirrors real rips.
#[cfg(test)]
pub(crate) fn build(author: &str, songs: &[&str]) -> Vec<u8> {
    fn put_ptr(data: &mut [u8], at: usize, target: usize) {
        let rel = (target as isize - at as isize) as i16;
        data[at..at + 2].copy_from_slice(&rel.to_be_bytes());
    }

    let count = songs.len();
    let structs = HEADER_SIZE;
    let song_data = structs + 4 * count;
    let points = song_data + SONG_DATA_SIZE * count;
    let blocks = points + 6 * count;
    let payload = blocks + 8 * count;
    let strings = payload + 4;

    let mut data = vec![0u8; strings];
    data[..8].copy_from_slice(b"ZXAYEMUL");
    data[8..10].copy_from_slice(&3u16.to_be_bytes());
    data[10] = 3;
    data[16] = (count - 1) as u8;
    put_ptr(&mut data, 18, structs);
    data[payload..payload + 4].copy_from_slice(&[0xF3, 0x18, 0xFE, 0xC9]);

    let mut text = Vec::new();
    let mut string_at = |data: &mut Vec<u8>, at: usize, value: &str| {
        let target = strings + text.len();
        text.extend_from_slice(value.as_bytes());
        text.push(0);
        put_ptr(data, at, target);
    };
    string_at(&mut data, 12, author);
    string_at(&mut data, 14, "Test rip");

    for (idx, name) in songs.iter().enumerate() {
        let entry = structs + idx * 4;
        let song = song_data + idx * SONG_DATA_SIZE;
        let point = points + idx * 6;
        let block = blocks + idx * 8;
        string_at(&mut data, entry, name);
        put_ptr(&mut data, entry + 2, song);
        data[song..song + 4].copy_from_slice(&[0, 1, 2, 3]);
        data[song + 4..song + 6].copy_from_slice(&(3000u16 + idx as u16).to_be_bytes());
        put_ptr(&mut data, song + 10, point);
        put_ptr(&mut data, song + 12, block);
        data[point + 2..point + 4].copy_from_slice(&0x8000u16.to_be_bytes());
        data[point + 4..point + 6].copy_from_slice(&0x8003u16.to_be_bytes());
        data[block..block + 2].copy_from_slice(&0x8000u16.to_be_bytes());
        data[block + 2..block + 4].copy_from_slice(&4u16.to_be_bytes());
        put_ptr(&mut data, block + 4, payload);
    }
    data.extend_from_slice(&text);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_songs_and_extent() {
        let mut data = build("Tim Follin", &["Intro", "Ingame"]);
        let size = data.len();
        data.extend_from_slice(&[0xAA; 32]);

        let module = parse(&data).unwrap();
        assert_eq!(module.author, "Tim Follin");
        assert_eq!(module.misc, "Test rip");
        assert_eq!(module.songs.len(), 2);
        assert_eq!(module.songs[1].name, "Ingame");
        assert_eq!(module.songs[1].length_frames, 3001);
        assert_eq!(module.extent, size);
    }

    #[test]
    fn decode_yields_one_track_per_song() {
        let plugin = AyMultitrack::new().unwrap();
        let data = build("Author", &["One", "Two", "Three"]);
        assert!(plugin.check(&data));

        let decoded = plugin.decode(&Binary::new(data.clone())).unwrap();
        assert_eq!(decoded.consumed, data.len());
        assert_eq!(decoded.tracks.len(), 3);
        assert_eq!(decoded.properties.get_str(keys::AUTHOR), Some("Author"));
        assert_eq!(decoded.tracks[2].properties.get_str(keys::TITLE), Some("Three"));
        assert_eq!(decoded.tracks[2].holder.track(), Some(3));
    }

    #[test]
    fn pointer_outside_file_is_rejected() {
        let mut data = build("Author", &["One"]);
        data[18..20].copy_from_slice(&0x7000i16.to_be_bytes());
        assert!(matches!(
            parse(&data),
            Err(FormatError::PointerOutOfRange { offset: 18 })
        ));
    }

    #[test]
    fn first_song_must_exist() {
        let mut data = build("Author", &["One", "Two"]);
        data[17] = 2;
        assert!(parse(&data).is_err());
    }
}
