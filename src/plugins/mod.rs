//! Format recognizers.
//!
//! A plugin is one of three kinds:
//!
//! - [`ArchiveDecoder`]: unpacks or lists a container; its entries are scanned again.
//! - [`PlayerDecoder`]: recognizes a single playable module.
//! - [`MultitrackDecoder`]: recognizes a module holding several tunes.
//!
//! Plugins are described by a [`PluginDescriptor`] and collected, in priority order, in
//! a [`PluginCatalog`].

pub mod archives;
mod catalog;
pub mod players;

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use bitflags::bitflags;

use crate::binary::Binary;
use crate::config::DetectConfig;
use crate::error::FormatResult;
use crate::format::BinaryFormat;
use crate::metadata::{BasicMetadata, MetadataFields};
use crate::properties::Properties;

pub use catalog::PluginCatalog;

bitflags! {
    /// What a plugin handles
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        /// Holds other files
        const CONTAINER = 0x0001;
        /// Single packed payload
        const PACKED = 0x0002;
        /// Several tunes in one module
        const MULTITRACK = 0x0004;
        /// Playable module
        const MODULE = 0x0008;
        /// Targets the AY-3-8910 / YM2149 family
        const DEVICE_AY = 0x0100;
        /// Needs a Z80 to play
        const CPU_Z80 = 0x1000;
        /// Needs a 68000 to play
        const CPU_M68K = 0x2000;
    }
}

/// Shared part of every plugin strategy.
pub trait Recognizer: Send + Sync {
    /// Human readable format name.
    fn description(&self) -> &str;

    /// Signature used for quick rejection and lookahead.
    fn format(&self) -> &BinaryFormat;

    /// Full structural check of the start of `data`.
    fn check(&self, data: &[u8]) -> bool {
        self.format().matches(data)
    }
}

/// One file produced by an archive.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Entry name; `None` for packed data, which keeps the container's path.
    pub name: Option<String>,
    /// `(offset, size)` of the entry's bytes inside the archive, when stored verbatim.
    pub origin: Option<(usize, usize)>,
    /// Entry contents.
    pub data: Binary,
}

/// Result of opening an archive.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// Entries in archive order.
    pub entries: Vec<ArchiveEntry>,
    /// Bytes of the input that belong to the archive.
    pub consumed: usize,
    /// Properties passed down to everything found inside.
    pub properties: Properties,
}

/// Container or packer.
pub trait ArchiveDecoder: Recognizer {
    /// Open the archive at the start of `data`.
    fn extract(&self, config: &DetectConfig, data: &Binary) -> FormatResult<Extracted>;
}

/// A module found by a player plugin.
#[derive(Debug, Clone)]
pub struct CreatedModule {
    /// Handle to the module.
    pub holder: Arc<dyn ModuleHolder>,
    /// Bytes of the input that belong to the module.
    pub consumed: usize,
    /// Part of the module that identifies the tune itself, relative to its start.
    pub fixed: Range<usize>,
    /// Format specific properties.
    pub properties: Properties,
}

/// Single-tune module format.
pub trait PlayerDecoder: Recognizer {
    /// Player code that may precede the module.
    fn stubs(&self) -> &[BinaryFormat] {
        &[]
    }

    /// Build the module at the start of `data`.
    fn create(&self, data: &Binary) -> FormatResult<CreatedModule>;
}

/// One tune of a multitrack module.
#[derive(Debug, Clone)]
pub struct TrackModule {
    /// Handle to the tune.
    pub holder: Arc<dyn ModuleHolder>,
    /// Track specific properties, layered over the module's.
    pub properties: Properties,
}

/// Tunes found by a multitrack plugin.
#[derive(Debug, Clone)]
pub struct DecodedTracks {
    /// Bytes of the input that belong to the module.
    pub consumed: usize,
    /// Part of the module that identifies the music, relative to its start.
    pub fixed: Range<usize>,
    /// Properties shared by every track.
    pub properties: Properties,
    /// At least one track.
    pub tracks: Vec<TrackModule>,
}

/// Module format carrying several tunes.
pub trait MultitrackDecoder: Recognizer {
    /// Player code that may precede the module.
    fn stubs(&self) -> &[BinaryFormat] {
        &[]
    }

    /// Split the module at the start of `data` into tracks.
    fn decode(&self, data: &Binary) -> FormatResult<DecodedTracks>;
}

/// Strategy of a plugin.
pub enum PluginKind {
    /// Container or packer.
    Archive(Box<dyn ArchiveDecoder>),
    /// Single module.
    Player(Box<dyn PlayerDecoder>),
    /// Several modules.
    Multitrack(Box<dyn MultitrackDecoder>),
}

impl PluginKind {
    /// Human readable format name.
    pub fn description(&self) -> &str {
        match self {
            PluginKind::Archive(decoder) => decoder.description(),
            PluginKind::Player(decoder) => decoder.description(),
            PluginKind::Multitrack(decoder) => decoder.description(),
        }
    }

    /// Main signature.
    pub fn format(&self) -> &BinaryFormat {
        match self {
            PluginKind::Archive(decoder) => decoder.format(),
            PluginKind::Player(decoder) => decoder.format(),
            PluginKind::Multitrack(decoder) => decoder.format(),
        }
    }

    /// Stub signatures; archives have none.
    pub fn stubs(&self) -> &[BinaryFormat] {
        match self {
            PluginKind::Archive(_) => &[],
            PluginKind::Player(decoder) => decoder.stubs(),
            PluginKind::Multitrack(decoder) => decoder.stubs(),
        }
    }

    /// Full structural check of the start of `data`.
    pub fn check(&self, data: &[u8]) -> bool {
        match self {
            PluginKind::Archive(decoder) => decoder.check(data),
            PluginKind::Player(decoder) => decoder.check(data),
            PluginKind::Multitrack(decoder) => decoder.check(data),
        }
    }

    /// Where the data handled by this plugin starts: `0` for a direct match, the stub
    /// length when the data follows a known player stub.
    pub fn locate(&self, data: &[u8]) -> Option<usize> {
        if self.check(data) {
            return Some(0);
        }
        self.stubs().iter().find_map(|stub| {
            let skip = stub.pattern().min_length();
            (stub.matches(data) && skip < data.len() && self.check(&data[skip..])).then_some(skip)
        })
    }

    /// Smallest offset after 0 where this plugin could match.
    pub fn lookahead(&self, data: &[u8]) -> usize {
        self.stubs()
            .iter()
            .map(|stub| stub.next_match_offset(data))
            .fold(self.format().next_match_offset(data), usize::min)
    }
}

impl fmt::Debug for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            PluginKind::Archive(_) => "Archive",
            PluginKind::Player(_) => "Player",
            PluginKind::Multitrack(_) => "Multitrack",
        };
        write!(f, "{kind}({})", self.description())
    }
}

/// Registered plugin.
#[derive(Debug)]
pub struct PluginDescriptor {
    /// Unique id, also used in `Type` and `Container` properties.
    pub id: &'static str,
    /// Capability flags.
    pub capabilities: Capabilities,
    /// Strategy.
    pub kind: PluginKind,
}

impl PluginDescriptor {
    /// Archive plugin.
    pub fn archive(
        id: &'static str,
        capabilities: Capabilities,
        decoder: impl ArchiveDecoder + 'static,
    ) -> Self {
        Self {
            id,
            capabilities: capabilities | Capabilities::CONTAINER,
            kind: PluginKind::Archive(Box::new(decoder)),
        }
    }

    /// Player plugin.
    pub fn player(
        id: &'static str,
        capabilities: Capabilities,
        decoder: impl PlayerDecoder + 'static,
    ) -> Self {
        Self {
            id,
            capabilities: capabilities | Capabilities::MODULE,
            kind: PluginKind::Player(Box::new(decoder)),
        }
    }

    /// Multitrack plugin.
    pub fn multitrack(
        id: &'static str,
        capabilities: Capabilities,
        decoder: impl MultitrackDecoder + 'static,
    ) -> Self {
        Self {
            id,
            capabilities: capabilities | Capabilities::MODULE | Capabilities::MULTITRACK,
            kind: PluginKind::Multitrack(Box::new(decoder)),
        }
    }
}

/// Access to a detected module.
pub trait ModuleHolder: Send + Sync + fmt::Debug {
    /// Song metadata.
    fn metadata(&self) -> &dyn MetadataFields;

    /// Module bytes, starting at the module's first byte.
    fn data(&self) -> &Binary;

    /// 1-based track index inside a multitrack module.
    fn track(&self) -> Option<usize> {
        None
    }
}

/// [`ModuleHolder`] used by the built-in plugins.
#[derive(Debug, Clone)]
pub struct DecodedModule {
    metadata: BasicMetadata,
    data: Binary,
    track: Option<usize>,
}

impl DecodedModule {
    /// Module spanning `data`.
    pub fn new(metadata: BasicMetadata, data: Binary) -> Self {
        Self {
            metadata,
            data,
            track: None,
        }
    }

    /// Mark as track `track` (1-based) of a multitrack module.
    pub fn with_track(mut self, track: usize) -> Self {
        self.track = Some(track);
        self
    }
}

impl ModuleHolder for DecodedModule {
    fn metadata(&self) -> &dyn MetadataFields {
        &self.metadata
    }

    fn data(&self) -> &Binary {
        &self.data
    }

    fn track(&self) -> Option<usize> {
        self.track
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FormatError;

    struct Tagged {
        format: BinaryFormat,
        stubs: Vec<BinaryFormat>,
    }

    impl Recognizer for Tagged {
        fn description(&self) -> &str {
            "tagged"
        }

        fn format(&self) -> &BinaryFormat {
            &self.format
        }
    }

    impl PlayerDecoder for Tagged {
        fn stubs(&self) -> &[BinaryFormat] {
            &self.stubs
        }

        fn create(&self, _data: &Binary) -> FormatResult<CreatedModule> {
            Err(FormatError::InvalidSignature)
        }
    }

    fn tagged_kind() -> PluginKind {
        PluginKind::Player(Box::new(Tagged {
            format: BinaryFormat::new("'T'U'N'E").unwrap(),
            stubs: vec![BinaryFormat::new("c3 ? ?").unwrap()],
        }))
    }

    #[test]
    fn locate_direct_and_after_stub() {
        let kind = tagged_kind();
        assert_eq!(kind.locate(b"TUNE.."), Some(0));
        assert_eq!(kind.locate(b"\xc3\x10\x80TUNE"), Some(3));
        assert_eq!(kind.locate(b"\xc3\x10\x80JUNK"), None);
        assert_eq!(kind.locate(b"\xc3\x10\x80"), None);
    }

    #[test]
    fn lookahead_considers_stubs() {
        let kind = tagged_kind();
        assert_eq!(kind.lookahead(b"....TUNE"), 4);
        assert_eq!(kind.lookahead(b"..\xc3..TUNE"), 2);
        assert_eq!(kind.lookahead(b"........"), 8);
    }

    #[test]
    fn descriptor_adds_kind_capabilities() {
        let plugin = PluginDescriptor::player("TAG", Capabilities::DEVICE_AY, Tagged {
            format: BinaryFormat::new("'T").unwrap(),
            stubs: Vec::new(),
        });
        assert!(plugin.capabilities.contains(Capabilities::MODULE | Capabilities::DEVICE_AY));
        assert!(!plugin.capabilities.contains(Capabilities::CONTAINER));
        assert_eq!(format!("{:?}", plugin.kind), "Player(tagged)");
    }
}
