//! Unified module metadata.
//!
//! Every recognizer describes the tune it found through [`MetadataFields`], whatever
//! the underlying format (YM, AY, SNDH).

use crate::properties::{keys, Properties};

/// Common read-only view of song metadata.
pub trait MetadataFields {
    /// Get the song title.
    fn title(&self) -> &str;

    /// Get the author/composer name.
    fn author(&self) -> &str;

    /// Get additional comments or description.
    ///
    /// Returns an empty string if no comments are available.
    fn comments(&self) -> &str {
        ""
    }

    /// Release year or date, empty if unknown.
    fn year(&self) -> &str {
        ""
    }

    /// Get the file format identifier.
    ///
    /// Examples: "YM6", "AY", "SNDH"
    fn format(&self) -> &str;

    /// Get the total frame count, if known.
    fn frame_count(&self) -> Option<usize> {
        None
    }

    /// Get the playback frame rate in Hz.
    fn frame_rate(&self) -> u32 {
        50
    }

    /// Get the song duration in seconds, if known.
    fn duration_seconds(&self) -> Option<f32> {
        self.frame_count()
            .map(|fc| fc as f32 / self.frame_rate() as f32)
    }
}

/// Owned metadata, filled in by the built-in plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasicMetadata {
    /// Song title.
    pub title: String,
    /// Author/composer name.
    pub author: String,
    /// Additional comments.
    pub comments: String,
    /// Release year.
    pub year: String,
    /// Format identifier (e.g., "YM6", "AY").
    pub format: String,
    /// Total frame count.
    pub frame_count: Option<usize>,
    /// Playback frame rate in Hz.
    pub frame_rate: u32,
}

impl MetadataFields for BasicMetadata {
    fn title(&self) -> &str {
        &self.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn comments(&self) -> &str {
        &self.comments
    }

    fn year(&self) -> &str {
        &self.year
    }

    fn format(&self) -> &str {
        &self.format
    }

    fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }
}

impl BasicMetadata {
    /// Empty metadata for `format` at 50 Hz.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            frame_rate: 50,
            ..Default::default()
        }
    }
}

/// Properties describing `metadata`; empty fields are left out.
pub fn to_properties(metadata: &dyn MetadataFields) -> Properties {
    let mut props = Properties::new();
    props.set_non_empty(keys::TITLE, metadata.title().trim());
    props.set_non_empty(keys::AUTHOR, metadata.author().trim());
    props.set_non_empty(keys::COMMENT, metadata.comments().trim());
    props.set_non_empty(keys::DATE, metadata.year().trim());
    props.set_non_empty(keys::PROGRAM, metadata.format());
    if let Some(frames) = metadata.frame_count() {
        props.set(keys::FRAMES, frames);
    }
    props
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_from_frames() {
        let mut meta = BasicMetadata::new("YM6");
        meta.frame_count = Some(100);
        assert_eq!(meta.duration_seconds(), Some(2.0));
    }

    #[test]
    fn properties_skip_empty_fields() {
        let mut meta = BasicMetadata::new("AY");
        meta.title = " Tune ".to_string();
        let props = to_properties(&meta);
        assert_eq!(props.get_str(keys::TITLE), Some("Tune"));
        assert_eq!(props.get_str(keys::PROGRAM), Some("AY"));
        assert!(!props.contains(keys::AUTHOR));
        assert!(!props.contains(keys::FRAMES));
    }
}
