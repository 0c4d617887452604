//! Logical tag fields and the tag storage capability

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::discogs::ClientError;

/// Errors raised while reading, checking or writing tags
#[derive(Debug, Error)]
pub enum TagError {
    /// The tag set is missing required fields or contradicts the release
    #[error("Malformed tags: {0}")]
    Malformed(String),

    /// The file could not be read or written
    #[error("Tag I/O failed: {0}")]
    Lofty(#[from] lofty::error::LoftyError),

    /// The file's tag format cannot hold a field
    #[error("{tag_type} tags cannot hold '{field}'")]
    Unsupported {
        /// Field that was rejected
        field: TagField,
        /// Tag format of the file
        tag_type: String,
    },

    /// The file has no tag that can be written
    #[error("No writable tag in {0}")]
    NoWritableTag(String),

    /// Looking up the release failed
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Tag fields this tool reads or writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagField {
    Album,
    Artist,
    Bpm,
    Title,
    Year,
    Comment,
    Genre,
    TrackNumber,
    TrackTotal,
    Label,
    Compilation,
}

impl TagField {
    /// Every field, in display order
    pub const ALL: [TagField; 11] = [
        TagField::Artist,
        TagField::Title,
        TagField::Album,
        TagField::Year,
        TagField::Label,
        TagField::Comment,
        TagField::TrackNumber,
        TagField::TrackTotal,
        TagField::Genre,
        TagField::Bpm,
        TagField::Compilation,
    ];

    /// Short lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            TagField::Album => "album",
            TagField::Artist => "artist",
            TagField::Bpm => "bpm",
            TagField::Title => "title",
            TagField::Year => "year",
            TagField::Comment => "comment",
            TagField::Genre => "genre",
            TagField::TrackNumber => "track",
            TagField::TrackTotal => "totaltracks",
            TagField::Label => "label",
            TagField::Compilation => "compilation",
        }
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read/write access to one file's tags
pub trait TagStore {
    /// Current value of a field, if set and non-empty
    fn get_field(&self, field: TagField) -> Option<String>;

    /// Replaces a field's value; an empty value clears it
    fn set_field(&mut self, field: TagField, value: &str) -> Result<(), TagError>;

    /// Whether the file already carries embedded artwork
    fn has_artwork(&self) -> bool;

    /// Embeds front cover artwork
    fn set_artwork(&mut self, data: &[u8]) -> Result<(), TagError>;

    /// Writes pending changes
    fn save(&mut self) -> Result<(), TagError>;
}

/// Tags held in memory, for previews and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryTags {
    fields: HashMap<TagField, String>,
    artwork: Option<Vec<u8>>,
    saves: u32,
}

impl MemoryTags {
    /// Creates an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with(mut self, field: TagField, value: &str) -> Self {
        self.fields.insert(field, value.trim().to_string());
        self
    }

    /// Embedded artwork, if any
    pub fn artwork(&self) -> Option<&[u8]> {
        self.artwork.as_deref()
    }

    /// How many times [`TagStore::save`] was called
    pub fn saves(&self) -> u32 {
        self.saves
    }
}

impl TagStore for MemoryTags {
    fn get_field(&self, field: TagField) -> Option<String> {
        self.fields.get(&field).filter(|v| !v.is_empty()).cloned()
    }

    fn set_field(&mut self, field: TagField, value: &str) -> Result<(), TagError> {
        self.fields.insert(field, value.trim().to_string());
        Ok(())
    }

    fn has_artwork(&self) -> bool {
        self.artwork.is_some()
    }

    fn set_artwork(&mut self, data: &[u8]) -> Result<(), TagError> {
        self.artwork = Some(data.to_vec());
        Ok(())
    }

    fn save(&mut self) -> Result<(), TagError> {
        self.saves += 1;
        Ok(())
    }
}
