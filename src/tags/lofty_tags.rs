//! `TagStore` backed by `lofty`

use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::read_from_path;
use lofty::tag::{Accessor, ItemKey, Tag, TagType};
use tracing::debug;

use super::field::{TagError, TagField, TagStore};

/// Tags of one audio file on disk
pub struct LoftyTags {
    path: PathBuf,
    file: TaggedFile,
    tag_type: TagType,
}

impl LoftyTags {
    /// Reads a file's tags, adding an empty primary tag if it has none
    pub fn open(path: &Path) -> Result<Self, TagError> {
        let mut file = read_from_path(path)?;
        let tag_type = file.primary_tag_type();
        if file.tag(tag_type).is_none() {
            debug!(path = %path.display(), ?tag_type, "Adding empty tag");
            file.insert_tag(Tag::new(tag_type));
        }
        Ok(Self {
            path: path.to_path_buf(),
            file,
            tag_type,
        })
    }

    fn tag(&self) -> Option<&Tag> {
        self.file.tag(self.tag_type)
    }
}

/// Item a field is written to
///
/// Track number and total are absent: ID3v2 and MP4 store them together, so
/// they go through lofty's accessors instead.
fn item_key(field: TagField) -> Option<ItemKey> {
    Some(match field {
        TagField::Album => ItemKey::AlbumTitle,
        TagField::Artist => ItemKey::TrackArtist,
        TagField::Bpm => ItemKey::IntegerBpm,
        TagField::Title => ItemKey::TrackTitle,
        TagField::Year => ItemKey::RecordingDate,
        TagField::Comment => ItemKey::Comment,
        TagField::Genre => ItemKey::Genre,
        TagField::Label => ItemKey::Label,
        TagField::Compilation => ItemKey::FlagCompilation,
        TagField::TrackNumber | TagField::TrackTotal => return None,
    })
}

/// Reads a field from a lofty tag
fn read_field(tag: &Tag, field: TagField) -> Option<String> {
    let value = match field {
        TagField::TrackNumber => return tag.track().map(|n| n.to_string()),
        TagField::TrackTotal => return tag.track_total().map(|n| n.to_string()),
        TagField::Year => tag
            .get_string(ItemKey::RecordingDate)
            .or_else(|| tag.get_string(ItemKey::Year))
            .map(year_of),
        // some taggers only write the decimal form
        TagField::Bpm => tag
            .get_string(ItemKey::IntegerBpm)
            .or_else(|| tag.get_string(ItemKey::Bpm)),
        _ => tag.get_string(item_key(field)?),
    };
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `"1999-03-20"` -> `"1999"`; anything else is kept as is
fn year_of(date: &str) -> &str {
    let date = date.trim();
    match date.get(..4) {
        Some(year) if date.len() > 4 && year.bytes().all(|b| b.is_ascii_digit()) => year,
        _ => date,
    }
}

fn parse_count(field: TagField, value: &str) -> Result<u32, TagError> {
    value
        .split('/')
        .next()
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| TagError::Malformed(format!("invalid {} '{}'", field, value)))
}

/// Writes a field into a lofty tag, failing if the format cannot hold it
fn write_field(tag: &mut Tag, field: TagField, value: &str) -> Result<(), TagError> {
    let value = value.trim();
    match field {
        TagField::TrackNumber if value.is_empty() => tag.remove_track(),
        TagField::TrackNumber => tag.set_track(parse_count(field, value)?),
        TagField::TrackTotal if value.is_empty() => tag.remove_track_total(),
        TagField::TrackTotal => tag.set_track_total(parse_count(field, value)?),
        _ => {
            let Some(key) = item_key(field) else {
                return Ok(());
            };
            tag.remove_key(key);
            if !value.is_empty() && !tag.insert_text(key, value.to_string()) {
                return Err(TagError::Unsupported {
                    field,
                    tag_type: format!("{:?}", tag.tag_type()),
                });
            }
        }
    }
    Ok(())
}

impl TagStore for LoftyTags {
    fn get_field(&self, field: TagField) -> Option<String> {
        read_field(self.tag()?, field)
    }

    fn set_field(&mut self, field: TagField, value: &str) -> Result<(), TagError> {
        let tag = self
            .file
            .tag_mut(self.tag_type)
            .ok_or_else(|| TagError::NoWritableTag(self.path.display().to_string()))?;
        write_field(tag, field, value)
    }

    fn has_artwork(&self) -> bool {
        self.tag().is_some_and(|tag| !tag.pictures().is_empty())
    }

    fn set_artwork(&mut self, data: &[u8]) -> Result<(), TagError> {
        let mut picture = Picture::from_reader(&mut &data[..])?;
        picture.set_pic_type(PictureType::CoverFront);
        let tag = self
            .file
            .tag_mut(self.tag_type)
            .ok_or_else(|| TagError::NoWritableTag(self.path.display().to_string()))?;
        tag.push_picture(picture);
        Ok(())
    }

    fn save(&mut self) -> Result<(), TagError> {
        self.file.save_to_path(&self.path, WriteOptions::default())?;
        debug!(path = %self.path.display(), "Saved tags");
        Ok(())
    }
}
