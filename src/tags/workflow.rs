//! Writing release metadata into tags and reading it back
//!
//! A tagged file remembers its release through the comment field
//! (`"<label> [<catno>] Discogs: <id>"`) and its place on the release through
//! the track number and total. Those three are enough to refresh the tags
//! later without asking the user again.

use std::sync::LazyLock;

use regex::Regex;

use super::field::{TagError, TagField, TagStore};
use crate::discogs::{Release, Track};

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".* Discogs: ([0-9]+)").expect("valid regex"));

static LEGACY_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+) VERIFIED").expect("valid regex"));

/// Where a tagged file sits on its release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagPosition {
    /// Release id from the comment
    pub release_id: u64,
    /// One-based track number
    pub number: usize,
    /// Track total as stored, if any
    pub total: Option<usize>,
}

/// Extracts the release id from a comment written by this tool
///
/// Accepts both `"… Discogs: <id>"` and the older `"<id> VERIFIED"`.
pub fn release_id_from_comment(comment: &str) -> Result<u64, TagError> {
    COMMENT_RE
        .captures(comment)
        .or_else(|| LEGACY_COMMENT_RE.captures(comment))
        .and_then(|caps| caps[1].parse().ok())
        .ok_or_else(|| TagError::Malformed(format!("comment '{}' doesn't specify a release", comment)))
}

/// Parses `"3"` or `"3/12"` into a number and an optional total
fn parse_track(raw: &str) -> Option<(usize, Option<usize>)> {
    let mut parts = raw.splitn(2, '/');
    let number = parts.next()?.trim().parse().ok()?;
    let total = parts.next().and_then(|t| t.trim().parse().ok());
    Some((number, total))
}

/// Reads the release id and track position from a file's tags
pub fn read_position<T: TagStore>(tags: &T) -> Result<TagPosition, TagError> {
    let (Some(comment), Some(track)) = (
        tags.get_field(TagField::Comment),
        tags.get_field(TagField::TrackNumber),
    ) else {
        return Err(TagError::Malformed(
            "file has no comment or track number information".to_string(),
        ));
    };

    let release_id = release_id_from_comment(&comment)?;
    let (number, inline_total) = parse_track(&track)
        .filter(|(n, _)| *n > 0)
        .ok_or_else(|| TagError::Malformed(format!("invalid track number '{}'", track)))?;
    let total = tags
        .get_field(TagField::TrackTotal)
        .and_then(|t| t.trim().parse().ok())
        .or(inline_total);

    Ok(TagPosition {
        release_id,
        number,
        total,
    })
}

/// Fails unless the stored track total matches the release
pub fn check_total_tracks(position: &TagPosition, release: &Release) -> Result<(), TagError> {
    let stored = position.total.unwrap_or(0);
    if stored != release.total_tracks() {
        return Err(TagError::Malformed(format!(
            "total tracks mismatch: tags say {}, release {} has {}",
            stored,
            release.id(),
            release.total_tracks()
        )));
    }
    Ok(())
}

/// Writes a track's metadata into `tags`
///
/// `artwork` is embedded only when the file has none yet. The compilation
/// flag is set for multi-artist releases and left alone otherwise.
pub fn apply_track<T: TagStore>(tags: &mut T, track: &Track<'_>, artwork: Option<&[u8]>) -> Result<(), TagError> {
    let release = track.release();

    tags.set_field(TagField::Artist, &track.artist())?;
    tags.set_field(TagField::Album, &release.title())?;
    tags.set_field(TagField::Title, &track.title())?;
    tags.set_field(TagField::Year, &release.year())?;
    tags.set_field(
        TagField::Comment,
        &format!("{} [{}] Discogs: {}", release.label(), release.catno(), release.id()),
    )?;
    tags.set_field(TagField::Label, &release.label())?;
    tags.set_field(TagField::TrackNumber, &track.number().to_string())?;
    tags.set_field(TagField::TrackTotal, &release.total_tracks().to_string())?;

    if let Some(data) = artwork {
        if !tags.has_artwork() {
            tags.set_artwork(data)?;
        }
    }
    if release.is_compilation() {
        tags.set_field(TagField::Compilation, "1")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::MemoryTags;
    use serde_json::json;

    fn release() -> Release {
        Release::from_payload(
            42,
            json!({
                "title": "Geogaddi",
                "year": 2002,
                "artists": [{"name": "Boards of Canada"}],
                "labels": [{"name": "Warp", "catno": "WARP101"}],
                "tracklist": [
                    {"position": "A1", "title": "Ready Lets Go", "type_": "track"},
                    {"position": "A2", "title": "Music Is Math", "type_": "track"}
                ]
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_comment_parsing() {
        assert_eq!(release_id_from_comment("Warp [WARP101] Discogs: 42").unwrap(), 42);
        assert_eq!(release_id_from_comment("1234 VERIFIED").unwrap(), 1234);
        assert!(release_id_from_comment("ripped by me").is_err());
        assert!(release_id_from_comment("Discogs: 42").is_err());
    }

    #[test]
    fn test_apply_track_writes_fields() {
        let release = release();
        let track = release.track(1).unwrap();
        let mut tags = MemoryTags::new();

        apply_track(&mut tags, &track, Some(&[1, 2, 3])).unwrap();

        assert_eq!(tags.get_field(TagField::Artist).as_deref(), Some("Boards of Canada"));
        assert_eq!(tags.get_field(TagField::Album).as_deref(), Some("Geogaddi"));
        assert_eq!(tags.get_field(TagField::Title).as_deref(), Some("Music Is Math"));
        assert_eq!(tags.get_field(TagField::Year).as_deref(), Some("2002"));
        assert_eq!(
            tags.get_field(TagField::Comment).as_deref(),
            Some("Warp [WARP101] Discogs: 42")
        );
        assert_eq!(tags.get_field(TagField::Label).as_deref(), Some("Warp"));
        assert_eq!(tags.get_field(TagField::TrackNumber).as_deref(), Some("2"));
        assert_eq!(tags.get_field(TagField::TrackTotal).as_deref(), Some("2"));
        assert_eq!(tags.artwork(), Some(&[1u8, 2, 3][..]));
        assert!(tags.get_field(TagField::Compilation).is_none());
    }

    #[test]
    fn test_existing_artwork_is_kept() {
        let release = release();
        let mut tags = MemoryTags::new();
        tags.set_artwork(&[9]).unwrap();

        apply_track(&mut tags, &release.track(0).unwrap(), Some(&[1, 2, 3])).unwrap();

        assert_eq!(tags.artwork(), Some(&[9u8][..]));
    }

    #[test]
    fn test_written_tags_read_back_as_position() {
        let release = release();
        let mut tags = MemoryTags::new();
        apply_track(&mut tags, &release.track(1).unwrap(), None).unwrap();

        let position = read_position(&tags).unwrap();

        assert_eq!(
            position,
            TagPosition {
                release_id: 42,
                number: 2,
                total: Some(2)
            }
        );
        assert!(check_total_tracks(&position, &release).is_ok());
    }

    #[test]
    fn test_missing_comment_or_track_is_malformed() {
        let only_comment = MemoryTags::new().with(TagField::Comment, "Warp [X] Discogs: 42");
        assert!(matches!(read_position(&only_comment), Err(TagError::Malformed(_))));

        let only_track = MemoryTags::new().with(TagField::TrackNumber, "1");
        assert!(matches!(read_position(&only_track), Err(TagError::Malformed(_))));
    }

    #[test]
    fn test_inline_total_is_used() {
        let tags = MemoryTags::new()
            .with(TagField::Comment, "12 VERIFIED")
            .with(TagField::TrackNumber, "3/9");
        let position = read_position(&tags).unwrap();
        assert_eq!(position.number, 3);
        assert_eq!(position.total, Some(9));
    }

    #[test]
    fn test_zero_track_number_is_malformed() {
        let tags = MemoryTags::new()
            .with(TagField::Comment, "12 VERIFIED")
            .with(TagField::TrackNumber, "0");
        assert!(read_position(&tags).is_err());
    }

    #[test]
    fn test_total_mismatch_is_malformed() {
        let position = TagPosition {
            release_id: 42,
            number: 1,
            total: Some(10),
        };
        let err = check_total_tracks(&position, &release()).unwrap_err();
        assert!(err.to_string().contains("total tracks mismatch"));

        let missing = TagPosition { total: None, ..position };
        assert!(check_total_tracks(&missing, &release()).is_err());
    }
}
