//! Release and track views over a cached Discogs payload

use std::fmt;

use serde_json::Value;

use super::error::ClientError;

/// Separator used when joining artist or label lists
const LIST_SEPARATOR: &str = " / ";

/// A release with its playable tracks
#[derive(Debug, Clone)]
pub struct Release {
    id: u64,
    data: Value,
    tracks: Vec<Value>,
}

/// One playable track of a release
#[derive(Debug, Clone, Copy)]
pub struct Track<'a> {
    release: &'a Release,
    index: usize,
    data: &'a Value,
}

fn str_field<'v>(value: &'v Value, key: &str) -> &'v str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

impl Release {
    /// Builds a release from a payload
    ///
    /// Headings and index entries in the track list are dropped, so track
    /// numbers count only real tracks.
    pub fn from_payload(id: u64, data: Value) -> Result<Self, ClientError> {
        let tracklist = data
            .get("tracklist")
            .and_then(Value::as_array)
            .ok_or(ClientError::MissingField("tracklist"))?;

        let tracks = tracklist
            .iter()
            .filter(|item| {
                item.get("type_")
                    .and_then(Value::as_str)
                    .map_or(true, |kind| kind == "track")
            })
            .cloned()
            .collect();

        Ok(Self { id, data, tracks })
    }

    /// Release id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of playable tracks
    pub fn total_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Track at a zero-based index
    pub fn track(&self, index: usize) -> Result<Track<'_>, ClientError> {
        let data = self.tracks.get(index).ok_or(ClientError::MissingTrack {
            id: self.id,
            index,
        })?;
        Ok(Track {
            release: self,
            index,
            data,
        })
    }

    /// All playable tracks in order
    pub fn tracks(&self) -> impl Iterator<Item = Track<'_>> {
        self.tracks.iter().enumerate().map(move |(index, data)| Track {
            release: self,
            index,
            data,
        })
    }

    /// Whether tracks are credited to different artists
    pub fn is_compilation(&self) -> bool {
        let mut artists = self.tracks().map(|t| t.artist());
        match artists.next() {
            Some(first) => artists.any(|a| a != first),
            None => false,
        }
    }

    /// Release year as text, empty when unknown
    pub fn year(&self) -> String {
        match self.data.get("year") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Joins one entry per list item, taking the first non-empty key of each
    fn compile_list(&self, list: &str, keys: &[&str]) -> String {
        let Some(items) = self.data.get(list).and_then(Value::as_array) else {
            return String::new();
        };
        items
            .iter()
            .map(|item| {
                keys.iter()
                    .map(|key| str_field(item, key))
                    .find(|s| !s.is_empty())
                    .unwrap_or("")
            })
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR)
            .trim()
            .to_string()
    }

    /// Credited artists, preferring name variations
    pub fn artist(&self) -> String {
        self.compile_list("artists", &["anv", "name"])
    }

    /// Label names
    pub fn label(&self) -> String {
        self.compile_list("labels", &["name"])
    }

    /// Catalog numbers
    pub fn catno(&self) -> String {
        self.compile_list("labels", &["catno"])
    }

    /// Title, falling back to the catalog number for untitled releases
    pub fn title(&self) -> String {
        let title = str_field(&self.data, "title");
        if title.starts_with("Untitled") {
            self.catno()
        } else {
            title.to_string()
        }
    }

    /// URI of the first image, if any
    pub fn artwork_uri(&self) -> Option<&str> {
        self.data
            .get("images")?
            .as_array()?
            .first()?
            .get("uri")?
            .as_str()
            .filter(|uri| !uri.is_empty())
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({}: {})",
            self.artist(),
            self.title(),
            self.label(),
            self.catno()
        )
    }
}

impl<'a> Track<'a> {
    /// The release this track belongs to
    pub fn release(&self) -> &'a Release {
        self.release
    }

    /// One-based track number
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// Position as printed on the release (e.g. `A1`)
    pub fn position(&self) -> &'a str {
        str_field(self.data, "position")
    }

    /// Track artists, or the release artist when the track has none
    pub fn artist(&self) -> String {
        match self.data.get("artists").and_then(Value::as_array) {
            Some(artists) if !artists.is_empty() => artists
                .iter()
                .map(|a| str_field(a, "name"))
                .collect::<Vec<_>>()
                .join(LIST_SEPARATOR)
                .trim()
                .to_string(),
            _ => self.release.artist(),
        }
    }

    /// Title; untitled tracks are named after the release and position
    pub fn title(&self) -> String {
        let title = str_field(self.data, "title");
        if title.starts_with("Untitled") {
            format!("{} {}", self.release.title(), self.position())
        } else {
            title.to_string()
        }
    }
}

impl fmt::Display for Track<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} [{}] - {}: {}",
            self.artist(),
            self.release.title(),
            self.release.label(),
            self.position(),
            self.title()
        )
    }
}
