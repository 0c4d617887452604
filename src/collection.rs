//! Discogs collection CSV export
//!
//! The export has a header row followed by one row per item:
//! `catno, artist, title, label, format, rating, released, release_id,
//! folder, date added, media condition, sleeve condition, notes`.
//! Columns before the release id can be derived from the release itself, so
//! only the id and the owner-specific columns are kept.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Column holding the release id
const RELEASE_ID_COLUMN: usize = 7;

/// Errors raised while reading a collection export
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The CSV could not be read
    #[error("Failed to read collection: {0}")]
    Csv(#[from] csv::Error),

    /// A row does not have a usable release id
    #[error("Row {row}: invalid release id '{value}'")]
    InvalidReleaseId {
        /// One-based data row number
        row: usize,
        /// Raw cell value
        value: String,
    },
}

/// One item of a user's collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionItem {
    /// Release id
    pub release_id: u64,
    /// Collection folder
    pub folder: String,
    /// When the item was added
    pub date_added: String,
    /// Media condition grade
    pub media_condition: String,
    /// Sleeve condition grade
    pub sleeve_condition: String,
    /// Free-form notes
    pub notes: String,
}

/// Parses a collection export from any reader
pub fn parse_collection<R: Read>(reader: R) -> Result<Vec<CollectionItem>, CollectionError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut items = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or("").trim().to_string();

        let raw_id = cell(RELEASE_ID_COLUMN);
        let release_id = raw_id
            .parse()
            .map_err(|_| CollectionError::InvalidReleaseId {
                row: index + 1,
                value: raw_id.clone(),
            })?;

        items.push(CollectionItem {
            release_id,
            folder: cell(8),
            date_added: cell(9),
            media_condition: cell(10),
            sleeve_condition: cell(11),
            notes: cell(12),
        });
    }
    Ok(items)
}

/// Parses a collection export file
pub fn read_collection(path: &Path) -> Result<Vec<CollectionItem>, CollectionError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    parse_collection(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Catalog#,Artist,Title,Label,Format,Rating,Released,release_id,CollectionFolder,Date Added,Collection Media Condition,Collection Sleeve Condition,Collection Notes\n";

    #[test]
    fn test_parse_rows() {
        let data = format!(
            "{}{}{}",
            HEADER,
            "WARP55,Boards Of Canada,Music Has The Right To Children,Warp Records,\"2xLP, Album\",,1998,42,Uncategorized,2020-01-05 10:00:00,Near Mint (NM or M-),Very Good Plus (VG+),\"first press, \"\"mint\"\"\"\n",
            "SKA008,Boards Of Canada,Hi Scores,Skam,12 inch,,1996,77,Techno,2021-03-01 09:30:00,,,\n"
        );

        let items = parse_collection(data.as_bytes()).expect("Parse should succeed");

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            CollectionItem {
                release_id: 42,
                folder: "Uncategorized".to_string(),
                date_added: "2020-01-05 10:00:00".to_string(),
                media_condition: "Near Mint (NM or M-)".to_string(),
                sleeve_condition: "Very Good Plus (VG+)".to_string(),
                notes: "first press, \"mint\"".to_string(),
            }
        );
        assert_eq!(items[1].release_id, 77);
        assert_eq!(items[1].folder, "Techno");
        assert!(items[1].notes.is_empty());
    }

    #[test]
    fn test_header_only() {
        assert!(parse_collection(HEADER.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_release_id_names_row() {
        let data = format!("{}{}", HEADER, "X,A,T,L,F,,1999,abc,Folder,2020-01-01,,,\n");
        let err = parse_collection(data.as_bytes()).unwrap_err();
        match err {
            CollectionError::InvalidReleaseId { row, value } => {
                assert_eq!(row, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("Expected InvalidReleaseId, got {other:?}"),
        }
    }
}
