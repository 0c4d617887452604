//! Audio tag access and the tagging workflow
//!
//! Tag storage is reached through the [`TagStore`] trait, which speaks in
//! logical [`TagField`]s. [`LoftyTags`] maps those onto real files; the
//! format-specific encoding is entirely `lofty`'s business.

mod field;
mod lofty_tags;
mod workflow;

pub use field::{MemoryTags, TagError, TagField, TagStore};
pub use lofty_tags::LoftyTags;
pub use workflow::{apply_track, check_total_tracks, read_position, release_id_from_comment, TagPosition};
