//! Audio file discovery, filename sanitization and renaming
//!
//! Tagged files are renamed from their tags into a destination directory,
//! optionally grouped by genre. Targets that already exist with identical
//! content are left alone, so reorganizing a library twice is cheap.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::tags::{TagField, TagStore};

/// File extensions treated as audio
pub const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "m4a", "aac", "mp4", "aiff", "aif"];

/// Errors raised while organizing files
#[derive(Debug, Error)]
pub enum FileError {
    /// A filesystem operation failed
    #[error("{path}: {source}")]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file name has no extension to carry over
    #[error("{0} has no file extension")]
    NoExtension(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> FileError + '_ {
    move |source| FileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Replaces every character outside a conservative whitelist with `_`
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "[]()-_+.' ".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Lowercase extension without the dot, or empty
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

fn is_audio_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !hidden && AUDIO_EXTENSIONS.contains(&file_extension(path).as_str())
}

/// Recursively finds audio files under `dir`, skipping dot-files
///
/// Returned paths are absolute and sorted.
pub fn audio_files(dir: &Path) -> Result<Vec<PathBuf>, FileError> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), FileError> {
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(io_err(&path))?;
        if file_type.is_dir() {
            walk(&path, found)?;
        } else if is_audio_file(&path) {
            found.push(fs::canonicalize(&path).map_err(io_err(&path))?);
        }
    }
    Ok(())
}

/// Expands a mix of files and directories into audio files
///
/// Files given explicitly are kept even if their extension is unusual.
pub fn collect_audio_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, FileError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(audio_files(path)?);
        } else {
            files.push(fs::canonicalize(path).map_err(io_err(path))?);
        }
    }
    Ok(files)
}

/// How to organize files
#[derive(Debug, Clone, Default)]
pub struct OrganizeOptions {
    /// Destination root
    pub dest: PathBuf,
    /// Group into `<genre>/` directories and prefix names with the BPM
    pub by_genre: bool,
    /// Move instead of copy
    pub move_files: bool,
    /// Only report what would happen
    pub dry_run: bool,
}

/// What [`organize`] did with a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizeOutcome {
    /// Copied to the path
    Copied(PathBuf),
    /// Moved to the path
    Moved(PathBuf),
    /// Would have been copied or moved to the path
    DryRun(PathBuf),
    /// An identical file already exists at the path
    Unchanged(PathBuf),
    /// Grouping by genre was requested but the file has none
    NoGenre,
}

/// Destination path for a file, derived from its tags
///
/// Returns `Ok(None)` when grouping by genre and the genre is unset.
pub fn target_path<T: TagStore>(
    source: &Path,
    tags: &T,
    options: &OrganizeOptions,
) -> Result<Option<PathBuf>, FileError> {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| FileError::NoExtension(source.to_path_buf()))?;
    let field = |f| tags.get_field(f).unwrap_or_default();
    let track = field(TagField::TrackNumber)
        .split('/')
        .next()
        .and_then(|n| n.trim().parse::<u32>().ok())
        .unwrap_or(0);

    if options.by_genre {
        let genre = field(TagField::Genre);
        if genre.is_empty() || genre == "null" {
            return Ok(None);
        }
        let bpm = field(TagField::Bpm)
            .trim()
            .parse::<f64>()
            .map(|b| b.round() as u32)
            .unwrap_or(0);
        let name = format!(
            "[{:03}] {} - {} {} ({}).{}",
            bpm,
            field(TagField::Artist),
            field(TagField::Title),
            track,
            field(TagField::Year),
            ext
        );
        Ok(Some(options.dest.join(sanitize(&genre)).join(sanitize(&name))))
    } else {
        let name = format!(
            "{} - {} {} [{}].{}",
            field(TagField::Artist),
            field(TagField::Title),
            track,
            field(TagField::Label),
            ext
        );
        Ok(Some(options.dest.join(sanitize(&name))))
    }
}

/// Whether two files have identical contents
pub fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fs::read(a)? == fs::read(b)?)
}

/// Copies or moves `source` to the name its tags dictate
pub fn organize<T: TagStore>(
    source: &Path,
    tags: &T,
    options: &OrganizeOptions,
) -> Result<OrganizeOutcome, FileError> {
    let Some(target) = target_path(source, tags, options)? else {
        info!(path = %source.display(), "Skipping file without genre");
        return Ok(OrganizeOutcome::NoGenre);
    };

    if target.exists() && same_contents(source, &target).map_err(io_err(&target))? {
        debug!(path = %target.display(), "Skipping unchanged file");
        return Ok(OrganizeOutcome::Unchanged(target));
    }

    let verb = if options.move_files { "MOVE" } else { "COPY" };
    info!("{} {} --> {}", verb, source.display(), target.display());
    if options.dry_run {
        return Ok(OrganizeOutcome::DryRun(target));
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    if options.move_files {
        if fs::rename(source, &target).is_err() {
            // rename cannot cross filesystems
            fs::copy(source, &target).map_err(io_err(&target))?;
            fs::remove_file(source).map_err(io_err(source))?;
        }
        Ok(OrganizeOutcome::Moved(target))
    } else {
        fs::copy(source, &target).map_err(io_err(&target))?;
        Ok(OrganizeOutcome::Copied(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::MemoryTags;
    use tempfile::TempDir;

    fn tagged() -> MemoryTags {
        MemoryTags::new()
            .with(TagField::Artist, "Boards of Canada")
            .with(TagField::Title, "Roygbiv")
            .with(TagField::TrackNumber, "7")
            .with(TagField::Label, "Warp")
            .with(TagField::Year, "1998")
            .with(TagField::Genre, "Electronic")
            .with(TagField::Bpm, "96")
    }

    #[test]
    fn test_sanitize_whitelist() {
        assert_eq!(sanitize("AC/DC: Live?"), "AC_DC_ Live_");
        assert_eq!(sanitize("[007] It's (ok) - a_b+c.mp3"), "[007] It's (ok) - a_b+c.mp3");
        assert_eq!(sanitize("Björk"), "Bj_rk");
    }

    #[test]
    fn test_audio_files_filters_and_recurses() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("one.mp3"), b"x").unwrap();
        fs::write(root.join("a/two.M4A"), b"x").unwrap();
        fs::write(root.join("a/b/three.aif"), b"x").unwrap();
        fs::write(root.join("a/.hidden.mp3"), b"x").unwrap();
        fs::write(root.join("a/cover.jpg"), b"x").unwrap();

        let files = audio_files(root).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(files.len(), 3);
        assert!(names.contains(&"one.mp3".to_string()));
        assert!(names.contains(&"two.M4A".to_string()));
        assert!(names.contains(&"three.aif".to_string()));
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_target_path_plain() {
        let options = OrganizeOptions {
            dest: PathBuf::from("/music"),
            ..Default::default()
        };
        let target = target_path(Path::new("/in/x.mp3"), &tagged(), &options).unwrap();
        assert_eq!(
            target,
            Some(PathBuf::from("/music/Boards of Canada - Roygbiv 7 [Warp].mp3"))
        );
    }

    #[test]
    fn test_target_path_by_genre() {
        let options = OrganizeOptions {
            dest: PathBuf::from("/music"),
            by_genre: true,
            ..Default::default()
        };
        let target = target_path(Path::new("/in/x.m4a"), &tagged(), &options).unwrap();
        assert_eq!(
            target,
            Some(PathBuf::from(
                "/music/Electronic/[096] Boards of Canada - Roygbiv 7 (1998).m4a"
            ))
        );

        let no_genre = tagged().with(TagField::Genre, "null");
        assert_eq!(target_path(Path::new("/in/x.m4a"), &no_genre, &options).unwrap(), None);
    }

    #[test]
    fn test_target_path_requires_extension() {
        let options = OrganizeOptions::default();
        assert!(matches!(
            target_path(Path::new("/in/noext"), &tagged(), &options),
            Err(FileError::NoExtension(_))
        ));
    }

    #[test]
    fn test_organize_copy_then_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.mp3");
        fs::write(&source, b"audio").unwrap();
        let options = OrganizeOptions {
            dest: temp_dir.path().join("out"),
            ..Default::default()
        };

        let first = organize(&source, &tagged(), &options).unwrap();
        let OrganizeOutcome::Copied(target) = first else {
            panic!("Expected a copy, got {first:?}");
        };
        assert!(source.exists());
        assert_eq!(fs::read(&target).unwrap(), b"audio");

        let second = organize(&source, &tagged(), &options).unwrap();
        assert_eq!(second, OrganizeOutcome::Unchanged(target));
    }

    #[test]
    fn test_organize_move() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.mp3");
        fs::write(&source, b"audio").unwrap();
        let options = OrganizeOptions {
            dest: temp_dir.path().join("out"),
            move_files: true,
            ..Default::default()
        };

        let outcome = organize(&source, &tagged(), &options).unwrap();

        assert!(matches!(outcome, OrganizeOutcome::Moved(ref p) if p.exists()));
        assert!(!source.exists());
    }

    #[test]
    fn test_organize_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("in.mp3");
        fs::write(&source, b"audio").unwrap();
        let options = OrganizeOptions {
            dest: temp_dir.path().join("out"),
            move_files: true,
            dry_run: true,
            ..Default::default()
        };

        let outcome = organize(&source, &tagged(), &options).unwrap();

        assert!(matches!(outcome, OrganizeOutcome::DryRun(_)));
        assert!(source.exists());
        assert!(!temp_dir.path().join("out").exists());
    }

    #[test]
    fn test_same_contents() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        let c = temp_dir.path().join("c");
        fs::write(&a, b"same").unwrap();
        fs::write(&b, b"same").unwrap();
        fs::write(&c, b"diff").unwrap();

        assert!(same_contents(&a, &b).unwrap());
        assert!(!same_contents(&a, &c).unwrap());
    }
}
