//! Command-line interface parsing for disctool
//!
//! This module handles parsing of CLI arguments using clap. Validation that
//! clap cannot express (such as conflicting rename options) happens in
//! [`RenameArgs::options`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::files::OrganizeOptions;

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The destination directory exists but is a file
    #[error("Destination '{0}' is not a directory")]
    DestinationNotDirectory(PathBuf),
}

/// disctool - tag and organize audio files with Discogs metadata
#[derive(Parser, Debug)]
#[command(name = "disctool")]
#[command(about = "Tag and organize audio files with Discogs release metadata")]
#[command(version)]
pub struct Cli {
    /// Directory for the cache database, credentials and artwork
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log more detail (repeat for trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authorize disctool with your Discogs account
    Auth,

    /// Print a release and its track list
    Show {
        /// Discogs release id
        release_id: u64,
    },

    /// Tag files, in order, with the tracks of a release
    ///
    /// Examples:
    ///   disctool tag 42 01.mp3 02.mp3 03.mp3
    Tag {
        /// Discogs release id
        release_id: u64,
        /// Audio files, one per track, in track order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Refresh tags previously written by disctool
    Retag {
        /// Files or directories to process
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Copy or move tagged files into a tidy directory layout
    Rename(RenameArgs),

    /// Read a collection CSV export
    Collection {
        /// Path to the exported CSV
        csv: PathBuf,
        /// Also fetch every release into the cache
        #[arg(long)]
        fetch: bool,
    },

    /// Show marketplace statistics for a release
    Stats {
        /// Discogs release id
        release_id: u64,
        /// Reuse a stored record up to this many days old
        #[arg(long, value_name = "DAYS")]
        max_age: Option<i64>,
    },

    /// Inspect or edit the response cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Cache maintenance subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Print the cached payload for a release
    Get {
        /// Discogs release id
        release_id: u64,
    },
    /// Drop the cached payload for a release
    Delete {
        /// Discogs release id
        release_id: u64,
    },
}

/// Arguments for `rename`
#[derive(Args, Debug)]
pub struct RenameArgs {
    /// Files or directories to process
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Destination root directory
    #[arg(long, short)]
    pub dest: PathBuf,

    /// Move files instead of copying them
    #[arg(long = "move")]
    pub move_files: bool,

    /// Group by genre and prefix names with the BPM
    #[arg(long)]
    pub genre: bool,

    /// Only print what would happen
    #[arg(long, short = 'n')]
    pub dry_run: bool,
}

impl RenameArgs {
    /// Converts the arguments into organize options
    ///
    /// # Returns
    /// * `Ok(OrganizeOptions)` when the destination is usable
    /// * `Err(CliError::DestinationNotDirectory)` if it names an existing file
    pub fn options(&self) -> Result<OrganizeOptions, CliError> {
        if self.dest.exists() && !self.dest.is_dir() {
            return Err(CliError::DestinationNotDirectory(self.dest.clone()));
        }
        Ok(OrganizeOptions {
            dest: self.dest.clone(),
            by_genre: self.genre,
            move_files: self.move_files,
            dry_run: self.dry_run,
        })
    }
}

impl Cli {
    /// Default tracing filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "disctool=info",
            1 => "disctool=debug",
            _ => "disctool=trace",
        }
    }
}
