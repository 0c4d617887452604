//! disctool library
//!
//! This module exposes the cache, the Discogs client and the tagging workflow
//! for use by the binary and by integration tests.

pub mod cache;
pub mod cli;
pub mod collection;
pub mod config;
pub mod discogs;
pub mod files;
pub mod session;
pub mod tags;
