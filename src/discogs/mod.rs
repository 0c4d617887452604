//! Discogs access: authentication, the HTTP client, cache-first fetching and
//! the release model built on top of the fetched payloads.

pub mod artwork;
pub mod auth;
pub mod client;
pub mod error;
pub mod fetch;
pub mod release;
pub mod stats;

pub use artwork::{ArtworkSource, ArtworkStore};
pub use auth::Credentials;
pub use client::DiscogsClient;
pub use error::{ClientError, FetchError};
pub use fetch::{cached_entity, scrub, Fetcher, ReleaseSource, RetryPolicy};
pub use release::{Release, Track};
pub use stats::{latest_stats, StatsSource};
