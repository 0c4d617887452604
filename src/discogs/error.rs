//! Error types for Discogs access

use reqwest::StatusCode;
use thiserror::Error;

use crate::cache::CacheError;

/// Why a single remote call failed
///
/// Each variant knows whether repeating the call could help; see
/// [`FetchError::is_retryable`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (connect, reset, timeout)
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Server returned {status}")]
    Status {
        /// HTTP status code
        status: StatusCode,
    },

    /// The body was not the JSON we expected
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FetchError {
    /// Whether another attempt may succeed
    ///
    /// Transport failures, rate limiting (429) and server errors (5xx) are
    /// transient. Everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(e) => !e.is_builder() && !e.is_decode(),
            FetchError::Status { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || status.is_server_error()
            }
            FetchError::Decode(_) => false,
        }
    }

    /// Whether the server reported that the entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status } if *status == StatusCode::NOT_FOUND)
    }
}

/// Errors surfaced to callers of the Discogs layer
#[derive(Debug, Error)]
pub enum ClientError {
    /// The release does not exist on Discogs
    #[error("Release {id} not found")]
    NotFound {
        /// Release id
        id: u64,
    },

    /// Every attempt failed with a transient error
    #[error("Release {id} couldn't be fetched after {attempts} attempts")]
    FetchFailed {
        /// Release id
        id: u64,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        source: FetchError,
    },

    /// The server refused the request in a way retrying cannot fix
    #[error("Request for {id} was rejected")]
    Rejected {
        /// Release id
        id: u64,
        /// Underlying error
        #[source]
        source: FetchError,
    },

    /// A track index past the end of the release's track list
    #[error("Release {id} has no track {index}")]
    MissingTrack {
        /// Release id
        id: u64,
        /// Zero-based track index
        index: usize,
    },

    /// Cover artwork could not be downloaded
    #[error("Failed to download artwork from {uri}")]
    Artwork {
        /// Image URI
        uri: String,
        /// Underlying error
        #[source]
        source: FetchError,
    },

    /// An image URI does not end in a usable file name
    #[error("Artwork URI '{0}' has no file name")]
    ArtworkName(String),

    /// A payload lacks a field the release model needs
    #[error("Release payload is missing '{0}'")]
    MissingField(&'static str),

    /// Authorization failed or no credentials are available
    #[error("Authorization failed: {0}")]
    Auth(String),

    /// Local storage failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Local file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP client could not be set up or a direct request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_status_classification() {
        let retryable = [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ];
        for status in retryable {
            assert!(FetchError::Status { status }.is_retryable(), "{status} should retry");
        }

        let fatal = [
            StatusCode::NOT_FOUND,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::BAD_REQUEST,
        ];
        for status in fatal {
            assert!(!FetchError::Status { status }.is_retryable(), "{status} should not retry");
        }
    }

    #[test]
    fn test_decode_errors_are_not_retryable() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(!FetchError::Decode(err).is_retryable());
    }

    #[test]
    fn test_not_found_detection() {
        assert!(FetchError::Status { status: StatusCode::NOT_FOUND }.is_not_found());
        assert!(!FetchError::Status { status: StatusCode::GONE }.is_not_found());
    }

    #[test]
    fn test_fetch_failed_keeps_last_cause() {
        let err = ClientError::FetchFailed {
            id: 42,
            attempts: 3,
            source: FetchError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
            },
        };
        assert!(err.to_string().contains("42"));
        let source = err.source().expect("Should carry a cause");
        assert!(source.to_string().contains("503"));
    }
}
