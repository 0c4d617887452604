//! Cache-first release fetching with bounded retries
//!
//! The Discogs API enforces a request rate, and even a well-behaved client
//! sees occasional connection resets. Every remote call therefore waits a
//! little before each attempt, with the wait growing linearly, and gives up
//! after a fixed number of attempts.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::{ClientError, FetchError};
use crate::cache::{CacheKey, ResponseCache};

/// Field every usable release payload must carry
pub const MANDATORY_FIELD: &str = "tracklist";

/// Something that can produce a raw release payload
pub trait ReleaseSource {
    /// Performs one remote lookup, without retrying
    fn release(&self, id: u64) -> impl Future<Output = Result<Value, FetchError>>;
}

/// How many times to try and how long to wait before each try
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    base_delay: Duration,
    step: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, waiting 1.1s, 6.1s and 11.1s beforehand
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1100), Duration::from_secs(5))
    }
}

impl RetryPolicy {
    /// Creates a policy; at least one attempt is always made
    pub fn new(attempts: u32, base_delay: Duration, step: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
            step,
        }
    }

    /// A policy that never sleeps, for tests and offline tooling
    pub fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Maximum number of attempts
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wait before the zero-based `attempt`
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay + self.step * attempt
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out
    ///
    /// Transient failures are logged and retried. A 404 becomes
    /// [`ClientError::NotFound`]; other permanent failures become
    /// [`ClientError::Rejected`]. When every attempt fails transiently the
    /// error from the last one is kept in [`ClientError::FetchFailed`].
    pub async fn run<T, F, Fut>(&self, id: u64, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0;
        loop {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_not_found() => return Err(ClientError::NotFound { id }),
                Err(e) if !e.is_retryable() => return Err(ClientError::Rejected { id, source: e }),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.attempts {
                        return Err(ClientError::FetchFailed {
                            id,
                            attempts: attempt,
                            source: e,
                        });
                    }
                    warn!(id, attempt, error = %e, "Transient fetch failure, retrying");
                }
            }
        }
    }
}

/// Trims every string in a payload, recursing into arrays and objects
pub fn scrub(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(scrub).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, scrub(v))).collect()),
        other => other,
    }
}

fn is_complete(payload: &Value) -> bool {
    payload.get(MANDATORY_FIELD).is_some()
}

/// Returns a usable cached payload for a release without touching the network
///
/// A cached payload lacking the mandatory field is deleted so the next fetch
/// replaces it.
pub fn cached_entity(cache: &ResponseCache, id: u64) -> Result<Option<Value>, ClientError> {
    let key = CacheKey::Release(id);
    let Some(cached) = cache.get(&key)? else {
        return Ok(None);
    };
    if is_complete(&cached.payload) {
        debug!(%key, "Cache hit");
        return Ok(Some(cached.payload));
    }
    info!(%key, "Cached payload has no {}, refetching", MANDATORY_FIELD);
    cache.delete(&key)?;
    Ok(None)
}

/// Fetches releases through the response cache
pub struct Fetcher<'a, S> {
    cache: &'a ResponseCache,
    source: &'a S,
    policy: RetryPolicy,
}

impl<'a, S: ReleaseSource> Fetcher<'a, S> {
    /// Creates a fetcher with the default retry policy
    pub fn new(cache: &'a ResponseCache, source: &'a S) -> Self {
        Self::with_policy(cache, source, RetryPolicy::default())
    }

    /// Creates a fetcher with a custom retry policy
    pub fn with_policy(cache: &'a ResponseCache, source: &'a S, policy: RetryPolicy) -> Self {
        Self {
            cache,
            source,
            policy,
        }
    }

    /// Returns the normalized payload for a release
    ///
    /// # Behavior
    /// - A cached payload with a track list is returned without a network call
    /// - A cached payload without one is deleted and refetched
    /// - A fetched payload is scrubbed and cached before it is returned
    pub async fn fetch_entity(&self, id: u64) -> Result<Value, ClientError> {
        if let Some(data) = cached_entity(self.cache, id)? {
            return Ok(data);
        }

        let key = CacheKey::Release(id);
        let raw = self.policy.run(id, || self.source.release(id)).await?;
        let data = scrub(raw);
        self.cache.put(&key, &data)?;
        Ok(data)
    }
}
