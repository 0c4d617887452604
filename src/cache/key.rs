//! Typed cache keys

use std::fmt;

/// Identifies one entry in the response cache.
///
/// The stored key is the `Display` form, so it must stay stable across
/// releases of this tool: `Release(42)` is always `"release-42"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// A full release payload
    Release(u64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Release(id) => write!(f, "release-{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_key_format() {
        assert_eq!(CacheKey::Release(42).to_string(), "release-42");
        assert_eq!(CacheKey::Release(1_234_567).to_string(), "release-1234567");
    }

    #[test]
    fn test_distinct_ids_give_distinct_keys() {
        assert_ne!(
            CacheKey::Release(1).to_string(),
            CacheKey::Release(11).to_string()
        );
    }
}
