//! Local response cache backed by SQLite
//!
//! This module stores remote API payloads keyed by a typed [`CacheKey`] and
//! stamped with the date they were written, alongside an append-only log of
//! marketplace price records. Nothing is expired automatically; callers decide
//! whether a payload is usable and delete it when it is not.

mod key;
mod record;
mod store;

pub use key::CacheKey;
pub use record::PostedSaleRecord;
pub use store::{age_in_days, today, CacheError, CachedResponse, ResponseCache};
