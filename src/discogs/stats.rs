//! Marketplace statistics with max-age reuse
//!
//! A fresh enough record in the local log is reused; otherwise the current
//! statistics are fetched and appended as a new record.

use std::future::Future;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::client::DiscogsClient;
use super::error::{ClientError, FetchError};
use super::fetch::RetryPolicy;
use crate::cache::{PostedSaleRecord, ResponseCache};

/// Something that can report a release's marketplace statistics
pub trait StatsSource {
    /// Performs one remote lookup, without retrying
    fn marketplace_stats(&self, id: u64) -> impl Future<Output = Result<Value, FetchError>>;
}

impl StatsSource for DiscogsClient {
    async fn marketplace_stats(&self, id: u64) -> Result<Value, FetchError> {
        DiscogsClient::marketplace_stats(self, id).await
    }
}

#[derive(Debug, Deserialize)]
struct MarketplaceStats {
    lowest_price: Option<Price>,
    #[serde(default)]
    num_for_sale: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Price {
    value: f64,
}

/// Converts a `marketplace/stats` payload into a record dated today
pub fn record_from_stats(id: u64, payload: Value) -> Result<PostedSaleRecord, FetchError> {
    let stats: MarketplaceStats = serde_json::from_value(payload)?;
    Ok(PostedSaleRecord::new(
        id,
        stats.lowest_price.map_or(0.0, |p| p.value),
        stats.num_for_sale.unwrap_or(0),
    ))
}

/// Returns a record for `id` no older than `max_age` days
pub async fn latest_stats<S: StatsSource>(
    cache: &ResponseCache,
    source: &S,
    policy: &RetryPolicy,
    id: u64,
    max_age: i64,
) -> Result<PostedSaleRecord, ClientError> {
    if let Some(record) = cache.get_latest_record(id, max_age)? {
        debug!(id, date = %record.date, "Reusing marketplace record");
        return Ok(record);
    }

    let record = policy
        .run(id, || async move {
            let payload = source.marketplace_stats(id).await?;
            record_from_stats(id, payload)
        })
        .await?;
    cache.put_record(&record)?;
    Ok(record)
}
