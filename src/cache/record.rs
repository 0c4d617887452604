//! Marketplace price records

use chrono::NaiveDate;
use serde::Serialize;

use super::store::today;

/// One observation of a release's marketplace state.
///
/// Records are append-only; several rows may exist for the same release and
/// the newest by `date` is the one that counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostedSaleRecord {
    /// Release id
    pub id: u64,
    /// Lowest asking price
    pub price: f64,
    /// Number of copies for sale
    pub count: u32,
    /// Highest recorded sale price, if known
    pub sales_hi: Option<f64>,
    /// Lowest recorded sale price, if known
    pub sales_lo: Option<f64>,
    /// Average recorded sale price, if known
    pub sales_avg: Option<f64>,
    /// Median recorded sale price, if known
    pub sales_mdn: Option<f64>,
    /// Day the record was taken
    pub date: NaiveDate,
}

impl PostedSaleRecord {
    /// Creates a record stamped with today's date and no sales history
    pub fn new(id: u64, price: f64, count: u32) -> Self {
        Self {
            id,
            price,
            count,
            sales_hi: None,
            sales_lo: None,
            sales_avg: None,
            sales_mdn: None,
            date: today(),
        }
    }

    /// Returns the same record with a different date
    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }
}
