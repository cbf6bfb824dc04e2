//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

/// Identifies one unit price: a token on a calendar date in a fiat currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    pub token: String,
    pub date: NaiveDate,
    pub currency: String,
}

impl PriceKey {
    pub fn new(token: &str, date: NaiveDate, currency: &str) -> Self {
        Self {
            token: token.trim().to_uppercase(),
            date,
            currency: currency.trim().to_uppercase(),
        }
    }
}

impl Display for PriceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.token, self.currency, self.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    Market,
    Archive,
    StablecoinPeg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceQuote {
    Available { price: Decimal, source: PriceSource },
    Unavailable,
}

impl PriceQuote {
    pub fn price(&self) -> Option<Decimal> {
        match self {
            PriceQuote::Available { price, .. } => Some(*price),
            PriceQuote::Unavailable => None,
        }
    }
}

/// Fiat prices of one token on one date, keyed by uppercase currency code.
pub type MarketPrices = HashMap<String, Decimal>;

/// External source of historical token prices.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Whether the source can price `token` at all. Checked before any
    /// rate-limited request is made.
    fn supports(&self, _token: &str) -> bool {
        true
    }

    /// Every fiat price the source publishes for `token` on `date`.
    async fn historical_prices(&self, token: &str, date: NaiveDate) -> Result<MarketPrices>;
}

/// External source of historical fiat exchange rates.
#[async_trait]
pub trait CurrencyRateProvider: Send + Sync {
    async fn historical_rate(&self, from: &str, to: &str, date: NaiveDate) -> Result<Decimal>;
}

/// Long-lived price store consulted before any external lookup.
#[async_trait]
pub trait PriceArchive: Send + Sync {
    async fn get(&self, key: &PriceKey) -> Option<Decimal>;
    async fn put(&self, key: &PriceKey, price: Decimal);
}
