//! Historical fiat exchange rates from a Frankfurter (ECB reference rate) API.

use crate::core::price::CurrencyRateProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";

pub struct FrankfurterProvider {
    base_url: String,
}

impl FrankfurterProvider {
    pub fn new(base_url: &str) -> Self {
        FrankfurterProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, Decimal>,
}

#[async_trait]
impl CurrencyRateProvider for FrankfurterProvider {
    async fn historical_rate(&self, from: &str, to: &str, date: NaiveDate) -> Result<Decimal> {
        let pair = format!("{from}/{to}");
        let url = format!(
            "{}/{}?from={}&to={}",
            self.base_url,
            date.format("%Y-%m-%d"),
            from,
            to
        );
        debug!("Requesting currency rate from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("chainledger/0.1")
            .build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for currency pair: {}", e, pair))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for currency pair: {}",
                response.status(),
                pair
            ));
        }

        let text = response.text().await?;
        let data: RatesResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", pair, e))?;

        data.rates
            .get(to)
            .copied()
            .ok_or_else(|| anyhow!("No rate data found for currency pair: {}", pair))
    }
}
