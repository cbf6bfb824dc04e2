use crate::core::price::{MarketPrices, PriceProvider};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Maps a token symbol to its CoinGecko coin id.
pub fn coin_id(token: &str) -> Option<&'static str> {
    let id = match token.trim().to_uppercase().as_str() {
        "ETH" => "ethereum",
        "BTC" => "bitcoin",
        "USDC" => "usd-coin",
        "USDT" => "tether",
        "DAI" => "dai",
        "WETH" => "weth",
        "WBTC" => "wrapped-bitcoin",
        "MATIC" => "matic-network",
        "LINK" => "chainlink",
        "UNI" => "uniswap",
        "AAVE" => "aave",
        _ => return None,
    };
    Some(id)
}

/// Historical daily prices from the CoinGecko `coins/{id}/history` endpoint.
pub struct CoinGeckoProvider {
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoProvider {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        CoinGeckoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Deserialize, Debug)]
struct HistoryResponse {
    market_data: Option<MarketData>,
}

#[derive(Deserialize, Debug)]
struct MarketData {
    current_price: HashMap<String, Decimal>,
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn supports(&self, token: &str) -> bool {
        coin_id(token).is_some()
    }

    /// One request returns the price in every currency CoinGecko quotes.
    #[instrument(
        name = "CoinGeckoPriceFetch",
        skip(self),
        fields(token = %token, date = %date)
    )]
    async fn historical_prices(&self, token: &str, date: NaiveDate) -> Result<MarketPrices> {
        let id = coin_id(token).ok_or_else(|| anyhow!("Unsupported token: {}", token))?;
        let url = format!(
            "{}/coins/{}/history?date={}&localization=false",
            self.base_url,
            id,
            date.format("%d-%m-%Y")
        );
        debug!("Requesting price data from {}", url);

        let client = reqwest::Client::builder()
            .user_agent("chainledger/0.1")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let mut request = client.get(&url).header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            let header = if key.starts_with("CG-") {
                "x-cg-demo-api-key"
            } else {
                "x-cg-pro-api-key"
            };
            request = request.header(header, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for token: {} URL: {}", e, token, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for token: {}",
                response.status(),
                token
            ));
        }

        let text = response.text().await?;
        let data: HistoryResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", token, e))?;

        let market_data = data
            .market_data
            .ok_or_else(|| anyhow!("No price data for {} on {}", token, date))?;
        Ok(market_data
            .current_price
            .into_iter()
            .map(|(currency, price)| (currency.to_uppercase(), price))
            .collect())
    }
}
