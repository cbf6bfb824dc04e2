//! Resolves historical fiat prices for tokens.
//!
//! Lookup order for a `(token, date, currency)` key:
//! 1. the run cache,
//! 2. the stablecoin peg (1.00 USD, converted through the FX rate for other currencies),
//! 3. the optional long-lived archive,
//! 4. one rate-limited external lookup per `(token, date)`, shared by every
//!    currency.
//!
//! Tokens the provider cannot price are reported without waiting on the
//! limiter. Every outcome, including failures, is cached for the rest of the
//! run so a key is looked up externally at most once and never changes value.

use crate::core::cache::Cache;
use crate::core::price::{
    CurrencyRateProvider, MarketPrices, PriceArchive, PriceKey, PriceProvider, PriceQuote,
    PriceSource,
};
use crate::core::rate_limit::RateLimiter;
use crate::core::warnings::Warning;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_STABLECOINS: [&str; 10] = [
    "USDC", "USDT", "DAI", "BUSD", "TUSD", "USDP", "GUSD", "FRAX", "LUSD", "PYUSD",
];

/// Currency stablecoins are pegged to.
pub const PEG_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FxKey {
    from: String,
    to: String,
    date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MarketKey {
    token: String,
    date: NaiveDate,
}

pub struct PriceOracle {
    prices: Arc<dyn PriceProvider>,
    rates: Arc<dyn CurrencyRateProvider>,
    limiter: RateLimiter,
    archive: Option<Arc<dyn PriceArchive>>,
    stablecoins: HashSet<String>,
    price_cache: Cache<PriceKey, PriceQuote>,
    fx_cache: Cache<FxKey, Option<Decimal>>,
    market_cache: Cache<MarketKey, Result<MarketPrices, String>>,
    warnings: Mutex<Vec<Warning>>,
}

impl PriceOracle {
    /// Creates an oracle with an empty run cache. `limiter` should be shared
    /// with every other oracle that may run at the same time.
    pub fn new(
        prices: Arc<dyn PriceProvider>,
        rates: Arc<dyn CurrencyRateProvider>,
        limiter: RateLimiter,
    ) -> Self {
        Self {
            prices,
            rates,
            limiter,
            archive: None,
            stablecoins: DEFAULT_STABLECOINS.iter().map(|s| s.to_string()).collect(),
            price_cache: Cache::new(),
            fx_cache: Cache::new(),
            market_cache: Cache::new(),
            warnings: Mutex::new(Vec::new()),
        }
    }

    pub fn with_archive(mut self, archive: Arc<dyn PriceArchive>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_stablecoins<I, S>(mut self, stablecoins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stablecoins = stablecoins
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .collect();
        self
    }

    pub fn is_stablecoin(&self, token: &str) -> bool {
        self.stablecoins.contains(&token.trim().to_uppercase())
    }

    /// Unit price of `token` on `date` in `currency`. Never fails: an
    /// unresolvable price is `PriceQuote::Unavailable` plus a recorded warning.
    pub async fn price_at(&self, token: &str, date: NaiveDate, currency: &str) -> PriceQuote {
        let key = PriceKey::new(token, date, currency);
        let resolve_key = key.clone();
        self.price_cache
            .get_or_resolve(key, move || self.resolve_price(resolve_key))
            .await
    }

    /// Exchange rate from one fiat currency to another on `date`, cached like prices.
    pub async fn fx_rate(&self, from: &str, to: &str, date: NaiveDate) -> Option<Decimal> {
        let key = FxKey {
            from: from.trim().to_uppercase(),
            to: to.trim().to_uppercase(),
            date,
        };
        if key.from == key.to {
            return Some(Decimal::ONE);
        }
        let resolve_key = key.clone();
        self.fx_cache
            .get_or_resolve(key, move || self.resolve_rate(resolve_key))
            .await
    }

    /// Drains the warnings recorded so far.
    pub async fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.lock().await)
    }

    async fn resolve_price(&self, key: PriceKey) -> PriceQuote {
        if self.is_stablecoin(&key.token) {
            return self.stablecoin_quote(&key).await;
        }

        if let Some(archive) = &self.archive
            && let Some(price) = archive.get(&key).await
        {
            debug!("Archived price for {}: {}", key, price);
            return PriceQuote::Available {
                price,
                source: PriceSource::Archive,
            };
        }

        if !self.prices.supports(&key.token) {
            return self
                .unavailable(&key, format!("Unsupported token: {}", key.token))
                .await;
        }

        let market = self.market_prices(&key.token, key.date).await;
        let price = match market {
            Ok(prices) => prices.get(&key.currency).copied(),
            Err(reason) => return self.unavailable(&key, reason).await,
        };
        let Some(price) = price else {
            let reason = format!("No {} price for {} on {}", key.currency, key.token, key.date);
            return self.unavailable(&key, reason).await;
        };

        debug!("Fetched price for {}: {}", key, price);
        if let Some(archive) = &self.archive {
            archive.put(&key, price).await;
        }
        PriceQuote::Available {
            price,
            source: PriceSource::Market,
        }
    }

    /// All currencies for one token and date, fetched once per run.
    async fn market_prices(&self, token: &str, date: NaiveDate) -> Result<MarketPrices, String> {
        let key = MarketKey {
            token: token.to_string(),
            date,
        };
        self.market_cache
            .get_or_resolve(key, move || async move {
                self.limiter.acquire().await;
                self.prices
                    .historical_prices(token, date)
                    .await
                    .map(|prices| {
                        prices
                            .into_iter()
                            .map(|(currency, price)| (currency.to_uppercase(), price))
                            .collect()
                    })
                    .map_err(|e| e.to_string())
            })
            .await
    }

    async fn unavailable(&self, key: &PriceKey, reason: String) -> PriceQuote {
        warn!("Price lookup failed for {}: {}", key, reason);
        self.warnings.lock().await.push(Warning::PriceUnavailable {
            token: key.token.clone(),
            date: key.date,
            currency: key.currency.clone(),
            reason,
        });
        PriceQuote::Unavailable
    }

    async fn stablecoin_quote(&self, key: &PriceKey) -> PriceQuote {
        if key.currency == PEG_CURRENCY {
            return PriceQuote::Available {
                price: Decimal::ONE,
                source: PriceSource::StablecoinPeg,
            };
        }
        match self.fx_rate(PEG_CURRENCY, &key.currency, key.date).await {
            Some(rate) => PriceQuote::Available {
                price: rate,
                source: PriceSource::StablecoinPeg,
            },
            None => PriceQuote::Unavailable,
        }
    }

    async fn resolve_rate(&self, key: FxKey) -> Option<Decimal> {
        self.limiter.acquire().await;
        match self
            .rates
            .historical_rate(&key.from, &key.to, key.date)
            .await
        {
            Ok(rate) => {
                debug!("Fetched {}/{} rate on {}: {}", key.from, key.to, key.date, rate);
                Some(rate)
            }
            Err(e) => {
                warn!(
                    "Rate lookup failed for {}/{} on {}: {}",
                    key.from, key.to, key.date, e
                );
                self.warnings.lock().await.push(Warning::FxRateUnavailable {
                    from: key.from.clone(),
                    to: key.to.clone(),
                    date: key.date,
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Price provider backed by a fixed table; unknown keys fail.
    #[derive(Default)]
    pub(crate) struct MockPriceProvider {
        prices: HashMap<(String, NaiveDate, String), Decimal>,
        supported: Option<HashSet<String>>,
        pub(crate) calls: AtomicUsize,
    }

    impl MockPriceProvider {
        pub(crate) fn with_price(
            mut self,
            token: &str,
            date: NaiveDate,
            currency: &str,
            price: Decimal,
        ) -> Self {
            self.prices
                .insert((token.to_string(), date, currency.to_string()), price);
            self
        }

        /// Restricts the tokens the provider claims to support.
        pub(crate) fn supporting(mut self, tokens: &[&str]) -> Self {
            self.supported = Some(tokens.iter().map(|t| t.to_string()).collect());
            self
        }
    }

    #[async_trait]
    impl PriceProvider for MockPriceProvider {
        fn supports(&self, token: &str) -> bool {
            self.supported
                .as_ref()
                .is_none_or(|tokens| tokens.contains(token))
        }

        async fn historical_prices(&self, token: &str, date: NaiveDate) -> Result<MarketPrices> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prices: MarketPrices = self
                .prices
                .iter()
                .filter(|((t, d, _), _)| t == token && *d == date)
                .map(|((_, _, currency), price)| (currency.clone(), *price))
                .collect();
            if prices.is_empty() {
                return Err(anyhow!("No price for {} on {}", token, date));
            }
            Ok(prices)
        }
    }

    #[derive(Default)]
    pub(crate) struct MockRateProvider {
        rates: HashMap<(String, String), Decimal>,
        pub(crate) calls: AtomicUsize,
    }

    impl MockRateProvider {
        pub(crate) fn with_rate(mut self, from: &str, to: &str, rate: Decimal) -> Self {
            self.rates.insert((from.to_string(), to.to_string()), rate);
            self
        }
    }

    #[async_trait]
    impl CurrencyRateProvider for MockRateProvider {
        async fn historical_rate(&self, from: &str, to: &str, _date: NaiveDate) -> Result<Decimal> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rates
                .get(&(from.to_string(), to.to_string()))
                .copied()
                .ok_or_else(|| anyhow!("Rate not found for {} to {}", from, to))
        }
    }

    pub(crate) fn fast_limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_millis(1))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    #[tokio::test]
    async fn test_repeated_lookup_hits_cache() {
        let prices =
            Arc::new(MockPriceProvider::default().with_price("ETH", date(), "USD", dec!(2000)));
        let oracle = PriceOracle::new(
            prices.clone(),
            Arc::new(MockRateProvider::default()),
            fast_limiter(),
        );

        let first = oracle.price_at("ETH", date(), "USD").await;
        let second = oracle.price_at("eth", date(), "usd").await;

        assert_eq!(first.price(), Some(dec!(2000)));
        assert_eq!(first, second);
        assert_eq!(prices.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_flagged_and_cached() {
        let prices = Arc::new(MockPriceProvider::default());
        let oracle = PriceOracle::new(
            prices.clone(),
            Arc::new(MockRateProvider::default()),
            fast_limiter(),
        );

        assert_eq!(
            oracle.price_at("PEPE", date(), "USD").await,
            PriceQuote::Unavailable
        );
        assert_eq!(
            oracle.price_at("PEPE", date(), "USD").await,
            PriceQuote::Unavailable
        );
        assert_eq!(prices.calls.load(Ordering::SeqCst), 1);

        let warnings = oracle.take_warnings().await;
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            Warning::PriceUnavailable { token, currency, .. } if token == "PEPE" && currency == "USD"
        ));
        assert!(oracle.take_warnings().await.is_empty());
    }

    #[tokio::test]
    async fn test_stablecoin_is_pegged_without_external_call() {
        // The provider knows nothing, so any external lookup would fail.
        let prices = Arc::new(MockPriceProvider::default());
        let rates = Arc::new(MockRateProvider::default().with_rate("USD", "CAD", dec!(1.35)));
        let oracle = PriceOracle::new(prices.clone(), rates.clone(), fast_limiter());

        let usd = oracle.price_at("USDC", date(), "USD").await;
        assert_eq!(
            usd,
            PriceQuote::Available {
                price: dec!(1.00),
                source: PriceSource::StablecoinPeg
            }
        );
        assert_eq!(oracle.price_at("usdt", date(), "CAD").await.price(), Some(dec!(1.35)));
        assert_eq!(oracle.price_at("USDC", date(), "CAD").await.price(), Some(dec!(1.35)));

        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
        assert_eq!(rates.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stablecoin_without_fx_rate_is_unavailable_in_that_currency() {
        let oracle = PriceOracle::new(
            Arc::new(MockPriceProvider::default()),
            Arc::new(MockRateProvider::default()),
            fast_limiter(),
        );
        assert_eq!(
            oracle.price_at("DAI", date(), "CAD").await,
            PriceQuote::Unavailable
        );
        assert_eq!(oracle.price_at("DAI", date(), "USD").await.price(), Some(Decimal::ONE));
        let warnings = oracle.take_warnings().await;
        assert!(matches!(&warnings[..], [Warning::FxRateUnavailable { .. }]));
    }

    #[tokio::test]
    async fn test_custom_stablecoin_set() {
        let oracle = PriceOracle::new(
            Arc::new(MockPriceProvider::default()),
            Arc::new(MockRateProvider::default()),
            fast_limiter(),
        )
        .with_stablecoins(["eurc", "USDC"]);
        assert!(oracle.is_stablecoin("EURC"));
        assert!(!oracle.is_stablecoin("DAI"));
    }

    #[tokio::test]
    async fn test_same_currency_rate_is_one() {
        let rates = Arc::new(MockRateProvider::default());
        let oracle = PriceOracle::new(
            Arc::new(MockPriceProvider::default()),
            rates.clone(),
            fast_limiter(),
        );
        assert_eq!(oracle.fx_rate("usd", "USD", date()).await, Some(Decimal::ONE));
        assert_eq!(rates.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_archive_is_consulted_and_filled() {
        use crate::store::memory::MemoryPriceArchive;

        let archive = MemoryPriceArchive::default();
        archive
            .put(&PriceKey::new("BTC", date(), "USD"), dec!(42000))
            .await;
        let prices =
            Arc::new(MockPriceProvider::default().with_price("ETH", date(), "USD", dec!(2000)));
        let oracle = PriceOracle::new(
            prices.clone(),
            Arc::new(MockRateProvider::default()),
            fast_limiter(),
        )
        .with_archive(Arc::new(archive.clone()));

        assert_eq!(
            oracle.price_at("BTC", date(), "USD").await,
            PriceQuote::Available {
                price: dec!(42000),
                source: PriceSource::Archive
            }
        );
        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);

        assert_eq!(oracle.price_at("ETH", date(), "USD").await.price(), Some(dec!(2000)));
        assert_eq!(
            archive.get(&PriceKey::new("ETH", date(), "USD")).await,
            Some(dec!(2000))
        );

        // Failures are never archived.
        assert_eq!(
            oracle.price_at("PEPE", date(), "USD").await,
            PriceQuote::Unavailable
        );
        assert!(archive.get(&PriceKey::new("PEPE", date(), "USD")).await.is_none());
    }

    #[tokio::test]
    async fn test_external_calls_respect_shared_limiter() {
        let interval = Duration::from_millis(40);
        let limiter = RateLimiter::new(interval);
        let prices = Arc::new(
            MockPriceProvider::default()
                .with_price("ETH", date(), "USD", dec!(2000))
                .with_price("BTC", date(), "USD", dec!(40000)),
        );
        // Two oracles, as two concurrent pipeline runs would have.
        let first = PriceOracle::new(
            prices.clone(),
            Arc::new(MockRateProvider::default()),
            limiter.clone(),
        );
        let second = PriceOracle::new(
            prices.clone(),
            Arc::new(MockRateProvider::default()),
            limiter,
        );

        let start = tokio::time::Instant::now();
        let (a, b, c) = tokio::join!(
            first.price_at("ETH", date(), "USD"),
            second.price_at("ETH", date(), "USD"),
            second.price_at("BTC", date(), "USD"),
        );
        assert_eq!(a.price(), Some(dec!(2000)));
        assert_eq!(b.price(), Some(dec!(2000)));
        assert_eq!(c.price(), Some(dec!(40000)));
        // Each oracle has its own cache: three external calls, two gaps.
        assert_eq!(prices.calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= interval * 2);
    }

    #[tokio::test]
    async fn test_one_market_lookup_serves_every_currency() {
        let prices = Arc::new(
            MockPriceProvider::default()
                .with_price("ETH", date(), "USD", dec!(2000))
                .with_price("ETH", date(), "CAD", dec!(2700)),
        );
        let oracle = PriceOracle::new(
            prices.clone(),
            Arc::new(MockRateProvider::default()),
            fast_limiter(),
        );

        assert_eq!(oracle.price_at("ETH", date(), "USD").await.price(), Some(dec!(2000)));
        assert_eq!(oracle.price_at("ETH", date(), "CAD").await.price(), Some(dec!(2700)));
        assert_eq!(prices.calls.load(Ordering::SeqCst), 1);

        // A currency missing from the fetched set fails without a second call.
        assert_eq!(
            oracle.price_at("ETH", date(), "EUR").await,
            PriceQuote::Unavailable
        );
        assert_eq!(prices.calls.load(Ordering::SeqCst), 1);
        let warnings = oracle.take_warnings().await;
        assert!(matches!(
            &warnings[..],
            [Warning::PriceUnavailable { currency, .. }] if currency == "EUR"
        ));
    }

    #[tokio::test]
    async fn test_unsupported_token_skips_the_limiter() {
        let interval = Duration::from_millis(500);
        let prices = Arc::new(
            MockPriceProvider::default()
                .with_price("ETH", date(), "USD", dec!(2000))
                .supporting(&["ETH"]),
        );
        let oracle = PriceOracle::new(
            prices.clone(),
            Arc::new(MockRateProvider::default()),
            RateLimiter::new(interval),
        );

        // Starts the limiter interval.
        assert_eq!(oracle.price_at("ETH", date(), "USD").await.price(), Some(dec!(2000)));

        let start = tokio::time::Instant::now();
        assert_eq!(
            oracle.price_at("PEPE", date(), "USD").await,
            PriceQuote::Unavailable
        );
        assert_eq!(
            oracle.price_at("PEPE", date(), "CAD").await,
            PriceQuote::Unavailable
        );
        assert!(start.elapsed() < interval);
        assert_eq!(prices.calls.load(Ordering::SeqCst), 1);

        let warnings = oracle.take_warnings().await;
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| matches!(
            w,
            Warning::PriceUnavailable { token, reason, .. }
                if token == "PEPE" && reason == "Unsupported token: PEPE"
        )));
    }
}
