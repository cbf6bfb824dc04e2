pub mod coingecko;
pub mod frankfurter;

pub use coingecko::CoinGeckoProvider;
pub use frankfurter::FrankfurterProvider;
