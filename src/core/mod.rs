//! Core ledger logic: data model, classification, pricing and aggregation

pub mod cache;
pub mod classify;
pub mod config;
pub mod log;
pub mod oracle;
pub mod overrides;
pub mod pipeline;
pub mod price;
pub mod rate_limit;
pub mod transaction;
pub mod valuation;
pub mod warnings;

// Re-export main types for cleaner imports
pub use classify::{Assignment, ClassificationStats};
pub use oracle::PriceOracle;
pub use overrides::{OverrideBackend, OverrideError, OverrideStore};
pub use price::{CurrencyRateProvider, PriceArchive, PriceProvider, PriceQuote};
pub use transaction::{
    Classification, ClassifiedTransaction, FiatValue, LedgerRow, OwnedWalletSet, RawTransaction,
};
pub use valuation::SummaryTotals;
pub use warnings::Warning;
