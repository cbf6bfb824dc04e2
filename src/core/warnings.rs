use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Non-fatal problems found while processing a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// Amount or direction could not be parsed; classified `UNKNOWN` unless overridden.
    MalformedTransaction { hash: String, reason: String },
    /// No price for a non-stablecoin token; its values need manual valuation.
    PriceUnavailable {
        token: String,
        date: NaiveDate,
        currency: String,
        reason: String,
    },
    FxRateUnavailable {
        from: String,
        to: String,
        date: NaiveDate,
        reason: String,
    },
    /// Ledger row dropped because it cannot be identified or dated.
    SkippedRow { reason: String },
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::MalformedTransaction { hash, reason } => {
                write!(f, "Malformed transaction {hash}: {reason}")
            }
            Warning::PriceUnavailable {
                token,
                date,
                currency,
                reason,
            } => write!(f, "No {currency} price for {token} on {date}: {reason}"),
            Warning::FxRateUnavailable {
                from,
                to,
                date,
                reason,
            } => write!(f, "No {from}/{to} rate on {date}: {reason}"),
            Warning::SkippedRow { reason } => write!(f, "Skipped ledger row: {reason}"),
        }
    }
}
