//! Transaction data model shared by classification, valuation and export.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" | "incoming" => Ok(Direction::Incoming),
            "out" | "outgoing" => Ok(Direction::Outgoing),
            _ => Err(anyhow::anyhow!("Invalid direction: {:?}", s)),
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Incoming => write!(f, "INCOMING"),
            Direction::Outgoing => write!(f, "OUTGOING"),
        }
    }
}

/// Accounting category assigned to a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Income,
    Expense,
    Transfer,
    Unknown,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Income,
        Classification::Expense,
        Classification::Transfer,
        Classification::Unknown,
    ];

    /// Only income and expense contribute to revenue, expense and cash flow totals.
    pub fn counts_toward_totals(&self) -> bool {
        matches!(self, Classification::Income | Classification::Expense)
    }
}

impl Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Classification::Income => "INCOME",
                Classification::Expense => "EXPENSE",
                Classification::Transfer => "TRANSFER",
                Classification::Unknown => "UNKNOWN",
            }
        )
    }
}

impl FromStr for Classification {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INCOME" => Ok(Classification::Income),
            "EXPENSE" => Ok(Classification::Expense),
            "TRANSFER" => Ok(Classification::Transfer),
            "UNKNOWN" => Ok(Classification::Unknown),
            _ => Err(anyhow::anyhow!("Invalid classification: {}", s)),
        }
    }
}

/// Network fee paid by the owning wallet, denominated in `token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub token: String,
    pub amount: Decimal,
}

/// A transaction as produced by the wallet fetcher. Never modified once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    /// Confirmation instant on the ledger.
    pub timestamp: DateTime<Utc>,
    pub network: String,
    pub token: String,
    /// `None` when the source amount could not be parsed.
    pub amount: Option<Decimal>,
    pub from_address: String,
    pub to_address: String,
    /// `None` when the source direction could not be determined.
    pub direction: Option<Direction>,
    pub fee: Option<Fee>,
    pub notes: String,
}

impl RawTransaction {
    /// Calendar date (UTC) used for every fiat valuation of this transaction.
    pub fn confirmation_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// The address on the other side of the transfer, relative to the owning wallet.
    pub fn counterparty(&self) -> &str {
        match self.direction {
            Some(Direction::Incoming) => &self.from_address,
            _ => &self.to_address,
        }
    }

    /// The owning wallet's address.
    pub fn wallet_address(&self) -> &str {
        match self.direction {
            Some(Direction::Incoming) => &self.to_address,
            _ => &self.from_address,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.amount.is_none() || self.direction.is_none()
    }
}

/// Addresses controlled by the user, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct OwnedWalletSet {
    addresses: HashSet<String>,
}

impl OwnedWalletSet {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        addresses.into_iter().collect()
    }

    pub fn contains(&self, address: &str) -> bool {
        let normalized = normalize_address(address);
        !normalized.is_empty() && self.addresses.contains(&normalized)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for OwnedWalletSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        let addresses = iter
            .into_iter()
            .map(|a| normalize_address(a.as_ref()))
            .filter(|a| !a.is_empty())
            .collect();
        Self { addresses }
    }
}

fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Fiat value of an amount in one currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum FiatValue {
    Priced(Decimal),
    /// No price could be resolved; needs manual valuation.
    Unavailable,
}

impl FiatValue {
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            FiatValue::Priced(v) => Some(*v),
            FiatValue::Unavailable => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, FiatValue::Unavailable)
    }
}

/// A raw transaction with its final classification and fiat values.
///
/// Fields are read-only: the classification assigned by the pipeline cannot
/// be changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedTransaction {
    tx: RawTransaction,
    classification: Classification,
    override_applied: bool,
    fiat_values: BTreeMap<String, FiatValue>,
    fee_values: BTreeMap<String, FiatValue>,
}

impl ClassifiedTransaction {
    pub fn new(
        tx: RawTransaction,
        classification: Classification,
        override_applied: bool,
        fiat_values: BTreeMap<String, FiatValue>,
        fee_values: BTreeMap<String, FiatValue>,
    ) -> Self {
        Self {
            tx,
            classification,
            override_applied,
            fiat_values,
            fee_values,
        }
    }

    pub fn tx(&self) -> &RawTransaction {
        &self.tx
    }

    pub fn hash(&self) -> &str {
        &self.tx.hash
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn override_applied(&self) -> bool {
        self.override_applied
    }

    /// Fiat value of the transaction amount, excluding any fee.
    pub fn fiat_value(&self, currency: &str) -> FiatValue {
        self.fiat_values
            .get(currency)
            .copied()
            .unwrap_or(FiatValue::Unavailable)
    }

    /// Fiat value of the fee, or `None` when the transaction carries no fee.
    pub fn fee_value(&self, currency: &str) -> Option<FiatValue> {
        if self.tx.fee.is_none() {
            return None;
        }
        Some(
            self.fee_values
                .get(currency)
                .copied()
                .unwrap_or(FiatValue::Unavailable),
        )
    }

    pub fn fiat_values(&self) -> &BTreeMap<String, FiatValue> {
        &self.fiat_values
    }

    pub fn has_unavailable_value(&self) -> bool {
        self.fiat_values.values().any(FiatValue::is_unavailable)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("ledger row has no transaction hash")]
    MissingHash,
    #[error("ledger row {hash} has an invalid timestamp: {value:?}")]
    InvalidTimestamp { hash: String, value: String },
}

/// Ledger row as written by the wallet fetcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerRow {
    pub tx_hash: String,
    #[serde(default)]
    pub block_number: u64,
    /// `YYYY-MM-DD`, UTC.
    pub block_date: String,
    /// `HH:MM:SS`, UTC.
    #[serde(default)]
    pub block_time: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: String,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub network: String,
    pub asset: String,
    #[serde(default)]
    pub amount_decimal: String,
    #[serde(default)]
    pub tx_fee_native: String,
    #[serde(default)]
    pub tx_status: String,
    #[serde(default)]
    pub notes: String,
}

impl TryFrom<LedgerRow> for RawTransaction {
    type Error = RowError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let hash = row.tx_hash.trim().to_string();
        if hash.is_empty() {
            return Err(RowError::MissingHash);
        }

        let timestamp = parse_timestamp(&row.block_date, &row.block_time).ok_or_else(|| {
            RowError::InvalidTimestamp {
                hash: hash.clone(),
                value: format!("{} {}", row.block_date, row.block_time),
            }
        })?;

        let direction = row.direction.parse::<Direction>().ok();
        let amount = Decimal::from_str(row.amount_decimal.trim()).ok();
        let token = row.asset.trim().to_uppercase();

        // Only the sender pays the network fee.
        let fee = match direction {
            Some(Direction::Outgoing) => Decimal::from_str(row.tx_fee_native.trim())
                .ok()
                .filter(|fee| *fee > Decimal::ZERO)
                .map(|amount| Fee {
                    token: native_token(&row.network, &token),
                    amount,
                }),
            _ => None,
        };

        Ok(RawTransaction {
            hash,
            timestamp,
            network: row.network,
            token,
            amount,
            from_address: row.from_address,
            to_address: row.to_address,
            direction,
            fee,
            notes: row.notes,
        })
    }
}

fn parse_timestamp(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = if time.trim().is_empty() {
        NaiveTime::MIN
    } else {
        NaiveTime::parse_from_str(time.trim(), "%H:%M:%S").ok()?
    };
    Some(NaiveDateTime::new(date, time).and_utc())
}

/// Token the network charges fees in.
pub fn native_token(network: &str, fallback: &str) -> String {
    match network.trim().to_lowercase().as_str() {
        "ethereum" => "ETH".to_string(),
        "bitcoin" => "BTC".to_string(),
        "polygon" => "MATIC".to_string(),
        _ => fallback.to_uppercase(),
    }
}
