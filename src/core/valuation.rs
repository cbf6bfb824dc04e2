//! Fiat valuation of classified transactions and the summary totals built on it.
use crate::core::classify::{Assignment, ClassificationStats};
use crate::core::oracle::PriceOracle;
use crate::core::transaction::{
    Classification, ClassifiedTransaction, FiatValue, RawTransaction,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Attaches per-currency fiat values to a classified transaction.
///
/// Prices are taken at the transaction's confirmation date. The fee, when
/// present, is valued the same way but kept apart from the amount's value.
pub async fn valuate(
    tx: RawTransaction,
    assignment: impl Into<Assignment>,
    oracle: &PriceOracle,
    currencies: &[String],
) -> ClassifiedTransaction {
    let assignment = assignment.into();
    let date = tx.confirmation_date();

    let mut fiat_values = BTreeMap::new();
    let mut fee_values = BTreeMap::new();
    for currency in currencies {
        let value = match tx.amount {
            Some(amount) => match oracle.price_at(&tx.token, date, currency).await.price() {
                Some(price) => FiatValue::Priced(amount * price),
                None => FiatValue::Unavailable,
            },
            None => FiatValue::Unavailable,
        };
        fiat_values.insert(currency.clone(), value);

        if let Some(fee) = &tx.fee {
            let fee_value = match oracle.price_at(&fee.token, date, currency).await.price() {
                Some(price) => FiatValue::Priced(fee.amount * price),
                None => FiatValue::Unavailable,
            };
            fee_values.insert(currency.clone(), fee_value);
        }
    }

    debug!(
        "Valued {} ({}) on {}: {:?}",
        tx.hash, assignment.classification, date, fiat_values
    );
    ClassifiedTransaction::new(
        tx,
        assignment.classification,
        assignment.override_applied,
        fiat_values,
        fee_values,
    )
}

/// Revenue, expense and cash flow totals per currency.
///
/// Only `INCOME` and `EXPENSE` transactions contribute. Unavailable values
/// contribute nothing and their hashes are listed in `unvalued`, or in
/// `unvalued_fees` when only the expense fee could not be priced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTotals {
    pub gross_revenue: BTreeMap<String, Decimal>,
    pub total_expenses: BTreeMap<String, Decimal>,
    pub net_cash_flow: BTreeMap<String, Decimal>,
    /// Fees paid on expense transactions. Not part of `total_expenses`.
    pub gas_fees: BTreeMap<String, Decimal>,
    pub counts: ClassificationStats,
    pub unvalued: Vec<String>,
    pub unvalued_fees: Vec<String>,
}

impl SummaryTotals {
    pub fn gross_revenue(&self, currency: &str) -> Decimal {
        self.gross_revenue.get(currency).copied().unwrap_or_default()
    }

    pub fn total_expenses(&self, currency: &str) -> Decimal {
        self.total_expenses.get(currency).copied().unwrap_or_default()
    }

    pub fn net_cash_flow(&self, currency: &str) -> Decimal {
        self.net_cash_flow.get(currency).copied().unwrap_or_default()
    }

    pub fn gas_fees(&self, currency: &str) -> Decimal {
        self.gas_fees.get(currency).copied().unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.unvalued.is_empty() && self.unvalued_fees.is_empty()
    }
}

pub fn summarize(txs: &[ClassifiedTransaction], currencies: &[String]) -> SummaryTotals {
    let mut totals = SummaryTotals::default();
    for currency in currencies {
        totals.gross_revenue.insert(currency.clone(), Decimal::ZERO);
        totals.total_expenses.insert(currency.clone(), Decimal::ZERO);
        totals.gas_fees.insert(currency.clone(), Decimal::ZERO);
    }

    for tx in txs {
        totals.counts.record(Assignment {
            classification: tx.classification(),
            override_applied: tx.override_applied(),
        });

        let bucket = match tx.classification() {
            Classification::Income => &mut totals.gross_revenue,
            Classification::Expense => &mut totals.total_expenses,
            Classification::Transfer | Classification::Unknown => continue,
        };

        let mut unvalued = false;
        for currency in currencies {
            match tx.fiat_value(currency).amount() {
                Some(value) => *bucket.entry(currency.clone()).or_default() += value,
                None => unvalued = true,
            }
        }
        if unvalued {
            totals.unvalued.push(tx.hash().to_string());
        }

        if tx.classification() == Classification::Expense {
            let mut fee_unvalued = false;
            for currency in currencies {
                match tx.fee_value(currency).map(|v| v.amount()) {
                    Some(Some(fee)) => *totals.gas_fees.entry(currency.clone()).or_default() += fee,
                    Some(None) => fee_unvalued = true,
                    None => {}
                }
            }
            if fee_unvalued {
                totals.unvalued_fees.push(tx.hash().to_string());
            }
        }
    }

    for currency in currencies {
        let net = totals.gross_revenue(currency) - totals.total_expenses(currency);
        totals.net_cash_flow.insert(currency.clone(), net);
    }
    totals
}
