//! Runs one batch of raw transactions through classification, valuation and
//! aggregation.

use crate::core::classify::{self, Assignment};
use crate::core::oracle::PriceOracle;
use crate::core::overrides::OverrideStore;
use crate::core::transaction::{
    ClassifiedTransaction, LedgerRow, OwnedWalletSet, RawTransaction,
};
use crate::core::valuation::{self, SummaryTotals};
use crate::core::warnings::Warning;
use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub currencies: Vec<String>,
    /// Inclusive confirmation-date window.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            currencies: vec!["USD".to_string(), "CAD".to_string()],
            from: None,
            to: None,
        }
    }
}

/// Output of a pipeline run, consumed as-is by export and invoice generation.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReport {
    pub transactions: Vec<ClassifiedTransaction>,
    pub totals: SummaryTotals,
    pub warnings: Vec<Warning>,
}

/// Converts fetcher rows and processes them. Rows that cannot be identified
/// or dated are skipped with a warning.
pub async fn process_rows(
    rows: Vec<LedgerRow>,
    owned_wallets: &OwnedWalletSet,
    overrides: &OverrideStore,
    oracle: &PriceOracle,
    options: &PipelineOptions,
    update_callback: &(dyn Fn() + Send + Sync),
) -> LedgerReport {
    let mut skipped = Vec::new();
    let mut txs = Vec::with_capacity(rows.len());
    for row in rows {
        match RawTransaction::try_from(row) {
            Ok(tx) => txs.push(tx),
            Err(e) => {
                warn!("Skipping ledger row: {}", e);
                skipped.push(Warning::SkippedRow {
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut report =
        process_batch(txs, owned_wallets, overrides, oracle, options, update_callback).await;
    skipped.append(&mut report.warnings);
    report.warnings = skipped;
    report
}

/// Classifies, values and summarizes one batch.
///
/// Never fails as a whole: malformed records and missing prices end up as
/// warnings and unavailable values on the affected transactions only.
pub async fn process_batch(
    mut txs: Vec<RawTransaction>,
    owned_wallets: &OwnedWalletSet,
    overrides: &OverrideStore,
    oracle: &PriceOracle,
    options: &PipelineOptions,
    update_callback: &(dyn Fn() + Send + Sync),
) -> LedgerReport {
    txs.retain(|tx| {
        let date = tx.confirmation_date();
        options.from.is_none_or(|from| date >= from) && options.to.is_none_or(|to| date <= to)
    });
    txs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
    info!(
        "Processing {} transactions against {} owned addresses",
        txs.len(),
        owned_wallets.len()
    );

    let mut warnings = Vec::new();
    let classified: Vec<(RawTransaction, Assignment)> = txs
        .into_iter()
        .map(|tx| {
            if tx.is_malformed() {
                warnings.push(Warning::MalformedTransaction {
                    hash: tx.hash.clone(),
                    reason: malformed_reason(&tx),
                });
            }
            let assignment = classify::assign(&tx, owned_wallets, overrides);
            (tx, assignment)
        })
        .collect();

    let valuations = classified.into_iter().map(|(tx, assignment)| async move {
        let valued = valuation::valuate(tx, assignment, oracle, &options.currencies).await;
        update_callback();
        valued
    });
    let transactions = join_all(valuations).await;

    let totals = valuation::summarize(&transactions, &options.currencies);
    warnings.extend(oracle.take_warnings().await);
    if !totals.is_complete() {
        warn!(
            "{} income/expense transactions and {} expense fees need manual valuation",
            totals.unvalued.len(),
            totals.unvalued_fees.len()
        );
    }
    info!(
        "Classified {} transactions: {} income, {} expense, {} transfer, {} unknown",
        totals.counts.total,
        totals.counts.income,
        totals.counts.expense,
        totals.counts.transfer,
        totals.counts.unknown
    );

    LedgerReport {
        transactions,
        totals,
        warnings,
    }
}

fn malformed_reason(tx: &RawTransaction) -> String {
    match (tx.amount.is_none(), tx.direction.is_none()) {
        (true, true) => "unparseable amount and direction".to_string(),
        (true, false) => "unparseable amount".to_string(),
        _ => "undetermined direction".to_string(),
    }
}
