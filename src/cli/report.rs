use super::ui;
use crate::core::oracle::PriceOracle;
use crate::core::overrides::OverrideStore;
use crate::core::pipeline::{self, LedgerReport, PipelineOptions};
use crate::core::transaction::{LedgerRow, OwnedWalletSet};
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment, Table};
use rust_decimal::Decimal;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reads the JSON array of ledger rows written by the wallet fetcher.
pub fn load_ledger_rows<P: AsRef<Path>>(path: P) -> Result<Vec<LedgerRow>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read transactions file: {}", path.display()))?;
    let rows: Vec<LedgerRow> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse transactions file: {}", path.display()))?;
    debug!("Loaded {} ledger rows from {}", rows.len(), path.display());
    Ok(rows)
}

fn short_hash(hash: &str) -> String {
    if hash.chars().count() <= 14 {
        return hash.to_string();
    }
    let head: String = hash.chars().take(8).collect();
    let skip = hash.chars().count() - 4;
    let tail: String = hash.chars().skip(skip).collect();
    format!("{head}…{tail}")
}

impl LedgerReport {
    pub fn transactions_table(&self, currencies: &[String]) -> Table {
        let mut table = ui::new_styled_table();

        let mut header = vec![
            ui::header_cell("Date"),
            ui::header_cell("Hash"),
            ui::header_cell("Token"),
            ui::header_cell("Amount"),
            ui::header_cell("Class"),
        ];
        for currency in currencies {
            header.push(ui::header_cell(&format!("Value ({currency})")));
            header.push(ui::header_cell(&format!("Fee ({currency})")));
        }
        table.set_header(header);

        for ctx in &self.transactions {
            let tx = ctx.tx();
            let mut row = vec![
                Cell::new(tx.timestamp.format("%Y-%m-%d %H:%M").to_string()),
                Cell::new(short_hash(ctx.hash())),
                Cell::new(&tx.token),
                ui::format_optional_cell(tx.amount, |a| a.normalize().to_string()),
                ui::classification_cell(ctx.classification(), ctx.override_applied()),
            ];
            for currency in currencies {
                row.push(ui::fiat_cell(ctx.fiat_value(currency)));
                row.push(match ctx.fee_value(currency) {
                    Some(fee) => ui::fiat_cell(fee),
                    None => Cell::new("-").set_alignment(CellAlignment::Right),
                });
            }
            table.add_row(row);
        }
        table
    }

    pub fn display_as_table(&self, currencies: &[String]) -> String {
        let table = self.transactions_table(currencies);
        let mut output = format!(
            "Ledger: {}\n\n",
            ui::style_text(
                &format!("{} transactions", self.transactions.len()),
                ui::StyleType::Title
            )
        );
        output.push_str(&table.to_string());
        output.push_str("\n\n");
        output.push_str(&self.display_totals(currencies));
        output
    }

    pub fn display_totals(&self, currencies: &[String]) -> String {
        let totals = &self.totals;
        let mut table = ui::new_styled_table();
        let mut header = vec![ui::header_cell("Total")];
        header.extend(currencies.iter().map(|c| ui::header_cell(c)));
        table.set_header(header);

        let lines = [
            ("Gross revenue", &totals.gross_revenue),
            ("Total expenses", &totals.total_expenses),
            ("Net cash flow", &totals.net_cash_flow),
            ("Gas fees", &totals.gas_fees),
        ];
        for (label, per_currency) in lines {
            let mut row = vec![Cell::new(label)];
            row.extend(currencies.iter().map(|c| {
                let value = per_currency.get(c).copied().unwrap_or(Decimal::ZERO);
                Cell::new(ui::format_money(value)).set_alignment(CellAlignment::Right)
            }));
            table.add_row(row);
        }

        let counts = &totals.counts;
        let mut output = table.to_string();
        output.push_str(&format!(
            "\n\n{} {} income, {} expense, {} transfer, {} unknown ({} overridden)",
            ui::style_text("Transactions:", ui::StyleType::TotalLabel),
            counts.income,
            counts.expense,
            counts.transfer,
            counts.unknown,
            counts.overridden
        ));

        if !totals.unvalued.is_empty() {
            output.push_str(&format!(
                "\n{} {}",
                ui::style_text("Needs manual valuation:", ui::StyleType::Error),
                totals.unvalued.join(", ")
            ));
        }
        if !totals.unvalued_fees.is_empty() {
            output.push_str(&format!(
                "\n{} {}",
                ui::style_text("Fees needing manual valuation:", ui::StyleType::Error),
                totals.unvalued_fees.join(", ")
            ));
        }
        output
    }

    pub fn display_warnings(&self) -> String {
        let mut output = ui::style_text(
            &format!("Warnings ({})", self.warnings.len()),
            ui::StyleType::Warning,
        );
        for warning in &self.warnings {
            output.push_str(&format!(
                "\n  {}",
                ui::style_text(&warning.to_string(), ui::StyleType::Subtle)
            ));
        }
        output
    }
}

/// Runs the pipeline over the rows in `transactions_path` and prints the result.
pub async fn run(
    transactions_path: &Path,
    owned_wallets: &OwnedWalletSet,
    overrides: &OverrideStore,
    oracle: &PriceOracle,
    options: &PipelineOptions,
    as_json: bool,
) -> Result<LedgerReport> {
    let rows = load_ledger_rows(transactions_path)?;

    let pb = ui::new_progress_bar(rows.len() as u64, true);
    pb.set_message("Valuing transactions...");
    let pb_clone = pb.clone();
    let update_callback = move || pb_clone.inc(1);
    let report = pipeline::process_rows(
        rows,
        owned_wallets,
        overrides,
        oracle,
        options,
        &update_callback,
    )
    .await;
    pb.finish_and_clear();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    println!("{}", report.display_as_table(&options.currencies));
    if !report.warnings.is_empty() {
        ui::print_separator();
        println!("{}", report.display_warnings());
    }
    Ok(report)
}
