pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::oracle::PriceOracle;
use crate::core::overrides::OverrideStore;
use crate::core::pipeline::PipelineOptions;
use crate::core::rate_limit::RateLimiter;
use crate::store::{DiskPriceArchive, JsonOverrideFile};
use anyhow::Result;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const OVERRIDES_FILE: &str = "overrides.json";
pub const PRICE_ARCHIVE_DIR: &str = "prices";

pub enum AppCommand {
    Report {
        transactions: PathBuf,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        json: bool,
    },
    ListOverrides,
    SetOverride {
        hash: String,
        classification: String,
        note: Option<String>,
    },
    RemoveOverride {
        hash: String,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("Chain ledger starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_path = config.default_data_path()?;
    let mut overrides = open_overrides(&data_path)?;

    match command {
        AppCommand::Report {
            transactions,
            from,
            to,
            json,
        } => {
            if let (Some(from), Some(to)) = (from, to)
                && from > to
            {
                anyhow::bail!("Invalid date window: {from} is after {to}");
            }
            let limiter = RateLimiter::new(config.rate_limit());
            let oracle = build_oracle(&config, Some(&data_path), limiter);
            let options = PipelineOptions {
                currencies: normalized_currencies(&config),
                from,
                to,
            };
            cli::report::run(
                &transactions,
                &config.owned_wallets(),
                &overrides,
                &oracle,
                &options,
                json,
            )
            .await?;
            Ok(())
        }
        AppCommand::ListOverrides => cli::overrides::list(&overrides),
        AppCommand::SetOverride {
            hash,
            classification,
            note,
        } => cli::overrides::set(&mut overrides, &hash, &classification, note),
        AppCommand::RemoveOverride { hash } => cli::overrides::remove(&mut overrides, &hash),
    }
}

pub fn open_overrides(data_path: &Path) -> Result<OverrideStore> {
    let store = OverrideStore::open(JsonOverrideFile::new(data_path.join(OVERRIDES_FILE)))?;
    Ok(store)
}

/// Wires the configured providers behind one oracle.
///
/// Every oracle that may run at the same time must be given a clone of the
/// same `limiter`. The persisted archive is optional: if it cannot be
/// opened the run continues with the run cache only.
pub fn build_oracle(
    config: &AppConfig,
    data_path: Option<&Path>,
    limiter: RateLimiter,
) -> PriceOracle {
    let prices = providers::CoinGeckoProvider::new(
        config.coingecko_base_url(),
        config.coingecko_api_key(),
    );
    let rates = providers::FrankfurterProvider::new(config.fx_base_url());

    let oracle = PriceOracle::new(Arc::new(prices), Arc::new(rates), limiter)
        .with_stablecoins(config.stablecoins());

    let Some(data_path) = data_path else {
        return oracle;
    };
    match DiskPriceArchive::open(&data_path.join(PRICE_ARCHIVE_DIR)) {
        Ok(archive) => oracle.with_archive(Arc::new(archive)),
        Err(e) => {
            warn!("Price archive unavailable, continuing without it: {e}");
            oracle
        }
    }
}

fn normalized_currencies(config: &AppConfig) -> Vec<String> {
    let mut currencies: Vec<String> = Vec::new();
    for currency in &config.currencies {
        let currency = currency.trim().to_uppercase();
        if !currency.is_empty() && !currencies.contains(&currency) {
            currencies.push(currency);
        }
    }
    currencies
}
