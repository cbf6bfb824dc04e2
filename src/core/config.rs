use crate::core::oracle::DEFAULT_STABLECOINS;
use crate::core::rate_limit::DEFAULT_MIN_INTERVAL;
use crate::core::transaction::OwnedWalletSet;
use crate::providers::{coingecko, frankfurter};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WalletConfig {
    pub address: String,
    pub name: Option<String>,
    pub network: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoinGeckoProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FxProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub coingecko: Option<CoinGeckoProviderConfig>,
    pub fx: Option<FxProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            coingecko: Some(CoinGeckoProviderConfig {
                base_url: coingecko::DEFAULT_BASE_URL.to_string(),
                api_key: None,
            }),
            fx: Some(FxProviderConfig {
                base_url: frankfurter::DEFAULT_BASE_URL.to_string(),
            }),
        }
    }
}

fn default_currencies() -> Vec<String> {
    vec!["USD".to_string(), "CAD".to_string()]
}

fn default_rate_limit_ms() -> u64 {
    DEFAULT_MIN_INTERVAL.as_millis() as u64
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub wallets: Vec<WalletConfig>,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
    pub stablecoins: Option<Vec<String>>,
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    #[serde(default)]
    pub providers: ProvidersConfig,
    pub data_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "chainledger", "chainledger")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "chainledger", "chainledger")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn owned_wallets(&self) -> OwnedWalletSet {
        self.wallets.iter().map(|w| w.address.as_str()).collect()
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn stablecoins(&self) -> Vec<String> {
        match &self.stablecoins {
            Some(coins) => coins.clone(),
            None => DEFAULT_STABLECOINS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn coingecko_base_url(&self) -> &str {
        self.providers
            .coingecko
            .as_ref()
            .map_or(coingecko::DEFAULT_BASE_URL, |p| &p.base_url)
    }

    pub fn coingecko_api_key(&self) -> Option<String> {
        self.providers
            .coingecko
            .as_ref()
            .and_then(|p| p.api_key.clone())
    }

    pub fn fx_base_url(&self) -> &str {
        self.providers
            .fx
            .as_ref()
            .map_or(frankfurter::DEFAULT_BASE_URL, |p| &p.base_url)
    }
}
