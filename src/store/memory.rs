use crate::core::overrides::{OverrideBackend, OverrideMap};
use crate::core::price::{PriceArchive, PriceKey};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Override backend kept in memory. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryOverrideBackend {
    inner: Arc<Mutex<OverrideMap>>,
}

impl OverrideBackend for MemoryOverrideBackend {
    fn load(&self) -> Result<OverrideMap> {
        let map = self
            .inner
            .lock()
            .map_err(|_| anyhow!("Override map lock poisoned"))?;
        Ok(map.clone())
    }

    fn save(&self, overrides: &OverrideMap) -> Result<()> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| anyhow!("Override map lock poisoned"))?;
        *map = overrides.clone();
        Ok(())
    }
}

/// Price archive kept in memory, shared between runs of the same process.
#[derive(Clone, Default)]
pub struct MemoryPriceArchive {
    inner: Arc<tokio::sync::Mutex<HashMap<PriceKey, Decimal>>>,
}

#[async_trait]
impl PriceArchive for MemoryPriceArchive {
    async fn get(&self, key: &PriceKey) -> Option<Decimal> {
        let archive = self.inner.lock().await;
        let value = archive.get(key).copied();
        debug!(
            "Archive {} for key: {}",
            if value.is_some() { "HIT" } else { "MISS" },
            key
        );
        value
    }

    async fn put(&self, key: &PriceKey, price: Decimal) {
        let mut archive = self.inner.lock().await;
        debug!("Archive PUT for key: {}", key);
        archive.insert(key.clone(), price);
    }
}
