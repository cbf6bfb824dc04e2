use crate::core::price::{PriceArchive, PriceKey};
use anyhow::Result;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

const PARTITION: &str = "prices";

/// Price archive persisted in a fjall keyspace, kept across runs.
///
/// Historical prices do not change, so entries never expire.
pub struct DiskPriceArchive {
    keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskPriceArchive {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let keyspace = fjall::Config::new(path).open()?;
        let partition = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        debug!("Opened price archive at {}", path.display());
        Ok(Self {
            keyspace,
            partition,
        })
    }

    fn storage_key(key: &PriceKey) -> String {
        format!("{}|{}|{}", key.token, key.date, key.currency)
    }

    fn read(&self, key: &PriceKey) -> Result<Option<Decimal>> {
        let Some(raw) = self.partition.get(Self::storage_key(key))? else {
            return Ok(None);
        };
        let text = std::str::from_utf8(&raw)?;
        Ok(Some(Decimal::from_str(text)?))
    }

    fn write(&self, key: &PriceKey, price: Decimal) -> Result<()> {
        self.partition
            .insert(Self::storage_key(key), price.to_string())?;
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

#[async_trait]
impl PriceArchive for DiskPriceArchive {
    async fn get(&self, key: &PriceKey) -> Option<Decimal> {
        match self.read(key) {
            Ok(value) => {
                debug!(
                    "Archive {} for key: {}",
                    if value.is_some() { "HIT" } else { "MISS" },
                    key
                );
                value
            }
            Err(e) => {
                debug!("DiskPriceArchive get error: {}", e);
                None
            }
        }
    }

    async fn put(&self, key: &PriceKey, price: Decimal) {
        match self.write(key, price) {
            Ok(()) => debug!("Archive PUT for key: {}", key),
            Err(e) => debug!("DiskPriceArchive put error: {}", e),
        }
    }
}
