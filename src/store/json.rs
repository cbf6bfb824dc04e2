use crate::core::overrides::{OverrideBackend, OverrideMap};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Override backend persisted as a pretty-printed JSON object keyed by
/// transaction hash. A missing file reads as an empty map.
pub struct JsonOverrideFile {
    path: PathBuf,
}

impl JsonOverrideFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OverrideBackend for JsonOverrideFile {
    fn load(&self) -> Result<OverrideMap> {
        if !self.path.exists() {
            debug!("No override file at {}", self.path.display());
            return Ok(OverrideMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read override file: {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(OverrideMap::new());
        }

        let overrides: OverrideMap = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse override file: {}", self.path.display()))?;
        debug!(
            "Loaded {} overrides from {}",
            overrides.len(),
            self.path.display()
        );
        Ok(overrides)
    }

    fn save(&self, overrides: &OverrideMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(overrides)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write override file: {}", self.path.display()))?;
        debug!(
            "Saved {} overrides to {}",
            overrides.len(),
            self.path.display()
        );
        Ok(())
    }
}
