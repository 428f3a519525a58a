//! `shop.yaml` settings.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "shop.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    /// Directory holding the JSON store.
    pub data_dir: PathBuf,
    /// Shipping cost used when `--shipping` is not given.
    pub shipping_cost: Decimal,
    /// Prefix for printed amounts.
    pub currency: String,
    /// Default tracing filter, overridden by `RUST_LOG`.
    pub log: String,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(persistence::default_data_dir()),
            shipping_cost: Decimal::ZERO,
            currency: "€".to_string(),
            log: "info".to_string(),
        }
    }
}

impl ShopConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: ShopConfig = serde_yaml::from_str(text).context("parsing config")?;
        if cfg.shipping_cost < Decimal::ZERO {
            anyhow::bail!("shipping_cost must be >= 0, got {}", cfg.shipping_cost);
        }
        Ok(cfg)
    }

    /// Load an explicit config file, or `shop.yaml` if present, or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn money(&self, amount: Decimal) -> String {
        format!("{}{:.2}", self.currency, amount)
    }
}
