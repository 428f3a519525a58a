#![deny(warnings)]

//! Persistence layer: JSON flat files for discounts, customers, orders and
//! discount usage.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shop_core::{
    Customer, CustomerId, DiscountCatalog, DiscountCode, DiscountUsage, OrderId, OrderRecord,
};
use shop_pricing::{InMemoryHistory, ShopHistory};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DISCOUNTS_FILE: &str = "discounts.json";
pub const CUSTOMERS_FILE: &str = "customers.json";
pub const ORDERS_FILE: &str = "orders.json";
pub const USAGE_FILE: &str = "discount_usage.json";

/// Returns the default data directory used by the CLI.
pub fn default_data_dir() -> &'static str {
    "./data"
}

/// Everything the store holds, loaded in one go.
#[derive(Clone, Debug, Default)]
pub struct StoreSnapshot {
    /// Contents of `discounts.json`, validated on load.
    pub catalog: DiscountCatalog,
    pub customers: Vec<Customer>,
    /// Order history; only used for counting prior orders.
    pub orders: Vec<OrderRecord>,
    /// One row per redeemed discount per order.
    pub usage: Vec<DiscountUsage>,
    history: InMemoryHistory,
}

impl StoreSnapshot {
    /// Look up a customer by id.
    pub fn customer(&self, id: CustomerId) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == id)
    }

    /// One past the highest order id on file, starting at 1.
    pub fn next_order_id(&self) -> OrderId {
        OrderId(self.orders.iter().map(|o| o.id.0).max().unwrap_or(0) + 1)
    }
}

impl ShopHistory for StoreSnapshot {
    fn prior_orders(&self, customer: CustomerId) -> u32 {
        self.history.prior_orders(customer)
    }

    fn customer_uses(&self, code: &DiscountCode, customer: CustomerId) -> u32 {
        self.history.customer_uses(code, customer)
    }
}

/// A directory of JSON files. Missing files read as empty lists.
#[derive(Clone, Debug)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Use `root` as the data directory, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating data dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write empty lists for any file that does not exist yet.
    pub fn init(&self) -> Result<()> {
        for name in [DISCOUNTS_FILE, CUSTOMERS_FILE, ORDERS_FILE, USAGE_FILE] {
            let path = self.root.join(name);
            if !path.exists() {
                self.write_json(name, &Vec::<serde_json::Value>::new())?;
                info!(path = %path.display(), "created empty store file");
            }
        }
        Ok(())
    }

    /// Load and validate every file.
    pub fn load(&self) -> Result<StoreSnapshot> {
        let catalog: DiscountCatalog = self
            .read_json::<Option<DiscountCatalog>>(DISCOUNTS_FILE)?
            .unwrap_or_default();
        catalog
            .validate()
            .with_context(|| format!("invalid {}", DISCOUNTS_FILE))?;
        let customers: Vec<Customer> = self.read_list(CUSTOMERS_FILE)?;
        let orders: Vec<OrderRecord> = self.read_list(ORDERS_FILE)?;
        let usage: Vec<DiscountUsage> = self.read_list(USAGE_FILE)?;
        let history = InMemoryHistory::from_records(&orders, &usage);
        debug!(
            discounts = catalog.len(),
            customers = customers.len(),
            orders = orders.len(),
            usage = usage.len(),
            "store loaded"
        );
        Ok(StoreSnapshot {
            catalog,
            customers,
            orders,
            usage,
            history,
        })
    }

    /// Validate and atomically replace `discounts.json`.
    pub fn save_catalog(&self, catalog: &DiscountCatalog) -> Result<()> {
        catalog.validate().context("refusing to save invalid catalog")?;
        self.write_json(DISCOUNTS_FILE, catalog)
    }

    /// Append an order and its discount usage, and persist the catalog whose
    /// counters were moved by `shop_pricing::redeem`.
    ///
    /// All three files are staged before any is replaced, and the catalog is
    /// replaced last, so a failed write never leaves incremented counters
    /// without their order row. `snapshot` is only updated once the files are
    /// in place.
    pub fn record_redemption(
        &self,
        snapshot: &mut StoreSnapshot,
        order: OrderRecord,
        usages: Vec<DiscountUsage>,
    ) -> Result<()> {
        snapshot
            .catalog
            .validate()
            .context("refusing to save invalid catalog")?;
        let mut orders = snapshot.orders.clone();
        orders.push(order.clone());
        let mut usage = snapshot.usage.clone();
        usage.extend(usages.iter().cloned());

        let mut staged: Vec<(&str, PathBuf)> = Vec::with_capacity(3);
        let written = (|| -> Result<()> {
            staged.push((ORDERS_FILE, self.stage_json(ORDERS_FILE, &orders)?));
            staged.push((USAGE_FILE, self.stage_json(USAGE_FILE, &usage)?));
            staged.push((
                DISCOUNTS_FILE,
                self.stage_json(DISCOUNTS_FILE, &snapshot.catalog)?,
            ));
            for (name, tmp) in &staged {
                let path = self.root.join(name);
                fs::rename(tmp, &path)
                    .with_context(|| format!("replacing {}", path.display()))?;
            }
            Ok(())
        })();
        if let Err(e) = written {
            for (_, tmp) in &staged {
                let _ = fs::remove_file(tmp);
            }
            return Err(e);
        }

        if let Some(customer) = order.customer_id {
            snapshot.history.record_order(customer);
        }
        for u in &usages {
            if let Some(customer) = u.customer_id {
                snapshot.history.record_use(u.code.clone(), customer);
            }
        }
        info!(order = order.id.0, discounts = usages.len(), "order recorded");
        snapshot.orders = orders;
        snapshot.usage = usage;
        Ok(())
    }

    fn read_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        Ok(self.read_json::<Option<Vec<T>>>(name)?.unwrap_or_default())
    }

    fn read_json<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T> {
        let path = self.root.join(name);
        if !path.exists() {
            return Ok(T::default());
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let tmp = self.stage_json(name, value)?;
        let path = self.root.join(name);
        fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    /// Write `value` next to `name` as a temp file, returning its path.
    fn stage_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let tmp = self.root.join(format!(".{name}.tmp"));
        let text = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, text).with_context(|| format!("writing {}", tmp.display()))?;
        Ok(tmp)
    }
}
