#![deny(warnings)]

use persistence::{default_data_dir, JsonStore};

fn main() -> anyhow::Result<()> {
    let dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| default_data_dir().to_string());
    let store = JsonStore::open(&dir)?;
    store.init()?;
    // Sanity: the fresh store must load and validate
    let snap = store.load()?;
    println!(
        "Store ready at {} | discounts: {} | orders: {}",
        store.root().display(),
        snap.catalog.len(),
        snap.orders.len()
    );
    Ok(())
}
