//! Customer order and redemption history used by eligibility checks.

use shop_core::{CustomerId, DiscountCode, DiscountUsage, OrderRecord};
use std::collections::BTreeMap;

/// Read access to what a customer has done before this checkout.
pub trait ShopHistory {
    /// Number of orders previously placed by the customer.
    fn prior_orders(&self, customer: CustomerId) -> u32;
    /// Number of times the customer has redeemed `code`.
    fn customer_uses(&self, code: &DiscountCode, customer: CustomerId) -> u32;
}

impl<T: ShopHistory + ?Sized> ShopHistory for &T {
    fn prior_orders(&self, customer: CustomerId) -> u32 {
        (**self).prior_orders(customer)
    }

    fn customer_uses(&self, code: &DiscountCode, customer: CustomerId) -> u32 {
        (**self).customer_uses(code, customer)
    }
}

/// Counter-based history, built from records or by hand in tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryHistory {
    orders: BTreeMap<CustomerId, u32>,
    uses: BTreeMap<(DiscountCode, CustomerId), u32>,
}

impl InMemoryHistory {
    /// Empty history: every customer is new.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate stored rows. Guest rows carry no customer and are skipped.
    pub fn from_records(orders: &[OrderRecord], usage: &[DiscountUsage]) -> Self {
        let mut history = Self::new();
        for customer in orders.iter().filter_map(|o| o.customer_id) {
            history.record_order(customer);
        }
        for u in usage {
            if let Some(customer) = u.customer_id {
                history.record_use(u.code.clone(), customer);
            }
        }
        history
    }

    /// Set the prior order count of `customer`.
    pub fn with_orders(mut self, customer: CustomerId, count: u32) -> Self {
        self.orders.insert(customer, count);
        self
    }

    pub fn record_order(&mut self, customer: CustomerId) {
        *self.orders.entry(customer).or_insert(0) += 1;
    }

    /// Count one use of `code` by `customer`.
    pub fn record_use(&mut self, code: DiscountCode, customer: CustomerId) {
        *self.uses.entry((code, customer)).or_insert(0) += 1;
    }
}

impl ShopHistory for InMemoryHistory {
    fn prior_orders(&self, customer: CustomerId) -> u32 {
        self.orders.get(&customer).copied().unwrap_or(0)
    }

    fn customer_uses(&self, code: &DiscountCode, customer: CustomerId) -> u32 {
        self.uses
            .get(&(code.clone(), customer))
            .copied()
            .unwrap_or(0)
    }
}
