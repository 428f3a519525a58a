#![deny(warnings)]

//! Discount evaluation for checkout.
//!
//! This crate provides:
//! - Eligibility checks for a discount against a cart, a customer and history
//! - Per-type amount formulas (percentage, fixed, free shipping, buy X get Y)
//! - The stacking pass that orders candidates by priority and honours
//!   non-combinable discounts
//! - Redemption, which moves usage counters once an order is placed

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use shop_core::Customer;

pub mod amount;
pub mod eligibility;
pub mod engine;
pub mod history;

pub use amount::{discount_amount, free_units_value, round_money};
pub use eligibility::{check_eligibility, Ineligible};
pub use engine::{redeem, AppliedDiscount, CodeValidation, DiscountEngine, Quote, RedeemError, RejectedCode};
pub use history::{InMemoryHistory, ShopHistory};

/// Per-request inputs that are not part of the cart itself.
#[derive(Clone, Copy, Debug)]
pub struct PricingContext<'a> {
    /// Evaluation time for validity windows.
    pub now: NaiveDateTime,
    /// Shipping cost of the current session, taken off by free shipping.
    pub shipping_cost: Decimal,
    /// Signed-in customer, or None for a guest checkout.
    pub customer: Option<&'a Customer>,
}

impl<'a> PricingContext<'a> {
    /// A guest checkout at `now` with no shipping cost.
    pub fn guest(now: NaiveDateTime) -> Self {
        Self {
            now,
            shipping_cost: Decimal::ZERO,
            customer: None,
        }
    }

    /// Price for a signed-in customer.
    pub fn with_customer(mut self, customer: &'a Customer) -> Self {
        self.customer = Some(customer);
        self
    }

    /// Shipping cost of the session; what free shipping takes off.
    pub fn with_shipping(mut self, shipping_cost: Decimal) -> Self {
        self.shipping_cost = shipping_cost;
        self
    }
}
