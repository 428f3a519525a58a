//! Whether a discount may be applied to a given checkout.

use crate::{PricingContext, ShopHistory};
use rust_decimal::Decimal;
use shop_core::{Cart, CustomerEligibility, Discount};
use thiserror::Error;

/// Why a discount cannot be applied. Messages are customer-facing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Ineligible {
    /// No discount with this code exists.
    #[error("invalid discount code")]
    UnknownCode,
    #[error("this discount is not active")]
    Inactive,
    /// `now` is before `start_date`.
    #[error("this discount is not valid yet")]
    NotStarted,
    /// `now` is after `end_date`.
    #[error("this discount has expired")]
    Expired,
    /// `used_count` reached `max_uses`.
    #[error("this discount has reached its usage limit")]
    UsageLimit,
    /// The current customer reached `max_uses_per_customer`.
    #[error("you have already used this discount the maximum number of times")]
    CustomerUsageLimit,
    /// Subtotal under `min_purchase`, which is carried.
    #[error("minimum purchase of {0} required")]
    BelowMinimum(Decimal),
    /// Subtotal over `max_purchase`, which is carried.
    #[error("maximum purchase of {0} exceeded")]
    AboveMaximum(Decimal),
    /// Total cart quantity under `min_items`.
    #[error("at least {0} items required")]
    TooFewItems(u32),
    /// The customer segment predicate failed.
    #[error("this discount is not available for your account")]
    CustomerNotEligible,
    #[error("this discount is only valid on your first purchase")]
    NotFirstPurchase,
    /// No cart line falls inside `applies_to`.
    #[error("this discount does not apply to the items in your cart")]
    NoMatchingItems,
    /// Eligible on its own, but a non-combinable discount (the code carried
    /// here) was accepted first.
    #[error("this discount cannot be combined with {0}")]
    NotCombinable(String),
}

/// Run every eligibility rule; the first failing rule is reported.
///
/// Guests have no order history: they count as new customers and pass
/// `first_purchase_only`, but never match `returning`, `registered` or `vip`.
pub fn check_eligibility<H: ShopHistory + ?Sized>(
    discount: &Discount,
    cart: &Cart,
    ctx: &PricingContext<'_>,
    history: &H,
) -> Result<(), Ineligible> {
    if !discount.active {
        return Err(Ineligible::Inactive);
    }
    if discount.start_date.map(|s| ctx.now < s).unwrap_or(false) {
        return Err(Ineligible::NotStarted);
    }
    if discount.end_date.map(|e| ctx.now > e).unwrap_or(false) {
        return Err(Ineligible::Expired);
    }
    if discount.is_exhausted() {
        return Err(Ineligible::UsageLimit);
    }
    if discount.max_uses_per_customer > 0 {
        if let Some(customer) = ctx.customer {
            if history.customer_uses(&discount.code, customer.id) >= discount.max_uses_per_customer
            {
                return Err(Ineligible::CustomerUsageLimit);
            }
        }
    }

    let subtotal = cart.subtotal();
    if discount.min_purchase > Decimal::ZERO && subtotal < discount.min_purchase {
        return Err(Ineligible::BelowMinimum(discount.min_purchase));
    }
    if discount.max_purchase > Decimal::ZERO && subtotal > discount.max_purchase {
        return Err(Ineligible::AboveMaximum(discount.max_purchase));
    }
    if cart.item_count() < u64::from(discount.min_items) {
        return Err(Ineligible::TooFewItems(discount.min_items));
    }

    let prior_orders = ctx
        .customer
        .map(|c| history.prior_orders(c.id))
        .unwrap_or(0);
    let customer_ok = match discount.customer_eligibility {
        CustomerEligibility::All => true,
        CustomerEligibility::New => prior_orders == 0,
        CustomerEligibility::Returning => ctx.customer.is_some() && prior_orders > 0,
        CustomerEligibility::Registered => ctx.customer.is_some(),
        CustomerEligibility::Guests => ctx.customer.is_none(),
        CustomerEligibility::Vip => ctx.customer.map(|c| c.is_vip()).unwrap_or(false),
    };
    if !customer_ok {
        return Err(Ineligible::CustomerNotEligible);
    }
    if discount.first_purchase_only && prior_orders > 0 {
        return Err(Ineligible::NotFirstPurchase);
    }

    if !cart.items.iter().any(|i| discount.applies_to.matches(i)) {
        return Err(Ineligible::NoMatchingItems);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryHistory;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;
    use shop_core::{
        AppliesTo, CartItem, CategoryId, Customer, CustomerId, DiscountCode, DiscountKind,
        ProductId,
    };

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn cart(lines: &[(u64, i64, u32)]) -> Cart {
        Cart::new(
            lines
                .iter()
                .map(|&(p, price, q)| CartItem {
                    product_id: ProductId(p),
                    name: String::new(),
                    category_id: Some(CategoryId(p * 10)),
                    unit_price: Decimal::new(price, 0),
                    quantity: q,
                })
                .collect(),
        )
    }

    fn fixed(code: &str) -> Discount {
        Discount::new(
            DiscountCode::parse(code).unwrap(),
            DiscountKind::Fixed {
                value: Decimal::new(5, 0),
            },
        )
    }

    fn customer(id: u64, tier: Option<&str>) -> Customer {
        Customer {
            id: CustomerId(id),
            email: format!("c{id}@example.com"),
            tier: tier.map(str::to_string),
        }
    }

    #[test]
    fn inactive_and_window() {
        let c = cart(&[(1, 10, 1)]);
        let h = InMemoryHistory::new();
        let ctx = PricingContext::guest(at(2024, 6, 15));
        let mut d = fixed("WINDOW");
        d.active = false;
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Err(Ineligible::Inactive));
        d.active = true;
        d.start_date = Some(at(2024, 7, 1));
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Err(Ineligible::NotStarted));
        d.start_date = Some(at(2024, 6, 1));
        d.end_date = Some(at(2024, 6, 10));
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Err(Ineligible::Expired));
        d.end_date = Some(at(2024, 6, 15));
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Ok(()));
        // both bounds inclusive
        d.start_date = Some(at(2024, 6, 15));
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Ok(()));
        d.end_date = None;
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Ok(()));
    }

    #[test]
    fn min_purchase_boundary() {
        let h = InMemoryHistory::new();
        let ctx = PricingContext::guest(at(2024, 1, 1));
        let mut d = fixed("MIN50");
        d.min_purchase = Decimal::new(50, 0);
        assert_eq!(
            check_eligibility(&d, &cart(&[(1, 49, 1)]), &ctx, &h),
            Err(Ineligible::BelowMinimum(Decimal::new(50, 0)))
        );
        assert_eq!(check_eligibility(&d, &cart(&[(1, 50, 1)]), &ctx, &h), Ok(()));
    }

    #[test]
    fn max_purchase_and_min_items() {
        let h = InMemoryHistory::new();
        let ctx = PricingContext::guest(at(2024, 1, 1));
        let mut d = fixed("RANGE");
        d.max_purchase = Decimal::new(100, 0);
        d.min_items = 3;
        assert_eq!(
            check_eligibility(&d, &cart(&[(1, 60, 2)]), &ctx, &h),
            Err(Ineligible::AboveMaximum(Decimal::new(100, 0)))
        );
        assert_eq!(
            check_eligibility(&d, &cart(&[(1, 10, 2)]), &ctx, &h),
            Err(Ineligible::TooFewItems(3))
        );
        assert_eq!(
            check_eligibility(&d, &cart(&[(1, 10, 2), (2, 5, 1)]), &ctx, &h),
            Ok(())
        );
        // subtotal exactly at the maximum
        assert_eq!(
            check_eligibility(&d, &cart(&[(1, 50, 2), (2, 0, 1)]), &ctx, &h),
            Ok(())
        );
    }

    #[test]
    fn customer_segments() {
        let c = cart(&[(1, 10, 1)]);
        let returning = customer(1, None);
        let fresh = customer(2, None);
        let vip = customer(3, Some("Vip"));
        let h = InMemoryHistory::new().with_orders(CustomerId(1), 4);
        let now = at(2024, 1, 1);
        let guest = PricingContext::guest(now);

        let check = |seg: CustomerEligibility, ctx: &PricingContext<'_>| {
            let mut d = fixed("SEG");
            d.customer_eligibility = seg;
            check_eligibility(&d, &c, ctx, &h).is_ok()
        };

        assert!(check(CustomerEligibility::New, &guest.with_customer(&fresh)));
        assert!(!check(CustomerEligibility::New, &guest.with_customer(&returning)));
        assert!(check(CustomerEligibility::Returning, &guest.with_customer(&returning)));
        assert!(!check(CustomerEligibility::Returning, &guest));
        assert!(check(CustomerEligibility::Registered, &guest.with_customer(&fresh)));
        assert!(!check(CustomerEligibility::Registered, &guest));
        assert!(check(CustomerEligibility::Guests, &guest));
        assert!(!check(CustomerEligibility::Guests, &guest.with_customer(&fresh)));
        assert!(check(CustomerEligibility::Vip, &guest.with_customer(&vip)));
        assert!(!check(CustomerEligibility::Vip, &guest.with_customer(&fresh)));
        assert!(!check(CustomerEligibility::Vip, &guest));
    }

    #[test]
    fn first_purchase_only() {
        let c = cart(&[(1, 10, 1)]);
        let returning = customer(1, None);
        let fresh = customer(2, None);
        let h = InMemoryHistory::new().with_orders(CustomerId(1), 1);
        let ctx = PricingContext::guest(at(2024, 1, 1));
        let mut d = fixed("FIRST");
        d.first_purchase_only = true;
        assert_eq!(
            check_eligibility(&d, &c, &ctx.with_customer(&returning), &h),
            Err(Ineligible::NotFirstPurchase)
        );
        assert_eq!(check_eligibility(&d, &c, &ctx.with_customer(&fresh), &h), Ok(()));
    }

    #[test]
    fn per_customer_limit() {
        let c = cart(&[(1, 10, 1)]);
        let who = customer(5, None);
        let mut d = fixed("ONCE");
        d.max_uses_per_customer = 1;
        let mut h = InMemoryHistory::new();
        let ctx = PricingContext::guest(at(2024, 1, 1));
        assert_eq!(check_eligibility(&d, &c, &ctx.with_customer(&who), &h), Ok(()));
        h.record_use(d.code.clone(), who.id);
        assert_eq!(
            check_eligibility(&d, &c, &ctx.with_customer(&who), &h),
            Err(Ineligible::CustomerUsageLimit)
        );
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Ok(()));
    }

    #[test]
    fn scope_requires_a_matching_line() {
        let c = cart(&[(1, 10, 1), (2, 20, 1)]);
        let h = InMemoryHistory::new();
        let ctx = PricingContext::guest(at(2024, 1, 1));
        let mut d = fixed("SCOPED");
        d.applies_to = AppliesTo::Products(vec![ProductId(3)]);
        assert_eq!(
            check_eligibility(&d, &c, &ctx, &h),
            Err(Ineligible::NoMatchingItems)
        );
        d.applies_to = AppliesTo::ExceptProducts(vec![ProductId(1)]);
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Ok(()));
        d.applies_to = AppliesTo::ExceptProducts(vec![ProductId(1), ProductId(2)]);
        assert_eq!(
            check_eligibility(&d, &c, &ctx, &h),
            Err(Ineligible::NoMatchingItems)
        );
        d.applies_to = AppliesTo::Categories(vec![CategoryId(20)]);
        assert_eq!(check_eligibility(&d, &c, &ctx, &h), Ok(()));
    }

    #[test]
    fn empty_cart_never_matches() {
        let h = InMemoryHistory::new();
        let ctx = PricingContext::guest(at(2024, 1, 1));
        assert_eq!(
            check_eligibility(&fixed("ANY"), &Cart::default(), &ctx, &h),
            Err(Ineligible::NoMatchingItems)
        );
    }

    proptest! {
        #[test]
        fn unlimited_discounts_ignore_used_count(used in 0u32..u32::MAX) {
            let h = InMemoryHistory::new();
            let ctx = PricingContext::guest(at(2024, 1, 1));
            let c = cart(&[(1, 10, 1)]);
            let mut d = fixed("UNLIMITED");
            d.max_uses = 0;
            d.used_count = 0;
            let baseline = check_eligibility(&d, &c, &ctx, &h);
            d.used_count = used;
            prop_assert_eq!(check_eligibility(&d, &c, &ctx, &h), baseline);
        }

        #[test]
        fn limited_discounts_track_used_count(max in 1u32..1000, used in 0u32..2000) {
            let h = InMemoryHistory::new();
            let ctx = PricingContext::guest(at(2024, 1, 1));
            let c = cart(&[(1, 10, 1)]);
            let mut d = fixed("LIMITED");
            d.max_uses = max;
            d.used_count = used;
            let res = check_eligibility(&d, &c, &ctx, &h);
            if used < max {
                prop_assert_eq!(res, Ok(()));
            } else {
                prop_assert_eq!(res, Err(Ineligible::UsageLimit));
            }
        }
    }
}
