//! Per-type discount amount formulas.

use crate::PricingContext;
use rust_decimal::{Decimal, RoundingStrategy};
use shop_core::{Cart, CartItem, Discount, DiscountKind};

/// Round a monetary amount to cents, halves away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Value of the free units in a buy X get Y offer.
///
/// Lines are consumed cheapest first, so the customer always gets the
/// lowest-priced units for free.
///
/// Example:
/// three €10 units with buy 2 get 1 → one free unit worth €10.
pub fn free_units_value<'a, I>(items: I, buy_quantity: u32, get_quantity: u32) -> Decimal
where
    I: IntoIterator<Item = &'a CartItem>,
{
    let set_size = u64::from(buy_quantity) + u64::from(get_quantity);
    if set_size == 0 || get_quantity == 0 {
        return Decimal::ZERO;
    }
    let mut lines: Vec<&CartItem> = items.into_iter().collect();
    lines.sort_by(|a, b| a.unit_price.cmp(&b.unit_price));

    let total_qty: u64 = lines.iter().map(|i| u64::from(i.quantity)).sum();
    let sets = total_qty / set_size;
    let mut free_left = sets * u64::from(get_quantity);

    let mut value = Decimal::ZERO;
    for line in lines {
        if free_left == 0 {
            break;
        }
        let take = free_left.min(u64::from(line.quantity));
        value += line.unit_price * Decimal::from(take);
        free_left -= take;
    }
    value
}

/// Amount a discount takes off, given what is still payable.
///
/// The result is capped by `max_discount` (when set and positive), rounded to
/// cents and clamped to `[0, remaining]`.
pub fn discount_amount(
    discount: &Discount,
    cart: &Cart,
    remaining: Decimal,
    ctx: &PricingContext<'_>,
) -> Decimal {
    let raw = match &discount.kind {
        DiscountKind::Percentage { value } => remaining * *value / Decimal::ONE_HUNDRED,
        DiscountKind::Fixed { value } => *value,
        DiscountKind::FreeShipping => ctx.shipping_cost,
        DiscountKind::BuyXGetY {
            buy_quantity,
            get_quantity,
        } => free_units_value(
            cart.items
                .iter()
                .filter(|i| discount.applies_to.matches(i)),
            *buy_quantity,
            *get_quantity,
        ),
    };
    let capped = match discount.max_discount {
        Some(cap) if cap > Decimal::ZERO => raw.min(cap),
        _ => raw,
    };
    let ceiling = remaining.max(Decimal::ZERO);
    round_money(capped).max(Decimal::ZERO).min(ceiling)
}
