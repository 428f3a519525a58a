//! The stacking pass: candidate collection, priority ordering, combinability
//! and redemption.

use crate::{check_eligibility, discount_amount, Ineligible, PricingContext, ShopHistory};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Serialize;
use shop_core::{Cart, CustomerId, Discount, DiscountCatalog, DiscountCode, DiscountUsage, OrderId};
use std::cmp::Reverse;
use thiserror::Error;
use tracing::{debug, info};

/// One discount accepted into a quote.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AppliedDiscount {
    pub code: DiscountCode,
    pub name: String,
    /// `DiscountKind::label`, e.g. `"percentage"`.
    pub kind: &'static str,
    pub priority: i32,
    pub combinable: bool,
    /// `false` for the manually entered code.
    pub auto_applied: bool,
    /// Rounded amount taken off the remaining subtotal.
    pub amount: Decimal,
}

/// A manually entered code that did not make it into the quote.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RejectedCode {
    /// The code as the customer typed it.
    pub code: String,
    /// Customer-facing text of `reason`.
    pub message: String,
    #[serde(skip)]
    pub reason: Ineligible,
}

/// Result of pricing a cart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Quote {
    pub subtotal: Decimal,
    /// Total quantity over all lines.
    pub item_count: u64,
    pub shipping: Decimal,
    /// Accepted discounts in evaluation order.
    pub applied: Vec<AppliedDiscount>,
    /// Sum of `applied` amounts; never above `subtotal`.
    pub discount_total: Decimal,
    /// `subtotal - discount_total + shipping`
    pub total: Decimal,
    /// Set when a manual code was entered but not applied.
    pub rejected_code: Option<RejectedCode>,
}

impl Quote {
    /// Whether `code` (any case) was applied.
    pub fn has_discount(&self, code: &str) -> bool {
        self.applied.iter().any(|a| a.code.matches(code))
    }
}

/// Outcome of checking a single code, as shown next to the code input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CodeValidation {
    /// Normalized code, or the raw input when it does not parse.
    pub code: String,
    pub valid: bool,
    /// Success text, or the rejection reason.
    pub message: String,
    /// What the code alone would take off the current cart.
    pub amount: Decimal,
}

/// Errors raised while committing a quote's discounts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RedeemError {
    /// An applied code was removed from the catalog after quoting.
    #[error("discount {0} no longer exists")]
    Missing(String),
    /// An applied code hit `max_uses` after quoting.
    #[error("discount {0} has reached its usage limit")]
    Exhausted(String),
}

/// Prices carts against a catalog and a customer history.
pub struct DiscountEngine<'a, H: ShopHistory + ?Sized> {
    catalog: &'a DiscountCatalog,
    history: &'a H,
}

impl<'a, H: ShopHistory + ?Sized> DiscountEngine<'a, H> {
    /// Borrow a catalog and the history used for customer checks.
    pub fn new(catalog: &'a DiscountCatalog, history: &'a H) -> Self {
        Self { catalog, history }
    }

    /// Price a cart with an optional manual code plus every eligible
    /// auto-apply discount.
    ///
    /// Candidates are walked in descending priority; ties keep the manual
    /// code first, then catalog order. A candidate is accepted only while
    /// every accepted discount is combinable, so the first non-combinable
    /// discount accepted ends the pass. Nothing is mutated; see [`redeem`].
    pub fn quote(&self, cart: &Cart, code: Option<&str>, ctx: &PricingContext<'_>) -> Quote {
        let subtotal = cart.subtotal();
        let mut rejected_code = None;
        let mut candidates: Vec<(&Discount, bool)> = Vec::new();

        if let Some(raw) = code.map(str::trim).filter(|c| !c.is_empty()) {
            match self.lookup(raw, cart, ctx) {
                Ok(d) => candidates.push((d, false)),
                Err(reason) => {
                    debug!(code = raw, %reason, "manual code rejected");
                    rejected_code = Some(RejectedCode {
                        code: raw.to_string(),
                        message: reason.to_string(),
                        reason,
                    });
                }
            }
        }
        for d in self.catalog.auto_apply() {
            if candidates.iter().any(|(c, _)| c.code == d.code) {
                continue;
            }
            match check_eligibility(d, cart, ctx, self.history) {
                Ok(()) => candidates.push((d, true)),
                Err(reason) => debug!(code = %d.code, %reason, "auto discount skipped"),
            }
        }

        // stable: equal priorities keep insertion order
        candidates.sort_by_key(|(d, _)| Reverse(d.priority));

        let mut applied: Vec<AppliedDiscount> = Vec::new();
        let mut discount_total = Decimal::ZERO;
        for (d, auto_applied) in candidates {
            if let Some(lock) = applied.iter().find(|a| !a.combinable) {
                debug!(code = %d.code, locked_by = %lock.code, "blocked by non-combinable discount");
                if !auto_applied {
                    let reason = Ineligible::NotCombinable(lock.code.to_string());
                    rejected_code = Some(RejectedCode {
                        code: d.code.to_string(),
                        message: reason.to_string(),
                        reason,
                    });
                }
                continue;
            }
            let remaining = subtotal - discount_total;
            let amount = discount_amount(d, cart, remaining, ctx);
            debug!(code = %d.code, kind = d.kind.label(), %amount, %remaining, "discount accepted");
            discount_total += amount;
            applied.push(AppliedDiscount {
                code: d.code.clone(),
                name: d.name.clone(),
                kind: d.kind.label(),
                priority: d.priority,
                combinable: d.combinable,
                auto_applied,
                amount,
            });
        }

        Quote {
            subtotal,
            item_count: cart.item_count(),
            shipping: ctx.shipping_cost,
            applied,
            discount_total,
            total: subtotal - discount_total + ctx.shipping_cost,
            rejected_code,
        }
    }

    /// Check a code on its own, without stacking.
    pub fn validate_code(&self, code: &str, cart: &Cart, ctx: &PricingContext<'_>) -> CodeValidation {
        let raw = code.trim();
        match self.lookup(raw, cart, ctx) {
            Ok(d) => CodeValidation {
                code: d.code.to_string(),
                valid: true,
                message: format!("{} applied", d.name),
                amount: discount_amount(d, cart, cart.subtotal(), ctx),
            },
            Err(reason) => CodeValidation {
                code: raw.to_string(),
                valid: false,
                message: reason.to_string(),
                amount: Decimal::ZERO,
            },
        }
    }

    fn lookup(
        &self,
        raw: &str,
        cart: &Cart,
        ctx: &PricingContext<'_>,
    ) -> Result<&'a Discount, Ineligible> {
        let d = self.catalog.find(raw).ok_or(Ineligible::UnknownCode)?;
        check_eligibility(d, cart, ctx, self.history)?;
        Ok(d)
    }
}

/// Commit the discounts of a placed order.
///
/// Usage limits are re-checked for every applied code before any counter
/// moves, so either all counters are incremented or none are.
pub fn redeem(
    catalog: &mut DiscountCatalog,
    quote: &Quote,
    customer: Option<CustomerId>,
    order_id: OrderId,
    now: NaiveDateTime,
) -> Result<Vec<DiscountUsage>, RedeemError> {
    for a in &quote.applied {
        let d = catalog
            .get(&a.code)
            .ok_or_else(|| RedeemError::Missing(a.code.to_string()))?;
        if d.is_exhausted() {
            return Err(RedeemError::Exhausted(a.code.to_string()));
        }
    }

    let mut usages = Vec::with_capacity(quote.applied.len());
    for a in &quote.applied {
        if let Some(d) = catalog.get_mut(&a.code) {
            d.used_count = d.used_count.saturating_add(1);
            info!(code = %d.code, used = d.used_count, order = order_id.0, amount = %a.amount, "discount redeemed");
        }
        usages.push(DiscountUsage {
            code: a.code.clone(),
            customer_id: customer,
            order_id,
            amount: a.amount,
            used_at: now,
        });
    }
    Ok(usages)
}
