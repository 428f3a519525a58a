#![deny(warnings)]

//! Core storefront domain models and invariants.
//!
//! This crate defines the serializable types shared by the pricing engine,
//! the flat-file store and the CLI, with validation helpers that guarantee
//! the basic invariants of discount records and cart lines.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod catalog;
pub mod timestamp;

pub use catalog::DiscountCatalog;

/// Maximum accepted length of a discount code, in characters.
pub const MAX_CODE_LEN: usize = 32;

/// Catalog product identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub u64);

/// Catalog category identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub u64);

/// Registered customer identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub u64);

/// Placed order identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

/// A normalized discount code.
///
/// Codes are matched case-insensitively: construction trims surrounding
/// whitespace and upper-cases the input, so two codes compare equal exactly
/// when customers would consider them the same code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiscountCode(String);

impl DiscountCode {
    /// Normalize and validate a raw code as typed by a customer or admin.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let code = raw.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(ValidationError::EmptyCode);
        }
        if code.chars().count() > MAX_CODE_LEN {
            return Err(ValidationError::CodeTooLong(code.chars().count()));
        }
        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidCode(code));
        }
        Ok(Self(code))
    }

    /// The normalized code text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a raw, un-normalized input refers to this code.
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(&self.0)
    }
}

impl TryFrom<String> for DiscountCode {
    type Error = ValidationError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<DiscountCode> for String {
    fn from(code: DiscountCode) -> Self {
        code.0
    }
}

impl fmt::Display for DiscountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a discount takes off and how its amount is derived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountKind {
    /// Percentage of the remaining subtotal, `value` in (0, 100].
    Percentage { value: Decimal },
    /// Fixed amount off the order.
    Fixed { value: Decimal },
    /// Takes off the current shipping cost.
    FreeShipping,
    /// For every `buy_quantity + get_quantity` eligible units, the
    /// `get_quantity` cheapest ones are free.
    BuyXGetY { buy_quantity: u32, get_quantity: u32 },
}

impl DiscountKind {
    /// Short stable label used in logs and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            DiscountKind::Percentage { .. } => "percentage",
            DiscountKind::Fixed { .. } => "fixed",
            DiscountKind::FreeShipping => "free_shipping",
            DiscountKind::BuyXGetY { .. } => "buy_x_get_y",
        }
    }
}

/// Which customers a discount is offered to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerEligibility {
    /// Everyone, signed in or not.
    #[default]
    All,
    /// Customers without any prior order.
    New,
    /// Customers with at least one prior order.
    Returning,
    /// Any signed-in customer.
    Registered,
    /// Only checkouts without a customer account.
    Guests,
    /// Customers whose tier is "vip".
    Vip,
}

/// Which cart lines a discount is scoped to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "ids", rename_all = "snake_case")]
pub enum AppliesTo {
    /// Every line.
    #[default]
    All,
    /// Only the listed products.
    Products(Vec<ProductId>),
    /// Every product except the listed ones.
    ExceptProducts(Vec<ProductId>),
    /// Only products in the listed categories.
    Categories(Vec<CategoryId>),
}

impl AppliesTo {
    /// Whether a cart line falls inside this scope.
    pub fn matches(&self, item: &CartItem) -> bool {
        match self {
            AppliesTo::All => true,
            AppliesTo::Products(ids) => ids.contains(&item.product_id),
            AppliesTo::ExceptProducts(ids) => !ids.contains(&item.product_id),
            AppliesTo::Categories(ids) => item
                .category_id
                .map(|c| ids.contains(&c))
                .unwrap_or(false),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A price reduction rule and its eligibility constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    /// Unique, case-insensitive code.
    pub code: DiscountCode,
    /// Human-readable label shown at checkout.
    #[serde(default)]
    pub name: String,
    /// Discount type and its parameters.
    #[serde(flatten)]
    pub kind: DiscountKind,
    /// Minimum cart subtotal (0 = unbounded).
    #[serde(default)]
    pub min_purchase: Decimal,
    /// Maximum cart subtotal (0 = unbounded).
    #[serde(default)]
    pub max_purchase: Decimal,
    /// Minimum total quantity in the cart.
    #[serde(default)]
    pub min_items: u32,
    /// Upper bound on the computed amount, if any.
    #[serde(default)]
    pub max_discount: Option<Decimal>,
    /// Total redemptions allowed (0 = unlimited).
    #[serde(default)]
    pub max_uses: u32,
    /// Redemptions allowed per customer (0 = unlimited).
    #[serde(default)]
    pub max_uses_per_customer: u32,
    /// Redemptions so far.
    #[serde(default)]
    pub used_count: u32,
    /// Start of the validity window (inclusive), unbounded when absent.
    #[serde(default, with = "timestamp::option")]
    pub start_date: Option<NaiveDateTime>,
    /// End of the validity window (inclusive), unbounded when absent.
    #[serde(default, with = "timestamp::option")]
    pub end_date: Option<NaiveDateTime>,
    /// Disabled discounts are never eligible.
    #[serde(default = "default_true")]
    pub active: bool,
    /// May stack with other combinable discounts.
    #[serde(default)]
    pub combinable: bool,
    /// Applied without the customer entering the code.
    #[serde(default)]
    pub auto_apply: bool,
    /// Higher priorities are evaluated first.
    #[serde(default)]
    pub priority: i32,
    /// Customer segment the discount is offered to.
    #[serde(default)]
    pub customer_eligibility: CustomerEligibility,
    /// Only valid for customers without prior orders.
    #[serde(default)]
    pub first_purchase_only: bool,
    /// Product or category scope.
    #[serde(default)]
    pub applies_to: AppliesTo,
}

impl Discount {
    /// A minimal active discount with every constraint left unbounded.
    pub fn new(code: DiscountCode, kind: DiscountKind) -> Self {
        Self {
            name: code.as_str().to_string(),
            code,
            kind,
            min_purchase: Decimal::ZERO,
            max_purchase: Decimal::ZERO,
            min_items: 0,
            max_discount: None,
            max_uses: 0,
            max_uses_per_customer: 0,
            used_count: 0,
            start_date: None,
            end_date: None,
            active: true,
            combinable: false,
            auto_apply: false,
            priority: 0,
            customer_eligibility: CustomerEligibility::All,
            first_purchase_only: false,
            applies_to: AppliesTo::All,
        }
    }

    /// Whether the usage limit, if any, has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.max_uses > 0 && self.used_count >= self.max_uses
    }
}

/// A signed-in customer as seen by checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Account identifier.
    pub id: CustomerId,
    /// Contact address.
    #[serde(default)]
    pub email: String,
    /// Loyalty tier, e.g. "vip".
    #[serde(default)]
    pub tier: Option<String>,
}

impl Customer {
    /// True when `tier` is "vip", ignoring case and surrounding spaces.
    pub fn is_vip(&self) -> bool {
        self.tier
            .as_deref()
            .map(|t| t.trim().eq_ignore_ascii_case("vip"))
            .unwrap_or(false)
    }
}

/// One cart line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product in this line.
    pub product_id: ProductId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Category used by category-scoped discounts.
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    /// Price of a single unit (>= 0).
    pub unit_price: Decimal,
    /// Number of units (> 0).
    pub quantity: u32,
}

impl CartItem {
    /// `unit_price * quantity`, unrounded.
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The contents of a checkout session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Lines in the order they were added.
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Wrap lines as-is; see [`validate_cart`] for the checks.
    pub fn new(items: Vec<CartItem>) -> Self {
        Self { items }
    }

    /// Sum of all line totals.
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Total quantity across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|i| u64::from(i.quantity)).sum()
    }

    /// True when the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A placed order, as far as discount history is concerned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Unique within the store.
    pub id: OrderId,
    /// None for guest checkouts.
    pub customer_id: Option<CustomerId>,
    /// Amount charged, shipping included.
    pub total: Decimal,
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
}

/// One redemption of a discount on an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscountUsage {
    pub code: DiscountCode,
    /// None for guest checkouts.
    pub customer_id: Option<CustomerId>,
    /// Order the discount was redeemed on.
    pub order_id: OrderId,
    /// What the discount took off that order.
    pub amount: Decimal,
    #[serde(with = "timestamp")]
    pub used_at: NaiveDateTime,
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Code is empty after trimming.
    #[error("discount code is empty")]
    EmptyCode,
    /// Code longer than [`MAX_CODE_LEN`].
    #[error("discount code is {0} characters long, at most 32 allowed")]
    CodeTooLong(usize),
    /// Code contains characters outside `[A-Z0-9_-]`.
    #[error("discount code {0:?} contains invalid characters")]
    InvalidCode(String),
    /// Percentage outside (0, 100].
    #[error("percentage {0} must be within (0, 100]")]
    InvalidPercentage(Decimal),
    /// Fixed amount must be strictly positive.
    #[error("fixed discount value must be > 0")]
    NonPositiveAmount,
    /// Buy/get quantities must both be positive.
    #[error("buy and get quantities must be > 0")]
    InvalidBuyGet,
    /// Money fields must be non-negative.
    #[error("negative monetary value is invalid")]
    NegativeMoney,
    /// max_purchase set below min_purchase.
    #[error("max purchase {max} is below min purchase {min}")]
    PurchaseRange { min: Decimal, max: Decimal },
    /// start_date after end_date.
    #[error("start date is after end date")]
    DateRange,
    /// Scoped discount without any ids.
    #[error("discount {0} is scoped to an empty id list")]
    EmptyScope(String),
    /// used_count above a non-zero max_uses.
    #[error("used count {used} exceeds max uses {max}")]
    UsageOverflow { used: u32, max: u32 },
    /// Two discounts share a code.
    #[error("duplicate discount code: {0}")]
    DuplicateCode(String),
    /// No discount with this code.
    #[error("unknown discount code: {0}")]
    UnknownCode(String),
    /// Cart line with zero quantity.
    #[error("cart line for product {0} has zero quantity")]
    ZeroQuantity(u64),
}

/// Validate a single discount record.
pub fn validate_discount(d: &Discount) -> Result<(), ValidationError> {
    match &d.kind {
        DiscountKind::Percentage { value } => {
            if *value <= Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
                return Err(ValidationError::InvalidPercentage(*value));
            }
        }
        DiscountKind::Fixed { value } => {
            if *value <= Decimal::ZERO {
                return Err(ValidationError::NonPositiveAmount);
            }
        }
        DiscountKind::FreeShipping => {}
        DiscountKind::BuyXGetY {
            buy_quantity,
            get_quantity,
        } => {
            if *buy_quantity == 0 || *get_quantity == 0 {
                return Err(ValidationError::InvalidBuyGet);
            }
        }
    }
    if d.min_purchase < Decimal::ZERO || d.max_purchase < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    if d.max_discount.map(|m| m < Decimal::ZERO).unwrap_or(false) {
        return Err(ValidationError::NegativeMoney);
    }
    if d.max_purchase > Decimal::ZERO && d.max_purchase < d.min_purchase {
        return Err(ValidationError::PurchaseRange {
            min: d.min_purchase,
            max: d.max_purchase,
        });
    }
    if let (Some(start), Some(end)) = (d.start_date, d.end_date) {
        if start > end {
            return Err(ValidationError::DateRange);
        }
    }
    let empty_scope = match &d.applies_to {
        AppliesTo::All => false,
        AppliesTo::Products(ids) | AppliesTo::ExceptProducts(ids) => ids.is_empty(),
        AppliesTo::Categories(ids) => ids.is_empty(),
    };
    if empty_scope {
        return Err(ValidationError::EmptyScope(d.code.to_string()));
    }
    if d.max_uses > 0 && d.used_count > d.max_uses {
        return Err(ValidationError::UsageOverflow {
            used: d.used_count,
            max: d.max_uses,
        });
    }
    Ok(())
}

/// Validate a cart line.
pub fn validate_cart_item(item: &CartItem) -> Result<(), ValidationError> {
    if item.quantity == 0 {
        return Err(ValidationError::ZeroQuantity(item.product_id.0));
    }
    if item.unit_price < Decimal::ZERO {
        return Err(ValidationError::NegativeMoney);
    }
    Ok(())
}

/// Validate every line of a cart.
pub fn validate_cart(cart: &Cart) -> Result<(), ValidationError> {
    cart.items.iter().try_for_each(validate_cart_item)
}
