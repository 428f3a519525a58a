//! The set of configured discounts, keyed by normalized code.

use crate::{validate_discount, Discount, DiscountCode, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Ordered collection of discounts with unique codes.
///
/// Insertion order is preserved; it is the tie-break order the pricing
/// engine uses between auto-apply discounts of equal priority.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscountCatalog {
    discounts: Vec<Discount>,
}

impl DiscountCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, validating every record and rejecting duplicates.
    pub fn from_discounts(discounts: Vec<Discount>) -> Result<Self, ValidationError> {
        let catalog = Self { discounts };
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.discounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.discounts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Discount> {
        self.discounts.iter()
    }

    /// Look a discount up by raw user input.
    pub fn find(&self, raw: &str) -> Option<&Discount> {
        self.discounts.iter().find(|d| d.code.matches(raw))
    }

    /// Exact lookup by normalized code.
    pub fn get(&self, code: &DiscountCode) -> Option<&Discount> {
        self.discounts.iter().find(|d| &d.code == code)
    }

    pub fn get_mut(&mut self, code: &DiscountCode) -> Option<&mut Discount> {
        self.discounts.iter_mut().find(|d| &d.code == code)
    }

    /// Discounts that apply without a code being entered.
    pub fn auto_apply(&self) -> impl Iterator<Item = &Discount> {
        self.discounts.iter().filter(|d| d.auto_apply)
    }

    /// Add a new discount.
    pub fn insert(&mut self, discount: Discount) -> Result<(), ValidationError> {
        validate_discount(&discount)?;
        if self.get(&discount.code).is_some() {
            return Err(ValidationError::DuplicateCode(discount.code.to_string()));
        }
        debug!(code = %discount.code, kind = discount.kind.label(), "discount added");
        self.discounts.push(discount);
        Ok(())
    }

    /// Overwrite the discount with the same code, returning the previous one.
    pub fn replace(&mut self, discount: Discount) -> Result<Discount, ValidationError> {
        validate_discount(&discount)?;
        let slot = self
            .get_mut(&discount.code)
            .ok_or_else(|| ValidationError::UnknownCode(discount.code.to_string()))?;
        debug!(code = %discount.code, "discount replaced");
        Ok(std::mem::replace(slot, discount))
    }

    pub fn remove(&mut self, code: &DiscountCode) -> Result<Discount, ValidationError> {
        let idx = self
            .discounts
            .iter()
            .position(|d| &d.code == code)
            .ok_or_else(|| ValidationError::UnknownCode(code.to_string()))?;
        debug!(%code, "discount removed");
        Ok(self.discounts.remove(idx))
    }

    /// Validate every record and code uniqueness.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen: BTreeSet<&DiscountCode> = BTreeSet::new();
        for d in &self.discounts {
            validate_discount(d)?;
            if !seen.insert(&d.code) {
                return Err(ValidationError::DuplicateCode(d.code.to_string()));
            }
        }
        Ok(())
    }
}
