//! Offering drafts and builder.
//!
//! An offering is defined from an [`OfferingDraft`]; the builder collects the
//! fields fluently and validates them before anything touches the store.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{GalleyError, Result};
use crate::types::{CategoryId, IngredientId};

/// One requested composition entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionLine {
    pub ingredient_id: IngredientId,
    pub is_removable: bool,
}

impl CompositionLine {
    /// An ingredient the guest cannot ask to omit.
    pub fn mandatory(ingredient_id: IngredientId) -> Self {
        Self {
            ingredient_id,
            is_removable: false,
        }
    }

    /// An ingredient the guest may ask to omit.
    pub fn removable(ingredient_id: IngredientId) -> Self {
        Self {
            ingredient_id,
            is_removable: true,
        }
    }
}

/// A validated description of a new offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub recommended: bool,
    pub composition: Vec<CompositionLine>,
}

impl OfferingDraft {
    /// Create a new OfferingBuilder.
    pub fn builder() -> OfferingBuilder {
        OfferingBuilder::new()
    }

    /// Validate everything that can be checked without the store.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_price(self.price)?;
        validate_composition(&self.composition)
    }
}

/// Builder for creating offering drafts with a fluent API.
#[derive(Debug, Default)]
pub struct OfferingBuilder {
    name: Option<String>,
    description: String,
    price: Decimal,
    category_id: Option<CategoryId>,
    quantity: u32,
    recommended: bool,
    composition: Vec<CompositionLine>,
}

impl OfferingBuilder {
    /// Create a new OfferingBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the offering name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the price.
    pub fn price(mut self, price: Decimal) -> Self {
        self.price = price;
        self
    }

    /// Place the offering in a category.
    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Set the available quantity.
    pub fn quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Mark the offering as recommended.
    pub fn recommended(mut self, recommended: bool) -> Self {
        self.recommended = recommended;
        self
    }

    /// Add a composition entry.
    pub fn ingredient(mut self, ingredient_id: IngredientId, is_removable: bool) -> Self {
        self.composition.push(CompositionLine {
            ingredient_id,
            is_removable,
        });
        self
    }

    /// Add a mandatory ingredient.
    pub fn mandatory(self, ingredient_id: IngredientId) -> Self {
        self.ingredient(ingredient_id, false)
    }

    /// Add a removable ingredient.
    pub fn removable(self, ingredient_id: IngredientId) -> Self {
        self.ingredient(ingredient_id, true)
    }

    /// Build the draft.
    pub fn build(self) -> Result<OfferingDraft> {
        let name = self
            .name
            .ok_or_else(|| GalleyError::validation("offering name is required"))?;

        let draft = OfferingDraft {
            name,
            description: self.description,
            price: self.price,
            category_id: self.category_id,
            quantity: self.quantity,
            recommended: self.recommended,
            composition: self.composition,
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// Administrative edits to an existing offering. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OfferingUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    /// `Some(None)` clears the category; in JSON that is an explicit `null`.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub recommended: Option<bool>,
}

impl OfferingUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }
}

/// Marks a field as present, so `null` reads as `Some(None)`. Absent fields
/// fall back to `default`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Catalog names must contain something other than whitespace.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(GalleyError::validation("name cannot be empty"));
    }
    Ok(())
}

/// Prices are non-negative with at most two decimal places.
pub fn validate_price(price: Decimal) -> Result<()> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(GalleyError::validation(format!(
            "price must be non-negative, got {}",
            price
        )));
    }
    if price.normalize().scale() > 2 {
        return Err(GalleyError::validation(format!(
            "price must have at most two decimal places, got {}",
            price
        )));
    }
    Ok(())
}

/// A composition is non-empty and names each ingredient once.
pub fn validate_composition(composition: &[CompositionLine]) -> Result<()> {
    if composition.is_empty() {
        return Err(GalleyError::validation("composition cannot be empty"));
    }
    let mut seen = HashSet::new();
    for line in composition {
        if !seen.insert(line.ingredient_id) {
            return Err(GalleyError::validation(format!(
                "ingredient {} appears more than once in the composition",
                line.ingredient_id
            )));
        }
    }
    Ok(())
}
