//! Catalog seeding from JSON.
//!
//! A seed names everything by name; keys are assigned on load. The whole
//! seed is applied in one write transaction, so a bad reference leaves the
//! store untouched.

use std::path::Path;

use galley_core::{CompositionLine, GalleyError, OfferingDraft, Result};
use galley_store::{Store, Tables};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::{insert_attribute, insert_category, insert_ingredient, link_attribute};
use crate::composer::insert_offering;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_food: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientSeed {
    pub name: String,
    /// Attribute names; unknown ones are created.
    #[serde(default)]
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferingSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub recommended: bool,
    #[serde(default)]
    pub mandatory: Vec<String>,
    #[serde(default)]
    pub removable: Vec<String>,
}

/// A whole catalog described by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<CategorySeed>,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<IngredientSeed>,
    #[serde(default)]
    pub offerings: Vec<OfferingSeed>,
}

/// Row counts created by a seed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub categories: usize,
    pub attributes: usize,
    pub ingredients: usize,
    pub offerings: usize,
}

impl CatalogSeed {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a seed file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| GalleyError::Store {
            message: format!("cannot read seed {}: {}", path.display(), e),
        })?;
        Self::from_json(&json)
    }

    /// Load the seed into `store` in one transaction.
    pub async fn apply<S: Store>(self, store: &S) -> Result<SeedSummary> {
        let summary = store.write(move |tables| self.apply_to(tables)).await?;
        info!(
            categories = summary.categories,
            attributes = summary.attributes,
            ingredients = summary.ingredients,
            offerings = summary.offerings,
            "Seeded catalog"
        );
        Ok(summary)
    }

    fn apply_to(self, tables: &mut Tables) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for category in &self.categories {
            insert_category(tables, &category.name, category.is_food)?;
            summary.categories += 1;
        }
        for attribute in &self.attributes {
            insert_attribute(tables, attribute)?;
            summary.attributes += 1;
        }
        for seed in &self.ingredients {
            let ingredient = insert_ingredient(tables, &seed.name)?;
            for name in &seed.attributes {
                let attribute_id = match tables.attribute_by_name(name) {
                    Some(attribute) => attribute.id,
                    None => {
                        summary.attributes += 1;
                        insert_attribute(tables, name)?.id
                    }
                };
                link_attribute(tables, ingredient.id, attribute_id)?;
            }
            summary.ingredients += 1;
        }
        for seed in self.offerings {
            let draft = seed.into_draft(tables)?;
            draft.validate()?;
            insert_offering(tables, draft)?;
            summary.offerings += 1;
        }

        Ok(summary)
    }
}

impl OfferingSeed {
    fn into_draft(self, tables: &Tables) -> Result<OfferingDraft> {
        let category_id = match &self.category {
            Some(name) => Some(
                tables
                    .category_by_name(name)
                    .ok_or_else(|| {
                        GalleyError::validation(format!(
                            "offering '{}' names unknown category '{}'",
                            self.name, name
                        ))
                    })?
                    .id,
            ),
            None => None,
        };

        let lines = self
            .mandatory
            .iter()
            .map(|name| (name, false))
            .chain(self.removable.iter().map(|name| (name, true)));
        let mut composition = Vec::new();
        for (name, is_removable) in lines {
            let ingredient = tables.ingredient_by_name(name).ok_or_else(|| {
                GalleyError::validation(format!(
                    "offering '{}' names unknown ingredient '{}'",
                    self.name, name
                ))
            })?;
            composition.push(CompositionLine {
                ingredient_id: ingredient.id,
                is_removable,
            });
        }

        Ok(OfferingDraft {
            name: self.name,
            description: self.description,
            price: self.price,
            category_id,
            quantity: self.quantity,
            recommended: self.recommended,
            composition,
        })
    }
}
