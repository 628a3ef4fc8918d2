//! Offering composer.
//!
//! Defines offerings as ordered compositions of ingredients and derives their
//! dietary profile from the ingredient attributes current at call time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use galley_core::offering::validate_composition;
use galley_core::{
    normalize_name, AttributeClass, CompositionLine, Entity, GalleyError, Ingredient,
    IngredientId, Offering, OfferingDraft, OfferingId, OfferingIngredient, OfferingUpdate, Result,
};
use galley_store::{Store, Tables};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One resolved composition row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionEntry {
    pub ingredient: Ingredient,
    pub is_removable: bool,
}

/// Dietary profile of an offering, derived from its current composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietaryProfile {
    pub offering_id: OfferingId,
    /// Positive attributes carried by every mandatory ingredient.
    pub baseline: BTreeSet<String>,
    /// Exclusionary attributes carried by any mandatory ingredient.
    pub exclusionary: BTreeSet<String>,
    /// Exclusionary attributes that only removable ingredients carry, with
    /// the removable ingredients carrying each, in composition order.
    pub removable_exclusionary: BTreeMap<String, Vec<IngredientId>>,
}

impl DietaryProfile {
    /// Returns true if the offering is `attribute` without any modification.
    pub fn is(&self, attribute: &str) -> bool {
        self.baseline.contains(&normalize_name(attribute))
    }

    /// Returns true if a mandatory ingredient carries `attribute`.
    pub fn contains(&self, attribute: &str) -> bool {
        self.exclusionary.contains(&normalize_name(attribute))
    }
}

/// Handle to the offering and composition tables.
pub struct Composer<S> {
    store: Arc<S>,
}

impl<S> Clone for Composer<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> Composer<S> {
    /// Create a composer over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Define a new offering with its composition.
    pub async fn define_offering(&self, draft: OfferingDraft) -> Result<Offering> {
        if let Err(e) = draft.validate() {
            warn!(name = %draft.name, error = %e, "Rejected offering definition");
            return Err(e);
        }

        let offering = self
            .store
            .write(move |tables| insert_offering(tables, draft))
            .await?;

        info!(
            offering_id = %offering.id,
            name = %offering.name,
            price = %offering.price,
            "Defined offering"
        );
        Ok(offering)
    }

    pub async fn get_offering(&self, id: OfferingId) -> Result<Offering> {
        self.store
            .read(move |tables| tables.offering(id).cloned())
            .await
    }

    pub async fn list_offerings(&self) -> Result<Vec<Offering>> {
        self.store
            .read(|tables| Ok(tables.offerings.values().cloned().collect()))
            .await
    }

    /// Apply administrative edits to an offering.
    pub async fn update_offering(&self, id: OfferingId, update: OfferingUpdate) -> Result<Offering> {
        update.validate()?;

        let offering = self
            .store
            .write(move |tables| {
                if let Some(Some(category_id)) = update.category_id {
                    tables.category(category_id)?;
                }
                let offering = tables.offering_mut(id)?;
                if let Some(name) = update.name {
                    offering.name = name.trim().to_string();
                }
                if let Some(description) = update.description {
                    offering.description = description;
                }
                if let Some(price) = update.price {
                    offering.price = price;
                }
                if let Some(category_id) = update.category_id {
                    offering.category_id = category_id;
                }
                if let Some(quantity) = update.quantity {
                    offering.quantity = quantity;
                }
                if let Some(recommended) = update.recommended {
                    offering.recommended = recommended;
                }
                Ok(offering.clone())
            })
            .await?;

        info!(offering_id = %id, "Updated offering");
        Ok(offering)
    }

    /// Replace the composition of an offering.
    pub async fn set_composition(
        &self,
        id: OfferingId,
        composition: Vec<CompositionLine>,
    ) -> Result<Vec<CompositionEntry>> {
        validate_composition(&composition)?;

        let entries = self
            .store
            .write(move |tables| {
                tables.offering(id)?;
                write_composition(tables, id, &composition)?;
                composition_of(tables, id)
            })
            .await?;

        info!(offering_id = %id, ingredients = entries.len(), "Replaced composition");
        Ok(entries)
    }

    /// Delete an offering and its composition.
    ///
    /// Rejected with `Conflict` while any order item references it.
    pub async fn delete_offering(&self, id: OfferingId) -> Result<()> {
        self.store
            .write(move |tables| {
                tables.offering(id)?;
                if tables.all_order_items().any(|item| item.offering_id == id) {
                    return Err(GalleyError::conflict(
                        Entity::Offering,
                        format!("offering {} is referenced by order items", id),
                    ));
                }
                tables.compositions.remove(&id);
                tables.offerings.remove(&id);
                Ok(())
            })
            .await?;
        info!(offering_id = %id, "Deleted offering");
        Ok(())
    }

    /// The ordered composition of an offering.
    pub async fn get_composition(&self, id: OfferingId) -> Result<Vec<CompositionEntry>> {
        debug!(offering_id = %id, "Fetching composition");
        self.store
            .read(move |tables| composition_of(tables, id))
            .await
    }

    /// Derive the dietary profile of an offering from current rows.
    pub async fn dietary_profile(&self, id: OfferingId) -> Result<DietaryProfile> {
        self.store
            .read(move |tables| profile_of(tables, id))
            .await
    }
}

/// Insert an offering and its composition rows. The draft must be valid.
pub(crate) fn insert_offering(tables: &mut Tables, draft: OfferingDraft) -> Result<Offering> {
    if let Some(category_id) = draft.category_id {
        tables.category(category_id)?;
    }

    let offering = Offering {
        id: OfferingId(tables.next_key()),
        name: draft.name.trim().to_string(),
        description: draft.description,
        price: draft.price,
        category_id: draft.category_id,
        quantity: draft.quantity,
        recommended: draft.recommended,
    };
    tables.offerings.insert(offering.id, offering.clone());
    write_composition(tables, offering.id, &draft.composition)?;
    Ok(offering)
}

fn write_composition(
    tables: &mut Tables,
    offering_id: OfferingId,
    composition: &[CompositionLine],
) -> Result<()> {
    let mut rows = Vec::with_capacity(composition.len());
    for line in composition {
        if !tables.ingredients.contains_key(&line.ingredient_id) {
            return Err(GalleyError::validation(format!(
                "ingredient {} does not exist",
                line.ingredient_id
            )));
        }
        rows.push(OfferingIngredient {
            offering_id,
            ingredient_id: line.ingredient_id,
            is_removable: line.is_removable,
        });
    }
    tables.compositions.insert(offering_id, rows);
    Ok(())
}

/// Resolve the composition rows of an offering, in definition order.
pub fn composition_of(tables: &Tables, offering_id: OfferingId) -> Result<Vec<CompositionEntry>> {
    tables.offering(offering_id)?;
    tables
        .composition(offering_id)
        .iter()
        .map(|row| {
            Ok(CompositionEntry {
                ingredient: tables.ingredient(row.ingredient_id)?.clone(),
                is_removable: row.is_removable,
            })
        })
        .collect()
}

/// Normalized attribute names of an ingredient.
pub(crate) fn attribute_names(tables: &Tables, ingredient_id: IngredientId) -> BTreeSet<String> {
    tables
        .attributes_of(ingredient_id)
        .map(|a| normalize_name(&a.name))
        .collect()
}

/// Derive the dietary profile of an offering.
pub fn profile_of(tables: &Tables, offering_id: OfferingId) -> Result<DietaryProfile> {
    tables.offering(offering_id)?;

    let mut baseline: Option<BTreeSet<String>> = None;
    let mut exclusionary = BTreeSet::new();
    let mut removable: Vec<(IngredientId, BTreeSet<String>)> = Vec::new();

    for row in tables.composition(offering_id) {
        let names = attribute_names(tables, row.ingredient_id);
        if row.is_removable {
            removable.push((row.ingredient_id, names));
            continue;
        }

        let positive: BTreeSet<String> = names
            .iter()
            .filter(|n| AttributeClass::of(n) == AttributeClass::Positive)
            .cloned()
            .collect();
        baseline = Some(match baseline {
            None => positive,
            Some(shared) => shared.intersection(&positive).cloned().collect(),
        });
        exclusionary.extend(
            names
                .into_iter()
                .filter(|n| AttributeClass::of(n) == AttributeClass::Exclusionary),
        );
    }

    let mut removable_exclusionary: BTreeMap<String, Vec<IngredientId>> = BTreeMap::new();
    for (ingredient_id, names) in removable {
        for name in names {
            if AttributeClass::of(&name) == AttributeClass::Exclusionary
                && !exclusionary.contains(&name)
            {
                removable_exclusionary.entry(name).or_default().push(ingredient_id);
            }
        }
    }

    Ok(DietaryProfile {
        offering_id,
        baseline: baseline.unwrap_or_default(),
        exclusionary,
        removable_exclusionary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use galley_core::{CategoryId, OfferingBuilder};
    use galley_store::InMemoryStore;
    use rust_decimal::Decimal;

    struct Fixture {
        catalog: Catalog<InMemoryStore>,
        composer: Composer<InMemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        Fixture {
            catalog: Catalog::new(store.clone()),
            composer: Composer::new(store),
        }
    }

    async fn tagged(f: &Fixture, name: &str, tags: &[&str]) -> IngredientId {
        let ingredient = f.catalog.create_ingredient(name).await.unwrap();
        for tag in tags {
            let attribute = match f.catalog.find_attribute(tag).await {
                Ok(a) => a,
                Err(_) => f.catalog.create_attribute(tag).await.unwrap(),
            };
            f.catalog.tag_ingredient(ingredient.id, attribute.id).await.unwrap();
        }
        ingredient.id
    }

    #[tokio::test]
    async fn test_define_and_get_composition() {
        let f = fixture();
        let burrata = tagged(&f, "Burrata", &["vegetarian", "dairy"]).await;
        let arugula = tagged(&f, "Arugula", &["vegetarian", "vegan"]).await;

        let offering = f
            .composer
            .define_offering(
                OfferingBuilder::new()
                    .name("Burrata Salad")
                    .price(Decimal::new(1200, 2))
                    .quantity(10)
                    .mandatory(burrata)
                    .removable(arugula)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        let composition = f.composer.get_composition(offering.id).await.unwrap();
        assert_eq!(composition.len(), 2);
        assert_eq!(composition[0].ingredient.name, "Burrata");
        assert!(!composition[0].is_removable);
        assert!(composition[1].is_removable);
    }

    #[tokio::test]
    async fn test_missing_ingredient_is_a_validation_error() {
        let f = fixture();
        let draft = OfferingBuilder::new()
            .name("Ghost Soup")
            .mandatory(IngredientId(404))
            .build()
            .unwrap();

        let err = f.composer.define_offering(draft).await.unwrap_err();
        assert!(matches!(err, GalleyError::Validation(_)));
        assert!(f.composer.list_offerings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_category_is_not_found() {
        let f = fixture();
        let bread = tagged(&f, "Bread", &["gluten"]).await;
        let draft = OfferingBuilder::new()
            .name("Bruschetta")
            .category(CategoryId(999))
            .mandatory(bread)
            .build()
            .unwrap();

        let err = f.composer.define_offering(draft).await.unwrap_err();
        assert!(matches!(err, GalleyError::NotFound { entity: Entity::Category, .. }));
    }

    #[tokio::test]
    async fn test_composition_of_unknown_offering() {
        let f = fixture();
        let err = f.composer.get_composition(OfferingId(7)).await.unwrap_err();
        assert!(matches!(err, GalleyError::NotFound { entity: Entity::Offering, .. }));
    }

    #[tokio::test]
    async fn test_profile_uses_mandatory_ingredients_only() {
        let f = fixture();
        let burrata = tagged(&f, "Burrata", &["vegetarian", "dairy"]).await;
        let prosciutto = tagged(&f, "Prosciutto", &["pork"]).await;
        let arugula = tagged(&f, "Arugula", &["vegetarian", "vegan"]).await;
        let glaze = tagged(&f, "Balsamic Glaze", &["vegetarian", "vegan", "alcohol"]).await;

        let offering = f
            .composer
            .define_offering(
                OfferingBuilder::new()
                    .name("Burrata con Prosciutto")
                    .price(Decimal::new(1450, 2))
                    .mandatory(burrata)
                    .mandatory(prosciutto)
                    .removable(arugula)
                    .removable(glaze)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        let profile = f.composer.dietary_profile(offering.id).await.unwrap();
        // Prosciutto is not tagged vegetarian, so the intersection is empty.
        assert!(profile.baseline.is_empty());
        assert!(profile.contains("pork"));
        assert!(profile.contains("Dairy"));
        assert!(!profile.contains("alcohol"));
        assert_eq!(profile.removable_exclusionary.get("alcohol"), Some(&vec![glaze]));
    }

    #[tokio::test]
    async fn test_vegan_does_not_imply_vegetarian() {
        let f = fixture();
        let tofu = tagged(&f, "Tofu", &["vegan"]).await;
        let offering = f
            .composer
            .define_offering(OfferingBuilder::new().name("Tofu Bowl").mandatory(tofu).build().unwrap())
            .await
            .unwrap();

        let profile = f.composer.dietary_profile(offering.id).await.unwrap();
        assert!(profile.is("vegan"));
        assert!(!profile.is("vegetarian"));
    }

    #[tokio::test]
    async fn test_profile_follows_link_changes() {
        let f = fixture();
        let pesto = tagged(&f, "Pesto", &["vegetarian"]).await;
        let offering = f
            .composer
            .define_offering(OfferingBuilder::new().name("Trofie").mandatory(pesto).build().unwrap())
            .await
            .unwrap();
        assert!(!f.composer.dietary_profile(offering.id).await.unwrap().contains("nuts"));

        let nuts = f.catalog.create_attribute("nuts").await.unwrap();
        f.catalog.tag_ingredient(pesto, nuts.id).await.unwrap();
        assert!(f.composer.dietary_profile(offering.id).await.unwrap().contains("nuts"));

        f.catalog.untag_ingredient(pesto, nuts.id).await.unwrap();
        assert!(!f.composer.dietary_profile(offering.id).await.unwrap().contains("nuts"));
    }

    #[tokio::test]
    async fn test_update_and_replace_composition() {
        let f = fixture();
        let dough = tagged(&f, "Dough", &["gluten"]).await;
        let tomato = tagged(&f, "Tomato", &["vegan"]).await;
        let offering = f
            .composer
            .define_offering(OfferingBuilder::new().name("Marinara").mandatory(dough).build().unwrap())
            .await
            .unwrap();

        let updated = f
            .composer
            .update_offering(
                offering.id,
                OfferingUpdate {
                    price: Some(Decimal::new(900, 2)),
                    recommended: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price, Decimal::new(900, 2));
        assert!(updated.recommended);

        let entries = f
            .composer
            .set_composition(
                offering.id,
                vec![CompositionLine::mandatory(dough), CompositionLine::removable(tomato)],
            )
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);

        let err = f.composer.set_composition(offering.id, vec![]).await.unwrap_err();
        assert!(matches!(err, GalleyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_offering_cascades_composition() {
        let f = fixture();
        let lemon = tagged(&f, "Lemon", &["vegan"]).await;
        let offering = f
            .composer
            .define_offering(OfferingBuilder::new().name("Sorbetto").mandatory(lemon).build().unwrap())
            .await
            .unwrap();

        f.composer.delete_offering(offering.id).await.unwrap();
        assert!(f.composer.get_offering(offering.id).await.is_err());
        assert!(f.composer.get_composition(offering.id).await.is_err());
        assert!(f.catalog.get_ingredient(lemon).await.is_ok());
    }
}
