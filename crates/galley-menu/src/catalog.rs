//! Catalog master data: categories, ingredients, attributes and the
//! ingredient to attribute links.
//!
//! Names are unique per table after normalization (see
//! [`normalize_name`](galley_core::normalize_name)). Deletes apply their
//! cascade and restrict rules here, before any row is touched.

use std::sync::Arc;

use galley_core::offering::validate_name;
use galley_core::{
    Attribute, AttributeId, Category, CategoryId, Entity, GalleyError, Ingredient, IngredientId,
    Result,
};
use galley_store::{Store, Tables};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Edits to a category. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_food: Option<bool>,
}

/// Handle to the catalog tables.
pub struct Catalog<S> {
    store: Arc<S>,
}

impl<S> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> Catalog<S> {
    /// Create a catalog over a store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    // ---------------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------------

    pub async fn create_category(&self, name: &str, is_food: bool) -> Result<Category> {
        let name = name.to_string();
        let category = self
            .store
            .write(move |tables| insert_category(tables, &name, is_food))
            .await?;
        info!(category_id = %category.id, name = %category.name, "Created category");
        Ok(category)
    }

    pub async fn get_category(&self, id: CategoryId) -> Result<Category> {
        self.store
            .read(move |tables| tables.category(id).cloned())
            .await
    }

    /// Look a category up by name.
    pub async fn find_category(&self, name: &str) -> Result<Category> {
        let name = name.to_string();
        self.store
            .read(move |tables| {
                tables
                    .category_by_name(&name)
                    .cloned()
                    .ok_or_else(|| GalleyError::not_found(Entity::Category, &name))
            })
            .await
    }

    /// List categories, optionally only the food or only the beverage ones.
    pub async fn list_categories(&self, is_food: Option<bool>) -> Result<Vec<Category>> {
        debug!(?is_food, "Listing categories");
        self.store
            .read(move |tables| {
                Ok(tables
                    .categories
                    .values()
                    .filter(|c| is_food.map_or(true, |food| c.is_food == food))
                    .cloned()
                    .collect())
            })
            .await
    }

    pub async fn update_category(&self, id: CategoryId, update: CategoryUpdate) -> Result<Category> {
        self.store
            .write(move |tables| {
                if let Some(name) = &update.name {
                    validate_name(name)?;
                    ensure_unique(
                        tables.category_by_name(name).map(|c| c.id != id),
                        Entity::Category,
                        name,
                    )?;
                }
                let category = tables
                    .categories
                    .get_mut(&id)
                    .ok_or_else(|| GalleyError::not_found(Entity::Category, id))?;
                if let Some(name) = update.name {
                    category.name = name.trim().to_string();
                }
                if let Some(is_food) = update.is_food {
                    category.is_food = is_food;
                }
                Ok(category.clone())
            })
            .await
    }

    /// Delete a category. Its offerings stay on the menu without a category.
    pub async fn delete_category(&self, id: CategoryId) -> Result<()> {
        let detached = self
            .store
            .write(move |tables| {
                tables.category(id)?;
                let mut detached = 0;
                for offering in tables.offerings.values_mut() {
                    if offering.category_id == Some(id) {
                        offering.category_id = None;
                        detached += 1;
                    }
                }
                tables.categories.remove(&id);
                Ok(detached)
            })
            .await?;
        info!(category_id = %id, detached, "Deleted category");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Ingredients
    // ---------------------------------------------------------------------

    pub async fn create_ingredient(&self, name: &str) -> Result<Ingredient> {
        let name = name.to_string();
        let ingredient = self
            .store
            .write(move |tables| insert_ingredient(tables, &name))
            .await?;
        info!(ingredient_id = %ingredient.id, name = %ingredient.name, "Created ingredient");
        Ok(ingredient)
    }

    pub async fn get_ingredient(&self, id: IngredientId) -> Result<Ingredient> {
        self.store
            .read(move |tables| tables.ingredient(id).cloned())
            .await
    }

    /// Look an ingredient up by name.
    pub async fn find_ingredient(&self, name: &str) -> Result<Ingredient> {
        let name = name.to_string();
        self.store
            .read(move |tables| {
                tables
                    .ingredient_by_name(&name)
                    .cloned()
                    .ok_or_else(|| GalleyError::not_found(Entity::Ingredient, &name))
            })
            .await
    }

    pub async fn list_ingredients(&self) -> Result<Vec<Ingredient>> {
        self.store
            .read(|tables| Ok(tables.ingredients.values().cloned().collect()))
            .await
    }

    pub async fn rename_ingredient(&self, id: IngredientId, name: &str) -> Result<Ingredient> {
        let name = name.to_string();
        self.store
            .write(move |tables| {
                validate_name(&name)?;
                ensure_unique(
                    tables.ingredient_by_name(&name).map(|i| i.id != id),
                    Entity::Ingredient,
                    &name,
                )?;
                let ingredient = tables
                    .ingredients
                    .get_mut(&id)
                    .ok_or_else(|| GalleyError::not_found(Entity::Ingredient, id))?;
                ingredient.name = name.trim().to_string();
                Ok(ingredient.clone())
            })
            .await
    }

    /// Delete an ingredient.
    ///
    /// Rejected with `Conflict` while any order item records it as removed, or
    /// while it is the last ingredient of an offering. Otherwise its attribute
    /// links and its composition rows go with it.
    pub async fn delete_ingredient(&self, id: IngredientId) -> Result<()> {
        self.store
            .write(move |tables| {
                tables.ingredient(id)?;
                if tables.all_modifications().any(|m| m.ingredient_id == id) {
                    return Err(GalleyError::conflict(
                        Entity::Ingredient,
                        format!("ingredient {} is referenced by order modifications", id),
                    ));
                }
                if let Some(offering_id) = tables
                    .compositions
                    .iter()
                    .find(|(_, rows)| !rows.is_empty() && rows.iter().all(|row| row.ingredient_id == id))
                    .map(|(offering_id, _)| *offering_id)
                {
                    return Err(GalleyError::conflict(
                        Entity::Ingredient,
                        format!("ingredient {} is the only ingredient of offering {}", id, offering_id),
                    ));
                }
                tables.ingredient_attributes.retain(|(ingredient_id, _)| *ingredient_id != id);
                for rows in tables.compositions.values_mut() {
                    rows.retain(|row| row.ingredient_id != id);
                }
                tables.ingredients.remove(&id);
                Ok(())
            })
            .await?;
        info!(ingredient_id = %id, "Deleted ingredient");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Attributes
    // ---------------------------------------------------------------------

    pub async fn create_attribute(&self, name: &str) -> Result<Attribute> {
        let name = name.to_string();
        let attribute = self
            .store
            .write(move |tables| insert_attribute(tables, &name))
            .await?;
        info!(attribute_id = %attribute.id, name = %attribute.name, "Created attribute");
        Ok(attribute)
    }

    pub async fn get_attribute(&self, id: AttributeId) -> Result<Attribute> {
        self.store
            .read(move |tables| tables.attribute(id).cloned())
            .await
    }

    /// Look an attribute up by name.
    pub async fn find_attribute(&self, name: &str) -> Result<Attribute> {
        let name = name.to_string();
        self.store
            .read(move |tables| {
                tables
                    .attribute_by_name(&name)
                    .cloned()
                    .ok_or_else(|| GalleyError::not_found(Entity::Attribute, &name))
            })
            .await
    }

    pub async fn list_attributes(&self) -> Result<Vec<Attribute>> {
        self.store
            .read(|tables| Ok(tables.attributes.values().cloned().collect()))
            .await
    }

    pub async fn rename_attribute(&self, id: AttributeId, name: &str) -> Result<Attribute> {
        let name = name.to_string();
        self.store
            .write(move |tables| {
                validate_name(&name)?;
                ensure_unique(
                    tables.attribute_by_name(&name).map(|a| a.id != id),
                    Entity::Attribute,
                    &name,
                )?;
                let attribute = tables
                    .attributes
                    .get_mut(&id)
                    .ok_or_else(|| GalleyError::not_found(Entity::Attribute, id))?;
                attribute.name = name.trim().to_string();
                Ok(attribute.clone())
            })
            .await
    }

    /// Delete an attribute. Ingredients lose the tag, not their existence.
    pub async fn delete_attribute(&self, id: AttributeId) -> Result<()> {
        self.store
            .write(move |tables| {
                tables.attribute(id)?;
                tables.ingredient_attributes.retain(|(_, attribute_id)| *attribute_id != id);
                tables.attributes.remove(&id);
                Ok(())
            })
            .await?;
        info!(attribute_id = %id, "Deleted attribute");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Ingredient attributes
    // ---------------------------------------------------------------------

    /// Link an attribute to an ingredient.
    pub async fn tag_ingredient(&self, ingredient_id: IngredientId, attribute_id: AttributeId) -> Result<()> {
        self.store
            .write(move |tables| link_attribute(tables, ingredient_id, attribute_id))
            .await?;
        info!(ingredient_id = %ingredient_id, attribute_id = %attribute_id, "Tagged ingredient");
        Ok(())
    }

    /// Remove the link between an ingredient and an attribute.
    pub async fn untag_ingredient(&self, ingredient_id: IngredientId, attribute_id: AttributeId) -> Result<()> {
        self.store
            .write(move |tables| {
                if !tables.ingredient_attributes.remove(&(ingredient_id, attribute_id)) {
                    return Err(GalleyError::not_found(
                        Entity::IngredientAttribute,
                        format!("{}/{}", ingredient_id, attribute_id),
                    ));
                }
                Ok(())
            })
            .await?;
        info!(ingredient_id = %ingredient_id, attribute_id = %attribute_id, "Untagged ingredient");
        Ok(())
    }

    /// Attributes currently linked to an ingredient.
    pub async fn ingredient_attributes(&self, ingredient_id: IngredientId) -> Result<Vec<Attribute>> {
        self.store
            .read(move |tables| {
                tables.ingredient(ingredient_id)?;
                Ok(tables.attributes_of(ingredient_id).cloned().collect())
            })
            .await
    }
}

/// Fail with `Conflict` when a name lookup found a different row.
fn ensure_unique(clash: Option<bool>, entity: Entity, name: &str) -> Result<()> {
    if clash == Some(true) {
        return Err(GalleyError::conflict(
            entity,
            format!("name '{}' already exists", name.trim()),
        ));
    }
    Ok(())
}

pub(crate) fn insert_category(tables: &mut Tables, name: &str, is_food: bool) -> Result<Category> {
    validate_name(name)?;
    ensure_unique(tables.category_by_name(name).map(|_| true), Entity::Category, name)?;
    let category = Category {
        id: CategoryId(tables.next_key()),
        name: name.trim().to_string(),
        is_food,
    };
    tables.categories.insert(category.id, category.clone());
    Ok(category)
}

pub(crate) fn insert_ingredient(tables: &mut Tables, name: &str) -> Result<Ingredient> {
    validate_name(name)?;
    ensure_unique(tables.ingredient_by_name(name).map(|_| true), Entity::Ingredient, name)?;
    let ingredient = Ingredient {
        id: IngredientId(tables.next_key()),
        name: name.trim().to_string(),
    };
    tables.ingredients.insert(ingredient.id, ingredient.clone());
    Ok(ingredient)
}

pub(crate) fn insert_attribute(tables: &mut Tables, name: &str) -> Result<Attribute> {
    validate_name(name)?;
    ensure_unique(tables.attribute_by_name(name).map(|_| true), Entity::Attribute, name)?;
    let attribute = Attribute {
        id: AttributeId(tables.next_key()),
        name: name.trim().to_string(),
    };
    tables.attributes.insert(attribute.id, attribute.clone());
    Ok(attribute)
}

pub(crate) fn link_attribute(
    tables: &mut Tables,
    ingredient_id: IngredientId,
    attribute_id: AttributeId,
) -> Result<()> {
    tables.ingredient(ingredient_id)?;
    tables.attribute(attribute_id)?;
    if !tables.ingredient_attributes.insert((ingredient_id, attribute_id)) {
        return Err(GalleyError::conflict(
            Entity::IngredientAttribute,
            format!("ingredient {} is already tagged with attribute {}", ingredient_id, attribute_id),
        ));
    }
    Ok(())
}
