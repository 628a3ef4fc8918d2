//! Filtered menu views.

use std::collections::BTreeMap;
use std::sync::Arc;

use galley_core::{normalize_name, IngredientId, Offering, Result};
use galley_store::{Store, Tables};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dietary::{assess, attribute_union, DietaryQuery, Feasibility};

/// Section name for offerings without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Menu filters. Empty fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MenuQuery {
    /// Food (`true`) or beverages (`false`). Uncategorized offerings are
    /// dropped when set.
    #[serde(default)]
    pub is_food: Option<bool>,
    /// Category names to include.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub recommended: Option<bool>,
    #[serde(default)]
    pub min_price: Option<Decimal>,
    #[serde(default)]
    pub max_price: Option<Decimal>,
    /// Ingredient names that must all appear.
    #[serde(default)]
    pub must_include: Vec<String>,
    /// Ingredient names none of which may appear.
    #[serde(default)]
    pub must_exclude: Vec<String>,
    #[serde(default)]
    pub dietary: DietaryQuery,
}

/// One ingredient line of a menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuIngredient {
    pub id: IngredientId,
    pub name: String,
    pub is_removable: bool,
}

/// One offering as shown on the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub offering: Offering,
    pub category: Option<String>,
    pub ingredients: Vec<MenuIngredient>,
    /// Union of attributes over every ingredient.
    pub attributes: Vec<String>,
    pub feasibility: Feasibility,
}

/// Handle for menu views.
pub struct Menu<S> {
    store: Arc<S>,
}

impl<S> Clone for Menu<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: Store> Menu<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Offerings matching `query`, infeasible ones omitted.
    pub async fn list(&self, query: &MenuQuery) -> Result<Vec<MenuEntry>> {
        let query = query.clone();
        let entries = self
            .store
            .read(move |tables| list_menu(tables, &query))
            .await?;
        debug!(entries = entries.len(), "Listed menu");
        Ok(entries)
    }

    /// Like [`Menu::list`], grouped by category name.
    pub async fn list_by_category(&self, query: &MenuQuery) -> Result<BTreeMap<String, Vec<MenuEntry>>> {
        let mut sections: BTreeMap<String, Vec<MenuEntry>> = BTreeMap::new();
        for entry in self.list(query).await? {
            let section = entry
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string());
            sections.entry(section).or_default().push(entry);
        }
        Ok(sections)
    }
}

fn list_menu(tables: &Tables, query: &MenuQuery) -> Result<Vec<MenuEntry>> {
    let categories: Vec<String> = query.categories.iter().map(|c| normalize_name(c)).collect();
    let must_include: Vec<String> = query.must_include.iter().map(|i| normalize_name(i)).collect();
    let must_exclude: Vec<String> = query.must_exclude.iter().map(|i| normalize_name(i)).collect();

    let mut entries = Vec::new();
    for offering in tables.offerings.values() {
        let category = offering
            .category_id
            .and_then(|id| tables.categories.get(&id));

        if let Some(is_food) = query.is_food {
            if category.map(|c| c.is_food) != Some(is_food) {
                continue;
            }
        }
        if !categories.is_empty()
            && !category.map_or(false, |c| categories.contains(&normalize_name(&c.name)))
        {
            continue;
        }
        if query.recommended.map_or(false, |r| r != offering.recommended) {
            continue;
        }
        if query.min_price.map_or(false, |min| offering.price < min)
            || query.max_price.map_or(false, |max| offering.price > max)
        {
            continue;
        }

        let mut ingredients = Vec::new();
        for row in tables.composition(offering.id) {
            let ingredient = tables.ingredient(row.ingredient_id)?;
            ingredients.push(MenuIngredient {
                id: ingredient.id,
                name: ingredient.name.clone(),
                is_removable: row.is_removable,
            });
        }
        let names: Vec<String> = ingredients.iter().map(|i| normalize_name(&i.name)).collect();
        if !must_include.iter().all(|n| names.contains(n))
            || must_exclude.iter().any(|n| names.contains(n))
        {
            continue;
        }

        let feasibility = assess(tables, offering.id, &query.dietary)?;
        if !feasibility.is_servable() {
            continue;
        }

        entries.push(MenuEntry {
            offering: offering.clone(),
            category: category.map(|c| c.name.clone()),
            ingredients,
            attributes: attribute_union(tables, offering.id).into_iter().collect(),
            feasibility,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::composer::Composer;
    use galley_core::OfferingBuilder;
    use galley_store::InMemoryStore;

    async fn menu() -> Menu<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let catalog = Catalog::new(store.clone());
        let composer = Composer::new(store.clone());

        let antipasti = catalog.create_category("Antipasti", true).await.unwrap();
        let vini = catalog.create_category("Vini", false).await.unwrap();
        let pork = catalog.create_attribute("pork").await.unwrap();
        let alcohol = catalog.create_attribute("alcohol").await.unwrap();

        let burrata = catalog.create_ingredient("Burrata").await.unwrap();
        let prosciutto = catalog.create_ingredient("Prosciutto").await.unwrap();
        let grapes = catalog.create_ingredient("Grapes").await.unwrap();
        catalog.tag_ingredient(prosciutto.id, pork.id).await.unwrap();
        catalog.tag_ingredient(grapes.id, alcohol.id).await.unwrap();

        composer
            .define_offering(
                OfferingBuilder::new()
                    .name("Burrata con Prosciutto")
                    .price(Decimal::new(1450, 2))
                    .category(antipasti.id)
                    .recommended(true)
                    .mandatory(burrata.id)
                    .mandatory(prosciutto.id)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        composer
            .define_offering(
                OfferingBuilder::new()
                    .name("Burrata Semplice")
                    .price(Decimal::new(900, 2))
                    .category(antipasti.id)
                    .mandatory(burrata.id)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        composer
            .define_offering(
                OfferingBuilder::new()
                    .name("Chianti")
                    .price(Decimal::new(800, 2))
                    .category(vini.id)
                    .mandatory(grapes.id)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        composer
            .define_offering(
                OfferingBuilder::new()
                    .name("Pane")
                    .price(Decimal::new(200, 2))
                    .mandatory(burrata.id)
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        Menu::new(store)
    }

    fn names(entries: &[MenuEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.offering.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_unfiltered_menu_lists_everything() {
        let menu = menu().await;
        assert_eq!(menu.list(&MenuQuery::default()).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_food_filter_drops_uncategorized() {
        let menu = menu().await;
        let query = MenuQuery {
            is_food: Some(true),
            ..Default::default()
        };
        let entries = menu.list(&query).await.unwrap();
        assert_eq!(names(&entries), vec!["Burrata con Prosciutto", "Burrata Semplice"]);
    }

    #[tokio::test]
    async fn test_price_and_recommended_filters() {
        let menu = menu().await;
        let query = MenuQuery {
            min_price: Some(Decimal::new(850, 2)),
            max_price: Some(Decimal::new(1000, 2)),
            ..Default::default()
        };
        assert_eq!(names(&menu.list(&query).await.unwrap()), vec!["Burrata Semplice"]);

        let query = MenuQuery {
            recommended: Some(true),
            ..Default::default()
        };
        assert_eq!(names(&menu.list(&query).await.unwrap()), vec!["Burrata con Prosciutto"]);
    }

    #[tokio::test]
    async fn test_ingredient_filters() {
        let menu = menu().await;
        let query = MenuQuery {
            must_include: vec!["burrata".to_string()],
            must_exclude: vec!["Prosciutto".to_string()],
            ..Default::default()
        };
        assert_eq!(
            names(&menu.list(&query).await.unwrap()),
            vec!["Burrata Semplice", "Pane"]
        );
    }

    #[tokio::test]
    async fn test_dietary_filter_omits_infeasible() {
        let menu = menu().await;
        let query = MenuQuery {
            categories: vec!["antipasti".to_string(), "Vini".to_string()],
            dietary: DietaryQuery::new().excluding("pork").excluding("alcohol"),
            ..Default::default()
        };
        let entries = menu.list(&query).await.unwrap();
        assert_eq!(names(&entries), vec!["Burrata Semplice"]);
        assert_eq!(entries[0].feasibility, Feasibility::Feasible);
    }

    #[tokio::test]
    async fn test_grouped_by_category() {
        let menu = menu().await;
        let sections = menu.list_by_category(&MenuQuery::default()).await.unwrap();
        assert_eq!(sections["Antipasti"].len(), 2);
        assert_eq!(sections["Vini"].len(), 1);
        assert_eq!(sections[UNCATEGORIZED].len(), 1);
        assert_eq!(sections["Vini"][0].attributes, vec!["alcohol".to_string()]);
    }
}
