//! Table rows and row-level lookups.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use galley_core::{
    normalize_name, Attribute, AttributeId, Category, CategoryId, Entity, GalleyError,
    Ingredient, IngredientId, ModificationId, Offering, OfferingId, OfferingIngredient,
    OrderItem, OrderItemId, OrderItemModification, OrderStatus, Result, StatusTransition,
    TransitionCause,
};

/// Rows that only ever grow: the status log and archived order items with
/// their modifications.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub transitions: Vec<StatusTransition>,
    pub order_items: BTreeMap<OrderItemId, OrderItem>,
    pub modifications: BTreeMap<ModificationId, OrderItemModification>,
}

impl History {
    fn is_empty(&self) -> bool {
        self.transitions.is_empty() && self.order_items.is_empty() && self.modifications.is_empty()
    }

    fn extend(&mut self, other: History) {
        self.transitions.extend(other.transitions);
        self.order_items.extend(other.order_items);
        self.modifications.extend(other.modifications);
    }
}

/// Every table of the engine.
///
/// Rows are plain values; cascade and restrict rules are enforced by the
/// component that owns the table before it mutates anything here.
///
/// `order_items` and `modifications` hold live rows only. Committed history
/// sits behind an `Arc`, so cloning the tables never copies it; additions
/// made through a copy are kept apart until [`fold_history`](Self::fold_history)
/// merges them.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub categories: BTreeMap<CategoryId, Category>,
    pub ingredients: BTreeMap<IngredientId, Ingredient>,
    pub attributes: BTreeMap<AttributeId, Attribute>,
    /// Ingredient to attribute links, unique per pair.
    pub ingredient_attributes: BTreeSet<(IngredientId, AttributeId)>,
    pub offerings: BTreeMap<OfferingId, Offering>,
    /// Composition rows per offering, in definition order.
    pub compositions: BTreeMap<OfferingId, Vec<OfferingIngredient>>,
    pub order_items: BTreeMap<OrderItemId, OrderItem>,
    pub modifications: BTreeMap<ModificationId, OrderItemModification>,
    history: Arc<History>,
    appended: History,

    /// Last surrogate key handed out. Keys are never reused.
    sequence: u64,
}

impl Tables {
    /// Create an empty set of tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next surrogate key.
    pub fn next_key(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    pub fn category(&self, id: CategoryId) -> Result<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| GalleyError::not_found(Entity::Category, id))
    }

    pub fn ingredient(&self, id: IngredientId) -> Result<&Ingredient> {
        self.ingredients
            .get(&id)
            .ok_or_else(|| GalleyError::not_found(Entity::Ingredient, id))
    }

    pub fn attribute(&self, id: AttributeId) -> Result<&Attribute> {
        self.attributes
            .get(&id)
            .ok_or_else(|| GalleyError::not_found(Entity::Attribute, id))
    }

    pub fn offering(&self, id: OfferingId) -> Result<&Offering> {
        self.offerings
            .get(&id)
            .ok_or_else(|| GalleyError::not_found(Entity::Offering, id))
    }

    pub fn offering_mut(&mut self, id: OfferingId) -> Result<&mut Offering> {
        self.offerings
            .get_mut(&id)
            .ok_or_else(|| GalleyError::not_found(Entity::Offering, id))
    }

    /// A live or archived order item.
    pub fn order_item(&self, id: OrderItemId) -> Result<&OrderItem> {
        self.order_items
            .get(&id)
            .or_else(|| self.history.order_items.get(&id))
            .or_else(|| self.appended.order_items.get(&id))
            .ok_or_else(|| GalleyError::not_found(Entity::OrderItem, id))
    }

    /// A live order item. Archived rows are frozen.
    pub fn order_item_mut(&mut self, id: OrderItemId) -> Result<&mut OrderItem> {
        self.order_items
            .get_mut(&id)
            .ok_or_else(|| GalleyError::not_found(Entity::OrderItem, id))
    }

    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        let key = normalize_name(name);
        self.categories
            .values()
            .find(|c| normalize_name(&c.name) == key)
    }

    pub fn ingredient_by_name(&self, name: &str) -> Option<&Ingredient> {
        let key = normalize_name(name);
        self.ingredients
            .values()
            .find(|i| normalize_name(&i.name) == key)
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        let key = normalize_name(name);
        self.attributes
            .values()
            .find(|a| normalize_name(&a.name) == key)
    }

    pub fn offering_by_name(&self, name: &str) -> Option<&Offering> {
        let key = normalize_name(name);
        self.offerings
            .values()
            .find(|o| normalize_name(&o.name) == key)
    }

    /// Attributes currently linked to an ingredient.
    pub fn attributes_of(&self, ingredient_id: IngredientId) -> impl Iterator<Item = &Attribute> {
        self.ingredient_attributes
            .range((ingredient_id, AttributeId(0))..=(ingredient_id, AttributeId(u64::MAX)))
            .filter_map(|(_, attribute_id)| self.attributes.get(attribute_id))
    }

    /// Composition rows of an offering; empty if it has none.
    pub fn composition(&self, offering_id: OfferingId) -> &[OfferingIngredient] {
        self.compositions
            .get(&offering_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Live and archived order items, live ones first.
    pub fn all_order_items(&self) -> impl Iterator<Item = &OrderItem> {
        self.order_items
            .values()
            .chain(self.history.order_items.values())
            .chain(self.appended.order_items.values())
    }

    /// Live and archived modifications.
    pub fn all_modifications(&self) -> impl Iterator<Item = &OrderItemModification> {
        self.modifications
            .values()
            .chain(self.history.modifications.values())
            .chain(self.appended.modifications.values())
    }

    /// Ingredients removed from an order item.
    pub fn modifications_of(
        &self,
        order_item_id: OrderItemId,
    ) -> impl Iterator<Item = &OrderItemModification> {
        self.all_modifications()
            .filter(move |m| m.order_item_id == order_item_id)
    }

    /// The status log, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &StatusTransition> {
        self.history
            .transitions
            .iter()
            .chain(self.appended.transitions.iter())
    }

    /// Move a paid or cancelled item and its modifications out of the live
    /// tables into history.
    pub fn archive_order_item(&mut self, id: OrderItemId, at: DateTime<Utc>) -> Result<OrderItem> {
        let current = self.order_item(id)?;
        if current.archived {
            return Err(GalleyError::conflict(
                Entity::OrderItem,
                format!("order item {} is already archived", id),
            ));
        }
        if current.is_live() {
            return Err(GalleyError::InvalidTransition {
                order_item_id: id,
                from: current.status,
                action: "archive".to_string(),
            });
        }
        let mut item = self
            .order_items
            .remove(&id)
            .ok_or_else(|| GalleyError::not_found(Entity::OrderItem, id))?;
        item.archived = true;
        item.updated_at = at;

        let modification_ids: Vec<ModificationId> = self
            .modifications
            .values()
            .filter(|m| m.order_item_id == id)
            .map(|m| m.id)
            .collect();
        for modification_id in modification_ids {
            if let Some(modification) = self.modifications.remove(&modification_id) {
                self.appended.modifications.insert(modification_id, modification);
            }
        }
        self.appended.order_items.insert(id, item.clone());
        Ok(item)
    }

    /// Merge history added through this copy into the shared history.
    ///
    /// Appending copies the shared history only while another handle to it is
    /// alive, so the store drops its previous tables before calling this.
    pub fn fold_history(&mut self) {
        if self.appended.is_empty() {
            return;
        }
        let appended = std::mem::take(&mut self.appended);
        Arc::make_mut(&mut self.history).extend(appended);
    }

    /// Record the initial `pending` entry of a newly placed item.
    pub fn log_placement(&mut self, order_item_id: OrderItemId, at: DateTime<Utc>) {
        self.appended.transitions.push(StatusTransition {
            order_item_id,
            from: None,
            to: OrderStatus::Pending,
            at,
            cause: TransitionCause::Placed,
        });
    }

    /// Move an item from `expected` to `next`, or fail without touching it.
    ///
    /// This is the only path that writes a status. It fails with
    /// `InvalidTransition` when the stored status is no longer `expected`
    /// (another caller got there first) or when `expected -> next` is not an
    /// edge of the state graph.
    pub fn compare_and_set_status(
        &mut self,
        order_item_id: OrderItemId,
        expected: OrderStatus,
        next: OrderStatus,
        at: DateTime<Utc>,
        cause: TransitionCause,
    ) -> Result<OrderItem> {
        let action = match cause {
            TransitionCause::Cancellation => "cancel",
            TransitionCause::Settlement => "settle",
            _ => "advance",
        };
        let current = self.order_item(order_item_id)?.status;
        if current != expected || !expected.can_transition_to(next) {
            return Err(GalleyError::InvalidTransition {
                order_item_id,
                from: current,
                action: action.to_string(),
            });
        }

        let item = self.order_item_mut(order_item_id)?;
        item.status = next;
        item.updated_at = at;
        let updated = item.clone();

        self.appended.transitions.push(StatusTransition {
            order_item_id,
            from: Some(expected),
            to: next,
            at,
            cause,
        });

        Ok(updated)
    }
}
