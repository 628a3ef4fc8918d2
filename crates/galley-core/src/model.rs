//! Row types for the catalog, composition and order tables.
//!
//! These are plain data. Referential rules live with the components that
//! own each table, not here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{
    AttributeClass, AttributeId, CategoryId, IngredientId, ModificationId, OfferingId, OrderId,
    OrderItemId, OrderStatus,
};

/// A menu section. `is_food` splits the menu into food and beverages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub is_food: bool,
}

/// The atomic unit of composition, shared by any number of offerings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub name: String,
}

/// A dietary or allergen tag such as `vegetarian` or `gluten`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
}

impl Attribute {
    pub fn class(&self) -> AttributeClass {
        AttributeClass::of(&self.name)
    }
}

/// A sellable dish or drink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: OfferingId,
    pub name: String,
    pub description: String,
    /// Flat price, two decimal places.
    pub price: Decimal,
    /// Absent when the category was deleted or never assigned.
    pub category_id: Option<CategoryId>,
    /// Units still available to order.
    pub quantity: u32,
    pub recommended: bool,
}

/// One composition row: an ingredient of an offering and whether a guest
/// may ask for it to be left out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingIngredient {
    pub offering_id: OfferingId,
    pub ingredient_id: IngredientId,
    pub is_removable: bool,
}

/// One line of a customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub offering_id: OfferingId,
    pub quantity: u32,
    pub special_instructions: Option<String>,
    pub status: OrderStatus,
    /// Set once a settled item has been closed out; receipts skip it.
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderItem {
    /// Returns true until the item is paid or cancelled.
    pub fn is_live(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// An ingredient the guest asked to omit from one order item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemModification {
    pub id: ModificationId,
    pub order_item_id: OrderItemId,
    pub ingredient_id: IngredientId,
}

/// What triggered a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    /// Placement of the item (the initial `pending` entry).
    Placed,
    /// An explicit `advance` call.
    Advance,
    /// The time-driven refresh sweep.
    Sweep,
    /// A cancellation request.
    Cancellation,
    /// Settlement of the order.
    Settlement,
}

/// Append-only log entry for one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub order_item_id: OrderItemId,
    /// `None` for the entry recorded at placement.
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
    pub cause: TransitionCause,
}
