//! Error types for the Galley engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{IngredientId, OfferingId, OrderItemId, OrderStatus};

/// The kind of row an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Category,
    Ingredient,
    Attribute,
    IngredientAttribute,
    Offering,
    OrderItem,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Category => "category",
            Entity::Ingredient => "ingredient",
            Entity::Attribute => "attribute",
            Entity::IngredientAttribute => "ingredient attribute",
            Entity::Offering => "offering",
            Entity::OrderItem => "order item",
        };
        f.write_str(name)
    }
}

/// Main error type for Galley operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GalleyError {
    /// A referenced row does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    /// A unique name is already taken, or a restrict rule blocks a delete.
    #[error("{entity} conflict: {detail}")]
    Conflict { entity: Entity, detail: String },

    /// Malformed input, detected before any write begins.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A requested ingredient removal is not allowed by the offering's composition.
    #[error("Cannot remove ingredient {ingredient_id} from offering {offering_id}: {reason}")]
    InvalidModification {
        offering_id: OfferingId,
        ingredient_id: IngredientId,
        reason: String,
    },

    /// Requested quantity exceeds what the offering has available.
    #[error("Offering {offering_id} is out of stock: requested {requested}, available {available}")]
    OutOfStock {
        offering_id: OfferingId,
        requested: u32,
        available: u32,
    },

    /// A status change violates the order item state graph.
    #[error("Cannot {action} order item {order_item_id} while it is {from}")]
    InvalidTransition {
        order_item_id: OrderItemId,
        from: OrderStatus,
        action: String,
    },

    /// Storage layer failure.
    #[error("Store error: {message}")]
    Store { message: String },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GalleyError {
    /// Shorthand for a [`GalleyError::NotFound`].
    pub fn not_found(entity: Entity, key: impl ToString) -> Self {
        GalleyError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for a [`GalleyError::Conflict`].
    pub fn conflict(entity: Entity, detail: impl Into<String>) -> Self {
        GalleyError::Conflict {
            entity,
            detail: detail.into(),
        }
    }

    /// Shorthand for a [`GalleyError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        GalleyError::Validation(message.into())
    }

    /// Returns true if the caller may retry the operation unchanged.
    ///
    /// Only storage failures qualify; every other kind is a property of the
    /// request or of committed state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GalleyError::Store { .. })
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            GalleyError::NotFound { .. } => "not_found",
            GalleyError::Conflict { .. } => "conflict",
            GalleyError::Validation(_) => "validation_error",
            GalleyError::InvalidModification { .. } => "invalid_modification",
            GalleyError::OutOfStock { .. } => "out_of_stock",
            GalleyError::InvalidTransition { .. } => "invalid_transition",
            GalleyError::Store { .. } => "store_error",
            GalleyError::Serialization(_) => "serialization_error",
        }
    }
}

/// Convenience Result type for Galley operations.
pub type Result<T> = std::result::Result<T, GalleyError>;

impl From<serde_json::Error> for GalleyError {
    fn from(err: serde_json::Error) -> Self {
        GalleyError::Serialization(err.to_string())
    }
}
