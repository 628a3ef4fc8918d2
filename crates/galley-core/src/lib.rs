//! # Galley Core
//!
//! Core primitives and types for the Galley menu and order engine.
//!
//! This crate provides the fundamental building blocks:
//! - [`types`] - Surrogate keys, [`OrderStatus`] and [`AttributeClass`]
//! - [`model`] - Row types for the catalog, composition and order tables
//! - [`OfferingBuilder`] - Validated drafts for new menu offerings
//! - [`GalleyError`] - Error kinds shared by every component

pub mod error;
pub mod model;
pub mod offering;
pub mod types;

// Re-exports for convenience
pub use error::{Entity, GalleyError, Result};
pub use model::*;
pub use offering::{CompositionLine, OfferingBuilder, OfferingDraft, OfferingUpdate};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Entity, GalleyError, Result};
    pub use crate::model::{
        Attribute, Category, Ingredient, Offering, OfferingIngredient, OrderItem,
        OrderItemModification, StatusTransition, TransitionCause,
    };
    pub use crate::offering::{CompositionLine, OfferingBuilder, OfferingDraft, OfferingUpdate};
    pub use crate::types::{
        AttributeClass, AttributeId, CategoryId, IngredientId, ModificationId, OfferingId,
        OrderId, OrderItemId, OrderStatus,
    };
}
