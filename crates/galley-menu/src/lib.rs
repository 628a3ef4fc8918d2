//! # Galley Menu
//!
//! The read side of the engine, leaves first:
//!
//! - [`Catalog`] - categories, ingredients, attributes and their links
//! - [`Composer`] - offerings, their compositions and derived dietary profiles
//! - [`DietaryFilter`] - three-way feasibility of an offering under a dietary query
//! - [`Menu`] - filtered menu views for the UI and tool layers
//! - [`CatalogSeed`] - loading a whole catalog from JSON in one transaction
//!
//! Every component holds an explicit [`Store`](galley_store::Store) handle;
//! derived data is recomputed from current rows on each call.

pub mod catalog;
pub mod composer;
pub mod dietary;
pub mod menu;
pub mod seed;

pub use catalog::{Catalog, CategoryUpdate};
pub use composer::{Composer, CompositionEntry, DietaryProfile};
pub use dietary::{AttributeCheck, AttributeReport, DietaryFilter, DietaryQuery, Feasibility};
pub use menu::{Menu, MenuEntry, MenuIngredient, MenuQuery};
pub use seed::{CatalogSeed, SeedSummary};
