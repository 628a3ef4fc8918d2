//! # Galley Store
//!
//! The owned relational store behind the catalog and order components.
//!
//! [`Tables`] holds every row; [`Store`] is the repository seam components are
//! handed, and [`InMemoryStore`] commits each write transaction all-or-nothing.

pub mod store;
pub mod tables;

pub use store::{InMemoryStore, Store};
pub use tables::{History, Tables};
