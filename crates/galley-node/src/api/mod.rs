//! HTTP and WebSocket handlers.

pub mod catalog;
pub mod error;
pub mod health;
pub mod orders;
pub mod ws;

pub use error::ApiError;
