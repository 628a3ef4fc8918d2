//! Application state.

use std::sync::Arc;

use galley_core::Result;
use galley_menu::{Catalog, CatalogSeed, Composer, DietaryFilter, Menu};
use galley_orders::{OrderManager, RefreshPolicy};
use galley_store::InMemoryStore;
use tracing::info;

use crate::config::GalleyConfig;

/// Shared application state. Every component holds the same store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryStore>,
    pub catalog: Catalog<InMemoryStore>,
    pub composer: Composer<InMemoryStore>,
    pub dietary: DietaryFilter<InMemoryStore>,
    pub menu: Menu<InMemoryStore>,
    pub orders: OrderManager<InMemoryStore>,
}

impl AppState {
    /// Create state over an empty store.
    pub fn new(policy: RefreshPolicy) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), policy)
    }

    pub fn with_store(store: Arc<InMemoryStore>, policy: RefreshPolicy) -> Self {
        Self {
            catalog: Catalog::new(store.clone()),
            composer: Composer::new(store.clone()),
            dietary: DietaryFilter::new(store.clone()),
            menu: Menu::new(store.clone()),
            orders: OrderManager::with_policy(store.clone(), policy),
            store,
        }
    }

    /// Build state from configuration, loading the seed catalog if one is set.
    pub async fn from_config(config: &GalleyConfig) -> Result<Self> {
        let state = Self::new(config.refresh.policy()?);

        if let Some(path) = &config.catalog.seed_path {
            info!(path = %path.display(), "Loading catalog seed");
            CatalogSeed::from_path(path)?.apply(state.store.as_ref()).await?;
        }
        Ok(state)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RefreshPolicy::default())
    }
}
