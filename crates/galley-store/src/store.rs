//! Store implementations.

use std::sync::Arc;

use async_trait::async_trait;
use galley_core::Result;
use tokio::sync::RwLock;

use crate::tables::Tables;

/// Trait for stores.
///
/// Components receive a handle to a store instead of reaching for shared
/// globals. Reads see committed rows only; a write either commits every change
/// its closure made or none of them.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Run `f` against the committed tables.
    async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Tables) -> Result<R> + Send,
        R: Send;

    /// Run `f` as one transaction. An `Err` from `f` discards all of its changes.
    async fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Tables) -> Result<R> + Send,
        R: Send;

    /// Number of committed write transactions.
    async fn version(&self) -> u64;
}

struct Committed {
    tables: Tables,
    version: u64,
}

/// In-memory implementation of Store.
///
/// Writers are serialized by one exclusive lock and work on a staged copy of
/// the tables that replaces the committed copy only on success. The copy
/// shares committed history; the status log and archived items are appended
/// at commit, so a write costs the size of the live rows only. Nothing awaits
/// between staging and commit, so dropping a write future (for example when
/// the caller disconnects) either happens before the lock is taken or not at
/// all: there is no partially applied state to observe.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Committed>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::with_tables(Tables::new())
    }

    /// Create a store over pre-built tables.
    pub fn with_tables(mut tables: Tables) -> Self {
        tables.fold_history();
        Self {
            inner: Arc::new(RwLock::new(Committed { tables, version: 0 })),
        }
    }

    /// A copy of the committed tables.
    pub async fn snapshot(&self) -> Tables {
        self.inner.read().await.tables.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Tables) -> Result<R> + Send,
        R: Send,
    {
        let committed = self.inner.read().await;
        f(&committed.tables)
    }

    async fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Tables) -> Result<R> + Send,
        R: Send,
    {
        let mut committed = self.inner.write().await;
        let mut staged = committed.tables.clone();

        match f(&mut staged) {
            Ok(out) => {
                committed.tables = Tables::new();
                staged.fold_history();
                committed.tables = staged;
                committed.version += 1;
                tracing::trace!(version = committed.version, "Committed write transaction");
                Ok(out)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rolled back write transaction");
                Err(e)
            }
        }
    }

    async fn version(&self) -> u64 {
        self.inner.read().await.version
    }
}
