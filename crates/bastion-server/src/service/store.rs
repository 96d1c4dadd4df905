//! Data store collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::BoxedError;

/// Handle to the persistence layer used by mounted routes.
///
/// The handle is owned by the caller of [`start`]; the server only borrows it
/// for readiness probing and hands it to route trees, and never closes it.
///
/// [`start`]: crate::bootstrap::start
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Short name used in logs and startup errors.
    fn name(&self) -> &str;

    /// Probes the store. Startup aborts if this fails.
    async fn ping(&self) -> Result<(), BoxedError>;
}

/// In-memory [`DataStore`] keeping JSON documents by key.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the document stored under `key`.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.documents.read().await.get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous document.
    pub async fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.documents.write().await.insert(key.into(), value)
    }

    /// Removes the document stored under `key`.
    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.documents.write().await.remove(key)
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Returns `true` if no documents are stored.
    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ping(&self) -> Result<(), BoxedError> {
        Ok(())
    }
}
