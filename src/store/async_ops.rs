//! Async wrappers for `SessionStore` operations.
//!
//! These methods wrap the synchronous operations in `spawn_blocking` to
//! avoid blocking the async runtime. Use these from request handlers.

use super::session::SessionStore;
use crate::error::Result;
use crate::record::Record;

impl SessionStore {
    /// Async version of `load` that uses `spawn_blocking`.
    pub async fn load_async(&self, key: Vec<u8>) -> Result<Option<Record>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load(&key)).await?
    }

    /// Async version of `save` that uses `spawn_blocking`.
    pub async fn save_async(&self, key: Vec<u8>, payload: Vec<u8>, max_age_secs: i64) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save(&key, &payload, max_age_secs)).await?
    }

    /// Async version of `delete` that uses `spawn_blocking`.
    pub async fn delete_async(&self, key: Vec<u8>) -> Result<bool> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.delete(&key)).await?
    }

    /// Opens a store asynchronously.
    pub async fn open_async(config: crate::config::StoreConfig) -> Result<Self> {
        tokio::task::spawn_blocking(move || Self::open(&config)).await?
    }
}
