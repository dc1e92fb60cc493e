use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::StorageBackend;
use crate::{error::RepoError, models::Collection};

/// Process-local store. Starts uninitialized (`null`).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<Value>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an arbitrary raw value, e.g. a legacy bare array.
    pub fn with_raw(raw: Value) -> Self {
        Self {
            data: RwLock::new(raw),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<Value, RepoError> {
        Ok(self.data.read().await.clone())
    }

    async fn save(&self, collection: &Collection) -> Result<(), RepoError> {
        let value = serde_json::to_value(collection).map_err(RepoError::storage)?;
        *self.data.write().await = value;
        Ok(())
    }
}
