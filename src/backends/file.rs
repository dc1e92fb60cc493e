use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::StorageBackend;
use crate::{error::RepoError, models::Collection};

/// FileBackend
///
/// One pretty-printed JSON file. A missing file is an uninitialized store.
/// Saves go to a sibling temp file that is then renamed over the target, so a
/// reader never observes a half-written collection.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "data.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn load(&self) -> Result<Value, RepoError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Value::Null),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        // Unparseable content is reported instead of being seeded over.
        serde_json::from_slice(&bytes).map_err(|e| {
            RepoError::StorageFailure(format!("{} is not valid JSON: {e}", self.path.display()))
        })
    }

    async fn save(&self, collection: &Collection) -> Result<(), RepoError> {
        let body = serde_json::to_vec_pretty(collection).map_err(RepoError::storage)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, body).await?;
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }
}
