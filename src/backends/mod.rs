use async_trait::async_trait;
use serde_json::Value;

use crate::{config::BackendConfig, error::RepoError, models::Collection};

pub mod file;
pub mod memory;
pub mod postgres;
pub mod remote;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;
pub use remote::RemoteBackend;

/// StorageBackend
///
/// The persistence substrate under a `LockedRepository`. Backends move whole
/// collections in and out; they never validate or normalize.
///
/// `load` returns `Value::Null` for an empty or uninitialized store. Whatever
/// shape it returns is normalized by the repository.
/// `save` must replace the stored collection completely or not at all.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn load(&self) -> Result<Value, RepoError>;

    async fn save(&self, collection: &Collection) -> Result<(), RepoError>;
}

/// Builds the backend selected by configuration. Called once at startup.
pub async fn connect(config: &BackendConfig) -> Result<Box<dyn StorageBackend>, RepoError> {
    let backend: Box<dyn StorageBackend> = match config {
        BackendConfig::Memory => Box::new(MemoryBackend::new()),
        BackendConfig::File { path } => Box::new(FileBackend::new(path.clone())),
        BackendConfig::Remote(remote) => Box::new(RemoteBackend::new(remote.clone())?),
        BackendConfig::Postgres { db_url } => Box::new(PostgresBackend::connect(db_url).await?),
    };

    tracing::info!(backend = backend.name(), "storage backend ready");
    Ok(backend)
}
