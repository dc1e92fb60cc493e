use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use super::StorageBackend;
use crate::{config::RemoteConfig, error::RepoError, models::Collection};

/// RemoteBackend
///
/// A JSON-document store reached over HTTP (JSONBin v3 protocol):
/// - `GET {base}/{bin}` answers `{"record": <collection>, "metadata": {...}}`
/// - `PUT {base}/{bin}` replaces the record
/// - `POST {base}` creates a bin and answers its id under `metadata.id`
///
/// Every request is bounded by the configured timeout. Failures are reported
/// upward and never retried here.
pub struct RemoteBackend {
    client: Client,
    config: RemoteConfig,
    bin_id: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct CreatedBin {
    metadata: BinMetadata,
}

#[derive(Deserialize)]
struct BinMetadata {
    id: String,
}

#[derive(Deserialize)]
struct ServiceMessage {
    message: String,
}

impl RemoteBackend {
    pub fn new(config: RemoteConfig) -> Result<Self, RepoError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        // An explicitly configured bin wins over one remembered from an earlier run.
        let bin_id = config.bin_id.clone().or_else(|| {
            let path = config.bin_id_file.as_ref()?;
            let stored = std::fs::read_to_string(path).ok()?;
            Some(stored.trim().to_string()).filter(|id| !id.is_empty())
        });

        Ok(Self {
            client,
            config,
            bin_id: RwLock::new(bin_id),
        })
    }

    pub async fn current_bin_id(&self) -> Option<String> {
        self.bin_id.read().await.clone()
    }

    fn bin_url(&self, bin_id: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), bin_id)
    }

    async fn create_bin(&self, payload: &Value) -> Result<String, RepoError> {
        let response = self
            .client
            .post(self.config.base_url.trim_end_matches('/'))
            .header("X-Master-Key", &self.config.api_key)
            .header("X-Bin-Name", &self.config.bin_name)
            .header("X-Bin-Private", "true")
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RepoError::StorageFailure(failure_message(response).await));
        }

        let created: CreatedBin = response.json().await?;
        let id = created.metadata.id;
        tracing::info!(bin_id = %id, "created remote bin");

        if let Some(path) = &self.config.bin_id_file {
            if let Err(e) = tokio::fs::write(path, &id).await {
                tracing::warn!("could not remember bin id in {}: {}", path.display(), e);
            }
        }

        *self.bin_id.write().await = Some(id.clone());
        Ok(id)
    }
}

/// The service's own `message` when it sent one, otherwise the status code.
async fn failure_message(response: Response) -> String {
    let status = response.status();
    match response.json::<ServiceMessage>().await {
        Ok(body) => format!("remote store: {}", body.message),
        Err(_) => format!("remote store: status_{}", status.as_u16()),
    }
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load(&self) -> Result<Value, RepoError> {
        let Some(bin_id) = self.current_bin_id().await else {
            // No bin yet: create an empty one so later saves have a target.
            let empty = serde_json::to_value(Collection::default()).map_err(RepoError::storage)?;
            self.create_bin(&empty).await?;
            return Ok(Value::Null);
        };

        let response = self
            .client
            .get(self.bin_url(&bin_id))
            .header("X-Master-Key", &self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RepoError::StorageFailure(failure_message(response).await));
        }
        Ok(response.json().await?)
    }

    async fn save(&self, collection: &Collection) -> Result<(), RepoError> {
        let payload = serde_json::to_value(collection).map_err(RepoError::storage)?;

        let Some(bin_id) = self.current_bin_id().await else {
            self.create_bin(&payload).await?;
            return Ok(());
        };

        let response = self
            .client
            .put(self.bin_url(&bin_id))
            .header("X-Master-Key", &self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RepoError::StorageFailure(failure_message(response).await));
        }
        Ok(())
    }
}
