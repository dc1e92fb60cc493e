use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::RepoError;

// 1. UploadStore Contract
/// UploadStore
///
/// Where files uploaded through the admin page end up. `store` returns an
/// absolute URL that is then handled like any other document URL.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Prepares the destination (creates the directory or bucket). Safe to call repeatedly.
    async fn ensure_ready(&self) -> Result<(), RepoError>;

    /// Persists `bytes` under a unique name derived from `filename`.
    async fn store(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RepoError>;

    /// Deletes a file previously returned by `store`. Used when the document
    /// that would have pointed at it could not be saved.
    async fn discard(&self, _url: &str) -> Result<(), RepoError> {
        Ok(())
    }

    /// Local directory the router should serve at `/uploads`, if any.
    fn serve_dir(&self) -> Option<&Path> {
        None
    }
}

/// UploadState
///
/// The concrete type used to share the upload store across the application state.
pub type UploadState = Arc<dyn UploadStore>;

/// Mount point for files served from disk.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// sanitize_filename
///
/// Reduces a client-supplied name to a single safe path component: directory
/// parts and `.`/`..` are dropped, anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned.to_string()
    }
}

fn unique_name(filename: &str) -> String {
    format!("{}-{}", Uuid::new_v4().simple(), sanitize_filename(filename))
}

/// Last path segment of a URL handed out by `store`, if it is one we could have generated.
fn stored_name(url: &str) -> Option<&str> {
    let name = url.rsplit('/').next()?;
    (!name.is_empty() && sanitize_filename(name) == name).then_some(name)
}

fn reject_empty(bytes: &[u8]) -> Result<(), RepoError> {
    if bytes.is_empty() {
        return Err(RepoError::InvalidInput("Tệp tải lên trống".to_string()));
    }
    Ok(())
}

// 2. Disk Implementation
/// DiskUploadStore
///
/// Writes into a local directory that the router serves at `/uploads`.
#[derive(Clone, Debug)]
pub struct DiskUploadStore {
    dir: PathBuf,
    public_base_url: String,
}

impl DiskUploadStore {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UploadStore for DiskUploadStore {
    async fn ensure_ready(&self) -> Result<(), RepoError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    async fn store(
        &self,
        filename: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RepoError> {
        reject_empty(&bytes)?;
        self.ensure_ready().await?;

        let name = unique_name(filename);
        tokio::fs::write(self.dir.join(&name), bytes).await?;

        Ok(format!("{}{}/{}", self.public_base_url, UPLOADS_ROUTE, name))
    }

    async fn discard(&self, url: &str) -> Result<(), RepoError> {
        let Some(name) = stored_name(url) else {
            return Ok(());
        };
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn serve_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

// 3. S3 Implementation
/// S3UploadStore
///
/// Object storage through the AWS SDK. Path-style addressing keeps it working
/// against MinIO and other S3-compatible gateways; the returned URL has the
/// same `endpoint/bucket/key` layout.
#[derive(Clone)]
pub struct S3UploadStore {
    client: s3::Client,
    endpoint: String,
    bucket_name: String,
}

impl S3UploadStore {
    /// Static credentials only; no profile or environment lookup.
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            // Bucket goes in the path, not the host name. MinIO needs this.
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl UploadStore for S3UploadStore {
    /// CreateBucket is idempotent for the owner; an "already owned" answer is fine.
    async fn ensure_ready(&self) -> Result<(), RepoError> {
        if let Err(e) = self.client.create_bucket().bucket(&self.bucket_name).send().await {
            tracing::debug!(bucket = %self.bucket_name, "create_bucket: {:?}", e);
        }
        Ok(())
    }

    async fn store(
        &self,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RepoError> {
        reject_empty(&bytes)?;

        let key = format!("uploads/{}", unique_name(filename));
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| RepoError::StorageFailure(format!("s3 put_object: {e}")))?;

        Ok(format!("{}/{}/{}", self.endpoint, self.bucket_name, key))
    }

    async fn discard(&self, url: &str) -> Result<(), RepoError> {
        let Some(name) = stored_name(url) else {
            return Ok(());
        };
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(format!("uploads/{name}"))
            .send()
            .await
            .map_err(|e| RepoError::StorageFailure(format!("s3 delete_object: {e}")))?;
        Ok(())
    }
}

// 4. Mock Implementation (For Tests)
/// MockUploadStore
///
/// Accepts everything without touching disk or network and answers a
/// deterministic URL. `new_failing` simulates a storage outage.
#[derive(Clone, Default)]
pub struct MockUploadStore {
    pub should_fail: bool,
}

impl MockUploadStore {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl UploadStore for MockUploadStore {
    async fn ensure_ready(&self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn store(
        &self,
        filename: &str,
        _content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, RepoError> {
        if self.should_fail {
            return Err(RepoError::StorageFailure(
                "Mock upload error: simulation requested".to_string(),
            ));
        }
        reject_empty(&bytes)?;

        Ok(format!(
            "http://localhost:3000/uploads/mock-{}",
            sanitize_filename(filename)
        ))
    }
}
