use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    backends::StorageBackend,
    error::RepoError,
    models::{Collection, DataStats, Document, NewDocument, Subject, Visibility, truncate_to_minute},
    validator,
};

pub mod normalize;

pub use normalize::{Normalized, RawShape, normalize, normalize_report};

/// Prefix of every generated access key.
pub const ACCESS_KEY_PREFIX: &str = "kn1-";

/// Repository Trait
///
/// The contract every route handler talks to. Which substrate holds the
/// collection (memory, file, remote document store, SQL table) is decided once
/// at startup and hidden behind this trait.
///
/// Each operation is atomic with respect to the others.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Current collection. An empty store is seeded with the sample set the
    /// first time it is read, and only then.
    async fn read(&self) -> Result<Collection, RepoError>;

    /// Normalizes `candidate` and replaces the stored collection with it.
    async fn write(&self, candidate: Collection) -> Result<(), RepoError>;

    /// Validates and appends a document. Returns the access key for private documents.
    async fn add(&self, fields: NewDocument) -> Result<Option<String>, RepoError>;

    /// Removes the document with `id` from whichever bucket holds it.
    /// `Ok(false)` when no such document exists.
    async fn remove(&self, id: &str) -> Result<bool, RepoError>;

    /// Discards everything and stores the sample set again.
    async fn reset(&self) -> Result<Collection, RepoError>;

    async fn stats(&self) -> Result<DataStats, RepoError> {
        Ok(self.read().await?.stats())
    }
}

/// RepositoryState
///
/// The concrete type used to share the repository across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// LockedRepository
///
/// The one `Repository` implementation: a single mutex serializes every
/// operation over an interchangeable `StorageBackend`. Nothing is cached; each
/// operation reads the backend, so a failed write leaves the previous
/// collection in place.
pub struct LockedRepository {
    backend: Box<dyn StorageBackend>,
    // Holds whether lazy seeding has been settled for this process.
    seeded: Mutex<bool>,
}

impl LockedRepository {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            seeded: Mutex::new(false),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn load(&self) -> Result<Normalized, RepoError> {
        let raw = self.backend.load().await.inspect_err(|e| {
            tracing::error!(backend = self.backend.name(), "read failed: {}", e);
        })?;

        let report = normalize_report(&raw);
        if report.dropped > 0 {
            tracing::warn!(
                backend = self.backend.name(),
                dropped = report.dropped,
                "stored entries could not be read as documents"
            );
        }
        Ok(report)
    }

    async fn save(&self, collection: &Collection) -> Result<(), RepoError> {
        self.backend.save(collection).await.inspect_err(|e| {
            tracing::error!(backend = self.backend.name(), "write failed: {}", e);
        })
    }

    /// Must be called with the lock held; `seeded` is the guarded flag.
    /// A store holding only unreadable entries is not empty and is never seeded over.
    async fn load_or_seed(&self, seeded: &mut bool) -> Result<Normalized, RepoError> {
        let current = self.load().await?;
        if *seeded || !current.collection.is_empty() || current.dropped > 0 {
            *seeded = true;
            return Ok(current);
        }

        let sample = sample_collection();
        self.save(&sample).await?;
        *seeded = true;
        tracing::info!(backend = self.backend.name(), "seeded empty store with sample documents");
        Ok(Normalized {
            collection: sample,
            dropped: 0,
        })
    }

    /// Loads the collection a mutation will save back. Saving a collection
    /// that lost unreadable entries would erase them from the store, so the
    /// mutation is refused instead.
    async fn load_for_update(&self, seeded: &mut bool) -> Result<Collection, RepoError> {
        let current = self.load_or_seed(seeded).await?;
        if current.dropped > 0 {
            return Err(RepoError::StorageFailure(format!(
                "{} stored entries are unreadable; refusing to overwrite them",
                current.dropped
            )));
        }
        Ok(current.collection)
    }
}

#[async_trait]
impl Repository for LockedRepository {
    async fn read(&self) -> Result<Collection, RepoError> {
        let mut seeded = self.seeded.lock().await;
        Ok(self.load_or_seed(&mut seeded).await?.collection)
    }

    async fn write(&self, candidate: Collection) -> Result<(), RepoError> {
        let raw = serde_json::to_value(&candidate).map_err(RepoError::storage)?;
        let canonical = normalize(&raw);

        let mut seeded = self.seeded.lock().await;
        self.save(&canonical).await?;
        *seeded = true;
        Ok(())
    }

    async fn add(&self, fields: NewDocument) -> Result<Option<String>, RepoError> {
        // Rejected input never takes the lock or touches storage.
        validator::validate(&fields)?;

        let mut seeded = self.seeded.lock().await;
        let mut collection = self.load_for_update(&mut seeded).await?;
        let key = add_document(&mut collection, &fields, Utc::now())?;
        self.save(&collection).await?;

        tracing::info!(
            backend = self.backend.name(),
            private = key.is_some(),
            "document added"
        );
        Ok(key)
    }

    async fn remove(&self, id: &str) -> Result<bool, RepoError> {
        let mut seeded = self.seeded.lock().await;
        let mut collection = self.load_for_update(&mut seeded).await?;
        if !remove_document(&mut collection, id) {
            return Ok(false);
        }
        self.save(&collection).await?;

        tracing::info!(backend = self.backend.name(), id, "document removed");
        Ok(true)
    }

    async fn reset(&self) -> Result<Collection, RepoError> {
        let mut seeded = self.seeded.lock().await;
        let sample = sample_collection();
        self.save(&sample).await?;
        *seeded = true;

        tracing::info!(backend = self.backend.name(), "collection reset to sample documents");
        Ok(sample)
    }
}

// --- Pure collection operations ---

/// Validates `fields` and appends a new document to the matching bucket.
/// On a validation failure the collection is untouched.
pub fn add_document(
    collection: &mut Collection,
    fields: &NewDocument,
    now: DateTime<Utc>,
) -> Result<Option<String>, RepoError> {
    let valid = validator::validate(fields)?;

    let mut id = generate_id();
    while collection.contains_id(&id) {
        id = generate_id();
    }

    let access_key = match valid.visibility {
        Visibility::Private => Some(generate_access_key()),
        Visibility::Public => None,
    };

    let document = Document {
        id,
        title: valid.title,
        url: valid.url,
        description: valid.description,
        category: valid.category,
        created_at: truncate_to_minute(now),
        visibility: valid.visibility,
        access_key: access_key.clone(),
    };

    match valid.visibility {
        Visibility::Public => collection.public.push(document),
        Visibility::Private => collection.private.push(document),
    }
    Ok(access_key)
}

/// Searches `public` then `private` and removes the first match.
pub fn remove_document(collection: &mut Collection, id: &str) -> bool {
    for bucket in [&mut collection.public, &mut collection.private] {
        if let Some(pos) = bucket.iter().position(|d| d.id == id) {
            bucket.remove(pos);
            return true;
        }
    }
    false
}

/// 16 lowercase hex characters.
pub fn generate_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

/// `kn1-` followed by 16 lowercase hex characters.
pub fn generate_access_key() -> String {
    format!("{ACCESS_KEY_PREFIX}{}", hex::encode(rand::random::<[u8; 8]>()))
}

/// The built-in sample set used for lazy seeding and `reset`.
pub fn sample_collection() -> Collection {
    let created_at = Utc
        .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let sample = |id: &str, title: &str, url: &str, category: Subject, description: &str| Document {
        id: id.to_string(),
        title: title.to_string(),
        url: url.to_string(),
        description: description.to_string(),
        category,
        created_at,
        visibility: Visibility::Public,
        access_key: None,
    };

    Collection {
        public: vec![
            sample(
                "sample1",
                "Toán 12 - Bài giảng đại số",
                "https://example.com/toan12",
                Subject::Toan,
                "Bài giảng đại số nâng cao lớp 12",
            ),
            sample(
                "sample2",
                "Vật lý cơ bản - Chương 1",
                "https://example.com/vatly",
                Subject::Ly,
                "Kiến thức vật lý cơ bản chương 1",
            ),
            sample(
                "sample3",
                "Tin học - Nhập môn lập trình",
                "https://example.com/tinhoc",
                Subject::Tin,
                "",
            ),
        ],
        private: vec![],
    }
}
