use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};

use super::StorageBackend;
use crate::{
    error::RepoError,
    models::{Collection, Visibility, format_timestamp},
};

/// A row of the `documents` table. `doc_type` is "public" or "private"; `key`
/// is only set on private rows. `sort_order` preserves bucket order.
#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    url: String,
    description: Option<String>,
    category: String,
    created_at: DateTime<Utc>,
    doc_type: String,
    key: Option<String>,
}

impl DocumentRow {
    fn into_json(self) -> Value {
        json!({
            "id": self.id,
            "title": self.title,
            "url": self.url,
            "description": self.description.unwrap_or_default(),
            "category": self.category,
            "created_at": format_timestamp(&self.created_at),
            "access_key": self.key,
        })
    }
}

/// PostgresBackend
///
/// Stores the collection as rows of one table. A save rewrites the table
/// inside a single transaction.
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens the pool and applies the embedded migrations.
    pub async fn connect(db_url: &str) -> Result<Self, RepoError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(RepoError::storage)?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self) -> Result<Value, RepoError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"SELECT id, title, url, description, category, created_at, doc_type, key
               FROM documents
               ORDER BY sort_order ASC, created_at DESC"#,
        )
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Value::Null);
        }

        let (private, public): (Vec<_>, Vec<_>) =
            rows.into_iter().partition(|row| row.doc_type == "private");

        Ok(json!({
            "public": public.into_iter().map(DocumentRow::into_json).collect::<Vec<_>>(),
            "private": private.into_iter().map(DocumentRow::into_json).collect::<Vec<_>>(),
        }))
    }

    async fn save(&self, collection: &Collection) -> Result<(), RepoError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;

        let documents = collection.public.iter().chain(collection.private.iter());
        for (position, doc) in documents.enumerate() {
            let doc_type = match doc.visibility {
                Visibility::Public => "public",
                Visibility::Private => "private",
            };

            sqlx::query(
                r#"INSERT INTO documents
                     (id, title, url, description, category, created_at, doc_type, key, sort_order)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            )
            .bind(&doc.id)
            .bind(&doc.title)
            .bind(&doc.url)
            .bind(&doc.description)
            .bind(doc.category.label())
            .bind(doc.created_at)
            .bind(doc_type)
            .bind(doc.access_key.as_deref())
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        // Dropping `tx` on an early return rolls everything back.
        tx.commit().await?;
        Ok(())
    }
}
