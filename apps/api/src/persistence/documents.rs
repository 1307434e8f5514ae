//! Document store for full resume content, one JSONB document per resume.
//!
//! Runs on the pool, never inside a [`ResumeTx`](super::ResumeTx): the
//! relational rows and the document are two independent writes.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;

use super::StoreError;
use crate::metrics;
use crate::models::content::{ModuleSection, ResumeContent};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, content: &ResumeContent) -> Result<(), StoreError>;

    async fn find(&self, resume_id: i64) -> Result<Option<ResumeContent>, StoreError>;

    /// Replaces the section of the same module kind, creating the document if needed.
    async fn replace_module(&self, resume_id: i64, section: &ModuleSection) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, content: &ResumeContent) -> Result<(), StoreError> {
        let insert = sqlx::query("INSERT INTO resume_contents (resume_id, document) VALUES ($1, $2)")
            .bind(content.resume_id)
            .bind(Json(content))
            .execute(&self.pool);
        metrics::sql("insert", "resume_contents", insert).await?;
        Ok(())
    }

    async fn find(&self, resume_id: i64) -> Result<Option<ResumeContent>, StoreError> {
        let select = sqlx::query_scalar::<_, Json<ResumeContent>>(
            "SELECT document FROM resume_contents WHERE resume_id = $1",
        )
        .bind(resume_id)
        .fetch_optional(&self.pool);
        let document = metrics::sql("select", "resume_contents", select).await?;
        Ok(document.map(|Json(content)| content))
    }

    async fn replace_module(&self, resume_id: i64, section: &ModuleSection) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let lock = sqlx::query_scalar::<_, Json<ResumeContent>>(
            "SELECT document FROM resume_contents WHERE resume_id = $1 FOR UPDATE",
        )
        .bind(resume_id)
        .fetch_optional(&mut *tx);
        let existing = metrics::sql("select_for_update", "resume_contents", lock).await?;

        let mut content = match existing {
            Some(Json(content)) => content,
            None => ResumeContent::new(resume_id, Vec::new(), None),
        };
        content.upsert_module(section.clone());

        let upsert = sqlx::query(
            "INSERT INTO resume_contents (resume_id, document) VALUES ($1, $2)
             ON CONFLICT (resume_id) DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()",
        )
        .bind(resume_id)
        .bind(Json(&content))
        .execute(&mut *tx);
        metrics::sql("upsert", "resume_contents", upsert).await?;
        tx.commit().await?;
        Ok(())
    }
}
