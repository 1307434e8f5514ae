//! Relational side of resume persistence: summary rows and score rows.
//!
//! Writes go through [`ResumeTx`] so the pipeline controls the transaction
//! boundary; reads and the post-commit file path patch use the pool directly.

use async_trait::async_trait;
use sqlx::{Connection, PgPool, Postgres, Transaction};

use super::StoreError;
use crate::metrics;
use crate::models::content::ModuleKind;
use crate::models::resume::{
    NewResume, NewScore, ResumeRow, ResumeScoreRow, TargetType, FILE_PATH_PENDING,
    STATUS_COMPLETED,
};

#[async_trait]
pub trait ResumeRepository: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ResumeTx>, StoreError>;

    async fn find_resume(&self, id: i64) -> Result<Option<ResumeRow>, StoreError>;

    async fn scores_for(&self, resume_id: i64) -> Result<Vec<ResumeScoreRow>, StoreError>;

    async fn set_file_path(&self, id: i64, file_path: &str) -> Result<(), StoreError>;
}

/// An open relational transaction. Dropping it without `commit` rolls back.
#[async_trait]
pub trait ResumeTx: Send {
    /// Inserts the summary row with the placeholder file path.
    async fn insert_resume(&mut self, resume: &NewResume) -> Result<(), StoreError>;

    /// Inserts one module's score rows. Either all rows land or none do, and a
    /// failure leaves the enclosing transaction usable.
    async fn insert_module_scores(&mut self, rows: &[NewScore]) -> Result<(), StoreError>;

    /// Removes the module row and every dimension row of `kind`.
    async fn delete_module_scores(
        &mut self,
        resume_id: i64,
        kind: ModuleKind,
    ) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgResumeRepository {
    pool: PgPool,
}

impl PgResumeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

struct PgResumeTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ResumeRepository for PgResumeRepository {
    async fn begin(&self) -> Result<Box<dyn ResumeTx>, StoreError> {
        let tx = metrics::sql("begin", "resumes", self.pool.begin()).await?;
        Ok(Box::new(PgResumeTx { tx }))
    }

    async fn find_resume(&self, id: i64) -> Result<Option<ResumeRow>, StoreError> {
        let select = sqlx::query_as::<_, ResumeRow>(
            "SELECT id, user_id, tenant_id, file_name, file_path, status, created_at, updated_at
             FROM resumes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool);
        Ok(metrics::sql("select", "resumes", select).await?)
    }

    async fn scores_for(&self, resume_id: i64) -> Result<Vec<ResumeScoreRow>, StoreError> {
        let select = sqlx::query_as::<_, ResumeScoreRow>(
            "SELECT id, resume_id, target_id, target_type, label, score, weight, created_at
             FROM resume_scores WHERE resume_id = $1
             ORDER BY target_type, target_id",
        )
        .bind(resume_id)
        .fetch_all(&self.pool);
        Ok(metrics::sql("select", "resume_scores", select).await?)
    }

    async fn set_file_path(&self, id: i64, file_path: &str) -> Result<(), StoreError> {
        let update = sqlx::query("UPDATE resumes SET file_path = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(file_path)
            .execute(&self.pool);
        metrics::sql("update", "resumes", update).await?;
        Ok(())
    }
}

#[async_trait]
impl ResumeTx for PgResumeTx {
    async fn insert_resume(&mut self, resume: &NewResume) -> Result<(), StoreError> {
        let insert = sqlx::query(
            "INSERT INTO resumes (id, user_id, tenant_id, file_name, file_path, status)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(resume.id)
        .bind(resume.user_id)
        .bind(resume.tenant_id)
        .bind(&resume.file_name)
        .bind(FILE_PATH_PENDING)
        .bind(STATUS_COMPLETED)
        .execute(&mut *self.tx);
        metrics::sql("insert", "resumes", insert).await?;
        Ok(())
    }

    async fn insert_module_scores(&mut self, rows: &[NewScore]) -> Result<(), StoreError> {
        // Savepoint: a failed insert must not abort the outer transaction.
        let mut savepoint = self.tx.begin().await?;
        for row in rows {
            let insert = sqlx::query(
                "INSERT INTO resume_scores (id, resume_id, target_id, target_type, label, score, weight)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(row.id)
            .bind(row.resume_id)
            .bind(row.target_id)
            .bind(row.target_type.code())
            .bind(&row.label)
            .bind(row.score)
            .bind(row.weight)
            .execute(&mut *savepoint);
            metrics::sql("insert", "resume_scores", insert).await?;
        }
        savepoint.commit().await?;
        Ok(())
    }

    async fn delete_module_scores(
        &mut self,
        resume_id: i64,
        kind: ModuleKind,
    ) -> Result<u64, StoreError> {
        let dimensions = kind.dimension_id_range();
        let delete = sqlx::query(
            "DELETE FROM resume_scores
             WHERE resume_id = $1
               AND ((target_type = $2 AND target_id = $3)
                 OR (target_type = $4 AND target_id BETWEEN $5 AND $6))",
        )
        .bind(resume_id)
        .bind(TargetType::Module.code())
        .bind(kind.id())
        .bind(TargetType::Dimension.code())
        .bind(*dimensions.start())
        .bind(*dimensions.end())
        .execute(&mut *self.tx);
        let result = metrics::sql("delete", "resume_scores", delete).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        metrics::sql("commit", "resumes", self.tx.commit()).await?;
        Ok(())
    }
}
