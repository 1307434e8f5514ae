pub mod documents;
pub mod objects;
pub mod pipeline;
pub mod repository;

use thiserror::Error;

pub use documents::{DocumentStore, PgDocumentStore};
pub use objects::{ObjectStore, S3ObjectStore};
pub use pipeline::{FileSource, PersistRequest, PersistencePipeline};
pub use repository::{PgResumeRepository, ResumeRepository, ResumeTx};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("document store error: {0}")]
    Document(String),

    #[error("object storage error: {0}")]
    Object(String),
}
