//! Persistence pipeline: writes one resume across the relational store, the
//! document store and object storage.
//!
//! Order for a new resume:
//! 1. open the relational transaction
//! 2. insert the summary row (placeholder file path)
//! 3. insert the document (outside the transaction)
//! 4. score all seven modules, empty ones included, and insert their rows;
//!    failures are logged per module
//! 5. commit
//!
//! The deliverable file is produced afterwards on the supervisor and only
//! patches `file_path` when it succeeds.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{error, info, warn};

use super::objects::object_key;
use super::{DocumentStore, ObjectStore, ResumeRepository, StoreError};
use crate::generation_client::GenerationService;
use crate::ids::IdAllocator;
use crate::models::content::{ModuleKind, ModuleSection, ResumeContent, ResumeData};
use crate::models::resume::NewResume;
use crate::scoring::{ModuleScore, ScoringEngine};
use crate::tasks::supervisor::Supervisor;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Where the deliverable file comes from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Render the structured content to PDF.
    Render,
    /// Store the file the user uploaded.
    Uploaded {
        file_name: String,
        content_type: String,
        bytes: Bytes,
    },
}

#[derive(Debug, Clone)]
pub struct PersistRequest {
    pub resume_id: i64,
    pub user_id: i64,
    pub tenant_id: i64,
    pub data: ResumeData,
    pub raw_markdown: Option<String>,
    pub source: FileSource,
}

/// Which modules ended up with scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistReport {
    pub scored: Vec<ModuleKind>,
    pub unscored: Vec<ModuleKind>,
}

#[derive(Clone)]
pub struct PersistencePipeline {
    repo: Arc<dyn ResumeRepository>,
    documents: Arc<dyn DocumentStore>,
    scoring: Arc<ScoringEngine>,
    ids: Arc<IdAllocator>,
    deliverables: DeliverableWriter,
    supervisor: Supervisor,
}

impl PersistencePipeline {
    pub fn new(
        repo: Arc<dyn ResumeRepository>,
        documents: Arc<dyn DocumentStore>,
        objects: Arc<dyn ObjectStore>,
        scoring: Arc<ScoringEngine>,
        generation: Arc<dyn GenerationService>,
        ids: Arc<IdAllocator>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            deliverables: DeliverableWriter {
                repo: repo.clone(),
                objects,
                generation,
            },
            repo,
            documents,
            scoring,
            ids,
            supervisor,
        }
    }

    /// Durably stores a new resume. Returns once the relational transaction
    /// has committed; the file step continues in the background.
    pub async fn persist(&self, request: PersistRequest) -> Result<PersistReport, StoreError> {
        let PersistRequest {
            resume_id,
            user_id,
            tenant_id,
            data,
            raw_markdown,
            source,
        } = request;

        let file_name = match &source {
            FileSource::Uploaded { file_name, .. } => file_name.clone(),
            FileSource::Render => data.display_name(),
        };
        let modules = data.clone().into_all_sections();
        let sections: Vec<ModuleSection> = modules
            .iter()
            .filter(|s| !s.data.is_empty())
            .cloned()
            .collect();

        let mut tx = self.repo.begin().await?;
        tx.insert_resume(&NewResume {
            id: resume_id,
            user_id,
            tenant_id,
            file_name,
        })
        .await?;

        let content = ResumeContent::new(resume_id, sections, raw_markdown);
        self.documents.insert(&content).await?;

        let mut report = PersistReport::default();
        for (kind, result) in self.scoring.score_all(&modules).await {
            let score = match result {
                Ok(Some(score)) => score,
                Ok(None) => {
                    report.unscored.push(kind);
                    continue;
                }
                Err(e) => {
                    error!(resume_id, module = kind.title(), "Scoring failed, module left unscored: {e}");
                    report.unscored.push(kind);
                    continue;
                }
            };
            match tx
                .insert_module_scores(&score.rows(resume_id, &self.ids))
                .await
            {
                Ok(()) => report.scored.push(kind),
                Err(e) => {
                    error!(resume_id, module = kind.title(), "Failed to store module scores: {e}");
                    report.unscored.push(kind);
                }
            }
        }

        tx.commit().await?;
        info!(
            resume_id,
            scored = report.scored.len(),
            unscored = report.unscored.len(),
            "Resume persisted"
        );

        let writer = self.deliverables.clone();
        self.supervisor.spawn(async move { writer.write(resume_id, data, source).await });

        Ok(report)
    }

    /// Replaces one module's content and scores. Score rows are swapped in a
    /// single transaction; the document write is independent of it.
    pub async fn rescore_module(
        &self,
        resume_id: i64,
        section: ModuleSection,
    ) -> Result<Option<ModuleScore>, StoreError> {
        let kind = section.kind();
        let mut tx = self.repo.begin().await?;
        let removed = tx.delete_module_scores(resume_id, kind).await?;

        self.documents.replace_module(resume_id, &section).await?;

        let score = match self.scoring.score(&section.data).await {
            Ok(score) => score,
            Err(e) => {
                error!(resume_id, module = kind.title(), "Rescoring failed, module left unscored: {e}");
                None
            }
        };
        if let Some(score) = &score {
            tx.insert_module_scores(&score.rows(resume_id, &self.ids))
                .await?;
        }
        tx.commit().await?;

        info!(
            resume_id,
            module = kind.title(),
            removed,
            scored = score.is_some(),
            "Module saved"
        );
        Ok(score)
    }
}

/// Produces the deliverable file and patches the resume's `file_path`.
#[derive(Clone)]
struct DeliverableWriter {
    repo: Arc<dyn ResumeRepository>,
    objects: Arc<dyn ObjectStore>,
    generation: Arc<dyn GenerationService>,
}

impl DeliverableWriter {
    async fn write(&self, resume_id: i64, data: ResumeData, source: FileSource) {
        match self.try_write(resume_id, &data, source).await {
            Ok(url) => info!(resume_id, "Deliverable stored at {url}"),
            Err(e) => warn!(resume_id, "Deliverable step failed, file path left as placeholder: {e}"),
        }
    }

    async fn try_write(
        &self,
        resume_id: i64,
        data: &ResumeData,
        source: FileSource,
    ) -> Result<String, StoreError> {
        let (key, bytes, content_type) = match source {
            FileSource::Uploaded {
                file_name,
                content_type,
                bytes,
            } => (object_key(Utc::now(), &file_name), bytes, content_type),
            FileSource::Render => {
                let title = data.display_name();
                let pdf = self
                    .generation
                    .render_pdf(data, &title)
                    .await
                    .map_err(|e| StoreError::Object(format!("render failed: {e}")))?;
                let key = object_key(Utc::now(), &format!("{title}.pdf"));
                (key, pdf, PDF_CONTENT_TYPE.to_string())
            }
        };

        self.objects.upload(&key, bytes, &content_type).await?;
        let url = self.objects.public_url(&key);
        self.repo.set_file_path(resume_id, &url).await?;
        Ok(url)
    }
}
