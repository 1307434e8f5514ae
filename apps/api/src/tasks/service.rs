//! Front half of the asynchronous flows: accepts generation and upload
//! requests, creates their task records, and hands the rest to background
//! work on the supervisor.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::monitor::{MonitoredJob, TaskMonitor};
use super::store::{TaskRecord, TaskRecordStore, TaskStatus};
use super::supervisor::Supervisor;
use crate::errors::AppError;
use crate::generation_client::builder::{build_generate_request, QuestionAnswer};
use crate::generation_client::GenerationService;
use crate::ids::IdAllocator;
use crate::persistence::{FileSource, PersistRequest, PersistencePipeline};
use crate::routes::actor::Actor;

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmittedTask {
    pub task_id: String,
}

/// What a polling client may see about a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_id: Option<i64>,
}

impl From<TaskRecord> for TaskView {
    fn from(record: TaskRecord) -> Self {
        let resume_id = (record.status == TaskStatus::Success).then_some(record.resume_id);
        Self {
            status: record.status,
            resume_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Clone)]
pub struct TaskService {
    generation: Arc<dyn GenerationService>,
    records: TaskRecordStore,
    monitor: TaskMonitor,
    pipeline: PersistencePipeline,
    ids: Arc<IdAllocator>,
    supervisor: Supervisor,
}

impl TaskService {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        records: TaskRecordStore,
        monitor: TaskMonitor,
        pipeline: PersistencePipeline,
        ids: Arc<IdAllocator>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            generation,
            records,
            monitor,
            pipeline,
            ids,
            supervisor,
        }
    }

    pub async fn submit_generation(
        &self,
        questions: &[QuestionAnswer],
        actor: Actor,
    ) -> Result<SubmittedTask, AppError> {
        let request = build_generate_request(questions);
        let resume_id = self.ids.next_id();

        let task_id = self.generation.submit_task(&request).await?;

        let record = TaskRecord::pending(&task_id, resume_id, actor.user_id, actor.tenant_id);
        if let Err(e) = self.records.create(&record).await {
            error!(task_id = %task_id, "Task submitted upstream but its record could not be created: {e}");
            return Err(e.into());
        }

        let job = MonitoredJob {
            task_id: task_id.clone(),
            resume_id,
            user_id: actor.user_id,
            tenant_id: actor.tenant_id,
        };
        let monitor = self.monitor.clone();
        let cancel = self.supervisor.token();
        self.supervisor.spawn(async move { monitor.run(job, cancel).await });

        info!(task_id = %task_id, resume_id, "Resume generation task created");
        Ok(SubmittedTask { task_id })
    }

    pub async fn submit_upload(
        &self,
        file: UploadedFile,
        actor: Actor,
    ) -> Result<SubmittedTask, AppError> {
        validate_upload(&file)?;

        let resume_id = self.ids.next_id();
        let task_id = Uuid::new_v4().to_string();
        self.records
            .create(&TaskRecord::pending(
                &task_id,
                resume_id,
                actor.user_id,
                actor.tenant_id,
            ))
            .await?;

        let service = self.clone();
        let background_task_id = task_id.clone();
        self.supervisor.spawn(async move {
            service
                .process_upload(background_task_id, resume_id, actor, file)
                .await
        });

        info!(task_id = %task_id, resume_id, "Upload task created");
        Ok(SubmittedTask { task_id })
    }

    async fn process_upload(&self, task_id: String, resume_id: i64, actor: Actor, file: UploadedFile) {
        let status = match self.parse_and_persist(resume_id, actor, file).await {
            Ok(()) => {
                info!(task_id = %task_id, resume_id, "Uploaded resume processed");
                TaskStatus::Success
            }
            Err(e) => {
                error!(task_id = %task_id, resume_id, "Uploaded resume processing failed: {e}");
                TaskStatus::Failure
            }
        };
        if let Err(e) = self.records.update_status(&task_id, status).await {
            error!(task_id = %task_id, "Failed to record upload outcome: {e}");
        }
    }

    async fn parse_and_persist(
        &self,
        resume_id: i64,
        actor: Actor,
        file: UploadedFile,
    ) -> Result<(), AppError> {
        let markdown = self
            .generation
            .file_to_markdown(&file.file_name, file.bytes.clone())
            .await?;
        info!(resume_id, markdown_len = markdown.len(), "File converted to markdown");

        let data = self.generation.markdown_to_resume(&markdown).await?;
        self.pipeline
            .persist(PersistRequest {
                resume_id,
                user_id: actor.user_id,
                tenant_id: actor.tenant_id,
                data,
                raw_markdown: Some(markdown),
                source: FileSource::Uploaded {
                    file_name: file.file_name,
                    content_type: file.content_type,
                    bytes: file.bytes,
                },
            })
            .await?;
        Ok(())
    }

    /// Status of a task owned by `actor`. Unknown, expired and foreign tasks
    /// are all reported as not found.
    pub async fn status(&self, task_id: &str, actor: Actor) -> Result<TaskView, AppError> {
        match self.records.get(task_id).await? {
            Some(record) if record.user_id == actor.user_id => Ok(record.into()),
            _ => Err(AppError::NotFound(format!("task {task_id}"))),
        }
    }
}

fn validate_upload(file: &UploadedFile) -> Result<(), AppError> {
    if file.bytes.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".into()));
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation(
            "file is too large, the limit is 20MB".into(),
        ));
    }
    let extension = Path::new(&file.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(AppError::Validation(
            "upload a resume in pdf, doc or docx format".into(),
        )),
    }
}
