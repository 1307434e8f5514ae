//! Generation client. Every call to the external algorithm services goes
//! through here: task submission and polling, section scoring, streamed
//! writing, and the data service's document conversions.
//!
//! Handlers and background jobs hold an `Arc<dyn GenerationService>` so tests
//! can script the upstream without a network.
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub mod builder;
pub mod sse;
pub mod types;

use crate::metrics;
use crate::models::content::ResumeData;
use types::{
    DimensionScore, ExtractReply, GenerateRequest, MarkdownReply, RenderMarkdownReply,
    ScoreEnvelope, ScoreRequest, SubmitReply, TaskStatusReply, WriteRequest,
};

/// Document conversion can be slow; this bounds every non-streaming call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

// Service labels for call metrics.
const GENERATION: &str = "generation";
const DATA: &str = "data";
const SCORING: &str = "scoring";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Pull-based body of a streamed writer response.
#[async_trait]
pub trait ChunkStream: Send {
    /// Next raw chunk, or `None` at end of body.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, GenerationError>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn submit_task(&self, request: &GenerateRequest) -> Result<String, GenerationError>;

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusReply, GenerationError>;

    async fn score_section(
        &self,
        request: &ScoreRequest,
    ) -> Result<Vec<DimensionScore>, GenerationError>;

    async fn open_write_stream(
        &self,
        request: &WriteRequest,
    ) -> Result<Box<dyn ChunkStream>, GenerationError>;

    async fn file_to_markdown(
        &self,
        file_name: &str,
        content: Bytes,
    ) -> Result<String, GenerationError>;

    async fn markdown_to_resume(&self, markdown: &str) -> Result<ResumeData, GenerationError>;

    /// Renders structured content to a PDF document (via markdown).
    async fn render_pdf(&self, data: &ResumeData, title: &str) -> Result<Bytes, GenerationError>;
}

/// HTTP client for the generation, data and scoring services.
#[derive(Clone)]
pub struct AlgorithmClient {
    client: Client,
    generate_url: String,
    data_url: String,
    score_url: String,
}

impl AlgorithmClient {
    pub fn new(
        generate_url: &str,
        data_url: &str,
        score_url: &str,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            client: Client::builder().build()?,
            generate_url: generate_url.trim_end_matches('/').to_string(),
            data_url: data_url.trim_end_matches('/').to_string(),
            score_url: score_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: String,
        body: &B,
    ) -> Result<Response, GenerationError> {
        let response = self
            .client
            .post(url)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }
}

/// Turns any non-200 answer into `GenerationError::Api` carrying the body text.
async fn ensure_success(response: Response) -> Result<Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(GenerationError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Accepts either a bare `[{rule, score}]` array or a `{code, msg, data}` envelope.
pub fn parse_score_body(body: &[u8]) -> Result<Vec<DimensionScore>, GenerationError> {
    if let Ok(scores) = serde_json::from_slice::<Vec<DimensionScore>>(body) {
        return Ok(scores);
    }
    let envelope: ScoreEnvelope = serde_json::from_slice(body)?;
    debug!(
        "Score service envelope: code={}, msg={}",
        envelope.code, envelope.msg
    );
    Ok(envelope.data.unwrap_or_default())
}

struct ResponseChunks(Response);

#[async_trait]
impl ChunkStream for ResponseChunks {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, GenerationError> {
        Ok(self.0.chunk().await?)
    }
}

#[async_trait]
impl GenerationService for AlgorithmClient {
    async fn submit_task(&self, request: &GenerateRequest) -> Result<String, GenerationError> {
        let url = format!("{}/writer/resume_gen_task", self.generate_url);
        let reply: SubmitReply = metrics::external(GENERATION, "submit_task", async {
            Ok::<_, GenerationError>(self.post_json(url, request).await?.json().await?)
        })
        .await?;
        if reply.task_id.is_empty() {
            return Err(GenerationError::Rejected(
                "generation service returned an empty task id".into(),
            ));
        }
        Ok(reply.task_id)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatusReply, GenerationError> {
        let url = format!("{}/writer/resume_gen_task/{task_id}", self.generate_url);
        metrics::external(GENERATION, "task_status", async {
            let response = self
                .client
                .get(url)
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await?;
            Ok::<_, GenerationError>(ensure_success(response).await?.json().await?)
        })
        .await
    }

    async fn score_section(
        &self,
        request: &ScoreRequest,
    ) -> Result<Vec<DimensionScore>, GenerationError> {
        let url = format!("{}/resume_eval/section_eval", self.score_url);
        metrics::external(SCORING, "section_eval", async {
            let body = self.post_json(url, request).await?.bytes().await?;
            parse_score_body(&body)
        })
        .await
    }

    async fn open_write_stream(
        &self,
        request: &WriteRequest,
    ) -> Result<Box<dyn ChunkStream>, GenerationError> {
        // No client-level timeout here: the relay bounds the whole stream.
        // Only the time to response headers is measured.
        let response = metrics::external(GENERATION, "resume_item_gen", async {
            let response = self
                .client
                .post(format!("{}/writer/resume_item_gen", self.generate_url))
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .json(request)
                .send()
                .await?;
            ensure_success(response).await
        })
        .await?;
        Ok(Box::new(ResponseChunks(response)))
    }

    async fn file_to_markdown(
        &self,
        file_name: &str,
        content: Bytes,
    ) -> Result<String, GenerationError> {
        let part = reqwest::multipart::Part::bytes(content.to_vec()).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let reply: MarkdownReply = metrics::external(DATA, "file_to_markdown", async {
            let response = self
                .client
                .post(format!("{}/convert/file_to_markdown", self.data_url))
                .timeout(REQUEST_TIMEOUT)
                .multipart(form)
                .send()
                .await?;
            Ok::<_, GenerationError>(ensure_success(response).await?.json().await?)
        })
        .await?;
        Ok(reply.content)
    }

    async fn markdown_to_resume(&self, markdown: &str) -> Result<ResumeData, GenerationError> {
        let url = format!("{}/extractor/resume_struct", self.data_url);
        let body = serde_json::json!({ "content": markdown });
        let reply: ExtractReply = metrics::external(DATA, "resume_struct", async {
            Ok::<_, GenerationError>(self.post_json(url, &body).await?.json().await?)
        })
        .await?;
        match reply.resume_data {
            Some(data) if reply.success => Ok(data),
            _ => Err(GenerationError::Rejected(
                "resume could not be parsed, check the file format".into(),
            )),
        }
    }

    async fn render_pdf(&self, data: &ResumeData, title: &str) -> Result<Bytes, GenerationError> {
        let url = format!("{}/convert/json_to_markdown", self.data_url);
        let body = serde_json::json!({ "json_input": data, "title": title });
        let markdown: RenderMarkdownReply = metrics::external(DATA, "json_to_markdown", async {
            Ok::<_, GenerationError>(self.post_json(url, &body).await?.json().await?)
        })
        .await?;

        let url = format!("{}/convert/markdown_to_pdf", self.data_url);
        let body = serde_json::json!({
            "markdown_content": markdown.markdown_content,
            "filename": title,
        });
        metrics::external(DATA, "markdown_to_pdf", async {
            Ok::<_, GenerationError>(self.post_json(url, &body).await?.bytes().await?)
        })
        .await
    }
}
