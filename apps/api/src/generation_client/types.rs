use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::content::ResumeData;

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub data: ResumeData,
    pub info: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitReply {
    pub task_id: String,
}

/// Upstream task state as reported by the generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RemoteStatus {
    Pending,
    Processing,
    Success,
    Failure,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatusReply {
    #[serde(rename = "task_status")]
    pub status: RemoteStatus,
    #[serde(rename = "task_result", default)]
    pub result: Option<ResumeData>,
}

/// One qualitative band of a scoring dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBand {
    pub judgment_detail: String,
    pub judgment_score: f64,
}

impl RuleBand {
    pub fn new(detail: &str, score: f64) -> Self {
        Self {
            judgment_detail: detail.to_string(),
            judgment_score: score,
        }
    }
}

/// Dimension name mapped to its ordered bands.
pub type RuleSet = BTreeMap<String, Vec<RuleBand>>;

#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    /// Module title mapped to the module payload.
    pub section: BTreeMap<String, Value>,
    pub rules: RuleSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub rule: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreEnvelope {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<Vec<DimensionScore>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteRequest {
    pub resume: ResumeData,
    pub requirement: String,
    pub info: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarkdownReply {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractReply {
    #[serde(default)]
    pub resume_data: Option<ResumeData>,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RenderMarkdownReply {
    #[serde(default)]
    pub markdown_content: String,
}
