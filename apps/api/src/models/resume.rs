use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Placeholder stored in `file_path` until the deliverable file is uploaded.
pub const FILE_PATH_PENDING: &str = "uploading...";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: i64,
    pub user_id: i64,
    pub tenant_id: i64,
    pub file_name: String,
    pub file_path: String,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `status` of a resume row whose content has been fully parsed.
pub const STATUS_COMPLETED: i16 = 3;

/// Whether a score row belongs to a whole module or to one scoring dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum TargetType {
    Module = 0,
    Dimension = 1,
}

impl TargetType {
    pub fn code(self) -> i16 {
        self as i16
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResumeScoreRow {
    pub id: i64,
    pub resume_id: i64,
    pub target_id: i64,
    pub target_type: i16,
    pub label: String,
    pub score: f64,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
}

/// A score row about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScore {
    pub id: i64,
    pub resume_id: i64,
    pub target_id: i64,
    pub target_type: TargetType,
    pub label: String,
    pub score: f64,
    pub weight: f64,
}

/// Relational summary row for a resume, before insertion.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub id: i64,
    pub user_id: i64,
    pub tenant_id: i64,
    pub file_name: String,
}
