use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::kv::{EphemeralStore, KvError};

const KEY_PREFIX: &str = "gen_task:";

const FIELD_STATUS: &str = "status";
const FIELD_RESUME_ID: &str = "resume_id";
const FIELD_USER_ID: &str = "user_id";
const FIELD_TENANT_ID: &str = "tenant_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Failure,
    Timeout,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "PROCESSING" => Ok(TaskStatus::Processing),
            "SUCCESS" => Ok(TaskStatus::Success),
            "FAILURE" => Ok(TaskStatus::Failure),
            "TIMEOUT" => Ok(TaskStatus::Timeout),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    pub resume_id: i64,
    pub user_id: i64,
    pub tenant_id: i64,
}

impl TaskRecord {
    pub fn pending(task_id: impl Into<String>, resume_id: i64, user_id: i64, tenant_id: i64) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            resume_id,
            user_id,
            tenant_id,
        }
    }

    fn from_fields(task_id: &str, fields: &HashMap<String, String>) -> Result<Self, KvError> {
        let corrupt = |reason: String| KvError::Corrupt {
            key: record_key(task_id),
            reason,
        };
        let field = |name: &str| {
            fields
                .get(name)
                .ok_or_else(|| corrupt(format!("missing field '{name}'")))
        };
        let int = |name: &str| {
            field(name)?
                .parse::<i64>()
                .map_err(|e| corrupt(format!("field '{name}': {e}")))
        };

        Ok(Self {
            task_id: task_id.to_string(),
            status: field(FIELD_STATUS)?.parse().map_err(corrupt)?,
            resume_id: int(FIELD_RESUME_ID)?,
            user_id: int(FIELD_USER_ID)?,
            tenant_id: int(FIELD_TENANT_ID)?,
        })
    }
}

fn record_key(task_id: &str) -> String {
    format!("{KEY_PREFIX}{task_id}")
}

/// Typed view over task records in the ephemeral store.
#[derive(Clone)]
pub struct TaskRecordStore {
    kv: Arc<dyn EphemeralStore>,
    ttl: Duration,
}

impl TaskRecordStore {
    pub fn new(kv: Arc<dyn EphemeralStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    pub async fn create(&self, record: &TaskRecord) -> Result<(), KvError> {
        let fields = [
            (FIELD_STATUS, record.status.as_str().to_string()),
            (FIELD_RESUME_ID, record.resume_id.to_string()),
            (FIELD_USER_ID, record.user_id.to_string()),
            (FIELD_TENANT_ID, record.tenant_id.to_string()),
        ];
        self.kv
            .create(&record_key(&record.task_id), &fields, self.ttl)
            .await
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<TaskRecord>, KvError> {
        match self.kv.get(&record_key(task_id)).await? {
            Some(fields) => TaskRecord::from_fields(task_id, &fields).map(Some),
            None => Ok(None),
        }
    }

    /// Overwrites the status and resets the expiry.
    pub async fn update_status(&self, task_id: &str, status: TaskStatus) -> Result<(), KvError> {
        let key = record_key(task_id);
        self.kv.set_field(&key, FIELD_STATUS, status.as_str()).await?;
        self.kv.refresh_ttl(&key, self.ttl).await?;
        debug!(task_id, status = %status, "Task record updated");
        Ok(())
    }
}
