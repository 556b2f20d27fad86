use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::tasks::repo::{NewTask, Task, TaskPatch, TaskStatus};

fn default_status() -> TaskStatus {
    TaskStatus::Todo
}

/// Request body for create and full replace.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBody {
    pub text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
}

impl From<TaskBody> for NewTask {
    fn from(body: TaskBody) -> Self {
        Self {
            text: body.text,
            description: body.description,
            status: body.status,
            start_at: body.start_at,
            end_at: body.end_at,
        }
    }
}

/// Request body for partial updates, most commonly a lone `status` from a
/// drag between columns. Omitted fields stay untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatchBody {
    pub text: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_at: Option<OffsetDateTime>,
}

impl From<TaskPatchBody> for TaskPatch {
    fn from(body: TaskPatchBody) -> Self {
        Self {
            text: body.text,
            description: body.description,
            status: body.status,
            start_at: body.start_at,
            end_at: body.end_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskEnvelope {
    pub success: bool,
    pub data: Task,
}

#[derive(Debug, Serialize)]
pub struct DeletedEnvelope {
    pub success: bool,
    pub message: String,
}
