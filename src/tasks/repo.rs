use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// The closed set of board columns. A flat set of labels: any status may
/// move to any other status, there is no transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Backlog,
    Inprogress,
    Done,
    Cancelled,
}

/// Task record in the database. Ids are store-assigned and immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub text: String,
    pub description: String,
    pub status: TaskStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Full field set for insert and replace; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub text: String,
    pub description: String,
    pub status: TaskStatus,
    pub start_at: OffsetDateTime,
    pub end_at: OffsetDateTime,
}

/// Field subset for partial updates; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub start_at: Option<OffsetDateTime>,
    pub end_at: Option<OffsetDateTime>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.start_at.is_none()
            && self.end_at.is_none()
    }
}

/// Pure persistence for tasks. `replace`/`patch` return `None` and `remove`
/// returns `false` for missing ids so callers can translate to NotFound —
/// a missing id is never a silent no-op.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: NewTask) -> anyhow::Result<Task>;
    async fn list(&self) -> anyhow::Result<Vec<Task>>;
    async fn replace(&self, id: i64, task: NewTask) -> anyhow::Result<Option<Task>>;
    async fn patch(&self, id: i64, patch: TaskPatch) -> anyhow::Result<Option<Task>>;
    async fn remove(&self, id: i64) -> anyhow::Result<bool>;
}

pub struct PgTaskStore {
    db: PgPool,
}

impl PgTaskStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn insert(&self, task: NewTask) -> anyhow::Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (text, description, status, start_at, end_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, text, description, status, start_at, end_at, created_at
            "#,
        )
        .bind(task.text)
        .bind(task.description)
        .bind(task.status)
        .bind(task.start_at)
        .bind(task.end_at)
        .fetch_one(&self.db)
        .await?;
        Ok(task)
    }

    async fn list(&self) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, text, description, status, start_at, end_at, created_at
            FROM tasks
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn replace(&self, id: i64, task: NewTask) -> anyhow::Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET text = $2, description = $3, status = $4, start_at = $5, end_at = $6
            WHERE id = $1
            RETURNING id, text, description, status, start_at, end_at, created_at
            "#,
        )
        .bind(id)
        .bind(task.text)
        .bind(task.description)
        .bind(task.status)
        .bind(task.start_at)
        .bind(task.end_at)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }

    // Single statement keeps a concurrent patch/delete on the same id
    // sequenced by the database, never interleaved field-by-field.
    async fn patch(&self, id: i64, patch: TaskPatch) -> anyhow::Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET text = COALESCE($2, text),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                start_at = COALESCE($5, start_at),
                end_at = COALESCE($6, end_at)
            WHERE id = $1
            RETURNING id, text, description, status, start_at, end_at, created_at
            "#,
        )
        .bind(id)
        .bind(patch.text)
        .bind(patch.description)
        .bind(patch.status)
        .bind(patch.start_at)
        .bind(patch.end_at)
        .fetch_optional(&self.db)
        .await?;
        Ok(task)
    }

    async fn remove(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query(r#"DELETE FROM tasks WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

struct MemoryInner {
    next_id: i64,
    tasks: BTreeMap<i64, Task>,
}

/// In-memory task store backing `AppState::fake()`. One lock around the
/// whole map gives the same per-record sequencing the database provides.
pub struct MemoryTaskStore {
    inner: Mutex<MemoryInner>,
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                next_id: 1,
                tasks: BTreeMap::new(),
            }),
        }
    }
}

impl MemoryTaskStore {
    fn locked(&self) -> anyhow::Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("task store mutex poisoned"))
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: NewTask) -> anyhow::Result<Task> {
        let mut inner = self.locked()?;
        let id = inner.next_id;
        inner.next_id += 1;
        let task = Task {
            id,
            text: task.text,
            description: task.description,
            status: task.status,
            start_at: task.start_at,
            end_at: task.end_at,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn list(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.locked()?.tasks.values().cloned().collect())
    }

    async fn replace(&self, id: i64, task: NewTask) -> anyhow::Result<Option<Task>> {
        let mut inner = self.locked()?;
        let Some(existing) = inner.tasks.get_mut(&id) else {
            return Ok(None);
        };
        existing.text = task.text;
        existing.description = task.description;
        existing.status = task.status;
        existing.start_at = task.start_at;
        existing.end_at = task.end_at;
        Ok(Some(existing.clone()))
    }

    async fn patch(&self, id: i64, patch: TaskPatch) -> anyhow::Result<Option<Task>> {
        let mut inner = self.locked()?;
        let Some(existing) = inner.tasks.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(text) = patch.text {
            existing.text = text;
        }
        if let Some(description) = patch.description {
            existing.description = description;
        }
        if let Some(status) = patch.status {
            existing.status = status;
        }
        if let Some(start_at) = patch.start_at {
            existing.start_at = start_at;
        }
        if let Some(end_at) = patch.end_at {
            existing.end_at = end_at;
        }
        Ok(Some(existing.clone()))
    }

    async fn remove(&self, id: i64) -> anyhow::Result<bool> {
        Ok(self.locked()?.tasks.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use time::macros::datetime;

    fn sample() -> NewTask {
        NewTask {
            text: "Ship release".into(),
            description: "cut the tag".into(),
            status: TaskStatus::Todo,
            start_at: datetime!(2025-01-01 09:00 UTC),
            end_at: datetime!(2025-01-01 17:00 UTC),
        }
    }

    #[tokio::test]
    async fn insert_assigns_monotonic_ids() {
        let store = MemoryTaskStore::default();
        let first = store.insert(sample()).await.expect("insert");
        let second = store.insert(sample()).await.expect("insert");
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn concurrent_inserts_never_collide() {
        let store = Arc::new(MemoryTaskStore::default());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.insert(sample()).await },
            ));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.expect("join").expect("insert").id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn patch_touches_only_supplied_fields() {
        let store = MemoryTaskStore::default();
        let created = store.insert(sample()).await.expect("insert");

        let patched = store
            .patch(
                created.id,
                TaskPatch {
                    status: Some(TaskStatus::Done),
                    ..TaskPatch::default()
                },
            )
            .await
            .expect("patch")
            .expect("present");

        assert_eq!(patched.status, TaskStatus::Done);
        assert_eq!(patched.text, created.text);
        assert_eq!(patched.description, created.description);
        assert_eq!(patched.start_at, created.start_at);
        assert_eq!(patched.end_at, created.end_at);
        assert_eq!(patched.created_at, created.created_at);
    }

    #[tokio::test]
    async fn replace_overwrites_every_field() {
        let store = MemoryTaskStore::default();
        let created = store.insert(sample()).await.expect("insert");

        let replacement = NewTask {
            text: "Ship hotfix".into(),
            description: String::new(),
            status: TaskStatus::Inprogress,
            start_at: datetime!(2025-02-01 09:00 UTC),
            end_at: datetime!(2025-02-01 17:00 UTC),
        };
        let replaced = store
            .replace(created.id, replacement.clone())
            .await
            .expect("replace")
            .expect("present");

        assert_eq!(replaced.id, created.id);
        assert_eq!(replaced.text, replacement.text);
        assert_eq!(replaced.description, replacement.description);
        assert_eq!(replaced.status, replacement.status);
        assert_eq!(replaced.start_at, replacement.start_at);

        let listed = store.list().await.expect("list");
        assert_eq!(listed, vec![replaced]);
    }

    #[tokio::test]
    async fn missing_ids_are_reported_not_swallowed() {
        let store = MemoryTaskStore::default();
        assert!(store
            .replace(99, sample())
            .await
            .expect("replace")
            .is_none());
        assert!(store
            .patch(99, TaskPatch::default())
            .await
            .expect("patch")
            .is_none());
        assert!(!store.remove(99).await.expect("remove"));
    }

    #[tokio::test]
    async fn remove_is_permanent() {
        let store = MemoryTaskStore::default();
        let created = store.insert(sample()).await.expect("insert");
        assert!(store.remove(created.id).await.expect("remove"));
        assert!(store.list().await.expect("list").is_empty());
        assert!(!store.remove(created.id).await.expect("second remove"));
    }
}
