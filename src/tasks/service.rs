use crate::error::ApiError;
use crate::tasks::dto::{TaskBody, TaskPatchBody};
use crate::tasks::repo::{NewTask, Task, TaskPatch, TaskStore};

// The only place task business rules live. Handlers map HTTP on and off;
// the store persists whatever arrives here.

fn validate_full(body: TaskBody) -> Result<NewTask, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::Validation("Text must not be empty".into()));
    }
    Ok(NewTask::from(body))
}

pub async fn list(store: &dyn TaskStore) -> Result<Vec<Task>, ApiError> {
    Ok(store.list().await?)
}

pub async fn create(store: &dyn TaskStore, body: TaskBody) -> Result<Task, ApiError> {
    let task = validate_full(body)?;
    Ok(store.insert(task).await?)
}

pub async fn replace(store: &dyn TaskStore, id: i64, body: TaskBody) -> Result<Task, ApiError> {
    let task = validate_full(body)?;
    store
        .replace(id, task)
        .await?
        .ok_or_else(|| ApiError::NotFound("Todo not found".into()))
}

pub async fn patch(store: &dyn TaskStore, id: i64, body: TaskPatchBody) -> Result<Task, ApiError> {
    let patch = TaskPatch::from(body);
    if patch.is_empty() {
        return Err(ApiError::Validation("No fields to update".into()));
    }
    if let Some(text) = &patch.text {
        if text.trim().is_empty() {
            return Err(ApiError::Validation("Text must not be empty".into()));
        }
    }
    store
        .patch(id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Todo not found".into()))
}

pub async fn remove(store: &dyn TaskStore, id: i64) -> Result<(), ApiError> {
    if store.remove(id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("Todo not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::repo::{MemoryTaskStore, TaskStatus};
    use time::macros::datetime;

    fn body(text: &str, status: TaskStatus) -> TaskBody {
        TaskBody {
            text: text.into(),
            description: "notes".into(),
            status,
            start_at: datetime!(2025-01-01 09:00 UTC),
            end_at: datetime!(2025-01-01 17:00 UTC),
        }
    }

    #[tokio::test]
    async fn create_rejects_blank_text() {
        let store = MemoryTaskStore::default();
        let err = create(&store, body("   ", TaskStatus::Todo))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert!(list(&store).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn create_then_list_shows_exactly_one_matching_record() {
        let store = MemoryTaskStore::default();
        let created = create(&store, body("Ship release", TaskStatus::Todo))
            .await
            .expect("create");

        let listed = list(&store).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], created);
        assert_eq!(listed[0].text, "Ship release");
    }

    #[tokio::test]
    async fn patch_rejects_an_empty_field_set() {
        let store = MemoryTaskStore::default();
        let created = create(&store, body("Ship release", TaskStatus::Todo))
            .await
            .expect("create");

        let err = patch(&store, created.id, TaskPatchBody::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn patch_rejects_blank_text() {
        let store = MemoryTaskStore::default();
        let created = create(&store, body("Ship release", TaskStatus::Todo))
            .await
            .expect("create");

        let err = patch(
            &store,
            created.id,
            TaskPatchBody {
                text: Some("  ".into()),
                ..TaskPatchBody::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn any_status_may_move_to_any_other() {
        let store = MemoryTaskStore::default();
        let created = create(&store, body("Ship release", TaskStatus::Done))
            .await
            .expect("create");

        // done -> todo is legal; the lifecycle is labels, not a pipeline.
        let reopened = patch(
            &store,
            created.id,
            TaskPatchBody {
                status: Some(TaskStatus::Todo),
                ..TaskPatchBody::default()
            },
        )
        .await
        .expect("patch");
        assert_eq!(reopened.status, TaskStatus::Todo);
    }

    #[tokio::test]
    async fn replace_is_an_overwrite_not_a_merge() {
        let store = MemoryTaskStore::default();
        let created = create(&store, body("Ship release", TaskStatus::Todo))
            .await
            .expect("create");

        let replaced = replace(
            &store,
            created.id,
            TaskBody {
                text: "Ship hotfix".into(),
                description: String::new(),
                status: TaskStatus::Inprogress,
                start_at: datetime!(2025-03-01 09:00 UTC),
                end_at: datetime!(2025-03-01 17:00 UTC),
            },
        )
        .await
        .expect("replace");

        let listed = list(&store).await.expect("list");
        assert_eq!(listed, vec![replaced]);
        assert_eq!(listed[0].description, "");
        assert_eq!(listed[0].start_at, datetime!(2025-03-01 09:00 UTC));
    }

    #[tokio::test]
    async fn lifecycle_scenario_create_patch_delete() {
        let store = MemoryTaskStore::default();

        let created = create(&store, body("Ship release", TaskStatus::Todo))
            .await
            .expect("create");
        assert_eq!(created.id, 1);

        let patched = patch(
            &store,
            created.id,
            TaskPatchBody {
                status: Some(TaskStatus::Inprogress),
                ..TaskPatchBody::default()
            },
        )
        .await
        .expect("patch");
        assert_eq!(patched.status, TaskStatus::Inprogress);
        assert_eq!(patched.text, "Ship release");

        remove(&store, created.id).await.expect("remove");

        let err = patch(
            &store,
            created.id,
            TaskPatchBody {
                status: Some(TaskStatus::Done),
                ..TaskPatchBody::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn operations_on_missing_ids_return_not_found() {
        let store = MemoryTaskStore::default();
        assert!(matches!(
            replace(&store, 42, body("x", TaskStatus::Todo))
                .await
                .unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            remove(&store, 42).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }
}
