use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::session::AuthUser,
    error::ApiError,
    extract::ApiJson,
    state::AppState,
    tasks::dto::{DeletedEnvelope, TaskBody, TaskEnvelope, TaskPatchBody},
    tasks::repo::Task,
    tasks::service,
};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/", get(list_tasks))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/", post(create_task)).route(
        "/:id",
        put(replace_task).patch(patch_task).delete(delete_task),
    )
}

#[instrument(skip(state, _auth))]
pub async fn list_tasks(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = service::list(state.tasks.as_ref()).await?;
    Ok(Json(tasks))
}

#[instrument(skip(state, _auth, body))]
pub async fn create_task(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(body): ApiJson<TaskBody>,
) -> Result<(StatusCode, Json<TaskEnvelope>), ApiError> {
    let task = service::create(state.tasks.as_ref(), body).await?;
    Ok((
        StatusCode::CREATED,
        Json(TaskEnvelope {
            success: true,
            data: task,
        }),
    ))
}

#[instrument(skip(state, _auth, body))]
pub async fn replace_task(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TaskBody>,
) -> Result<Json<TaskEnvelope>, ApiError> {
    let task = service::replace(state.tasks.as_ref(), id, body).await?;
    Ok(Json(TaskEnvelope {
        success: true,
        data: task,
    }))
}

#[instrument(skip(state, _auth, body))]
pub async fn patch_task(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TaskPatchBody>,
) -> Result<Json<TaskEnvelope>, ApiError> {
    let task = service::patch(state.tasks.as_ref(), id, body).await?;
    Ok(Json(TaskEnvelope {
        success: true,
        data: task,
    }))
}

#[instrument(skip(state, _auth))]
pub async fn delete_task(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<DeletedEnvelope>, ApiError> {
    service::remove(state.tasks.as_ref(), id).await?;
    Ok(Json(DeletedEnvelope {
        success: true,
        message: "Todo deleted".into(),
    }))
}
