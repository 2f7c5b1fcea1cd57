use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    Json,
};
use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::AppState;
use crate::events::{Notification, SyncStatus};
use crate::models::*;
use crate::store::StoreError;
use crate::sync::{FeedEvent, SyncError, SyncOutcome};

// ============================================================
// Error Handling
// ============================================================

/// Map a store error to a response. Not-found is reported as-is; anything
/// else is logged server-side and returned as a generic message.
fn store_error(e: StoreError) -> (StatusCode, String) {
    if e.is_not_found() {
        tracing::warn!("Not found: {}", e);
        return (StatusCode::NOT_FOUND, e.to_string());
    }

    tracing::error!("Storage error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn not_found(entity: &'static str, id: Uuid) -> (StatusCode, String) {
    store_error(StoreError::NotFound { entity, id })
}

/// Write succeeded: tell subscribers to re-read.
fn data_changed(state: &AppState) {
    state.events.publish(Notification::DataChanged);
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Snapshot & Settings
// ============================================================

pub async fn get_data(
    State(state): State<AppState>,
) -> Result<Json<AppData>, (StatusCode, String)> {
    state.store.get_all().await.map(Json).map_err(store_error)
}

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<Settings>, (StatusCode, String)> {
    state.store.get_settings().await.map(Json).map_err(store_error)
}

pub async fn save_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> Result<Json<Settings>, (StatusCode, String)> {
    let saved = state
        .store
        .save_settings(settings)
        .await
        .map_err(store_error)?;
    data_changed(&state);
    Ok(Json(saved))
}

// ============================================================
// Tasks
// ============================================================

pub async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    state.store.get_all_tasks().await.map(Json).map_err(store_error)
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, (StatusCode, String)> {
    state
        .store
        .get_task(id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("Task", id))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(input): Json<CreateTaskInput>,
) -> Result<(StatusCode, Json<Task>), (StatusCode, String)> {
    let task = state.store.create_task(input).await.map_err(store_error)?;
    data_changed(&state);
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTaskInput>,
) -> Result<Json<Task>, (StatusCode, String)> {
    let task = state
        .store
        .update_task(id, input)
        .await
        .map_err(store_error)?;
    data_changed(&state);
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let success = state.store.delete_task(id).await.map_err(store_error)?;
    data_changed(&state);
    Ok(Json(serde_json::json!({ "success": success })))
}

// ============================================================
// Projects
// ============================================================

pub async fn list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<Project>>, (StatusCode, String)> {
    state
        .store
        .get_all_projects()
        .await
        .map(Json)
        .map_err(store_error)
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, (StatusCode, String)> {
    state
        .store
        .get_project(id)
        .await
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found("Project", id))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(input): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>), (StatusCode, String)> {
    let project = state
        .store
        .create_project(input)
        .await
        .map_err(store_error)?;
    data_changed(&state);
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateProjectInput>,
) -> Result<Json<Project>, (StatusCode, String)> {
    let project = state
        .store
        .update_project(id, input)
        .await
        .map_err(store_error)?;
    data_changed(&state);
    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let success = state.store.delete_project(id).await.map_err(store_error)?;
    data_changed(&state);
    Ok(Json(serde_json::json!({ "success": success })))
}

// ============================================================
// Calendar sync
// ============================================================

/// Run a sync now. Failures are part of the outcome, so this always
/// answers 200.
pub async fn trigger_sync(State(state): State<AppState>) -> Json<SyncOutcome> {
    Json(state.sync.sync().await)
}

pub async fn sync_status(State(state): State<AppState>) -> Json<Option<SyncStatus>> {
    Json(state.sync.last_status())
}

pub async fn feed_events(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedEvent>>, (StatusCode, String)> {
    state.sync.preview().await.map(Json).map_err(|e| {
        let status = match &e {
            SyncError::NotConfigured => StatusCode::CONFLICT,
            SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        tracing::warn!("Feed preview failed: {}", e);
        (status, e.to_string())
    })
}

// ============================================================
// Notifications
// ============================================================

/// Server-sent stream of `sync-status` and `data-changed` notifications.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => match Event::default()
                    .event(notification.name())
                    .json_data(&notification)
                {
                    Ok(event) => return Some((Ok::<_, Infallible>(event), rx)),
                    Err(e) => tracing::warn!("Dropping unencodable notification: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event subscriber lagged, skipped {}", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
