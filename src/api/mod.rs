mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::events::EventBus;
use crate::store::Store;
use crate::sync::SyncEngine;

/// Everything a request handler can reach.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sync: SyncEngine,
    pub events: EventBus,
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Snapshot
        .route("/data", get(handlers::get_data))
        // Settings
        .route(
            "/settings",
            get(handlers::get_settings).put(handlers::save_settings),
        )
        // Tasks
        .route(
            "/tasks",
            get(handlers::list_tasks).post(handlers::create_task),
        )
        .route(
            "/tasks/{id}",
            get(handlers::get_task)
                .put(handlers::update_task)
                .delete(handlers::delete_task),
        )
        // Projects
        .route(
            "/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/projects/{id}",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        // Calendar sync
        .route("/sync", post(handlers::trigger_sync))
        .route("/sync/status", get(handlers::sync_status))
        .route("/feed/events", get(handlers::feed_events))
        // Notifications
        .route("/events", get(handlers::events))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
