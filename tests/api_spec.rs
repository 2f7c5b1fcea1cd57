use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use taskboard::api::{create_router, AppState};
use taskboard::events::EventBus;
use taskboard::models::*;
use taskboard::store::Store;
use taskboard::sync::{RetryPolicy, SyncEngine, SyncOptions, SyncOutcome};
use tempfile::TempDir;
use uuid::Uuid;

async fn setup() -> (TestServer, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = Store::open(dir.path()).await.expect("Failed to open store");
    let events = EventBus::new();
    let sync = SyncEngine::new(
        store.clone(),
        events.clone(),
        SyncOptions {
            fetch_timeout: Duration::from_secs(2),
            retry: RetryPolicy::none(),
            ..Default::default()
        },
    );
    let app = create_router(AppState {
        store,
        sync,
        events,
    });
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, dir)
}

async fn create_test_task(server: &TestServer, description: &str) -> Task {
    server
        .post("/api/v1/tasks")
        .json(&CreateTaskInput {
            description: description.to_string(),
            ..Default::default()
        })
        .await
        .json::<Task>()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let (server, _dir) = setup().await;

        let response = server.get("/api/v1/health").await;

        response.assert_status_ok();
        response.assert_json(&serde_json::json!({ "status": "ok" }));
    }
}

mod data {
    use super::*;

    #[tokio::test]
    async fn starts_empty() {
        let (server, _dir) = setup().await;

        let response = server.get("/api/v1/data").await;

        response.assert_status_ok();
        let data: AppData = response.json();
        assert!(data.tasks.is_empty());
        assert!(data.projects.is_empty());
        assert_eq!(data.settings, Settings::default());
    }

    #[tokio::test]
    async fn includes_created_records() {
        let (server, _dir) = setup().await;
        let task = create_test_task(&server, "Call plumber").await;

        let data: AppData = server.get("/api/v1/data").await.json();

        assert_eq!(data.tasks, vec![task]);
    }
}

mod tasks {
    use super::*;

    #[tokio::test]
    async fn create_returns_created_record() {
        let (server, _dir) = setup().await;

        let response = server
            .post("/api/v1/tasks")
            .json(&serde_json::json!({
                "description": "Buy milk",
                "dueDate": "2024-06-01"
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let task: Task = response.json();
        assert_eq!(task.description, "Buy milk");
        assert_eq!(task.due_date.as_deref(), Some("2024-06-01"));
    }

    #[tokio::test]
    async fn create_rejects_unknown_fields() {
        let (server, _dir) = setup().await;

        let response = server
            .post("/api/v1/tasks")
            .json(&serde_json::json!({ "description": "x", "priority": 5 }))
            .await;

        assert!(response.status_code().is_client_error());
        let data: AppData = server.get("/api/v1/data").await.json();
        assert!(data.tasks.is_empty());
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let (server, _dir) = setup().await;
        let task = create_test_task(&server, "Draft").await;

        let response = server
            .put(&format!("/api/v1/tasks/{}", task.id))
            .json(&serde_json::json!({ "isDone": true }))
            .await;

        response.assert_status_ok();
        let updated: Task = response.json();
        assert!(updated.is_done);
        assert_eq!(updated.description, "Draft");
    }

    #[tokio::test]
    async fn update_missing_returns_404() {
        let (server, _dir) = setup().await;

        let response = server
            .put(&format!("/api/v1/tasks/{}", Uuid::new_v4()))
            .json(&serde_json::json!({ "isDone": true }))
            .await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn get_missing_returns_404() {
        let (server, _dir) = setup().await;

        let response = server
            .get(&format!("/api/v1/tasks/{}", Uuid::new_v4()))
            .await;

        response.assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (server, _dir) = setup().await;
        let task = create_test_task(&server, "Temporary").await;

        for _ in 0..2 {
            let response = server
                .delete(&format!("/api/v1/tasks/{}", task.id))
                .await;
            response.assert_status_ok();
            response.assert_json(&serde_json::json!({ "success": true }));
        }

        let tasks: Vec<Task> = server.get("/api/v1/tasks").await.json();
        assert!(tasks.is_empty());
    }
}

mod projects {
    use super::*;

    #[tokio::test]
    async fn lifecycle() {
        let (server, _dir) = setup().await;

        let project: Project = server
            .post("/api/v1/projects")
            .json(&serde_json::json!({ "title": "Kitchen", "status": "Not Started" }))
            .await
            .json();
        assert_eq!(project.status, ProjectStatus::NotStarted);

        let updated: Project = server
            .put(&format!("/api/v1/projects/{}", project.id))
            .json(&serde_json::json!({ "status": "Done" }))
            .await
            .json();
        assert_eq!(updated.status, ProjectStatus::Done);
        assert_eq!(updated.title, "Kitchen");

        server
            .delete(&format!("/api/v1/projects/{}", project.id))
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/v1/projects/{}", project.id))
            .await
            .assert_status_not_found();
    }
}

mod settings {
    use super::*;

    #[tokio::test]
    async fn save_replaces_record() {
        let (server, _dir) = setup().await;
        let settings = Settings {
            ics_url: Some("https://example.com/cal.ics".to_string()),
            ics_import_preference: Some(ImportPreference::Tasks),
            ics_import_start_date: None,
        };

        let response = server.put("/api/v1/settings").json(&settings).await;

        response.assert_status_ok();
        let saved: Settings = server.get("/api/v1/settings").await.json();
        assert_eq!(saved, settings);
    }
}

mod sync {
    use super::*;

    #[tokio::test]
    async fn trigger_without_url_reports_failure() {
        let (server, _dir) = setup().await;

        let response = server.post("/api/v1/sync").await;

        response.assert_status_ok();
        let outcome: SyncOutcome = response.json();
        assert!(!outcome.success);
        assert_eq!(outcome.message, "No ICS URL configured");

        let status: serde_json::Value = server.get("/api/v1/sync/status").await.json();
        assert_eq!(status["status"], "error");
    }

    #[tokio::test]
    async fn preview_without_url_is_conflict() {
        let (server, _dir) = setup().await;

        server
            .get("/api/v1/feed/events")
            .await
            .assert_status(StatusCode::CONFLICT);
    }
}
