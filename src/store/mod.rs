//! Durable entity store.
//!
//! Tasks, projects and settings each live in their own JSON document. Every
//! write re-reads the whole collection, mutates it in memory and writes the
//! whole collection back under that collection's lock.

mod document;
mod layout;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::models::*;
use document::Document;
use layout::Layout;

/// Entity store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored document {} is unreadable: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Handle to the entity store. Cloning is cheap and shares the same locks.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    layout: Layout,
    tasks: Document<Vec<Task>>,
    projects: Document<Vec<Project>>,
    settings: Document<Settings>,
}

impl Store {
    /// Open the store under `root`, creating the data directory and any
    /// missing document with its empty default. Existing documents are left
    /// untouched, so this is safe on every startup.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let layout = Layout::new(root.as_ref());
        tokio::fs::create_dir_all(layout.dir())
            .await
            .map_err(|source| StoreError::Io {
                path: layout.dir().to_path_buf(),
                source,
            })?;

        let inner = Inner {
            tasks: Document::new(layout.tasks()),
            projects: Document::new(layout.projects()),
            settings: Document::new(layout.settings()),
            layout,
        };

        let created = [
            inner.tasks.ensure(&Vec::new()).await?,
            inner.projects.ensure(&Vec::new()).await?,
            inner.settings.ensure(&Settings::default()).await?,
        ];
        if created.iter().any(|c| *c) {
            tracing::info!(
                "Initialized data directory at {}",
                inner.layout.dir().display()
            );
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn data_dir(&self) -> &Path {
        self.inner.layout.dir()
    }

    /// Consistent snapshot of all three collections.
    ///
    /// Locks are taken in a fixed order (tasks, projects, settings) so no
    /// collection is observed mid-write.
    pub async fn get_all(&self) -> Result<AppData> {
        let tasks_guard = self.inner.tasks.lock().await;
        let projects_guard = self.inner.projects.lock().await;
        let settings_guard = self.inner.settings.lock().await;

        Ok(AppData {
            tasks: self.inner.tasks.load(&tasks_guard).await?,
            projects: self.inner.projects.load(&projects_guard).await?,
            settings: self.inner.settings.load(&settings_guard).await?,
        })
    }

    // ============================================================
    // Settings operations
    // ============================================================

    pub async fn get_settings(&self) -> Result<Settings> {
        self.inner.settings.read().await
    }

    pub async fn save_settings(&self, settings: Settings) -> Result<Settings> {
        self.inner.settings.replace(&settings).await?;
        tracing::debug!(path = %self.inner.settings.path().display(), "Saved settings");
        Ok(settings)
    }

    // ============================================================
    // Task operations
    // ============================================================

    pub async fn get_all_tasks(&self) -> Result<Vec<Task>> {
        self.inner.tasks.read().await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let tasks = self.inner.tasks.read().await?;
        Ok(tasks.into_iter().find(|t| t.id == id))
    }

    pub async fn create_task(&self, input: CreateTaskInput) -> Result<Task> {
        let task = Task::new(input);
        let stored = task.clone();
        self.inner
            .tasks
            .modify(move |tasks| {
                tasks.push(task);
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    pub async fn update_task(&self, id: Uuid, input: UpdateTaskInput) -> Result<Task> {
        self.inner
            .tasks
            .modify(|tasks| {
                let task = tasks
                    .iter_mut()
                    .find(|t| t.id == id)
                    .ok_or(StoreError::NotFound { entity: "Task", id })?;
                task.apply(input);
                Ok(task.clone())
            })
            .await
    }

    /// Remove a task. Deleting an unknown id is not an error.
    pub async fn delete_task(&self, id: Uuid) -> Result<bool> {
        self.inner
            .tasks
            .modify(|tasks| {
                tasks.retain(|t| t.id != id);
                Ok(())
            })
            .await?;
        Ok(true)
    }

    // ============================================================
    // Project operations
    // ============================================================

    pub async fn get_all_projects(&self) -> Result<Vec<Project>> {
        self.inner.projects.read().await
    }

    pub async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        let projects = self.inner.projects.read().await?;
        Ok(projects.into_iter().find(|p| p.id == id))
    }

    pub async fn create_project(&self, input: CreateProjectInput) -> Result<Project> {
        let project = Project::new(input);
        let stored = project.clone();
        self.inner
            .projects
            .modify(move |projects| {
                projects.push(project);
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    pub async fn update_project(&self, id: Uuid, input: UpdateProjectInput) -> Result<Project> {
        self.inner
            .projects
            .modify(|projects| {
                let project = projects
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or(StoreError::NotFound {
                        entity: "Project",
                        id,
                    })?;
                project.apply(input);
                Ok(project.clone())
            })
            .await
    }

    /// Remove a project. Its tasks keep their (now dangling) `project_id`.
    pub async fn delete_project(&self, id: Uuid) -> Result<bool> {
        self.inner
            .projects
            .modify(|projects| {
                projects.retain(|p| p.id != id);
                Ok(())
            })
            .await?;
        Ok(true)
    }
}
