use std::path::{Path, PathBuf};

const DATA_DIR: &str = "data";
const TASKS_FILE: &str = "tasks.json";
const PROJECTS_FILE: &str = "projects.json";
const SETTINGS_FILE: &str = "settings.json";

/// On-disk layout under the application data directory:
///
/// ```text
/// <root>/data/tasks.json      [Task, ...]
/// <root>/data/projects.json   [Project, ...]
/// <root>/data/settings.json   {Settings}
/// ```
#[derive(Debug, Clone)]
pub(crate) struct Layout {
    dir: PathBuf,
}

impl Layout {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(DATA_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tasks(&self) -> PathBuf {
        self.dir.join(TASKS_FILE)
    }

    pub fn projects(&self) -> PathBuf {
        self.dir.join(PROJECTS_FILE)
    }

    pub fn settings(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }
}
