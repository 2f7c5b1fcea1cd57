use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::nullable;

/// A project grouping tasks.
///
/// Tasks reference projects through `Task::project_id`. Deleting a project
/// leaves its tasks in place with a dangling reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl Project {
    pub fn new(input: CreateProjectInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: input.title,
            status: input.status,
            due_date: input.due_date,
        }
    }

    pub fn apply(&mut self, patch: UpdateProjectInput) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
    }
}

/// The progress of a project.
///
/// Presentation order is `NotStarted`, `InProgress`, `Done`. The store does not
/// enforce the set: unrecognised labels are preserved as `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProjectStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
    Other(String),
}

impl ProjectStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
            Self::Other(label) => label,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Not Started" => Self::NotStarted,
            "In Progress" => Self::InProgress,
            "Done" => Self::Done,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<String> for ProjectStatus {
    fn from(value: String) -> Self {
        Self::from_str(&value)
    }
}

impl From<ProjectStatus> for String {
    fn from(value: ProjectStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Input for creating a new project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProjectInput {
    pub title: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// Partial update for a project. An explicit `null` due date clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateProjectInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_display_labels() {
        let json = serde_json::to_string(&ProjectStatus::InProgress).unwrap();
        assert_eq!(json, r#""In Progress""#);

        let parsed: ProjectStatus = serde_json::from_str(r#""Done""#).unwrap();
        assert_eq!(parsed, ProjectStatus::Done);
    }

    #[test]
    fn unknown_status_round_trips_unchanged() {
        let parsed: ProjectStatus = serde_json::from_str(r#""Blocked""#).unwrap();
        assert_eq!(parsed, ProjectStatus::Other("Blocked".to_string()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#""Blocked""#);
    }
}
