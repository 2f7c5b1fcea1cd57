use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::nullable;

/// A unit of work tracked by the board.
///
/// Tasks are either created directly by the user or materialized from a
/// calendar feed. Calendar-origin tasks carry `is_calendar_event = true` and,
/// when the feed supplies one, the event UID in `external_id`.
///
/// `project_id` may point at a project that has since been deleted; readers
/// must treat a dangling reference as "no project".
///
/// Dates are kept as the strings the caller supplied (ISO 8601). Calendar
/// import compares them by exact equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub is_calendar_event: bool,
    /// Free-form status. Calendar imports use `pending`.
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub location: Option<String>,
    /// UID of the feed event this task was imported from.
    #[serde(default)]
    pub external_id: Option<String>,
}

impl Task {
    /// Build a fresh record from creation input, assigning id and timestamp.
    pub fn new(input: CreateTaskInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            description: input.description,
            due_date: input.due_date,
            scheduled_date: input.scheduled_date,
            start_date: input.start_date,
            project_id: input.project_id,
            is_done: input.is_done,
            is_calendar_event: input.is_calendar_event,
            status: input.status,
            location: input.location,
            external_id: input.external_id,
        }
    }

    /// Shallow merge: supplied fields overwrite, omitted fields are retained.
    pub fn apply(&mut self, patch: UpdateTaskInput) {
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(scheduled_date) = patch.scheduled_date {
            self.scheduled_date = scheduled_date;
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(project_id) = patch.project_id {
            self.project_id = project_id;
        }
        if let Some(is_done) = patch.is_done {
            self.is_done = is_done;
        }
        if let Some(is_calendar_event) = patch.is_calendar_event {
            self.is_calendar_event = is_calendar_event;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(location) = patch.location {
            self.location = location;
        }
    }
}

/// Input for creating a new task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTaskInput {
    pub description: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub is_calendar_event: bool,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

/// Partial update for a task. All fields are optional.
///
/// Nullable fields are doubly optional: an omitted key keeps the stored
/// value, an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateTaskInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub scheduled_date: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub project_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_calendar_event: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<Option<String>>,
}

impl UpdateTaskInput {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::new(CreateTaskInput {
            description: "Write report".to_string(),
            due_date: Some("2024-03-01".to_string()),
            location: Some("Office".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn apply_keeps_omitted_fields() {
        let mut task = sample();
        let before = task.clone();

        task.apply(UpdateTaskInput {
            is_done: Some(true),
            ..Default::default()
        });

        assert!(task.is_done);
        assert_eq!(task.description, before.description);
        assert_eq!(task.due_date, before.due_date);
        assert_eq!(task.id, before.id);
        assert_eq!(task.created_at, before.created_at);
    }

    #[test]
    fn explicit_null_clears_and_missing_key_keeps() {
        let mut task = sample();
        let patch: UpdateTaskInput =
            serde_json::from_str(r#"{"dueDate": null, "status": "waiting"}"#).unwrap();

        task.apply(patch);

        assert_eq!(task.due_date, None);
        assert_eq!(task.location.as_deref(), Some("Office"));
        assert_eq!(task.status, "waiting");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<UpdateTaskInput, _> = serde_json::from_str(r#"{"color": "red"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn stored_records_use_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("isCalendarEvent").is_some());
        assert_eq!(json["dueDate"], "2024-03-01");
    }
}
