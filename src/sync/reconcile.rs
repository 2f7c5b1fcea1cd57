//! Matching feed events against stored tasks.
//!
//! A candidate duplicates a stored task when the stored task is a
//! calendar-origin task with the same description and the same start date
//! (exact string equality). Duplicates are never inserted twice.
//!
//! Matching by upstream identity uses the UID qualified by `RECURRENCE-ID`.
//! A feed that repeats the same identity (an expanded series without
//! recurrence ids) cannot be matched that way, so those events fall back to
//! the description and start key.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ics::FeedEvent;
use crate::models::{CreateTaskInput, Task, UpdateTaskInput};

const UNTITLED_EVENT: &str = "Untitled Event";
const IMPORTED_STATUS: &str = "pending";

/// What happens to a feed event that was imported before and has since
/// changed upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportUpdatePolicy {
    /// Imported tasks are never touched again. A renamed or moved event is
    /// imported as a new task.
    #[default]
    Never,
    /// Events carrying a UID update the task previously imported from the
    /// same UID and recurrence id.
    ByExternalId,
}

/// Changes needed to bring the store in line with the feed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Plan {
    pub inserts: Vec<CreateTaskInput>,
    pub updates: Vec<(Uuid, UpdateTaskInput)>,
    /// Events already present in the store or earlier in the same feed.
    pub unchanged: usize,
    /// Events dropped by the import cutoff.
    pub filtered: usize,
}

/// Convert a feed event into a calendar-origin task.
pub fn candidate(event: &FeedEvent) -> CreateTaskInput {
    let description = event
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNTITLED_EVENT)
        .to_string();

    CreateTaskInput {
        description,
        start_date: event.start.clone(),
        due_date: event.end.clone(),
        location: event.location.clone().filter(|l| !l.is_empty()),
        is_done: false,
        is_calendar_event: true,
        status: IMPORTED_STATUS.to_string(),
        external_id: event.external_id(),
        ..Default::default()
    }
}

fn is_duplicate(existing: &Task, candidate: &CreateTaskInput) -> bool {
    existing.is_calendar_event
        && existing.description == candidate.description
        && existing.start_date == candidate.start_date
}

/// Work out which events to insert, which stored tasks to update, and which
/// to leave alone.
pub fn plan(
    existing: &[Task],
    events: &[FeedEvent],
    cutoff: Option<NaiveDate>,
    policy: ImportUpdatePolicy,
) -> Plan {
    let mut plan = Plan::default();
    let feed_ids = identity_counts(events);

    for event in events {
        if let Some(cutoff) = cutoff {
            if event.start_day().is_some_and(|day| day < cutoff) {
                plan.filtered += 1;
                continue;
            }
        }

        let candidate = candidate(event);

        if policy == ImportUpdatePolicy::ByExternalId {
            let unique_in_feed = candidate
                .external_id
                .as_deref()
                .is_some_and(|id| feed_ids.get(id) == Some(&1));
            let matched = unique_in_feed
                .then(|| find_by_external_id(existing, &candidate))
                .flatten();
            if let Some(task) = matched {
                match diff(task, &candidate) {
                    Some(patch) if !plan.updates.iter().any(|(id, _)| *id == task.id) => {
                        plan.updates.push((task.id, patch))
                    }
                    _ => plan.unchanged += 1,
                }
                continue;
            }
        }

        let seen = existing.iter().any(|t| is_duplicate(t, &candidate))
            || plan.inserts.iter().any(|c| {
                c.description == candidate.description && c.start_date == candidate.start_date
            });
        if seen {
            plan.unchanged += 1;
        } else {
            plan.inserts.push(candidate);
        }
    }

    plan
}

fn identity_counts(events: &[FeedEvent]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for id in events.iter().filter_map(FeedEvent::external_id) {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}

/// The single stored calendar task imported under the candidate's identity.
/// More than one match is ambiguous and yields none.
fn find_by_external_id<'a>(existing: &'a [Task], candidate: &CreateTaskInput) -> Option<&'a Task> {
    let id = candidate.external_id.as_deref()?;
    let mut matches = existing
        .iter()
        .filter(|t| t.is_calendar_event && t.external_id.as_deref() == Some(id));
    let task = matches.next()?;
    matches.next().is_none().then_some(task)
}

/// Patch carrying the feed-owned fields that differ, if any.
fn diff(task: &Task, candidate: &CreateTaskInput) -> Option<UpdateTaskInput> {
    let mut patch = UpdateTaskInput::default();
    if task.description != candidate.description {
        patch.description = Some(candidate.description.clone());
    }
    if task.start_date != candidate.start_date {
        patch.start_date = Some(candidate.start_date.clone());
    }
    if task.due_date != candidate.due_date {
        patch.due_date = Some(candidate.due_date.clone());
    }
    if task.location != candidate.location {
        patch.location = Some(candidate.location.clone());
    }
    (!patch.is_empty()).then_some(patch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(summary: &str, start: &str) -> FeedEvent {
        FeedEvent {
            summary: Some(summary.to_string()),
            start: Some(start.to_string()),
            ..Default::default()
        }
    }

    fn stored(event: &FeedEvent) -> Task {
        Task::new(candidate(event))
    }

    #[test]
    fn candidate_maps_feed_fields() {
        let input = candidate(&FeedEvent {
            uid: Some("abc".to_string()),
            summary: Some("Standup".to_string()),
            start: Some("2024-01-02T09:00:00Z".to_string()),
            end: Some("2024-01-02T09:15:00Z".to_string()),
            location: Some("Room 4".to_string()),
            ..Default::default()
        });

        assert_eq!(input.description, "Standup");
        assert_eq!(input.start_date.as_deref(), Some("2024-01-02T09:00:00Z"));
        assert_eq!(input.due_date.as_deref(), Some("2024-01-02T09:15:00Z"));
        assert_eq!(input.location.as_deref(), Some("Room 4"));
        assert_eq!(input.external_id.as_deref(), Some("abc"));
        assert!(input.is_calendar_event);
        assert!(!input.is_done);
    }

    #[test]
    fn missing_summary_becomes_untitled() {
        let input = candidate(&FeedEvent::default());
        assert_eq!(input.description, UNTITLED_EVENT);
    }

    #[test]
    fn same_description_different_start_are_both_inserted() {
        let events = [
            event("Standup", "2024-01-02T09:00:00Z"),
            event("Standup", "2024-01-03T09:00:00Z"),
        ];
        let plan = plan(&[], &events, None, ImportUpdatePolicy::Never);
        assert_eq!(plan.inserts.len(), 2);
    }

    #[test]
    fn identical_events_in_one_feed_collapse() {
        let events = [
            event("Standup", "2024-01-02T09:00:00Z"),
            event("Standup", "2024-01-02T09:00:00Z"),
        ];
        let plan = plan(&[], &events, None, ImportUpdatePolicy::Never);
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn user_task_with_same_key_is_not_a_duplicate() {
        let feed = event("Standup", "2024-01-02T09:00:00Z");
        let mut user_task = stored(&feed);
        user_task.is_calendar_event = false;

        let plan = plan(&[user_task], &[feed], None, ImportUpdatePolicy::Never);
        assert_eq!(plan.inserts.len(), 1);
    }

    #[test]
    fn cutoff_skips_earlier_events() {
        let events = [
            event("Old", "2023-12-31T10:00:00Z"),
            event("New", "2024-01-01T10:00:00Z"),
        ];
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1);
        let plan = plan(&[], &events, cutoff, ImportUpdatePolicy::Never);

        assert_eq!(plan.filtered, 1);
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].description, "New");
    }

    #[test]
    fn never_policy_reimports_renamed_event() {
        let mut original = event("Standup", "2024-01-02T09:00:00Z");
        original.uid = Some("uid-1".to_string());
        let existing = stored(&original);

        let mut renamed = original.clone();
        renamed.summary = Some("Daily standup".to_string());

        let plan = plan(&[existing], &[renamed], None, ImportUpdatePolicy::Never);
        assert_eq!(plan.inserts.len(), 1);
        assert!(plan.updates.is_empty());
    }

    #[test]
    fn external_id_policy_updates_in_place() {
        let mut original = event("Standup", "2024-01-02T09:00:00Z");
        original.uid = Some("uid-1".to_string());
        let existing = stored(&original);

        let mut moved = original.clone();
        moved.start = Some("2024-01-02T10:00:00Z".to_string());

        let plan = plan(
            std::slice::from_ref(&existing),
            &[moved],
            None,
            ImportUpdatePolicy::ByExternalId,
        );
        assert!(plan.inserts.is_empty());
        assert_eq!(plan.updates.len(), 1);
        let (id, patch) = &plan.updates[0];
        assert_eq!(*id, existing.id);
        assert_eq!(
            patch.start_date,
            Some(Some("2024-01-02T10:00:00Z".to_string()))
        );
        assert!(patch.description.is_none());
    }

    #[test]
    fn external_id_policy_leaves_unchanged_events_alone() {
        let mut original = event("Standup", "2024-01-02T09:00:00Z");
        original.uid = Some("uid-1".to_string());
        let existing = stored(&original);

        let plan = plan(&[existing], &[original], None, ImportUpdatePolicy::ByExternalId);
        assert_eq!(plan, Plan {
            unchanged: 1,
            ..Default::default()
        });
    }

    fn occurrence(uid: &str, start: &str) -> FeedEvent {
        FeedEvent {
            uid: Some(uid.to_string()),
            ..event("Weekly review", start)
        }
    }

    #[test]
    fn series_sharing_one_uid_is_imported_per_occurrence() {
        let series = [
            occurrence("series-1", "2024-01-02T09:00:00Z"),
            occurrence("series-1", "2024-01-03T09:00:00Z"),
            occurrence("series-1", "2024-01-04T09:00:00Z"),
        ];
        let existing = stored(&series[0]);

        let plan = plan(&[existing], &series, None, ImportUpdatePolicy::ByExternalId);

        assert!(plan.updates.is_empty());
        assert_eq!(plan.unchanged, 1);
        let starts: Vec<_> = plan
            .inserts
            .iter()
            .filter_map(|c| c.start_date.as_deref())
            .collect();
        assert_eq!(starts, vec!["2024-01-03T09:00:00Z", "2024-01-04T09:00:00Z"]);
    }

    #[test]
    fn overridden_occurrence_updates_only_its_own_task() {
        let master = occurrence("series-1", "2024-01-02T09:00:00Z");
        let mut moved = occurrence("series-1", "2024-01-09T09:00:00Z");
        moved.recurrence_id = Some("2024-01-09T09:00:00Z".to_string());
        let existing = [stored(&master), stored(&moved)];

        let mut rescheduled = moved.clone();
        rescheduled.start = Some("2024-01-09T11:00:00Z".to_string());

        let plan = plan(
            &existing,
            &[master, rescheduled],
            None,
            ImportUpdatePolicy::ByExternalId,
        );

        assert!(plan.inserts.is_empty());
        assert_eq!(plan.unchanged, 1);
        assert_eq!(plan.updates.len(), 1);
        let (id, patch) = &plan.updates[0];
        assert_eq!(*id, existing[1].id);
        assert_eq!(
            patch.start_date,
            Some(Some("2024-01-09T11:00:00Z".to_string()))
        );
    }
}
