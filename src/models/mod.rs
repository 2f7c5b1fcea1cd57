//! Domain models for Taskboard.
//!
//! - [`Task`]: a unit of work, created by the user or imported from a calendar feed.
//! - [`Project`]: a grouping for tasks. Tasks may outlive their project.
//! - [`Settings`]: the single settings record, replaced wholesale on save.
//!
//! Each entity has a closed field set. Creation goes through a `Create*Input`
//! and updates through an `Update*Input` patch whose fields are all optional.

mod project;
mod settings;
mod task;

pub use project::*;
pub use settings::*;
pub use task::*;

use serde::{Deserialize, Deserializer, Serialize};

/// Snapshot of every collection, as returned to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppData {
    pub tasks: Vec<Task>,
    pub projects: Vec<Project>,
    pub settings: Settings,
}

/// Deserialize a present key into `Some(value)`, so that `null` becomes
/// `Some(None)` while a missing key stays `None` through `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
