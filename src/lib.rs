//! Taskboard: a personal task and project tracker with calendar feed sync.
//!
//! - [`store`]: durable JSON-backed storage for tasks, projects and settings.
//! - [`sync`]: fetches a calendar feed and imports its events as tasks.
//! - [`api`]: HTTP boundary used by front-ends.
//! - [`events`]: notifications pushed to front-ends.

pub mod api;
pub mod config;
pub mod events;
pub mod models;
pub mod store;
pub mod sync;
