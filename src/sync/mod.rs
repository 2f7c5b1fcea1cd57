//! Calendar feed synchronization.
//!
//! [`SyncEngine::sync`] reads the feed URL from settings, fetches and parses
//! the feed, and reconciles its events into the task collection through the
//! [`Store`]. Attempts are single-flight per engine: a trigger that arrives
//! while another attempt is running is coalesced into a failure outcome
//! instead of running a second pass.
//!
//! [`SyncEngine::start_auto_sync`] runs `sync` immediately and then on a
//! fixed period until [`SyncEngine::stop_auto_sync`].

mod fetch;
pub mod ics;
pub mod reconcile;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::events::{EventBus, Notification, SyncPhase, SyncStatus};
use crate::store::{Store, StoreError};

pub use fetch::{FeedClient, RetryPolicy};
pub use ics::{FeedEvent, ParseError};
pub use reconcile::ImportUpdatePolicy;

/// Default auto-sync period: 30 minutes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(1_800_000);

/// Sync failures. None of these escape [`SyncEngine::sync`]; they are
/// folded into a [`SyncOutcome`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No ICS URL configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Feed request failed with status {0}")]
    Http(reqwest::StatusCode),

    #[error("Feed request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Could not parse feed: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Sync already in progress")]
    InProgress,
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

impl SyncError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotConfigured => FailureKind::Configuration,
            Self::Network(_) | Self::Http(_) | Self::Timeout(_) => FailureKind::Network,
            Self::Parse(_) => FailureKind::Parse,
            Self::Store(_) => FailureKind::Storage,
            Self::InProgress => FailureKind::InProgress,
        }
    }

    /// Worth retrying the fetch.
    fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http(status) => status.is_server_error(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Configuration,
    Network,
    Parse,
    Storage,
    InProgress,
}

/// Result of one sync attempt, always returned by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Events seen in the feed.
    pub events: usize,
    pub imported: usize,
    pub updated: usize,
}

impl SyncOutcome {
    fn success(report: SyncReport) -> Self {
        Self {
            success: true,
            message: report.message(),
            failure: None,
            events: report.events,
            imported: report.imported,
            updated: report.updated,
        }
    }

    fn failure(error: &SyncError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            failure: Some(error.kind()),
            events: 0,
            imported: 0,
            updated: 0,
        }
    }
}

#[derive(Debug, Default)]
struct SyncReport {
    events: usize,
    imported: usize,
    updated: usize,
    filtered: usize,
    display_only: bool,
}

impl SyncReport {
    fn message(&self) -> String {
        if self.display_only {
            return format!("{} calendar events available (display only)", self.events);
        }
        let mut message = match (self.imported, self.updated) {
            (0, 0) => "Calendar up to date".to_string(),
            (imported, 0) => format!("Imported {imported} calendar events"),
            (imported, updated) => {
                format!("Imported {imported} and updated {updated} calendar events")
            }
        };
        if self.filtered > 0 {
            message.push_str(&format!(
                " ({} before the import start date skipped)",
                self.filtered
            ));
        }
        message
    }
}

/// Tunables for a [`SyncEngine`].
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub fetch_timeout: Duration,
    pub retry: RetryPolicy,
    pub update_policy: ImportUpdatePolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            update_policy: ImportUpdatePolicy::Never,
        }
    }
}

/// Handle to the sync engine. Cloning is cheap; clones share the in-flight
/// guard and the schedule.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

struct Inner {
    store: Store,
    client: FeedClient,
    events: EventBus,
    update_policy: ImportUpdatePolicy,
    in_flight: tokio::sync::Mutex<()>,
    schedule: Mutex<Option<Schedule>>,
    next_schedule_id: AtomicU64,
    last_status: Mutex<Option<SyncStatus>>,
}

struct Schedule {
    id: u64,
    interval: Duration,
    handle: JoinHandle<()>,
}

impl SyncEngine {
    pub fn new(store: Store, events: EventBus, options: SyncOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                client: FeedClient::new(options.fetch_timeout, options.retry),
                events,
                update_policy: options.update_policy,
                in_flight: tokio::sync::Mutex::new(()),
                schedule: Mutex::new(None),
                next_schedule_id: AtomicU64::new(1),
                last_status: Mutex::new(None),
            }),
        }
    }

    /// Run one sync attempt. Never fails: every error becomes a failed
    /// [`SyncOutcome`] carrying the error message.
    pub async fn sync(&self) -> SyncOutcome {
        let Ok(_guard) = self.inner.in_flight.try_lock() else {
            tracing::debug!("Sync trigger coalesced: attempt already in flight");
            let error = SyncError::InProgress;
            self.note_coalesced(&error);
            return SyncOutcome::failure(&error);
        };

        self.set_status(SyncPhase::Fetching, None);

        match self.run().await {
            Ok(report) => {
                let outcome = SyncOutcome::success(report);
                tracing::info!("Calendar sync succeeded: {}", outcome.message);
                if outcome.imported + outcome.updated > 0 {
                    self.inner.events.publish(Notification::DataChanged);
                }
                self.set_status(SyncPhase::Success, Some(outcome.message.clone()));
                outcome
            }
            Err(e) => {
                tracing::warn!("Calendar sync failed: {}", e);
                let outcome = SyncOutcome::failure(&e);
                self.set_status(SyncPhase::Error, Some(outcome.message.clone()));
                outcome
            }
        }
    }

    async fn run(&self) -> Result<SyncReport, SyncError> {
        let settings = self.inner.store.get_settings().await?;
        let url = settings.feed_url().ok_or(SyncError::NotConfigured)?;

        let body = self.inner.client.fetch(url).await?;
        let events = ics::parse_calendar(&body)?;
        tracing::debug!("Parsed {} events from feed", events.len());

        if !settings.materializes_tasks() {
            return Ok(SyncReport {
                events: events.len(),
                display_only: true,
                ..Default::default()
            });
        }

        let existing = self.inner.store.get_all_tasks().await?;
        let plan = reconcile::plan(
            &existing,
            &events,
            settings.import_cutoff(),
            self.inner.update_policy,
        );

        let mut report = SyncReport {
            events: events.len(),
            filtered: plan.filtered,
            ..Default::default()
        };
        for (id, patch) in plan.updates {
            match self.inner.store.update_task(id, patch).await {
                Ok(_) => report.updated += 1,
                // Deleted by the user since we looked; nothing to update.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        for input in plan.inserts {
            self.inner.store.create_task(input).await?;
            report.imported += 1;
        }

        Ok(report)
    }

    /// Fetch and parse the feed without touching the store.
    pub async fn preview(&self) -> Result<Vec<FeedEvent>, SyncError> {
        let settings = self.inner.store.get_settings().await?;
        let url = settings.feed_url().ok_or(SyncError::NotConfigured)?;
        let body = self.inner.client.fetch(url).await?;
        Ok(ics::parse_calendar(&body)?)
    }

    /// Sync now, then every `interval`. Any previous schedule is cancelled
    /// first, so calling this repeatedly never stacks timers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_auto_sync(&self, interval: Duration) {
        let mut slot = self.lock_schedule();
        if let Some(previous) = slot.take() {
            previous.handle.abort();
            tracing::debug!("Replaced auto-sync schedule {}", previous.id);
        }

        let id = self.inner.next_schedule_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(run_schedule(Arc::downgrade(&self.inner), id, interval));
        *slot = Some(Schedule {
            id,
            interval,
            handle,
        });
        tracing::info!("Auto-sync started every {:?}", interval);
    }

    /// Cancel the periodic schedule. Safe to call when not running. Once this
    /// returns no further scheduled attempt starts; one already started may
    /// still complete.
    pub fn stop_auto_sync(&self) {
        if let Some(schedule) = self.lock_schedule().take() {
            schedule.handle.abort();
            tracing::info!("Auto-sync stopped");
        }
    }

    /// Period of the active schedule, if any.
    pub fn auto_sync_interval(&self) -> Option<Duration> {
        self.lock_schedule().as_ref().map(|s| s.interval)
    }

    /// Most recent status reported by this engine.
    pub fn last_status(&self) -> Option<SyncStatus> {
        self.inner
            .last_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_status(&self, phase: SyncPhase, message: Option<String>) {
        let status = SyncStatus::new(phase, message);
        *self
            .inner
            .last_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(status.clone());
        self.inner.events.publish(Notification::SyncStatus(status));
    }

    /// Report a merged trigger against the running attempt. Skipped if that
    /// attempt has already recorded its result.
    fn note_coalesced(&self, error: &SyncError) {
        let status = {
            let mut last = self
                .inner
                .last_status
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !last.as_ref().is_some_and(|s| s.status == SyncPhase::Fetching) {
                return;
            }
            let status = SyncStatus::new(SyncPhase::Fetching, Some(error.to_string()));
            *last = Some(status.clone());
            status
        };
        self.inner.events.publish(Notification::SyncStatus(status));
    }

    fn lock_schedule(&self) -> std::sync::MutexGuard<'_, Option<Schedule>> {
        self.inner
            .schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Body of the scheduler task. Each tick spawns the attempt separately so
/// that aborting the schedule never cancels an attempt midway. The tick
/// checks, under the schedule lock, that it still owns the schedule; since
/// `stop_auto_sync` clears the slot under the same lock, no attempt is
/// spawned after it returns.
async fn run_schedule(weak: Weak<Inner>, id: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            let slot = inner.schedule.lock().unwrap_or_else(PoisonError::into_inner);
            if !slot.as_ref().is_some_and(|s| s.id == id) {
                return;
            }
            let engine = SyncEngine {
                inner: Arc::clone(&inner),
            };
            tokio::spawn(async move {
                engine.sync().await;
            });
        }
    }
}
