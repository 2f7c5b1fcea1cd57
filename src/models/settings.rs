use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Board-wide settings. There is exactly one record and it is replaced
/// wholesale on every save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    /// URL of the calendar feed to synchronize.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ics_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ics_import_preference: Option<ImportPreference>,
    /// Events starting before this day (`YYYY-MM-DD`) are not imported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ics_import_start_date: Option<String>,
}

impl Settings {
    /// The configured feed URL, ignoring blank values.
    pub fn feed_url(&self) -> Option<&str> {
        self.ics_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether synced events should become tasks. Unset means yes.
    pub fn materializes_tasks(&self) -> bool {
        !matches!(
            self.ics_import_preference,
            Some(ImportPreference::DisplayOnly)
        )
    }

    /// The import cutoff day, if one is set and parseable.
    pub fn import_cutoff(&self) -> Option<NaiveDate> {
        let raw = self.ics_import_start_date.as_deref()?.trim();
        let day = raw.get(..10).unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// How feed events are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportPreference {
    /// Show feed events on the calendar without creating tasks.
    DisplayOnly,
    /// Materialize feed events as calendar-origin tasks.
    Tasks,
}
