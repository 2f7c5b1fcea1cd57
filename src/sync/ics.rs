//! Reading calendar feeds.
//!
//! `ical` does the tokenising (line unfolding, parameters, component
//! nesting); this module keeps only the `VEVENT` properties the board uses
//! and normalises timestamps so that identical instants compare equal as
//! strings:
//!
//! - `20240102T090000Z` becomes `2024-01-02T09:00:00Z`
//! - `TZID=America/New_York:20240102T090000` becomes `2024-01-02T14:00:00Z`
//! - `20240102T090000` (floating, or an unknown `TZID`) becomes `2024-01-02T09:00:00`
//! - `20240102` (`VALUE=DATE`) becomes `2024-01-02`

use std::io::BufReader;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalEvent;
use ical::property::Property;
use ical::IcalParser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid calendar data: {0}")]
pub struct ParseError(pub String);

impl ParseError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A `VEVENT` as read from a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub uid: Option<String>,
    /// Set on an overridden occurrence of a recurring series.
    pub recurrence_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub location: Option<String>,
}

impl FeedEvent {
    /// Calendar day the event starts on.
    pub fn start_day(&self) -> Option<NaiveDate> {
        let start = self.start.as_deref()?;
        NaiveDate::parse_from_str(start.get(..10)?, "%Y-%m-%d").ok()
    }

    /// Identity of this occurrence upstream: the UID, qualified by the
    /// recurrence id for overridden occurrences.
    pub fn external_id(&self) -> Option<String> {
        let uid = self.uid.as_deref()?;
        Some(match self.recurrence_id.as_deref() {
            Some(rid) => format!("{uid}#{rid}"),
            None => uid.to_string(),
        })
    }
}

/// Parse a calendar document into its events, in document order.
pub fn parse_calendar(input: &str) -> Result<Vec<FeedEvent>, ParseError> {
    let body = input.trim_start_matches('\u{feff}').trim_start();
    let has_header = body
        .get(..15)
        .is_some_and(|head| head.eq_ignore_ascii_case("BEGIN:VCALENDAR"));
    if !has_header {
        return Err(ParseError::new("missing BEGIN:VCALENDAR"));
    }

    let mut events = Vec::new();
    for calendar in IcalParser::new(BufReader::new(body.as_bytes())) {
        let calendar = calendar.map_err(|e| ParseError::new(e.to_string()))?;
        for event in &calendar.events {
            events.push(read_event(event)?);
        }
    }
    Ok(events)
}

fn read_event(event: &IcalEvent) -> Result<FeedEvent, ParseError> {
    let mut out = FeedEvent::default();
    for property in &event.properties {
        match property.name.to_ascii_uppercase().as_str() {
            "UID" => out.uid = text(property),
            "SUMMARY" => out.summary = text(property),
            "DESCRIPTION" => out.description = text(property),
            "LOCATION" => out.location = text(property),
            "DTSTART" => out.start = Some(normalize_timestamp(property)?),
            "DTEND" => out.end = Some(normalize_timestamp(property)?),
            "RECURRENCE-ID" => out.recurrence_id = Some(normalize_timestamp(property)?),
            _ => {}
        }
    }
    Ok(out)
}

fn param<'a>(property: &'a Property, key: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))?
        .1
        .first()
        .map(|value| value.trim_matches('"'))
}

fn text(property: &Property) -> Option<String> {
    property.value.as_deref().map(unescape_text)
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn normalize_timestamp(property: &Property) -> Result<String, ParseError> {
    let value = property.value.as_deref().unwrap_or_default().trim();
    let is_date = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()));

    if is_date {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .map(|d| d.format("%Y-%m-%d").to_string())
            .map_err(|e| ParseError::new(format!("bad {} date {value:?}: {e}", property.name)));
    }

    let (local, utc) = match value.strip_suffix(['Z', 'z']) {
        Some(stripped) => (stripped, true),
        None => (value, false),
    };
    let parsed = NaiveDateTime::parse_from_str(local, "%Y%m%dT%H%M%S").map_err(|e| {
        ParseError::new(format!("bad {} timestamp {value:?}: {e}", property.name))
    })?;

    if utc {
        return Ok(format_utc(parsed.and_utc()));
    }
    if let Some(tzid) = param(property, "TZID") {
        match in_zone(tzid, parsed) {
            Some(instant) => return Ok(format_utc(instant)),
            None => tracing::debug!("Unknown TZID {:?}, keeping wall-clock time", tzid),
        }
    }
    Ok(parsed.format("%Y-%m-%dT%H:%M:%S").to_string())
}

/// Resolve a wall-clock time in a named zone. A time skipped by a DST
/// change is read as one hour later; an ambiguous one takes the earlier
/// instant.
fn in_zone(tzid: &str, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    let tz: Tz = tzid.trim().parse().ok()?;
    let zoned = match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(local + chrono::Duration::hours(1)))
            .earliest()?,
    };
    Some(zoned.with_timezone(&Utc))
}

fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
