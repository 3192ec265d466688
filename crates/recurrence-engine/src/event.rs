//! Stored event definitions and the occurrences expanded from them.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The canonical description of one event, as persisted by the storage layer.
///
/// `start_at`/`end_at` are absolute UTC instants. The recurrence window
/// bounds are local calendar dates, read in the viewer's zone at expansion
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub recurrence_window_start: Option<NaiveDate>,
    #[serde(default)]
    pub recurrence_window_end: Option<NaiveDate>,
}

impl EventDefinition {
    /// A one-off event with no description and no recurrence.
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        title: impl Into<String>,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            title: title.into(),
            description: None,
            start_at,
            end_at,
            is_all_day: false,
            recurrence_rule: None,
            recurrence_window_start: None,
            recurrence_window_end: None,
        }
    }

    /// Attach a recurrence rule and its inclusive local-date window.
    pub fn with_recurrence(
        mut self,
        rule: impl Into<String>,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Self {
        self.recurrence_rule = Some(rule.into());
        self.recurrence_window_start = Some(window_start);
        self.recurrence_window_end = Some(window_end);
        self
    }

    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    /// Refuse definitions that would produce empty or negative occurrences.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidEvent`] when `end_at <= start_at`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.end_at <= self.start_at {
            return Err(EngineError::InvalidEvent(format!(
                "event '{}' ends at {} which is not after its start {}",
                self.id,
                self.end_at.to_rfc3339(),
                self.start_at.to_rfc3339()
            )));
        }
        Ok(())
    }

    /// Rule text, with blank text treated as no rule.
    pub(crate) fn rule_text(&self) -> Option<&str> {
        self.recurrence_rule
            .as_deref()
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
    }
}

/// One concrete, time-boxed instance of an event.
///
/// Occurrences are recomputed on every query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub source_event_id: String,
    /// Equal to the event id for one-off events, `"{event_id}_{YYYY-MM-DD}"`
    /// for recurring ones.
    pub occurrence_id: String,
    pub occurrence_start: DateTime<Utc>,
    pub occurrence_end: DateTime<Utc>,
    /// Calendar date of `occurrence_start` in the viewer's zone.
    pub local_date: NaiveDate,
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub is_all_day: bool,
    pub recurrence_rule: Option<String>,
}

impl Occurrence {
    pub(crate) fn single(event: &EventDefinition, local_date: NaiveDate) -> Self {
        Self::from_event(
            event,
            event.id.clone(),
            event.start_at,
            event.end_at,
            local_date,
        )
    }

    pub(crate) fn recurring(
        event: &EventDefinition,
        local_date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let occurrence_id = format!("{}_{}", event.id, local_date.format("%Y-%m-%d"));
        Self::from_event(event, occurrence_id, start, end, local_date)
    }

    fn from_event(
        event: &EventDefinition,
        occurrence_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        local_date: NaiveDate,
    ) -> Self {
        Self {
            source_event_id: event.id.clone(),
            occurrence_id,
            occurrence_start: start,
            occurrence_end: end,
            local_date,
            owner_id: event.owner_id.clone(),
            title: event.title.clone(),
            description: event.description.clone(),
            is_all_day: event.is_all_day,
            recurrence_rule: event.recurrence_rule.clone(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.occurrence_end - self.occurrence_start
    }
}
