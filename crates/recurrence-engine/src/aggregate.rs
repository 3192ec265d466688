//! Expansion of a whole event collection against one shared query window.
//!
//! Results are concatenated in input order. Occurrences of the same event
//! are in ascending date order, but no global sort is applied; call
//! [`Expansion::sort_by_start`] when a time-ordered view is needed.
//!
//! Failures are per event. A bad definition or rule never aborts the batch:
//! it is recorded in [`Expansion::failures`] and the remaining events are
//! still expanded.

use serde::{Serialize, Serializer};

use crate::error::EngineError;
use crate::event::{EventDefinition, Occurrence};
use crate::expander::{expand_in_zone, ExpandOptions};
use crate::timezone::parse_timezone;
use crate::window::QueryWindow;

/// An event that could not be expanded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFailure {
    pub event_id: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: EngineError,
}

/// The result of expanding a collection of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Expansion {
    pub occurrences: Vec<Occurrence>,
    pub failures: Vec<EventFailure>,
}

impl Expansion {
    /// True when every event expanded without error.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Order occurrences by start, then end, then occurrence id.
    pub fn sort_by_start(&mut self) {
        self.occurrences.sort_by(|a, b| {
            a.occurrence_start
                .cmp(&b.occurrence_start)
                .then_with(|| a.occurrence_end.cmp(&b.occurrence_end))
                .then_with(|| a.occurrence_id.cmp(&b.occurrence_id))
        });
    }
}

/// Expand every event with default options.
pub fn expand_all(events: &[EventDefinition], window: &QueryWindow, timezone: &str) -> Expansion {
    expand_all_with_options(events, window, timezone, &ExpandOptions::default())
}

/// Expand every event in `events` against `window` as seen from `timezone`.
///
/// Events filtered out by [`ExpandOptions::owners`] contribute nothing and
/// are not reported as failures. An unknown `timezone` fails every event
/// that passes the owner filter.
pub fn expand_all_with_options(
    events: &[EventDefinition],
    window: &QueryWindow,
    timezone: &str,
    options: &ExpandOptions,
) -> Expansion {
    let tz = parse_timezone(timezone);
    let mut expansion = Expansion::default();

    for event in events {
        if let Some(owners) = &options.owners {
            if !owners.contains(&event.owner_id) {
                continue;
            }
        }

        let result = event.validate().and_then(|()| match &tz {
            Ok(tz) => expand_in_zone(event, window, tz, options),
            Err(e) => Err(e.clone()),
        });

        match result {
            Ok(occurrences) => expansion.occurrences.extend(occurrences),
            Err(error) => {
                tracing::warn!(event_id = %event.id, %error, "event expansion failed");
                expansion.failures.push(EventFailure {
                    event_id: event.id.clone(),
                    error,
                });
            }
        }
    }

    tracing::debug!(
        events = events.len(),
        occurrences = expansion.occurrences.len(),
        failures = expansion.failures.len(),
        "expanded event collection"
    );
    expansion
}

fn serialize_error<S>(error: &EngineError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(error)
}
