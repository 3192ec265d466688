//! Occurrence expansion for a single event definition.
//!
//! A one-off event yields at most one occurrence. A recurring event is
//! walked week by week across its recurrence window in the viewer's zone:
//! every active weekday that lands inside the window gets an occurrence at
//! the event's local time of day, lasting exactly as long as the source
//! event. Output is always finite and in ascending date order.
//!
//! # Classification
//!
//! | `recurrence_rule` | window bounds | treated as |
//! |---|---|---|
//! | absent or blank | any | one-off |
//! | present | either bound missing | one-off, rule ignored |
//! | present | both present | recurring |
//!
//! A recurring event whose rule is unsupported (e.g. `FREQ=MONTHLY`)
//! produces no occurrences at all. It does not fall back to its literal
//! start/end.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate};
use chrono_tz::Tz;

use crate::dst::DstPolicy;
use crate::error::EngineError;
use crate::event::{EventDefinition, Occurrence};
use crate::rule::parse_rule;
use crate::timezone::{parse_timezone, resolve_wall_clock, LocalDateTime};
use crate::window::QueryWindow;

/// What to do with one-off events that fall outside the query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SingleEventPolicy {
    /// Emit the occurrence only if it overlaps the query window.
    #[default]
    FilterByWindow,
    /// Emit the occurrence regardless of the query window.
    AlwaysInclude,
}

/// Options for [`expand_one_with_options`] and
/// [`expand_all_with_options`](crate::aggregate::expand_all_with_options).
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    pub single_events: SingleEventPolicy,
    /// Handling of occurrences whose local time falls in a DST gap.
    pub dst_policy: DstPolicy,
    /// When set, only events owned by one of these members are expanded.
    /// Only consulted by the aggregator.
    pub owners: Option<BTreeSet<String>>,
}

enum Schedule<'a> {
    Single,
    Recurring {
        rule: &'a str,
        first: NaiveDate,
        last: NaiveDate,
    },
}

fn schedule(event: &EventDefinition) -> Schedule<'_> {
    match (
        event.rule_text(),
        event.recurrence_window_start,
        event.recurrence_window_end,
    ) {
        (Some(rule), Some(first), Some(last)) => Schedule::Recurring { rule, first, last },
        _ => Schedule::Single,
    }
}

/// Expand one event with default options.
///
/// # Errors
///
/// See [`expand_one_with_options`].
///
/// # Examples
///
/// ```
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use recurrence_engine::{expand_one, EventDefinition, QueryWindow};
///
/// let event = EventDefinition::new(
///     "gym",
///     "alice",
///     "Gym",
///     Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2024, 1, 1, 19, 0, 0).unwrap(),
/// )
/// .with_recurrence(
///     "FREQ=WEEKLY;BYDAY=MO,WE",
///     NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 1, 14).unwrap(),
/// );
/// let january = QueryWindow::new(
///     Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
/// )
/// .unwrap();
///
/// let occurrences = expand_one(&event, &january, "UTC").unwrap();
/// let ids: Vec<_> = occurrences.iter().map(|o| o.occurrence_id.as_str()).collect();
/// assert_eq!(ids, ["gym_2024-01-01", "gym_2024-01-03", "gym_2024-01-08", "gym_2024-01-10"]);
/// ```
pub fn expand_one(
    event: &EventDefinition,
    window: &QueryWindow,
    timezone: &str,
) -> Result<Vec<Occurrence>, EngineError> {
    expand_one_with_options(event, window, timezone, &ExpandOptions::default())
}

/// Expand one event into the occurrences overlapping `window`, as seen from
/// `timezone`.
///
/// # Errors
///
/// - [`EngineError::InvalidEvent`] if the event does not end after it starts.
/// - [`EngineError::InvalidTimezone`] if `timezone` is not a valid IANA name.
/// - [`EngineError::InvalidRule`] if the rule has a malformed `INTERVAL`.
/// - [`EngineError::InvalidEvent`] if an occurrence would end beyond the
///   representable date range.
pub fn expand_one_with_options(
    event: &EventDefinition,
    window: &QueryWindow,
    timezone: &str,
    options: &ExpandOptions,
) -> Result<Vec<Occurrence>, EngineError> {
    event.validate()?;
    let tz = parse_timezone(timezone)?;
    expand_in_zone(event, window, &tz, options)
}

/// Expansion with the zone already resolved. The event must already be
/// validated.
pub(crate) fn expand_in_zone(
    event: &EventDefinition,
    window: &QueryWindow,
    tz: &Tz,
    options: &ExpandOptions,
) -> Result<Vec<Occurrence>, EngineError> {
    match schedule(event) {
        Schedule::Single => Ok(expand_single(event, window, tz, options.single_events)),
        Schedule::Recurring { rule, first, last } => {
            expand_recurring(event, rule, first, last, window, tz, options.dst_policy)
        }
    }
}

fn expand_single(
    event: &EventDefinition,
    window: &QueryWindow,
    tz: &Tz,
    policy: SingleEventPolicy,
) -> Vec<Occurrence> {
    let include = match policy {
        SingleEventPolicy::AlwaysInclude => true,
        SingleEventPolicy::FilterByWindow => window.overlaps(event.start_at, event.end_at),
    };
    if !include {
        return Vec::new();
    }
    let local_date = LocalDateTime::from_instant(event.start_at, *tz).date();
    vec![Occurrence::single(event, local_date)]
}

fn expand_recurring(
    event: &EventDefinition,
    rule_text: &str,
    first: NaiveDate,
    last: NaiveDate,
    window: &QueryWindow,
    tz: &Tz,
    dst_policy: DstPolicy,
) -> Result<Vec<Occurrence>, EngineError> {
    let Some(rule) = parse_rule(rule_text)? else {
        tracing::debug!(event_id = %event.id, rule = rule_text, "unsupported rule, no occurrences");
        return Ok(Vec::new());
    };

    let time_of_day = LocalDateTime::from_instant(event.start_at, *tz).time();
    let duration = event.duration();
    let step = Duration::weeks(i64::from(rule.interval()));

    // Monday of the week holding the first window date.
    let to_monday = Duration::days(i64::from(first.weekday().num_days_from_monday()));
    let Some(mut cursor) = first.checked_sub_signed(to_monday) else {
        return Err(EngineError::InvalidEvent(format!(
            "recurrence window of event '{}' starts before the representable range",
            event.id
        )));
    };
    let mut occurrences = Vec::new();

    while cursor <= last {
        for weekday in rule.weekdays() {
            let offset = Duration::days(i64::from(weekday.num_days_from_monday()));
            let Some(date) = cursor.checked_add_signed(offset) else {
                continue;
            };
            if date < first || date > last {
                continue;
            }

            let Some(start) = resolve_wall_clock(date.and_time(time_of_day), tz, dst_policy)
            else {
                tracing::debug!(event_id = %event.id, %date, "occurrence in DST gap, skipped");
                continue;
            };
            let Some(end) = start.checked_add_signed(duration) else {
                return Err(EngineError::InvalidEvent(format!(
                    "occurrence of event '{}' on {date} ends beyond the representable range",
                    event.id
                )));
            };
            if !window.overlaps(start, end) {
                continue;
            }

            occurrences.push(Occurrence::recurring(event, date, start, end));
        }

        cursor = match cursor.checked_add_signed(step) {
            Some(next) => next,
            None => break,
        };
    }

    tracing::debug!(
        event_id = %event.id,
        rule = %rule,
        count = occurrences.len(),
        "expanded recurring event"
    );
    Ok(occurrences)
}
