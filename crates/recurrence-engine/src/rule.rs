//! Weekly recurrence rules.
//!
//! Only a small subset of RFC 5545 `RRULE` is understood: `FREQ=WEEKLY` with
//! an optional `INTERVAL` and a `BYDAY` list of two-letter weekday codes.
//! Everything else is either ignored (unknown keys) or makes the rule
//! *unsupported*, which [`parse_rule`] reports as `Ok(None)` rather than as an
//! error.
//!
//! ```
//! use chrono::Weekday;
//! use recurrence_engine::rule::parse_rule;
//!
//! let rule = parse_rule("FREQ=WEEKLY;INTERVAL=2;BYDAY=WE,MO").unwrap().unwrap();
//! assert_eq!(rule.interval(), 2);
//! assert_eq!(rule.weekdays(), &[Weekday::Mon, Weekday::Wed]);
//! assert_eq!(rule.to_string(), "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE");
//! ```

use std::fmt;

use chrono::Weekday;
use serde::Serialize;

use crate::error::EngineError;

/// Recurrence frequency. Weekly is the only supported value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Weekly,
}

impl Frequency {
    fn as_str(self) -> &'static str {
        match self {
            Frequency::Weekly => "WEEKLY",
        }
    }
}

/// A parsed weekly recurrence rule.
///
/// Invariants: `interval >= 1`, and `weekdays` is non-empty, free of
/// duplicates, and sorted Monday first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    #[serde(serialize_with = "serialize_weekdays")]
    weekdays: Vec<Weekday>,
}

impl RecurrenceRule {
    /// Build a weekly rule from its parts.
    ///
    /// Weekdays may be given in any order and may repeat; they are stored
    /// deduplicated in Monday → Sunday order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRule`] if `interval` is zero or no
    /// weekday is given.
    pub fn weekly<I>(interval: u32, weekdays: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = Weekday>,
    {
        if interval == 0 {
            return Err(EngineError::InvalidRule(
                "INTERVAL must be a positive integer".to_string(),
            ));
        }
        let weekdays = normalize_weekdays(weekdays);
        if weekdays.is_empty() {
            return Err(EngineError::InvalidRule(
                "BYDAY must name at least one weekday".to_string(),
            ));
        }
        Ok(Self {
            frequency: Frequency::Weekly,
            interval,
            weekdays,
        })
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Number of weeks between active weeks (1 = every week).
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Active weekdays, Monday first.
    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<&str> = self.weekdays.iter().map(|d| weekday_code(*d)).collect();
        write!(
            f,
            "FREQ={};INTERVAL={};BYDAY={}",
            self.frequency.as_str(),
            self.interval,
            codes.join(",")
        )
    }
}

/// Parse rule text such as `FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE`.
///
/// Fields are `;`-separated `KEY=VALUE` pairs in any order. Unknown keys,
/// fields without `=`, and fields with an empty value are ignored; a repeated
/// key keeps its last value. Unknown weekday codes are dropped.
///
/// # Returns
///
/// * `Ok(Some(rule))` for a supported weekly rule.
/// * `Ok(None)` when `FREQ` is missing or not `WEEKLY`, or when `BYDAY`
///   names no valid weekday. Callers treat this as "no rule".
///
/// # Errors
///
/// Returns [`EngineError::InvalidRule`] when `INTERVAL` is present but is not
/// a positive integer.
pub fn parse_rule(text: &str) -> Result<Option<RecurrenceRule>, EngineError> {
    let mut freq = None;
    let mut interval = None;
    let mut byday = None;

    for field in text.split(';') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        match key {
            "FREQ" => freq = Some(value),
            "INTERVAL" => interval = Some(value),
            "BYDAY" => byday = Some(value),
            _ => {}
        }
    }

    if freq != Some(Frequency::Weekly.as_str()) {
        return Ok(None);
    }

    let interval = match interval {
        Some(raw) => parse_interval(raw)?,
        None => 1,
    };

    let weekdays = normalize_weekdays(
        byday
            .unwrap_or_default()
            .split(',')
            .filter_map(|code| parse_weekday_code(code.trim())),
    );
    if weekdays.is_empty() {
        return Ok(None);
    }

    Ok(Some(RecurrenceRule {
        frequency: Frequency::Weekly,
        interval,
        weekdays,
    }))
}

/// Two-letter code for a weekday (`MO` … `SU`).
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Inverse of [`weekday_code`]. Codes are case-sensitive.
pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_interval(raw: &str) -> Result<u32, EngineError> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(EngineError::InvalidRule(format!(
            "INTERVAL must be a positive integer, got '{raw}'"
        ))),
    }
}

fn normalize_weekdays<I>(weekdays: I) -> Vec<Weekday>
where
    I: IntoIterator<Item = Weekday>,
{
    let mut days: Vec<Weekday> = weekdays.into_iter().collect();
    days.sort_by_key(|d| d.number_from_monday());
    days.dedup();
    days
}

fn serialize_weekdays<S>(weekdays: &[Weekday], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(weekdays.iter().map(|d| weekday_code(*d)))
}
