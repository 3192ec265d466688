//! Query windows: the half-open UTC interval a caller wants occurrences for.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::EngineError;
use crate::timezone::start_of_local_day;

/// A half-open interval `[start, end)` of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueryWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl QueryWindow {
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWindow`] if `end` is before `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, EngineError> {
        if end < start {
            return Err(EngineError::InvalidWindow(format!(
                "end {} is before start {}",
                end.to_rfc3339(),
                start.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// The week containing `date`, Monday 00:00 local to the following
    /// Monday 00:00 local. Matches the calendar grid's week view.
    pub fn week_of(date: NaiveDate, tz: &Tz) -> Result<Self, EngineError> {
        let monday = start_of_week(date);
        Self::new(
            start_of_local_day(monday, tz)?,
            start_of_local_day(monday + Duration::days(7), tz)?,
        )
    }

    /// Local midnight of `date` to the next local midnight.
    pub fn day_of(date: NaiveDate, tz: &Tz) -> Result<Self, EngineError> {
        Self::new(
            start_of_local_day(date, tz)?,
            start_of_local_day(date + Duration::days(1), tz)?,
        )
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether `[start, end)` shares any instant with this window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Monday of the ISO week containing `date`.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}
