//! Timezone conversion between stored UTC instants and viewer-local readings.
//!
//! Every function takes the zone explicitly; nothing here consults the
//! system clock or the process timezone. A [`LocalDateTime`] keeps the UTC
//! offset it was read with. [`to_utc`] reads the wall clock in the named zone
//! and uses that offset to choose between the two instants of a fall-back
//! hour, which is what makes `to_utc(to_local(t, z), z) == t` hold for every
//! instant.
//!
//! # Functions
//!
//! - [`parse_timezone`] — IANA name → [`Tz`]
//! - [`to_local`] / [`to_utc`] — exact conversions between UTC and a zone
//! - [`resolve_wall_clock`] — wall-clock reading → instant, with a [`DstPolicy`]
//! - [`parse_instant`] / [`parse_date`] / [`parse_wall_clock`] — text parsing for collaborators

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Timelike, Utc,
};
use chrono_tz::{OffsetComponents, Tz};
use serde::ser::SerializeStruct;
use serde::Serialize;

use crate::dst::DstPolicy;
use crate::error::EngineError;

/// Upper bound on how far [`DstPolicy::ShiftForward`] searches for the end of
/// a gap. Real transitions are at most a couple of hours wide.
const MAX_GAP_MINUTES: i64 = 24 * 60;

// ── LocalDateTime ───────────────────────────────────────────────────────────

/// A wall-clock reading in a named zone, together with the UTC offset that
/// was in effect for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDateTime {
    wall: NaiveDateTime,
    offset: FixedOffset,
    timezone: Tz,
}

impl LocalDateTime {
    /// A wall-clock reading in `timezone`, as typed into a form.
    ///
    /// Ambiguous readings take the earlier instant. A reading inside a DST
    /// gap is moved forward by the gap length ([`DstPolicy::WallClock`]), so
    /// `02:30` on a spring-forward night becomes `03:30`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidDatetime`] if the reading lies outside
    /// the representable range.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{NaiveDate, TimeZone, Utc};
    /// use recurrence_engine::timezone::{parse_timezone, to_utc, LocalDateTime};
    ///
    /// let wall = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap().and_hms_opt(10, 0, 0).unwrap();
    /// let tz = parse_timezone("America/New_York").unwrap();
    /// let local = LocalDateTime::new(wall, tz).unwrap();
    /// assert_eq!(
    ///     to_utc(&local, "America/New_York").unwrap(),
    ///     Utc.with_ymd_and_hms(2026, 3, 15, 14, 0, 0).unwrap()
    /// );
    /// ```
    pub fn new(wall: NaiveDateTime, timezone: Tz) -> Result<Self, EngineError> {
        let instant =
            resolve_wall_clock(wall, &timezone, DstPolicy::WallClock).ok_or_else(|| {
                EngineError::InvalidDatetime(format!(
                    "{wall} cannot be read in {}",
                    timezone.name()
                ))
            })?;
        Ok(Self::from_instant(instant, timezone))
    }

    /// Read `instant` on the clocks of `timezone`.
    pub fn from_instant(instant: DateTime<Utc>, timezone: Tz) -> Self {
        let local = instant.with_timezone(&timezone);
        Self {
            wall: local.naive_local(),
            offset: local.offset().fix(),
            timezone,
        }
    }

    /// The wall-clock reading.
    pub fn wall(&self) -> NaiveDateTime {
        self.wall
    }

    /// The local calendar date.
    pub fn date(&self) -> NaiveDate {
        self.wall.date()
    }

    /// The local time of day.
    pub fn time(&self) -> NaiveTime {
        self.wall.time()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// The instant this reading denotes.
    pub fn instant(&self) -> DateTime<Utc> {
        let utc = self.wall - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    /// Whether Daylight Saving Time is active for this reading.
    pub fn is_dst(&self) -> bool {
        is_dst_active(self.instant(), &self.timezone)
    }

    /// RFC 3339 rendering with the local offset, e.g. `2026-03-15T10:00:00-04:00`.
    pub fn to_rfc3339(&self) -> String {
        self.instant().with_timezone(&self.offset).to_rfc3339()
    }
}

impl Serialize for LocalDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LocalDateTime", 5)?;
        state.serialize_field("utc", &self.instant().to_rfc3339())?;
        state.serialize_field("local", &self.to_rfc3339())?;
        state.serialize_field("timezone", self.timezone.name())?;
        state.serialize_field("utc_offset", &format_utc_offset(self.offset))?;
        state.serialize_field("dst_active", &self.is_dst())?;
        state.end()
    }
}

// ── Conversions ─────────────────────────────────────────────────────────────

/// Parse an IANA timezone name into [`Tz`].
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] for names chrono-tz does not know.
pub fn parse_timezone(name: &str) -> Result<Tz, EngineError> {
    name.parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimezone(format!("'{name}'")))
}

/// Express a UTC instant in the named zone.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTimezone`] if `timezone` is not a valid IANA name.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use recurrence_engine::timezone::to_local;
///
/// let instant = Utc.with_ymd_and_hms(2026, 3, 15, 14, 0, 0).unwrap();
/// let local = to_local(instant, "America/New_York").unwrap();
/// // March 15 2026 is EDT (UTC-4)
/// assert_eq!(local.to_rfc3339(), "2026-03-15T10:00:00-04:00");
/// ```
pub fn to_local(instant: DateTime<Utc>, timezone: &str) -> Result<LocalDateTime, EngineError> {
    let tz = parse_timezone(timezone)?;
    Ok(LocalDateTime::from_instant(instant, tz))
}

/// Read the wall clock of `local` in the named zone and return the instant.
///
/// When the reading is ambiguous in `timezone` (the repeated hour of a
/// fall-back night), the instant whose offset matches the reading's own
/// offset wins, and the earlier instant otherwise. Readings that fall in a
/// DST gap of `timezone` follow [`DstPolicy::WallClock`].
///
/// # Errors
///
/// - [`EngineError::InvalidTimezone`] if `timezone` is not a valid IANA name.
/// - [`EngineError::InvalidDatetime`] if the reading lies outside the
///   representable range.
pub fn to_utc(local: &LocalDateTime, timezone: &str) -> Result<DateTime<Utc>, EngineError> {
    let tz = parse_timezone(timezone)?;
    let instant = match tz.from_local_datetime(&local.wall) {
        LocalResult::Ambiguous(earliest, latest) => {
            let chosen = if latest.offset().fix() == local.offset {
                latest
            } else {
                earliest
            };
            Some(chosen.with_timezone(&Utc))
        }
        _ => resolve_wall_clock(local.wall, &tz, DstPolicy::WallClock),
    };
    instant.ok_or_else(|| {
        EngineError::InvalidDatetime(format!("{} cannot be read in {timezone}", local.wall))
    })
}

/// Resolve a wall-clock reading in `tz` to an instant.
///
/// Ambiguous readings resolve to the earliest instant. Readings that do not
/// exist (DST gap) are handled according to `policy`. `None` is returned for
/// [`DstPolicy::Skip`], and for readings at the edge of the representable
/// range.
pub fn resolve_wall_clock(
    wall: NaiveDateTime,
    tz: &Tz,
    policy: DstPolicy,
) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&wall) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => match policy {
            DstPolicy::Skip => None,
            DstPolicy::WallClock => {
                // Read the wall time with the offset in force before the gap.
                let day_before = wall.checked_sub_signed(Duration::days(1))?;
                let before = tz.offset_from_utc_datetime(&day_before).fix();
                let utc = wall
                    .checked_sub_signed(Duration::seconds(i64::from(before.local_minus_utc())))?;
                Some(Utc.from_utc_datetime(&utc))
            }
            DstPolicy::ShiftForward => first_instant_after_gap(wall, tz),
        },
    }
}

/// Local midnight of `date` in `tz`. Zones whose DST gap swallows midnight
/// start the day at the end of the gap.
pub fn start_of_local_day(date: NaiveDate, tz: &Tz) -> Result<DateTime<Utc>, EngineError> {
    resolve_wall_clock(
        date.and_time(NaiveTime::MIN),
        tz,
        DstPolicy::ShiftForward,
    )
    .ok_or_else(|| {
        EngineError::InvalidDatetime(format!("no local midnight on {date} in {}", tz.name()))
    })
}

/// Parse an RFC 3339 datetime string into `DateTime<Utc>`.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::InvalidDatetime(format!("'{s}': {e}")))
}

/// Parse an ISO 8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(s: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| EngineError::InvalidDatetime(format!("'{s}': {e}")))
}

/// Parse a wall-clock reading without offset (`YYYY-MM-DDTHH:MM[:SS]`).
pub fn parse_wall_clock(s: &str) -> Result<NaiveDateTime, EngineError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|e| EngineError::InvalidDatetime(format!("'{s}': {e}")))
}

// ── Internal helpers ────────────────────────────────────────────────────────

fn first_instant_after_gap(wall: NaiveDateTime, tz: &Tz) -> Option<DateTime<Utc>> {
    let mut probe = wall.with_second(0)?.with_nanosecond(0)?;
    for _ in 0..MAX_GAP_MINUTES {
        probe = probe.checked_add_signed(Duration::minutes(1))?;
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return Some(dt.with_timezone(&Utc));
        }
    }
    None
}

/// DST is active when the zone adds a daylight-saving component to its base
/// offset at `instant`. Works the same in both hemispheres.
fn is_dst_active(instant: DateTime<Utc>, tz: &Tz) -> bool {
    instant.with_timezone(tz).offset().dst_offset() != Duration::zero()
}

/// Format the UTC offset as a string (e.g., "-05:00", "+09:00").
fn format_utc_offset(offset: FixedOffset) -> String {
    let offset_secs = offset.local_minus_utc();
    let sign = if offset_secs >= 0 { "+" } else { "-" };
    let abs_secs = offset_secs.unsigned_abs();
    let hours = abs_secs / 3600;
    let minutes = (abs_secs % 3600) / 60;
    format!("{sign}{hours:02}:{minutes:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    // ── to_local / to_utc ───────────────────────────────────────────────

    #[test]
    fn test_to_local_utc_to_eastern() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 15, 14, 0, 0).unwrap();
        let local = to_local(instant, "America/New_York").unwrap();
        assert_eq!(local.wall(), wall(2026, 3, 15, 10, 0));
        assert_eq!(format_utc_offset(local.offset()), "-04:00");
        assert!(local.is_dst());
    }

    #[test]
    fn test_to_local_winter_offset() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let local = to_local(instant, "America/New_York").unwrap();
        assert_eq!(format_utc_offset(local.offset()), "-05:00");
        assert!(!local.is_dst());
    }

    #[test]
    fn test_to_local_no_dst_zone() {
        let instant = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let local = to_local(instant, "Asia/Tokyo").unwrap();
        assert_eq!(format_utc_offset(local.offset()), "+09:00");
        assert!(!local.is_dst()); // Japan does not observe DST
    }

    #[test]
    fn test_to_local_crosses_date_line() {
        let instant = Utc.with_ymd_and_hms(2026, 6, 15, 20, 0, 0).unwrap();
        let local = to_local(instant, "Pacific/Auckland").unwrap();
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2026, 6, 16).unwrap());
    }

    #[test]
    fn test_round_trip_inside_fall_back_hour() {
        // Nov 1 2026: New York repeats 01:00-02:00. Both readings show 01:30.
        let first = Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 11, 1, 6, 30, 0).unwrap();
        let a = to_local(first, "America/New_York").unwrap();
        let b = to_local(second, "America/New_York").unwrap();
        assert_eq!(a.wall(), b.wall());
        assert_eq!(to_utc(&a, "America/New_York").unwrap(), first);
        assert_eq!(to_utc(&b, "America/New_York").unwrap(), second);
    }

    #[test]
    fn test_to_utc_from_typed_wall_clock() {
        let tz = parse_timezone("America/New_York").unwrap();
        let local = LocalDateTime::new(wall(2026, 3, 15, 10, 0), tz).unwrap();
        assert_eq!(
            to_utc(&local, "America/New_York").unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 15, 14, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_to_utc_reads_wall_clock_in_named_zone() {
        // The same 09:00 reading, placed on Tokyo clocks instead.
        let local = LocalDateTime::new(wall(2026, 1, 15, 9, 0), Tz::UTC).unwrap();
        assert_eq!(
            to_utc(&local, "Asia/Tokyo").unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_typed_reading_in_fall_back_hour_takes_earliest() {
        let tz = parse_timezone("America/New_York").unwrap();
        let local = LocalDateTime::new(wall(2026, 11, 1, 1, 30), tz).unwrap();
        assert_eq!(format_utc_offset(local.offset()), "-04:00");
        assert_eq!(
            to_utc(&local, "America/New_York").unwrap(),
            Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_typed_reading_in_gap_moves_forward() {
        let tz = parse_timezone("America/New_York").unwrap();
        let local = LocalDateTime::new(wall(2026, 3, 8, 2, 30), tz).unwrap();
        assert_eq!(local.wall(), wall(2026, 3, 8, 3, 30));
        assert_eq!(
            to_utc(&local, "America/New_York").unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 8, 7, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_to_utc_invalid_timezone() {
        let local = LocalDateTime::new(wall(2026, 1, 15, 9, 0), Tz::UTC).unwrap();
        let err = to_utc(&local, "Nowhere/Land").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimezone(_)));
    }

    #[test]
    fn test_dst_southern_hemisphere() {
        // Sydney observes DST from October to April.
        let january = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let july = Utc.with_ymd_and_hms(2026, 7, 15, 0, 0, 0).unwrap();
        let summer = to_local(january, "Australia/Sydney").unwrap();
        let winter = to_local(july, "Australia/Sydney").unwrap();
        assert!(summer.is_dst());
        assert_eq!(format_utc_offset(summer.offset()), "+11:00");
        assert!(!winter.is_dst());
        assert_eq!(format_utc_offset(winter.offset()), "+10:00");
    }

    #[test]
    fn test_invalid_timezone_returns_error() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 15, 14, 0, 0).unwrap();
        let err = to_local(instant, "Invalid/Zone").unwrap_err();
        assert!(err.to_string().contains("Invalid timezone"), "got: {err}");
    }

    #[test]
    fn test_local_serializes_with_metadata() {
        let instant = Utc.with_ymd_and_hms(2026, 7, 15, 12, 0, 0).unwrap();
        let local = to_local(instant, "Europe/London").unwrap();
        let json = serde_json::to_value(local).unwrap();
        assert_eq!(json["local"], "2026-07-15T13:00:00+01:00");
        assert_eq!(json["utc"], "2026-07-15T12:00:00+00:00");
        assert_eq!(json["timezone"], "Europe/London");
        assert_eq!(json["utc_offset"], "+01:00");
        assert_eq!(json["dst_active"], true);
    }

    // ── resolve_wall_clock ──────────────────────────────────────────────

    #[test]
    fn test_resolve_ordinary_time() {
        let tz = parse_timezone("America/Los_Angeles").unwrap();
        let got = resolve_wall_clock(wall(2026, 2, 17, 14, 0), &tz, DstPolicy::default());
        assert_eq!(got, Some(Utc.with_ymd_and_hms(2026, 2, 17, 22, 0, 0).unwrap()));
    }

    #[test]
    fn test_resolve_ambiguous_takes_earliest() {
        let tz = parse_timezone("America/New_York").unwrap();
        let got = resolve_wall_clock(wall(2026, 11, 1, 1, 30), &tz, DstPolicy::Skip);
        // 01:30 EDT (UTC-4)
        assert_eq!(got, Some(Utc.with_ymd_and_hms(2026, 11, 1, 5, 30, 0).unwrap()));
    }

    #[test]
    fn test_resolve_gap_wall_clock() {
        // Mar 8 2026: New York jumps from 02:00 to 03:00.
        let tz = parse_timezone("America/New_York").unwrap();
        let got = resolve_wall_clock(wall(2026, 3, 8, 2, 30), &tz, DstPolicy::WallClock);
        // 03:30 EDT
        assert_eq!(got, Some(Utc.with_ymd_and_hms(2026, 3, 8, 7, 30, 0).unwrap()));
    }

    #[test]
    fn test_resolve_gap_shift_forward() {
        let tz = parse_timezone("America/New_York").unwrap();
        let got = resolve_wall_clock(wall(2026, 3, 8, 2, 30), &tz, DstPolicy::ShiftForward);
        // 03:00 EDT
        assert_eq!(got, Some(Utc.with_ymd_and_hms(2026, 3, 8, 7, 0, 0).unwrap()));
    }

    #[test]
    fn test_resolve_gap_skip() {
        let tz = parse_timezone("America/New_York").unwrap();
        assert_eq!(
            resolve_wall_clock(wall(2026, 3, 8, 2, 30), &tz, DstPolicy::Skip),
            None
        );
    }

    #[test]
    fn test_start_of_local_day() {
        let tz = parse_timezone("Asia/Kolkata").unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        assert_eq!(
            start_of_local_day(date, &tz).unwrap(),
            Utc.with_ymd_and_hms(2026, 5, 3, 18, 30, 0).unwrap()
        );
    }

    // ── parsing ─────────────────────────────────────────────────────────

    #[test]
    fn test_parse_instant_with_offset() {
        assert_eq!(
            parse_instant("2026-01-15T14:00:00-05:00").unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 15, 19, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_instant_invalid() {
        let err = parse_instant("not-a-datetime").unwrap_err();
        assert!(err.to_string().contains("Invalid datetime"), "got: {err}");
    }

    #[test]
    fn test_parse_wall_clock() {
        assert_eq!(parse_wall_clock("2026-03-15T10:00:00").unwrap(), wall(2026, 3, 15, 10, 0));
        assert_eq!(parse_wall_clock("2026-03-15T10:00").unwrap(), wall(2026, 3, 15, 10, 0));
        assert!(parse_wall_clock("2026-03-15T10:00:00Z").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-01-14").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap()
        );
        assert!(parse_date("2024-13-01").is_err());
    }
}
