//! DST transition policies for recurring events.

/// Policy for occurrences whose wall-clock time falls in a DST gap
/// (e.g. 02:30 on a spring-forward night).
///
/// Ambiguous wall-clock times (the repeated hour when clocks fall back)
/// always resolve to the earlier instant, whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DstPolicy {
    /// Drop occurrences that fall in the gap.
    Skip,
    /// Move to the first valid instant after the gap (02:30 → 03:00).
    ShiftForward,
    /// Keep the wall-clock distance from the transition, shifted by the gap
    /// length (02:30 → 03:30).
    #[default]
    WallClock,
}
