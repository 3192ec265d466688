//! # recurrence-engine
//!
//! Deterministic recurrence expansion for shared calendars.
//!
//! Turns stored event definitions (a UTC start/end plus an optional weekly
//! recurrence rule) into the concrete occurrences that fall inside a viewing
//! window, as seen from a viewer's timezone. Every function is pure: zones
//! and windows are passed in explicitly, and nothing reads the system clock.
//!
//! ## Modules
//!
//! - [`rule`] — `FREQ=WEEKLY;INTERVAL=n;BYDAY=..` text ⇄ [`RecurrenceRule`]
//! - [`timezone`] — UTC ⇄ local conversion and wall-clock resolution
//! - [`dst`] — DST gap policies
//! - [`window`] — Half-open query windows and calendar-view constructors
//! - [`event`] — Event definitions and occurrences
//! - [`expander`] — One event → its occurrences in a window
//! - [`aggregate`] — Many events → one merged expansion with per-event failures
//! - [`error`] — Error types

pub mod aggregate;
pub mod dst;
pub mod error;
pub mod event;
pub mod expander;
pub mod rule;
pub mod timezone;
pub mod window;

pub use aggregate::{expand_all, expand_all_with_options, EventFailure, Expansion};
pub use dst::DstPolicy;
pub use error::EngineError;
pub use event::{EventDefinition, Occurrence};
pub use expander::{expand_one, expand_one_with_options, ExpandOptions, SingleEventPolicy};
pub use rule::{parse_rule, Frequency, RecurrenceRule};
pub use timezone::{parse_timezone, resolve_wall_clock, to_local, to_utc, LocalDateTime};
pub use window::QueryWindow;
