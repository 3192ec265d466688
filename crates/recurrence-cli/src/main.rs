//! `recur` — expand recurring calendar events from the command line.
//!
//! Reads event definitions as JSON, prints occurrences as JSON. Logging goes
//! to stderr and is controlled with `RUST_LOG` (default `warn`).

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Read};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use recurrence_engine::timezone::{parse_date, parse_instant, parse_wall_clock, start_of_local_day};
use recurrence_engine::{
    expand_all_with_options, parse_rule, parse_timezone, to_local, to_utc, DstPolicy,
    EventDefinition, ExpandOptions, LocalDateTime, QueryWindow, SingleEventPolicy,
};

#[derive(Parser)]
#[command(name = "recur", version, about = "Expand recurring calendar events into occurrences")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Expand a JSON array of event definitions for a query window
    Expand(ExpandArgs),
    /// Parse a recurrence rule and print it as JSON (null when unsupported)
    ParseRule {
        /// Rule text, e.g. "FREQ=WEEKLY;INTERVAL=2;BYDAY=MO,WE"
        rule: String,
    },
    /// Show a UTC instant on a timezone's clocks
    ToLocal {
        /// RFC 3339 instant
        instant: String,
        #[arg(long, env = "RECUR_TIMEZONE", default_value = "UTC")]
        timezone: String,
    },
    /// Convert a wall-clock reading on a timezone's clocks to UTC
    ToUtc {
        /// Local reading without offset, e.g. "2026-03-15T10:00"
        wall: String,
        #[arg(long, env = "RECUR_TIMEZONE", default_value = "UTC")]
        timezone: String,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("range").required(true).args(["from", "week", "day"])))]
struct ExpandArgs {
    /// Events file (JSON array), or "-" for stdin
    #[arg(long, default_value = "-")]
    events: String,

    /// Viewer timezone (IANA name)
    #[arg(long, env = "RECUR_TIMEZONE", default_value = "UTC")]
    timezone: String,

    /// Window start: RFC 3339 instant or YYYY-MM-DD (local midnight)
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// Window end (exclusive): RFC 3339 instant or YYYY-MM-DD (local midnight)
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// Use the Monday-to-Monday week containing this date
    #[arg(long)]
    week: Option<String>,

    /// Use the single local day
    #[arg(long)]
    day: Option<String>,

    /// Only expand events owned by this member (repeatable)
    #[arg(long = "owner")]
    owners: Vec<String>,

    /// Emit one-off events even when they fall outside the window
    #[arg(long)]
    include_all_singles: bool,

    /// Handling of occurrences that fall in a DST gap
    #[arg(long, value_enum, default_value_t = DstArg::WallClock)]
    dst_policy: DstArg,

    /// Sort occurrences by start time across events
    #[arg(long)]
    sort: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DstArg {
    WallClock,
    ShiftForward,
    Skip,
}

impl From<DstArg> for DstPolicy {
    fn from(arg: DstArg) -> Self {
        match arg {
            DstArg::WallClock => DstPolicy::WallClock,
            DstArg::ShiftForward => DstPolicy::ShiftForward,
            DstArg::Skip => DstPolicy::Skip,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let output = match cli.command {
        Command::Expand(args) => run_expand(&args)?,
        Command::ParseRule { rule } => run_parse_rule(&rule)?,
        Command::ToLocal { instant, timezone } => run_to_local(&instant, &timezone)?,
        Command::ToUtc { wall, timezone } => run_to_utc(&wall, &timezone)?,
    };
    println!("{output}");
    Ok(())
}

fn run_expand(args: &ExpandArgs) -> Result<String> {
    let tz = parse_timezone(&args.timezone)?;
    let window = query_window(args, &tz)?;
    let events = read_events(&args.events)?;

    let options = ExpandOptions {
        single_events: if args.include_all_singles {
            SingleEventPolicy::AlwaysInclude
        } else {
            SingleEventPolicy::FilterByWindow
        },
        dst_policy: args.dst_policy.into(),
        owners: if args.owners.is_empty() {
            None
        } else {
            Some(args.owners.iter().cloned().collect::<BTreeSet<_>>())
        },
    };

    tracing::info!(
        events = events.len(),
        timezone = %args.timezone,
        start = %window.start(),
        end = %window.end(),
        "expanding"
    );
    let mut expansion = expand_all_with_options(&events, &window, &args.timezone, &options);
    if args.sort {
        expansion.sort_by_start();
    }
    Ok(serde_json::to_string_pretty(&expansion)?)
}

fn run_parse_rule(text: &str) -> Result<String> {
    let rule = parse_rule(text).with_context(|| format!("cannot parse rule '{text}'"))?;
    let value = match rule {
        Some(rule) => serde_json::json!({
            "canonical": rule.to_string(),
            "rule": rule,
        }),
        None => serde_json::Value::Null,
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

fn run_to_local(instant: &str, timezone: &str) -> Result<String> {
    let instant = parse_instant(instant)?;
    let local = to_local(instant, timezone)?;
    Ok(serde_json::to_string_pretty(&local)?)
}

fn run_to_utc(wall: &str, timezone: &str) -> Result<String> {
    let tz = parse_timezone(timezone)?;
    let local = LocalDateTime::new(parse_wall_clock(wall)?, tz)?;
    let instant = to_utc(&local, timezone)?;
    Ok(instant.to_rfc3339())
}

fn query_window(args: &ExpandArgs, tz: &Tz) -> Result<QueryWindow> {
    if let Some(week) = &args.week {
        return Ok(QueryWindow::week_of(parse_date(week)?, tz)?);
    }
    if let Some(day) = &args.day {
        return Ok(QueryWindow::day_of(parse_date(day)?, tz)?);
    }
    // clap guarantees --from and --to arrive together when neither --week nor --day is set.
    let from = args.from.as_deref().unwrap_or_default();
    let to = args.to.as_deref().unwrap_or_default();
    let window = QueryWindow::new(parse_bound(from, tz)?, parse_bound(to, tz)?)?;
    Ok(window)
}

/// An RFC 3339 instant, or a bare date meaning local midnight in `tz`.
fn parse_bound(text: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    if let Ok(instant) = parse_instant(text) {
        return Ok(instant);
    }
    let date = parse_date(text)
        .with_context(|| format!("'{text}' is neither an RFC 3339 instant nor a date"))?;
    Ok(start_of_local_day(date, tz)?)
}

fn read_events(path: &str) -> Result<Vec<EventDefinition>> {
    let raw = if path == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read events from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read events from {path}"))?
    };
    serde_json::from_str(&raw).context("events must be a JSON array of event definitions")
}
