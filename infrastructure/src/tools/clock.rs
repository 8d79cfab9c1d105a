//! `get_current_datetime` tool: the current date and time as JSON.

use chrono::{DateTime, FixedOffset, Local, TimeZone, Utc};
use deliberation_domain::{ToolDefinition, ToolParameter};
use serde_json::json;
use std::fmt::Display;

pub const GET_CURRENT_DATETIME: &str = "get_current_datetime";

pub fn datetime_definition() -> ToolDefinition {
    ToolDefinition::new(
        GET_CURRENT_DATETIME,
        "Get the current date and time. Use this whenever the answer depends on today's date.",
    )
    .with_parameter(
        ToolParameter::new(
            "timezone",
            "'UTC' (default), 'local', or a UTC offset such as '+10:00'",
            false,
        )
        .with_type("string"),
    )
}

/// Describe `now` in the requested zone as pretty-printed JSON.
///
/// Unknown zones fall back to UTC and say so in the `timezone` field.
pub fn current_datetime(timezone: Option<&str>, now: DateTime<Utc>) -> String {
    let requested = timezone.map(str::trim).filter(|tz| !tz.is_empty());
    match requested {
        None => describe(now, "UTC"),
        Some(tz) if tz.eq_ignore_ascii_case("utc") => describe(now, "UTC"),
        Some(tz) if tz.eq_ignore_ascii_case("local") => {
            describe(now.with_timezone(&Local), "local")
        }
        Some(tz) => match parse_offset(tz) {
            Some(offset) => describe(now.with_timezone(&offset), &offset.to_string()),
            None => describe(now, "UTC (invalid timezone requested)"),
        },
    }
}

fn describe<Tz>(now: DateTime<Tz>, label: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let value = json!({
        "datetime": now.to_rfc3339(),
        "date": now.format("%Y-%m-%d").to_string(),
        "time": now.format("%H:%M:%S").to_string(),
        "timezone": label,
        "day_of_week": now.format("%A").to_string(),
        "timestamp": now.timestamp(),
    });
    format!("{:#}", value)
}

/// `+HH:MM`, `-HHMM` or `+HH`, optionally prefixed with `UTC`/`GMT`
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let upper = raw.to_ascii_uppercase();
    let rest = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(upper.as_str());

    let (sign, digits) = match rest.chars().next()? {
        '+' => (1, &rest[1..]),
        '-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
