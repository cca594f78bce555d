//! Trend computation
//!
//! Percent change of the current window's totals against the immediately
//! preceding window of equal length. Without an explicit window, the
//! previous week `[today-14, today-7]` is used.

use chrono::{Days, NaiveDate};

use super::types::Trends;
use crate::glpi::error::GlpiError;

/// Percent change rounded to one decimal. A zero previous value maps to
/// `100.0` when anything appeared and `0.0` when nothing did, so the result
/// is always finite.
pub fn pct_change(current: u64, previous: u64) -> f64 {
    if previous > 0 {
        let change = (current as f64 - previous as f64) / previous as f64 * 100.0;
        (change * 10.0).round() / 10.0
    } else if current > 0 {
        100.0
    } else {
        0.0
    }
}

/// Build the `Trends` block from current and previous bucket totals
/// `(novos, pendentes, progresso, resolvidos)`.
pub fn trends_from_totals(current: (u64, u64, u64, u64), previous: (u64, u64, u64, u64)) -> Trends {
    Trends {
        novos: pct_change(current.0, previous.0),
        pendentes: pct_change(current.1, previous.1),
        progresso: pct_change(current.2, previous.2),
        resolvidos: pct_change(current.3, previous.3),
    }
}

/// The window immediately preceding `[start, end]`, same length. With no
/// window, the week before last: `[today-14, today-7]`.
pub fn previous_window(
    start: Option<&str>,
    end: Option<&str>,
    today: NaiveDate,
) -> Result<(String, String), GlpiError> {
    match (start, end) {
        (Some(start), Some(end)) => {
            let start = parse_day(start)?;
            let end = parse_day(end)?;
            if end < start {
                return Err(GlpiError::InvalidArgument(format!(
                    "end date {} precedes start date {}",
                    end, start
                )));
            }
            let duration_days = (end - start).num_days() as u64;
            let prev_end = start - Days::new(1);
            let prev_start = start - Days::new(duration_days + 1);
            Ok((format_day(prev_start), format_day(prev_end)))
        }
        _ => {
            let prev_start = today - Days::new(14);
            let prev_end = today - Days::new(7);
            Ok((format_day(prev_start), format_day(prev_end)))
        }
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate, GlpiError> {
    // Full timestamps are accepted by truncating to the day.
    let day_part = raw.trim().split(' ').next().unwrap_or_default();
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d")
        .map_err(|_| GlpiError::InvalidArgument(format!("invalid date '{}'", raw)))
}

fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
