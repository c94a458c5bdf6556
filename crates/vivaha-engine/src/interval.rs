//! Inclusive calendar-day intervals.
//!
//! Every span in the engine is a closed range of whole days: a span that starts
//! and ends on the same date lasts one day. Two spans overlap iff
//! `a.start <= b.end && b.start <= a.end`, so spans that merely touch
//! (`a.end + 1 == b.start`) are adjacent, not overlapping.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VivahaError};

/// Average Julian year, used wherever years are converted to days.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// A closed `[start, end]` range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Build a span, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(VivahaError::Validation(format!(
                "interval ends before it starts: {start} > {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of days covered, counting both endpoints.
    pub fn duration_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// The part of `self` inside `bounds`, or `None` when they are disjoint.
    pub fn clip_to(&self, bounds: &DateSpan) -> Option<DateSpan> {
        if !self.overlaps(bounds) {
            return None;
        }
        Some(DateSpan {
            start: self.start.max(bounds.start),
            end: self.end.min(bounds.end),
        })
    }

    /// Iterate every day in the span, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| VivahaError::Validation(format!("invalid date {s:?}: {e}")))
}

/// Check an analysis range: it must be non-empty and span at most `max_years`.
pub fn validate_range(start: NaiveDate, end: NaiveDate, max_years: u32) -> Result<()> {
    if start >= end {
        return Err(VivahaError::Validation(format!(
            "range start {start} must be before end {end}"
        )));
    }
    if years_between(start, end) > max_years as f64 {
        return Err(VivahaError::Validation(format!(
            "range {start}..{end} exceeds the maximum of {max_years} years"
        )));
    }
    Ok(())
}

/// Shift a date by a (possibly negative) number of days.
pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

/// Fractional years between two dates using the 365.25-day year, rounded to 2 places.
pub fn years_between(from: NaiveDate, to: NaiveDate) -> f64 {
    round2((to - from).num_days() as f64 / DAYS_PER_YEAR)
}

pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
