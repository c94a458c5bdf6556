//! Sweep-line detection of windows where several planets act on target houses together.
//!
//! Each transit contributes an add event on its first day and a remove event on
//! the day after its last. Events are sorted by date and every event sharing a
//! date is applied before the active set is inspected, so a planet that leaves
//! one sign and enters the next on consecutive days never leaves a one-day hole.
//!
//! A window opens on the first day the active set qualifies: at least
//! `min_planets` planets whose combined transited and aspected houses touch a
//! target house. Planets that join while it is open extend it. It closes the
//! day before any member leaves or changes sign, and a new window opens on the
//! same boundary if the remaining set still qualifies. A change of retrograde
//! state alone leaves the window intact. Windows shorter than the minimum
//! duration are discarded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval::{add_days, DateSpan};
use crate::planet::{ordinal, House, Planet, Sign};
use crate::transit::{validate_intervals, DerivedTransit};

/// Where one planet sits during a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanetDetail {
    pub sign: Sign,
    pub transiting_house: House,
    pub aspecting_houses: BTreeSet<House>,
}

impl PlanetDetail {
    fn of(transit: &DerivedTransit) -> Self {
        Self {
            sign: transit.sign,
            transiting_house: transit.transiting_house,
            aspecting_houses: transit.aspecting_houses.clone(),
        }
    }

    /// The transited house plus every aspected house.
    pub fn influenced_houses(&self) -> BTreeSet<House> {
        let mut houses = self.aspecting_houses.clone();
        houses.insert(self.transiting_house);
        houses
    }
}

/// A maximal span of qualifying concurrent activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimultaneityWindow {
    pub span: DateSpan,
    pub duration_days: i64,
    pub active_planets: BTreeSet<Planet>,
    /// Every house transited or aspected by an active planet.
    pub houses_affected: BTreeSet<House>,
    pub per_planet_detail: BTreeMap<Planet, PlanetDetail>,
}

impl SimultaneityWindow {
    fn from_details(span: DateSpan, details: BTreeMap<Planet, PlanetDetail>) -> Self {
        let houses_affected = details
            .values()
            .flat_map(PlanetDetail::influenced_houses)
            .collect();
        Self {
            span,
            duration_days: span.duration_days(),
            active_planets: details.keys().copied().collect(),
            houses_affected,
            per_planet_detail: details,
        }
    }

    /// Restrict to `bounds`, recomputing the duration.
    pub fn clipped_to(&self, bounds: &DateSpan) -> Option<SimultaneityWindow> {
        let span = self.span.clip_to(bounds)?;
        Some(SimultaneityWindow {
            span,
            duration_days: span.duration_days(),
            ..self.clone()
        })
    }
}

impl fmt::Display for SimultaneityWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} -> {} ({} days)",
            self.span.start, self.span.end, self.duration_days
        )?;
        for (planet, detail) in &self.per_planet_detail {
            let aspects: Vec<String> = detail
                .aspecting_houses
                .iter()
                .map(|h| h.to_string())
                .collect();
            let aspects = if aspects.is_empty() {
                "-".to_string()
            } else {
                aspects.join(", ")
            };
            writeln!(
                f,
                "  {:<8}: transiting {} house ({}) | aspecting {}",
                planet.name(),
                ordinal(detail.transiting_house as u32),
                detail.sign,
                aspects
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delta {
    Add,
    Remove,
}

struct OpenWindow {
    start: NaiveDate,
    details: BTreeMap<Planet, PlanetDetail>,
}

/// Find every qualifying window across `intervals`.
///
/// # Errors
/// `Validation` if any interval ends before it starts.
pub fn find_simultaneity_windows(
    intervals: &[DerivedTransit],
    target_houses: &BTreeSet<House>,
    min_planets: usize,
    min_duration_days: i64,
) -> Result<Vec<SimultaneityWindow>> {
    validate_intervals(intervals)?;

    let mut events: Vec<(NaiveDate, Delta, usize)> = Vec::with_capacity(intervals.len() * 2);
    for (idx, t) in intervals.iter().enumerate() {
        events.push((t.span.start, Delta::Add, idx));
        events.push((add_days(t.span.end, 1), Delta::Remove, idx));
    }
    // Stable: equal dates keep input order, and are applied as one batch anyway.
    events.sort_by_key(|&(date, _, _)| date);

    let qualifies = |details: &BTreeMap<Planet, PlanetDetail>| {
        details.len() >= min_planets
            && details
                .values()
                .any(|d| !d.influenced_houses().is_disjoint(target_houses))
    };

    let mut active: BTreeMap<usize, &DerivedTransit> = BTreeMap::new();
    let mut previous: BTreeMap<Planet, PlanetDetail> = BTreeMap::new();
    let mut open: Option<OpenWindow> = None;
    let mut windows = Vec::new();

    let mut i = 0;
    while i < events.len() {
        let date = events[i].0;
        while i < events.len() && events[i].0 == date {
            let (_, delta, idx) = events[i];
            match delta {
                Delta::Add => {
                    active.insert(idx, &intervals[idx]);
                }
                Delta::Remove => {
                    active.remove(&idx);
                }
            }
            i += 1;
        }

        let current = snapshot(&active);
        let departed = previous
            .iter()
            .any(|(planet, detail)| current.get(planet) != Some(detail));

        if departed {
            if let Some(window) = open.take() {
                close(window, add_days(date, -1), min_duration_days, &mut windows);
            }
        }

        match open.as_mut() {
            Some(window) => {
                for (planet, detail) in &current {
                    window
                        .details
                        .entry(*planet)
                        .or_insert_with(|| detail.clone());
                }
            }
            None if qualifies(&current) => {
                open = Some(OpenWindow {
                    start: date,
                    details: current.clone(),
                });
            }
            None => {}
        }

        previous = current;
    }

    log::debug!(
        "sweep over {} intervals produced {} windows",
        intervals.len(),
        windows.len()
    );
    Ok(windows)
}

/// Per-planet view of the active set. A planet listed twice keeps its later interval.
fn snapshot(active: &BTreeMap<usize, &DerivedTransit>) -> BTreeMap<Planet, PlanetDetail> {
    active
        .values()
        .map(|t| (t.planet, PlanetDetail::of(t)))
        .collect()
}

fn close(
    window: OpenWindow,
    end: NaiveDate,
    min_duration_days: i64,
    out: &mut Vec<SimultaneityWindow>,
) {
    let span = DateSpan {
        start: window.start,
        end,
    };
    if span.duration_days() < min_duration_days {
        log::debug!(
            "dropping {}-day window {}..={} below the {}-day minimum",
            span.duration_days(),
            span.start,
            span.end,
            min_duration_days
        );
        return;
    }
    out.push(SimultaneityWindow::from_details(span, window.details));
}

/// One planet's combined stay in one sign across a query range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitSummary {
    pub planet: Planet,
    pub sign: Sign,
    /// Earliest start to latest end of the merged intervals (not clipped).
    pub span: DateSpan,
    pub transiting_house: House,
    pub aspecting_houses: BTreeSet<House>,
}

/// Merge the intervals overlapping `range` by `(planet, sign)`.
///
/// Independent of window detection: repeated visits to a sign (and retrograde
/// splits) collapse into one row spanning all of them. Rows keep first-seen order.
pub fn summarize_transits(intervals: &[DerivedTransit], range: &DateSpan) -> Vec<TransitSummary> {
    let mut rows: Vec<TransitSummary> = Vec::new();
    let mut index: BTreeMap<(Planet, Sign), usize> = BTreeMap::new();

    for t in intervals.iter().filter(|t| t.span.overlaps(range)) {
        match index.get(&(t.planet, t.sign)) {
            Some(&pos) => {
                let row = &mut rows[pos];
                row.span.start = row.span.start.min(t.span.start);
                row.span.end = row.span.end.max(t.span.end);
                row.aspecting_houses.extend(t.aspecting_houses.iter().copied());
            }
            None => {
                index.insert((t.planet, t.sign), rows.len());
                rows.push(TransitSummary {
                    planet: t.planet,
                    sign: t.sign,
                    span: t.span,
                    transiting_house: t.transiting_house,
                    aspecting_houses: t.aspecting_houses.clone(),
                });
            }
        }
    }
    rows
}
