//! Intersect candidate dasha slices with transit simultaneity windows.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{HouseSets, PredictionConfig, SliceFilter, TransitSettings};
use crate::dasha::DashaSlice;
use crate::error::Result;
use crate::interval::DateSpan;
use crate::planet::{House, Planet};
use crate::simultaneity::{
    find_simultaneity_windows, summarize_transits, SimultaneityWindow, TransitSummary,
};
use crate::transit::{validate_intervals, DerivedTransit};

/// A window in which both planets of the watch pair influence the same target house.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleTransit {
    pub span: DateSpan,
    pub duration_days: i64,
    /// Target houses both planets transit or aspect.
    pub affected_houses: BTreeSet<House>,
    /// Houses influenced by the first planet of the pair.
    pub first_houses: BTreeSet<House>,
    /// Houses influenced by the second planet of the pair.
    pub second_houses: BTreeSet<House>,
}

/// Transit activity inside one candidate slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceTransits {
    pub slice: DashaSlice,
    /// Windows clipped to the slice; none shorter than the minimum duration.
    pub windows: Vec<SimultaneityWindow>,
    pub double_transits: Vec<DoubleTransit>,
    /// Per `(planet, sign)` rows overlapping the slice.
    pub summaries: Vec<TransitSummary>,
}

/// Slices whose Antar and Pratyantar rulers are both candidates and whose
/// start age falls inside the filter window. Input order is preserved.
pub fn candidate_slices(
    slices: &[DashaSlice],
    candidates: &[Planet],
    filter: &SliceFilter,
) -> Vec<DashaSlice> {
    slices
        .iter()
        .filter(|s| candidates.contains(&s.antar) && candidates.contains(&s.pratyantar))
        .filter(|s| filter.accepts(s.age_at_start))
        .cloned()
        .collect()
}

/// Configured marker planets, followed by candidates not already listed.
pub fn marker_planets(settings: &TransitSettings, candidates: &[Planet]) -> Vec<Planet> {
    let mut markers = settings.marker_planets.clone();
    for planet in candidates {
        if !markers.contains(planet) && !planet.is_outer() {
            markers.push(*planet);
        }
    }
    markers
}

/// Record every window where both planets of `pair` share a target house.
pub fn detect_double_transits(
    windows: &[SimultaneityWindow],
    pair: [Planet; 2],
    target_houses: &BTreeSet<House>,
) -> Vec<DoubleTransit> {
    windows
        .iter()
        .filter_map(|w| {
            let first = w.per_planet_detail.get(&pair[0])?.influenced_houses();
            let second = w.per_planet_detail.get(&pair[1])?.influenced_houses();
            let affected: BTreeSet<House> = target_houses
                .iter()
                .copied()
                .filter(|h| first.contains(h) && second.contains(h))
                .collect();
            if affected.is_empty() {
                return None;
            }
            Some(DoubleTransit {
                span: w.span,
                duration_days: w.duration_days,
                affected_houses: affected,
                first_houses: first,
                second_houses: second,
            })
        })
        .collect()
}

/// Run the compositor over one slice.
///
/// Only `markers` are considered and only their intervals overlapping the
/// slice. Windows are clipped to the slice and those left shorter than the
/// minimum duration are dropped.
pub fn merge_slice_transits(
    slice: &DashaSlice,
    transits: &[DerivedTransit],
    markers: &[Planet],
    houses: &HouseSets,
    settings: &TransitSettings,
) -> Result<SliceTransits> {
    let relevant: Vec<DerivedTransit> = transits
        .iter()
        .filter(|t| markers.contains(&t.planet) && t.span.overlaps(&slice.span))
        .cloned()
        .collect();

    let raw = find_simultaneity_windows(
        &relevant,
        &houses.target,
        settings.min_planets,
        settings.min_duration_days,
    )?;

    let windows: Vec<SimultaneityWindow> = raw
        .iter()
        .filter_map(|w| w.clipped_to(&slice.span))
        .filter(|w| {
            let keep = w.duration_days >= settings.min_duration_days;
            if !keep {
                log::debug!(
                    "window {}..={} shrinks to {} days inside {}-{}-{} slice; dropped",
                    w.span.start,
                    w.span.end,
                    w.duration_days,
                    slice.maha,
                    slice.antar,
                    slice.pratyantar
                );
            }
            keep
        })
        .collect();

    let double_transits =
        detect_double_transits(&windows, settings.double_transit_pair, &houses.target);

    Ok(SliceTransits {
        slice: slice.clone(),
        summaries: summarize_transits(&relevant, &slice.span),
        windows,
        double_transits,
    })
}

/// Filter the leaf slices to candidates and merge each with the transits.
///
/// # Errors
/// `Validation` if any transit interval ends before it starts.
pub fn merge_dasha_transits(
    slices: &[DashaSlice],
    transits: &[DerivedTransit],
    candidates: &[Planet],
    config: &PredictionConfig,
) -> Result<Vec<SliceTransits>> {
    validate_intervals(transits)?;

    let markers = marker_planets(&config.transits, candidates);
    let eligible = candidate_slices(slices, candidates, &config.slices);
    log::debug!(
        "{} of {} leaf slices are candidates; markers {:?}",
        eligible.len(),
        slices.len(),
        markers
    );

    eligible
        .iter()
        .map(|slice| {
            merge_slice_transits(slice, transits, &markers, &config.houses, &config.transits)
        })
        .collect()
}
