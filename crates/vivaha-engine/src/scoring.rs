//! Weighted scoring and ranking of candidate slices.
//!
//! A slice earns *dasha points* from its transit activity (double transits, a
//! structural bonus, and per-window points) and a *house score* from the houses
//! its three rulers signify. The two are blended into a combined score:
//!
//! ```text
//! combined = round(house_share * house_score + points_share * dasha_points, 2)
//! ```
//!
//! with shares 0.7 / 0.3 by default. Ranking first keeps the `top_n` slices by
//! dasha points, then orders those by combined score. Both sorts are stable,
//! so ties keep input (chronological) order.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::chart::{combined_significators, SignificatorLookup};
use crate::config::{HouseSets, PredictionConfig, ScoringWeights};
use crate::error::{Result, VivahaError};
use crate::interval::{round2, DateSpan};
use crate::merger::{DoubleTransit, SliceTransits};
use crate::planet::{House, Planet};
use crate::simultaneity::SimultaneityWindow;

/// How the rulers' significations fall across the house groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseAnalysis {
    pub target: BTreeSet<House>,
    pub support: BTreeSet<House>,
    pub obstruction: BTreeSet<House>,
    pub house_score: f64,
}

/// A fully scored candidate slice. `rank` is 1-based and 0 until ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSlice {
    pub maha: Planet,
    pub antar: Planet,
    pub pratyantar: Planet,
    pub span: DateSpan,
    pub age_at_start: f64,
    pub windows: Vec<SimultaneityWindow>,
    pub double_transits: Vec<DoubleTransit>,
    pub combined_significator_houses: BTreeSet<House>,
    /// Distinct target houses that received a double transit.
    pub double_transit_count: usize,
    /// Two or more double-transit houses, or one plus significator cover of another target.
    pub is_perfect_trigger: bool,
    pub dasha_points: f64,
    pub house_analysis: HouseAnalysis,
    pub house_score: f64,
    pub combined_score: f64,
    pub rank: usize,
}

/// `0.5 + 0.5 * (1 - decay^days)`: 0.5 for an instant, approaching 1.0 for long windows.
pub fn duration_factor(days: i64, decay: f64) -> f64 {
    0.5 + 0.5 * (1.0 - decay.powf(days as f64))
}

/// Points for double transits, plus the distinct houses they covered.
pub fn double_transit_points(
    double_transits: &[DoubleTransit],
    weights: &ScoringWeights,
) -> (f64, BTreeSet<House>) {
    let mut points = 0.0;
    let mut houses = BTreeSet::new();
    for dt in double_transits {
        let strength = (dt.duration_days as f64 / weights.double_transit_full_days).min(1.0);
        for house in &dt.affected_houses {
            points += weights.double_transit_base * weights.house_weight(*house) * strength;
            houses.insert(*house);
        }
    }
    (points, houses)
}

/// Target houses not yet covered by a double transit that the significators reach.
fn significators_cover_remaining(
    double_transit_houses: &BTreeSet<House>,
    significators: &BTreeSet<House>,
    target: &BTreeSet<House>,
) -> bool {
    target
        .iter()
        .any(|h| !double_transit_houses.contains(h) && significators.contains(h))
}

pub fn structural_bonus(
    double_transit_houses: &BTreeSet<House>,
    significators: &BTreeSet<House>,
    target: &BTreeSet<House>,
    weights: &ScoringWeights,
) -> f64 {
    match double_transit_houses.len() {
        0 => 0.0,
        1 if significators_cover_remaining(double_transit_houses, significators, target) => {
            weights.single_house_bonus
        }
        1 => 0.0,
        _ => weights.multi_house_bonus,
    }
}

/// Points a single window contributes, scaled by its duration factor.
pub fn window_points(
    window: &SimultaneityWindow,
    target: &BTreeSet<House>,
    weights: &ScoringWeights,
) -> f64 {
    let factor = duration_factor(window.duration_days, weights.duration_decay);

    let coverage: f64 = window
        .houses_affected
        .intersection(target)
        .map(|h| weights.house_weight(*h))
        .sum();

    let direct: BTreeSet<Planet> = window
        .per_planet_detail
        .iter()
        .filter(|(_, d)| target.contains(&d.transiting_house))
        .map(|(p, _)| *p)
        .collect();
    let aspecting: BTreeSet<Planet> = window
        .per_planet_detail
        .iter()
        .filter(|(_, d)| !d.aspecting_houses.is_disjoint(target))
        .map(|(p, _)| *p)
        .collect();

    let mut points = coverage * weights.coverage_weight;
    points += direct.len() as f64 * weights.direct_planet_weight;
    points += aspecting.len() as f64 * weights.aspect_planet_weight;

    let benefics_direct = weights.benefics.iter().filter(|b| direct.contains(b)).count();
    points += match benefics_direct {
        2 => weights.benefic_pair_bonus,
        1 => weights.single_benefic_bonus,
        _ => 0.0,
    };

    points += match window.active_planets.len() {
        n if n >= 4 => weights.wide_activity_bonus,
        3 => weights.triple_activity_bonus,
        _ => 0.0,
    };

    for benefic in &weights.benefics {
        if aspecting.contains(benefic) && !direct.contains(benefic) {
            points += weights.benefic_aspect_bonus;
        }
    }

    points * factor
}

pub fn house_analysis(
    significators: &BTreeSet<House>,
    houses: &HouseSets,
    weights: &ScoringWeights,
) -> HouseAnalysis {
    let target: BTreeSet<House> = significators.intersection(&houses.target).copied().collect();
    let support: BTreeSet<House> = significators.intersection(&houses.support).copied().collect();
    let obstruction: BTreeSet<House> = significators
        .intersection(&houses.obstruction)
        .copied()
        .collect();

    let house_score = target.iter().map(|h| weights.significator_weight(*h)).sum::<f64>()
        + support.len() as f64 * weights.support_weight
        - obstruction.len() as f64 * weights.obstruction_penalty;

    HouseAnalysis {
        target,
        support,
        obstruction,
        house_score,
    }
}

/// Score one slice. The result is unranked.
pub fn score_slice<S>(
    slice: &SliceTransits,
    significators: &S,
    config: &PredictionConfig,
) -> ScoredSlice
where
    S: SignificatorLookup + ?Sized,
{
    let weights = &config.scoring;
    let target = &config.houses.target;
    let rulers = slice.slice.rulers();
    let combined = combined_significators(significators, &rulers);

    let (dt_points, dt_houses) = double_transit_points(&slice.double_transits, weights);
    let bonus = structural_bonus(&dt_houses, &combined, target, weights);
    let windows: f64 = slice
        .windows
        .iter()
        .map(|w| window_points(w, target, weights))
        .sum();
    let dasha_points = round2(dt_points + bonus + windows);

    let analysis = house_analysis(&combined, &config.houses, weights);
    let combined_score = round2(
        weights.house_score_share * analysis.house_score
            + weights.dasha_points_share * dasha_points,
    );
    let is_perfect_trigger = dt_houses.len() >= 2
        || (dt_houses.len() == 1 && significators_cover_remaining(&dt_houses, &combined, target));

    ScoredSlice {
        maha: slice.slice.maha,
        antar: slice.slice.antar,
        pratyantar: slice.slice.pratyantar,
        span: slice.slice.span,
        age_at_start: slice.slice.age_at_start,
        windows: slice.windows.clone(),
        double_transits: slice.double_transits.clone(),
        combined_significator_houses: combined,
        double_transit_count: dt_houses.len(),
        is_perfect_trigger,
        dasha_points,
        house_score: round2(analysis.house_score),
        house_analysis: HouseAnalysis {
            house_score: round2(analysis.house_score),
            ..analysis
        },
        combined_score,
        rank: 0,
    }
}

/// Keep the `top_n` slices by dasha points, re-sort those by combined score,
/// and number them from 1.
pub fn rank_slices(mut scored: Vec<ScoredSlice>, top_n: usize) -> Vec<ScoredSlice> {
    scored.sort_by(|a, b| b.dasha_points.total_cmp(&a.dasha_points));
    scored.truncate(top_n);
    scored.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    for (i, slice) in scored.iter_mut().enumerate() {
        slice.rank = i + 1;
    }
    scored
}

/// Reject malformed spans anywhere in the scoring input.
fn validate_slices(slices: &[SliceTransits]) -> Result<()> {
    for st in slices {
        let spans = std::iter::once(&st.slice.span)
            .chain(st.windows.iter().map(|w| &w.span))
            .chain(st.double_transits.iter().map(|d| &d.span));
        if let Some(bad) = spans.into_iter().find(|s| s.end < s.start) {
            return Err(VivahaError::Validation(format!(
                "interval ends {} before it starts {}",
                bad.end, bad.start
            )));
        }
    }
    Ok(())
}

/// Score every slice and return the ranked top list.
///
/// # Errors
/// `Validation` if any slice, window or double-transit span ends before it starts.
pub fn score_and_rank_slices<S>(
    slices: &[SliceTransits],
    significators: &S,
    config: &PredictionConfig,
) -> Result<Vec<ScoredSlice>>
where
    S: SignificatorLookup + ?Sized,
{
    validate_slices(slices)?;
    let scored: Vec<ScoredSlice> = slices
        .iter()
        .map(|s| score_slice(s, significators, config))
        .collect();
    let ranked = rank_slices(scored, config.scoring.top_n);
    log::debug!(
        "ranked {} of {} candidate slices",
        ranked.len(),
        slices.len()
    );
    Ok(ranked)
}
