//! End-to-end prediction: dasha tree, transits, merger and ranking.

use serde::{Deserialize, Serialize};

use crate::candidates::select_candidate_rulers;
use crate::chart::{ChartLookup, SignHouseMap, SignificatorLookup};
use crate::config::PredictionConfig;
use crate::dasha::{generate_dasha_tree, BirthData, DashaBalance};
use crate::error::Result;
use crate::interval::DateSpan;
use crate::merger::{candidate_slices, marker_planets, merge_dasha_transits};
use crate::planet::Planet;
use crate::scoring::{score_and_rank_slices, ScoredSlice};
use crate::transit::{collect_samples, normalize_transits};

/// Result of one prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub balance: DashaBalance,
    pub candidate_rulers: Vec<Planet>,
    /// Best slices, rank 1 first.
    pub ranked: Vec<ScoredSlice>,
}

/// Every planet that must be sampled: markers, tracked planets, then candidates.
fn sampled_planets(config: &PredictionConfig, candidates: &[Planet]) -> Vec<Planet> {
    let mut planets = marker_planets(&config.transits, candidates);
    for planet in &config.transits.tracked_planets {
        if !planets.contains(planet) {
            planets.push(*planet);
        }
    }
    planets
}

/// Run the full pipeline for one chart.
///
/// `candidates` overrides the ruler selection; when `None` the rulers are
/// picked from the significations. The transit range covers exactly the
/// candidate slices, so the lookup is never queried outside them.
///
/// # Errors
/// `Configuration` for an invalid config, `Validation` for bad birth data or
/// an oversized range, `InvariantViolation` if the dasha tree fails its checks,
/// and anything the lookup reports.
pub fn predict<L, S>(
    birth: &BirthData,
    lookup: &L,
    sign_houses: &SignHouseMap,
    significators: &S,
    candidates: Option<&[Planet]>,
    config: &PredictionConfig,
) -> Result<Prediction>
where
    L: ChartLookup + ?Sized,
    S: SignificatorLookup + ?Sized,
{
    config.validate()?;

    let tree = generate_dasha_tree(birth, &config.rulers)?;

    let candidate_rulers = match candidates {
        Some(list) => list.to_vec(),
        None => select_candidate_rulers(significators, &config.candidates),
    };

    let slices = candidate_slices(&tree.leaf_slices(), &candidate_rulers, &config.slices);
    let (Some(first), Some(last_end)) = (
        slices.first(),
        slices.iter().map(|s| s.span.end).max(),
    ) else {
        log::warn!(
            "no dasha slice between ages {} and {} is ruled by candidates {:?}",
            config.slices.min_age_years,
            config.slices.max_age_years,
            candidate_rulers
        );
        return Ok(Prediction {
            balance: tree.balance,
            candidate_rulers,
            ranked: Vec::new(),
        });
    };
    let range = DateSpan {
        start: first.span.start,
        end: last_end,
    };

    let planets = sampled_planets(config, &candidate_rulers);
    let samples = collect_samples(lookup, &range, &planets, config.max_range_years)?;
    let transits = normalize_transits(&samples, &planets, sign_houses, &config.aspects)?;
    let merged = merge_dasha_transits(&slices, &transits, &candidate_rulers, config)?;
    let ranked = score_and_rank_slices(&merged, significators, config)?;

    log::info!(
        "ranked {} slices for birth on {} ({} candidates)",
        ranked.len(),
        tree.birth_date,
        candidate_rulers.len()
    );
    Ok(Prediction {
        balance: tree.balance,
        candidate_rulers,
        ranked,
    })
}
