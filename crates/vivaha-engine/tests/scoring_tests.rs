//! Tests for slice scoring and ranking.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::{houses, sample_significators, span, target, transit};
use vivaha_engine::chart::Significators;
use vivaha_engine::config::{HouseSets, PredictionConfig, ScoringWeights, TransitSettings};
use vivaha_engine::dasha::DashaSlice;
use vivaha_engine::interval::DateSpan;
use vivaha_engine::merger::{merge_slice_transits, DoubleTransit, SliceTransits};
use vivaha_engine::scoring::{
    double_transit_points, duration_factor, house_analysis, rank_slices, score_and_rank_slices,
    score_slice, structural_bonus, window_points, HouseAnalysis, ScoredSlice,
};
use vivaha_engine::simultaneity::find_simultaneity_windows;
use vivaha_engine::{Planet, Sign, VivahaError};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn weights() -> ScoringWeights {
    ScoringWeights::default()
}

fn double_transit(start: &str, end: &str, affected: &[u8]) -> DoubleTransit {
    let s = span(start, end);
    DoubleTransit {
        span: s,
        duration_days: s.duration_days(),
        affected_houses: houses(affected),
        first_houses: houses(affected),
        second_houses: houses(affected),
    }
}

/// Sun / Venus / Venus across January with Jupiter and Saturn both on the 7th.
fn january_slice() -> SliceTransits {
    let slice = DashaSlice {
        maha: Planet::Sun,
        antar: Planet::Venus,
        pratyantar: Planet::Venus,
        span: span("2024-01-01", "2024-01-31"),
        age_at_start: 30.0,
    };
    let transits = vec![
        transit(Planet::Jupiter, Sign::Aries, "2024-01-01", "2024-02-29", 1, &[5, 7, 9]),
        transit(Planet::Saturn, Sign::Libra, "2024-01-01", "2024-02-29", 7, &[9, 1, 4]),
    ];
    let settings = TransitSettings::default();
    merge_slice_transits(
        &slice,
        &transits,
        &settings.marker_planets,
        &HouseSets::default(),
        &settings,
    )
    .unwrap()
}

fn scored(start: &str, dasha_points: f64, combined_score: f64) -> ScoredSlice {
    ScoredSlice {
        maha: Planet::Sun,
        antar: Planet::Venus,
        pratyantar: Planet::Venus,
        span: span(start, start),
        age_at_start: 25.0,
        windows: Vec::new(),
        double_transits: Vec::new(),
        combined_significator_houses: BTreeSet::new(),
        double_transit_count: 0,
        is_perfect_trigger: false,
        dasha_points,
        house_analysis: HouseAnalysis {
            target: BTreeSet::new(),
            support: BTreeSet::new(),
            obstruction: BTreeSet::new(),
            house_score: 0.0,
        },
        house_score: 0.0,
        combined_score,
        rank: 0,
    }
}

// ── Components ──────────────────────────────────────────────────────────────

#[test]
fn duration_factor_grows_from_half_toward_one() {
    assert_eq!(duration_factor(0, 0.9), 0.5);
    let mut previous = 0.5;
    for days in 1..60 {
        let f = duration_factor(days, 0.9);
        assert!(f > previous && f < 1.0);
        previous = f;
    }
}

#[test]
fn double_transit_strength_caps_at_full_days() {
    let w = weights();

    let (half, _) = double_transit_points(&[double_transit("2024-01-01", "2024-01-15", &[7])], &w);
    let (full, _) = double_transit_points(&[double_transit("2024-01-01", "2024-01-30", &[7])], &w);
    let (long, hs) = double_transit_points(&[double_transit("2024-01-01", "2024-03-30", &[7])], &w);

    assert!((half - 1.5).abs() < 1e-9);
    assert!((full - 3.0).abs() < 1e-9);
    assert!((long - 3.0).abs() < 1e-9);
    assert_eq!(hs, houses(&[7]));
}

#[test]
fn double_transit_uses_house_weights() {
    let w = weights();
    let (points, hs) =
        double_transit_points(&[double_transit("2024-01-01", "2024-01-30", &[2, 11])], &w);

    assert!((points - 3.0 * (0.8 + 0.6)).abs() < 1e-9);
    assert_eq!(hs, houses(&[2, 11]));
}

#[test]
fn structural_bonus_cases() {
    let w = weights();
    let t = target();

    assert_eq!(structural_bonus(&houses(&[]), &houses(&[2, 7, 11]), &t, &w), 0.0);
    assert_eq!(structural_bonus(&houses(&[7, 2]), &houses(&[]), &t, &w), 4.0);
    assert_eq!(structural_bonus(&houses(&[7]), &houses(&[7, 11]), &t, &w), 2.0);
    // The only other significator house is the one already covered.
    assert_eq!(structural_bonus(&houses(&[7]), &houses(&[7, 5]), &t, &w), 0.0);
}

#[test]
fn window_points_add_each_component() {
    let intervals = vec![
        transit(Planet::Jupiter, Sign::Aries, "2024-01-01", "2024-01-10", 1, &[5, 7, 9]),
        transit(Planet::Venus, Sign::Libra, "2024-01-01", "2024-01-10", 7, &[1]),
    ];
    let windows = find_simultaneity_windows(&intervals, &target(), 2, 1).unwrap();
    assert_eq!(windows.len(), 1);

    let points = window_points(&windows[0], &target(), &weights());

    // coverage 0.5, direct Venus 0.75, aspecting Jupiter 0.5, one benefic in
    // a target house 1.0, Jupiter aspecting only 0.75.
    let expected = 3.5 * duration_factor(10, 0.9);
    assert!((points - expected).abs() < 1e-9);
}

#[test]
fn wider_activity_scores_more() {
    let two = vec![
        transit(Planet::Saturn, Sign::Libra, "2024-01-01", "2024-01-10", 7, &[]),
        transit(Planet::Rahu, Sign::Taurus, "2024-01-01", "2024-01-10", 2, &[]),
    ];
    let mut four = two.clone();
    four.push(transit(Planet::Ketu, Sign::Scorpio, "2024-01-01", "2024-01-10", 8, &[]));
    four.push(transit(Planet::Mars, Sign::Cancer, "2024-01-01", "2024-01-10", 4, &[]));

    let w2 = &find_simultaneity_windows(&two, &target(), 2, 1).unwrap()[0];
    let w4 = &find_simultaneity_windows(&four, &target(), 2, 1).unwrap()[0];
    let factor = duration_factor(10, 0.9);

    let delta = window_points(w4, &target(), &weights()) - window_points(w2, &target(), &weights());
    assert!((delta - 1.5 * factor).abs() < 1e-9);
}

#[test]
fn house_analysis_weighs_each_group() {
    let analysis = house_analysis(&houses(&[2, 7, 5, 6]), &HouseSets::default(), &weights());

    assert_eq!(analysis.target, houses(&[2, 7]));
    assert_eq!(analysis.support, houses(&[5]));
    assert_eq!(analysis.obstruction, houses(&[6]));
    assert!((analysis.house_score - 4.5).abs() < 1e-9);
}

// ── Slice score ─────────────────────────────────────────────────────────────

#[test]
fn slice_score_combines_points_and_houses() {
    let config = PredictionConfig::default();

    let s = score_slice(&january_slice(), &sample_significators(), &config);

    assert_eq!(s.double_transit_count, 1);
    assert!(s.is_perfect_trigger);
    assert_eq!(s.dasha_points, 7.45);
    assert_eq!(s.house_score, 3.5);
    assert_eq!(s.combined_score, round2(0.7 * 3.5 + 0.3 * 7.45));
    assert_eq!(s.house_analysis.target, houses(&[7, 11]));
    assert_eq!(s.rank, 0);
}

#[test]
fn extra_double_transit_house_raises_points() {
    let config = PredictionConfig::default();
    let significators = sample_significators();
    let base = january_slice();
    let mut richer = base.clone();
    richer
        .double_transits
        .push(double_transit("2024-01-01", "2024-01-31", &[2]));
    let mut poorer = base.clone();
    poorer.double_transits.clear();

    let b = score_slice(&base, &significators, &config);
    let r = score_slice(&richer, &significators, &config);
    let p = score_slice(&poorer, &significators, &config);

    assert!(r.dasha_points > b.dasha_points);
    assert!(b.dasha_points > p.dasha_points);
    assert!(r.combined_score >= b.combined_score);
    assert_eq!(r.double_transit_count, 2);
    assert!(!p.is_perfect_trigger);
}

#[test]
fn unknown_rulers_contribute_no_houses() {
    let config = PredictionConfig::default();
    let empty: BTreeMap<Planet, Significators> = BTreeMap::new();

    let s = score_slice(&january_slice(), &empty, &config);

    assert!(s.combined_significator_houses.is_empty());
    assert_eq!(s.house_score, 0.0);
    // Without significator cover the single double-transit house earns no bonus.
    assert_eq!(s.dasha_points, round2(3.0 + 2.5 * duration_factor(31, 0.9)));
    assert!(!s.is_perfect_trigger);
}

#[test]
fn custom_shares_change_blend() {
    let mut config = PredictionConfig::default();
    config.scoring.house_score_share = 0.8;
    config.scoring.dasha_points_share = 0.2;

    let s = score_slice(&january_slice(), &sample_significators(), &config);

    assert_eq!(s.combined_score, round2(0.8 * 3.5 + 0.2 * 7.45));
}

// ── Ranking ─────────────────────────────────────────────────────────────────

#[test]
fn ties_keep_input_order() {
    let input = vec![
        scored("2020-01-01", 5.0, 7.5),
        scored("2020-02-01", 5.0, 9.0),
        scored("2020-03-01", 5.0, 7.5),
    ];

    let ranked = rank_slices(input, 15);

    let order: Vec<(f64, usize)> = ranked.iter().map(|s| (s.combined_score, s.rank)).collect();
    assert_eq!(order, vec![(9.0, 1), (7.5, 2), (7.5, 3)]);
    assert_eq!(ranked[1].span.start, common::d("2020-01-01"));
    assert_eq!(ranked[2].span.start, common::d("2020-03-01"));
}

#[test]
fn first_cut_is_by_dasha_points() {
    let input = vec![
        scored("2020-01-01", 1.0, 10.0),
        scored("2020-02-01", 5.0, 2.0),
        scored("2020-03-01", 3.0, 4.0),
    ];

    let ranked = rank_slices(input, 2);

    let starts: Vec<_> = ranked.iter().map(|s| s.span.start).collect();
    assert_eq!(starts, vec![common::d("2020-03-01"), common::d("2020-02-01")]);
}

#[test]
fn fewer_slices_than_top_n() {
    let ranked = rank_slices(vec![scored("2020-01-01", 1.0, 1.0)], 15);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].rank, 1);
}

#[test]
fn empty_input_ranks_nothing() {
    let ranked = score_and_rank_slices(&[], &sample_significators(), &PredictionConfig::default())
        .unwrap();
    assert!(ranked.is_empty());
}

#[test]
fn inverted_window_rejected() {
    let mut slice = january_slice();
    slice.windows[0].span = DateSpan {
        start: common::d("2024-01-31"),
        end: common::d("2024-01-01"),
    };

    let err = score_and_rank_slices(&[slice], &sample_significators(), &PredictionConfig::default())
        .unwrap_err();

    assert!(matches!(err, VivahaError::Validation(_)));
}

#[test]
fn ranking_is_deterministic() {
    let config = PredictionConfig::default();
    let slices = vec![january_slice(), january_slice()];

    let a = score_and_rank_slices(&slices, &sample_significators(), &config).unwrap();
    let b = score_and_rank_slices(&slices, &sample_significators(), &config).unwrap();

    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}
