//! Shared fixtures: a deterministic mean-motion chart and small builders.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{FixedOffset, NaiveDate, TimeZone};
use vivaha_engine::chart::{ChartLookup, PlanetPosition, Significators};
use vivaha_engine::dasha::BirthData;
use vivaha_engine::error::Result;
use vivaha_engine::interval::{parse_date, DateSpan};
use vivaha_engine::simultaneity::SimultaneityWindow;
use vivaha_engine::transit::DerivedTransit;
use vivaha_engine::{House, Planet, Sign};

// ── Helpers ─────────────────────────────────────────────────────────────────

pub fn d(s: &str) -> NaiveDate {
    parse_date(s).unwrap()
}

pub fn span(start: &str, end: &str) -> DateSpan {
    DateSpan::new(d(start), d(end)).unwrap()
}

pub fn houses(list: &[House]) -> BTreeSet<House> {
    list.iter().copied().collect()
}

pub fn transit(
    planet: Planet,
    sign: Sign,
    start: &str,
    end: &str,
    house: House,
    aspects: &[House],
) -> DerivedTransit {
    DerivedTransit {
        planet,
        sign,
        span: span(start, end),
        retrograde: false,
        transiting_house: house,
        aspecting_houses: houses(aspects),
    }
}

pub fn target() -> BTreeSet<House> {
    houses(&[2, 7, 11])
}

pub fn planets_of(window: &SimultaneityWindow) -> Vec<Planet> {
    window.active_planets.iter().copied().collect()
}

/// Noon IST on 1990-05-15 in New Delhi.
pub fn sample_birth(moon_longitude: f64) -> BirthData {
    let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
    let moment = ist.with_ymd_and_hms(1990, 5, 15, 12, 0, 0).unwrap();
    BirthData::new(moment, 28.61, 77.21, moon_longitude).unwrap()
}

fn sig(ruled: &[House], occupied: House, star: &[House], sub: &[House]) -> Significators {
    Significators {
        ruled_houses: ruled.to_vec(),
        occupied_house: Some(occupied),
        star_lord_houses: star.to_vec(),
        sub_lord_houses: sub.to_vec(),
    }
}

/// Significations that select Mercury, Jupiter, Rahu and Venus.
pub fn sample_significators() -> BTreeMap<Planet, Significators> {
    BTreeMap::from([
        (Planet::Sun, sig(&[11], 10, &[4, 9], &[6, 10])),
        (Planet::Moon, sig(&[10], 3, &[1, 6], &[3, 12])),
        (Planet::Mars, sig(&[2, 7], 8, &[5, 8], &[1, 6])),
        (Planet::Mercury, sig(&[9, 12], 9, &[2, 7], &[7, 11])),
        (Planet::Jupiter, sig(&[3, 6], 4, &[2, 11], &[2, 7])),
        (Planet::Venus, sig(&[1, 8], 7, &[5, 12], &[4, 9])),
        (Planet::Saturn, sig(&[4, 5], 12, &[3, 10], &[6, 10])),
        (Planet::Rahu, sig(&[11], 5, &[7, 2], &[2, 5])),
        (Planet::Ketu, sig(&[5], 11, &[6], &[1, 10])),
    ])
}

// ── Mean-motion chart ───────────────────────────────────────────────────────

/// Sidereal longitudes from linear mean motion since 2000-01-01.
///
/// Mercury and Venus are pinned at fixed elongations from the Sun so they
/// change sign on the same day. The nodes are always retrograde. The range of
/// dates queried is recorded.
pub struct MeanMotionChart {
    pub first_query: Cell<Option<NaiveDate>>,
    pub last_query: Cell<Option<NaiveDate>>,
}

const AYANAMSA: f64 = 23.85;

impl MeanMotionChart {
    pub fn new() -> Self {
        Self {
            first_query: Cell::new(None),
            last_query: Cell::new(None),
        }
    }

    pub fn longitude(planet: Planet, date: NaiveDate) -> f64 {
        let epoch = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let days = (date - epoch).num_days() as f64;
        let sun = 280.46 + 0.985_647 * days;
        let tropical = match planet {
            Planet::Sun => sun,
            Planet::Moon => 218.32 + 13.176_396 * days,
            Planet::Mars => 355.45 + 0.524_033 * days,
            Planet::Mercury => sun + 10.0,
            Planet::Jupiter => 34.40 + 0.083_091 * days,
            Planet::Venus => sun - 20.0,
            Planet::Saturn => 50.08 + 0.033_460 * days,
            Planet::Rahu => 125.04 - 0.052_954 * days,
            Planet::Ketu => 305.04 - 0.052_954 * days,
            Planet::Uranus => 314.06 + 0.011_733 * days,
            Planet::Neptune => 304.35 + 0.005_981 * days,
            Planet::Pluto => 238.96 + 0.003_979 * days,
        };
        (tropical - AYANAMSA).rem_euclid(360.0)
    }

    fn record(&self, date: NaiveDate) {
        let first = self.first_query.get().map_or(date, |f| f.min(date));
        let last = self.last_query.get().map_or(date, |l| l.max(date));
        self.first_query.set(Some(first));
        self.last_query.set(Some(last));
    }
}

impl ChartLookup for MeanMotionChart {
    fn positions_on(&self, date: NaiveDate) -> Result<BTreeMap<Planet, PlanetPosition>> {
        self.record(date);
        Ok(Planet::ALL
            .iter()
            .map(|p| {
                let position = PlanetPosition {
                    sign: Sign::from_longitude(Self::longitude(*p, date)),
                    retrograde: p.is_node(),
                };
                (*p, position)
            })
            .collect())
    }
}
