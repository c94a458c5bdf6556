//! Fixed tables and tunable constants, loadable from TOML.
//!
//! Every table has a default matching the classical Vimshottari / marriage-house
//! conventions, so an empty TOML document yields [`PredictionConfig::default`].
//! Maps are stored as lists of small records so they round-trip through TOML,
//! whose keys must be strings.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VivahaError};
use crate::interval::DAYS_PER_YEAR;
use crate::planet::{House, Planet};

/// One ruler and its length in years within the 120-year cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulerWeight {
    pub ruler: Planet,
    pub years: u32,
}

/// The cyclic ruler order used at every level of the dasha tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulerSequence {
    pub rulers: Vec<RulerWeight>,
}

impl RulerSequence {
    pub const TOTAL_YEARS: u32 = 120;
    pub const LEN: usize = 9;

    /// Ketu 7, Venus 20, Sun 6, Moon 10, Mars 7, Rahu 18, Jupiter 16, Saturn 19, Mercury 17.
    pub fn vimshottari() -> Self {
        let table = [
            (Planet::Ketu, 7),
            (Planet::Venus, 20),
            (Planet::Sun, 6),
            (Planet::Moon, 10),
            (Planet::Mars, 7),
            (Planet::Rahu, 18),
            (Planet::Jupiter, 16),
            (Planet::Saturn, 19),
            (Planet::Mercury, 17),
        ];
        Self {
            rulers: table
                .iter()
                .map(|&(ruler, years)| RulerWeight { ruler, years })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.rulers.len() != Self::LEN {
            return Err(VivahaError::Configuration(format!(
                "ruler sequence must have {} entries, found {}",
                Self::LEN,
                self.rulers.len()
            )));
        }
        let unique: BTreeSet<Planet> = self.rulers.iter().map(|r| r.ruler).collect();
        if unique.len() != self.rulers.len() {
            return Err(VivahaError::Configuration(
                "ruler sequence contains a duplicate ruler".to_string(),
            ));
        }
        let total: u32 = self.rulers.iter().map(|r| r.years).sum();
        if total != Self::TOTAL_YEARS {
            return Err(VivahaError::Configuration(format!(
                "ruler weights sum to {total}, expected {}",
                Self::TOTAL_YEARS
            )));
        }
        if self.rulers.iter().any(|r| r.years == 0) {
            return Err(VivahaError::Configuration(
                "ruler weights must be positive".to_string(),
            ));
        }
        // Whole-day boundaries need every pratyantar to last at least a day.
        let shortest = self.shortest_pratyantar_days();
        if shortest < 1.0 {
            return Err(VivahaError::Configuration(format!(
                "shortest pratyantar lasts {shortest:.3} days, at least 1 is required"
            )));
        }
        Ok(())
    }

    /// Length in days of the pratyantar of the lightest ruler within its own antar and maha.
    pub fn shortest_pratyantar_days(&self) -> f64 {
        let min = self.rulers.iter().map(|r| r.years).min().unwrap_or(0) as f64;
        let total = Self::TOTAL_YEARS as f64;
        min * (min / total) * (min / total) * DAYS_PER_YEAR
    }

    pub fn len(&self) -> usize {
        self.rulers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rulers.is_empty()
    }

    pub fn ruler(&self, idx: usize) -> Planet {
        self.rulers[idx % self.rulers.len()].ruler
    }

    pub fn years(&self, idx: usize) -> u32 {
        self.rulers[idx % self.rulers.len()].years
    }

    pub fn position(&self, ruler: Planet) -> Option<usize> {
        self.rulers.iter().position(|r| r.ruler == ruler)
    }

    pub fn contains(&self, ruler: Planet) -> bool {
        self.position(ruler).is_some()
    }
}

impl Default for RulerSequence {
    fn default() -> Self {
        Self::vimshottari()
    }
}

/// Houses a planet aspects, as forward offsets from the house it transits.
///
/// An offset of 6 is the 7th house from the planet (full opposition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRule {
    pub planet: Planet,
    pub offsets: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectTable {
    pub rules: Vec<AspectRule>,
}

impl AspectTable {
    /// Jupiter 5/7/9, Saturn 3/7/10, Mars 4/7/8 (as offsets 4/6/8, 2/6/9, 3/5/7);
    /// luminaries, Mercury and Venus the 7th only; the nodes none.
    pub fn classical() -> Self {
        let table: [(Planet, &[u8]); 9] = [
            (Planet::Jupiter, &[4, 6, 8]),
            (Planet::Saturn, &[2, 6, 9]),
            (Planet::Mars, &[3, 5, 7]),
            (Planet::Sun, &[6]),
            (Planet::Moon, &[6]),
            (Planet::Mercury, &[6]),
            (Planet::Venus, &[6]),
            (Planet::Rahu, &[]),
            (Planet::Ketu, &[]),
        ];
        Self {
            rules: table
                .iter()
                .map(|(planet, offsets)| AspectRule {
                    planet: *planet,
                    offsets: offsets.to_vec(),
                })
                .collect(),
        }
    }

    pub fn offsets_for(&self, planet: Planet) -> Option<&[u8]> {
        self.rules
            .iter()
            .find(|r| r.planet == planet)
            .map(|r| r.offsets.as_slice())
    }

    /// Every planet in `required` needs an entry (an empty one is fine).
    pub fn validate(&self, required: &BTreeSet<Planet>) -> Result<()> {
        for planet in required {
            if self.offsets_for(*planet).is_none() {
                return Err(VivahaError::Configuration(format!(
                    "missing aspect offsets for {planet}"
                )));
            }
        }
        for rule in &self.rules {
            if let Some(bad) = rule.offsets.iter().find(|o| **o == 0 || **o > 11) {
                return Err(VivahaError::Configuration(format!(
                    "aspect offset {bad} for {} is outside 1..=11",
                    rule.planet
                )));
            }
        }
        Ok(())
    }
}

impl Default for AspectTable {
    fn default() -> Self {
        Self::classical()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HouseWeight {
    pub house: House,
    pub weight: f64,
}

/// The house groups the scorer reasons about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseSets {
    /// Houses that promise the event (2nd, 7th, 11th for marriage).
    pub target: BTreeSet<House>,
    /// Houses that help without promising.
    pub support: BTreeSet<House>,
    /// Houses that deny or obstruct.
    pub obstruction: BTreeSet<House>,
}

impl Default for HouseSets {
    fn default() -> Self {
        Self {
            target: [2, 7, 11].into_iter().collect(),
            support: [5, 8, 12].into_iter().collect(),
            obstruction: [1, 6, 10].into_iter().collect(),
        }
    }
}

impl HouseSets {
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(VivahaError::Configuration(
                "target house set is empty".to_string(),
            ));
        }
        for (name, set) in [
            ("target", &self.target),
            ("support", &self.support),
            ("obstruction", &self.obstruction),
        ] {
            if let Some(h) = set.iter().find(|h| !(1..=12).contains(*h)) {
                return Err(VivahaError::Configuration(format!(
                    "{name} house {h} is outside 1..=12"
                )));
            }
        }
        if let Some(h) = self.target.intersection(&self.obstruction).next() {
            return Err(VivahaError::Configuration(format!(
                "house {h} is both a target and an obstruction house"
            )));
        }
        Ok(())
    }
}

/// House roles used when picking candidate rulers from the significations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRules {
    /// Houses that count as a direct promise.
    pub primary: BTreeSet<House>,
    pub support: BTreeSet<House>,
    pub obstruction: BTreeSet<House>,
    /// The house that alone can outweigh an obstruction.
    pub anchor_house: House,
    /// Houses that, signified together with the anchor, confirm a ruler.
    pub companion_houses: [House; 2],
    /// Planets judged on their combined significations with a looser rule.
    pub lenient_planets: Vec<Planet>,
}

impl Default for CandidateRules {
    fn default() -> Self {
        Self {
            primary: [2, 7].into_iter().collect(),
            support: [5, 8, 11, 12].into_iter().collect(),
            obstruction: [1, 6, 10].into_iter().collect(),
            anchor_house: 7,
            companion_houses: [2, 11],
            lenient_planets: vec![Planet::Venus, Planet::Rahu],
        }
    }
}

impl CandidateRules {
    pub fn validate(&self) -> Result<()> {
        let houses = self
            .primary
            .iter()
            .chain(&self.support)
            .chain(&self.obstruction)
            .chain(std::iter::once(&self.anchor_house))
            .chain(&self.companion_houses);
        for h in houses {
            if !(1..=12).contains(h) {
                return Err(VivahaError::Configuration(format!(
                    "candidate rule house {h} is outside 1..=12"
                )));
            }
        }
        if !self.primary.contains(&self.anchor_house) {
            return Err(VivahaError::Configuration(format!(
                "anchor house {} is not a primary house",
                self.anchor_house
            )));
        }
        Ok(())
    }
}

/// Which planets take part in transit analysis and how windows are qualified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitSettings {
    /// Slow planets always used as simultaneity markers, in caller order.
    pub marker_planets: Vec<Planet>,
    /// Planets whose positions are always sampled, besides the candidate rulers.
    pub tracked_planets: Vec<Planet>,
    /// Minimum number of concurrently active planets in a window.
    pub min_planets: usize,
    /// Minimum window length in days (inclusive count).
    pub min_duration_days: i64,
    /// The two planets whose shared influence over a target house is a "double transit".
    pub double_transit_pair: [Planet; 2],
}

impl Default for TransitSettings {
    fn default() -> Self {
        Self {
            marker_planets: vec![Planet::Jupiter, Planet::Saturn, Planet::Rahu, Planet::Ketu],
            tracked_planets: vec![
                Planet::Jupiter,
                Planet::Saturn,
                Planet::Rahu,
                Planet::Ketu,
                Planet::Sun,
                Planet::Venus,
            ],
            min_planets: 2,
            min_duration_days: 10,
            double_transit_pair: [Planet::Jupiter, Planet::Saturn],
        }
    }
}

impl TransitSettings {
    pub fn validate(&self) -> Result<()> {
        if self.min_planets == 0 {
            return Err(VivahaError::Configuration(
                "min_planets must be at least 1".to_string(),
            ));
        }
        if self.min_duration_days < 1 {
            return Err(VivahaError::Configuration(
                "min_duration_days must be at least 1".to_string(),
            ));
        }
        if self.double_transit_pair[0] == self.double_transit_pair[1] {
            return Err(VivahaError::Configuration(
                "double transit pair must name two different planets".to_string(),
            ));
        }
        if let Some(p) = self
            .marker_planets
            .iter()
            .chain(&self.tracked_planets)
            .find(|p| p.is_outer())
        {
            return Err(VivahaError::Configuration(format!(
                "{p} is always excluded from transit analysis"
            )));
        }
        Ok(())
    }
}

/// Age window (in years at slice start) for candidate dasha slices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceFilter {
    pub min_age_years: f64,
    pub max_age_years: f64,
}

impl Default for SliceFilter {
    fn default() -> Self {
        Self {
            min_age_years: 18.0,
            max_age_years: 35.0,
        }
    }
}

impl SliceFilter {
    pub fn accepts(&self, age_years: f64) -> bool {
        age_years >= self.min_age_years && age_years <= self.max_age_years
    }
}

/// Every constant used by the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Per-house importance for double transits and window coverage.
    pub house_weights: Vec<HouseWeight>,
    /// Weight of a target house missing from `house_weights`.
    pub default_house_weight: f64,

    pub double_transit_base: f64,
    /// Double transits reach full strength at this many days.
    pub double_transit_full_days: f64,
    /// Bonus when two or more houses receive a double transit.
    pub multi_house_bonus: f64,
    /// Bonus when one house does and the significators cover another target house.
    pub single_house_bonus: f64,

    /// Base of the duration factor `0.5 + 0.5 * (1 - decay^days)`.
    pub duration_decay: f64,
    pub coverage_weight: f64,
    pub direct_planet_weight: f64,
    pub aspect_planet_weight: f64,
    pub benefics: [Planet; 2],
    pub benefic_pair_bonus: f64,
    pub single_benefic_bonus: f64,
    /// Bonus for four or more concurrently active planets.
    pub wide_activity_bonus: f64,
    /// Bonus for exactly three concurrently active planets.
    pub triple_activity_bonus: f64,
    pub benefic_aspect_bonus: f64,

    /// Per-house weights of significator coverage in the house score.
    pub significator_weights: Vec<HouseWeight>,
    pub default_significator_weight: f64,
    pub support_weight: f64,
    pub obstruction_penalty: f64,

    pub house_score_share: f64,
    pub dasha_points_share: f64,
    /// How many slices survive the first (dasha points) cut.
    pub top_n: usize,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            house_weights: vec![
                HouseWeight { house: 7, weight: 1.0 },
                HouseWeight { house: 2, weight: 0.8 },
                HouseWeight { house: 11, weight: 0.6 },
            ],
            default_house_weight: 0.5,
            double_transit_base: 3.0,
            double_transit_full_days: 30.0,
            multi_house_bonus: 4.0,
            single_house_bonus: 2.0,
            duration_decay: 0.9,
            coverage_weight: 0.5,
            direct_planet_weight: 0.75,
            aspect_planet_weight: 0.5,
            benefics: [Planet::Jupiter, Planet::Venus],
            benefic_pair_bonus: 2.0,
            single_benefic_bonus: 1.0,
            wide_activity_bonus: 1.5,
            triple_activity_bonus: 1.0,
            benefic_aspect_bonus: 0.75,
            significator_weights: vec![
                HouseWeight { house: 7, weight: 3.0 },
                HouseWeight { house: 2, weight: 2.0 },
                HouseWeight { house: 11, weight: 2.0 },
            ],
            default_significator_weight: 2.0,
            support_weight: 1.0,
            obstruction_penalty: 1.5,
            house_score_share: 0.7,
            dasha_points_share: 0.3,
            top_n: 15,
        }
    }
}

impl ScoringWeights {
    pub fn house_weight(&self, house: House) -> f64 {
        lookup_weight(&self.house_weights, house, self.default_house_weight)
    }

    pub fn significator_weight(&self, house: House) -> f64 {
        lookup_weight(
            &self.significator_weights,
            house,
            self.default_significator_weight,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(VivahaError::Configuration(
                "top_n must be at least 1".to_string(),
            ));
        }
        if !(self.duration_decay > 0.0 && self.duration_decay < 1.0) {
            return Err(VivahaError::Configuration(format!(
                "duration_decay {} must lie in (0, 1)",
                self.duration_decay
            )));
        }
        if self.double_transit_full_days <= 0.0 {
            return Err(VivahaError::Configuration(
                "double_transit_full_days must be positive".to_string(),
            ));
        }
        let scalars = [
            self.default_house_weight,
            self.double_transit_base,
            self.multi_house_bonus,
            self.single_house_bonus,
            self.coverage_weight,
            self.direct_planet_weight,
            self.aspect_planet_weight,
            self.benefic_pair_bonus,
            self.single_benefic_bonus,
            self.wide_activity_bonus,
            self.triple_activity_bonus,
            self.benefic_aspect_bonus,
            self.default_significator_weight,
            self.support_weight,
            self.obstruction_penalty,
            self.house_score_share,
            self.dasha_points_share,
        ];
        let tables = self
            .house_weights
            .iter()
            .chain(&self.significator_weights)
            .map(|w| w.weight);
        if scalars.iter().copied().chain(tables).any(|w| !w.is_finite()) {
            return Err(VivahaError::Configuration(
                "scoring weights must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

fn lookup_weight(table: &[HouseWeight], house: House, default: f64) -> f64 {
    table
        .iter()
        .find(|w| w.house == house)
        .map(|w| w.weight)
        .unwrap_or(default)
}

/// Complete configuration for one prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub rulers: RulerSequence,
    pub aspects: AspectTable,
    pub houses: HouseSets,
    pub transits: TransitSettings,
    pub slices: SliceFilter,
    pub scoring: ScoringWeights,
    pub candidates: CandidateRules,
    /// Upper bound on any analysis range.
    pub max_range_years: u32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            rulers: RulerSequence::default(),
            aspects: AspectTable::default(),
            houses: HouseSets::default(),
            transits: TransitSettings::default(),
            slices: SliceFilter::default(),
            scoring: ScoringWeights::default(),
            candidates: CandidateRules::default(),
            max_range_years: 100,
        }
    }
}

impl PredictionConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PredictionConfig = toml::from_str(content).map_err(|e| {
            VivahaError::Configuration(format!("Failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            VivahaError::Configuration(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Check every table. Called before each pipeline run.
    pub fn validate(&self) -> Result<()> {
        self.rulers.validate()?;
        self.houses.validate()?;
        self.transits.validate()?;
        self.scoring.validate()?;
        self.candidates.validate()?;

        let required: BTreeSet<Planet> = self
            .rulers
            .rulers
            .iter()
            .map(|r| r.ruler)
            .chain(self.transits.marker_planets.iter().copied())
            .chain(self.transits.tracked_planets.iter().copied())
            .collect();
        self.aspects.validate(&required)?;

        if self.slices.min_age_years > self.slices.max_age_years {
            return Err(VivahaError::Configuration(format!(
                "age window {}..{} is empty",
                self.slices.min_age_years, self.slices.max_age_years
            )));
        }
        if self.max_range_years == 0 {
            return Err(VivahaError::Configuration(
                "max_range_years must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
