//! Vimshottari dasha tree: Maha → Antar → Pratyantar.
//!
//! The tree is materialized in full (9 × 9 × 9 leaves) into three flat levels.
//! Period `(m, a, p)` lives at `maha[m]`, `antar[m * 9 + a]` and
//! `pratyantar[(m * 9 + a) * 9 + p]`.
//!
//! Boundaries are computed as fractional day offsets and rounded once per
//! boundary, never per duration. Each child is then within one day of its exact
//! proportional length, siblings share their boundary dates, and the last child
//! always ends on its parent's end date.
//!
//! The cycle start is `birth − elapsed`, where the elapsed part of the first
//! ruler's period is converted to days with a 365.25-day year and truncated.
//! That year length drifts against the civil calendar.
//! Dates are therefore approximate at the scale of hours, which whole-day
//! granularity absorbs.

use std::ops::Range;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::config::RulerSequence;
use crate::error::{Result, VivahaError};
use crate::interval::{add_days, years_between, DateSpan, DAYS_PER_YEAR};
use crate::planet::Planet;

/// Arc of one nakshatra in degrees (360 / 27).
pub const NAKSHATRA_ARC: f64 = 360.0 / 27.0;

pub const NAKSHATRAS: [&str; 27] = [
    "Ashwini",
    "Bharani",
    "Krittika",
    "Rohini",
    "Mrigashira",
    "Ardra",
    "Punarvasu",
    "Pushya",
    "Ashlesha",
    "Magha",
    "Purva Phalguni",
    "Uttara Phalguni",
    "Hasta",
    "Chitra",
    "Swati",
    "Vishakha",
    "Anuradha",
    "Jyeshtha",
    "Mula",
    "Purva Ashadha",
    "Uttara Ashadha",
    "Shravana",
    "Dhanishta",
    "Shatabhisha",
    "Purva Bhadrapada",
    "Uttara Bhadrapada",
    "Revati",
];

/// Depth of a period in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DashaLevel {
    Maha,
    Antar,
    Pratyantar,
}

impl DashaLevel {
    pub fn child(self) -> Option<DashaLevel> {
        match self {
            DashaLevel::Maha => Some(DashaLevel::Antar),
            DashaLevel::Antar => Some(DashaLevel::Pratyantar),
            DashaLevel::Pratyantar => None,
        }
    }
}

/// Birth moment plus the Moon's sidereal longitude at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BirthData {
    pub moment: DateTime<FixedOffset>,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees; any real value, normalized into `[0, 360)`.
    pub moon_sidereal_longitude: f64,
}

impl BirthData {
    pub fn new(
        moment: DateTime<FixedOffset>,
        latitude: f64,
        longitude: f64,
        moon_sidereal_longitude: f64,
    ) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(VivahaError::Validation(format!(
                "latitude {latitude} is outside -90..=90"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(VivahaError::Validation(format!(
                "longitude {longitude} is outside -180..=180"
            )));
        }
        if !moon_sidereal_longitude.is_finite() {
            return Err(VivahaError::Validation(
                "moon longitude must be finite".to_string(),
            ));
        }
        Ok(Self {
            moment,
            latitude,
            longitude,
            moon_sidereal_longitude,
        })
    }

    /// Resolve a local wall-clock time in an IANA timezone (e.g. "Asia/Kolkata").
    ///
    /// Ambiguous local times take the earlier instant; times skipped by a DST
    /// gap are rejected.
    pub fn from_local(
        local: NaiveDateTime,
        timezone: &str,
        latitude: f64,
        longitude: f64,
        moon_sidereal_longitude: f64,
    ) -> Result<Self> {
        let tz: chrono_tz::Tz = timezone
            .parse()
            .map_err(|_| VivahaError::InvalidTimezone(timezone.to_string()))?;
        let moment = tz
            .from_local_datetime(&local)
            .earliest()
            .ok_or_else(|| {
                VivahaError::Validation(format!("{local} does not exist in {timezone}"))
            })?
            .fixed_offset();
        Self::new(moment, latitude, longitude, moon_sidereal_longitude)
    }

    /// The civil date of birth at the birth location.
    pub fn date(&self) -> NaiveDate {
        self.moment.date_naive()
    }
}

/// Where the cycle stood at birth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DashaBalance {
    /// Ruler of the Moon's nakshatra; the first mahadasha lord.
    pub ruler: Planet,
    /// 0 = Ashwini .. 26 = Revati.
    pub nakshatra_index: u8,
    /// Fraction of the nakshatra the Moon had already traversed, in `[0, 1)`.
    pub elapsed_fraction: f64,
    /// Years of the first mahadasha still to run after birth.
    pub remaining_years: f64,
    /// Years of the first mahadasha that ran before birth.
    pub elapsed_years: f64,
}

impl DashaBalance {
    pub fn nakshatra_name(&self) -> &'static str {
        NAKSHATRAS[self.nakshatra_index as usize]
    }
}

/// Nakshatra index, elapsed fraction, and ruler-sequence index for a Moon longitude.
pub fn nakshatra_position(moon_sidereal_longitude: f64) -> (u8, f64, usize) {
    let lon = moon_sidereal_longitude.rem_euclid(360.0);
    let idx = ((lon / NAKSHATRA_ARC).floor() as u8).min(26);
    let elapsed = ((lon - idx as f64 * NAKSHATRA_ARC) / NAKSHATRA_ARC).clamp(0.0, 1.0);
    (idx, elapsed, idx as usize % RulerSequence::LEN)
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashaPeriod {
    pub ruler: Planet,
    pub level: DashaLevel,
    pub start: NaiveDate,
    /// Inclusive.
    pub end: NaiveDate,
    /// Unrounded length in days this period would have with exact proportions.
    pub exact_days: f64,
    /// Index of the parent in the level above.
    pub parent: Option<usize>,
    /// Indices of the children in the level below; empty for leaves.
    pub children: Range<usize>,
}

impl DashaPeriod {
    pub fn span(&self) -> DateSpan {
        DateSpan {
            start: self.start,
            end: self.end,
        }
    }

    pub fn duration_days(&self) -> i64 {
        self.span().duration_days()
    }
}

/// A leaf period together with its ancestry, ready for transit analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashaSlice {
    pub maha: Planet,
    pub antar: Planet,
    pub pratyantar: Planet,
    pub span: DateSpan,
    /// Years from the birth date to `span.start`, rounded to 2 places.
    pub age_at_start: f64,
}

impl DashaSlice {
    pub fn rulers(&self) -> [Planet; 3] {
        [self.maha, self.antar, self.pratyantar]
    }
}

/// The fully materialized, immutable three-level tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashaTree {
    pub birth_date: NaiveDate,
    pub balance: DashaBalance,
    maha: Vec<DashaPeriod>,
    antar: Vec<DashaPeriod>,
    pratyantar: Vec<DashaPeriod>,
}

/// Period bounds while building: ruler index plus day offsets from the birth date.
#[derive(Clone, Copy)]
struct Bounds {
    ruler_idx: usize,
    from: f64,
    to: f64,
}

/// Build the Maha/Antar/Pratyantar tree for a birth.
///
/// # Errors
/// `Configuration` if the ruler table is malformed; `InvariantViolation` if
/// the built tree fails [`DashaTree::validate`].
pub fn generate_dasha_tree(birth: &BirthData, rulers: &RulerSequence) -> Result<DashaTree> {
    rulers.validate()?;

    let (nakshatra_index, elapsed_fraction, start_idx) =
        nakshatra_position(birth.moon_sidereal_longitude);
    let weight = rulers.years(start_idx) as f64;
    let remaining_years = (1.0 - elapsed_fraction) * weight;
    let elapsed_years = weight - remaining_years;
    let balance = DashaBalance {
        ruler: rulers.ruler(start_idx),
        nakshatra_index,
        elapsed_fraction,
        remaining_years,
        elapsed_years,
    };

    let birth_date = birth.date();
    let origin = -(elapsed_years * DAYS_PER_YEAR).trunc();

    let mut tree = DashaTree {
        birth_date,
        balance,
        maha: Vec::with_capacity(9),
        antar: Vec::with_capacity(81),
        pratyantar: Vec::with_capacity(729),
    };

    let mut cursor = origin;
    let mut maha_bounds = Vec::with_capacity(rulers.len());
    for i in 0..rulers.len() {
        let ruler_idx = (start_idx + i) % rulers.len();
        let to = cursor + rulers.years(ruler_idx) as f64 * DAYS_PER_YEAR;
        maha_bounds.push(Bounds {
            ruler_idx,
            from: cursor,
            to,
        });
        cursor = to;
    }

    for (m, mb) in maha_bounds.iter().enumerate() {
        let antar_bounds = child_bounds(mb, rulers);
        let antar_base = tree.antar.len();
        tree.maha.push(period(
            birth_date,
            mb,
            rulers,
            DashaLevel::Maha,
            None,
            antar_base..antar_base + antar_bounds.len(),
        ));

        for ab in &antar_bounds {
            let prat_bounds = child_bounds(ab, rulers);
            let antar_idx = tree.antar.len();
            let prat_base = tree.pratyantar.len();
            tree.antar.push(period(
                birth_date,
                ab,
                rulers,
                DashaLevel::Antar,
                Some(m),
                prat_base..prat_base + prat_bounds.len(),
            ));
            for pb in &prat_bounds {
                tree.pratyantar.push(period(
                    birth_date,
                    pb,
                    rulers,
                    DashaLevel::Pratyantar,
                    Some(antar_idx),
                    0..0,
                ));
            }
        }
    }

    log::debug!(
        "dasha tree: start ruler {} ({}), {} maha / {} antar / {} pratyantar periods",
        balance.ruler,
        balance.nakshatra_name(),
        tree.maha.len(),
        tree.antar.len(),
        tree.pratyantar.len()
    );

    tree.validate(rulers)?;
    Ok(tree)
}

/// Split a parent into one child per ruler, starting from the parent's own ruler.
fn child_bounds(parent: &Bounds, rulers: &RulerSequence) -> Vec<Bounds> {
    let span = parent.to - parent.from;
    let total = RulerSequence::TOTAL_YEARS as f64;
    let mut children = Vec::with_capacity(rulers.len());
    let mut elapsed_weight = 0u32;
    for j in 0..rulers.len() {
        let ruler_idx = (parent.ruler_idx + j) % rulers.len();
        let from = parent.from + span * elapsed_weight as f64 / total;
        elapsed_weight += rulers.years(ruler_idx);
        let to = parent.from + span * elapsed_weight as f64 / total;
        children.push(Bounds { ruler_idx, from, to });
    }
    if let Some(last) = children.last_mut() {
        last.to = parent.to;
    }
    children
}

fn period(
    birth_date: NaiveDate,
    bounds: &Bounds,
    rulers: &RulerSequence,
    level: DashaLevel,
    parent: Option<usize>,
    children: Range<usize>,
) -> DashaPeriod {
    DashaPeriod {
        ruler: rulers.ruler(bounds.ruler_idx),
        level,
        start: add_days(birth_date, bounds.from.round() as i64),
        end: add_days(birth_date, bounds.to.round() as i64 - 1),
        exact_days: bounds.to - bounds.from,
        parent,
        children,
    }
}

impl DashaTree {
    pub fn level(&self, level: DashaLevel) -> &[DashaPeriod] {
        match level {
            DashaLevel::Maha => &self.maha,
            DashaLevel::Antar => &self.antar,
            DashaLevel::Pratyantar => &self.pratyantar,
        }
    }

    pub fn maha_periods(&self) -> &[DashaPeriod] {
        &self.maha
    }

    pub fn children(&self, period: &DashaPeriod) -> &[DashaPeriod] {
        match period.level.child() {
            Some(level) => &self.level(level)[period.children.clone()],
            None => &[],
        }
    }

    pub fn parent(&self, period: &DashaPeriod) -> Option<&DashaPeriod> {
        let idx = period.parent?;
        match period.level {
            DashaLevel::Maha => None,
            DashaLevel::Antar => self.maha.get(idx),
            DashaLevel::Pratyantar => self.antar.get(idx),
        }
    }

    /// Leaf `(maha, antar, pratyantar)` by position within each parent.
    pub fn leaf(&self, maha: usize, antar: usize, pratyantar: usize) -> Option<&DashaPeriod> {
        let n = RulerSequence::LEN;
        if maha >= self.maha.len() || antar >= n || pratyantar >= n {
            return None;
        }
        self.pratyantar.get((maha * n + antar) * n + pratyantar)
    }

    /// The active Maha, Antar and Pratyantar periods on `date`, if the tree covers it.
    pub fn active_at(&self, date: NaiveDate) -> Option<[&DashaPeriod; 3]> {
        let idx = self.pratyantar.partition_point(|p| p.end < date);
        let leaf = self.pratyantar.get(idx)?;
        if !leaf.span().contains(date) {
            return None;
        }
        let antar = self.parent(leaf)?;
        let maha = self.parent(antar)?;
        Some([maha, antar, leaf])
    }

    /// Every leaf in chronological order, with its ancestors' rulers.
    pub fn leaf_slices(&self) -> Vec<DashaSlice> {
        self.pratyantar
            .iter()
            .filter_map(|leaf| {
                let antar = self.parent(leaf)?;
                let maha = self.parent(antar)?;
                Some(DashaSlice {
                    maha: maha.ruler,
                    antar: antar.ruler,
                    pratyantar: leaf.ruler,
                    span: leaf.span(),
                    age_at_start: years_between(self.birth_date, leaf.start),
                })
            })
            .collect()
    }

    /// Check the structural guarantees of the tree.
    ///
    /// - top-level weights total 120 years and periods are non-empty;
    /// - siblings at every level are contiguous (`end + 1 == next.start`);
    /// - every parent has one child per ruler, starting with its own ruler,
    ///   whose day counts sum to its own and whose exact lengths sum to its own;
    /// - every period is within one day of its exact proportional length.
    pub fn validate(&self, rulers: &RulerSequence) -> Result<()> {
        let weights: u32 = self
            .maha
            .iter()
            .map(|p| rulers.position(p.ruler).map(|i| rulers.years(i)).unwrap_or(0))
            .sum();
        if weights != RulerSequence::TOTAL_YEARS {
            return violation(format!("top-level weights sum to {weights}, expected 120"));
        }

        for level in [DashaLevel::Maha, DashaLevel::Antar, DashaLevel::Pratyantar] {
            let periods = self.level(level);
            for p in periods {
                if p.end < p.start {
                    return violation(format!(
                        "{level:?} period of {} ends {} before it starts {}",
                        p.ruler, p.end, p.start
                    ));
                }
                if (p.duration_days() as f64 - p.exact_days).abs() > 1.0 {
                    return violation(format!(
                        "{level:?} period of {} lasts {} days, exact length {:.3}",
                        p.ruler,
                        p.duration_days(),
                        p.exact_days
                    ));
                }
            }
            for pair in periods.windows(2) {
                if add_days(pair[0].end, 1) != pair[1].start {
                    return violation(format!(
                        "{level:?} periods not contiguous: {} ends {}, {} starts {}",
                        pair[0].ruler, pair[0].end, pair[1].ruler, pair[1].start
                    ));
                }
            }
        }

        for parent in self.maha.iter().chain(&self.antar) {
            let children = self.children(parent);
            if children.len() != rulers.len() || children[0].ruler != parent.ruler {
                return violation(format!(
                    "{:?} period of {} has a malformed child sequence",
                    parent.level, parent.ruler
                ));
            }
            let day_sum: i64 = children.iter().map(DashaPeriod::duration_days).sum();
            let exact_sum: f64 = children.iter().map(|c| c.exact_days).sum();
            let first = &children[0];
            let last = &children[children.len() - 1];
            if first.start != parent.start
                || last.end != parent.end
                || day_sum != parent.duration_days()
                || (exact_sum - parent.exact_days).abs() > 1e-6
            {
                return violation(format!(
                    "children of {:?} period {} ({}..{}) do not sum to their parent",
                    parent.level, parent.ruler, parent.start, parent.end
                ));
            }
        }
        Ok(())
    }
}

fn violation<T>(message: String) -> Result<T> {
    log::error!("dasha tree invariant violated: {message}");
    Err(VivahaError::InvariantViolation(message))
}
