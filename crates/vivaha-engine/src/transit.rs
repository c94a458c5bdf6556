//! Compress daily planet samples into maximal sign intervals.
//!
//! A planet's run of consecutive days with the same sign and retrograde flag
//! becomes one [`TransitInterval`]. Each interval is then placed into a natal
//! house and given the houses it aspects, producing a [`DerivedTransit`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::chart::{ChartLookup, SignHouseMap, TransitSample};
use crate::config::AspectTable;
use crate::error::{Result, VivahaError};
use crate::interval::{add_days, validate_range, DateSpan};
use crate::planet::{house_offset, House, Planet, Sign};

/// A planet's uninterrupted stay in one sign with one retrograde state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitInterval {
    pub planet: Planet,
    pub sign: Sign,
    pub span: DateSpan,
    pub retrograde: bool,
}

/// A transit interval placed into the natal chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedTransit {
    pub planet: Planet,
    pub sign: Sign,
    pub span: DateSpan,
    pub retrograde: bool,
    pub transiting_house: House,
    pub aspecting_houses: BTreeSet<House>,
}

impl DerivedTransit {
    pub fn interval(&self) -> TransitInterval {
        TransitInterval {
            planet: self.planet,
            sign: self.sign,
            span: self.span,
            retrograde: self.retrograde,
        }
    }

    /// The transited house plus every aspected house.
    pub fn influenced_houses(&self) -> BTreeSet<House> {
        let mut houses = self.aspecting_houses.clone();
        houses.insert(self.transiting_house);
        houses
    }
}

/// Houses aspected from `house` under `offsets`.
pub fn aspecting_houses(house: House, offsets: &[u8]) -> BTreeSet<House> {
    offsets.iter().map(|o| house_offset(house, *o)).collect()
}

/// Place an interval into the chart.
pub fn derive_transit(
    interval: TransitInterval,
    houses: &SignHouseMap,
    aspects: &AspectTable,
) -> Result<DerivedTransit> {
    let offsets = aspects.offsets_for(interval.planet).ok_or_else(|| {
        VivahaError::Configuration(format!("missing aspect offsets for {}", interval.planet))
    })?;
    let transiting_house = houses.house_of(interval.sign);
    Ok(DerivedTransit {
        planet: interval.planet,
        sign: interval.sign,
        span: interval.span,
        retrograde: interval.retrograde,
        transiting_house,
        aspecting_houses: aspecting_houses(transiting_house, offsets),
    })
}

/// Compress daily samples into derived transit intervals.
///
/// `planet_filter` is an allow-list; when empty every planet is accepted. The
/// outer planets are always dropped. A filtered planet without any sample is
/// logged and left out of the output. Output is ordered by planet, then date.
///
/// # Errors
/// `Validation` if one planet has two samples for the same date;
/// `Configuration` if a planet has no aspect table entry.
pub fn normalize_transits(
    samples: &[TransitSample],
    planet_filter: &[Planet],
    houses: &SignHouseMap,
    aspects: &AspectTable,
) -> Result<Vec<DerivedTransit>> {
    let accepts = |p: Planet| !p.is_outer() && (planet_filter.is_empty() || planet_filter.contains(&p));

    let mut by_planet: BTreeMap<Planet, Vec<&TransitSample>> = BTreeMap::new();
    for sample in samples.iter().filter(|s| accepts(s.planet)) {
        by_planet.entry(sample.planet).or_default().push(sample);
    }

    for planet in planet_filter.iter().filter(|p| accepts(**p)) {
        if !by_planet.contains_key(planet) {
            log::warn!("no transit samples for {planet} in range; omitting it");
        }
    }

    let mut out = Vec::new();
    for (planet, mut series) in by_planet {
        series.sort_by_key(|s| s.date);
        for interval in compress(planet, &series)? {
            out.push(derive_transit(interval, houses, aspects)?);
        }
    }

    log::debug!(
        "normalized {} samples into {} transit intervals",
        samples.len(),
        out.len()
    );
    Ok(out)
}

/// Single forward pass over one planet's date-sorted samples.
fn compress(planet: Planet, series: &[&TransitSample]) -> Result<Vec<TransitInterval>> {
    let mut intervals = Vec::new();
    // (sign, retrograde, start, last day seen)
    let mut open: Option<(Sign, bool, chrono::NaiveDate, chrono::NaiveDate)> = None;

    for sample in series {
        if let Some((sign, retrograde, start, last)) = open {
            if sample.date == last {
                return Err(VivahaError::Validation(format!(
                    "duplicate sample for {planet} on {}",
                    sample.date
                )));
            }
            let contiguous = add_days(last, 1) == sample.date;
            if contiguous && sign == sample.sign && retrograde == sample.retrograde {
                open = Some((sign, retrograde, start, sample.date));
                continue;
            }
            intervals.push(TransitInterval {
                planet,
                sign,
                span: DateSpan { start, end: last },
                retrograde,
            });
        }
        open = Some((sample.sign, sample.retrograde, sample.date, sample.date));
    }

    if let Some((sign, retrograde, start, last)) = open {
        intervals.push(TransitInterval {
            planet,
            sign,
            span: DateSpan { start, end: last },
            retrograde,
        });
    }
    Ok(intervals)
}

/// Expand intervals back into one sample per planet per day, ordered by date then planet.
pub fn explode_to_samples<'a, I>(intervals: I) -> Vec<TransitSample>
where
    I: IntoIterator<Item = &'a DerivedTransit>,
{
    let mut samples: Vec<TransitSample> = intervals
        .into_iter()
        .flat_map(|t| {
            t.span.days().map(move |date| TransitSample {
                date,
                planet: t.planet,
                sign: t.sign,
                retrograde: t.retrograde,
            })
        })
        .collect();
    samples.sort();
    samples
}

/// Sample `lookup` over `span` for the given planets.
///
/// The range is validated against `max_years` before any lookup call.
pub fn collect_samples<L>(
    lookup: &L,
    span: &DateSpan,
    planets: &[Planet],
    max_years: u32,
) -> Result<Vec<TransitSample>>
where
    L: ChartLookup + ?Sized,
{
    validate_range(span.start, span.end, max_years)?;
    let mut samples = lookup.positions_between(span)?;
    samples.retain(|s| !s.planet.is_outer() && planets.contains(&s.planet));
    log::debug!(
        "collected {} samples for {} planets over {}..={}",
        samples.len(),
        planets.len(),
        span.start,
        span.end
    );
    Ok(samples)
}

/// Reject any interval that ends before it starts.
pub fn validate_intervals(transits: &[DerivedTransit]) -> Result<()> {
    match transits.iter().find(|t| t.span.end < t.span.start) {
        Some(t) => Err(VivahaError::Validation(format!(
            "transit of {} in {} ends {} before it starts {}",
            t.planet, t.sign, t.span.end, t.span.start
        ))),
        None => Ok(()),
    }
}
