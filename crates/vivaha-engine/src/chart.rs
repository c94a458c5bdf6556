//! Seams to the chart-computation collaborators.
//!
//! The engine never computes planetary positions itself. A [`ChartLookup`]
//! reports each planet's sign and retrograde state for a date, a
//! [`SignHouseMap`] places signs into the natal houses, and a
//! [`SignificatorLookup`] reports which houses each planet signifies.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VivahaError};
use crate::interval::DateSpan;
use crate::planet::{House, Planet, Sign};

/// A planet's placement on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanetPosition {
    pub sign: Sign,
    pub retrograde: bool,
}

/// One daily observation of one planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitSample {
    pub date: NaiveDate,
    pub planet: Planet,
    pub sign: Sign,
    pub retrograde: bool,
}

/// Source of daily planetary positions.
pub trait ChartLookup {
    /// Positions of every planet the source knows about on `date`.
    fn positions_on(&self, date: NaiveDate) -> Result<BTreeMap<Planet, PlanetPosition>>;

    /// Daily samples for every day of `span`, ordered by date then planet.
    ///
    /// The default issues one [`positions_on`](Self::positions_on) call per day.
    /// Sources able to batch should override it.
    fn positions_between(&self, span: &DateSpan) -> Result<Vec<TransitSample>> {
        let mut samples = Vec::new();
        for date in span.days() {
            for (planet, pos) in self.positions_on(date)? {
                samples.push(TransitSample {
                    date,
                    planet,
                    sign: pos.sign,
                    retrograde: pos.retrograde,
                });
            }
        }
        Ok(samples)
    }
}

/// Static natal mapping from each sign to the house it occupies.
///
/// Serialized as `(house, sign)` pairs; deserializing goes through
/// [`SignHouseMap::from_pairs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<(House, Sign)>", into = "Vec<(House, Sign)>")]
pub struct SignHouseMap {
    houses: [House; 12],
}

impl SignHouseMap {
    /// Whole-sign houses: the ascendant's sign is the 1st house.
    pub fn whole_sign(ascendant: Sign) -> Self {
        let mut houses = [0; 12];
        for sign in Sign::ALL {
            let idx = sign.number() as usize - 1;
            houses[idx] = ((sign.number() + 12 - ascendant.number()) % 12) + 1;
        }
        Self { houses }
    }

    /// Build from explicit `(house, sign)` pairs, e.g. read off a rashi chart.
    ///
    /// Every house and every sign must appear exactly once.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (House, Sign)>,
    {
        let mut houses = [0u8; 12];
        let mut seen_houses = BTreeSet::new();
        for (house, sign) in pairs {
            if !(1..=12).contains(&house) {
                return Err(VivahaError::Validation(format!(
                    "house {house} is outside 1..=12"
                )));
            }
            let idx = sign.number() as usize - 1;
            if houses[idx] != 0 {
                return Err(VivahaError::Validation(format!(
                    "sign {sign} is mapped to more than one house"
                )));
            }
            if !seen_houses.insert(house) {
                return Err(VivahaError::Validation(format!(
                    "house {house} is mapped to more than one sign"
                )));
            }
            houses[idx] = house;
        }
        if seen_houses.len() != 12 {
            return Err(VivahaError::Validation(format!(
                "sign-to-house map covers {} of 12 houses",
                seen_houses.len()
            )));
        }
        Ok(Self { houses })
    }

    pub fn house_of(&self, sign: Sign) -> House {
        self.houses[sign.number() as usize - 1]
    }
}

impl TryFrom<Vec<(House, Sign)>> for SignHouseMap {
    type Error = VivahaError;

    fn try_from(pairs: Vec<(House, Sign)>) -> Result<Self> {
        Self::from_pairs(pairs)
    }
}

impl From<SignHouseMap> for Vec<(House, Sign)> {
    fn from(map: SignHouseMap) -> Self {
        Sign::ALL.iter().map(|s| (map.house_of(*s), *s)).collect()
    }
}

/// The houses a planet signifies, split by how it signifies them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Significators {
    /// Houses whose cusp sign the planet owns. The nodes report the houses they
    /// signify through their dispositor here instead.
    pub ruled_houses: Vec<House>,
    pub occupied_house: Option<House>,
    /// Houses signified by the lord of the planet's nakshatra.
    pub star_lord_houses: Vec<House>,
    /// Houses signified by the planet's sub lord.
    pub sub_lord_houses: Vec<House>,
}

impl Significators {
    /// Ruled plus occupied houses.
    pub fn own_houses(&self) -> BTreeSet<House> {
        self.ruled_houses
            .iter()
            .copied()
            .chain(self.occupied_house)
            .collect()
    }

    pub fn all_houses(&self) -> BTreeSet<House> {
        let mut all = self.own_houses();
        all.extend(self.star_lord_houses.iter().copied());
        all.extend(self.sub_lord_houses.iter().copied());
        all
    }
}

/// Source of per-planet significations.
pub trait SignificatorLookup {
    /// `None` when the source has nothing for `planet`; callers treat that as no houses.
    fn significators(&self, planet: Planet) -> Option<&Significators>;
}

impl SignificatorLookup for BTreeMap<Planet, Significators> {
    fn significators(&self, planet: Planet) -> Option<&Significators> {
        self.get(&planet)
    }
}

/// Union of every house signified by any of `rulers`. Unknown rulers add nothing.
pub fn combined_significators<S>(lookup: &S, rulers: &[Planet]) -> BTreeSet<House>
where
    S: SignificatorLookup + ?Sized,
{
    rulers
        .iter()
        .filter_map(|r| lookup.significators(*r))
        .flat_map(|s| s.all_houses())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_sign_houses_start_at_ascendant() {
        let map = SignHouseMap::whole_sign(Sign::Libra);
        assert_eq!(map.house_of(Sign::Libra), 1);
        assert_eq!(map.house_of(Sign::Aries), 7);
        assert_eq!(map.house_of(Sign::Virgo), 12);
    }

    #[test]
    fn from_pairs_rejects_duplicate_sign() {
        let mut pairs: Vec<(House, Sign)> =
            Sign::ALL.iter().enumerate().map(|(i, s)| (i as u8 + 1, *s)).collect();
        pairs[1].1 = Sign::Aries;
        assert!(SignHouseMap::from_pairs(pairs).is_err());
    }

    #[test]
    fn from_pairs_rejects_incomplete_map() {
        let pairs = vec![(1, Sign::Aries), (2, Sign::Taurus)];
        assert!(SignHouseMap::from_pairs(pairs).is_err());
    }

    #[test]
    fn deserialized_map_is_checked() {
        let map = SignHouseMap::whole_sign(Sign::Cancer);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(serde_json::from_str::<SignHouseMap>(&json).unwrap(), map);

        let mut pairs: Vec<(House, Sign)> = map.into();
        pairs[0].0 = 0;
        let json = serde_json::to_string(&pairs).unwrap();
        assert!(serde_json::from_str::<SignHouseMap>(&json).is_err());
    }

    #[test]
    fn combined_significators_skip_unknown_rulers() {
        let mut table = BTreeMap::new();
        table.insert(
            Planet::Venus,
            Significators {
                ruled_houses: vec![2, 7],
                occupied_house: Some(5),
                star_lord_houses: vec![11],
                sub_lord_houses: vec![6],
            },
        );
        let houses = combined_significators(&table, &[Planet::Venus, Planet::Mars]);
        assert_eq!(houses, [2, 5, 6, 7, 11].into_iter().collect());
    }
}
