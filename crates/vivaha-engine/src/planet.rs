//! Planets, zodiac signs, and house arithmetic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VivahaError;

/// A house number, always in `1..=12`.
pub type House = u8;

/// A tracked body. The nine Vimshottari rulers plus the three outer planets a
/// chart lookup may report (those are always filtered out of transit analysis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Planet {
    Sun,
    Moon,
    Mars,
    Mercury,
    Jupiter,
    Venus,
    Saturn,
    Rahu,
    Ketu,
    Uranus,
    Neptune,
    Pluto,
}

impl Planet {
    pub const ALL: [Planet; 12] = [
        Planet::Sun,
        Planet::Moon,
        Planet::Mars,
        Planet::Mercury,
        Planet::Jupiter,
        Planet::Venus,
        Planet::Saturn,
        Planet::Rahu,
        Planet::Ketu,
        Planet::Uranus,
        Planet::Neptune,
        Planet::Pluto,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Planet::Sun => "Sun",
            Planet::Moon => "Moon",
            Planet::Mars => "Mars",
            Planet::Mercury => "Mercury",
            Planet::Jupiter => "Jupiter",
            Planet::Venus => "Venus",
            Planet::Saturn => "Saturn",
            Planet::Rahu => "Rahu",
            Planet::Ketu => "Ketu",
            Planet::Uranus => "Uranus",
            Planet::Neptune => "Neptune",
            Planet::Pluto => "Pluto",
        }
    }

    /// Slow outer planets never take part in transit analysis.
    pub fn is_outer(self) -> bool {
        matches!(self, Planet::Uranus | Planet::Neptune | Planet::Pluto)
    }

    /// The lunar nodes signify through their star lord rather than by ownership.
    pub fn is_node(self) -> bool {
        matches!(self, Planet::Rahu | Planet::Ketu)
    }
}

impl fmt::Display for Planet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Planet {
    type Err = VivahaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Planet::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| VivahaError::Validation(format!("unknown planet: {s}")))
    }
}

/// One of the twelve zodiac signs, numbered 1 (Aries) to 12 (Pisces).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Sign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl Sign {
    pub const ALL: [Sign; 12] = [
        Sign::Aries,
        Sign::Taurus,
        Sign::Gemini,
        Sign::Cancer,
        Sign::Leo,
        Sign::Virgo,
        Sign::Libra,
        Sign::Scorpio,
        Sign::Sagittarius,
        Sign::Capricorn,
        Sign::Aquarius,
        Sign::Pisces,
    ];

    pub fn number(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_number(n: u8) -> Option<Sign> {
        match n {
            1..=12 => Some(Sign::ALL[(n - 1) as usize]),
            _ => None,
        }
    }

    /// The sign containing a sidereal longitude in degrees (any real value).
    pub fn from_longitude(lon: f64) -> Sign {
        let idx = (lon.rem_euclid(360.0) / 30.0).floor() as usize;
        Sign::ALL[idx.min(11)]
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Count `offset` houses forward from `base`, wrapping within `1..=12`.
pub fn house_offset(base: House, offset: u8) -> House {
    ((base as u32 - 1 + offset as u32) % 12) as House + 1
}

/// `1 → "1st"`, `2 → "2nd"`, `11 → "11th"`.
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}
