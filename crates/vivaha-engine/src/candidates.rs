//! Pick the planets whose dasha periods can time the event.
//!
//! Each planet is judged on three house groups: its own (ruled plus occupied),
//! those of its star lord, and those of its sub lord. Every group is classed by
//! how many primary, support and obstruction houses it holds. A planet becomes
//! a candidate when its star-lord and sub-lord groups agree, when its combined
//! significations hold the anchor house and both companions, or, for the
//! lenient planets, when its combined significations are not dominated by
//! obstruction.

use std::collections::BTreeSet;

use crate::chart::{SignificatorLookup, Significators};
use crate::config::CandidateRules;
use crate::planet::{House, Planet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct GroupVerdict {
    positive: bool,
    support_only: bool,
    neutral: bool,
}

fn count(houses: &BTreeSet<House>, set: &BTreeSet<House>) -> usize {
    houses.intersection(set).count()
}

fn classify(houses: &BTreeSet<House>, rules: &CandidateRules) -> GroupVerdict {
    let pos = count(houses, &rules.primary);
    let sup = count(houses, &rules.support);
    let neg = count(houses, &rules.obstruction);

    let mut verdict = GroupVerdict {
        neutral: (pos == 0 && sup == 0 && neg == 0) || (pos == 0 && neg == sup),
        ..GroupVerdict::default()
    };

    if pos > neg {
        verdict.positive = true;
        verdict.support_only = sup > 0;
    } else if sup > 0 && neg == 0 {
        verdict.support_only = true;
    } else if pos + sup > neg {
        verdict.positive = pos > 0;
        verdict.support_only = sup > neg;
    } else if pos > 0 && neg > 0 {
        verdict.positive = houses.contains(&rules.anchor_house);
    }
    verdict
}

/// Star lord and sub lord agree, or a positive own group carries a neutral star lord.
fn strength_accepts(sig: &Significators, rules: &CandidateRules) -> bool {
    let own = classify(&sig.own_houses(), rules);
    let star = classify(&sig.star_lord_houses.iter().copied().collect(), rules);
    let sub = classify(&sig.sub_lord_houses.iter().copied().collect(), rules);

    (star.positive && (sub.positive || sub.support_only))
        || (sub.positive && (star.positive || star.support_only))
        || (own.positive && star.neutral && sub.positive)
}

/// The anchor and both companion houses are signified between the three groups.
fn promise_accepts(sig: &Significators, rules: &CandidateRules) -> bool {
    let all = sig.all_houses();
    let [first, second] = rules.companion_houses;
    [rules.anchor_house, first, second]
        .iter()
        .all(|h| all.contains(h))
}

/// Free of obstruction, or holding a primary house without every obstruction house.
fn lenient_accepts(sig: &Significators, rules: &CandidateRules) -> bool {
    let all = sig.all_houses();
    if all.is_disjoint(&rules.obstruction) {
        return true;
    }
    if rules.obstruction.is_subset(&all) {
        return false;
    }
    !all.is_disjoint(&rules.primary)
}

/// Candidate rulers in acceptance order, without duplicates.
///
/// Outer planets and planets the lookup knows nothing about are skipped.
pub fn select_candidate_rulers<S>(significators: &S, rules: &CandidateRules) -> Vec<Planet>
where
    S: SignificatorLookup + ?Sized,
{
    let known: Vec<(Planet, &Significators)> = Planet::ALL
        .iter()
        .filter(|p| !p.is_outer())
        .filter_map(|p| significators.significators(*p).map(|s| (*p, s)))
        .collect();

    let mut selected: Vec<Planet> = Vec::new();
    let mut push = |planet: Planet| {
        if !selected.contains(&planet) {
            selected.push(planet);
        }
    };

    for (planet, sig) in &known {
        if strength_accepts(sig, rules) {
            push(*planet);
        }
    }
    for (planet, sig) in &known {
        let lenient = rules.lenient_planets.contains(planet);
        if promise_accepts(sig, rules) || (lenient && lenient_accepts(sig, rules)) {
            push(*planet);
        }
    }

    log::debug!("selected candidate rulers {:?}", selected);
    selected
}
