use std::collections::BTreeSet;

use crate::engine::distance::location_distance;
use crate::engine::plan::{ActiveCriterion, MatchPlan};
use crate::models::{AgeGroup, Alignment, Criterion, Member};

/// Similarity used when either member lacks the attribute
pub const NEUTRAL_SIMILARITY: f64 = 0.5;

/// Similarity (0-1) of two members on one criterion, as the plan applies it
pub fn similarity(plan: &MatchPlan<'_>, active: &ActiveCriterion, a: &Member, b: &Member) -> f64 {
    raw_similarity(plan, active, a, b).unwrap_or(NEUTRAL_SIMILARITY)
}

/// Similarity on one criterion, or `None` when the attribute is missing on either side
pub fn raw_similarity(
    plan: &MatchPlan<'_>,
    active: &ActiveCriterion,
    a: &Member,
    b: &Member,
) -> Option<f64> {
    match active.criterion {
        Criterion::Age => age_similarity(a.age_group?, b.age_group?),
        Criterion::Location => {
            let miles = location_distance(
                a.location.as_ref()?,
                b.location.as_ref()?,
                plan.location.scope,
                plan.zones,
            )?;
            Some(distance_similarity(miles, plan.location.max_distance_miles))
        }
        Criterion::Interests => jaccard(&a.activities, &b.activities),
        Criterion::Availability => jaccard(&a.availability, &b.availability),
        categorical => categorical_similarity(
            a.category(categorical),
            b.category(categorical),
            active.alignment,
        ),
    }
}

/// 1.0 on a match under `same`, 1.0 on a difference under `mix`
pub fn categorical_similarity(a: Option<&str>, b: Option<&str>, alignment: Alignment) -> Option<f64> {
    let (a, b) = (non_blank(a)?, non_blank(b)?);
    let equal = a.eq_ignore_ascii_case(b);
    let similar = match alignment {
        Alignment::Same => equal,
        Alignment::Mix => !equal,
    };
    Some(if similar { 1.0 } else { 0.0 })
}

/// Linear decay with bucket distance across the age scale
pub fn age_similarity(a: AgeGroup, b: AgeGroup) -> Option<f64> {
    let span = (AgeGroup::BUCKETS - 1) as f64;
    Some(1.0 - a.distance(b) as f64 / span)
}

/// `max(0, 1 - distance / max_distance)`
pub fn distance_similarity(distance_miles: f64, max_distance_miles: f64) -> f64 {
    if max_distance_miles <= 0.0 {
        return 0.0;
    }
    (1.0 - distance_miles / max_distance_miles).max(0.0)
}

/// Jaccard index of two tag sets
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    Some(shared as f64 / union as f64)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
