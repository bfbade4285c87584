use std::collections::BTreeSet;

use crate::engine::distance::{location_distance, may_be_within};
use crate::engine::plan::MatchPlan;
use crate::models::{Alignment, Criterion, Member};

/// Largest age-bucket gap a hard age rule allows (adjacent buckets)
const MAX_HARD_AGE_GAP: usize = 1;

/// Hard-constrained criteria whose attribute the member lacks
///
/// Members with any missing required field are excluded before scoring.
pub fn missing_required(plan: &MatchPlan<'_>, member: &Member) -> Vec<Criterion> {
    plan.hard()
        .map(|c| c.criterion)
        .filter(|c| !member.has(*c))
        .collect()
}

/// Member-level hard rules (currently the single-gender allow list)
#[inline]
pub fn member_admissible(plan: &MatchPlan<'_>, member: &Member) -> bool {
    plan.gender_rule.admits(member.gender.as_deref())
}

/// Check every pairwise hard rule for two members
///
/// Attributes missing on either side never fail a rule.
pub fn pair_feasible(plan: &MatchPlan<'_>, a: &Member, b: &Member) -> bool {
    if !member_admissible(plan, a) || !member_admissible(plan, b) {
        return false;
    }

    plan.hard().all(|rule| match rule.criterion {
        Criterion::Age => match (a.age_group, b.age_group) {
            (Some(x), Some(y)) => x.distance(y) <= MAX_HARD_AGE_GAP,
            _ => true,
        },
        Criterion::Location => match (&a.location, &b.location) {
            (Some(la), Some(lb)) => {
                let max = plan.location.max_distance_miles;
                if !may_be_within(la, lb, max) {
                    return false;
                }
                location_distance(la, lb, plan.location.scope, plan.zones)
                    .map_or(true, |miles| miles <= max)
            }
            _ => true,
        },
        Criterion::Interests | Criterion::Availability => true,
        categorical => match rule.alignment {
            Alignment::Same => match (a.category(categorical), b.category(categorical)) {
                (Some(x), Some(y)) => x.trim().eq_ignore_ascii_case(y.trim()),
                _ => true,
            },
            // Mixing is a property of the whole group
            Alignment::Mix => true,
        },
    })
}

/// Group-level hard rules: every `mix` criterion needs at least two distinct values
///
/// Only members carrying the attribute are counted; fewer than two carriers passes.
pub fn mix_rules_hold<'m, I>(plan: &MatchPlan<'_>, members: I) -> bool
where
    I: IntoIterator<Item = &'m Member> + Clone,
{
    plan.hard()
        .filter(|rule| rule.criterion.is_categorical() && rule.alignment == Alignment::Mix)
        .all(|rule| {
            let values: Vec<String> = members
                .clone()
                .into_iter()
                .filter_map(|m| m.category(rule.criterion))
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect();
            if values.len() < 2 {
                return true;
            }
            values.iter().collect::<BTreeSet<_>>().len() >= 2
        })
}

/// A group is feasible when every pair is and every group-level rule holds
pub fn group_feasible(plan: &MatchPlan<'_>, members: &[&Member]) -> bool {
    let pairs_ok = members.iter().enumerate().all(|(i, a)| {
        members[i + 1..].iter().all(|b| pair_feasible(plan, a, b))
    });
    pairs_ok
        && members.iter().all(|m| member_admissible(plan, m))
        && mix_rules_hold(plan, members.iter().copied())
}
