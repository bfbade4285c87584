use std::collections::BTreeSet;

use crate::models::{
    Alignment, Criterion, FallbackStrategy, GenderMode, LocationScope, MatchingPolicy, Member,
    ZoneDirectory,
};

/// Whether a criterion can reject a grouping or only shapes its score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enforcement {
    Hard,
    Soft,
}

/// One criterion as the engine applies it for a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveCriterion {
    pub criterion: Criterion,
    pub weight: f64,
    pub enforcement: Enforcement,
    pub alignment: Alignment,
}

impl ActiveCriterion {
    pub fn is_hard(&self) -> bool {
        self.enforcement == Enforcement::Hard
    }
}

/// Member-level gender rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenderRule {
    Open,
    Restricted(BTreeSet<String>),
}

impl GenderRule {
    pub fn admits(&self, gender: Option<&str>) -> bool {
        match (self, gender) {
            (GenderRule::Open, _) => true,
            // Missing data cannot fail a hard rule
            (GenderRule::Restricted(_), None) => true,
            (GenderRule::Restricted(allowed), Some(g)) => allowed
                .iter()
                .any(|a| a.trim().eq_ignore_ascii_case(g.trim())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRule {
    pub max_distance_miles: f64,
    pub scope: LocationScope,
}

/// A policy compiled once per run into the variants the engine dispatches on
#[derive(Debug, Clone)]
pub struct MatchPlan<'z> {
    criteria: Vec<ActiveCriterion>,
    pub gender_rule: GenderRule,
    pub location: LocationRule,
    pub zones: &'z ZoneDirectory,
    pub default_group_size: usize,
    pub family_group_size: usize,
    pub family_alignment: Alignment,
    pub fallback: FallbackStrategy,
}

impl<'z> MatchPlan<'z> {
    pub fn compile(policy: &MatchingPolicy, zones: &'z ZoneDirectory) -> Self {
        let criteria = Criterion::ALL
            .into_iter()
            .filter(|c| policy.weight(*c) > 0 || policy.is_hard(*c))
            .map(|criterion| ActiveCriterion {
                criterion,
                weight: f64::from(policy.weight(criterion)),
                enforcement: if policy.is_hard(criterion) {
                    Enforcement::Hard
                } else {
                    Enforcement::Soft
                },
                alignment: policy.alignment(criterion),
            })
            .collect();

        let gender_rule = if policy.gender_hard && policy.gender_mode == GenderMode::Single {
            GenderRule::Restricted(policy.gender_allowed.clone())
        } else {
            GenderRule::Open
        };

        Self {
            criteria,
            gender_rule,
            location: LocationRule {
                max_distance_miles: policy.max_distance_miles,
                scope: policy.location_scope,
            },
            zones,
            default_group_size: policy.default_group_size,
            family_group_size: policy.family_group_size,
            family_alignment: policy.family_stage_alignment,
            fallback: policy.fallback_strategy,
        }
    }

    /// The same plan with every hard rule downgraded to a soft weight
    pub fn relaxed(&self) -> Self {
        let criteria = self
            .criteria
            .iter()
            .map(|c| ActiveCriterion {
                enforcement: Enforcement::Soft,
                ..*c
            })
            .collect();

        Self {
            criteria,
            gender_rule: GenderRule::Open,
            ..self.clone()
        }
    }

    pub fn criteria(&self) -> &[ActiveCriterion] {
        &self.criteria
    }

    /// Criteria contributing to the compatibility score
    pub fn weighted(&self) -> impl Iterator<Item = &ActiveCriterion> {
        self.criteria.iter().filter(|c| c.weight > 0.0)
    }

    pub fn hard(&self) -> impl Iterator<Item = &ActiveCriterion> {
        self.criteria.iter().filter(|c| c.is_hard())
    }

    pub fn has_hard_rules(&self) -> bool {
        self.hard().next().is_some() || self.gender_rule != GenderRule::Open
    }

    pub fn total_weight(&self) -> f64 {
        self.weighted().map(|c| c.weight).sum()
    }

    /// Size limit for a group seeded by `a` and `b`
    pub fn group_cap(&self, a: &Member, b: &Member) -> usize {
        if self.family_alignment == Alignment::Same && a.is_family() && b.is_family() {
            self.family_group_size
        } else {
            self.default_group_size
        }
    }
}
