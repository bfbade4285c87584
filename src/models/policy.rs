use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use validator::{Validate, ValidationError};

use crate::error::MatchError;
use crate::models::domain::Criterion;

/// Whether generated groups go live directly or wait for an administrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Automatic,
    ReviewRequired,
}

/// Favor homogeneous (`same`) or heterogeneous (`mix`) groups on a categorical criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Same,
    Mix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderMode {
    Mixed,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationScope {
    InsideOnly,
    NearbyOk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    FillPartial,
    AutoRelax,
    Waitlist,
}

/// Administrator-configured matching rules for one zone
///
/// The flat layout mirrors the stored policy row: one `*_weight` slider
/// (0-100, independent of the others) and one `*_hard` switch per criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_policy_shape"))]
pub struct MatchingPolicy {
    #[validate(length(min = 1))]
    pub zone_id: String,
    pub mode: PolicyMode,
    #[validate(range(min = 2, max = 20))]
    pub default_group_size: usize,
    #[validate(range(min = 2, max = 20))]
    pub family_group_size: usize,

    #[validate(range(max = 100))]
    pub gender_weight: u8,
    pub gender_hard: bool,
    pub gender_alignment: Alignment,
    pub gender_mode: GenderMode,
    pub gender_allowed: BTreeSet<String>,

    #[validate(range(max = 100))]
    pub stage_of_life_weight: u8,
    pub stage_of_life_hard: bool,
    pub stage_of_life_alignment: Alignment,

    #[validate(range(max = 100))]
    pub season_weight: u8,
    pub season_hard: bool,
    pub season_alignment: Alignment,

    #[validate(range(max = 100))]
    pub family_stage_weight: u8,
    pub family_stage_hard: bool,
    pub family_stage_alignment: Alignment,

    #[validate(range(max = 100))]
    pub age_weight: u8,
    pub age_hard: bool,

    #[validate(range(max = 100))]
    pub location_weight: u8,
    pub location_hard: bool,
    pub location_scope: LocationScope,
    pub max_distance_miles: f64,

    #[validate(range(max = 100))]
    pub interests_weight: u8,
    #[validate(range(max = 100))]
    pub availability_weight: u8,

    pub fallback_strategy: FallbackStrategy,
}

fn validate_policy_shape(policy: &MatchingPolicy) -> Result<(), ValidationError> {
    if !policy.max_distance_miles.is_finite() || policy.max_distance_miles <= 0.0 {
        let mut err = ValidationError::new("max_distance_miles");
        err.message = Some("max_distance_miles must be a positive number".into());
        return Err(err);
    }

    if policy.gender_mode == GenderMode::Single
        && policy.gender_allowed.iter().all(|g| g.trim().is_empty())
    {
        let mut err = ValidationError::new("gender_allowed");
        err.message = Some("gender_allowed must list at least one gender in single mode".into());
        return Err(err);
    }

    Ok(())
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            zone_id: String::new(),
            mode: PolicyMode::ReviewRequired,
            default_group_size: 4,
            family_group_size: 6,
            gender_weight: 0,
            gender_hard: false,
            gender_alignment: Alignment::Same,
            gender_mode: GenderMode::Mixed,
            gender_allowed: BTreeSet::new(),
            stage_of_life_weight: 50,
            stage_of_life_hard: false,
            stage_of_life_alignment: Alignment::Same,
            season_weight: 30,
            season_hard: false,
            season_alignment: Alignment::Same,
            family_stage_weight: 60,
            family_stage_hard: false,
            family_stage_alignment: Alignment::Same,
            age_weight: 50,
            age_hard: false,
            location_weight: 70,
            location_hard: false,
            location_scope: LocationScope::NearbyOk,
            max_distance_miles: 10.0,
            interests_weight: 40,
            availability_weight: 0,
            fallback_strategy: FallbackStrategy::Waitlist,
        }
    }
}

impl MatchingPolicy {
    pub fn builder(zone_id: impl Into<String>) -> MatchingPolicyBuilder {
        MatchingPolicyBuilder::new(zone_id)
    }

    /// Continue editing a copy of this policy
    pub fn to_builder(&self) -> MatchingPolicyBuilder {
        MatchingPolicyBuilder {
            policy: self.clone(),
        }
    }

    /// Parse a stored or submitted policy, rejecting unknown enum values and bad ranges
    pub fn from_json(value: serde_json::Value) -> Result<Self, MatchError> {
        let policy: MatchingPolicy = serde_json::from_value(value)
            .map_err(|e| MatchError::InvalidPolicy(e.to_string()))?;
        policy.ensure_valid()?;
        Ok(policy)
    }

    pub fn ensure_valid(&self) -> Result<(), MatchError> {
        self.validate().map_err(MatchError::from)
    }

    pub fn weight(&self, criterion: Criterion) -> u8 {
        match criterion {
            Criterion::Gender => self.gender_weight,
            Criterion::StageOfLife => self.stage_of_life_weight,
            Criterion::Season => self.season_weight,
            Criterion::FamilyStage => self.family_stage_weight,
            Criterion::Age => self.age_weight,
            Criterion::Location => self.location_weight,
            Criterion::Interests => self.interests_weight,
            Criterion::Availability => self.availability_weight,
        }
    }

    pub fn is_hard(&self, criterion: Criterion) -> bool {
        match criterion {
            Criterion::Gender => self.gender_hard,
            Criterion::StageOfLife => self.stage_of_life_hard,
            Criterion::Season => self.season_hard,
            Criterion::FamilyStage => self.family_stage_hard,
            Criterion::Age => self.age_hard,
            Criterion::Location => self.location_hard,
            Criterion::Interests | Criterion::Availability => false,
        }
    }

    /// Alignment for categorical criteria; other criteria always reward similarity
    pub fn alignment(&self, criterion: Criterion) -> Alignment {
        match criterion {
            Criterion::Gender => self.gender_alignment,
            Criterion::StageOfLife => self.stage_of_life_alignment,
            Criterion::Season => self.season_alignment,
            Criterion::FamilyStage => self.family_stage_alignment,
            _ => Alignment::Same,
        }
    }

    fn set_weight(&mut self, criterion: Criterion, weight: u8) {
        let slot = match criterion {
            Criterion::Gender => &mut self.gender_weight,
            Criterion::StageOfLife => &mut self.stage_of_life_weight,
            Criterion::Season => &mut self.season_weight,
            Criterion::FamilyStage => &mut self.family_stage_weight,
            Criterion::Age => &mut self.age_weight,
            Criterion::Location => &mut self.location_weight,
            Criterion::Interests => &mut self.interests_weight,
            Criterion::Availability => &mut self.availability_weight,
        };
        *slot = weight;
    }

    fn set_hard(&mut self, criterion: Criterion, hard: bool) {
        match criterion {
            Criterion::Gender => self.gender_hard = hard,
            Criterion::StageOfLife => self.stage_of_life_hard = hard,
            Criterion::Season => self.season_hard = hard,
            Criterion::FamilyStage => self.family_stage_hard = hard,
            Criterion::Age => self.age_hard = hard,
            Criterion::Location => self.location_hard = hard,
            Criterion::Interests | Criterion::Availability => {}
        }
    }

    fn set_alignment(&mut self, criterion: Criterion, alignment: Alignment) {
        match criterion {
            Criterion::Gender => self.gender_alignment = alignment,
            Criterion::StageOfLife => self.stage_of_life_alignment = alignment,
            Criterion::Season => self.season_alignment = alignment,
            Criterion::FamilyStage => self.family_stage_alignment = alignment,
            _ => {}
        }
    }
}

/// Fluent construction of a [`MatchingPolicy`], validated on `build`
#[derive(Debug, Clone)]
pub struct MatchingPolicyBuilder {
    policy: MatchingPolicy,
}

impl MatchingPolicyBuilder {
    pub fn new(zone_id: impl Into<String>) -> Self {
        Self {
            policy: MatchingPolicy {
                zone_id: zone_id.into(),
                ..MatchingPolicy::default()
            },
        }
    }

    pub fn mode(mut self, mode: PolicyMode) -> Self {
        self.policy.mode = mode;
        self
    }

    pub fn group_size(mut self, size: usize) -> Self {
        self.policy.default_group_size = size;
        self
    }

    pub fn family_group_size(mut self, size: usize) -> Self {
        self.policy.family_group_size = size;
        self
    }

    pub fn weight(mut self, criterion: Criterion, weight: u8) -> Self {
        self.policy.set_weight(criterion, weight);
        self
    }

    /// Set every criterion weight to zero (pure-constraint mode)
    pub fn clear_weights(mut self) -> Self {
        for criterion in Criterion::ALL {
            self.policy.set_weight(criterion, 0);
        }
        self
    }

    pub fn hard(mut self, criterion: Criterion, hard: bool) -> Self {
        self.policy.set_hard(criterion, hard);
        self
    }

    pub fn alignment(mut self, criterion: Criterion, alignment: Alignment) -> Self {
        self.policy.set_alignment(criterion, alignment);
        self
    }

    pub fn single_gender<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.gender_mode = GenderMode::Single;
        self.policy.gender_allowed = allowed.into_iter().map(Into::into).collect();
        self
    }

    pub fn mixed_gender(mut self) -> Self {
        self.policy.gender_mode = GenderMode::Mixed;
        self.policy.gender_allowed.clear();
        self
    }

    pub fn location(mut self, scope: LocationScope, max_distance_miles: f64) -> Self {
        self.policy.location_scope = scope;
        self.policy.max_distance_miles = max_distance_miles;
        self
    }

    pub fn fallback(mut self, strategy: FallbackStrategy) -> Self {
        self.policy.fallback_strategy = strategy;
        self
    }

    pub fn build(self) -> Result<MatchingPolicy, MatchError> {
        self.policy.ensure_valid()?;
        Ok(self.policy)
    }
}

/// Partial policy merged onto a zone's stored policy before a simulation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyOverrides {
    pub mode: Option<PolicyMode>,
    pub default_group_size: Option<usize>,
    pub family_group_size: Option<usize>,
    pub gender_weight: Option<u8>,
    pub gender_hard: Option<bool>,
    pub gender_alignment: Option<Alignment>,
    pub gender_mode: Option<GenderMode>,
    pub gender_allowed: Option<BTreeSet<String>>,
    pub stage_of_life_weight: Option<u8>,
    pub stage_of_life_hard: Option<bool>,
    pub stage_of_life_alignment: Option<Alignment>,
    pub season_weight: Option<u8>,
    pub season_hard: Option<bool>,
    pub season_alignment: Option<Alignment>,
    pub family_stage_weight: Option<u8>,
    pub family_stage_hard: Option<bool>,
    pub family_stage_alignment: Option<Alignment>,
    pub age_weight: Option<u8>,
    pub age_hard: Option<bool>,
    pub location_weight: Option<u8>,
    pub location_hard: Option<bool>,
    pub location_scope: Option<LocationScope>,
    pub max_distance_miles: Option<f64>,
    pub interests_weight: Option<u8>,
    pub availability_weight: Option<u8>,
    pub fallback_strategy: Option<FallbackStrategy>,
}

macro_rules! merge_fields {
    ($target:ident, $overrides:ident, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$overrides.$field {
                $target.$field = value.clone();
            }
        )+
    };
}

impl PolicyOverrides {
    pub fn is_empty(&self) -> bool {
        *self == PolicyOverrides::default()
    }

    /// Merge onto `base` and validate the result
    pub fn apply(&self, base: &MatchingPolicy) -> Result<MatchingPolicy, MatchError> {
        let mut policy = base.clone();
        let overrides = self;
        merge_fields!(
            policy,
            overrides,
            mode,
            default_group_size,
            family_group_size,
            gender_weight,
            gender_hard,
            gender_alignment,
            gender_mode,
            gender_allowed,
            stage_of_life_weight,
            stage_of_life_hard,
            stage_of_life_alignment,
            season_weight,
            season_hard,
            season_alignment,
            family_stage_weight,
            family_stage_hard,
            family_stage_alignment,
            age_weight,
            age_hard,
            location_weight,
            location_hard,
            location_scope,
            max_distance_miles,
            interests_weight,
            availability_weight,
            fallback_strategy,
        );
        policy.ensure_valid()?;
        Ok(policy)
    }
}
