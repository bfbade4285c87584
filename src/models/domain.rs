use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Ordered age buckets used by the age criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "18-29")]
    From18To29,
    #[serde(rename = "30-39")]
    From30To39,
    #[serde(rename = "40-49")]
    From40To49,
    #[serde(rename = "50-59")]
    From50To59,
    #[serde(rename = "60+")]
    SixtyPlus,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        AgeGroup::From18To29,
        AgeGroup::From30To39,
        AgeGroup::From40To49,
        AgeGroup::From50To59,
        AgeGroup::SixtyPlus,
    ];

    /// Number of buckets on the age scale
    pub const BUCKETS: usize = Self::ALL.len();

    /// Position of this bucket on the ordered scale
    pub fn index(self) -> usize {
        self as usize
    }

    /// Number of buckets between two age groups
    pub fn distance(self, other: AgeGroup) -> usize {
        self.index().abs_diff(other.index())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AgeGroup::From18To29 => "18-29",
            AgeGroup::From30To39 => "30-39",
            AgeGroup::From40To49 => "40-49",
            AgeGroup::From50To59 => "50-59",
            AgeGroup::SixtyPlus => "60+",
        }
    }
}

impl FromStr for AgeGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == s.trim())
            .ok_or_else(|| format!("unknown age group '{}'", s))
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Household stage of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FamilyStage {
    Single,
    Couple,
    YoungFamily,
    GrowingFamily,
    EmptyNester,
    Retired,
}

impl FamilyStage {
    pub const ALL: [FamilyStage; 6] = [
        FamilyStage::Single,
        FamilyStage::Couple,
        FamilyStage::YoungFamily,
        FamilyStage::GrowingFamily,
        FamilyStage::EmptyNester,
        FamilyStage::Retired,
    ];

    /// Households with children at home; these groups use `family_group_size`
    pub fn is_family(self) -> bool {
        matches!(self, FamilyStage::YoungFamily | FamilyStage::GrowingFamily)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FamilyStage::Single => "single",
            FamilyStage::Couple => "couple",
            FamilyStage::YoungFamily => "young-family",
            FamilyStage::GrowingFamily => "growing-family",
            FamilyStage::EmptyNester => "empty-nester",
            FamilyStage::Retired => "retired",
        }
    }
}

impl FromStr for FamilyStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| format!("unknown family stage '{}'", s))
    }
}

impl fmt::Display for FamilyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic coordinates in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Where a member lives: a zone, a point, or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

impl Location {
    pub fn zone(zone_id: impl Into<String>) -> Self {
        Self {
            zone_id: Some(zone_id.into()),
            coordinates: None,
        }
    }

    pub fn point(latitude: f64, longitude: f64) -> Self {
        Self {
            zone_id: None,
            coordinates: Some(Coordinates::new(latitude, longitude)),
        }
    }

    pub fn is_known(&self) -> bool {
        self.zone_id.is_some() || self.coordinates.is_some()
    }
}

/// Policy criteria, each bound to one member attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Gender,
    StageOfLife,
    Season,
    FamilyStage,
    Age,
    Location,
    Interests,
    Availability,
}

impl Criterion {
    pub const ALL: [Criterion; 8] = [
        Criterion::Gender,
        Criterion::StageOfLife,
        Criterion::Season,
        Criterion::FamilyStage,
        Criterion::Age,
        Criterion::Location,
        Criterion::Interests,
        Criterion::Availability,
    ];

    /// Criteria compared by equality (and therefore subject to same/mix alignment)
    pub fn is_categorical(self) -> bool {
        matches!(
            self,
            Criterion::Gender | Criterion::StageOfLife | Criterion::Season | Criterion::FamilyStage
        )
    }

    /// Criteria that carry a `*_hard` switch in the policy
    pub fn supports_hard(self) -> bool {
        !matches!(self, Criterion::Interests | Criterion::Availability)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Criterion::Gender => "gender",
            Criterion::StageOfLife => "stage_of_life",
            Criterion::Season => "season",
            Criterion::FamilyStage => "family_stage",
            Criterion::Age => "age",
            Criterion::Location => "location",
            Criterion::Interests => "interests",
            Criterion::Availability => "availability",
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A community member eligible for matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub age_group: Option<AgeGroup>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub family_stage: Option<FamilyStage>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub season_interest: Option<String>,
    #[serde(default)]
    pub group_interest: Option<String>,
    #[serde(default)]
    pub activities: BTreeSet<String>,
    #[serde(default)]
    pub availability: BTreeSet<String>,
}

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            age_group: None,
            location: None,
            family_stage: None,
            gender: None,
            season_interest: None,
            group_interest: None,
            activities: BTreeSet::new(),
            availability: BTreeSet::new(),
        }
    }

    pub fn with_age_group(mut self, age_group: AgeGroup) -> Self {
        self.age_group = Some(age_group);
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_family_stage(mut self, stage: FamilyStage) -> Self {
        self.family_stage = Some(stage);
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_season_interest(mut self, season: impl Into<String>) -> Self {
        self.season_interest = Some(season.into());
        self
    }

    pub fn with_group_interest(mut self, interest: impl Into<String>) -> Self {
        self.group_interest = Some(interest.into());
        self
    }

    pub fn with_activities<I, S>(mut self, activities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.activities = activities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_availability<I, S>(mut self, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.availability = slots.into_iter().map(Into::into).collect();
        self
    }

    /// Categorical value for an equality-compared criterion
    pub fn category(&self, criterion: Criterion) -> Option<&str> {
        match criterion {
            Criterion::Gender => self.gender.as_deref(),
            Criterion::StageOfLife => self.group_interest.as_deref(),
            Criterion::Season => self.season_interest.as_deref(),
            Criterion::FamilyStage => self.family_stage.map(FamilyStage::as_str),
            _ => None,
        }
    }

    /// Whether the attribute behind `criterion` is populated
    pub fn has(&self, criterion: Criterion) -> bool {
        match criterion {
            Criterion::Age => self.age_group.is_some(),
            Criterion::Location => self.location.as_ref().is_some_and(Location::is_known),
            Criterion::Interests => !self.activities.is_empty(),
            Criterion::Availability => !self.availability.is_empty(),
            categorical => self
                .category(categorical)
                .is_some_and(|value| !value.trim().is_empty()),
        }
    }

    pub fn is_family(&self) -> bool {
        self.family_stage.is_some_and(FamilyStage::is_family)
    }
}

/// Lifecycle state of a formed group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Draft,
    PendingApproval,
    Approved,
    Active,
}

impl GroupStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupStatus::Draft => "draft",
            GroupStatus::PendingApproval => "pending_approval",
            GroupStatus::Approved => "approved",
            GroupStatus::Active => "active",
        }
    }
}

/// Which stage of the pipeline created a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Solver,
    AutoRelax,
}

impl Placement {
    pub fn as_str(self) -> &'static str {
        match self {
            Placement::Solver => "solver",
            Placement::AutoRelax => "auto_relax",
        }
    }
}

/// A group of members produced by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub zone_id: String,
    pub member_ids: Vec<String>,
    pub compatibility_score: f64,
    pub target_size: usize,
    pub status: GroupStatus,
    pub formed_by: Placement,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Group {
    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}

/// Why a member ended up on the waitlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistReason {
    /// Hard constraints admit no partner anywhere in the eligible pool
    NoFeasiblePartner,
    /// The member alone violates a member-level rule (e.g. gender not allowed)
    MemberRule,
    /// Feasible partners existed but no group had room
    InsufficientPool,
}

impl WaitlistReason {
    pub fn as_str(self) -> &'static str {
        match self {
            WaitlistReason::NoFeasiblePartner => "no_feasible_partner",
            WaitlistReason::MemberRule => "member_rule",
            WaitlistReason::InsufficientPool => "insufficient_pool",
        }
    }

    pub fn is_constraint(self) -> bool {
        !matches!(self, WaitlistReason::InsufficientPool)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub member_id: String,
    pub reason: WaitlistReason,
}

/// A member dropped before scoring because a hard constraint needs data it lacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedMember {
    pub member_id: String,
    pub missing: Vec<Criterion>,
}
