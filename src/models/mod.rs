// Model exports
pub mod domain;
pub mod policy;
pub mod requests;
pub mod responses;
pub mod zones;

pub use domain::{
    AgeGroup, Coordinates, Criterion, ExcludedMember, FamilyStage, Group, GroupStatus, Location,
    Member, Placement, WaitlistEntry, WaitlistReason,
};
pub use policy::{
    Alignment, FallbackStrategy, GenderMode, LocationScope, MatchingPolicy, MatchingPolicyBuilder,
    PolicyMode, PolicyOverrides,
};
pub use requests::GenerateMatchesRequest;
pub use responses::{
    ErrorResponse, HealthResponse, RunDiagnostics, RunOutcome, SimulationDetails, SimulationResult,
};
pub use zones::{ZoneDirectory, ZoneDirectoryError};
