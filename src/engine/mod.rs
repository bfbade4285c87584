// Matching engine exports
pub mod distance;
pub mod fallback;
pub mod filters;
pub mod matcher;
pub mod normalizer;
pub mod plan;
pub mod scoring;
pub mod solver;

pub use distance::{calculate_bounding_box, haversine_miles, is_within_bounding_box, location_distance};
pub use filters::{group_feasible, missing_required, pair_feasible};
pub use matcher::{fingerprint, Matcher};
pub use plan::MatchPlan;
pub use scoring::{group_score, pair_score, PairTable};
pub use solver::{form_groups, FormedGroup, SolverOutcome, SolverSettings};
