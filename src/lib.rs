//! Neighborly Match - group formation engine for neighborhood communities
//!
//! Partitions a zone's member pool into small compatible groups under an
//! administrator-configured policy of weighted and hard criteria, and exposes
//! the engine as a simulate/generate service.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use engine::{Matcher, SolverSettings};
pub use error::MatchError;
pub use models::{
    Group, MatchingPolicy, Member, PolicyOverrides, RunOutcome, SimulationResult, ZoneDirectory,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let policy = MatchingPolicy::builder("zone-1").build().unwrap();
        let result = Matcher::with_default_settings()
            .simulate(&policy, &[], &ZoneDirectory::new())
            .unwrap();
        assert_eq!(result.potential_groups, 0);
    }
}
