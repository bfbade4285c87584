use serde::{Deserialize, Serialize};

use crate::models::domain::{ExcludedMember, Group, WaitlistEntry};
use crate::models::policy::{FallbackStrategy, MatchingPolicy};

/// Counts describing where every member of the input pool ended up
///
/// `grouped_members + waitlisted + excluded_missing_data == total_pool` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    pub total_pool: usize,
    pub eligible: usize,
    pub excluded_missing_data: usize,
    pub excluded_by_constraint: usize,
    pub insufficient_pool: usize,
    pub grouped_members: usize,
    pub waitlisted: usize,
    pub groups_formed: usize,
    pub placed_by_fallback: usize,
    pub average_compatibility: f64,
    pub improvement_passes: usize,
    pub search_budget_exhausted: bool,
    pub fallback_strategy: FallbackStrategy,
}

impl RunDiagnostics {
    pub fn is_conserved(&self) -> bool {
        self.grouped_members + self.waitlisted + self.excluded_missing_data == self.total_pool
    }
}

/// Breakdown returned alongside simulation counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationDetails {
    #[serde(flatten)]
    pub diagnostics: RunDiagnostics,
    pub policy: MatchingPolicy,
}

/// Outcome of a dry run; never persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub eligible_members: usize,
    pub potential_groups: usize,
    pub waitlist_members: usize,
    pub simulation_details: SimulationDetails,
}

/// Outcome of a committed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub zone_id: String,
    pub fingerprint: String,
    pub groups: Vec<Group>,
    pub waitlist: Vec<WaitlistEntry>,
    pub excluded: Vec<ExcludedMember>,
    pub diagnostics: RunDiagnostics,
    /// Set by the caller when the pool and policy match the last committed run
    #[serde(default)]
    pub no_op: bool,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}
