use thiserror::Error;

use crate::services::StoreError;

/// Errors surfaced by the matching engine and the service around it
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("Invalid member '{member_id}': {reason}")]
    InvalidMember { member_id: String, reason: String },

    #[error("Duplicate member id in pool: {0}")]
    DuplicateMember(String),

    #[error("Policy is scoped to zone '{policy_zone}' but the run targets zone '{zone_id}'")]
    ZoneMismatch { zone_id: String, policy_zone: String },

    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl MatchError {
    /// Errors caused by caller input rather than infrastructure
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MatchError::InvalidPolicy(_)
                | MatchError::InvalidMember { .. }
                | MatchError::DuplicateMember(_)
                | MatchError::ZoneMismatch { .. }
        )
    }
}

impl From<validator::ValidationErrors> for MatchError {
    fn from(errors: validator::ValidationErrors) -> Self {
        MatchError::InvalidPolicy(errors.to_string())
    }
}
