use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::policy::MatchingPolicy;

/// Request to generate matches for a zone
///
/// `policy` carries the UI-configured snapshot; when absent the zone's stored
/// policy is used as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct GenerateMatchesRequest {
    #[serde(default)]
    #[validate(nested)]
    pub policy: Option<MatchingPolicy>,
}
