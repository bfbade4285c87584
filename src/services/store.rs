use std::collections::BTreeMap;
use std::future::Future;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{GroupStatus, MatchingPolicy, Member, RunOutcome};

/// Errors that can occur when reading or writing match data
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid stored value in {column}: {reason}")]
    Decode { column: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Persistence the matching service needs from the surrounding application
///
/// The engine never sees this trait; the service materializes a member pool
/// and a policy, runs the engine, and hands the outcome back here.
pub trait MatchStore: Send + Sync + 'static {
    fn load_policy(
        &self,
        zone_id: &str,
    ) -> impl Future<Output = Result<Option<MatchingPolicy>, StoreError>> + Send;

    fn save_policy(&self, policy: &MatchingPolicy) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Members of the zone not already committed to an approved or active group
    fn load_members(&self, zone_id: &str) -> impl Future<Output = Result<Vec<Member>, StoreError>> + Send;

    /// Replace the zone's un-approved groups and waitlist with the outcome
    fn save_run(&self, outcome: &RunOutcome) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn last_run_fingerprint(
        &self,
        zone_id: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    fn health_check(&self) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    policies: BTreeMap<String, MatchingPolicy>,
    members: BTreeMap<String, Vec<Member>>,
    runs: BTreeMap<String, Vec<RunOutcome>>,
}

/// In-process store for tests and local development
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_policy(&self, policy: MatchingPolicy) {
        let mut state = self.state.write().await;
        state.policies.insert(policy.zone_id.clone(), policy);
    }

    pub async fn insert_members(&self, zone_id: &str, members: Vec<Member>) {
        let mut state = self.state.write().await;
        state.members.entry(zone_id.to_string()).or_default().extend(members);
    }

    /// Every run saved for the zone, oldest first
    pub async fn runs(&self, zone_id: &str) -> Vec<RunOutcome> {
        let state = self.state.read().await;
        state.runs.get(zone_id).cloned().unwrap_or_default()
    }
}

impl MatchStore for MemoryStore {
    async fn load_policy(&self, zone_id: &str) -> Result<Option<MatchingPolicy>, StoreError> {
        Ok(self.state.read().await.policies.get(zone_id).cloned())
    }

    async fn save_policy(&self, policy: &MatchingPolicy) -> Result<(), StoreError> {
        self.insert_policy(policy.clone()).await;
        Ok(())
    }

    async fn load_members(&self, zone_id: &str) -> Result<Vec<Member>, StoreError> {
        let state = self.state.read().await;
        let committed: Vec<&str> = state
            .runs
            .get(zone_id)
            .into_iter()
            .flatten()
            .flat_map(|run| &run.groups)
            .filter(|g| matches!(g.status, GroupStatus::Approved | GroupStatus::Active))
            .flat_map(|g| g.member_ids.iter().map(String::as_str))
            .collect();

        Ok(state
            .members
            .get(zone_id)
            .into_iter()
            .flatten()
            .filter(|m| !committed.contains(&m.id.as_str()))
            .cloned()
            .collect())
    }

    async fn save_run(&self, outcome: &RunOutcome) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .runs
            .entry(outcome.zone_id.clone())
            .or_default()
            .push(outcome.clone());
        Ok(())
    }

    async fn last_run_fingerprint(&self, zone_id: &str) -> Result<Option<String>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .runs
            .get(zone_id)
            .and_then(|runs| runs.last())
            .map(|run| run.fingerprint.clone()))
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}
