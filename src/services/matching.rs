use std::sync::Arc;

use crate::engine::Matcher;
use crate::error::MatchError;
use crate::models::{MatchingPolicy, PolicyOverrides, RunOutcome, SimulationResult, ZoneDirectory};
use crate::services::cache::{CacheKey, CacheManager};
use crate::services::store::MatchStore;

/// The two operations the application exposes around the engine
///
/// Loads policy and members from the store, runs the stateless engine, and
/// for committed runs persists the outcome unless it repeats the last one.
pub struct MatchService<S> {
    store: Arc<S>,
    cache: Arc<CacheManager>,
    zones: Arc<ZoneDirectory>,
    matcher: Matcher,
}

impl<S> Clone for MatchService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            zones: Arc::clone(&self.zones),
            matcher: self.matcher.clone(),
        }
    }
}

impl<S: MatchStore> MatchService<S> {
    pub fn new(store: Arc<S>, cache: Arc<CacheManager>, zones: Arc<ZoneDirectory>, matcher: Matcher) -> Self {
        Self {
            store,
            cache,
            zones,
            matcher,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Dry run against the stored policy with `overrides` merged on top
    ///
    /// Read-only: neither the store nor the cache is written.
    pub async fn simulate_matching(
        &self,
        zone_id: &str,
        overrides: &PolicyOverrides,
    ) -> Result<SimulationResult, MatchError> {
        let stored = self.stored_policy(zone_id).await?;
        let policy = overrides.apply(&stored)?;
        let members = self.store.load_members(zone_id).await?;

        tracing::debug!(zone_id, members = members.len(), overrides = !overrides.is_empty(), "Simulating matching");

        self.matcher.simulate(&policy, &members, &self.zones)
    }

    /// Form and persist groups for a zone
    ///
    /// An explicit `snapshot` is validated and used for the run; it is saved as
    /// the zone's policy together with the run. Otherwise the stored policy is used.
    pub async fn generate_matches(
        &self,
        zone_id: &str,
        snapshot: Option<MatchingPolicy>,
    ) -> Result<RunOutcome, MatchError> {
        let from_snapshot = snapshot.is_some();
        let policy = match snapshot {
            Some(policy) => {
                if policy.zone_id != zone_id {
                    return Err(MatchError::ZoneMismatch {
                        zone_id: zone_id.to_string(),
                        policy_zone: policy.zone_id,
                    });
                }
                policy.ensure_valid()?;
                policy
            }
            None => self.stored_policy(zone_id).await?,
        };

        let members = self.store.load_members(zone_id).await?;
        let mut outcome = self.matcher.generate(&policy, &members, &self.zones)?;

        if self.last_fingerprint(zone_id).await?.as_deref() == Some(outcome.fingerprint.as_str()) {
            tracing::info!(zone_id, fingerprint = %outcome.fingerprint, "Pool and policy unchanged; skipping persistence");
            outcome.no_op = true;
            return Ok(outcome);
        }

        // The snapshot becomes the zone's policy only once a run succeeded with it
        if from_snapshot {
            self.store.save_policy(&policy).await?;
        }
        self.store.save_run(&outcome).await?;

        let key = CacheKey::run_fingerprint(zone_id);
        if let Err(e) = self.cache.set(&key, &outcome.fingerprint).await {
            tracing::warn!("Failed to cache run fingerprint for {}: {}", zone_id, e);
        }

        Ok(outcome)
    }

    async fn stored_policy(&self, zone_id: &str) -> Result<MatchingPolicy, MatchError> {
        self.store
            .load_policy(zone_id)
            .await?
            .ok_or_else(|| MatchError::ZoneNotFound(zone_id.to_string()))
    }

    /// Last committed fingerprint: cache first, then the store
    async fn last_fingerprint(&self, zone_id: &str) -> Result<Option<String>, MatchError> {
        let key = CacheKey::run_fingerprint(zone_id);
        if let Some(fingerprint) = self.cache.lookup::<String>(&key).await {
            return Ok(Some(fingerprint));
        }
        Ok(self.store.last_run_fingerprint(zone_id).await?)
    }
}
