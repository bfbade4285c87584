use std::collections::BTreeSet;

use chrono::Utc;
use uuid::Uuid;

use crate::engine::fallback::{resolve, Resolution};
use crate::engine::filters::missing_required;
use crate::engine::plan::MatchPlan;
use crate::engine::scoring::PairTable;
use crate::engine::solver::{form_groups, FormedGroup, SolverSettings};
use crate::error::MatchError;
use crate::models::{
    ExcludedMember, Group, GroupStatus, MatchingPolicy, Member, Placement, PolicyMode,
    RunDiagnostics, RunOutcome, SimulationDetails, SimulationResult, WaitlistEntry,
    WaitlistReason, ZoneDirectory,
};

/// Namespace for run fingerprints and group ids
const RUN_NAMESPACE: Uuid = Uuid::from_u128(0x6e65_6967_6862_6f72_6c79_2d6d_6174_6368);

/// A group before ids and timestamps are assigned
#[derive(Debug, Clone)]
struct DraftGroup {
    member_ids: Vec<String>,
    score: f64,
    target_size: usize,
    placement: Placement,
}

/// Everything a run decides, independent of how it is reported
#[derive(Debug, Clone)]
struct MatchRun {
    groups: Vec<DraftGroup>,
    waitlist: Vec<WaitlistEntry>,
    excluded: Vec<ExcludedMember>,
    diagnostics: RunDiagnostics,
}

/// Matching orchestrator
///
/// # Pipeline Stages
/// 1. Policy and pool validation
/// 2. Missing-data exclusion for hard-constrained criteria
/// 3. Pair scoring under the compiled plan
/// 4. Group formation and local improvement
/// 5. Fallback handling for unplaced members
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    settings: SolverSettings,
}

impl Matcher {
    pub fn new(settings: SolverSettings) -> Self {
        Self { settings }
    }

    pub fn with_default_settings() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    /// Dry run: report what `generate` would produce without building groups
    pub fn simulate(
        &self,
        policy: &MatchingPolicy,
        pool: &[Member],
        zones: &ZoneDirectory,
    ) -> Result<SimulationResult, MatchError> {
        let run = self.run(policy, pool, zones)?;

        tracing::info!(
            zone_id = %policy.zone_id,
            eligible = run.diagnostics.eligible,
            potential_groups = run.groups.len(),
            waitlisted = run.waitlist.len(),
            "Simulation complete"
        );

        Ok(SimulationResult {
            eligible_members: run.diagnostics.eligible,
            potential_groups: run.groups.len(),
            waitlist_members: run.waitlist.len(),
            simulation_details: SimulationDetails {
                diagnostics: run.diagnostics,
                policy: policy.clone(),
            },
        })
    }

    /// Form groups for the pool; the caller decides whether to persist them
    pub fn generate(
        &self,
        policy: &MatchingPolicy,
        pool: &[Member],
        zones: &ZoneDirectory,
    ) -> Result<RunOutcome, MatchError> {
        let run = self.run(policy, pool, zones)?;
        let fingerprint = fingerprint(policy, pool, zones)?;

        let status = match policy.mode {
            PolicyMode::Automatic => GroupStatus::Active,
            PolicyMode::ReviewRequired => GroupStatus::PendingApproval,
        };
        let created_at = Utc::now();

        let groups: Vec<Group> = run
            .groups
            .into_iter()
            .enumerate()
            .map(|(ordinal, draft)| Group {
                id: Uuid::new_v5(&RUN_NAMESPACE, format!("{}:{}", fingerprint, ordinal).as_bytes()),
                zone_id: policy.zone_id.clone(),
                member_ids: draft.member_ids,
                compatibility_score: draft.score,
                target_size: draft.target_size,
                status,
                formed_by: draft.placement,
                created_at,
            })
            .collect();

        tracing::info!(
            zone_id = %policy.zone_id,
            %fingerprint,
            groups = groups.len(),
            waitlisted = run.waitlist.len(),
            excluded = run.excluded.len(),
            average_compatibility = run.diagnostics.average_compatibility,
            "Match generation complete"
        );

        Ok(RunOutcome {
            zone_id: policy.zone_id.clone(),
            fingerprint: fingerprint.to_string(),
            groups,
            waitlist: run.waitlist,
            excluded: run.excluded,
            diagnostics: run.diagnostics,
            no_op: false,
        })
    }

    fn run(
        &self,
        policy: &MatchingPolicy,
        pool: &[Member],
        zones: &ZoneDirectory,
    ) -> Result<MatchRun, MatchError> {
        policy.ensure_valid()?;
        validate_pool(pool)?;

        let plan = MatchPlan::compile(policy, zones);

        let mut excluded = Vec::new();
        let mut eligible: Vec<&Member> = Vec::with_capacity(pool.len());
        for member in pool {
            let missing = missing_required(&plan, member);
            if missing.is_empty() {
                eligible.push(member);
            } else {
                excluded.push(ExcludedMember {
                    member_id: member.id.clone(),
                    missing,
                });
            }
        }
        // Canonical order makes every tie-break independent of input order
        eligible.sort_by(|a, b| a.id.cmp(&b.id));

        tracing::debug!(
            zone_id = %policy.zone_id,
            total_pool = pool.len(),
            eligible = eligible.len(),
            excluded = excluded.len(),
            "Pool partitioned"
        );

        let table = PairTable::build(&plan, &eligible, self.settings.parallel_threshold);

        // A pool smaller than one group forms nothing; relaxing rules cannot grow it
        let (mut formed, resolution, improvement_passes, budget_exhausted) =
            if eligible.len() < policy.default_group_size {
                tracing::info!(
                    zone_id = %policy.zone_id,
                    eligible = eligible.len(),
                    default_group_size = policy.default_group_size,
                    "Eligible pool smaller than one group; waitlisting everyone"
                );
                let resolution = Resolution {
                    waitlist: (0..eligible.len()).collect(),
                    ..Resolution::default()
                };
                (Vec::new(), resolution, 0, false)
            } else {
                let outcome = form_groups(&plan, &eligible, &table, &self.settings, Placement::Solver);
                let mut formed = outcome.groups;
                let resolution =
                    resolve(&plan, &eligible, &table, &mut formed, outcome.leftover, &self.settings);
                (formed, resolution, outcome.improvement_passes, outcome.budget_exhausted)
            };

        let waitlist: Vec<WaitlistEntry> = resolution
            .waitlist
            .iter()
            .map(|&i| WaitlistEntry {
                member_id: eligible[i].id.clone(),
                reason: waitlist_reason(&table, i),
            })
            .collect();

        let diagnostics = diagnose(
            policy,
            pool.len(),
            eligible.len(),
            excluded.len(),
            &formed,
            &waitlist,
            &resolution,
            improvement_passes,
            budget_exhausted,
        );
        debug_assert!(diagnostics.is_conserved());
        if !diagnostics.is_conserved() {
            tracing::error!(?diagnostics, "Member accounting does not add up to the pool size");
        }

        let groups = formed
            .into_iter()
            .map(|group| {
                let mut member_ids: Vec<String> =
                    group.members.iter().map(|&i| eligible[i].id.clone()).collect();
                member_ids.sort();
                DraftGroup {
                    member_ids,
                    score: group.score,
                    target_size: group.target_size,
                    placement: group.placement,
                }
            })
            .collect();

        Ok(MatchRun {
            groups,
            waitlist,
            excluded,
            diagnostics,
        })
    }
}

/// Reject empty or duplicate ids and coordinates off the globe
fn validate_pool(pool: &[Member]) -> Result<(), MatchError> {
    let mut seen = BTreeSet::new();
    for member in pool {
        if member.id.trim().is_empty() {
            return Err(MatchError::InvalidMember {
                member_id: member.id.clone(),
                reason: "member id must not be empty".to_string(),
            });
        }
        if !seen.insert(member.id.as_str()) {
            return Err(MatchError::DuplicateMember(member.id.clone()));
        }
        if let Some(point) = member.location.as_ref().and_then(|l| l.coordinates) {
            let valid = point.latitude.is_finite()
                && point.longitude.is_finite()
                && (-90.0..=90.0).contains(&point.latitude)
                && (-180.0..=180.0).contains(&point.longitude);
            if !valid {
                return Err(MatchError::InvalidMember {
                    member_id: member.id.clone(),
                    reason: format!(
                        "coordinates ({}, {}) are out of range",
                        point.latitude, point.longitude
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Reasons come from the strict plan, even when a fallback ran
fn waitlist_reason(table: &PairTable, i: usize) -> WaitlistReason {
    if !table.is_admissible(i) {
        WaitlistReason::MemberRule
    } else if !table.has_partner(i) {
        WaitlistReason::NoFeasiblePartner
    } else {
        WaitlistReason::InsufficientPool
    }
}

#[allow(clippy::too_many_arguments)]
fn diagnose(
    policy: &MatchingPolicy,
    total_pool: usize,
    eligible: usize,
    excluded_missing_data: usize,
    groups: &[FormedGroup],
    waitlist: &[WaitlistEntry],
    resolution: &Resolution,
    improvement_passes: usize,
    budget_exhausted: bool,
) -> RunDiagnostics {
    let grouped_members = groups.iter().map(FormedGroup::len).sum();
    let excluded_by_constraint = waitlist.iter().filter(|w| w.reason.is_constraint()).count();
    let average_compatibility = if groups.is_empty() {
        0.0
    } else {
        groups.iter().map(|g| g.score).sum::<f64>() / groups.len() as f64
    };

    RunDiagnostics {
        total_pool,
        eligible,
        excluded_missing_data,
        excluded_by_constraint,
        insufficient_pool: waitlist.len() - excluded_by_constraint,
        grouped_members,
        waitlisted: waitlist.len(),
        groups_formed: groups.len(),
        placed_by_fallback: resolution.placed,
        average_compatibility,
        improvement_passes: improvement_passes + resolution.improvement_passes,
        search_budget_exhausted: budget_exhausted || resolution.budget_exhausted,
        fallback_strategy: policy.fallback_strategy,
    }
}

/// Stable digest of everything a run depends on, independent of pool order
///
/// The zone directory is included because it changes distances between
/// zone-located members.
pub fn fingerprint(
    policy: &MatchingPolicy,
    pool: &[Member],
    zones: &ZoneDirectory,
) -> Result<Uuid, MatchError> {
    let mut members: Vec<&Member> = pool.iter().collect();
    members.sort_by(|a, b| a.id.cmp(&b.id));

    let bytes = serde_json::to_vec(&(policy, members, zones))
        .map_err(|e| MatchError::InvalidPolicy(format!("policy is not serializable: {}", e)))?;
    Ok(Uuid::new_v5(&RUN_NAMESPACE, &bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeGroup, Criterion, FallbackStrategy, FamilyStage, Location};

    fn member(id: &str, stage: FamilyStage) -> Member {
        Member::new(id)
            .with_age_group(AgeGroup::From30To39)
            .with_family_stage(stage)
            .with_location(Location::point(40.7128, -74.0060))
    }

    #[test]
    fn test_generate_assigns_status_from_mode() {
        let zones = ZoneDirectory::new();
        let pool: Vec<Member> = (0..4).map(|i| member(&format!("m{}", i), FamilyStage::Couple)).collect();
        let matcher = Matcher::with_default_settings();

        let review = MatchingPolicy::builder("zone-1").build().unwrap();
        let outcome = matcher.generate(&review, &pool, &zones).unwrap();
        assert!(outcome.groups.iter().all(|g| g.status == GroupStatus::PendingApproval));

        let automatic = review.to_builder().mode(PolicyMode::Automatic).build().unwrap();
        let outcome = matcher.generate(&automatic, &pool, &zones).unwrap();
        assert!(outcome.groups.iter().all(|g| g.status == GroupStatus::Active));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1").build().unwrap();
        let pool = vec![member("a", FamilyStage::Couple), member("a", FamilyStage::Retired)];

        let result = Matcher::default().generate(&policy, &pool, &zones);
        assert!(matches!(result, Err(MatchError::DuplicateMember(id)) if id == "a"));
    }

    #[test]
    fn test_out_of_range_coordinates_rejected() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1").build().unwrap();
        let pool = vec![Member::new("a").with_location(Location::point(95.0, 0.0))];

        let result = Matcher::default().simulate(&policy, &pool, &zones);
        assert!(matches!(result, Err(MatchError::InvalidMember { .. })));
    }

    #[test]
    fn test_missing_required_data_is_excluded() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1")
            .hard(Criterion::FamilyStage, true)
            .build()
            .unwrap();
        let pool = vec![
            member("a", FamilyStage::Couple),
            member("b", FamilyStage::Couple),
            Member::new("c").with_age_group(AgeGroup::From30To39),
        ];

        let outcome = Matcher::default().generate(&policy, &pool, &zones).unwrap();
        assert_eq!(outcome.excluded.len(), 1);
        assert_eq!(outcome.excluded[0].member_id, "c");
        assert_eq!(outcome.excluded[0].missing, vec![Criterion::FamilyStage]);
        assert_eq!(outcome.diagnostics.excluded_missing_data, 1);
        assert!(outcome.diagnostics.is_conserved());
    }

    #[test]
    fn test_fingerprint_ignores_pool_order() {
        let policy = MatchingPolicy::builder("zone-1").build().unwrap();
        let a = member("a", FamilyStage::Couple);
        let b = member("b", FamilyStage::Retired);

        let zones = ZoneDirectory::new();

        let forward = fingerprint(&policy, &[a.clone(), b.clone()], &zones).unwrap();
        let backward = fingerprint(&policy, &[b, a], &zones).unwrap();
        assert_eq!(forward, backward);

        let other = policy.to_builder().group_size(3).build().unwrap();
        let changed = fingerprint(&other, &[member("a", FamilyStage::Couple)], &zones).unwrap();
        assert_ne!(forward, changed);
    }

    #[test]
    fn test_fingerprint_tracks_zone_directory() {
        let policy = MatchingPolicy::builder("zone-1").build().unwrap();
        let pool = vec![
            Member::new("a").with_location(Location::zone("riverside")),
            Member::new("b").with_location(Location::zone("old-town")),
        ];
        let before = ZoneDirectory::new().with_neighbor("riverside", "old-town", 1.5);
        let after = ZoneDirectory::new().with_neighbor("riverside", "old-town", 12.0);

        let first = fingerprint(&policy, &pool, &before).unwrap();
        assert_eq!(first, fingerprint(&policy, &pool, &before.clone()).unwrap());
        assert_ne!(first, fingerprint(&policy, &pool, &after).unwrap());
    }

    #[test]
    fn test_pool_smaller_than_group_is_waitlisted() {
        let zones = ZoneDirectory::new();
        let pool: Vec<Member> = (0..3).map(|i| member(&format!("m{}", i), FamilyStage::Couple)).collect();

        for strategy in [
            FallbackStrategy::Waitlist,
            FallbackStrategy::FillPartial,
            FallbackStrategy::AutoRelax,
        ] {
            let policy = MatchingPolicy::builder("zone-1")
                .group_size(4)
                .fallback(strategy)
                .build()
                .unwrap();
            let result = Matcher::default().simulate(&policy, &pool, &zones).unwrap();
            let diagnostics = &result.simulation_details.diagnostics;

            assert_eq!(result.potential_groups, 0);
            assert_eq!(result.waitlist_members, 3);
            assert_eq!(diagnostics.insufficient_pool, 3);
            assert_eq!(diagnostics.placed_by_fallback, 0);
            assert!(diagnostics.is_conserved());
        }
    }

    #[test]
    fn test_group_ids_are_stable_across_runs() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1").group_size(2).build().unwrap();
        let pool: Vec<Member> = (0..4).map(|i| member(&format!("m{}", i), FamilyStage::Couple)).collect();
        let matcher = Matcher::default();

        let first = matcher.generate(&policy, &pool, &zones).unwrap();
        let second = matcher.generate(&policy, &pool, &zones).unwrap();
        let ids = |o: &RunOutcome| o.groups.iter().map(|g| g.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn test_empty_pool() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1").build().unwrap();

        let result = Matcher::default().simulate(&policy, &[], &zones).unwrap();
        assert_eq!(result.eligible_members, 0);
        assert_eq!(result.potential_groups, 0);
        assert_eq!(result.simulation_details.diagnostics.average_compatibility, 0.0);
    }
}
