// Property-style integration tests over seeded random pools

use neighborly_match::engine::{group_feasible, MatchPlan, Matcher, SolverSettings};
use neighborly_match::models::{
    AgeGroup, Alignment, Criterion, FallbackStrategy, FamilyStage, Location, LocationScope,
    MatchingPolicy, Member, Placement, RunOutcome, ZoneDirectory,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;

const SEEDS: u64 = 24;
const GENDERS: [&str; 3] = ["female", "male", "nonbinary"];
const SEASONS: [&str; 4] = ["spring", "summer", "autumn", "winter"];
const INTERESTS: [&str; 3] = ["social", "outdoors", "parenting"];
const ACTIVITIES: [&str; 6] = ["hiking", "cooking", "chess", "gardening", "yoga", "book-club"];
const ZONES: [&str; 3] = ["riverside", "old-town", "hillcrest"];

fn zone_directory() -> ZoneDirectory {
    ZoneDirectory::new()
        .with_neighbor("riverside", "old-town", 1.5)
        .with_neighbor("old-town", "hillcrest", 2.5)
}

fn maybe<T>(rng: &mut StdRng, value: T) -> Option<T> {
    if rng.gen_bool(0.85) {
        Some(value)
    } else {
        None
    }
}

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values[rng.gen_range(0..values.len())]
}

fn random_member(rng: &mut StdRng, i: usize) -> Member {
    let mut member = Member::new(format!("member-{:03}", i));

    let age = AgeGroup::ALL[rng.gen_range(0..AgeGroup::BUCKETS)];
    member.age_group = maybe(rng, age);
    let stage = FamilyStage::ALL[rng.gen_range(0..FamilyStage::ALL.len())];
    member.family_stage = maybe(rng, stage);
    let gender = pick(rng, &GENDERS).to_string();
    member.gender = maybe(rng, gender);
    let season = pick(rng, &SEASONS).to_string();
    member.season_interest = maybe(rng, season);
    let interest = pick(rng, &INTERESTS).to_string();
    member.group_interest = maybe(rng, interest);

    member.location = match rng.gen_range(0..4) {
        0 => None,
        1 => Some(Location::zone(pick(rng, &ZONES))),
        _ => Some(Location::point(
            40.70 + rng.gen_range(0.0..0.12),
            -74.00 + rng.gen_range(0.0..0.12),
        )),
    };

    let activity_count = rng.gen_range(0..3);
    member.activities = (0..activity_count)
        .map(|_| pick(rng, &ACTIVITIES).to_string())
        .collect();
    member
}

fn random_pool(rng: &mut StdRng) -> Vec<Member> {
    let size = rng.gen_range(0..48);
    (0..size).map(|i| random_member(rng, i)).collect()
}

fn random_policy(rng: &mut StdRng) -> MatchingPolicy {
    let mut builder = MatchingPolicy::builder("riverside")
        .group_size(rng.gen_range(2..=6))
        .family_group_size(rng.gen_range(2..=8));

    for criterion in Criterion::ALL {
        builder = builder.weight(criterion, rng.gen_range(0..=100));
        if criterion.supports_hard() {
            builder = builder.hard(criterion, rng.gen_bool(0.3));
        }
        if criterion.is_categorical() && rng.gen_bool(0.25) {
            builder = builder.alignment(criterion, Alignment::Mix);
        }
    }

    if rng.gen_bool(0.3) {
        builder = builder.single_gender(["female", "nonbinary"]);
    }

    let scope = if rng.gen_bool(0.3) {
        LocationScope::InsideOnly
    } else {
        LocationScope::NearbyOk
    };
    let fallback = [
        FallbackStrategy::Waitlist,
        FallbackStrategy::FillPartial,
        FallbackStrategy::AutoRelax,
    ][rng.gen_range(0..3)];

    builder
        .location(scope, rng.gen_range(1.0..10.0))
        .fallback(fallback)
        .build()
        .unwrap()
}

/// Pass cap only, so wall-clock jitter cannot change a result
fn matcher() -> Matcher {
    Matcher::new(SolverSettings {
        improvement_budget: Duration::from_secs(300),
        ..SolverSettings::default()
    })
}

fn partitions(outcome: &RunOutcome) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = outcome.groups.iter().map(|g| g.member_ids.clone()).collect();
    groups.sort();
    groups
}

fn for_each_case(mut check: impl FnMut(&MatchingPolicy, &[Member], &ZoneDirectory)) {
    let zones = zone_directory();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let policy = random_policy(&mut rng);
        let pool = random_pool(&mut rng);
        check(&policy, &pool, &zones);
    }
}

#[test]
fn test_every_member_is_accounted_for() {
    let matcher = matcher();
    for_each_case(|policy, pool, zones| {
        let outcome = matcher.generate(policy, pool, zones).unwrap();

        let grouped: usize = outcome.groups.iter().map(|g| g.len()).sum();
        assert_eq!(grouped + outcome.waitlist.len() + outcome.excluded.len(), pool.len());
        assert!(outcome.diagnostics.is_conserved());

        let mut seen: Vec<&str> = outcome
            .groups
            .iter()
            .flat_map(|g| g.member_ids.iter().map(String::as_str))
            .chain(outcome.waitlist.iter().map(|w| w.member_id.as_str()))
            .chain(outcome.excluded.iter().map(|e| e.member_id.as_str()))
            .collect();
        seen.sort();
        let mut expected: Vec<&str> = pool.iter().map(|m| m.id.as_str()).collect();
        expected.sort();
        assert_eq!(seen, expected);
    });
}

#[test]
fn test_committed_groups_satisfy_hard_constraints() {
    let matcher = matcher();
    for_each_case(|policy, pool, zones| {
        let outcome = matcher.generate(policy, pool, zones).unwrap();
        let plan = MatchPlan::compile(policy, zones);

        for group in outcome.groups.iter().filter(|g| g.formed_by == Placement::Solver) {
            let members: Vec<&Member> = group
                .member_ids
                .iter()
                .filter_map(|id| pool.iter().find(|m| &m.id == id))
                .collect();
            assert_eq!(members.len(), group.len());
            assert!(group_feasible(&plan, &members), "group {:?} breaks a hard rule", group.member_ids);
        }
    });
}

#[test]
fn test_group_sizes_stay_in_bounds() {
    let matcher = matcher();
    for_each_case(|policy, pool, zones| {
        let outcome = matcher.generate(policy, pool, zones).unwrap();
        for group in &outcome.groups {
            assert!(group.len() >= 2);
            assert!(group.len() <= group.target_size);
            assert!(
                group.target_size == policy.default_group_size
                    || group.target_size == policy.family_group_size
            );
        }
    });
}

#[test]
fn test_runs_are_deterministic() {
    let matcher = matcher();
    for_each_case(|policy, pool, zones| {
        let first = matcher.generate(policy, pool, zones).unwrap();
        let second = matcher.generate(policy, pool, zones).unwrap();
        assert_eq!(partitions(&first), partitions(&second));
        assert_eq!(first.waitlist, second.waitlist);
        assert_eq!(first.fingerprint, second.fingerprint);
    });
}

#[test]
fn test_pool_order_does_not_matter() {
    let matcher = matcher();
    let mut rng = StdRng::seed_from_u64(99);
    for_each_case(|policy, pool, zones| {
        let mut shuffled = pool.to_vec();
        shuffled.shuffle(&mut rng);

        let original = matcher.generate(policy, pool, zones).unwrap();
        let reordered = matcher.generate(policy, &shuffled, zones).unwrap();
        assert_eq!(partitions(&original), partitions(&reordered));
        assert_eq!(original.fingerprint, reordered.fingerprint);
    });
}

#[test]
fn test_simulation_matches_generation() {
    let matcher = matcher();
    for_each_case(|policy, pool, zones| {
        let before = matcher.generate(policy, pool, zones).unwrap();
        let simulated = matcher.simulate(policy, pool, zones).unwrap();
        let after = matcher.generate(policy, pool, zones).unwrap();

        assert_eq!(partitions(&before), partitions(&after));
        assert_eq!(simulated.potential_groups, before.groups.len());
        assert_eq!(simulated.waitlist_members, before.waitlist.len());
        assert_eq!(simulated.simulation_details.diagnostics, before.diagnostics);
        assert_eq!(&simulated.simulation_details.policy, policy);
    });
}

#[test]
fn test_relaxing_to_soft_recovers_infeasible_pools() {
    let matcher = matcher();
    let zones = ZoneDirectory::new();

    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        // Members spread far enough apart that a tight radius blocks every pair
        let pool: Vec<Member> = (0..rng.gen_range(4..20))
            .map(|i| {
                Member::new(format!("m{:02}", i))
                    .with_age_group(AgeGroup::ALL[rng.gen_range(0..AgeGroup::BUCKETS)])
                    .with_location(Location::point(40.0 + i as f64 * 0.3, -74.0))
            })
            .collect();

        let hard = MatchingPolicy::builder("riverside")
            .group_size(rng.gen_range(2..=5))
            .hard(Criterion::Location, true)
            .location(LocationScope::NearbyOk, 3.0)
            .build()
            .unwrap();
        let soft = hard.to_builder().hard(Criterion::Location, false).build().unwrap();

        let strict = matcher.simulate(&hard, &pool, &zones).unwrap();
        let relaxed = matcher.simulate(&soft, &pool, &zones).unwrap();
        assert_eq!(strict.potential_groups, 0);
        assert!(relaxed.potential_groups >= strict.potential_groups);
        assert!(relaxed.waitlist_members <= strict.waitlist_members);
    }
}
