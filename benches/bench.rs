// Criterion benchmarks for the matching engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use neighborly_match::engine::{calculate_bounding_box, haversine_miles, MatchPlan, PairTable};
use neighborly_match::models::{AgeGroup, FamilyStage, Location, MatchingPolicy, Member};
use neighborly_match::{Matcher, ZoneDirectory};

const ACTIVITIES: [&str; 6] = ["hiking", "cooking", "chess", "gardening", "yoga", "book-club"];

fn create_member(i: usize) -> Member {
    let lat_offset = (i as f64 * 0.0007) % 0.08;
    let lon_offset = (i as f64 * 0.0011) % 0.08;
    Member::new(format!("member-{:05}", i))
        .with_age_group(AgeGroup::ALL[i % AgeGroup::BUCKETS])
        .with_family_stage(FamilyStage::ALL[(i / 3) % FamilyStage::ALL.len()])
        .with_location(Location::point(40.7128 + lat_offset, -74.0060 + lon_offset))
        .with_season_interest(if i % 2 == 0 { "summer" } else { "winter" })
        .with_activities([ACTIVITIES[i % 6], ACTIVITIES[(i * 7) % 6]])
}

fn create_pool(size: usize) -> Vec<Member> {
    (0..size).map(create_member).collect()
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_miles", |b| {
        b.iter(|| {
            haversine_miles(
                black_box(40.7128),
                black_box(-74.0060),
                black_box(40.72),
                black_box(-74.01),
            )
        });
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box(40.7128), black_box(-74.0060), black_box(10.0)));
    });
}

fn bench_pair_table(c: &mut Criterion) {
    let zones = ZoneDirectory::new();
    let policy = MatchingPolicy::default();
    let plan = MatchPlan::compile(&policy, &zones);
    let pool = create_pool(500);
    let members: Vec<&Member> = pool.iter().collect();

    let mut group = c.benchmark_group("pair_table_500");
    group.bench_function("sequential", |b| {
        b.iter(|| PairTable::build(black_box(&plan), black_box(&members), usize::MAX))
    });
    group.bench_function("parallel", |b| {
        b.iter(|| PairTable::build(black_box(&plan), black_box(&members), 2))
    });
    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let zones = ZoneDirectory::new();
    let matcher = Matcher::with_default_settings();
    let policy = MatchingPolicy::builder("zone-bench")
        .hard(neighborly_match::models::Criterion::Age, true)
        .build()
        .expect("valid policy");

    let mut group = c.benchmark_group("simulate");
    group.sample_size(20);

    for pool_size in [20, 100, 250, 500].iter() {
        let pool = create_pool(*pool_size);
        group.bench_with_input(BenchmarkId::new("simulate", pool_size), pool_size, |b, _| {
            b.iter(|| matcher.simulate(black_box(&policy), black_box(&pool), &zones))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_pair_table,
    bench_simulation
);

criterion_main!(benches);
