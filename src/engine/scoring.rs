use rayon::prelude::*;

use crate::engine::filters::{member_admissible, pair_feasible};
use crate::engine::normalizer::similarity;
use crate::engine::plan::MatchPlan;
use crate::models::Member;

/// Score of every feasible pair when the policy carries no weights
pub const PURE_CONSTRAINT_SCORE: f64 = 1.0;

/// Pairwise compatibility (0-1): weighted average of per-criterion similarities
///
/// score = sum(weight_i * similarity_i) / sum(weight_i), over criteria with weight > 0
pub fn pair_score(plan: &MatchPlan<'_>, a: &Member, b: &Member) -> f64 {
    let total_weight = plan.total_weight();
    if total_weight <= 0.0 {
        return PURE_CONSTRAINT_SCORE;
    }

    let weighted: f64 = plan
        .weighted()
        .map(|c| c.weight * similarity(plan, c, a, b))
        .sum();

    (weighted / total_weight).clamp(0.0, 1.0)
}

/// Group compatibility: mean pair score over all C(n, 2) pairs
pub fn group_score(plan: &MatchPlan<'_>, members: &[&Member]) -> f64 {
    let mut sum = 0.0;
    let mut pairs = 0usize;
    for (i, a) in members.iter().enumerate() {
        for b in &members[i + 1..] {
            sum += pair_score(plan, a, b);
            pairs += 1;
        }
    }
    mean(sum, pairs)
}

#[inline]
fn mean(sum: f64, pairs: usize) -> f64 {
    if pairs == 0 {
        0.0
    } else {
        sum / pairs as f64
    }
}

/// Dense table of pair scores for a member slice; `None` marks an infeasible pair
///
/// Rows are filled in parallel for large pools but always collected in index
/// order, so the table is identical to a sequential build.
#[derive(Debug, Clone)]
pub struct PairTable {
    size: usize,
    scores: Vec<Option<f64>>,
    admissible: Vec<bool>,
}

impl PairTable {
    pub fn build(plan: &MatchPlan<'_>, members: &[&Member], parallel_threshold: usize) -> Self {
        let size = members.len();
        let admissible: Vec<bool> = members.iter().map(|m| member_admissible(plan, m)).collect();

        let row = |i: usize| -> Vec<Option<f64>> {
            (0..size)
                .map(|j| {
                    if i == j || !admissible[i] || !admissible[j] {
                        return None;
                    }
                    let (a, b) = (members[i], members[j]);
                    pair_feasible(plan, a, b).then(|| pair_score(plan, a, b))
                })
                .collect()
        };

        let rows: Vec<Vec<Option<f64>>> = if size >= parallel_threshold.max(2) {
            tracing::debug!(members = size, "Scoring pairs in parallel");
            (0..size).into_par_iter().map(row).collect()
        } else {
            (0..size).map(row).collect()
        };

        Self {
            size,
            scores: rows.into_iter().flatten().collect(),
            admissible,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub fn score(&self, i: usize, j: usize) -> Option<f64> {
        self.scores[i * self.size + j]
    }

    #[inline]
    pub fn feasible(&self, i: usize, j: usize) -> bool {
        self.score(i, j).is_some()
    }

    pub fn is_admissible(&self, i: usize) -> bool {
        self.admissible[i]
    }

    /// Whether member `i` has at least one feasible partner in the table
    pub fn has_partner(&self, i: usize) -> bool {
        (0..self.size).any(|j| self.feasible(i, j))
    }

    /// Sum of pair scores inside a group, or `None` if any pair is infeasible
    pub fn pair_sum(&self, group: &[usize]) -> Option<f64> {
        let mut sum = 0.0;
        for (n, &i) in group.iter().enumerate() {
            for &j in &group[n + 1..] {
                sum += self.score(i, j)?;
            }
        }
        Some(sum)
    }

    /// Mean pair score of a group, or `None` if any pair is infeasible
    pub fn group_score(&self, group: &[usize]) -> Option<f64> {
        let n = group.len();
        let pairs = n * n.saturating_sub(1) / 2;
        self.pair_sum(group).map(|sum| mean(sum, pairs))
    }

    /// Sum of `candidate`'s scores against a group, or `None` if any pair is infeasible
    pub fn affinity(&self, candidate: usize, group: &[usize]) -> Option<f64> {
        group
            .iter()
            .map(|&m| self.score(candidate, m))
            .sum::<Option<f64>>()
    }

    /// Feasible pairs ordered by score (desc), then by index
    pub fn ranked_pairs(&self) -> Vec<(usize, usize, f64)> {
        let mut pairs: Vec<(usize, usize, f64)> = (0..self.size)
            .flat_map(|i| ((i + 1)..self.size).map(move |j| (i, j)))
            .filter_map(|(i, j)| self.score(i, j).map(|s| (i, j, s)))
            .collect();

        pairs.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeGroup, Criterion, FamilyStage, Location, MatchingPolicy, ZoneDirectory};

    fn member(id: &str, age: AgeGroup, stage: FamilyStage) -> Member {
        Member::new(id)
            .with_age_group(age)
            .with_family_stage(stage)
            .with_location(Location::point(40.7128, -74.0060))
    }

    #[test]
    fn test_pair_score_weighted_average() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1")
            .clear_weights()
            .weight(Criterion::Age, 50)
            .weight(Criterion::FamilyStage, 50)
            .build()
            .unwrap();
        let plan = MatchPlan::compile(&policy, &zones);

        let a = member("a", AgeGroup::From30To39, FamilyStage::Couple);
        let b = member("b", AgeGroup::From30To39, FamilyStage::Retired);

        // age 1.0, family stage 0.0
        assert!((pair_score(&plan, &a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_weights_are_relative() {
        let zones = ZoneDirectory::new();
        let low = MatchingPolicy::builder("zone-1")
            .clear_weights()
            .weight(Criterion::Age, 10)
            .weight(Criterion::FamilyStage, 30)
            .build()
            .unwrap();
        let high = MatchingPolicy::builder("zone-1")
            .clear_weights()
            .weight(Criterion::Age, 25)
            .weight(Criterion::FamilyStage, 75)
            .build()
            .unwrap();

        let a = member("a", AgeGroup::From30To39, FamilyStage::Couple);
        let b = member("b", AgeGroup::From40To49, FamilyStage::Couple);

        let low_score = pair_score(&MatchPlan::compile(&low, &zones), &a, &b);
        let high_score = pair_score(&MatchPlan::compile(&high, &zones), &a, &b);
        assert!((low_score - high_score).abs() < 1e-9);
    }

    #[test]
    fn test_all_zero_weights_score_one() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1").clear_weights().build().unwrap();
        let plan = MatchPlan::compile(&policy, &zones);

        let a = member("a", AgeGroup::From18To29, FamilyStage::Single);
        let b = member("b", AgeGroup::SixtyPlus, FamilyStage::Retired);
        assert_eq!(pair_score(&plan, &a, &b), PURE_CONSTRAINT_SCORE);
    }

    #[test]
    fn test_group_score_is_pair_mean() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1")
            .clear_weights()
            .weight(Criterion::FamilyStage, 100)
            .build()
            .unwrap();
        let plan = MatchPlan::compile(&policy, &zones);

        let a = member("a", AgeGroup::From30To39, FamilyStage::Couple);
        let b = member("b", AgeGroup::From30To39, FamilyStage::Couple);
        let c = member("c", AgeGroup::From30To39, FamilyStage::Retired);

        // pairs: ab = 1, ac = 0, bc = 0
        let score = group_score(&plan, &[&a, &b, &c]);
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pair_table_marks_infeasible_pairs() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1")
            .hard(Criterion::Age, true)
            .build()
            .unwrap();
        let plan = MatchPlan::compile(&policy, &zones);

        let a = member("a", AgeGroup::From18To29, FamilyStage::Single);
        let b = member("b", AgeGroup::From30To39, FamilyStage::Single);
        let c = member("c", AgeGroup::SixtyPlus, FamilyStage::Single);
        let members = vec![&a, &b, &c];

        let table = PairTable::build(&plan, &members, usize::MAX);
        assert!(table.feasible(0, 1));
        assert!(!table.feasible(0, 2));
        assert!(!table.feasible(1, 2));
        assert!(!table.has_partner(2));
        assert_eq!(table.group_score(&[0, 2]), None);
        assert_eq!(table.ranked_pairs().len(), 1);
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let zones = ZoneDirectory::new();
        let policy = MatchingPolicy::builder("zone-1").build().unwrap();
        let plan = MatchPlan::compile(&policy, &zones);

        let pool: Vec<Member> = (0..40)
            .map(|i| {
                Member::new(format!("m{:02}", i))
                    .with_age_group(AgeGroup::ALL[i % AgeGroup::BUCKETS])
                    .with_family_stage(FamilyStage::ALL[i % FamilyStage::ALL.len()])
                    .with_location(Location::point(40.70 + i as f64 * 0.003, -74.0))
            })
            .collect();
        let members: Vec<&Member> = pool.iter().collect();

        let sequential = PairTable::build(&plan, &members, usize::MAX);
        let parallel = PairTable::build(&plan, &members, 2);
        assert_eq!(sequential.ranked_pairs(), parallel.ranked_pairs());
    }
}
