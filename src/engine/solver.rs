use std::time::{Duration, Instant};

use crate::engine::filters::mix_rules_hold;
use crate::engine::plan::MatchPlan;
use crate::engine::scoring::PairTable;
use crate::models::{Member, Placement};

/// Tolerance for "strictly better" and "equal" score comparisons
pub const SCORE_EPSILON: f64 = 1e-9;

/// Smallest group the solver forms (a seed pair)
pub const MIN_GROUP_SIZE: usize = 2;

/// Bounds on the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Maximum local-improvement sweeps over all group pairs
    pub max_improvement_passes: usize,
    /// Wall-clock budget for local improvement
    pub improvement_budget: Duration,
    /// Pool size from which pair scoring runs on the rayon pool
    pub parallel_threshold: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_improvement_passes: 64,
            improvement_budget: Duration::from_millis(2000),
            parallel_threshold: 256,
        }
    }
}

/// A group as index positions into the solver's member slice
#[derive(Debug, Clone, PartialEq)]
pub struct FormedGroup {
    pub members: Vec<usize>,
    pub target_size: usize,
    pub score: f64,
    pub placement: Placement,
}

impl FormedGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.members.len() < self.target_size
    }
}

#[derive(Debug, Clone)]
pub struct SolverOutcome {
    pub groups: Vec<FormedGroup>,
    /// Unplaced members, ascending
    pub leftover: Vec<usize>,
    pub improvement_passes: usize,
    pub budget_exhausted: bool,
}

/// Partition `members` into feasible groups, maximizing summed group scores
///
/// `members` must be in canonical (id) order: every tie is broken by position,
/// which makes the result deterministic for a given pool and policy.
pub fn form_groups(
    plan: &MatchPlan<'_>,
    members: &[&Member],
    table: &PairTable,
    settings: &SolverSettings,
    placement: Placement,
) -> SolverOutcome {
    let solver = GroupFormationSolver {
        plan,
        members,
        table,
    };

    let mut assigned = vec![false; members.len()];
    let mut groups = solver.seed_and_grow(&mut assigned, placement);
    let (improvement_passes, budget_exhausted) = solver.improve(&mut groups, settings);

    let leftover: Vec<usize> = (0..members.len()).filter(|&i| !assigned[i]).collect();

    tracing::debug!(
        groups = groups.len(),
        leftover = leftover.len(),
        size_variance = size_variance(&groups),
        improvement_passes,
        budget_exhausted,
        "Group formation finished"
    );

    SolverOutcome {
        groups,
        leftover,
        improvement_passes,
        budget_exhausted,
    }
}

struct GroupFormationSolver<'a, 'z> {
    plan: &'a MatchPlan<'z>,
    members: &'a [&'a Member],
    table: &'a PairTable,
}

impl GroupFormationSolver<'_, '_> {
    fn mix_ok(&self, group: &[usize]) -> bool {
        mix_rules_hold(self.plan, group.iter().map(|&i| self.members[i]))
    }

    fn mix_ok_with(&self, group: &[usize], extra: usize) -> bool {
        mix_rules_hold(
            self.plan,
            group.iter().chain(std::iter::once(&extra)).map(|&i| self.members[i]),
        )
    }

    /// Score of a candidate group, or `None` when it breaks a hard rule
    fn evaluate(&self, group: &[usize]) -> Option<f64> {
        if !self.mix_ok(group) {
            return None;
        }
        self.table.group_score(group)
    }

    /// Seed the best remaining pair, grow it to its cap, repeat
    fn seed_and_grow(&self, assigned: &mut [bool], placement: Placement) -> Vec<FormedGroup> {
        let ranked = self.table.ranked_pairs();
        let mut groups = Vec::new();

        for &(i, j, seed_score) in &ranked {
            if assigned[i] || assigned[j] || !self.mix_ok(&[i, j]) {
                continue;
            }

            assigned[i] = true;
            assigned[j] = true;
            let target_size = self.plan.group_cap(self.members[i], self.members[j]);
            let mut group = vec![i, j];
            let mut pair_sum = seed_score;

            while group.len() < target_size {
                let Some((k, affinity)) = self.best_addition(&group, assigned) else {
                    break;
                };
                assigned[k] = true;
                group.push(k);
                pair_sum += affinity;
            }

            let pairs = group.len() * (group.len() - 1) / 2;
            groups.push(FormedGroup {
                members: group,
                target_size,
                score: pair_sum / pairs as f64,
                placement,
            });
        }

        groups
    }

    /// Unassigned member that maximizes the grown group's score
    fn best_addition(&self, group: &[usize], assigned: &[bool]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for k in 0..self.members.len() {
            if assigned[k] {
                continue;
            }
            let Some(affinity) = self.table.affinity(k, group) else {
                continue;
            };
            if !self.mix_ok_with(group, k) {
                continue;
            }
            // Same group size for every candidate, so the largest affinity wins
            if best.map_or(true, |(_, b)| affinity > b + SCORE_EPSILON) {
                best = Some((k, affinity));
            }
        }
        best
    }

    /// Bounded local search over swaps and rebalancing moves
    ///
    /// Returns the number of sweeps run and whether a bound stopped the search
    /// before it converged.
    fn improve(&self, groups: &mut [FormedGroup], settings: &SolverSettings) -> (usize, bool) {
        if groups.len() < 2 {
            return (0, false);
        }

        let deadline = Instant::now() + settings.improvement_budget;
        let mut passes = 0;

        loop {
            if passes >= settings.max_improvement_passes {
                tracing::warn!(passes, "Search budget exhausted: improvement pass cap reached");
                return (passes, true);
            }
            passes += 1;

            match self.sweep(groups, deadline) {
                Sweep::Converged => return (passes, false),
                Sweep::Improved => continue,
                Sweep::TimedOut => {
                    tracing::warn!(passes, "Search budget exhausted: improvement time budget reached");
                    return (passes, true);
                }
            }
        }
    }

    fn sweep(&self, groups: &mut [FormedGroup], deadline: Instant) -> Sweep {
        let mut improved = false;
        for a in 0..groups.len() {
            for b in (a + 1)..groups.len() {
                if Instant::now() >= deadline {
                    return Sweep::TimedOut;
                }
                improved |= self.try_swaps(groups, a, b);
                improved |= self.try_move(groups, a, b);
                improved |= self.try_move(groups, b, a);
            }
        }
        if improved {
            Sweep::Improved
        } else {
            Sweep::Converged
        }
    }

    /// Apply every member swap between groups `a` and `b` that strictly improves their summed score
    fn try_swaps(&self, groups: &mut [FormedGroup], a: usize, b: usize) -> bool {
        let mut improved = false;
        for x in 0..groups[a].len() {
            for y in 0..groups[b].len() {
                let mut next_a = groups[a].members.clone();
                let mut next_b = groups[b].members.clone();
                std::mem::swap(&mut next_a[x], &mut next_b[y]);

                let (Some(score_a), Some(score_b)) = (self.evaluate(&next_a), self.evaluate(&next_b)) else {
                    continue;
                };
                let delta = (score_a + score_b) - (groups[a].score + groups[b].score);
                if delta > SCORE_EPSILON {
                    groups[a].members = next_a;
                    groups[a].score = score_a;
                    groups[b].members = next_b;
                    groups[b].score = score_b;
                    improved = true;
                }
            }
        }
        improved
    }

    /// Move one member from `from` into `to` when it improves the score,
    /// or keeps it equal while evening out group sizes
    fn try_move(&self, groups: &mut [FormedGroup], from: usize, to: usize) -> bool {
        if !groups[to].has_room() || groups[from].len() <= MIN_GROUP_SIZE {
            return false;
        }

        let evens_sizes = groups[from].len() > groups[to].len() + 1;
        let current = groups[from].score + groups[to].score;

        for x in 0..groups[from].len() {
            let mut next_from = groups[from].members.clone();
            let moved = next_from.remove(x);
            let mut next_to = groups[to].members.clone();
            next_to.push(moved);

            let (Some(score_from), Some(score_to)) = (self.evaluate(&next_from), self.evaluate(&next_to)) else {
                continue;
            };
            let delta = (score_from + score_to) - current;
            if delta > SCORE_EPSILON || (evens_sizes && delta.abs() <= SCORE_EPSILON) {
                groups[from].members = next_from;
                groups[from].score = score_from;
                groups[to].members = next_to;
                groups[to].score = score_to;
                return true;
            }
        }
        false
    }
}

enum Sweep {
    Converged,
    Improved,
    TimedOut,
}

/// Population variance of group sizes
pub fn size_variance(groups: &[FormedGroup]) -> f64 {
    if groups.is_empty() {
        return 0.0;
    }
    let n = groups.len() as f64;
    let mean = groups.iter().map(|g| g.len() as f64).sum::<f64>() / n;
    groups
        .iter()
        .map(|g| (g.len() as f64 - mean).powi(2))
        .sum::<f64>()
        / n
}
