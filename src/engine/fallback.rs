use crate::engine::filters::mix_rules_hold;
use crate::engine::plan::MatchPlan;
use crate::engine::scoring::PairTable;
use crate::engine::solver::{form_groups, FormedGroup, SolverSettings, SCORE_EPSILON};
use crate::models::{FallbackStrategy, Member, Placement};

/// What the fallback strategy did with the solver's leftovers
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Members still unplaced, ascending
    pub waitlist: Vec<usize>,
    /// Members placed by the fallback rather than the solver
    pub placed: usize,
    pub improvement_passes: usize,
    pub budget_exhausted: bool,
}

/// Apply the plan's fallback strategy to unplaced members
///
/// `groups` is adjusted in place: `fill_partial` grows existing groups,
/// `auto_relax` appends groups formed under the relaxed plan.
pub fn resolve(
    plan: &MatchPlan<'_>,
    members: &[&Member],
    table: &PairTable,
    groups: &mut Vec<FormedGroup>,
    leftover: Vec<usize>,
    settings: &SolverSettings,
) -> Resolution {
    if leftover.is_empty() {
        return Resolution::default();
    }

    match plan.fallback {
        FallbackStrategy::Waitlist => Resolution {
            waitlist: leftover,
            ..Resolution::default()
        },
        FallbackStrategy::FillPartial => fill_partial(plan, members, table, groups, leftover),
        FallbackStrategy::AutoRelax => auto_relax(plan, members, groups, leftover, settings),
    }
}

/// Join each leftover to the under-filled group it scores best with
fn fill_partial(
    plan: &MatchPlan<'_>,
    members: &[&Member],
    table: &PairTable,
    groups: &mut [FormedGroup],
    leftover: Vec<usize>,
) -> Resolution {
    let mut waitlist = Vec::new();
    let mut placed = 0;

    for candidate in leftover {
        let mut best: Option<(usize, f64)> = None;
        for (g, group) in groups.iter().enumerate() {
            if !group.has_room() {
                continue;
            }
            let Some(affinity) = table.affinity(candidate, &group.members) else {
                continue;
            };
            let grown = group.members.iter().chain(std::iter::once(&candidate));
            if !mix_rules_hold(plan, grown.map(|&i| members[i])) {
                continue;
            }
            let Some(current) = table.pair_sum(&group.members) else {
                continue;
            };
            let n = group.len() + 1;
            let score = (current + affinity) / (n * (n - 1) / 2) as f64;
            if best.map_or(true, |(_, s)| score > s + SCORE_EPSILON) {
                best = Some((g, score));
            }
        }

        match best {
            Some((g, score)) => {
                groups[g].members.push(candidate);
                groups[g].score = score;
                placed += 1;
            }
            None => waitlist.push(candidate),
        }
    }

    tracing::debug!(placed, waitlisted = waitlist.len(), "fill_partial fallback applied");

    Resolution {
        waitlist,
        placed,
        ..Resolution::default()
    }
}

/// Re-run the solver over the leftovers with every hard rule softened
fn auto_relax(
    plan: &MatchPlan<'_>,
    members: &[&Member],
    groups: &mut Vec<FormedGroup>,
    leftover: Vec<usize>,
    settings: &SolverSettings,
) -> Resolution {
    let relaxed = plan.relaxed();
    let subset: Vec<&Member> = leftover.iter().map(|&i| members[i]).collect();
    let table = PairTable::build(&relaxed, &subset, settings.parallel_threshold);
    let outcome = form_groups(&relaxed, &subset, &table, settings, Placement::AutoRelax);

    let mut placed = 0;
    for mut group in outcome.groups {
        // Map positions in the leftover subset back to the full pool
        group.members = group.members.iter().map(|&i| leftover[i]).collect();
        placed += group.len();
        groups.push(group);
    }
    let waitlist = outcome.leftover.iter().map(|&i| leftover[i]).collect();

    tracing::debug!(placed, "auto_relax fallback applied");

    Resolution {
        waitlist,
        placed,
        improvement_passes: outcome.improvement_passes,
        budget_exhausted: outcome.budget_exhausted,
    }
}
