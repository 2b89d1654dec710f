/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Join-order search algorithms (§4.3): all share the same `expand` step and
//! differ only in how much of the frontier they keep between rounds.

mod dp;
mod dummy;
mod greedy;
mod hgreedy;

pub use dp::DPSearch;
pub use dummy::DummySearch;
pub use greedy::GreedySearch;
pub use hgreedy::HGreedySearch;

use std::rc::Rc;

use crate::estimators::CardinalityEstimator;
use crate::join_order::{self, Gearing, JoinOrder};
use crate::pattern::{Pattern, PatternKind};
use crate::query::Query;
use crate::Result;

/// Common behavior of every search strategy: expanding one plan prefix into
/// its legal one-step extensions, and driving a full run to a terminal
/// plan.
pub trait SearchAlgorithm {
    fn estimator(&self) -> &dyn CardinalityEstimator;

    /// One-step extensions of `plan` that are still legal under `query`
    /// (§4.3). A plain atom not yet in the plan and sharing a variable with
    /// it (or starting an empty plan) yields one candidate; a path atom may
    /// yield one candidate per bound endpoint. Every candidate is then
    /// extended by every filter it newly satisfies, in query order.
    fn expand(&self, query: &Query, plan: &JoinOrder) -> Vec<JoinOrder> {
        let mut candidates = Vec::new();

        for pattern in &query.patterns {
            if join_order::contains(plan, pattern.id()) {
                continue;
            }
            let kind = PatternKind::Triple(Rc::clone(pattern));
            if plan.is_root() {
                if !pattern.more {
                    candidates.push(join_order::extend(plan, kind, Gearing::Plain, false));
                } else if pattern.variables().len() < 2 {
                    let gearing = if pattern.subject.is_variable() { Gearing::Reverse } else { Gearing::Forward };
                    candidates.push(join_order::extend(plan, kind, gearing, false));
                }
                continue;
            }
            if !plan.compatible(&kind) {
                continue;
            }
            if pattern.more {
                if let Some(name) = pattern.subject.as_variable() {
                    if plan.variables().contains(name) {
                        candidates.push(join_order::extend(plan, kind.clone(), Gearing::Forward, false));
                    }
                }
                if let Some(name) = pattern.object.as_variable() {
                    if plan.variables().contains(name) {
                        candidates.push(join_order::extend(plan, kind, Gearing::Reverse, false));
                    }
                }
            } else {
                candidates.push(join_order::extend(plan, kind, Gearing::Plain, false));
            }
        }

        for candidate in &mut candidates {
            for filter in &query.filters {
                if !join_order::contains(candidate, filter.id()) && candidate.compatible(&PatternKind::Filter(Rc::clone(filter))) {
                    *candidate = join_order::extend(candidate, PatternKind::Filter(Rc::clone(filter)), Gearing::Plain, false);
                }
            }
        }
        candidates
    }

    fn run(&self, query: &Query) -> Result<JoinOrder>;
}

/// `cost`-ordering used by every beam/DP round: lower cost sorts first.
pub(crate) fn by_cost(a: &JoinOrder, b: &JoinOrder) -> std::cmp::Ordering {
    a.cost().partial_cmp(&b.cost()).unwrap_or(std::cmp::Ordering::Equal)
}

/// Collapse `candidates` to their lowest-cost representative per distinct
/// triple-pattern set (`k1`), same as [`DPSearch::next_round`]'s
/// replacement rule. Two candidates can reach the same pattern set by
/// different paths (e.g. a path atom taken `Forward` vs `Reverse`); without
/// this step a beam would waste slots on redundant sets instead of
/// exploring genuinely distinct plans.
pub(crate) fn dedup_cheapest_by_k1(candidates: Vec<JoinOrder>) -> Vec<JoinOrder> {
    let mut by_k1: std::collections::HashMap<u128, JoinOrder> = std::collections::HashMap::new();
    for candidate in candidates {
        let key = candidate.k1();
        let replace = match by_k1.get(&key) {
            Some(existing) => by_cost(&candidate, existing) == std::cmp::Ordering::Less,
            None => true,
        };
        if replace {
            by_k1.insert(key, candidate);
        }
    }
    by_k1.into_values().collect()
}
