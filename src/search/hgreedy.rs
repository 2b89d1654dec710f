/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashSet;

use super::{by_cost, dedup_cheapest_by_k1, SearchAlgorithm};
use crate::error::OptimizerError;
use crate::estimators::CardinalityEstimator;
use crate::join_order::{JoinOrder, JoinOrderNode};
use crate::query::Query;
use crate::Result;

/// Heterogeneous beam search (§4.3): keeps the `beam_size` cheapest plans
/// like [`crate::search::GreedySearch`], but additionally admits up to
/// `beam_extra` further plans whose path-atom signature (`k2`) is not yet
/// represented in the kept set, even when they cost more than the beam cutoff.
/// This is what lets a star-relaxed path join survive a round it would
/// otherwise lose purely on cost.
pub struct HGreedySearch<'e> {
    estimator: &'e dyn CardinalityEstimator,
    beam_size: usize,
    beam_extra: usize,
}

impl<'e> HGreedySearch<'e> {
    pub fn new(estimator: &'e dyn CardinalityEstimator, beam_size: usize, beam_extra: usize) -> Self {
        HGreedySearch {
            estimator,
            beam_size: beam_size.max(1),
            beam_extra,
        }
    }

    fn next_round(&self, query: &Query, old_plans: &[JoinOrder]) -> Result<Vec<JoinOrder>> {
        let mut candidates = Vec::new();
        for old_plan in old_plans {
            for candidate in self.expand(query, old_plan) {
                self.estimator.estimate(&candidate)?;
                candidates.push(candidate);
            }
        }
        let mut candidates = dedup_cheapest_by_k1(candidates);
        candidates.sort_by(by_cost);

        let mut kept: Vec<JoinOrder> = candidates.iter().take(self.beam_size).cloned().collect();
        let mut seen_k2: HashSet<u128> = kept.iter().map(|p| p.k2()).collect();

        let mut admitted = 0;
        for candidate in candidates.into_iter().skip(self.beam_size) {
            if admitted >= self.beam_extra {
                break;
            }
            let k2 = candidate.k2();
            if seen_k2.insert(k2) {
                kept.push(candidate);
                admitted += 1;
            }
        }

        if log::log_enabled!(log::Level::Debug) {
            for (i, plan) in kept.iter().enumerate() {
                log::debug!("hgreedy slot {}: cost={:.3} support={:.2}%", i + 1, plan.cost(), plan.support() * 100.0);
            }
        }
        Ok(kept)
    }
}

impl<'e> SearchAlgorithm for HGreedySearch<'e> {
    fn estimator(&self) -> &dyn CardinalityEstimator {
        self.estimator
    }

    fn run(&self, query: &Query) -> Result<JoinOrder> {
        let mut plans = vec![JoinOrderNode::root()];
        for _ in 0..query.size() {
            plans = self.next_round(query, &plans)?;
        }
        plans.sort_by(by_cost);
        plans
            .into_iter()
            .next()
            .ok_or_else(|| OptimizerError::InvariantViolation("hgreedy search produced no terminal plan".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use crate::estimators::VoidEstimator;
    use crate::term::Term;
    use crate::triple_pattern::TriplePattern;

    #[test]
    fn hgreedy_with_no_extra_slots_behaves_like_plain_beam() {
        let triples = vec![
            ("<A>".to_string(), "<p>".to_string(), "<B>".to_string()),
            ("<B>".to_string(), "<q>".to_string(), "<C>".to_string()),
        ];
        let db = MemoryDatabase::new(&triples, 11);
        let estimator = VoidEstimator::new(&db, true);
        let search = HGreedySearch::new(&estimator, 1, 0);

        let query = Query::new("q")
            .with_pattern(TriplePattern::plain(
                Term::Variable("x".into()),
                Term::Constant("<p>".into()),
                Term::Variable("y".into()),
            ))
            .with_pattern(TriplePattern::plain(
                Term::Variable("y".into()),
                Term::Constant("<q>".into()),
                Term::Variable("z".into()),
            ));
        let plan = search.run(&query).unwrap();
        assert_eq!(plan.size(), 2);
    }

    #[test]
    fn beam_extra_admits_a_path_diverse_plan_beyond_the_cost_cutoff() {
        let triples = vec![
            ("<A>".to_string(), "<p>".to_string(), "<B>".to_string()),
            ("<B>".to_string(), "<p>".to_string(), "<C>".to_string()),
            ("<A>".to_string(), "<q>".to_string(), "<X>".to_string()),
        ];
        let db = MemoryDatabase::new(&triples, 11);
        let estimator = VoidEstimator::new(&db, true);
        let search = HGreedySearch::new(&estimator, 1, 1);

        let query = Query::new("q")
            .with_pattern(TriplePattern::path(
                Term::Constant("<A>".into()),
                Term::Constant("<p>".into()),
                Term::Variable("y".into()),
                false,
            ))
            .with_pattern(TriplePattern::plain(
                Term::Constant("<A>".into()),
                Term::Constant("<q>".into()),
                Term::Variable("z".into()),
            ));
        let plan = search.run(&query).unwrap();
        assert_eq!(plan.size(), 2);
    }
}
