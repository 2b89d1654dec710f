/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::collections::HashMap;

use super::{by_cost, dedup_cheapest_by_k1, SearchAlgorithm};
use crate::error::OptimizerError;
use crate::estimators::CardinalityEstimator;
use crate::join_order::{JoinOrder, JoinOrderNode};
use crate::query::Query;
use crate::Result;

/// Beam search (§4.3): like [`crate::search::DPSearch`], but each round keeps
/// only the `beam_size` cheapest plans instead of the best plan per distinct
/// pattern set, trading optimality for a bounded frontier.
pub struct GreedySearch<'e> {
    estimator: &'e dyn CardinalityEstimator,
    beam_size: usize,
}

impl<'e> GreedySearch<'e> {
    pub fn new(estimator: &'e dyn CardinalityEstimator, beam_size: usize) -> Self {
        GreedySearch { estimator, beam_size: beam_size.max(1) }
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
        candidates.truncate(self.beam_size);
        if log::log_enabled!(log::Level::Debug) {
            for (i, plan) in candidates.iter().enumerate() {
                log::debug!("beam slot {}: cost={:.3} support={:.2}%", i + 1, plan.cost(), plan.support() * 100.0);
            }
        }
        Ok(candidates)
    }
}

impl<'e> SearchAlgorithm for GreedySearch<'e> {
    fn estimator(&self) -> &dyn CardinalityEstimator {
        self.estimator
    }

    fn run(&self, query: &Query) -> Result<JoinOrder> {
        let mut plans = vec![JoinOrderNode::root()];
        for _ in 0..query.size() {
            plans = self.next_round(query, &plans)?;
        }
        plans
            .into_iter()
            .next()
            .ok_or_else(|| OptimizerError::InvariantViolation("beam search produced no terminal plan".to_string()))
    }
}
