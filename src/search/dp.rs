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

use super::{by_cost, SearchAlgorithm};
use crate::error::OptimizerError;
use crate::estimators::CardinalityEstimator;
use crate::join_order::{JoinOrder, JoinOrderNode};
use crate::query::Query;
use crate::Result;

/// Exhaustive dynamic-programming search (§4.3): every round keeps the
/// single best plan per distinct pattern set (`k1`). Since every terminal
/// plan covers the whole query, the final round collapses to one entry.
pub struct DPSearch<'e> {
    estimator: &'e dyn CardinalityEstimator,
}

impl<'e> DPSearch<'e> {
    pub fn new(estimator: &'e dyn CardinalityEstimator) -> Self {
        DPSearch { estimator }
    }

    pub(crate) fn next_round(&self, query: &Query, old_plans: &HashMap<u128, JoinOrder>) -> Result<HashMap<u128, JoinOrder>> {
        let mut new_plans: HashMap<u128, JoinOrder> = HashMap::new();
        for old_plan in old_plans.values() {
            for candidate in self.expand(query, old_plan) {
                self.estimator.estimate(&candidate)?;
                let key = candidate.k1();
                let replace = match new_plans.get(&key) {
                    Some(existing) => by_cost(&candidate, existing) == std::cmp::Ordering::Less,
                    None => true,
                };
                if replace {
                    new_plans.insert(key, candidate);
                }
            }
        }
        if log::log_enabled!(log::Level::Debug) {
            for (i, plan) in new_plans.values().enumerate() {
                log::debug!(
                    "round candidate {}: cost={:.3} support={:.2}% time={:.5}s",
                    i + 1,
                    plan.cost(),
                    plan.support() * 100.0,
                    plan.estimation_time(),
                );
            }
        }
        Ok(new_plans)
    }
}

impl<'e> SearchAlgorithm for DPSearch<'e> {
    fn estimator(&self) -> &dyn CardinalityEstimator {
        self.estimator
    }

    fn run(&self, query: &Query) -> Result<JoinOrder> {
        let mut plans: HashMap<u128, JoinOrder> = HashMap::new();
        plans.insert(0, JoinOrderNode::root());
        for _ in 0..query.size() {
            plans = self.next_round(query, &plans)?;
        }
        plans
            .into_values()
            .next()
            .ok_or_else(|| OptimizerError::InvariantViolation("search produced no terminal plan".to_string()))
    }
}
