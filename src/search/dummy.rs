/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::SearchAlgorithm;
use crate::error::OptimizerError;
use crate::estimators::CardinalityEstimator;
use crate::join_order::{JoinOrder, JoinOrderNode};
use crate::query::Query;
use crate::Result;

/// No-op baseline (§4.3): always takes the first legal extension `expand`
/// offers, i.e. the query's own pattern order. Useful as a cost-free
/// comparison point against the real search strategies.
pub struct DummySearch<'e> {
    estimator: &'e dyn CardinalityEstimator,
}

impl<'e> DummySearch<'e> {
    pub fn new(estimator: &'e dyn CardinalityEstimator) -> Self {
        DummySearch { estimator }
    }
}

impl<'e> SearchAlgorithm for DummySearch<'e> {
    fn estimator(&self) -> &dyn CardinalityEstimator {
        self.estimator
    }

    fn run(&self, query: &Query) -> Result<JoinOrder> {
        let mut plan = JoinOrderNode::root();
        for _ in 0..query.size() {
            let candidate = self
                .expand(query, &plan)
                .into_iter()
                .next()
                .ok_or_else(|| OptimizerError::InvariantViolation("dummy search found no extension".to_string()))?;
            self.estimator.estimate(&candidate)?;
            plan = candidate;
        }
        Ok(plan)
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
    fn dummy_search_always_follows_query_order() {
        let triples = vec![("<A>".to_string(), "<p>".to_string(), "<B>".to_string())];
        let db = MemoryDatabase::new(&triples, 3);
        let estimator = VoidEstimator::new(&db, true);
        let search = DummySearch::new(&estimator);

        let query = Query::new("q").with_pattern(TriplePattern::plain(
            Term::Variable("x".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        ));
        let plan = search.run(&query).unwrap();
        assert_eq!(plan.size(), 1);
    }
}
