/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::rc::Rc;
use std::time::Instant;

use super::CardinalityEstimator;
use crate::endpoint::{Endpoint, NullSink, ProbeSink, ProbeValue};
use crate::join_order::JoinOrder;
use crate::pattern::PatternKind;
use crate::stringify::{self, Target};
use crate::Result;

/// Collaborator estimator (§4.7): asks a live SPARQL endpoint to count the
/// priced prefix exactly, falling back to a whole-graph triple count (with
/// `support = 0.0`) when the endpoint times out or errors. Unlike the
/// closed-form and sampling estimators, this one has a real-world cost, so
/// it is meant to be run sparingly (e.g. only on the search's winning plan).
pub struct ExactCountEstimator<'e, E: Endpoint> {
    endpoint: &'e E,
    timeout_ms: u64,
    relax_stars: bool,
}

impl<'e, E: Endpoint> ExactCountEstimator<'e, E> {
    pub fn new(endpoint: &'e E, timeout_ms: u64, relax_stars: bool) -> Self {
        ExactCountEstimator { endpoint, timeout_ms, relax_stars }
    }

    /// Total-triple-count fallback used when the real count cannot be
    /// obtained (§4.7). Support drops to 0.0 to flag the estimate as
    /// unreliable.
    fn fallback_count(&self) -> Result<u64> {
        let mut sink = NullSink;
        self.endpoint
            .count("SELECT * WHERE { ?s ?p ?o }", &mut sink, false, false, self.timeout_ms)
    }
}

/// Nearest ancestor (including `node` itself) whose own pattern is a triple,
/// skipping any trailing filter nodes appended after the last join (§4.7).
fn nearest_triple_ancestor(node: &JoinOrder) -> JoinOrder {
    let mut cur = Rc::clone(node);
    loop {
        match cur.pattern() {
            Some(PatternKind::Triple(_)) | None => return cur,
            Some(PatternKind::Filter(_)) => {
                let prev = match cur.previous() {
                    Some(p) => Rc::clone(p),
                    None => return cur,
                };
                cur = prev;
            }
        }
    }
}

/// Build the priced query text: the nearest triple ancestor of `join_order`,
/// star-relaxed the same way the other estimators are, rendered for
/// Virtuoso with its `t_direction` hints stripped back out (the exact-count
/// collaborator only needs a plain `COUNT(*)`, not a direction-forced scan).
fn exact_count_query(join_order: &JoinOrder, relax_stars: bool) -> String {
    let priced = nearest_triple_ancestor(join_order);
    let plan = super::relaxed_star_plan(&priced, relax_stars);
    let rendered = stringify::stringify(&plan, Target::Virtuoso);
    let where_clause = rendered.splitn(2, "WHERE").nth(1).unwrap_or(&rendered);
    format!("SELECT * WHERE{}", where_clause)
        .replace(" OPTION (TRANSITIVE, t_direction 1)", "")
        .replace(" OPTION (TRANSITIVE, t_direction 2)", "")
}

impl<'e, E: Endpoint> CardinalityEstimator for ExactCountEstimator<'e, E> {
    fn estimate(&self, join_order: &JoinOrder) -> Result<()> {
        let timer = Instant::now();
        let priced = nearest_triple_ancestor(join_order);
        let (cardinality, support) = self.run_count(&priced)?;

        join_order.set_cardinality(cardinality as f64);
        join_order.set_support(support);
        join_order.set_estimation_time(timer.elapsed().as_secs_f64());
        Ok(())
    }
}

impl<'e, E: Endpoint> ExactCountEstimator<'e, E> {
    fn run_count(&self, join_order: &JoinOrder) -> Result<(u64, f64)> {
        let query = exact_count_query(join_order, self.relax_stars);
        let mut sink = RecordingStatusSink::default();
        match self.endpoint.count(&query, &mut sink, false, true, self.timeout_ms) {
            Ok(_cardinality) if sink.status.as_deref() == Some("timeout") => {
                Ok((self.fallback_count()?, 0.0))
            }
            Ok(cardinality) => Ok((cardinality, 1.0)),
            Err(_) => Ok((self.fallback_count()?, 0.0)),
        }
    }
}

#[derive(Default)]
struct RecordingStatusSink {
    status: Option<String>,
}

impl ProbeSink for RecordingStatusSink {
    fn report(&mut self, _key: &str, field: &str, value: ProbeValue) {
        if field == "status" {
            if let ProbeValue::Text(s) = value {
                self.status = Some(s);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::SparqlResults;
    use crate::join_order::JoinOrderNode;
    use crate::term::Term;
    use crate::triple_pattern::TriplePattern;
    use std::cell::RefCell;

    struct StubEndpoint {
        rows: RefCell<Vec<u64>>,
    }

    impl Endpoint for StubEndpoint {
        fn url(&self) -> &str {
            "stub://"
        }
        fn default_graph(&self) -> &str {
            ""
        }
        fn execute(&self, _query: &str, sink: &mut dyn ProbeSink, _force_order: bool, _timeout_ms: u64) -> Result<SparqlResults> {
            sink.report("", "status", ProbeValue::Text("ok".to_string()));
            sink.report("", "num_solutions", ProbeValue::Count(0));
            sink.report("", "execution_time", ProbeValue::Number(0.0));
            Ok(SparqlResults {
                results: crate::endpoint::SparqlBindings { bindings: Vec::new() },
            })
        }
        fn count(&self, _query: &str, sink: &mut dyn ProbeSink, _distinct: bool, _force_order: bool, _timeout_ms: u64) -> Result<u64> {
            sink.report("", "status", ProbeValue::Text("ok".to_string()));
            Ok(self.rows.borrow_mut().pop().unwrap_or(0))
        }
    }

    #[test]
    fn single_plain_triple_reports_full_confidence() {
        let endpoint = StubEndpoint { rows: RefCell::new(vec![7]) };
        let estimator = ExactCountEstimator::new(&endpoint, 5000, true);
        let root = JoinOrderNode::root();
        let tp = TriplePattern::plain(
            Term::Constant("<A>".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        );
        let node = crate::join_order::extend(&root, PatternKind::Triple(Rc::new(tp)), Gearing::Plain, false);
        estimator.estimate(&node).unwrap();
        assert_eq!(node.cardinality(), 7.0);
        assert_eq!(node.support(), 1.0);
    }
}
