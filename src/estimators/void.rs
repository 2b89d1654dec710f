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
use std::time::Instant;

use super::{relaxed_star_plan, CardinalityEstimator};
use crate::database::Database;
use crate::join_order::{self, JoinOrder};
use crate::Result;

/// Closed-form, VoID-statistics based estimator (§4.4). Never samples the
/// database directly; relies only on exact and distinct-count lookups, so it
/// always reports `support = 1.0`.
pub struct VoidEstimator<'db> {
    database: &'db dyn Database,
    relax_stars: bool,
}

impl<'db> VoidEstimator<'db> {
    pub fn new(database: &'db dyn Database, relax_stars: bool) -> Self {
        VoidEstimator { database, relax_stars }
    }
}

impl<'db> CardinalityEstimator for VoidEstimator<'db> {
    fn estimate(&self, join_order: &JoinOrder) -> Result<()> {
        let timer = Instant::now();
        let plan = relaxed_star_plan(join_order, self.relax_stars);

        let mut log_cards = Vec::new();
        let mut values: HashMap<String, Vec<f64>> = HashMap::new();

        for pattern in join_order::get_patterns(&plan) {
            let (hs, hp, ho) = pattern.header();
            let cardinality = if pattern.is_path() {
                let total = self.database.cardinality("", &hp, "")? as f64;
                if !hs.is_empty() {
                    total / self.database.distinct_subjects(&hp).max(1) as f64
                } else if !ho.is_empty() {
                    total / self.database.distinct_objects(&hp).max(1) as f64
                } else {
                    total
                }
            } else {
                self.database.cardinality(&hs, &hp, &ho)? as f64
            };
            log_cards.push((cardinality + 1.0).log10());

            if hs.is_empty() && ho.is_empty() {
                if let Some(s) = pattern.subject.as_variable() {
                    values
                        .entry(s.to_string())
                        .or_default()
                        .push((self.database.distinct_subjects(&hp) as f64 + 1.0).log10());
                }
                if let Some(o) = pattern.object.as_variable() {
                    values
                        .entry(o.to_string())
                        .or_default()
                        .push((self.database.distinct_objects(&hp) as f64 + 1.0).log10());
                }
            } else if hs.is_empty() {
                if let Some(s) = pattern.subject.as_variable() {
                    let card = self.database.cardinality(&hs, &hp, &ho)? as f64;
                    values.entry(s.to_string()).or_default().push((card + 1.0).log10());
                }
            } else if ho.is_empty() {
                if let Some(o) = pattern.object.as_variable() {
                    let card = self.database.cardinality(&hs, &hp, &ho)? as f64;
                    values.entry(o.to_string()).or_default().push((card + 1.0).log10());
                }
            }
        }

        let c: f64 = log_cards.iter().product();
        let mut v = 1.0f64;
        for mut counts in values.into_values() {
            if counts.len() > 1 {
                counts.sort_by(|a, b| b.partial_cmp(a).unwrap());
                v *= counts[..counts.len() - 1].iter().product::<f64>();
            }
        }

        join_order.set_cardinality(if v > 0.0 { c / v } else { c });
        join_order.set_support(1.0);
        join_order.set_estimation_time(timer.elapsed().as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::database::MemoryDatabase;
    use crate::join_order::{Gearing, JoinOrderNode};
    use crate::pattern::PatternKind;
    use crate::term::Term;
    use crate::triple_pattern::TriplePattern;

    fn sample_graph() -> MemoryDatabase {
        let triples = vec![
            ("<A>".to_string(), "<p>".to_string(), "<B>".to_string()),
            ("<B>".to_string(), "<p>".to_string(), "<C>".to_string()),
            ("<A>".to_string(), "<q>".to_string(), "<X>".to_string()),
        ];
        MemoryDatabase::new(&triples, 1)
    }

    #[test]
    fn single_bound_triple_uses_its_exact_cardinality() {
        let db = sample_graph();
        let estimator = VoidEstimator::new(&db, true);
        let root = JoinOrderNode::root();
        let tp = TriplePattern::plain(
            Term::Constant("<A>".into()),
            Term::Constant("<p>".into()),
            Term::Constant("<B>".into()),
        );
        let node = join_order::extend(&root, PatternKind::Triple(Rc::new(tp)), Gearing::Plain, false);
        estimator.estimate(&node).unwrap();
        assert_eq!(node.cardinality(), (1.0f64 + 1.0).log10());
        assert_eq!(node.support(), 1.0);
    }

    #[test]
    fn two_joined_plain_atoms_divide_by_the_shared_variable_distinct_count() {
        let db = sample_graph();
        let estimator = VoidEstimator::new(&db, true);
        let root = JoinOrderNode::root();
        let a = TriplePattern::plain(
            Term::Variable("x".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        );
        let n1 = join_order::extend(&root, PatternKind::Triple(Rc::new(a)), Gearing::Plain, false);
        estimator.estimate(&n1).unwrap();
        let b = TriplePattern::plain(
            Term::Variable("y".into()),
            Term::Constant("<q>".into()),
            Term::Variable("z".into()),
        );
        let n2 = join_order::extend(&n1, PatternKind::Triple(Rc::new(b)), Gearing::Plain, false);
        estimator.estimate(&n2).unwrap();
        assert!(n2.cardinality() > 0.0);
        assert_eq!(n2.support(), 1.0);
    }
}
