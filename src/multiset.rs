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

use crate::filter::{Expression, Filter, RelOp};
use crate::pattern::Pattern;
use crate::term::{PatternId, Term};

/// A `VALUES` clause: a list of row bindings, each mapping a variable name
/// to the constant it is restricted to.
#[derive(Debug, Clone)]
pub struct Multiset {
    id: PatternId,
    pub rows: Vec<Vec<(String, Term)>>,
}

impl Multiset {
    pub fn new(rows: Vec<Vec<(String, Term)>>) -> Self {
        Multiset {
            id: PatternId::new(),
            rows,
        }
    }

    /// Convert to a disjunction (over rows) of conjunctions (over bindings
    /// in a row) of equality expressions, per §3.
    pub fn to_filter(&self) -> Filter {
        let row_clauses: Vec<Expression> = self
            .rows
            .iter()
            .map(|row| {
                let eq_clauses: Vec<Expression> = row
                    .iter()
                    .map(|(var, value)| {
                        Expression::Relational(
                            RelOp::Eq,
                            Box::new(Expression::Term(Term::Variable(var.clone()))),
                            Box::new(Expression::Term(value.clone())),
                        )
                    })
                    .collect();
                if eq_clauses.len() == 1 {
                    eq_clauses.into_iter().next().unwrap()
                } else {
                    Expression::And(eq_clauses)
                }
            })
            .collect();
        if row_clauses.len() == 1 {
            Filter::new(row_clauses.into_iter().next().unwrap())
        } else {
            Filter::new(Expression::Or(row_clauses))
        }
    }
}

impl Pattern for Multiset {
    fn id(&self) -> PatternId {
        self.id
    }

    fn variables(&self) -> HashSet<String> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(|(var, _)| var.clone()))
            .collect()
    }

    fn is_triple(&self) -> bool {
        false
    }
}
