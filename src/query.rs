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

use crate::filter::Filter;
use crate::multiset::Multiset;
use crate::triple_pattern::TriplePattern;

/// A parsed conjunctive graph-pattern query: an unordered name plus the
/// ordered triple patterns and filters a search algorithm enumerates over.
///
/// `VALUES` multisets are folded into `filters` at construction time (via
/// [`Query::with_multiset`]), matching the upstream parser's behavior (§6);
/// this crate does not keep multisets around as a distinct query member.
#[derive(Debug, Clone)]
pub struct Query {
    pub name: String,
    pub patterns: Vec<Rc<TriplePattern>>,
    pub filters: Vec<Rc<Filter>>,
}

impl Query {
    pub fn new(name: impl Into<String>) -> Self {
        Query {
            name: name.into(),
            patterns: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: TriplePattern) -> Self {
        self.patterns.push(Rc::new(pattern));
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(Rc::new(filter));
        self
    }

    pub fn with_multiset(mut self, multiset: Multiset) -> Self {
        self.filters.push(Rc::new(multiset.to_filter()));
        self
    }

    /// Number of triple patterns (filters do not count toward size, §3).
    pub fn size(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn size_counts_only_triple_patterns() {
        let q = Query::new("q1")
            .with_pattern(TriplePattern::plain(
                Term::Variable("x".into()),
                Term::Constant("<p>".into()),
                Term::Variable("y".into()),
            ))
            .with_filter(Filter::relational_eq(
                Term::Variable("x".into()),
                Term::Constant("<A>".into()),
            ));
        assert_eq!(q.size(), 1);
        assert_eq!(q.filters.len(), 1);
    }

    #[test]
    fn with_multiset_folds_values_into_filters() {
        let q = Query::new("q2").with_multiset(Multiset::new(vec![vec![(
            "x".to_string(),
            Term::Constant("<A>".into()),
        )]]));
        assert_eq!(q.filters.len(), 1);
    }
}
