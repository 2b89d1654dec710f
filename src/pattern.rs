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
use std::rc::Rc;

use crate::filter::Filter;
use crate::term::PatternId;
use crate::triple_pattern::TriplePattern;

/// Common identity and variable-set accessors shared by triple patterns and
/// filters, the two things that can occupy a slot on a `JoinOrder` chain.
pub trait Pattern {
    fn id(&self) -> PatternId;
    fn variables(&self) -> HashSet<String>;
    fn is_triple(&self) -> bool;
    fn is_filter(&self) -> bool {
        !self.is_triple()
    }
}

/// A node on a plan chain is either a triple pattern (counted in `size`) or
/// a filter (not counted in `size`). Both are reference-counted so that
/// per-pattern memoization (star relaxation) stays stable across the many
/// plan prefixes that may share one pattern.
#[derive(Debug, Clone)]
pub enum PatternKind {
    Triple(Rc<TriplePattern>),
    Filter(Rc<Filter>),
}

impl PatternKind {
    pub fn as_triple(&self) -> Option<&Rc<TriplePattern>> {
        match self {
            PatternKind::Triple(t) => Some(t),
            PatternKind::Filter(_) => None,
        }
    }

    pub fn as_filter(&self) -> Option<&Rc<Filter>> {
        match self {
            PatternKind::Triple(_) => None,
            PatternKind::Filter(f) => Some(f),
        }
    }
}

impl Pattern for PatternKind {
    fn id(&self) -> PatternId {
        match self {
            PatternKind::Triple(t) => t.id(),
            PatternKind::Filter(f) => f.id(),
        }
    }

    fn variables(&self) -> HashSet<String> {
        match self {
            PatternKind::Triple(t) => t.variables(),
            PatternKind::Filter(f) => f.variables(),
        }
    }

    fn is_triple(&self) -> bool {
        matches!(self, PatternKind::Triple(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    #[test]
    fn triple_kind_reports_is_triple() {
        let t = TriplePattern::plain(
            Term::Variable("x".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        );
        let kind = PatternKind::Triple(Rc::new(t));
        assert!(kind.is_triple());
        assert!(!kind.is_filter());
    }
}
