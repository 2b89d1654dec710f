/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::cell::RefCell;
use std::collections::HashSet;

use crate::database::Database;
use crate::filter::Filter;
use crate::pattern::Pattern;
use crate::term::{PatternId, Term};

/// One atom of a basic graph pattern: a plain triple when `zero == more ==
/// false`, or a property-path atom (`+` when `more`, `*` when `zero &&
/// more`) otherwise.
#[derive(Debug)]
pub struct TriplePattern {
    id: PatternId,
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub zero: bool,
    pub more: bool,
    relax_subject_cache: RefCell<Option<Box<(TriplePattern, Filter)>>>,
    relax_object_cache: RefCell<Option<Box<(TriplePattern, Filter)>>>,
}

impl TriplePattern {
    pub fn new(subject: Term, predicate: Term, object: Term, zero: bool, more: bool) -> Self {
        TriplePattern {
            id: PatternId::new(),
            subject,
            predicate,
            object,
            zero,
            more,
            relax_subject_cache: RefCell::new(None),
            relax_object_cache: RefCell::new(None),
        }
    }

    pub fn plain(subject: Term, predicate: Term, object: Term) -> Self {
        Self::new(subject, predicate, object, false, false)
    }

    pub fn path(subject: Term, predicate: Term, object: Term, zero: bool) -> Self {
        Self::new(subject, predicate, object, zero, true)
    }

    pub fn is_path(&self) -> bool {
        self.more
    }

    /// The string-space header form `(hs, hp, ho)`: variable positions
    /// become the empty-string wildcard sentinel.
    pub fn header(&self) -> (String, String, String) {
        let h = |t: &Term| match t {
            Term::Variable(_) => String::new(),
            Term::Constant(c) => c.clone(),
        };
        (h(&self.subject), h(&self.predicate), h(&self.object))
    }

    /// The numeric-id-space header form, resolved through a database's term
    /// dictionary; unbound/variable positions are `0`.
    pub fn header_ids(&self, db: &dyn Database) -> crate::Result<(u32, u32, u32)> {
        let id = |t: &Term, lookup: &dyn Fn(&str) -> crate::Result<u32>| match t {
            Term::Variable(_) => Ok(0u32),
            Term::Constant(c) => lookup(c),
        };
        Ok((
            id(&self.subject, &|c| db.subject_id(c))?,
            id(&self.predicate, &|c| db.predicate_id(c))?,
            id(&self.object, &|c| db.object_id(c))?,
        ))
    }

    /// Replace a constant subject by a fresh variable plus an equality
    /// post-filter, memoized so repeated calls on the same pattern reuse the
    /// same fresh variable name.
    pub fn relax_subject(&self) -> (TriplePattern, Filter) {
        self.relax_endpoint(&self.relax_subject_cache, true)
    }

    /// Replace a constant object by a fresh variable plus an equality
    /// post-filter, memoized the same way as `relax_subject`.
    pub fn relax_object(&self) -> (TriplePattern, Filter) {
        self.relax_endpoint(&self.relax_object_cache, false)
    }

    fn relax_endpoint(
        &self,
        cache: &RefCell<Option<Box<(TriplePattern, Filter)>>>,
        relax_subject: bool,
    ) -> (TriplePattern, Filter) {
        if let Some(cached) = cache.borrow().as_ref() {
            return (cached.0.shallow_clone(), cached.1.clone());
        }
        let fresh_var = format!("?v{}", self.id.as_u128() % 1_000_000);
        let (subject, object, bound) = if relax_subject {
            (Term::Variable(fresh_var.clone()), self.object.clone(), self.subject.clone())
        } else {
            (self.subject.clone(), Term::Variable(fresh_var.clone()), self.object.clone())
        };
        let relaxed = TriplePattern::new(subject, self.predicate.clone(), object, self.zero, self.more);
        let eq_filter = Filter::relational_eq(Term::Variable(fresh_var), bound);
        *cache.borrow_mut() = Some(Box::new((relaxed.shallow_clone(), eq_filter.clone())));
        (relaxed, eq_filter)
    }

    /// A structural copy sharing no relaxation cache of its own; relaxation
    /// is keyed by the *original* pattern's identity, not a copy's.
    fn shallow_clone(&self) -> TriplePattern {
        TriplePattern {
            id: self.id,
            subject: self.subject.clone(),
            predicate: self.predicate.clone(),
            object: self.object.clone(),
            zero: self.zero,
            more: self.more,
            relax_subject_cache: RefCell::new(None),
            relax_object_cache: RefCell::new(None),
        }
    }
}

impl Pattern for TriplePattern {
    fn id(&self) -> PatternId {
        self.id
    }

    fn variables(&self) -> HashSet<String> {
        let mut vars = HashSet::new();
        for t in [&self.subject, &self.predicate, &self.object] {
            if let Term::Variable(name) = t {
                vars.insert(name.clone());
            }
        }
        vars
    }

    fn is_triple(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Term {
        Term::Variable(name.to_string())
    }

    fn constant(iri: &str) -> Term {
        Term::Constant(iri.to_string())
    }

    #[test]
    fn header_replaces_variables_with_empty_string() {
        let tp = TriplePattern::plain(constant("<A>"), constant("<p>"), var("o"));
        assert_eq!(tp.header(), ("<A>".to_string(), "<p>".to_string(), String::new()));
    }

    #[test]
    fn variables_collects_only_variable_positions() {
        let tp = TriplePattern::plain(var("s"), constant("<p>"), var("o"));
        let vars = tp.variables();
        assert_eq!(vars.len(), 2);
        assert!(vars.contains("s"));
        assert!(vars.contains("o"));
    }

    #[test]
    fn relax_object_is_memoized_across_calls() {
        let tp = TriplePattern::path(constant("<A>"), constant("<p>"), constant("<B>"), false);
        let (relaxed1, filter1) = tp.relax_object();
        let (relaxed2, filter2) = tp.relax_object();
        assert_eq!(relaxed1.object.as_variable(), relaxed2.object.as_variable());
        assert_eq!(filter1.variables(), filter2.variables());
    }

    #[test]
    fn relax_subject_turns_constant_into_variable() {
        let tp = TriplePattern::path(constant("<A>"), constant("<p>"), var("x"), false);
        let (relaxed, _filter) = tp.relax_subject();
        assert!(relaxed.subject.is_variable());
    }
}
