/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::filter::Filter;
use crate::pattern::{Pattern, PatternKind};
use crate::term::PatternId;
use crate::triple_pattern::TriplePattern;

/// Direction of traversal for a path atom on a `JoinOrder` node. `Plain`
/// carries no direction (non-path atoms, or the root).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gearing {
    Plain,
    Forward,
    Reverse,
}

/// One node of the persistent, structurally-shared plan tree (§3, §9). The
/// chain from any node back to the (pattern-less) root is the left-deep
/// join prefix that node represents.
pub struct JoinOrderNode {
    pattern: Option<PatternKind>,
    gearing: Gearing,
    previous: Option<JoinOrder>,
    children: RefCell<Vec<JoinOrder>>,

    k0: OnceCell<u128>,
    k1: OnceCell<u128>,
    k2: OnceCell<u128>,
    size: OnceCell<usize>,
    variables: OnceCell<HashSet<String>>,

    cardinality: Cell<Option<f64>>,
    epsilon: Cell<Option<f64>>,
    support: Cell<Option<f64>>,
    estimation_time: Cell<Option<f64>>,

    /// Type-erased memo slot for a sampling estimator's per-node scratch
    /// data (e.g. the random-walks estimator's sampled walk array). Keyed
    /// to this exact node rather than to `k0`/`k1`, since sampling is
    /// order-dependent: two nodes covering the same pattern set but
    /// assembled along different chains must not share a cached result.
    scratch: OnceCell<Rc<dyn Any>>,
}

/// A reference-counted handle to a plan node; cheap to clone, shared across
/// every descendant that extends the same prefix.
pub type JoinOrder = Rc<JoinOrderNode>;

impl JoinOrderNode {
    /// The empty root prefix of a plan.
    pub fn root() -> JoinOrder {
        Rc::new(JoinOrderNode {
            pattern: None,
            gearing: Gearing::Plain,
            previous: None,
            children: RefCell::new(Vec::new()),
            k0: OnceCell::new(),
            k1: OnceCell::new(),
            k2: OnceCell::new(),
            size: OnceCell::new(),
            variables: OnceCell::new(),
            cardinality: Cell::new(None),
            epsilon: Cell::new(None),
            support: Cell::new(None),
            estimation_time: Cell::new(None),
            scratch: OnceCell::new(),
        })
    }

    pub fn is_root(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn pattern(&self) -> Option<&PatternKind> {
        self.pattern.as_ref()
    }

    pub fn gearing(&self) -> Gearing {
        self.gearing
    }

    pub fn previous(&self) -> Option<&JoinOrder> {
        self.previous.as_ref()
    }

    pub fn children(&self) -> Vec<JoinOrder> {
        self.children.borrow().clone()
    }

    /// Whether `pattern` may legally extend this prefix: a triple pattern
    /// may join an empty prefix or must share a variable with it; a filter
    /// must have all of its free variables already bound.
    pub fn compatible(&self, pattern: &PatternKind) -> bool {
        match pattern {
            PatternKind::Triple(_) => {
                self.is_root() || !self.variables().is_disjoint(&pattern.variables())
            }
            PatternKind::Filter(f) => f.variables().is_subset(self.variables()),
        }
    }

    /// Number of triple-pattern nodes on the chain (filters do not count).
    pub fn size(&self) -> usize {
        *self.size.get_or_init(|| match &self.previous {
            None => 0,
            Some(prev) => prev.size() + matches!(self.pattern, Some(PatternKind::Triple(_))) as usize,
        })
    }

    /// Union of variables of all triple patterns on the chain.
    pub fn variables(&self) -> &HashSet<String> {
        self.variables.get_or_init(|| match (&self.previous, &self.pattern) {
            (None, _) => HashSet::new(),
            (Some(prev), Some(PatternKind::Triple(t))) => {
                let mut vars = prev.variables().clone();
                vars.extend(t.variables());
                vars
            }
            (Some(prev), _) => prev.variables().clone(),
        })
    }

    /// Set-identity key: order-independent combination of every pattern id
    /// (triples and filters) on the chain.
    pub fn k0(&self) -> u128 {
        *self.k0.get_or_init(|| self.fold_ids(true))
    }

    /// Plan-identity key up to the triple-pattern set: XOR of triple ids.
    pub fn k1(&self) -> u128 {
        *self.k1.get_or_init(|| self.fold_ids(false))
    }

    /// Path-diversity key: XOR of path-atom ids only (0 if none on chain).
    pub fn k2(&self) -> u128 {
        *self.k2.get_or_init(|| match (&self.previous, &self.pattern) {
            (None, _) => 0,
            (Some(prev), Some(PatternKind::Triple(t))) if t.is_path() => prev.k2() ^ t.id().as_u128(),
            (Some(prev), _) => prev.k2(),
        })
    }

    fn fold_ids(&self, include_filters: bool) -> u128 {
        match (&self.previous, &self.pattern) {
            (None, _) => 0,
            (Some(prev), Some(PatternKind::Triple(t))) => prev.fold_ids(include_filters) ^ t.id().as_u128(),
            (Some(prev), Some(PatternKind::Filter(f))) => {
                let base = prev.fold_ids(include_filters);
                if include_filters {
                    base ^ f.id().as_u128()
                } else {
                    base
                }
            }
            (Some(prev), None) => prev.fold_ids(include_filters),
        }
    }

    pub fn cardinality(&self) -> f64 {
        self.cardinality.get().unwrap_or(0.0)
    }

    pub fn set_cardinality(&self, value: f64) {
        self.cardinality.set(Some(value));
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon.get().unwrap_or(0.0)
    }

    pub fn set_epsilon(&self, value: f64) {
        self.epsilon.set(Some(value));
    }

    pub fn support(&self) -> f64 {
        self.support.get().unwrap_or(0.0)
    }

    pub fn set_support(&self, value: f64) {
        self.support.set(Some(value));
    }

    pub fn estimation_time(&self) -> f64 {
        self.estimation_time.get().unwrap_or(0.0)
    }

    pub fn set_estimation_time(&self, value: f64) {
        self.estimation_time.set(Some(value));
    }

    /// `cost(root) = cardinality(root)`; `cost(n) = cost(parent) +
    /// max(cardinality(parent), cardinality(n))` (§3).
    pub fn cost(&self) -> f64 {
        match &self.previous {
            None => self.cardinality(),
            Some(prev) => prev.cost() + self.cardinality().max(prev.cardinality()),
        }
    }

    /// Fetch this node's scratch memo if it was set with value type `T`,
    /// `None` if unset or set with some other type.
    pub fn scratch<T: 'static>(&self) -> Option<Rc<T>> {
        self.scratch.get().and_then(|any| Rc::clone(any).downcast::<T>().ok())
    }

    /// Fetch this node's scratch memo, computing and storing it via `init`
    /// on first access. Panics if the slot was already populated with a
    /// different type than `T` — a caller bug, since each node is only ever
    /// scratch-cached by one collaborator.
    pub fn get_or_init_scratch<T: 'static, F: FnOnce() -> Rc<T>>(&self, init: F) -> Rc<T> {
        let any = self.scratch.get_or_init(|| init() as Rc<dyn Any>);
        Rc::clone(any)
            .downcast::<T>()
            .expect("scratch memo already populated with a different type")
    }
}

impl PartialEq for JoinOrderNode {
    fn eq(&self, other: &Self) -> bool {
        self.k0() == other.k0()
    }
}

impl Eq for JoinOrderNode {}

impl Hash for JoinOrderNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.k0().hash(state);
    }
}

/// Append a new extension of `parent`, optionally remembering it among
/// `parent`'s children for post-hoc reporting (§4.2).
pub fn extend(parent: &JoinOrder, pattern: PatternKind, gearing: Gearing, remember: bool) -> JoinOrder {
    let node = Rc::new(JoinOrderNode {
        pattern: Some(pattern),
        gearing,
        previous: Some(Rc::clone(parent)),
        children: RefCell::new(Vec::new()),
        k0: OnceCell::new(),
        k1: OnceCell::new(),
        k2: OnceCell::new(),
        size: OnceCell::new(),
        variables: OnceCell::new(),
        cardinality: Cell::new(None),
        epsilon: Cell::new(None),
        support: Cell::new(None),
        estimation_time: Cell::new(None),
        scratch: OnceCell::new(),
    });
    if remember {
        parent.children.borrow_mut().push(Rc::clone(&node));
    }
    node
}

/// Ordered list of non-root ancestors plus `node` itself.
pub fn decompose(node: &JoinOrder) -> Vec<JoinOrder> {
    let mut chain = Vec::new();
    let mut cur = Some(Rc::clone(node));
    while let Some(n) = cur {
        if n.is_root() {
            break;
        }
        cur = n.previous.clone();
        chain.push(n);
    }
    chain.reverse();
    chain
}

pub fn get_patterns(node: &JoinOrder) -> Vec<Rc<TriplePattern>> {
    decompose(node)
        .into_iter()
        .filter_map(|n| {
            n.pattern.clone().and_then(|p| match p {
                PatternKind::Triple(t) => Some(t),
                PatternKind::Filter(_) => None,
            })
        })
        .collect()
}

pub fn get_filters(node: &JoinOrder) -> Vec<Rc<Filter>> {
    decompose(node)
        .into_iter()
        .filter_map(|n| {
            n.pattern.clone().and_then(|p| match p {
                PatternKind::Filter(f) => Some(f),
                PatternKind::Triple(_) => None,
            })
        })
        .collect()
}

pub fn contains(node: &JoinOrder, id: PatternId) -> bool {
    decompose(node).iter().any(|n| n.pattern().map(|p| p.id()) == Some(id))
}

pub fn first(node: &JoinOrder) -> Option<JoinOrder> {
    decompose(node).into_iter().next()
}

pub fn root_of(node: &JoinOrder) -> JoinOrder {
    let mut cur = Rc::clone(node);
    while let Some(prev) = cur.previous.clone() {
        cur = prev;
    }
    cur
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn triple(s: &str, p: &str, o: &str) -> PatternKind {
        PatternKind::Triple(Rc::new(TriplePattern::plain(
            Term::Variable(s.to_string()),
            Term::Constant(p.to_string()),
            Term::Variable(o.to_string()),
        )))
    }

    #[test]
    fn root_has_size_zero_and_no_variables() {
        let root = JoinOrderNode::root();
        assert_eq!(root.size(), 0);
        assert!(root.variables().is_empty());
        assert_eq!(root.cost(), 0.0);
    }

    #[test]
    fn extend_increments_size_and_unions_variables() {
        let root = JoinOrderNode::root();
        let n1 = extend(&root, triple("x", "<p>", "y"), Gearing::Plain, true);
        assert_eq!(n1.size(), 1);
        assert!(n1.variables().contains("x"));
        assert!(n1.variables().contains("y"));
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn cost_accumulates_max_of_parent_and_self_cardinality() {
        let root = JoinOrderNode::root();
        let n1 = extend(&root, triple("x", "<p>", "y"), Gearing::Plain, false);
        n1.set_cardinality(10.0);
        let n2 = extend(&n1, triple("y", "<q>", "z"), Gearing::Plain, false);
        n2.set_cardinality(5.0);
        // cost(n1) = cost(root) + max(card(root), card(n1)) = 0 + max(0,10) = 10
        // cost(n2) = cost(n1) + max(card(n1), card(n2)) = 10 + max(10,5) = 20
        assert_eq!(n2.cost(), 20.0);
    }

    #[test]
    fn k1_is_order_independent_over_the_same_pattern_set() {
        let root = JoinOrderNode::root();
        let a_rc = Rc::new(TriplePattern::plain(
            Term::Variable("x".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        ));
        let b_rc = Rc::new(TriplePattern::plain(
            Term::Variable("y".into()),
            Term::Constant("<q>".into()),
            Term::Variable("z".into()),
        ));

        let plan1_step1 = extend(&root, PatternKind::Triple(Rc::clone(&a_rc)), Gearing::Plain, false);
        let plan1 = extend(&plan1_step1, PatternKind::Triple(Rc::clone(&b_rc)), Gearing::Plain, false);
        let plan2_step1 = extend(&root, PatternKind::Triple(Rc::clone(&b_rc)), Gearing::Plain, false);
        let plan2 = extend(&plan2_step1, PatternKind::Triple(Rc::clone(&a_rc)), Gearing::Plain, false);
        assert_eq!(plan1.k1(), plan2.k1());
    }

    #[test]
    fn decompose_returns_the_chain_in_extension_order() {
        let root = JoinOrderNode::root();
        let n1 = extend(&root, triple("x", "<p>", "y"), Gearing::Plain, false);
        let n2 = extend(&n1, triple("y", "<q>", "z"), Gearing::Plain, false);
        let chain = decompose(&n2);
        assert_eq!(chain.len(), 2);
        assert!(Rc::ptr_eq(&chain[0], &n1));
        assert!(Rc::ptr_eq(&chain[1], &n2));
    }

    #[test]
    fn contains_detects_a_pattern_already_on_the_chain() {
        let root = JoinOrderNode::root();
        let a_rc = Rc::new(TriplePattern::plain(
            Term::Variable("x".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        ));
        let n1 = extend(&root, PatternKind::Triple(Rc::clone(&a_rc)), Gearing::Plain, false);
        assert!(contains(&n1, a_rc.id()));
    }

    #[test]
    fn scratch_memo_is_isolated_per_node_even_with_identical_k1() {
        let root = JoinOrderNode::root();
        let a_rc = Rc::new(TriplePattern::plain(
            Term::Variable("x".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        ));
        let b_rc = Rc::new(TriplePattern::plain(
            Term::Variable("y".into()),
            Term::Constant("<q>".into()),
            Term::Variable("z".into()),
        ));
        let plan1_step1 = extend(&root, PatternKind::Triple(Rc::clone(&a_rc)), Gearing::Plain, false);
        let plan1 = extend(&plan1_step1, PatternKind::Triple(Rc::clone(&b_rc)), Gearing::Plain, false);
        let plan2_step1 = extend(&root, PatternKind::Triple(Rc::clone(&b_rc)), Gearing::Plain, false);
        let plan2 = extend(&plan2_step1, PatternKind::Triple(Rc::clone(&a_rc)), Gearing::Plain, false);
        assert_eq!(plan1.k1(), plan2.k1());

        plan1.get_or_init_scratch(|| Rc::new(vec![1u32, 2, 3]));
        assert!(plan2.scratch::<Vec<u32>>().is_none());
    }
}
