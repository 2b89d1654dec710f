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
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::{relaxed_star_plan, CardinalityEstimator};
use crate::config::OptimizerConfig;
use crate::database::Database;
use crate::filter::Filter;
use crate::join_order::{self, Gearing, JoinOrder};
use crate::pattern::PatternKind;
use crate::query::Query;
use crate::search::{HGreedySearch, SearchAlgorithm};
use crate::term::Term;
use crate::triple_pattern::TriplePattern;
use crate::Result;

/// One in-flight walk: a running probability weight, the variable bindings
/// accumulated so far, and the depth-choice trail (`group`) that stratifies
/// the confidence interval (§4.5).
#[derive(Clone)]
struct Walk<V> {
    proba: f64,
    mu: HashMap<String, V>,
    group: String,
}

/// The resolved outcome of one `sample`/`id_sample` call, generalized over
/// string space (`V = String`) and id space (`V = u32`).
struct StepResult<V> {
    subject: Option<V>,
    predicate: Option<V>,
    object: Option<V>,
    cardinality: u64,
}

/// Abstracts the two structurally-identical walkers described in §4.5: the
/// string-space walker samples through [`Database::sample`] with `""` as
/// the unbound sentinel; the id-space walker samples through
/// [`Database::id_sample`] with `0`. Everything else — the recursive walk
/// computation, the path-atom closure, filtering, and aggregation — is
/// shared.
trait Space {
    type Value: Clone + PartialEq;

    fn wildcard() -> Self::Value;
    fn header(pattern: &TriplePattern, db: &dyn Database) -> Result<(Self::Value, Self::Value, Self::Value)>;
    fn sample(db: &dyn Database, s: &Self::Value, p: &Self::Value, o: &Self::Value) -> Result<StepResult<Self::Value>>;
    fn decode(db: &dyn Database, value: &Self::Value) -> Option<String>;
}

struct StrSpace;

impl Space for StrSpace {
    type Value = String;

    fn wildcard() -> String {
        String::new()
    }

    fn header(pattern: &TriplePattern, _db: &dyn Database) -> Result<(String, String, String)> {
        Ok(pattern.header())
    }

    fn sample(db: &dyn Database, s: &String, p: &String, o: &String) -> Result<StepResult<String>> {
        let r = db.sample(s, p, o)?;
        Ok(StepResult {
            subject: r.subject,
            predicate: r.predicate,
            object: r.object,
            cardinality: r.cardinality,
        })
    }

    fn decode(_db: &dyn Database, value: &String) -> Option<String> {
        Some(value.clone())
    }
}

struct IdSpace;

impl Space for IdSpace {
    type Value = u32;

    fn wildcard() -> u32 {
        0
    }

    fn header(pattern: &TriplePattern, db: &dyn Database) -> Result<(u32, u32, u32)> {
        pattern.header_ids(db)
    }

    fn sample(db: &dyn Database, s: &u32, p: &u32, o: &u32) -> Result<StepResult<u32>> {
        let r = db.id_sample(*s, *p, *o)?;
        let some_if_bound = |v: u32| if v == 0 { None } else { Some(v) };
        Ok(StepResult {
            subject: some_if_bound(r.subject),
            predicate: some_if_bound(r.predicate),
            object: some_if_bound(r.object),
            cardinality: r.cardinality,
        })
    }

    fn decode(db: &dyn Database, value: &u32) -> Option<String> {
        db.decode(*value)
    }
}

/// A triple pattern's header, with any endpoint already bound in `mu`
/// substituted in place of the pattern's own (unbound) header value.
fn live_header<S: Space>(
    pattern: &TriplePattern,
    mu: &HashMap<String, S::Value>,
    db: &dyn Database,
) -> Result<(S::Value, S::Value, S::Value)> {
    let (hs, hp, ho) = S::header(pattern, db)?;
    let live = |term: &Term, header_value: S::Value| match term {
        Term::Variable(name) => mu.get(name).cloned().unwrap_or(header_value),
        Term::Constant(_) => header_value,
    };
    Ok((live(&pattern.subject, hs), live(&pattern.predicate, hp), live(&pattern.object, ho)))
}

fn plain_step<S: Space>(db: &dyn Database, pattern: &TriplePattern, x: &[Walk<S::Value>]) -> Result<Vec<Walk<S::Value>>> {
    let mut y = Vec::with_capacity(x.len());
    for w in x {
        if w.proba == 0.0 {
            y.push(w.clone());
            continue;
        }
        let (hs, hp, ho) = live_header::<S>(pattern, &w.mu, db)?;
        let step = S::sample(db, &hs, &hp, &ho)?;
        if step.cardinality == 0 {
            y.push(Walk { proba: 0.0, mu: w.mu.clone(), group: w.group.clone() });
            continue;
        }
        let mut mu = w.mu.clone();
        for (term, value) in [
            (&pattern.subject, &step.subject),
            (&pattern.predicate, &step.predicate),
            (&pattern.object, &step.object),
        ] {
            if let (Term::Variable(name), Some(v)) = (term, value) {
                mu.insert(name.clone(), v.clone());
            }
        }
        y.push(Walk {
            proba: w.proba * step.cardinality as f64,
            mu,
            group: w.group.clone(),
        });
    }
    Ok(y)
}

fn filter_walks<S: Space>(db: &dyn Database, filter: &Filter, x: &[Walk<S::Value>]) -> Result<Vec<Walk<S::Value>>> {
    let mut y = Vec::with_capacity(x.len());
    for w in x {
        if w.proba == 0.0 {
            y.push(w.clone());
            continue;
        }
        let bindings: HashMap<String, Term> = w
            .mu
            .iter()
            .filter_map(|(name, value)| S::decode(db, value).map(|s| (name.clone(), Term::Constant(s))))
            .collect();
        if filter.eval(&bindings, db)? {
            y.push(w.clone());
        } else {
            y.push(Walk { proba: 0.0, mu: w.mu.clone(), group: w.group.clone() });
        }
    }
    Ok(y)
}

/// The path-atom closure step (§4.5 "Path-atom step"). Draws a per-walk
/// depth from a widening range and walks the property-path chain one hop at
/// a time, detecting cycles, before binding or checking the target
/// endpoint.
fn compute_closure<S: Space>(
    db: &dyn Database,
    pattern: &TriplePattern,
    gearing: Gearing,
    max_depth: usize,
    x: &[Walk<S::Value>],
    rng: &mut StdRng,
) -> Result<Vec<Walk<S::Value>>> {
    let (hs, hp, ho) = S::header(pattern, db)?;
    let (source_term, target_term, source_header, target_header) = match gearing {
        Gearing::Forward => (&pattern.subject, &pattern.object, hs, ho),
        Gearing::Reverse => (&pattern.object, &pattern.subject, ho, hs),
        Gearing::Plain => unreachable!("path atoms are never Plain-geared"),
    };
    let lowest: usize = if pattern.zero { 0 } else { 1 };
    let mut highest: usize = 1;

    let mut y = Vec::with_capacity(x.len());
    for w in x {
        let depth = rng.gen_range(lowest..=highest);
        let group = format!("{}{}", w.group, depth);
        if w.proba == 0.0 {
            y.push(Walk { proba: 0.0, mu: w.mu.clone(), group });
            continue;
        }

        let source_value = match source_term {
            Term::Constant(_) => source_header.clone(),
            Term::Variable(name) => w
                .mu
                .get(name)
                .cloned()
                .expect("path-atom source endpoint must already be bound by join-order invariants"),
        };
        let mut path: Vec<(S::Value, f64)> = vec![(source_value, w.proba)];
        let mut proba = w.proba;
        let cap = max_depth.min(highest).min(depth);
        while proba > 0.0 && path.len() <= cap {
            let tail = path.last().unwrap().0.clone();
            let step = if gearing == Gearing::Forward {
                S::sample(db, &tail, &hp, &S::wildcard())?
            } else {
                S::sample(db, &S::wildcard(), &hp, &tail)?
            };
            proba *= step.cardinality as f64;
            if proba > 0.0 {
                let node = if gearing == Gearing::Forward { step.object } else { step.subject };
                match node {
                    Some(node) if path.iter().any(|(seen, _)| *seen == node) => proba = 0.0,
                    Some(node) => path.push((node, proba)),
                    None => proba = 0.0,
                }
            }
        }
        highest = highest.max(path.len());

        if depth >= path.len() {
            y.push(Walk { proba: 0.0, mu: w.mu.clone(), group });
            continue;
        }
        let (node, node_proba) = path[depth].clone();
        let target_value: Option<S::Value> = match target_term {
            Term::Constant(_) => Some(target_header.clone()),
            Term::Variable(name) => w.mu.get(name).cloned(),
        };
        match target_value {
            None => {
                let mut mu = w.mu.clone();
                if let Term::Variable(name) = target_term {
                    mu.insert(name.clone(), node);
                }
                y.push(Walk { proba: node_proba, mu, group });
            }
            Some(t) if t == node => {
                y.push(Walk { proba: node_proba, mu: w.mu.clone(), group });
            }
            Some(_) => {
                y.push(Walk { proba: 0.0, mu: w.mu.clone(), group });
            }
        }
    }
    Ok(y)
}

/// Samples `join_order`'s walk array, memoized on the node itself (not on
/// an order-independent set hash): random-walk sampling consumes bindings
/// accumulated from the exact prior atoms in the exact order they were
/// joined, so two distinct chains covering the same pattern set must never
/// share a cached result.
fn compute_walks<S: Space>(
    db: &dyn Database,
    join_order: &JoinOrder,
    num_walks: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Result<Rc<Vec<Walk<S::Value>>>>
where
    S::Value: 'static,
{
    if let Some(cached) = join_order.scratch::<Vec<Walk<S::Value>>>() {
        return Ok(cached);
    }
    let walks: Rc<Vec<Walk<S::Value>>> = if join_order.is_root() {
        Rc::new(
            (0..num_walks)
                .map(|_| Walk { proba: 1.0, mu: HashMap::new(), group: String::new() })
                .collect(),
        )
    } else {
        let previous = join_order.previous().expect("non-root node has a previous node").clone();
        let x = compute_walks::<S>(db, &previous, num_walks, max_depth, rng)?;
        match join_order.pattern().expect("non-root node carries a pattern") {
            PatternKind::Filter(f) => Rc::new(filter_walks::<S>(db, f, &x)?),
            PatternKind::Triple(t) if t.is_path() => {
                Rc::new(compute_closure::<S>(db, t, join_order.gearing(), max_depth, &x, rng)?)
            }
            PatternKind::Triple(t) => Rc::new(plain_step::<S>(db, t, &x)?),
        }
    };
    Ok(join_order.get_or_init_scratch(|| walks))
}

fn compute_support<V>(walks: &[Walk<V>]) -> f64 {
    let total: f64 = walks.iter().map(|w| w.proba.min(1.0)).sum();
    total / walks.len() as f64
}

/// Mean and Student-t half-width, summed across the depth-choice strata
/// (§4.5 "Aggregation"). Strata with fewer than two members contribute
/// nothing — a single sample carries no estimate of its own variance.
fn process_walks<V>(walks: &[Walk<V>], confidence: f64) -> (f64, f64) {
    let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
    for w in walks {
        groups.entry(w.group.as_str()).or_default().push(w.proba);
    }
    let mut mean_sum = 0.0;
    let mut epsilon_sum = 0.0;
    for probas in groups.values() {
        let n = probas.len();
        if n <= 1 {
            continue;
        }
        let mean = probas.iter().sum::<f64>() / n as f64;
        let variance = probas.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
        let se = (variance / n as f64).sqrt();
        let t = StudentsT::new(0.0, 1.0, (n - 1) as f64).expect("n > 1 implies positive degrees of freedom");
        let z = t.inverse_cdf((1.0 + confidence) / 2.0);
        mean_sum += mean;
        epsilon_sum += z * se;
    }
    (mean_sum, epsilon_sum)
}

/// Sampling-based estimator (§4.5): generates `num_walks` attempted
/// instantiations of a plan prefix and aggregates their weights into a
/// cardinality estimate with a Student-t confidence interval.
pub struct RandomWalksEstimator<'db> {
    database: &'db dyn Database,
    num_walks: usize,
    max_depth: usize,
    confidence: f64,
    relax_stars: bool,
    optimize_walk_plans: bool,
    beam_size: usize,
    beam_extra: usize,
    plan_cache: RefCell<HashMap<u128, JoinOrder>>,
    rng: RefCell<StdRng>,
}

impl<'db> RandomWalksEstimator<'db> {
    pub fn new(database: &'db dyn Database, config: &OptimizerConfig, seed: u64) -> Self {
        RandomWalksEstimator {
            database,
            num_walks: config.num_walks,
            max_depth: config.max_depth,
            confidence: config.confidence,
            relax_stars: config.relax_stars,
            optimize_walk_plans: config.optimize_walk_plans,
            beam_size: config.beam_size,
            beam_extra: config.beam_extra,
            plan_cache: RefCell::new(HashMap::new()),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Reorders a walk plan's atoms purely for sampling efficiency, using
    /// an h-greedy search over the VoID estimator (§4.5 "Walk plan
    /// optimization"). Cached by `k1` since the reordering only depends on
    /// the prefix's pattern set, not its history.
    fn optimize_walk_plan(&self, plan: &JoinOrder) -> Result<JoinOrder> {
        let key = plan.k1();
        if let Some(cached) = self.plan_cache.borrow().get(&key) {
            return Ok(Rc::clone(cached));
        }
        let query = Query {
            name: String::new(),
            patterns: join_order::get_patterns(plan),
            filters: join_order::get_filters(plan),
        };
        let void = VoidEstimatorRef(self.database, self.relax_stars);
        let search = HGreedySearch::new(&void, 1, 1);
        let reordered = search.run(&query)?;
        self.plan_cache.borrow_mut().insert(key, Rc::clone(&reordered));
        Ok(reordered)
    }
}

/// A thin local alias so `optimize_walk_plan` does not need to depend on
/// the concrete `estimators::void` module beyond the trait it implements.
struct VoidEstimatorRef<'db>(&'db dyn Database, bool);

impl<'db> CardinalityEstimator for VoidEstimatorRef<'db> {
    fn estimate(&self, join_order: &JoinOrder) -> Result<()> {
        super::VoidEstimator::new(self.0, self.1).estimate(join_order)
    }
}

impl<'db> CardinalityEstimator for RandomWalksEstimator<'db> {
    fn estimate(&self, join_order: &JoinOrder) -> Result<()> {
        let timer = Instant::now();
        let patterns = join_order::get_patterns(join_order);

        if join_order.size() == 1 && !patterns[0].is_path() {
            let (hs, hp, ho) = patterns[0].header();
            join_order.set_cardinality(self.database.cardinality(&hs, &hp, &ho)? as f64);
            join_order.set_support(1.0);
            join_order.set_estimation_time(timer.elapsed().as_secs_f64());
            return Ok(());
        }

        let mut walk_plan = relaxed_star_plan(join_order, self.relax_stars);
        if self.optimize_walk_plans {
            walk_plan = self.optimize_walk_plan(&walk_plan)?;
        }

        let first = join_order::first(&walk_plan).expect("a non-empty plan has a first node");
        let first_pattern = match first.pattern() {
            Some(PatternKind::Triple(t)) => t,
            _ => unreachable!("the first node of a plan is always a triple pattern"),
        };
        let (hs, _hp, ho) = first_pattern.header();
        let use_string_space = hs.is_empty() && ho.is_empty();

        let mut rng_ref = self.rng.borrow_mut();
        let rng: &mut StdRng = &mut rng_ref;
        let (cardinality, epsilon, support) = if use_string_space {
            let walks = compute_walks::<StrSpace>(self.database, &walk_plan, self.num_walks, self.max_depth, rng)?;
            let (m, h) = process_walks(&walks, self.confidence);
            (m, h, compute_support(&walks))
        } else {
            let walks = compute_walks::<IdSpace>(self.database, &walk_plan, self.num_walks, self.max_depth, rng)?;
            let (m, h) = process_walks(&walks, self.confidence);
            (m, h, compute_support(&walks))
        };

        join_order.set_cardinality(cardinality);
        join_order.set_epsilon(epsilon);
        join_order.set_support(support);
        join_order.set_estimation_time(timer.elapsed().as_secs_f64());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryDatabase;
    use crate::join_order::JoinOrderNode;
    use crate::term::Term;

    fn sample_graph() -> MemoryDatabase {
        let triples = vec![
            ("<A>".to_string(), "<p>".to_string(), "<B>".to_string()),
            ("<B>".to_string(), "<p>".to_string(), "<C>".to_string()),
            ("<C>".to_string(), "<p>".to_string(), "<D>".to_string()),
            ("<A>".to_string(), "<q>".to_string(), "<X>".to_string()),
        ];
        MemoryDatabase::new(&triples, 7)
    }

    #[test]
    fn single_plain_atom_bypasses_sampling() {
        let db = sample_graph();
        let config = OptimizerConfig::default();
        let estimator = RandomWalksEstimator::new(&db, &config, 42);
        let root = JoinOrderNode::root();
        let tp = TriplePattern::plain(
            Term::Constant("<A>".into()),
            Term::Constant("<p>".into()),
            Term::Constant("<B>".into()),
        );
        let node = join_order::extend(&root, PatternKind::Triple(Rc::new(tp)), Gearing::Plain, false);
        estimator.estimate(&node).unwrap();
        assert_eq!(node.cardinality(), 1.0);
        assert_eq!(node.support(), 1.0);
    }

    #[test]
    fn path_atom_walk_finds_a_reachable_target() {
        let db = sample_graph();
        let mut config = OptimizerConfig::default();
        config.num_walks = 200;
        config.max_depth = 5;
        config.optimize_walk_plans = false;
        let estimator = RandomWalksEstimator::new(&db, &config, 1);
        let root = JoinOrderNode::root();
        let tp = TriplePattern::path(
            Term::Constant("<A>".into()),
            Term::Constant("<p>".into()),
            Term::Constant("<D>".into()),
            false,
        );
        let node = join_order::extend(&root, PatternKind::Triple(Rc::new(tp)), Gearing::Forward, false);
        estimator.estimate(&node).unwrap();
        assert!(node.cardinality() >= 0.0);
        assert!(node.support() >= 0.0 && node.support() <= 1.0);
    }

    #[test]
    fn two_joined_plain_atoms_produce_positive_support() {
        let db = sample_graph();
        let mut config = OptimizerConfig::default();
        config.num_walks = 200;
        config.optimize_walk_plans = false;
        let estimator = RandomWalksEstimator::new(&db, &config, 3);
        let root = JoinOrderNode::root();
        let a = TriplePattern::plain(
            Term::Constant("<A>".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        );
        let n1 = join_order::extend(&root, PatternKind::Triple(Rc::new(a)), Gearing::Plain, false);
        estimator.estimate(&n1).unwrap();
        let b = TriplePattern::plain(
            Term::Variable("y".into()),
            Term::Constant("<p>".into()),
            Term::Variable("z".into()),
        );
        let n2 = join_order::extend(&n1, PatternKind::Triple(Rc::new(b)), Gearing::Plain, false);
        estimator.estimate(&n2).unwrap();
        assert!(n2.support() > 0.0);
    }

    #[test]
    fn two_distinct_chains_sharing_a_k1_never_share_cached_walks() {
        // Regression test: `compute_walks` used to memoize by `k0`/`k1`
        // (an order-independent pattern-set hash) in a cross-node cache, so
        // a second distinct chain reaching the same pattern set would
        // silently reuse the first chain's sampled walks instead of
        // sampling its own.
        let db = sample_graph();
        let mut config = OptimizerConfig::default();
        config.num_walks = 200;
        config.optimize_walk_plans = false;
        let estimator = RandomWalksEstimator::new(&db, &config, 5);

        let a = Rc::new(TriplePattern::plain(
            Term::Constant("<A>".into()),
            Term::Constant("<p>".into()),
            Term::Variable("y".into()),
        ));
        let b = Rc::new(TriplePattern::plain(
            Term::Variable("y".into()),
            Term::Constant("<p>".into()),
            Term::Variable("z".into()),
        ));

        let root = JoinOrderNode::root();
        let plan1_step1 = join_order::extend(&root, PatternKind::Triple(Rc::clone(&a)), Gearing::Plain, false);
        let plan1 = join_order::extend(&plan1_step1, PatternKind::Triple(Rc::clone(&b)), Gearing::Plain, false);

        let plan2_step1 = join_order::extend(&root, PatternKind::Triple(Rc::clone(&a)), Gearing::Plain, false);
        let plan2 = join_order::extend(&plan2_step1, PatternKind::Triple(Rc::clone(&b)), Gearing::Plain, false);
        assert_eq!(plan1.k1(), plan2.k1());
        assert!(!Rc::ptr_eq(&plan1, &plan2));

        estimator.estimate(&plan1).unwrap();
        estimator.estimate(&plan2).unwrap();

        let walks1 = plan1.scratch::<Vec<Walk<String>>>().expect("plan1 caches its own walks");
        let walks2 = plan2.scratch::<Vec<Walk<String>>>().expect("plan2 caches its own walks");
        assert!(!Rc::ptr_eq(&walks1, &walks2), "each chain must sample and cache its own walk array");
    }
}
