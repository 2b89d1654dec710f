/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

extern crate criterion;
extern crate join_order_optimizer;

use criterion::*;

use join_order_optimizer::database::MemoryDatabase;
use join_order_optimizer::estimators::VoidEstimator;
use join_order_optimizer::query::Query;
use join_order_optimizer::search::{DPSearch, GreedySearch, HGreedySearch, SearchAlgorithm};
use join_order_optimizer::term::Term;
use join_order_optimizer::triple_pattern::TriplePattern;

fn synthetic_database() -> MemoryDatabase {
    let mut triples = Vec::new();
    for i in 0..1_000 {
        triples.push((format!("<e{}>", i), "<type>".to_string(), "<Employee>".to_string()));
        triples.push((format!("<e{}>", i), "<worksAt>".to_string(), format!("<d{}>", i % 20)));
        triples.push((format!("<e{}>", i), "<salary>".to_string(), format!("\"{}\"", 40_000 + i)));
        triples.push((format!("<d{}>", i % 20), "<locatedIn>".to_string(), format!("<c{}>", i % 5)));
    }
    MemoryDatabase::new(&triples, 42)
}

fn sample_query() -> Query {
    Query::new("employees-by-department")
        .with_pattern(TriplePattern::plain(
            Term::Variable("employee".into()),
            Term::Constant("<type>".into()),
            Term::Constant("<Employee>".into()),
        ))
        .with_pattern(TriplePattern::plain(
            Term::Variable("employee".into()),
            Term::Constant("<worksAt>".into()),
            Term::Variable("department".into()),
        ))
        .with_pattern(TriplePattern::plain(
            Term::Variable("department".into()),
            Term::Constant("<locatedIn>".into()),
            Term::Variable("city".into()),
        ))
}

fn bench_search_strategies(c: &mut Criterion) {
    let db = synthetic_database();
    let void = VoidEstimator::new(&db, true);
    let query = sample_query();

    c.bench_function("dp_search", |b| {
        let search = DPSearch::new(&void);
        b.iter(|| search.run(black_box(&query)).unwrap())
    });

    c.bench_function("greedy_search beam=2", |b| {
        let search = GreedySearch::new(&void, 2);
        b.iter(|| search.run(black_box(&query)).unwrap())
    });

    c.bench_function("hgreedy_search beam=2 extra=1", |b| {
        let search = HGreedySearch::new(&void, 2, 1);
        b.iter(|| search.run(black_box(&query)).unwrap())
    });
}

criterion_group!(benches, bench_search_strategies);
criterion_main!(benches);
