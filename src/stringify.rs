/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Rendering a chosen `JoinOrder` back to SPARQL text, forcing the join
//! order the optimizer picked onto a target engine (§6, §9-FULL).
//!
//! Virtuoso is forced via `DEFINE sql:select-option "order"` plus a
//! `TRANSITIVE, t_direction` hint on path atoms; Blazegraph is forced via
//! the `hint:Query hint:optimizer "None"` / `hint:Prior hint:gearing` query
//! hints. Both targets relax a bound path-atom endpoint into a fresh
//! variable plus an equality `FILTER` so the transitive-closure hint never
//! has to search from a literal IRI in the wrong direction.

use crate::filter::{Expression, Filter, RelOp};
use crate::join_order::{self, Gearing, JoinOrder};
use crate::pattern::PatternKind;
use crate::term::Term;
use crate::triple_pattern::TriplePattern;

/// Which engine's query-hint dialect to render for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Virtuoso,
    Blazegraph,
}

/// Render `plan`'s full join order as a `SELECT DISTINCT *` SPARQL query
/// whose pattern order and direction hints force `target` to execute it
/// exactly as planned.
pub fn stringify(plan: &JoinOrder, target: Target) -> String {
    let mut lines = Vec::new();
    for node in join_order::decompose(plan) {
        match node.pattern() {
            Some(PatternKind::Triple(t)) if t.is_path() => {
                lines.extend(stringify_path_atom(t, node.gearing(), target));
            }
            Some(PatternKind::Triple(t)) => lines.push(format!("\t{} .", stringify_triple(t))),
            Some(PatternKind::Filter(f)) => lines.push(format!("\t{} .", stringify_filter(f))),
            None => {}
        }
    }

    match target {
        Target::Blazegraph => {
            lines.insert(0, "\thint:Query hint:optimizer \"None\" .".to_string());
            format!("SELECT DISTINCT * WHERE {{\n{}\n}}", lines.join("\n"))
        }
        Target::Virtuoso => format!(
            "DEFINE sql:select-option \"order\" SELECT DISTINCT * WHERE {{\n{}\n}}",
            lines.join("\n")
        ),
    }
}

fn stringify_path_atom(t: &TriplePattern, gearing: Gearing, target: Target) -> Vec<String> {
    match target {
        Target::Blazegraph => {
            let hint = match gearing {
                Gearing::Forward => "forward",
                Gearing::Reverse | Gearing::Plain => "reverse",
            };
            vec![
                format!("\t{} .", stringify_path_triple(t)),
                format!("\thint:Prior hint:gearing \"{}\" .", hint),
            ]
        }
        Target::Virtuoso => match gearing {
            Gearing::Forward if !t.object.is_variable() => {
                let (relaxed, filter) = t.relax_object();
                vec![
                    format!("\t{} .", stringify_path_triple_hinted(&relaxed, 1)),
                    format!("\t{} .", stringify_filter(&filter)),
                ]
            }
            Gearing::Forward => vec![format!("\t{} .", stringify_path_triple_hinted(t, 1))],
            Gearing::Reverse if !t.subject.is_variable() => {
                let (relaxed, filter) = t.relax_subject();
                vec![
                    format!("\t{} .", stringify_path_triple_hinted(&relaxed, 2)),
                    format!("\t{} .", stringify_filter(&filter)),
                ]
            }
            Gearing::Reverse => vec![format!("\t{} .", stringify_path_triple_hinted(t, 2))],
            Gearing::Plain => vec![format!("\t{} .", stringify_path_triple(t))],
        },
    }
}

fn render_var(name: &str) -> String {
    if let Some(stripped) = name.strip_prefix('?') {
        format!("?{}", stripped)
    } else {
        format!("?{}", name)
    }
}

fn render_term(term: &Term) -> String {
    match term {
        Term::Variable(name) => render_var(name),
        Term::Constant(value) => value.clone(),
    }
}

fn stringify_triple(t: &TriplePattern) -> String {
    format!("{} {} {}", render_term(&t.subject), render_term(&t.predicate), render_term(&t.object))
}

fn stringify_path_predicate(t: &TriplePattern) -> String {
    let suffix = if t.zero { "*" } else { "+" };
    format!("{}{}", render_term(&t.predicate), suffix)
}

fn stringify_path_triple(t: &TriplePattern) -> String {
    format!(
        "{} {} {}",
        render_term(&t.subject),
        stringify_path_predicate(t),
        render_term(&t.object)
    )
}

fn stringify_path_triple_hinted(t: &TriplePattern, direction: u8) -> String {
    format!(
        "{} {} {} OPTION (TRANSITIVE, t_direction {})",
        render_term(&t.subject),
        stringify_path_predicate(t),
        render_term(&t.object),
        direction
    )
}

fn stringify_filter(f: &Filter) -> String {
    format!("FILTER ({})", stringify_expr(&f.expr))
}

fn stringify_expr(expr: &Expression) -> String {
    match expr {
        Expression::Term(t) => render_term(t),
        Expression::Str(inner) => format!("STR({})", stringify_expr(inner)),
        Expression::Not(inner) => format!("!({})", stringify_expr(inner)),
        Expression::Relational(op, l, r) => {
            format!("{} {} {}", stringify_expr(l), rel_op_str(*op), stringify_expr(r))
        }
        Expression::TypedEq(l, r) => format!("{} = {}", stringify_expr(l), stringify_expr(r)),
        Expression::Regex(inner, pattern) => format!("REGEX({}, \"{}\")", stringify_expr(inner), pattern),
        Expression::And(parts) => parts.iter().map(stringify_expr).collect::<Vec<_>>().join(" && "),
        Expression::Or(parts) => format!(
            "({})",
            parts.iter().map(stringify_expr).collect::<Vec<_>>().join(" || ")
        ),
    }
}

fn rel_op_str(op: RelOp) -> &'static str {
    match op {
        RelOp::Eq => "=",
        RelOp::Lt => "<",
        RelOp::Gt => ">",
        RelOp::Le => "<=",
        RelOp::Ge => ">=",
    }
}
