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

use regex::Regex;

use crate::database::Database;
use crate::error::OptimizerError;
use crate::pattern::Pattern;
use crate::term::{PatternId, Term};
use crate::Result;

/// A relational comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

/// The filter expression tree (§3, §9).
#[derive(Debug, Clone)]
pub enum Expression {
    Term(Term),
    Str(Box<Expression>),
    Not(Box<Expression>),
    Relational(RelOp, Box<Expression>, Box<Expression>),
    Regex(Box<Expression>, String),
    And(Vec<Expression>),
    Or(Vec<Expression>),
    TypedEq(Box<Expression>, Box<Expression>),
}

/// A filter pattern: one expression tree plus a stable identity so it can
/// occupy a slot on a `JoinOrder` chain alongside triple patterns.
#[derive(Debug, Clone)]
pub struct Filter {
    id: PatternId,
    pub expr: Expression,
}

impl Filter {
    pub fn new(expr: Expression) -> Self {
        Filter {
            id: PatternId::new(),
            expr,
        }
    }

    pub fn relational(op: RelOp, left: Expression, right: Expression) -> Self {
        Self::new(Expression::Relational(op, Box::new(left), Box::new(right)))
    }

    pub fn relational_eq(left: Term, right: Term) -> Self {
        Self::relational(RelOp::Eq, Expression::Term(left), Expression::Term(right))
    }

    pub fn and(parts: Vec<Expression>) -> Self {
        Self::new(Expression::And(parts))
    }

    pub fn or(parts: Vec<Expression>) -> Self {
        Self::new(Expression::Or(parts))
    }

    /// Evaluate this filter against a variable binding, resolving any
    /// numeric-id term through `db` so id-space and string-space bindings
    /// are interchangeable.
    pub fn eval(&self, bindings: &HashMap<String, Term>, db: &dyn Database) -> Result<bool> {
        eval_expr(&self.expr, bindings, db)
    }
}

impl Pattern for Filter {
    fn id(&self) -> PatternId {
        self.id
    }

    fn variables(&self) -> std::collections::HashSet<String> {
        let mut vars = std::collections::HashSet::new();
        collect_vars(&self.expr, &mut vars);
        vars
    }

    fn is_triple(&self) -> bool {
        false
    }
}

fn collect_vars(expr: &Expression, vars: &mut std::collections::HashSet<String>) {
    match expr {
        Expression::Term(Term::Variable(name)) => {
            vars.insert(name.clone());
        }
        Expression::Term(Term::Constant(_)) => {}
        Expression::Str(inner) | Expression::Not(inner) => collect_vars(inner, vars),
        Expression::Relational(_, l, r) | Expression::TypedEq(l, r) => {
            collect_vars(l, vars);
            collect_vars(r, vars);
        }
        Expression::Regex(inner, _) => collect_vars(inner, vars),
        Expression::And(parts) | Expression::Or(parts) => {
            for p in parts {
                collect_vars(p, vars);
            }
        }
    }
}

/// Resolve a term against a binding. Bound values are always stored as
/// already-decoded string-space constants (the random-walks estimator
/// decodes id-space results through the database before binding), so no
/// further database lookup is needed here; `db` is threaded through purely
/// to keep this function's signature aligned with callers that evaluate
/// filters mid-walk, where the database is otherwise in scope.
fn resolve(term: &Term, bindings: &HashMap<String, Term>, _db: &dyn Database) -> Option<String> {
    match term {
        Term::Constant(value) => Some(value.clone()),
        Term::Variable(name) => match bindings.get(name) {
            Some(Term::Constant(value)) => Some(value.clone()),
            Some(Term::Variable(_)) | None => None,
        },
    }
}

/// Strip an optional `^^<datatype>` suffix, returning the bare lexical form.
fn strip_type(value: &str) -> &str {
    value.split("^^").next().unwrap_or(value)
}

/// If the value is an `xsd:integer`-typed literal (or a bare numeric id),
/// promote it to a number for relational comparison.
fn numeric_value(value: &str) -> Option<f64> {
    if let Some((lexical, datatype)) = value.split_once("^^") {
        if datatype.contains("integer") || datatype.contains("decimal") || datatype.contains("double") {
            let trimmed = lexical.trim_matches('"');
            return trimmed.parse::<f64>().ok();
        }
        return None;
    }
    value.parse::<f64>().ok()
}

fn compare(op: RelOp, left: &str, right: &str) -> bool {
    if let (Some(l), Some(r)) = (numeric_value(left), numeric_value(right)) {
        return match op {
            RelOp::Eq => l == r,
            RelOp::Lt => l < r,
            RelOp::Gt => l > r,
            RelOp::Le => l <= r,
            RelOp::Ge => l >= r,
        };
    }
    match op {
        RelOp::Eq => left == right,
        RelOp::Lt => left < right,
        RelOp::Gt => left > right,
        RelOp::Le => left <= right,
        RelOp::Ge => left >= right,
    }
}

fn eval_expr(expr: &Expression, bindings: &HashMap<String, Term>, db: &dyn Database) -> Result<bool> {
    match expr {
        Expression::Term(_) => Err(OptimizerError::UnsupportedExpression(
            "a bare term is not a boolean expression".to_string(),
        )),
        Expression::Str(_) => Err(OptimizerError::UnsupportedExpression(
            "STR() is only meaningful inside a relational/regex comparison".to_string(),
        )),
        Expression::Not(inner) => Ok(!eval_expr(inner, bindings, db)?),
        Expression::Relational(op, l, r) => {
            let lv = resolve_term_expr(l, bindings, db)?;
            let rv = resolve_term_expr(r, bindings, db)?;
            match (lv, rv) {
                (Some(lv), Some(rv)) => Ok(compare(*op, &lv, &rv)),
                _ => Ok(false),
            }
        }
        Expression::TypedEq(l, r) => {
            let lv = resolve_term_expr(l, bindings, db)?;
            let rv = resolve_term_expr(r, bindings, db)?;
            match (lv, rv) {
                (Some(lv), Some(rv)) => Ok(compare(RelOp::Eq, &lv, &rv)),
                _ => Ok(false),
            }
        }
        Expression::Regex(inner, pattern) => {
            let value = resolve_term_expr(inner, bindings, db)?;
            match value {
                Some(value) => {
                    let re = Regex::new(pattern)
                        .map_err(|e| OptimizerError::UnsupportedExpression(e.to_string()))?;
                    Ok(re.is_match(strip_type(&value)))
                }
                None => Ok(false),
            }
        }
        Expression::And(parts) => {
            for part in parts {
                if !eval_expr(part, bindings, db)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expression::Or(parts) => {
            for part in parts {
                if eval_expr(part, bindings, db)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Resolve a sub-expression that denotes a term value (a bare term, or
/// `STR(...)` of one) rather than a boolean.
fn resolve_term_expr(
    expr: &Expression,
    bindings: &HashMap<String, Term>,
    db: &dyn Database,
) -> Result<Option<String>> {
    match expr {
        Expression::Term(term) => Ok(resolve(term, bindings, db)),
        Expression::Str(inner) => {
            Ok(resolve_term_expr(inner, bindings, db)?.map(|v| strip_type(&v).to_string()))
        }
        _ => Err(OptimizerError::UnsupportedExpression(
            "expected a term expression".to_string(),
        )),
    }
}
