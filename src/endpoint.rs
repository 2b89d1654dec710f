/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Remote SPARQL endpoint collaborators (§4.7, §9-FULL): the HTTP side of
//! the exact-count estimator. Two targets are supported, mirroring the two
//! engines the rest of this crate already renders forced-order queries for
//! in `stringify`: Virtuoso (retries a refused connection up to ten times,
//! matching the upstream system's flakiness under load) and Blazegraph
//! (no retry).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::OptimizerError;
use crate::Result;

/// One value reported through a [`ProbeSink`]; mirrors the handful of
/// kinds the reference implementation's `spy.report` calls actually carry.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeValue {
    Text(String),
    Number(f64),
    Count(u64),
}

/// An observability hook threaded through endpoint calls, grounded on the
/// reference implementation's per-query `spy.report(key, field, value)`
/// pattern. No CSV/metrics sink ships with this crate (§1 Non-goals); a
/// caller that wants one implements this trait.
pub trait ProbeSink {
    fn report(&mut self, key: &str, field: &str, value: ProbeValue);
}

/// A sink that discards every report.
pub struct NullSink;

impl ProbeSink for NullSink {
    fn report(&mut self, _key: &str, _field: &str, _value: ProbeValue) {}
}

#[derive(Debug, Deserialize)]
pub struct SparqlValue {
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: String,
    #[serde(default)]
    pub datatype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SparqlBindings {
    pub bindings: Vec<HashMap<String, SparqlValue>>,
}

/// The SPARQL 1.1 JSON results format, trimmed to the fields this crate
/// actually consumes (row count and the `COUNT(*)` projection).
#[derive(Debug, Deserialize)]
pub struct SparqlResults {
    pub results: SparqlBindings,
}

impl SparqlResults {
    pub fn row_count(&self) -> u64 {
        self.results.bindings.len() as u64
    }

    /// Read the `?count` binding a `COUNT(*)`/`COUNT(DISTINCT *)` query
    /// projects.
    pub fn count(&self) -> Result<u64> {
        let binding = self
            .results
            .bindings
            .first()
            .ok_or_else(|| OptimizerError::Endpoint("empty COUNT(*) result set".to_string()))?;
        let count = binding
            .get("count")
            .ok_or_else(|| OptimizerError::Endpoint("COUNT(*) result has no ?count binding".to_string()))?;
        count
            .value
            .parse()
            .map_err(|_| OptimizerError::Endpoint(format!("non-numeric count value: {}", count.value)))
    }
}

/// A remote SPARQL endpoint capable of executing a forced-order query and
/// reporting the outcome through a [`ProbeSink`] (§4.7).
pub trait Endpoint {
    fn url(&self) -> &str;
    fn default_graph(&self) -> &str;

    fn execute(
        &self,
        query: &str,
        sink: &mut dyn ProbeSink,
        force_order: bool,
        timeout_ms: u64,
    ) -> Result<SparqlResults>;

    /// Rewrite `query`'s projection to a `COUNT(*)`/`COUNT(DISTINCT *)` and
    /// execute it, returning 0 when the probe did not report `"ok"`.
    fn count(
        &self,
        query: &str,
        sink: &mut dyn ProbeSink,
        distinct: bool,
        force_order: bool,
        timeout_ms: u64,
    ) -> Result<u64> {
        let select = if distinct {
            "SELECT (COUNT(DISTINCT *) AS ?count) WHERE "
        } else {
            "SELECT (COUNT(*) AS ?count) WHERE "
        };
        let body = query.splitn(2, "WHERE").nth(1).unwrap_or(query);
        let counted = format!("{}{}", select, body);
        let results = self.execute(&counted, sink, force_order, timeout_ms)?;
        results.count()
    }
}

fn report_outcome(sink: &mut dyn ProbeSink, outcome: &Result<SparqlResults>, elapsed: Duration, timeout_ms: u64) {
    let rows = outcome.as_ref().map(|r| r.row_count()).unwrap_or(0);
    sink.report("", "num_solutions", ProbeValue::Count(rows));
    sink.report("", "execution_time", ProbeValue::Number(elapsed.as_secs_f64()));
    let timed_out = timeout_ms > 0 && elapsed.as_millis() as u64 > timeout_ms;
    let status = match (outcome.is_ok(), timed_out) {
        (_, true) => "timeout",
        (true, false) => "ok",
        (false, false) => "error",
    };
    sink.report("", "status", ProbeValue::Text(status.to_string()));
}

fn post_sparql_query(client: &Client, url: &str, default_graph: &str, query: &str, timeout_ms: u64) -> Result<SparqlResults> {
    let response = client
        .post(url)
        .query(&[("default-graph-uri", default_graph)])
        .form(&[("query", query), ("format", "application/sparql-results+json")])
        .timeout(Duration::from_millis(timeout_ms.max(1)))
        .send()
        .map_err(|e| OptimizerError::Endpoint(e.to_string()))?;
    response
        .json::<SparqlResults>()
        .map_err(|e| OptimizerError::Endpoint(e.to_string()))
}

/// A Virtuoso SPARQL endpoint. `execute` retries a connection refusal up to
/// ten times before giving up, matching the reference implementation's
/// `SPARQLWrapper` retry loop.
pub struct Virtuoso {
    url: String,
    default_graph: String,
    client: Client,
}

impl Virtuoso {
    pub fn new(url: impl Into<String>, default_graph: impl Into<String>) -> Self {
        Virtuoso {
            url: url.into(),
            default_graph: default_graph.into(),
            client: Client::new(),
        }
    }
}

impl Endpoint for Virtuoso {
    fn url(&self) -> &str {
        &self.url
    }

    fn default_graph(&self) -> &str {
        &self.default_graph
    }

    fn execute(&self, query: &str, sink: &mut dyn ProbeSink, force_order: bool, timeout_ms: u64) -> Result<SparqlResults> {
        let query = if force_order {
            format!("DEFINE sql:select-option \"order\" {}", query)
        } else {
            query.to_string()
        };

        log::debug!("{}", query);

        let timer = Instant::now();
        let mut attempt = 1;
        let outcome = loop {
            let result = post_sparql_query(&self.client, &self.url, &self.default_graph, &query, timeout_ms);
            match result {
                Err(OptimizerError::Endpoint(msg)) if attempt < 10 && msg.contains("refused") => {
                    log::error!("attempt {}: connection refused", attempt);
                    attempt += 1;
                }
                other => break other,
            }
        };
        report_outcome(sink, &outcome, timer.elapsed(), timeout_ms);
        outcome
    }
}

/// A Blazegraph SPARQL endpoint. Forces join order via the
/// `hint:Query hint:optimizer "None"` query hint rather than Virtuoso's
/// `DEFINE sql:select-option`, and does not retry a failed request.
pub struct Blazegraph {
    url: String,
    default_graph: String,
    client: Client,
}

impl Blazegraph {
    pub fn new(url: impl Into<String>, default_graph: impl Into<String>) -> Self {
        Blazegraph {
            url: url.into(),
            default_graph: default_graph.into(),
            client: Client::new(),
        }
    }
}

impl Endpoint for Blazegraph {
    fn url(&self) -> &str {
        &self.url
    }

    fn default_graph(&self) -> &str {
        &self.default_graph
    }

    fn execute(&self, query: &str, sink: &mut dyn ProbeSink, force_order: bool, timeout_ms: u64) -> Result<SparqlResults> {
        let query = if force_order {
            match query.split_once("WHERE {") {
                Some((select, where_body)) => {
                    format!("{}WHERE {{\n\thint:Query hint:optimizer \"None\" . {}", select, where_body)
                }
                None => query.to_string(),
            }
        } else {
            query.to_string()
        };

        log::debug!("{}", query);

        let timer = Instant::now();
        let outcome = post_sparql_query(&self.client, &self.url, &self.default_graph, &query, timeout_ms);
        report_outcome(sink, &outcome, timer.elapsed(), timeout_ms);
        outcome
    }
}
