/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Cost-based join-order optimization for conjunctive graph-pattern queries.
//!
//! A [`Query`](query::Query) made of triple patterns and filters is handed to
//! a [`search`] algorithm, which enumerates candidate left-deep join plans
//! ([`JoinOrder`](join_order::JoinOrder)) and drives a
//! [`CardinalityEstimator`](estimators::CardinalityEstimator) to pick the
//! cheapest one.

pub mod config;
pub mod database;
pub mod endpoint;
pub mod error;
pub mod estimators;
pub mod filter;
pub mod join_order;
pub mod multiset;
pub mod pattern;
pub mod query;
pub mod search;
pub mod stringify;
pub mod term;
pub mod triple_pattern;

pub use config::OptimizerConfig;
pub use error::OptimizerError;
pub use join_order::JoinOrder;
pub use query::Query;
pub use term::{PatternId, Term};
pub use triple_pattern::TriplePattern;

pub type Result<T> = std::result::Result<T, OptimizerError>;
