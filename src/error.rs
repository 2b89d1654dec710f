/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// Error type for every fallible entry point in this crate.
///
/// Plain enum variants carrying a `String` reason, rather than a
/// derive-macro error crate, while still keeping the failure structured
/// enough for callers to branch on.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// The caller handed in a `Query`/`Filter`/`JoinOrder` this crate cannot
    /// represent (an operator or expression form it does not support).
    UnsupportedExpression(String),
    /// A data-model invariant (see the `JoinOrder`/`Query` invariants) was
    /// violated by the caller's input.
    InvariantViolation(String),
    /// The database adapter could not be constructed or queried.
    Adapter(String),
    /// The exact-count collaborator's remote endpoint failed.
    Endpoint(String),
    /// Configuration could not be parsed or loaded.
    Config(String),
}

impl fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerError::UnsupportedExpression(msg) => {
                write!(f, "unsupported expression: {}", msg)
            }
            OptimizerError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
            OptimizerError::Adapter(msg) => write!(f, "database adapter error: {}", msg),
            OptimizerError::Endpoint(msg) => write!(f, "endpoint error: {}", msg),
            OptimizerError::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl std::error::Error for OptimizerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_variant_context() {
        let err = OptimizerError::Adapter("missing index file".to_string());
        assert_eq!(err.to_string(), "database adapter error: missing index file");
    }
}
