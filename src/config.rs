/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::{Deserialize, Serialize};

use crate::error::OptimizerError;

/// Tunables for search and estimation, loadable from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Number of random walks per estimation.
    pub num_walks: usize,
    /// Maximum number of hops followed along a single property-path walk.
    pub max_depth: usize,
    /// Confidence level used for the Student-t interval (e.g. 0.95).
    pub confidence: f64,
    /// Whether to relax a bound path-atom endpoint into a post-filter.
    pub relax_stars: bool,
    /// Whether to reorder the walk plan purely for sampling efficiency.
    pub optimize_walk_plans: bool,
    /// Number of plans kept per round in `GreedySearch`/`HGreedySearch`.
    pub beam_size: usize,
    /// Extra path-diverse plans `HGreedySearch` may admit per round.
    pub beam_extra: usize,
    /// Timeout, in milliseconds, for the exact-count collaborator.
    pub timeout_ms: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            num_walks: 1000,
            max_depth: 10,
            confidence: 0.95,
            relax_stars: true,
            optimize_walk_plans: true,
            beam_size: 4,
            beam_extra: 2,
            timeout_ms: 60_000,
        }
    }
}

impl OptimizerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, OptimizerError> {
        toml::from_str(text).map_err(|e| OptimizerError::Config(e.to_string()))
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, OptimizerError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| OptimizerError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let cfg = OptimizerConfig::default();
        assert_eq!(cfg.num_walks, 1000);
        assert!(cfg.relax_stars);
        assert_eq!(cfg.beam_size, 4);
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let cfg = OptimizerConfig::from_toml_str("num_walks = 5000\nbeam_size = 8\n").unwrap();
        assert_eq!(cfg.num_walks, 5000);
        assert_eq!(cfg.beam_size, 8);
        assert_eq!(cfg.max_depth, OptimizerConfig::default().max_depth);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = OptimizerConfig::from_toml_str("num_walks = [").unwrap_err();
        assert!(matches!(err, OptimizerError::Config(_)));
    }
}
