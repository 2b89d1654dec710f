/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The database adapter contract (§4.1) and a reference in-memory
//! implementation (§4.1-FULL) that satisfies it without parsing HDT files.

mod dictionary;
mod memory;

pub use dictionary::Dictionary;
pub use memory::MemoryDatabase;

use crate::Result;

/// The outcome of a uniform-sample draw in string space: resolved values for
/// whichever positions were wildcarded, plus the full match cardinality.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SampleResult {
    pub subject: Option<String>,
    pub predicate: Option<String>,
    pub object: Option<String>,
    pub cardinality: u64,
}

impl SampleResult {
    pub fn empty() -> Self {
        SampleResult::default()
    }
}

/// The outcome of a uniform-sample draw in numeric-id space. `0` marks an
/// unbound position, matching the header-form sentinel used throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdSampleResult {
    pub subject: u32,
    pub predicate: u32,
    pub object: u32,
    pub cardinality: u64,
}

/// A triple-store adapter: string-space and id-space lookup/sampling plus
/// VoID-style distinct-subject/object counts per predicate.
///
/// Positions use the empty string (string space) or `0` (id space) as the
/// wildcard sentinel, matching a triple pattern's "header" form.
pub trait Database {
    fn cardinality(&self, s: &str, p: &str, o: &str) -> Result<u64>;

    fn sample(&self, s: &str, p: &str, o: &str) -> Result<SampleResult>;

    /// Numeric-id-space sampling. Implementations must reject the
    /// fully-wildcard, variable-predicate case (`p == 0`) when both `s` and
    /// `o` are also wildcards, since a predicate-major id scan over an
    /// unbound predicate is not supported.
    fn id_sample(&self, s: u32, p: u32, o: u32) -> Result<IdSampleResult>;

    fn subject_id(&self, term: &str) -> Result<u32>;
    fn predicate_id(&self, term: &str) -> Result<u32>;
    fn object_id(&self, term: &str) -> Result<u32>;

    /// Resolve any id back to its original term string, regardless of which
    /// position it was assigned from (subject/predicate/object share one
    /// dictionary in this crate's reference adapter).
    fn decode(&self, id: u32) -> Option<String>;

    fn distinct_subjects(&self, predicate: &str) -> u64;
    fn distinct_objects(&self, predicate: &str) -> u64;

    /// Drop any per-query caches. Called at query boundaries (§5).
    fn clear_caches(&self) {}
}
