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

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::dictionary::Dictionary;
use super::{Database, IdSampleResult, SampleResult};
use crate::error::OptimizerError;
use crate::Result;

/// A fully in-memory reference implementation of the database adapter
/// contract (§4.1). Not a performance-oriented HDT engine: the SPO/PSO
/// fast paths cover subject-bound and predicate-dominant lookups; any other
/// combination (object bound alone, or subject+object bound with a variable
/// predicate) falls back to a linear scan, which is acceptable for the
/// synthetic test graphs this crate exercises.
pub struct MemoryDatabase {
    dictionary: RefCell<Dictionary>,
    triples: Vec<(u32, u32, u32)>,
    by_subject: HashMap<u32, Vec<(u32, u32)>>,
    by_predicate: HashMap<u32, Vec<(u32, u32)>>,
    void_index: HashMap<u32, (u64, u64)>,
    cardinality_cache: RefCell<HashMap<(u32, u32, u32), u64>>,
    rng: RefCell<StdRng>,
}

impl MemoryDatabase {
    /// Build from string triples, with an explicit RNG seed so sampling is
    /// reproducible (§5, §8 determinism properties).
    pub fn new(triples: &[(String, String, String)], seed: u64) -> Self {
        let mut dictionary = Dictionary::new();
        let mut id_triples = Vec::with_capacity(triples.len());
        for (s, p, o) in triples {
            let sid = dictionary.encode(s);
            let pid = dictionary.encode(p);
            let oid = dictionary.encode(o);
            id_triples.push((sid, pid, oid));
        }

        let mut by_subject: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
        let mut by_predicate: HashMap<u32, Vec<(u32, u32)>> = HashMap::new();
        for &(s, p, o) in &id_triples {
            by_subject.entry(s).or_default().push((p, o));
            by_predicate.entry(p).or_default().push((s, o));
        }
        for v in by_subject.values_mut() {
            v.sort_unstable();
            v.dedup();
        }
        for v in by_predicate.values_mut() {
            v.sort_unstable();
            v.dedup();
        }

        let mut void_index = HashMap::new();
        for (&p, pairs) in &by_predicate {
            let mut subjects: Vec<u32> = pairs.iter().map(|(s, _)| *s).collect();
            let mut objects: Vec<u32> = pairs.iter().map(|(_, o)| *o).collect();
            subjects.sort_unstable();
            subjects.dedup();
            objects.sort_unstable();
            objects.dedup();
            void_index.insert(p, (subjects.len() as u64, objects.len() as u64));
        }

        MemoryDatabase {
            dictionary: RefCell::new(dictionary),
            triples: id_triples,
            by_subject,
            by_predicate,
            void_index,
            cardinality_cache: RefCell::new(HashMap::new()),
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn lookup_id(&self, term: &str) -> Option<u32> {
        self.dictionary.borrow().lookup(term)
    }

    fn resolve_header(&self, s: &str, p: &str, o: &str) -> Option<(u32, u32, u32)> {
        let id_or_wildcard = |term: &str| -> Option<u32> {
            if term.is_empty() {
                Some(0)
            } else {
                self.lookup_id(term)
            }
        };
        Some((id_or_wildcard(s)?, id_or_wildcard(p)?, id_or_wildcard(o)?))
    }

    /// Every triple matching the given (possibly wildcarded) pattern,
    /// returned as full `(s, p, o)` ids regardless of which positions were
    /// bound. Prefers the subject index when the subject is bound, then the
    /// predicate-dominant index, falling back to a full scan.
    fn matches(&self, s: u32, p: u32, o: u32) -> Vec<(u32, u32, u32)> {
        if s != 0 {
            self.by_subject
                .get(&s)
                .map(|pairs| {
                    pairs
                        .iter()
                        .filter(|&&(pp, oo)| (p == 0 || pp == p) && (o == 0 || oo == o))
                        .map(|&(pp, oo)| (s, pp, oo))
                        .collect()
                })
                .unwrap_or_default()
        } else if p != 0 {
            self.by_predicate
                .get(&p)
                .map(|pairs| {
                    pairs
                        .iter()
                        .filter(|&&(_, oo)| o == 0 || oo == o)
                        .map(|&(ss, oo)| (ss, p, oo))
                        .collect()
                })
                .unwrap_or_default()
        } else {
            self.triples
                .iter()
                .filter(|&&(_, _, oo)| o == 0 || oo == o)
                .copied()
                .collect()
        }
    }

    fn id_cardinality(&self, s: u32, p: u32, o: u32) -> u64 {
        let key = (s, p, o);
        if let Some(&cached) = self.cardinality_cache.borrow().get(&key) {
            return cached;
        }
        let count = self.matches(s, p, o).len() as u64;
        self.cardinality_cache.borrow_mut().insert(key, count);
        count
    }

    fn pick_uniform(&self, matches: &[(u32, u32, u32)]) -> (u32, u32, u32) {
        let idx = if matches.len() == 1 {
            0
        } else {
            self.rng.borrow_mut().gen_range(0..matches.len())
        };
        matches[idx]
    }
}

impl Database for MemoryDatabase {
    fn cardinality(&self, s: &str, p: &str, o: &str) -> Result<u64> {
        match self.resolve_header(s, p, o) {
            Some((sid, pid, oid)) => Ok(self.id_cardinality(sid, pid, oid)),
            None => Ok(0),
        }
    }

    fn sample(&self, s: &str, p: &str, o: &str) -> Result<SampleResult> {
        let (sid, pid, oid) = match self.resolve_header(s, p, o) {
            Some(ids) => ids,
            None => return Ok(SampleResult::empty()),
        };
        let matches = self.matches(sid, pid, oid);
        let cardinality = matches.len() as u64;
        if matches.is_empty() {
            return Ok(SampleResult::empty());
        }
        let (ss, pp, oo) = self.pick_uniform(&matches);
        let dictionary = self.dictionary.borrow();
        Ok(SampleResult {
            subject: (sid == 0).then(|| dictionary.decode(ss).unwrap_or_default().to_string()),
            predicate: (pid == 0).then(|| dictionary.decode(pp).unwrap_or_default().to_string()),
            object: (oid == 0).then(|| dictionary.decode(oo).unwrap_or_default().to_string()),
            cardinality,
        })
    }

    fn id_sample(&self, s: u32, p: u32, o: u32) -> Result<IdSampleResult> {
        if s == 0 && o == 0 {
            return Err(OptimizerError::Adapter(
                "PSO index not supported with ids".to_string(),
            ));
        }
        let matches = self.matches(s, p, o);
        let cardinality = matches.len() as u64;
        if matches.is_empty() {
            return Ok(IdSampleResult {
                cardinality: 0,
                ..Default::default()
            });
        }
        let (ss, pp, oo) = self.pick_uniform(&matches);
        Ok(IdSampleResult {
            subject: if s == 0 { ss } else { 0 },
            predicate: if p == 0 { pp } else { 0 },
            object: if o == 0 { oo } else { 0 },
            cardinality,
        })
    }

    fn subject_id(&self, term: &str) -> Result<u32> {
        self.lookup_id(term)
            .ok_or_else(|| OptimizerError::Adapter(format!("unknown subject term: {}", term)))
    }

    fn predicate_id(&self, term: &str) -> Result<u32> {
        self.lookup_id(term)
            .ok_or_else(|| OptimizerError::Adapter(format!("unknown predicate term: {}", term)))
    }

    fn object_id(&self, term: &str) -> Result<u32> {
        self.lookup_id(term)
            .ok_or_else(|| OptimizerError::Adapter(format!("unknown object term: {}", term)))
    }

    fn decode(&self, id: u32) -> Option<String> {
        self.dictionary.borrow().decode(id).map(|s| s.to_string())
    }

    fn distinct_subjects(&self, predicate: &str) -> u64 {
        self.lookup_id(predicate)
            .and_then(|p| self.void_index.get(&p))
            .map(|&(s, _)| s)
            .unwrap_or(0)
    }

    fn distinct_objects(&self, predicate: &str) -> u64 {
        self.lookup_id(predicate)
            .and_then(|p| self.void_index.get(&p))
            .map(|&(_, o)| o)
            .unwrap_or(0)
    }

    fn clear_caches(&self) {
        self.cardinality_cache.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> MemoryDatabase {
        let triples = vec![
            ("<A>".to_string(), "<p>".to_string(), "<B>".to_string()),
            ("<B>".to_string(), "<p>".to_string(), "<C>".to_string()),
            ("<C>".to_string(), "<p>".to_string(), "<D>".to_string()),
            ("<A>".to_string(), "<q>".to_string(), "<X>".to_string()),
        ];
        MemoryDatabase::new(&triples, 42)
    }

    #[test]
    fn fully_bound_triple_has_cardinality_one_when_present() {
        let db = sample_graph();
        assert_eq!(db.cardinality("<A>", "<p>", "<B>").unwrap(), 1);
    }

    #[test]
    fn fully_bound_triple_has_cardinality_zero_when_absent() {
        let db = sample_graph();
        assert_eq!(db.cardinality("<A>", "<p>", "<D>").unwrap(), 0);
    }

    #[test]
    fn predicate_only_cardinality_counts_all_matches() {
        let db = sample_graph();
        assert_eq!(db.cardinality("", "<p>", "").unwrap(), 3);
        assert_eq!(db.cardinality("", "<q>", "").unwrap(), 1);
    }

    #[test]
    fn sample_resolves_the_wildcard_object() {
        let db = sample_graph();
        let result = db.sample("<A>", "<p>", "").unwrap();
        assert_eq!(result.object.as_deref(), Some("<B>"));
        assert_eq!(result.cardinality, 1);
    }

    #[test]
    fn id_sample_rejects_fully_wildcard_subject_and_object() {
        let db = sample_graph();
        let p = db.predicate_id("<p>").unwrap();
        let err = db.id_sample(0, p, 0).unwrap_err();
        assert!(matches!(err, OptimizerError::Adapter(_)));
    }

    #[test]
    fn distinct_subjects_and_objects_match_the_dataset() {
        let db = sample_graph();
        assert_eq!(db.distinct_subjects("<p>"), 3);
        assert_eq!(db.distinct_objects("<p>"), 3);
    }

    #[test]
    fn unknown_predicate_has_zero_distinct_counts() {
        let db = sample_graph();
        assert_eq!(db.distinct_subjects("<unknown>"), 0);
    }

    #[test]
    fn decode_round_trips_encoded_terms() {
        let db = sample_graph();
        let id = db.subject_id("<A>").unwrap();
        assert_eq!(db.decode(id).as_deref(), Some("<A>"));
    }
}
