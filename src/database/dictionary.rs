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

/// Encodes RDF terms (serialized as strings) to dense ids and back.
///
/// Id `0` is reserved for "unbound" (§4.1), so encoding starts at `1` —
/// unlike a plain string-interning dictionary that would start at `0`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Dictionary {
    string_to_id: HashMap<String, u32>,
    id_to_string: HashMap<u32, String>,
    next_id: u32,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary {
            string_to_id: HashMap::new(),
            id_to_string: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn encode(&mut self, value: &str) -> u32 {
        if let Some(&id) = self.string_to_id.get(value) {
            return id;
        }
        let id = self.next_id;
        self.string_to_id.insert(value.to_string(), id);
        self.id_to_string.insert(id, value.to_string());
        self.next_id += 1;
        id
    }

    pub fn lookup(&self, value: &str) -> Option<u32> {
        self.string_to_id.get(value).copied()
    }

    pub fn decode(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.id_to_string.get(&id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.string_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.string_to_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_encoded_value_gets_id_one_not_zero() {
        let mut dict = Dictionary::new();
        assert_eq!(dict.encode("<http://example.org/A>"), 1);
    }

    #[test]
    fn encoding_the_same_value_twice_returns_the_same_id() {
        let mut dict = Dictionary::new();
        let a = dict.encode("<A>");
        let b = dict.encode("<A>");
        assert_eq!(a, b);
    }

    #[test]
    fn decode_of_zero_is_always_none() {
        let dict = Dictionary::new();
        assert_eq!(dict.decode(0), None);
    }

    #[test]
    fn decode_round_trips_an_encoded_value() {
        let mut dict = Dictionary::new();
        let id = dict.encode("<B>");
        assert_eq!(dict.decode(id), Some("<B>"));
    }
}
