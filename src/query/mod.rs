//! Typed querystring store.
//!
//! # Data Flow
//! ```text
//! "?a[0]=x&a[1]=2&flag=true"
//!     → split on '&' / '=' and percent-decode
//!     → brackets.rs (group name[index] keys into arrays/objects)
//!     → marshal (per leaf value)
//!     → Query { key → Marshalled }
//!
//! Query::test(expectation)
//!     → pattern.rs (per key, fail fast)
//!     → key → Params, or None
//! ```
//!
//! # Design Decisions
//! - Lenient by default: an undecodable pair (or a `[]` append with no
//!   index left) is dropped and recorded in `rejected()`; `parse_strict`
//!   fails the whole parse instead
//! - Repeated plain keys: last value wins
//! - Equality compares typed values only, so serialize/parse round-trips

pub mod brackets;
pub mod pattern;

pub use pattern::{QueryExpectation, QueryPattern};

use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::marshal::{marshal, Identity, MarshalError, Marshalled, Params, Value};
use brackets::{split_key, Tree};

/// A parsed querystring with typed values.
#[derive(Debug, Clone, Default)]
pub struct Query {
    values: BTreeMap<String, Marshalled>,
    raw: BTreeMap<String, String>,
    rejected: Vec<String>,
}

impl Query {
    /// Parse a querystring, isolating undecodable pairs.
    pub fn parse(qs: &str) -> Self {
        match Self::parse_with(qs, false) {
            Ok(query) => query,
            // parse_with only fails in strict mode
            Err(_) => Self::default(),
        }
    }

    /// Parse a querystring, failing on the first undecodable pair.
    pub fn parse_strict(qs: &str) -> Result<Self, MarshalError> {
        Self::parse_with(qs, true)
    }

    fn parse_with(qs: &str, strict: bool) -> Result<Self, MarshalError> {
        let qs = qs.strip_prefix('?').unwrap_or(qs);
        let mut query = Query::default();
        let mut trees: BTreeMap<String, Tree> = BTreeMap::new();

        for pair in qs.split('&').filter(|p| !p.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));

            let decoded = decode(raw_key).and_then(|k| decode(raw_value).map(|v| (k, v)));
            let inserted = decoded.and_then(|(key, value)| match split_key(&key) {
                Some((name, segments)) => {
                    trees
                        .entry(name.to_string())
                        .or_default()
                        .insert(&segments, &value)
                        .map_err(|_| MarshalError::IndexOverflow { key: key.clone() })?;
                    query.values.remove(name);
                    query.raw.remove(name);
                    Ok(())
                }
                None => {
                    trees.remove(&key);
                    query.values.insert(key.clone(), marshal(&value));
                    query.raw.insert(key, value);
                    Ok(())
                }
            });

            match inserted {
                Ok(()) => {}
                Err(e) if strict => return Err(e),
                Err(e) => {
                    tracing::warn!(key = %raw_key, error = %e, "Dropping query parameter");
                    query.rejected.push(raw_key.to_string());
                }
            }
        }

        for (name, tree) in trees {
            let value = tree.into_value(&name);
            let identity = match value {
                Value::Array(_) => Identity::Array,
                _ => Identity::Object,
            };
            query.values.insert(name, Marshalled { identity, value });
        }

        Ok(query)
    }

    /// Typed value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).map(|m| &m.value)
    }

    /// Marshalled value (with identity) for a key.
    pub fn marshalled(&self, key: &str) -> Option<&Marshalled> {
        self.values.get(key)
    }

    /// Decoded, uncoerced value for a plain key.
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }

    /// Keys dropped because they could not be decoded.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter().map(|(k, m)| (k, &m.value))
    }

    /// Test against an expected shape. Returns the per-key matches only
    /// if every expected key matched.
    pub fn test(&self, expected: &QueryExpectation) -> Option<BTreeMap<String, Params>> {
        let mut matches = BTreeMap::new();
        for (key, pattern) in expected.iter() {
            let actual = self.values.get(key)?;
            let found = pattern.test(self.raw(key), actual)?;
            matches.insert(key.clone(), found);
        }
        Some(matches)
    }

    /// Re-encode as a querystring (without the leading `?`).
    pub fn serialize(&self) -> String {
        let mut pairs = Vec::new();
        for (key, marshalled) in &self.values {
            flatten(&urlencoding::encode(key), &marshalled.value, &mut pairs);
        }
        pairs.join("&")
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .all(|(k, m)| other.values.get(k).is_some_and(|o| o.value == m.value))
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.values.iter().map(|(k, m)| (k, &m.value)))
    }
}

fn decode(raw: &str) -> Result<String, MarshalError> {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|source| MarshalError::InvalidEncoding {
            raw: raw.to_string(),
            source,
        })
}

fn flatten(prefix: &str, value: &Value, pairs: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(&format!("{}[{}]", prefix, i), item, pairs);
            }
        }
        Value::Object(map) => {
            for (k, item) in map {
                flatten(&format!("{}[{}]", prefix, urlencoding::encode(k)), item, pairs);
            }
        }
        scalar => pairs.push(format!("{}={}", prefix, urlencoding::encode(&scalar.to_string()))),
    }
}
