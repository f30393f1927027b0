//! Captured parameter values.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::marshal::value::{marshal, Value};

/// Parameters captured by a path or query match.
///
/// Unnamed captures are positional, named captures form a mapping, and a
/// single query capture collapses to a scalar.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Params {
    #[default]
    None,
    Scalar(Value),
    Positional(Vec<Value>),
    Named(BTreeMap<String, Value>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Scalar(_) => false,
            Params::Positional(v) => v.is_empty(),
            Params::Named(m) => m.is_empty(),
        }
    }

    /// Look up a named capture.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Params::Named(m) => m.get(name),
            _ => None,
        }
    }

    /// Look up a positional capture.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Params::Positional(v) => v.get(index),
            Params::Scalar(v) if index == 0 => Some(v),
            _ => None,
        }
    }

    /// Extract captures from a regex match. Named groups win over
    /// positional ones. Positional captures keep one slot per group, so an
    /// unmatched optional group is `Value::Null` and `at(n)` is always
    /// group `n + 1`.
    pub fn from_captures(re: &regex::Regex, caps: &regex::Captures<'_>) -> Self {
        let names: Vec<&str> = re.capture_names().flatten().collect();
        if !names.is_empty() {
            let named = names
                .into_iter()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), marshal(m.as_str()).value))
                })
                .collect();
            return Params::Named(named);
        }

        let positional: Vec<Value> = caps
            .iter()
            .skip(1)
            .map(|m| m.map_or(Value::Null, |m| marshal(m.as_str()).value))
            .collect();
        if positional.is_empty() {
            Params::None
        } else {
            Params::Positional(positional)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_captures_win() {
        let re = regex::Regex::new(r"^/u/(?<id>\d+)/(\w+)$").unwrap();
        let caps = re.captures("/u/42/edit").unwrap();
        let params = Params::from_captures(&re, &caps);
        assert_eq!(params.get("id"), Some(&Value::from(42i64)));
        assert_eq!(params.at(0), None);
    }

    #[test]
    fn test_positional_captures() {
        let re = regex::Regex::new(r"^(\w+)/(\w+)$").unwrap();
        let caps = re.captures("a/b").unwrap();
        let params = Params::from_captures(&re, &caps);
        assert_eq!(
            params,
            Params::Positional(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_unmatched_optional_group_keeps_position() {
        let re = regex::Regex::new(r"^/(a)?/?(b)$").unwrap();
        let caps = re.captures("/b").unwrap();
        let params = Params::from_captures(&re, &caps);
        assert_eq!(params.at(0), Some(&Value::Null));
        assert_eq!(params.at(1), Some(&Value::from("b")));
    }

    #[test]
    fn test_no_groups_is_empty() {
        let re = regex::Regex::new(r"^about$").unwrap();
        let caps = re.captures("about").unwrap();
        assert!(Params::from_captures(&re, &caps).is_empty());
    }
}
