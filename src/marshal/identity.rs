//! Runtime type tags.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::marshal::value::Value;

/// Classification tag attached to every marshalled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Identity {
    String,
    Number,
    Boolean,
    Null,
    Undefined,
    Regexp,
    Function,
    Object,
    Array,
    Promise,
    Unknown,
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Identity::String => "string",
            Identity::Number => "number",
            Identity::Boolean => "boolean",
            Identity::Null => "null",
            Identity::Undefined => "undefined",
            Identity::Regexp => "regexp",
            Identity::Function => "function",
            Identity::Object => "object",
            Identity::Array => "array",
            Identity::Promise => "promise",
            Identity::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Types that can report their identity tag.
pub trait Identify {
    fn identity(&self) -> Identity;
}

/// Classify a value.
pub fn identify<T: Identify + ?Sized>(value: &T) -> Identity {
    value.identity()
}

impl Identify for Value {
    fn identity(&self) -> Identity {
        match self {
            Value::Null => Identity::Null,
            Value::Bool(_) => Identity::Boolean,
            Value::Number(_) => Identity::Number,
            Value::String(_) => Identity::String,
            Value::Array(_) => Identity::Array,
            Value::Object(_) => Identity::Object,
        }
    }
}

impl<T: Identify> Identify for Option<T> {
    fn identity(&self) -> Identity {
        match self {
            Some(inner) => inner.identity(),
            None => Identity::Undefined,
        }
    }
}

impl Identify for str {
    fn identity(&self) -> Identity {
        Identity::String
    }
}

impl Identify for String {
    fn identity(&self) -> Identity {
        Identity::String
    }
}

impl Identify for bool {
    fn identity(&self) -> Identity {
        Identity::Boolean
    }
}

impl Identify for i64 {
    fn identity(&self) -> Identity {
        Identity::Number
    }
}

impl Identify for f64 {
    fn identity(&self) -> Identity {
        Identity::Number
    }
}

impl<T> Identify for Vec<T> {
    fn identity(&self) -> Identity {
        Identity::Array
    }
}

impl<T> Identify for BTreeMap<String, T> {
    fn identity(&self) -> Identity {
        Identity::Object
    }
}

impl Identify for regex::Regex {
    fn identity(&self) -> Identity {
        Identity::Regexp
    }
}

impl<'a, T> Identify for futures_util::future::BoxFuture<'a, T> {
    fn identity(&self) -> Identity {
        Identity::Promise
    }
}

impl Identify for serde_json::Value {
    fn identity(&self) -> Identity {
        match self {
            serde_json::Value::Null => Identity::Null,
            serde_json::Value::Bool(_) => Identity::Boolean,
            serde_json::Value::Number(_) => Identity::Number,
            serde_json::Value::String(_) => Identity::String,
            serde_json::Value::Array(_) => Identity::Array,
            serde_json::Value::Object(_) => Identity::Object,
        }
    }
}
