//! Configuration schema definitions.
//!
//! This module defines the TOML configuration for a set of router
//! instances. All types derive Serde traits for deserialization.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::marshal::{Number, Value};
use crate::registry::DEFAULT_ORIGIN;
use crate::router::{InstanceSettings, OverlapPolicy, RoutingMode};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Location the in-memory history starts at.
    pub origin: String,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Querystring parsing settings, shared by every instance.
    pub query: QueryConfig,

    /// Router instances, mounted in declaration order.
    pub routers: Vec<InstanceConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            observability: ObservabilityConfig::default(),
            query: QueryConfig::default(),
            routers: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Reject a whole URL when one query parameter cannot be decoded,
    /// instead of dropping that parameter.
    pub strict: bool,
}

/// One router instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Label for logs and CLI output.
    pub name: Option<String>,

    /// Path prefix this instance is scoped to.
    pub base_path: String,

    pub mode: RoutingMode,

    pub rerender_same_route: bool,

    pub overlap: OverlapPolicy,

    pub routes: Vec<RouteConfig>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            name: None,
            base_path: "/".to_string(),
            mode: RoutingMode::default(),
            rerender_same_route: false,
            overlap: OverlapPolicy::default(),
            routes: Vec::new(),
        }
    }
}

impl InstanceConfig {
    pub fn settings(&self, query: &QueryConfig) -> InstanceSettings {
        InstanceSettings {
            mode: self.mode,
            rerender_same_route: self.rerender_same_route,
            overlap: self.overlap,
            strict_query: query.strict,
        }
    }

    /// Name if set, else the base path.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.base_path)
    }
}

/// One route. At most one of `path`, `regex` and `code` may be set;
/// none makes it the default route.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    pub name: Option<String>,

    /// Literal path, or a raw pattern if it contains regex metacharacters.
    pub path: Option<String>,

    /// Regex matched against the full scoped path.
    pub regex: Option<String>,

    /// Status code route (404, 500).
    pub code: Option<i64>,

    /// Component reference handed to the renderer.
    pub component: Option<String>,

    /// Explicit status for the resolved route.
    pub status: Option<u16>,

    /// Expected query parameters.
    pub query: BTreeMap<String, QueryPatternConfig>,

    /// Routes resolved against the remaining path.
    pub children: Vec<RouteConfig>,
}

impl RouteConfig {
    /// How many of `path`, `regex`, `code` are set.
    pub fn specifier_count(&self) -> usize {
        [self.path.is_some(), self.regex.is_some(), self.code.is_some()]
            .into_iter()
            .filter(|set| *set)
            .count()
    }
}

/// An expected query value.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum QueryPatternConfig {
    /// `{ regex = "..." }`
    Regex { regex: String },
    /// Membership in a list.
    OneOf(Vec<ScalarConfig>),
    Exact(ScalarConfig),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ScalarConfig {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl From<&ScalarConfig> for Value {
    fn from(scalar: &ScalarConfig) -> Self {
        match scalar {
            ScalarConfig::Bool(b) => Value::Bool(*b),
            ScalarConfig::Int(i) => Value::Number(Number::Int(*i)),
            ScalarConfig::Float(x) => Value::Number(Number::Float(*x)),
            ScalarConfig::String(s) => Value::String(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: RouterConfig = toml::from_str("").unwrap();
        assert_eq!(config.origin, DEFAULT_ORIGIN);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.query.strict);
        assert!(config.routers.is_empty());
    }

    #[test]
    fn test_full_instance() {
        let config: RouterConfig = toml::from_str(
            r#"
            [query]
            strict = true

            [[routers]]
            base_path = "/app"
            mode = "hash"
            overlap = "latest"

              [[routers.routes]]
              path = "/search"
              query = { q = { regex = '^(\w+)$' }, page = 2, sort = ["asc", "desc"], debug = true }

              [[routers.routes]]
              code = 404
              component = "NotFound"
            "#,
        )
        .unwrap();

        let router = &config.routers[0];
        assert_eq!(router.mode, RoutingMode::Hash);
        assert_eq!(router.overlap, OverlapPolicy::Latest);
        assert!(router.settings(&config.query).strict_query);

        let query = &router.routes[0].query;
        assert!(matches!(query["q"], QueryPatternConfig::Regex { .. }));
        assert_eq!(query["page"], QueryPatternConfig::Exact(ScalarConfig::Int(2)));
        assert_eq!(query["debug"], QueryPatternConfig::Exact(ScalarConfig::Bool(true)));
        assert!(matches!(&query["sort"], QueryPatternConfig::OneOf(v) if v.len() == 2));
        assert_eq!(router.routes[1].code, Some(404));
        assert_eq!(router.routes[1].specifier_count(), 1);
    }
}
