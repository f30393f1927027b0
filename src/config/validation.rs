//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check base paths are well formed and unique per routing mode
//! - Check each route has at most one path specifier
//! - Check every regex compiles under the pattern limits
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::config::schema::{QueryPatternConfig, RouteConfig, RouterConfig};
use crate::routing::path::{compile_regex, normalize_candidate, PathSpec};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid origin '{0}'")]
    InvalidOrigin(String),

    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),

    #[error("base path '{0}' must start with '/'")]
    InvalidBasePath(String),

    #[error("base path '{0}' is used by more than one router in the same mode")]
    DuplicateBasePath(String),

    #[error("{route}: only one of path, regex and code may be set")]
    ConflictingSpecifiers { route: String },

    #[error("{route}: {message}")]
    InvalidPattern { route: String, message: String },

    #[error("{route}: status {status} is outside 100..=599")]
    InvalidStatus { route: String, status: i64 },
}

/// Validate `config`, collecting every error.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if Url::parse(&config.origin).is_err() {
        errors.push(ValidationError::InvalidOrigin(config.origin.clone()));
    }
    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for (i, router) in config.routers.iter().enumerate() {
        if !router.base_path.starts_with('/') {
            errors.push(ValidationError::InvalidBasePath(router.base_path.clone()));
        } else if !seen.insert((router.mode, normalize_candidate(&router.base_path))) {
            errors.push(ValidationError::DuplicateBasePath(router.base_path.clone()));
        }
        validate_routes(&router.routes, &format!("routers[{}].routes", i), &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_routes(routes: &[RouteConfig], prefix: &str, errors: &mut Vec<ValidationError>) {
    for (i, route) in routes.iter().enumerate() {
        let label = format!("{}[{}]", prefix, i);

        if route.specifier_count() > 1 {
            errors.push(ValidationError::ConflictingSpecifiers {
                route: label.clone(),
            });
        }
        if let Some(path) = &route.path {
            if let Err(e) = PathSpec::parse(path) {
                errors.push(ValidationError::InvalidPattern {
                    route: label.clone(),
                    message: e.to_string(),
                });
            }
        }
        if let Some(regex) = &route.regex {
            if let Err(e) = compile_regex(regex) {
                errors.push(ValidationError::InvalidPattern {
                    route: label.clone(),
                    message: e.to_string(),
                });
            }
        }
        for (key, pattern) in &route.query {
            if let QueryPatternConfig::Regex { regex } = pattern {
                if let Err(e) = compile_regex(regex) {
                    errors.push(ValidationError::InvalidPattern {
                        route: format!("{}.query.{}", label, key),
                        message: e.to_string(),
                    });
                }
            }
        }
        for status in [route.code, route.status.map(i64::from)].into_iter().flatten() {
            if !(100..600).contains(&status) {
                errors.push(ValidationError::InvalidStatus {
                    route: label.clone(),
                    status,
                });
            }
        }

        validate_routes(&route.children, &format!("{}.children", label), errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> RouterConfig {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r#"
            [[routers]]
              [[routers.routes]]
              name = "home"
              [[routers.routes]]
              path = "/users"
                [[routers.routes.children]]
                regex = '^/(?<id>\d+)$'
            "#,
        );
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = parse(
            r#"
            origin = "nowhere"
            [observability]
            log_level = "loud"

            [[routers]]
            base_path = "/a"
            [[routers]]
            base_path = "/a/"
            [[routers]]
            base_path = "relative"
              [[routers.routes]]
              path = "/x"
              regex = "^/x$"
              [[routers.routes]]
              regex = "(unclosed"
              [[routers.routes]]
              code = 99
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidOrigin("nowhere".into())));
        assert!(errors.contains(&ValidationError::InvalidLogLevel("loud".into())));
        assert!(errors.contains(&ValidationError::DuplicateBasePath("/a/".into())));
        assert!(errors.contains(&ValidationError::InvalidBasePath("relative".into())));
        assert!(errors.contains(&ValidationError::ConflictingSpecifiers {
            route: "routers[2].routes[0]".into()
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPattern { route, .. } if route == "routers[2].routes[1]")));
        assert!(errors.contains(&ValidationError::InvalidStatus {
            route: "routers[2].routes[2]".into(),
            status: 99
        }));
        assert_eq!(errors.len(), 7);
    }

    #[test]
    fn test_nested_query_regex_checked() {
        let config = parse(
            r#"
            [[routers]]
              [[routers.routes]]
              path = "/p"
                [[routers.routes.children]]
                path = "/c"
                query = { q = { regex = "[" } }
            "#,
        );
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidPattern { route, .. } if route == "routers[0].routes[0].children[0].query.q"
        ));
    }
}
