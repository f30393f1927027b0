//! Building route tables and instances from configuration.

use std::sync::Arc;

use crate::config::schema::{InstanceConfig, QueryConfig, QueryPatternConfig, RouteConfig};
use crate::marshal::Value;
use crate::query::{QueryExpectation, QueryPattern};
use crate::registry::History;
use crate::router::RouterInstance;
use crate::routing::path::compile_regex;
use crate::routing::{PathSpec, PatternError, Route, RouteTable};

/// Compile route configs into a table, children included.
pub fn compile_routes(routes: &[RouteConfig]) -> Result<RouteTable, PatternError> {
    routes.iter().map(compile_route).collect()
}

fn compile_route(config: &RouteConfig) -> Result<Route, PatternError> {
    let spec = match (&config.path, &config.regex, config.code) {
        (Some(path), _, _) => PathSpec::parse(path)?,
        (None, Some(regex), _) => PathSpec::regex(regex)?,
        (None, None, Some(code)) => PathSpec::Numeric(code),
        (None, None, None) => PathSpec::Default,
    };

    let mut route = Route::new(spec).with_children(compile_routes(&config.children)?);
    if let Some(name) = &config.name {
        route = route.with_name(name.as_str());
    }
    if let Some(component) = &config.component {
        route = route.with_component(component.as_str());
    }
    if let Some(status) = config.status {
        route = route.with_status(status);
    }
    if !config.query.is_empty() {
        route = route.with_query(compile_query(config)?);
    }
    Ok(route)
}

fn compile_query(config: &RouteConfig) -> Result<QueryExpectation, PatternError> {
    config
        .query
        .iter()
        .map(|(key, pattern)| {
            let pattern = match pattern {
                QueryPatternConfig::Regex { regex } => QueryPattern::Regex(compile_regex(regex)?),
                QueryPatternConfig::OneOf(items) => {
                    QueryPattern::OneOf(items.iter().map(Value::from).collect())
                }
                QueryPatternConfig::Exact(scalar) => QueryPattern::Exact(Value::from(scalar)),
            };
            Ok::<_, PatternError>((key.clone(), pattern))
        })
        .collect()
}

/// Build an unmounted instance for `config`.
pub fn build_instance(
    config: &InstanceConfig,
    query: &QueryConfig,
    history: Arc<dyn History>,
) -> Result<Arc<RouterInstance>, PatternError> {
    let routes = compile_routes(&config.routes)?;
    Ok(RouterInstance::builder(history)
        .base_path(&config.base_path)
        .routes(routes)
        .settings(config.settings(query))
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;
    use crate::query::Query;
    use crate::registry::{MemoryHistory, DEFAULT_ORIGIN};

    const CONFIG: &str = r#"
        [[routers]]
        base_path = "/app"

          [[routers.routes]]
          name = "home"
          component = "Home"

          [[routers.routes]]
          name = "users"
          path = "/users"
            [[routers.routes.children]]
            name = "user"
            regex = '^/(?<id>\d+)$'

          [[routers.routes]]
          name = "search"
          path = "/search"
          query = { sort = ["asc", "desc"], page = 1 }

          [[routers.routes]]
          code = 404
          component = "NotFound"
    "#;

    #[test]
    fn test_compiled_table_resolves() {
        let config = parse_config(CONFIG).unwrap();
        let table = compile_routes(&config.routers[0].routes).unwrap();
        assert_eq!(table.len(), 4);

        let none = Query::default();
        assert_eq!(table.resolve("/", &none, None).component(), Some("Home"));
        let user = table.resolve("/users/5", &none, None);
        assert_eq!(user.leaf().name(), Some("user"));

        let search = table.resolve("/search", &Query::parse("sort=desc&page=1"), None);
        assert_eq!(search.name(), Some("search"));
        let miss = table.resolve("/search", &Query::parse("sort=up&page=1"), None);
        assert_eq!(miss.component(), Some("NotFound"));
        assert_eq!(miss.status, 404);
    }

    #[tokio::test]
    async fn test_build_instance() {
        let config = parse_config(CONFIG).unwrap();
        let history = Arc::new(MemoryHistory::new(DEFAULT_ORIGIN).unwrap());
        let instance = build_instance(&config.routers[0], &config.query, history).unwrap();
        assert_eq!(instance.base_path(), "/app");
        assert_eq!(instance.get("/app/users").unwrap().name(), Some("users"));
    }
}
