//! URL parser producing `ParsedUrl`.

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::marshal::MarshalError;
use crate::query::Query;

/// Errors raised while parsing a URL.
#[derive(Debug, Error)]
pub enum InvalidUrlError {
    /// Empty or whitespace-only input.
    #[error("empty URL")]
    Empty,

    /// The URL could not be parsed or joined onto the current location.
    #[error("malformed URL '{url}': {source}")]
    Malformed {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// Strict query parsing rejected a parameter.
    #[error("invalid query in '{url}': {source}")]
    Query {
        url: String,
        #[source]
        source: MarshalError,
    },
}

/// The fragment, parsed as its own path and query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HashSegment {
    pub path: String,
    pub query: Query,
}

impl Default for HashSegment {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            query: Query::default(),
        }
    }
}

/// A fully parsed location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedUrl {
    pub protocol: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub hash: HashSegment,
    pub query: Query,
}

/// Parses URLs relative to a base location.
#[derive(Debug, Clone)]
pub struct UrlParser {
    strict_query: bool,
}

impl UrlParser {
    /// Create a parser. With `strict_query`, any undecodable query
    /// parameter fails the whole parse.
    pub fn new(strict_query: bool) -> Self {
        Self { strict_query }
    }

    /// Parse `raw`. Relative URLs inherit protocol, host and port from `base`.
    pub fn parse(&self, raw: &str, base: &Url) -> Result<ParsedUrl, InvalidUrlError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidUrlError::Empty);
        }

        let joined = if trimmed.contains("://") {
            Url::parse(trimmed)
        } else {
            base.join(trimmed)
        };
        let url = joined.map_err(|source| InvalidUrlError::Malformed {
            url: trimmed.to_string(),
            source,
        })?;

        self.split(&url)
    }

    /// Split an already-parsed URL.
    pub fn split(&self, url: &Url) -> Result<ParsedUrl, InvalidUrlError> {
        let query = self.query(url.query().unwrap_or(""), url)?;
        let hash = match url.fragment() {
            Some(fragment) if !fragment.is_empty() => self.hash(fragment, url)?,
            _ => HashSegment::default(),
        };

        Ok(ParsedUrl {
            protocol: url.scheme().to_string(),
            host: url.host_str().unwrap_or("").to_string(),
            port: url.port(),
            path: normalize_path(&decode_path(url.path())),
            hash,
            query,
        })
    }

    fn hash(&self, fragment: &str, url: &Url) -> Result<HashSegment, InvalidUrlError> {
        let (path, qs) = fragment.split_once('?').unwrap_or((fragment, ""));
        Ok(HashSegment {
            path: normalize_path(&decode_path(path)),
            query: self.query(qs, url)?,
        })
    }

    fn query(&self, qs: &str, url: &Url) -> Result<Query, InvalidUrlError> {
        if self.strict_query {
            Query::parse_strict(qs).map_err(|source| InvalidUrlError::Query {
                url: url.to_string(),
                source,
            })
        } else {
            Ok(Query::parse(qs))
        }
    }
}

impl Default for UrlParser {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Ensure a leading `/`; the empty path becomes `/`.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

fn decode_path(path: &str) -> String {
    urlencoding::decode(path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::Value;

    fn base() -> Url {
        Url::parse("https://app.example.com:8443/current?x=1").unwrap()
    }

    #[test]
    fn test_absolute_url() {
        let parsed = UrlParser::default()
            .parse("http://example.com:8080/users/42?tab=posts#/inner?open=true", &base())
            .unwrap();
        assert_eq!(parsed.protocol, "http");
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.port, Some(8080));
        assert_eq!(parsed.path, "/users/42");
        assert_eq!(parsed.query.get("tab"), Some(&Value::from("posts")));
        assert_eq!(parsed.hash.path, "/inner");
        assert_eq!(parsed.hash.query.get("open"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_relative_inherits_origin() {
        let parsed = UrlParser::default().parse("/about", &base()).unwrap();
        assert_eq!(parsed.protocol, "https");
        assert_eq!(parsed.host, "app.example.com");
        assert_eq!(parsed.port, Some(8443));
        assert_eq!(parsed.path, "/about");
        assert!(parsed.query.is_empty());
    }

    #[test]
    fn test_default_port_and_root_path() {
        let parsed = UrlParser::default().parse("https://example.com", &base()).unwrap();
        assert_eq!(parsed.port, None);
        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.hash.path, "/");
    }

    #[test]
    fn test_hash_without_slash_is_normalized() {
        let parsed = UrlParser::default().parse("/page#section", &base()).unwrap();
        assert_eq!(parsed.hash.path, "/section");
    }

    #[test]
    fn test_empty_url_is_rejected() {
        assert!(matches!(
            UrlParser::default().parse("  ", &base()),
            Err(InvalidUrlError::Empty)
        ));
    }

    #[test]
    fn test_strict_query() {
        let strict = UrlParser::new(true);
        assert!(matches!(
            strict.parse("/a?bad=%FF", &base()),
            Err(InvalidUrlError::Query { .. })
        ));

        let lenient = UrlParser::default().parse("/a?bad=%FF&ok=1", &base()).unwrap();
        assert_eq!(lenient.query.rejected(), &["bad".to_string()]);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("a/b"), "/a/b");
        assert_eq!(normalize_path("/a"), "/a");
    }
}
