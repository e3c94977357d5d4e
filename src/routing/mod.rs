//! Rewrite and header rules.
//!
//! Patterns follow the `/prefix/:name*` form: a literal prefix, optionally
//! followed by one trailing wildcard that captures the rest of the path.

use std::borrow::Cow;

use hyper::HeaderMap;
use http::Uri;

use crate::config::BackendOrigin;
use crate::errors::ConfigError;
use crate::middleware::CorsPolicy;

#[cfg(test)]
mod tests;

pub const API_SOURCE: &str = "/api/:path*";
pub const HEALTH_SOURCE: &str = "/health";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    prefix: String,
    capture: Option<String>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }

        let (prefix, capture) = match pattern.find("/:") {
            Some(at) => {
                let name = pattern[at + 2..]
                    .strip_suffix('*')
                    .ok_or_else(|| invalid("wildcard must end with '*'"))?;
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(invalid("wildcard must be the last segment and be named"));
                }
                (&pattern[..at], Some(name.to_string()))
            }
            None => (pattern, None),
        };

        if prefix.contains([':', '*', '?', '#']) {
            return Err(invalid("literal prefix contains reserved characters"));
        }
        if capture.is_none() && prefix.len() > 1 && prefix.ends_with('/') {
            return Err(invalid("trailing '/' is not allowed"));
        }

        Ok(Self {
            prefix: prefix.to_string(),
            capture,
        })
    }

    pub fn capture(&self) -> Option<&str> {
        self.capture.as_deref()
    }

    /// Returns the captured suffix (empty when nothing was captured) if
    /// `path` matches.
    pub fn matches<'a>(&self, path: &'a str) -> Option<&'a str> {
        if path == self.prefix {
            return Some("");
        }
        self.capture.as_ref()?;

        path.strip_prefix(self.prefix.as_str())?.strip_prefix('/')
    }
}

/// Absolute URL, optionally ending in the capture of its source pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTemplate {
    base: String,
    base_path: String,
    capture: Option<String>,
}

impl DestinationTemplate {
    pub fn parse(destination: &str, source: &PathPattern) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidDestination {
            pattern: source.to_string(),
            destination: destination.to_string(),
            reason,
        };

        let base = match source.capture() {
            Some(name) => {
                let placeholder = format!("/:{name}*");
                destination
                    .strip_suffix(placeholder.as_str())
                    .ok_or_else(|| invalid(format!("must end with {placeholder}")))?
            }
            None => destination,
        };
        if base.contains('*') || base.contains("/:") {
            return Err(invalid("unexpected placeholder".to_string()));
        }

        let uri: Uri = base.parse().map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;
        if !matches!(uri.scheme_str(), Some("http") | Some("https")) || uri.authority().is_none() {
            return Err(invalid("must be an absolute http(s) URL".to_string()));
        }
        if uri.query().is_some() {
            return Err(invalid("must not contain a query".to_string()));
        }

        Ok(Self {
            base: base.to_string(),
            base_path: uri.path().trim_end_matches('/').to_string(),
            capture: source.capture().map(str::to_string),
        })
    }

    pub fn render(&self, suffix: &str, query: Option<&str>) -> String {
        let mut url = self.base.clone();
        if self.capture.is_some() && !suffix.is_empty() {
            url.push('/');
            url.push_str(suffix);
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Whether `url`, once parsed the way the forwarding client parses
    /// it, still points at this template's path.
    pub fn contains(&self, url: &str) -> bool {
        let Ok(parsed) = reqwest::Url::parse(url) else {
            return false;
        };
        let path = parsed.path().trim_end_matches('/');
        if path == self.base_path {
            return true;
        }
        self.capture.is_some()
            && path
                .strip_prefix(self.base_path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.prefix)?;
        if let Some(name) = &self.capture {
            write!(f, "/:{name}*")?;
        }
        Ok(())
    }
}

impl std::fmt::Display for DestinationTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.base)?;
        if let Some(name) = &self.capture {
            write!(f, "/:{name}*")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RouteRule {
    pub source: PathPattern,
    pub destination: DestinationTemplate,
}

impl RouteRule {
    pub fn parse(source: &str, destination: &str) -> Result<Self, ConfigError> {
        let source = PathPattern::parse(source)?;
        let destination = DestinationTemplate::parse(destination, &source)?;
        Ok(Self { source, destination })
    }

    pub fn rewrite(&self, path: &str, query: Option<&str>) -> Option<String> {
        let suffix = self.source.matches(path)?;
        let url = self.destination.render(suffix, query);
        self.destination.contains(&url).then_some(url)
    }
}

#[derive(Debug, Clone)]
pub struct CorsRule {
    pub source: PathPattern,
    pub policy: CorsPolicy,
}

/// Immutable routing table built once at startup.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rewrites: Vec<RouteRule>,
    cors: Vec<CorsRule>,
}

impl RouteTable {
    pub fn new(rewrites: Vec<RouteRule>, cors: Vec<CorsRule>) -> Self {
        Self { rewrites, cors }
    }

    /// `/api/:path*` and `/health` to the backend, CORS on `/api/:path*`.
    pub fn for_backend(backend: &BackendOrigin, policy: CorsPolicy) -> Result<Self, ConfigError> {
        let rewrites = vec![
            RouteRule::parse(API_SOURCE, &format!("{backend}{API_SOURCE}"))?,
            RouteRule::parse(HEALTH_SOURCE, &format!("{backend}{HEALTH_SOURCE}"))?,
        ];
        let cors = vec![CorsRule {
            source: PathPattern::parse(API_SOURCE)?,
            policy,
        }];
        Ok(Self::new(rewrites, cors))
    }

    pub fn rewrites(&self) -> &[RouteRule] {
        &self.rewrites
    }

    /// Destination URL of the first rule matching `path` once its dot
    /// segments are resolved.
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Option<String> {
        let path = normalize_path(path);
        self.rewrites.iter().find_map(|rule| rule.rewrite(&path, query))
    }

    pub fn apply_headers(&self, path: &str, headers: &mut HeaderMap) {
        let path = normalize_path(path);
        for rule in &self.cors {
            if rule.source.matches(&path).is_some() {
                rule.policy.apply(headers);
            }
        }
    }
}

fn is_dot_segment(segment: &str) -> Option<bool> {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    match decoded.as_str() {
        "." => Some(false),
        ".." => Some(true),
        _ => None,
    }
}

/// Resolves `.` and `..` segments, literal or percent-encoded, the way
/// URL parsing would. `..` never climbs above the root.
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    let Some(rest) = path.strip_prefix('/') else {
        return Cow::Borrowed(path);
    };
    if !rest.split('/').any(|segment| is_dot_segment(segment).is_some()) {
        return Cow::Borrowed(path);
    }

    let mut segments: Vec<&str> = Vec::new();
    let mut trailing_slash = false;
    for segment in rest.split('/') {
        match is_dot_segment(segment) {
            Some(parent) => {
                if parent {
                    segments.pop();
                }
                trailing_slash = true;
            }
            None => {
                segments.push(segment);
                trailing_slash = false;
            }
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    if trailing_slash && !normalized.ends_with('/') {
        normalized.push('/');
    }
    Cow::Owned(normalized)
}
