use hyper::HeaderMap;

use crate::config::{BackendOrigin, BACKEND_URL};
use crate::errors::ConfigError;
use crate::middleware::CorsPolicy;
use crate::routing::{normalize_path, PathPattern, RouteRule, RouteTable};

fn table() -> RouteTable {
    let backend = BackendOrigin::parse(BACKEND_URL, "https://api.example.com").unwrap();
    let policy = CorsPolicy::for_origin("http://localhost:3000").unwrap();
    RouteTable::for_backend(&backend, policy).unwrap()
}

#[test]
fn test_api_rewrite() {
    let table = table();
    assert_eq!(
        table.resolve("/api/users/42", None).as_deref(),
        Some("https://api.example.com/api/users/42")
    );
    assert_eq!(
        table.resolve("/api/users/42", Some("expand=roles&limit=5")).as_deref(),
        Some("https://api.example.com/api/users/42?expand=roles&limit=5")
    );
}

#[test]
fn test_health_rewrite() {
    let table = table();
    assert_eq!(
        table.resolve("/health", None).as_deref(),
        Some("https://api.example.com/health")
    );
    assert_eq!(
        table.resolve("/health", Some("verbose=1")).as_deref(),
        Some("https://api.example.com/health?verbose=1")
    );
}

#[test]
fn test_suffix_is_preserved_exactly() {
    let table = table();
    let base = "https://api.example.com/api/";
    for suffix in [
        "a",
        "auth/login",
        "auth/refresh/",
        "users/42/sessions/7",
        "files/report%20final.pdf",
        "deeply/nested/path/with/many/segments",
    ] {
        let destination = table.resolve(&format!("/api/{suffix}"), None).unwrap();
        assert_eq!(destination.strip_prefix(base), Some(suffix));
    }
}

#[test]
fn test_bare_api_prefix() {
    let table = table();
    assert_eq!(table.resolve("/api", None).as_deref(), Some("https://api.example.com/api"));
    assert_eq!(table.resolve("/api/", None).as_deref(), Some("https://api.example.com/api"));
}

#[test]
fn test_unmatched_paths_pass_through() {
    let table = table();
    for path in ["/", "/about", "/apix", "/apis/v1", "/healthz", "/health/live", "/static/app.js"] {
        assert!(table.resolve(path, None).is_none(), "{path} should not be rewritten");
    }
}

#[test]
fn test_first_matching_rule_wins() {
    let table = RouteTable::new(
        vec![
            RouteRule::parse("/api/auth/:rest*", "https://auth.example.com/api/auth/:rest*").unwrap(),
            RouteRule::parse("/api/:path*", "https://api.example.com/api/:path*").unwrap(),
        ],
        Vec::new(),
    );
    assert_eq!(
        table.resolve("/api/auth/login", None).as_deref(),
        Some("https://auth.example.com/api/auth/login")
    );
    assert_eq!(
        table.resolve("/api/users", None).as_deref(),
        Some("https://api.example.com/api/users")
    );
}

#[test]
fn test_headers_only_on_api_paths() {
    let table = table();

    let mut headers = HeaderMap::new();
    table.apply_headers("/api/users", &mut headers);
    assert_eq!(headers.len(), 4);

    let mut headers = HeaderMap::new();
    table.apply_headers("/health", &mut headers);
    assert!(headers.is_empty());

    let mut headers = HeaderMap::new();
    table.apply_headers("/apix", &mut headers);
    assert!(headers.is_empty());
}

#[test]
fn test_pattern_parsing() {
    let pattern = PathPattern::parse("/api/:path*").unwrap();
    assert_eq!(pattern.capture(), Some("path"));
    assert_eq!(pattern.to_string(), "/api/:path*");

    let pattern = PathPattern::parse("/health").unwrap();
    assert_eq!(pattern.capture(), None);

    for bad in ["api/:path*", "/api/:path", "/api/:*", "/api/:path*/more", "/a*b", "/health/"] {
        assert!(
            matches!(PathPattern::parse(bad), Err(ConfigError::InvalidPattern { .. })),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn test_destination_must_embed_capture() {
    let err = RouteRule::parse("/api/:path*", "https://api.example.com/api").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDestination { .. }));

    let err = RouteRule::parse("/api/:path*", "https://api.example.com/api/:other*").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidDestination { .. }));
}

#[test]
fn test_undefined_origin_never_becomes_a_rule() {
    for destination in ["undefined/api/:path*", "/api/:path*", "null/api/:path*"] {
        let err = RouteRule::parse("/api/:path*", destination).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDestination { .. }), "{destination}");
    }
    assert!(RouteRule::parse("/health", "undefined/health").is_err());
}

#[test]
fn test_dot_segments_resolved_before_matching() {
    let table = table();
    for path in [
        "/api/../secret",
        "/api/%2e%2e/docs",
        "/api/%2E%2e/docs",
        "/api/.%2e/docs",
        "/api/x/../../admin",
        "/api/..",
        "/health/../admin",
    ] {
        assert!(table.resolve(path, None).is_none(), "{path} should not be rewritten");
    }

    assert_eq!(
        table.resolve("/api/x/../users", None).as_deref(),
        Some("https://api.example.com/api/users")
    );
    assert_eq!(
        table.resolve("/api/./users/%2e/42", None).as_deref(),
        Some("https://api.example.com/api/users/42")
    );
    assert_eq!(
        table.resolve("/static/../api/users", None).as_deref(),
        Some("https://api.example.com/api/users")
    );
}

#[test]
fn test_backslash_cannot_leave_the_prefix() {
    let table = table();
    assert!(table.resolve("/api/..\\secret", None).is_none());
}

#[test]
fn test_headers_follow_normalized_path() {
    let table = table();

    let mut headers = HeaderMap::new();
    table.apply_headers("/api/../secret", &mut headers);
    assert!(headers.is_empty());

    let mut headers = HeaderMap::new();
    table.apply_headers("/static/../api/users", &mut headers);
    assert_eq!(headers.len(), 4);
}

#[test]
fn test_normalize_path() {
    assert_eq!(normalize_path("/api/users/42"), "/api/users/42");
    assert_eq!(normalize_path("/api/users/"), "/api/users/");
    assert_eq!(normalize_path("/a/b/../c"), "/a/c");
    assert_eq!(normalize_path("/a/./b/."), "/a/b/");
    assert_eq!(normalize_path("/../../etc"), "/etc");
    assert_eq!(normalize_path("/a/%2E%2E"), "/");
    assert_eq!(normalize_path("/a/..b/c"), "/a/..b/c");
}
