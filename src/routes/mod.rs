use axum::http::HeaderMap;
use axum::Router;
use sqlx::PgPool;
use uuid::Uuid;

use crate::Config;

mod health;
mod logs;
mod report;
mod resolve;
mod status;

// ---

pub fn router(pool: PgPool, config: Config) -> Router {
    // ---
    Router::new()
        .merge(report::router())
        .merge(status::router())
        .merge(resolve::router())
        .merge(logs::router())
        .merge(health::router())
        .with_state((pool, config))
}

/// Extract an opaque bearer credential from the `Authorization` header.
///
/// Identity resolution is an external concern; a missing or malformed header
/// yields `None` and callers degrade to anonymous handling.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    // ---
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Derive the opaque caller reference stored on a device row.
///
/// The raw credential is never persisted: a v5 UUID over the token gives a
/// stable, non-reversible identifier that still links all of a caller's
/// devices together.
pub(crate) fn caller_ref(token: &str) -> String {
    // ---
    Uuid::new_v5(&Uuid::NAMESPACE_OID, token.as_bytes()).to_string()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use axum::http::header::AUTHORIZATION;

    #[test]
    fn test_bearer_extraction() {
        // ---
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123".to_string()));

        headers.insert(AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_caller_ref_is_opaque_and_stable() {
        // ---
        let token = "secret-session-credential";
        let first = caller_ref(token);

        // Stable across submissions, so the device link stays idempotent.
        assert_eq!(first, caller_ref(token));
        // Distinct callers stay distinct.
        assert_ne!(first, caller_ref("another-credential"));
        // The stored value is a UUID, never the credential itself.
        assert!(first.parse::<Uuid>().is_ok());
        assert!(!first.contains("secret"));
    }
}
