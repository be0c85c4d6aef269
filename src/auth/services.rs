use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::tokens::{JwtKeys, TokenKind},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lower-cased and trimmed, the form stored in `users.email`.
pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Owner of the request. Every bill, task and alert route scopes its data
/// to this id.
#[derive(Debug)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(&parts.headers) else {
            return Err((StatusCode::UNAUTHORIZED, "Sign in to continue".into()));
        };
        JwtKeys::from_ref(state)
            .verify(token, TokenKind::Access, state.clock.now())
            .map(|claims| AuthUser(claims.sub))
            .map_err(|e| {
                warn!(path = %parts.uri.path(), error = %e, "request token rejected");
                (StatusCode::UNAUTHORIZED, e.to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use time::Duration;

    async fn extract(state: &AppState, authorization: Option<String>) -> Result<Uuid, (StatusCode, String)> {
        let mut req = Request::builder().uri("/api/v1/bills");
        if let Some(value) = authorization {
            req = req.header(AUTHORIZATION, value);
        }
        let (mut parts, ()) = req.body(()).unwrap().into_parts();
        AuthUser::from_request_parts(&mut parts, state)
            .await
            .map(|AuthUser(id)| id)
    }

    #[tokio::test]
    async fn access_token_identifies_the_bill_owner() {
        let state = AppState::fake();
        let owner = Uuid::new_v4();
        let pair = JwtKeys::from_ref(&state)
            .issue(owner, state.clock.now())
            .unwrap();

        let id = extract(&state, Some(format!("Bearer {}", pair.access_token)))
            .await
            .unwrap();
        assert_eq!(id, owner);

        let (status, msg) = extract(&state, Some(format!("Bearer {}", pair.refresh_token)))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(msg, "An access token is required");
    }

    #[tokio::test]
    async fn stale_or_missing_tokens_are_unauthorized() {
        let state = AppState::fake();
        let yesterday = state.clock.now() - Duration::days(1);
        let stale = JwtKeys::from_ref(&state)
            .sign(Uuid::new_v4(), TokenKind::Access, yesterday)
            .unwrap();

        let (_, msg) = extract(&state, Some(format!("Bearer {stale}"))).await.unwrap_err();
        assert_eq!(msg, "Session expired, please sign in again");

        let (_, msg) = extract(&state, None).await.unwrap_err();
        assert_eq!(msg, "Sign in to continue");
        let (_, msg) = extract(&state, Some("Basic cGF5bWF0ZQ==".into())).await.unwrap_err();
        assert_eq!(msg, "Sign in to continue");
    }

    #[test]
    fn email_shape_and_normalisation() {
        assert!(is_valid_email("asha@example.in"));
        assert!(!is_valid_email("asha@localhost"));
        assert!(!is_valid_email("no spaces@x.io"));
        assert_eq!(normalize_email("  Asha.Rao@Example.IN "), "asha.rao@example.in");
    }
}
