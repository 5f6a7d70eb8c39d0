//! The token refresher.
//!
//! Refresh failures never surface as errors. They are recorded on the bundle
//! itself so that every later consumer sees them through
//! [`TokenInfo::has_error`] and asks the user to sign in again.

use tracing::{debug, warn};

use crate::oauth::OAuthClient;
use crate::tokens::TokenInfo;

/// Error flag text when there is nothing to refresh with.
pub const NO_REFRESH_TOKEN: &str = "no refresh token available";

/// Brings `bundle` up to date.
///
/// An unexpired bundle is returned unchanged, as is one already carrying the
/// error flag. Otherwise one refresh request is made: on success the access
/// token and expiry are replaced (adopting a rotated refresh token if one was
/// issued), on failure the error flag is set and the stale access token kept.
pub async fn refresh_credentials(oauth: &OAuthClient, mut bundle: TokenInfo) -> TokenInfo {
    if !bundle.is_expired() || bundle.has_error() {
        return bundle;
    }

    let Some(refresh_token) = bundle.refresh_token.clone() else {
        warn!("access token expired and no refresh token is stored");
        bundle.mark_error(NO_REFRESH_TOKEN);
        return bundle;
    };

    debug!(expired_at = ?bundle.expires_at, "refreshing access token");
    match oauth.refresh_token(&refresh_token).await {
        Ok(refreshed) => {
            let rotated = refreshed.refresh_token.is_some();
            bundle.apply_refresh(refreshed);
            if let Some(reason) = &bundle.error {
                warn!(error = %reason, "token refresh rejected");
            } else {
                debug!(rotated, "access token refreshed");
            }
        }
        Err(e) => {
            warn!(error = %e, "token refresh failed");
            bundle.mark_error(e.to_string());
        }
    }
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OAuthCredentials, PickerConfig};
    use crate::test_support::serve;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::post;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn oauth(token_url: String) -> OAuthClient {
        let config = PickerConfig::new(OAuthCredentials::new(
            "test.apps.googleusercontent.com",
            "secret",
        ))
        .with_token_url(token_url);
        OAuthClient::new(&config).unwrap()
    }

    fn expired(refresh_token: Option<&str>) -> TokenInfo {
        TokenInfo::new("stale", refresh_token.map(String::from), None, vec![])
            .with_expires_at(Utc::now() - Duration::minutes(5))
    }

    /// Token endpoint that counts calls and answers with `body`.
    async fn token_server(status: StatusCode, body: serde_json::Value) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/token",
            post(move || {
                let body = body.clone();
                counter.fetch_add(1, Ordering::SeqCst);
                async move { (status, axum::Json(body)) }
            }),
        );
        (format!("{}/token", serve(app).await), calls)
    }

    #[tokio::test]
    async fn unexpired_bundle_is_untouched() {
        let (url, calls) = token_server(StatusCode::OK, serde_json::json!({})).await;
        let bundle = TokenInfo::new("fresh", Some("r1".into()), Some(3600), vec![]);

        let result = refresh_credentials(&oauth(url), bundle.clone()).await;

        assert_eq!(result, bundle);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rotation_replaces_refresh_token() {
        let (url, calls) = token_server(
            StatusCode::OK,
            serde_json::json!({"access_token": "a2", "refresh_token": "r2", "expires_in": 3600}),
        )
        .await;

        let result = refresh_credentials(&oauth(url), expired(Some("r1"))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.access_token, "a2");
        assert_eq!(result.refresh_token.as_deref(), Some("r2"));
        assert!(!result.is_expired());
        assert!(!result.has_error());
    }

    #[tokio::test]
    async fn out_of_range_lifetime_sets_error_flag() {
        let (url, calls) = token_server(
            StatusCode::OK,
            serde_json::json!({"access_token": "a2", "expires_in": i64::MAX}),
        )
        .await;

        let result = refresh_credentials(&oauth(url), expired(Some("r1"))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.has_error());
        assert_eq!(result.access_token, "stale");
        assert_eq!(result.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn old_refresh_token_retained_without_rotation() {
        let (url, _) = token_server(
            StatusCode::OK,
            serde_json::json!({"access_token": "a2", "expires_in": 3600}),
        )
        .await;

        let result = refresh_credentials(&oauth(url), expired(Some("r1"))).await;

        assert_eq!(result.access_token, "a2");
        assert_eq!(result.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn failure_sets_error_flag_and_keeps_stale_token() {
        let (url, calls) = token_server(
            StatusCode::BAD_REQUEST,
            serde_json::json!({"error": "invalid_grant"}),
        )
        .await;

        let result = refresh_credentials(&oauth(url), expired(Some("r1"))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.has_error());
        assert_eq!(result.access_token, "stale");
        assert_eq!(result.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn network_failure_sets_error_flag() {
        // Nothing listens on port 9 of the loopback interface.
        let result =
            refresh_credentials(&oauth("http://127.0.0.1:9/token".into()), expired(Some("r1"))).await;
        assert!(result.has_error());
        assert_eq!(result.access_token, "stale");
    }

    #[tokio::test]
    async fn missing_refresh_token_sets_error_flag() {
        let (url, calls) = token_server(StatusCode::OK, serde_json::json!({})).await;

        let result = refresh_credentials(&oauth(url), expired(None)).await;

        assert_eq!(result.error.as_deref(), Some(NO_REFRESH_TOKEN));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn flagged_bundle_is_not_retried() {
        let (url, calls) = token_server(
            StatusCode::OK,
            serde_json::json!({"access_token": "a2", "expires_in": 3600}),
        )
        .await;
        let mut bundle = expired(Some("r1"));
        bundle.mark_error("earlier failure");

        let result = refresh_credentials(&oauth(url), bundle).await;

        assert!(result.has_error());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
