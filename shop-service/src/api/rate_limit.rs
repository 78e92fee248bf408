use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;

const AUTH_LIMITED: &str = "Too many auth attempts, please try again later.";
const API_LIMITED: &str = "Too many requests from this IP, please try again later.";

/// Per-client-IP token bucket: up to `burst` requests at once, refilled by
/// one every `period_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    pub period_secs: u64,
    pub burst: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    pub auth: LimitPolicy,
    pub api: LimitPolicy,
}

pub fn limit_auth<S>(routes: Router<S>, policy: LimitPolicy) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    Ok(limited(routes, policy)?.layer(middleware::map_response(auth_limited)))
}

pub fn limit_api<S>(routes: Router<S>, policy: LimitPolicy) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    Ok(limited(routes, policy)?.layer(middleware::map_response(api_limited)))
}

fn limited<S>(routes: Router<S>, policy: LimitPolicy) -> Result<Router<S>>
where
    S: Clone + Send + Sync + 'static,
{
    // Client IP from X-Forwarded-For / X-Real-IP / Forwarded, else the peer address.
    let config = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(policy.period_secs)
        .burst_size(policy.burst)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {policy:?}"))?;

    Ok(routes.layer(GovernorLayer {
        config: Arc::new(config),
    }))
}

async fn auth_limited(response: Response) -> Response {
    enveloped(response, AUTH_LIMITED)
}

async fn api_limited(response: Response) -> Response {
    enveloped(response, API_LIMITED)
}

/// Swaps the limiter's plain-text 429 body for the JSON envelope, keeping
/// the retry headers.
fn enveloped(response: Response, message: &'static str) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    (parts, Json(json!({ "ok": false, "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::TestApp;
    use axum::http::Method;

    fn strict(burst: u32) -> LimitPolicy {
        LimitPolicy {
            period_secs: 600,
            burst,
        }
    }

    fn login() -> serde_json::Value {
        json!({"email": "nobody@example.com", "password": "secret123"})
    }

    #[tokio::test]
    async fn test_auth_routes_have_their_own_budget() {
        let app = TestApp::with_limits(RateLimits {
            auth: strict(2),
            api: strict(100),
        });

        for _ in 0..2 {
            let (status, _) = app
                .send(Method::POST, "/api/auth/login", None, Some(login()))
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }
        let (status, body) = app
            .send(Method::POST, "/api/auth/login", None, Some(login()))
            .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["ok"], false);
        assert_eq!(body["message"], AUTH_LIMITED);

        // Other clients and other routes are unaffected.
        let (status, _) = app
            .send_with(
                Method::POST,
                "/api/auth/login",
                None,
                Some(login()),
                &[("x-forwarded-for", "203.0.113.7")],
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app.send(Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_routes_are_limited_but_health_is_not() {
        let app = TestApp::with_limits(RateLimits {
            auth: strict(5),
            api: strict(1),
        });

        let (status, _) = app.send(Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = app.send(Method::GET, "/api/products", None, None).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["message"], API_LIMITED);

        for _ in 0..3 {
            let (status, _) = app.send(Method::GET, "/health", None, None).await;
            assert_eq!(status, StatusCode::OK);
        }
    }

    #[test]
    fn test_zero_burst_is_rejected() {
        let routes: Router = Router::new();
        assert!(limited(routes, strict(0)).is_err());
    }
}
