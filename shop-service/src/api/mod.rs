mod auth;
mod cart;
pub mod extract;
mod orders;
mod products;
mod rate_limit;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, Uri},
    response::IntoResponse,
    routing::{get, patch, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

pub use rate_limit::{LimitPolicy, RateLimits};

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        ok: true,
        message: None,
        data,
    })
}

pub fn ok_with<T: Serialize>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        ok: true,
        message: Some(message),
        data,
    })
}

pub fn create_router(
    state: AppState,
    client_url: Option<&str>,
    limits: RateLimits,
) -> anyhow::Result<Router> {
    let auth_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me));

    let shop_routes = Router::new()
        .route(
            "/api/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/products/:key",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        )
        .route("/api/cart", get(cart::get_cart))
        .route("/api/cart/items", post(cart::add_item))
        .route(
            "/api/cart/items/:id",
            put(cart::update_item).delete(cart::remove_item),
        )
        .route(
            "/api/orders",
            post(orders::create_order).get(orders::all_orders),
        )
        .route("/api/orders/my", get(orders::my_orders))
        .route("/api/orders/:id/status", patch(orders::update_status));

    Ok(Router::new()
        .route("/health", get(health_check))
        .merge(rate_limit::limit_auth(auth_routes, limits.auth)?)
        .merge(rate_limit::limit_api(shop_routes, limits.api)?)
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(client_url)))
}

fn cors_layer(client_url: Option<&str>) -> CorsLayer {
    let origin = match client_url.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            warn!("CLIENT_URL is not a valid origin, allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    ok(json!({
        "status": "OK",
        "timestamp": Utc::now(),
        "uptime": state.uptime_secs(),
    }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "message": format!("Route {} not found", uri.path()) })),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use chrono::Duration;
    use secrecy::SecretString;
    use serde_json::Value;
    use shared::Role;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::auth::TokenIssuer;
    use crate::store::{MemoryStore, User};

    pub struct TestApp {
        pub router: Router,
        pub store: Arc<MemoryStore>,
        pub state: AppState,
    }

    impl TestApp {
        pub fn new() -> Self {
            let roomy = LimitPolicy {
                period_secs: 1,
                burst: 10_000,
            };
            Self::with_limits(RateLimits {
                auth: roomy,
                api: roomy,
            })
        }

        pub fn with_limits(limits: RateLimits) -> Self {
            let store = Arc::new(MemoryStore::new());
            let tokens = TokenIssuer::new(
                SecretString::from("router-test-secret-long-enough-to-sign".to_string()),
                Duration::hours(1),
            );
            let state = AppState::new(
                store.clone(),
                tokens,
                vec!["Admin@Example.com".to_string()],
            );
            Self {
                router: create_router(state.clone(), None, limits).unwrap(),
                store,
                state,
            }
        }

        pub fn token_for(&self, user: &User) -> String {
            self.state.tokens().issue(user.id, user.role).unwrap()
        }

        pub async fn user(&self, email: &str) -> (User, String) {
            let user = crate::testing::seed_user(self.store.as_ref(), email).await;
            let token = self.token_for(&user);
            (user, token)
        }

        pub async fn admin(&self) -> (User, String) {
            let user = crate::testing::seed_user_with_role(
                self.store.as_ref(),
                "boss@example.com",
                Role::Admin,
            )
            .await;
            let token = self.token_for(&user);
            (user, token)
        }

        pub async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            self.send_with(method, uri, token, body, &[]).await
        }

        pub async fn send_with(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
            headers: &[(&str, &str)],
        ) -> (StatusCode, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("x-forwarded-for")) {
                request = request.header("x-forwarded-for", "127.0.0.1");
            }
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            let request = match body {
                Some(body) => request
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => request.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["status"], "OK");
        assert!(body["data"]["uptime"].is_number());
    }

    #[tokio::test]
    async fn test_unknown_route_is_enveloped_404() {
        let app = TestApp::new();
        let (status, body) = app.send(Method::GET, "/api/nope", None, None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["ok"], false);
        assert_eq!(body["message"], "Route /api/nope not found");
    }
}
