use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use shared::{Role, UserProfile};
use tracing::info;

use super::extract::{ApiJson, AuthUser};
use super::{ok, ok_with};
use crate::auth::{hash_password, verify_password, AuthError};
use crate::error::AppError;
use crate::state::AppState;
use crate::store::User;

const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserProfile,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AppError> {
    let name_len = request.name.trim().chars().count();
    if !(2..=50).contains(&name_len) {
        return Err(AppError::bad_request("Name must be between 2 and 50 characters"));
    }
    if !is_valid_email(&normalize_email(&request.email)) {
        return Err(AppError::bad_request("Please provide a valid email"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request("Password must be at least 6 characters"));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_registration(&request)?;

    let email = normalize_email(&request.email);
    let role = if state.is_admin_email(&email) {
        Role::Admin
    } else {
        Role::User
    };
    let password_hash = hash_password(&request.password)?;
    let user = User::local(request.name.trim().to_string(), email, password_hash, role);

    state.store().insert_user(&user).await?;
    let token = state.tokens().issue(user.id, user.role)?;

    info!(user_id = %user.id, role = user.role.as_str(), "User registered");
    Ok((
        StatusCode::CREATED,
        ok_with(
            "User registered successfully",
            AuthResponse {
                user: user.profile(),
                token,
            },
        ),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .store()
        .find_user_by_email(&normalize_email(&request.email))
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    // Accounts from an external provider have no local password.
    let hash = user
        .password_hash
        .as_deref()
        .ok_or(AuthError::InvalidCredentials)?;
    verify_password(&request.password, hash)?;

    let token = state.tokens().issue(user.id, user.role)?;
    info!(user_id = %user.id, "User logged in");

    Ok(ok_with(
        "Login successful",
        AuthResponse {
            user: user.profile(),
            token,
        },
    ))
}

pub async fn me(AuthUser(user): AuthUser) -> impl IntoResponse {
    ok(MeResponse {
        user: user.profile(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::TestApp;
    use axum::http::Method;
    use serde_json::json;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("a@example.com"));
        assert!(!is_valid_email("a@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@@example.com"));
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let app = TestApp::new();

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Test User", "email": "Test@Example.com", "password": "password123"})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["user"]["email"], "test@example.com");
        assert_eq!(body["data"]["user"]["role"], "user");
        assert!(body["data"]["user"].get("passwordHash").is_none());

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "test@example.com", "password": "password123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let (status, body) = app.send(Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["name"], "Test User");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let app = TestApp::new();
        let request = json!({"name": "Test User", "email": "dup@example.com", "password": "password123"});

        app.send(Method::POST, "/api/auth/register", None, Some(request.clone()))
            .await;
        let (status, body) = app
            .send(Method::POST, "/api/auth/register", None, Some(request))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("already exists"));
    }

    #[tokio::test]
    async fn test_admin_email_registers_as_admin() {
        let app = TestApp::new();
        let (_, body) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Admin", "email": "admin@example.com", "password": "password123"})),
            )
            .await;
        assert_eq!(body["data"]["user"]["role"], "admin");
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let app = TestApp::new();
        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": "Test User", "email": "short@example.com", "password": "123"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Password must be at least 6 characters");
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let app = TestApp::new();
        app.send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Test User", "email": "pw@example.com", "password": "password123"})),
        )
        .await;

        let (status, body) = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "pw@example.com", "password": "wrongpass"})),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_me_requires_a_valid_token() {
        let app = TestApp::new();

        let (status, body) = app.send(Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Access token required");

        let (status, body) = app
            .send(Method::GET, "/api/auth/me", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid token");
    }

    #[tokio::test]
    async fn test_malformed_json_is_a_bad_request() {
        let app = TestApp::new();
        let (status, body) = app
            .send(Method::POST, "/api/auth/login", None, Some(json!({"email": 42})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["ok"], false);
    }
}
