use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query},
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use shared::Role;

use crate::auth::bearer_token;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::User;

#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// The caller, resolved from a valid bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// The caller, who must also hold the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;
        let claims = state.tokens().verify(token)?;

        let user = state
            .store()
            .find_user(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token - user not found".to_string()))?;
        Ok(Self(user))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        // Role comes from the stored user, not the token claims.
        if user.role != Role::Admin {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}
