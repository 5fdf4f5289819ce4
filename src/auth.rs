use std::future::Future;
use axum::{
    extract::{State, Json, FromRequestParts, OptionalFromRequestParts},
    response::{IntoResponse, Response},
    http::{StatusCode, request::Parts, HeaderValue, header},
};
use serde::{Deserialize, Serialize};
use crate::AppState;
use crate::db::models::{AuditActor, Role};
use crate::error::ApiError;
use std::env;
use jsonwebtoken::{encode, decode, EncodingKey, DecodingKey, Header, Validation};
use chrono::{Utc, Duration};

const AUTH_COOKIE_NAME: &str = "auth_token";

#[derive(Deserialize)]
pub struct DevLoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    user: UserProfile,
}

#[derive(Serialize, Clone, Debug)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    exp: usize,
    email: String,
    name: String,
    role: Role,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    /// Identity recorded on audit entries written on this user's behalf.
    pub fn actor(&self) -> AuditActor {
        AuditActor {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync + 'static,
{
    type Rejection = ApiError;

    fn from_request_parts(parts: &mut Parts, _state: &S) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let token = extract_token(parts)
                .ok_or_else(|| ApiError::Unauthorized("Missing auth token".to_string()))?;
            let secret = env::var("JWT_SECRET").map_err(|_| {
                tracing::error!("JWT_SECRET not set");
                ApiError::Internal(anyhow::anyhow!("Server configuration error"))
            })?;

            let mut validation = Validation::default();
            validation.validate_exp = true;

            let token_data = decode::<Claims>(
                &token,
                &DecodingKey::from_secret(secret.as_ref()),
                &validation,
            )
            .map_err(|e| {
                tracing::warn!("Token error: {}", e);
                ApiError::Unauthorized("Invalid token".to_string())
            })?;

            Ok(AuthenticatedUser {
                id: token_data.claims.sub,
                email: token_data.claims.email,
                name: token_data.claims.name,
                role: token_data.claims.role,
            })
        }
    }
}

impl<S> OptionalFromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync + 'static,
{
    type Rejection = ApiError;

    fn from_request_parts(parts: &mut Parts, state: &S) -> impl Future<Output = Result<Option<Self>, Self::Rejection>> + Send {
        let present = extract_token(parts).is_some();
        let user = <AuthenticatedUser as FromRequestParts<S>>::from_request_parts(parts, state);
        async move {
            if !present {
                return Ok(None);
            }
            user.await.map(Some)
        }
    }
}

/// An authenticated caller holding the `admin` role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync + 'static,
{
    type Rejection = ApiError;

    fn from_request_parts(parts: &mut Parts, state: &S) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user = <AuthenticatedUser as FromRequestParts<S>>::from_request_parts(parts, state);
        async move {
            let user = user.await?;
            if user.role != Role::Admin {
                tracing::warn!("Non-admin {} attempted an admin route", user.id);
                return Err(ApiError::Forbidden("Admin access required".to_string()));
            }
            Ok(AdminUser(user))
        }
    }
}

impl std::ops::Deref for AdminUser {
    type Target = AuthenticatedUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub async fn dev_login(
    State(state): State<AppState>,
    Json(payload): Json<DevLoginRequest>,
) -> Response {
    // Only allow dev login in development and if explicitly enabled
    if state.config.is_production() || env::var("ALLOW_DEV_LOGIN").unwrap_or_default() != "true" {
        return ApiError::Forbidden("Dev login disabled".to_string()).into_response();
    }

    let dev_user = env::var("DEV_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let dev_pass = env::var("DEV_PASSWORD").unwrap_or_else(|_| "password".to_string());

    if dev_pass == "password" {
        tracing::warn!("Default DEV_PASSWORD is not allowed");
        return ApiError::Forbidden("Dev login misconfigured".to_string()).into_response();
    }

    if payload.username != dev_user || payload.password != dev_pass {
        return ApiError::Unauthorized("Invalid credentials".to_string()).into_response();
    }

    let user = UserProfile {
        id: "usr_9999".to_string(),
        email: "admin@foodplatform.org".to_string(),
        name: "Admin User".to_string(),
        role: Role::Admin,
    };
    match issue_token(&user) {
        Ok(token) => with_cookie(Json(AuthResponse { user }).into_response(), &build_auth_cookie(&token, state.config.is_production())),
        Err(e) => {
            tracing::error!("JWT creation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to create token").into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>) -> Response {
    let cookie = clear_auth_cookie(state.config.is_production());
    with_cookie((StatusCode::OK, "OK").into_response(), &cookie)
}

pub async fn me(user: AuthenticatedUser) -> impl IntoResponse {
    Json(UserProfile {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    })
}

/// Signs a one-day token for `user` with `JWT_SECRET`.
pub fn issue_token(user: &UserProfile) -> anyhow::Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| anyhow::anyhow!("token expiry out of range"))?
        .timestamp();

    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        exp: expiration as usize,
    };

    let secret = env::var("JWT_SECRET")
        .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref()))?;

    Ok(token)
}

fn with_cookie(mut response: Response, cookie: &str) -> Response {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().insert(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("Invalid cookie header: {}", e),
    }
    response
}

fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    if let Some(cookie_header) = parts
        .headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
    {
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some((k, v)) = cookie.split_once('=') {
                if k == AUTH_COOKIE_NAME {
                    return Some(v.to_string());
                }
            }
        }
    }
    None
}

fn build_auth_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age=86400",
        AUTH_COOKIE_NAME,
        token
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn clear_auth_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        AUTH_COOKIE_NAME
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header_name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header_name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn token_is_read_from_bearer_header_or_cookie() {
        let parts = parts_with(header::AUTHORIZATION, "Bearer abc.def");
        assert_eq!(extract_token(&parts).as_deref(), Some("abc.def"));

        let parts = parts_with(header::COOKIE, "theme=dark; auth_token=xyz");
        assert_eq!(extract_token(&parts).as_deref(), Some("xyz"));

        let parts = parts_with(header::COOKIE, "theme=dark");
        assert!(extract_token(&parts).is_none());
    }

    #[test]
    fn secure_flag_follows_environment() {
        assert!(build_auth_cookie("t", true).ends_with("; Secure"));
        assert!(!clear_auth_cookie(false).contains("Secure"));
    }
}
