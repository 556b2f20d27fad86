use axum::{
    extract::{FromRef, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AdminStats, LoginRequest, MessageResponse, SessionUser, SignupRequest},
        password,
        repo::Role,
        session::{self, AuthUser, SessionKeys},
    },
    error::ApiError,
    extract::ApiJson,
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/admin/stats", get(admin_stats))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<SignupRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation("Missing fields".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "signup with invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("signup with short password");
        return Err(ApiError::Validation(
            "Password must be at least 8 chars".into(),
        ));
    }
    if let Some(name) = payload.name.as_deref() {
        if name.trim().len() < 2 {
            return Err(ApiError::Validation("Name is required".into()));
        }
    }

    if state.users.find_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "signup for registered email");
        return Err(ApiError::Conflict("User already exists".into()));
    }

    let hash = password::hash_password(&payload.password)?;
    let user = state
        .users
        .create(&payload.email, payload.name.as_deref(), &hash)
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Json(MessageResponse {
        message: "Signup success".into(),
    }))
}

/// Unknown email and wrong password take the same exit so the response
/// never reveals which one it was.
#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(mut payload): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = match state.users.find_by_email(&payload.email).await? {
        Some(user) => user,
        None => {
            warn!("login with unknown email");
            return Err(ApiError::InvalidCredentials);
        }
    };

    if !password::verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let keys = SessionKeys::from_ref(&state);
    let token = keys.sign(user.id)?;
    let jar = jar.add(session::session_cookie(
        token,
        state.config.auth.cookie_secure,
    ));

    info!(user_id = %user.id, "user logged in");
    Ok((StatusCode::FOUND, jar, [(header::LOCATION, "/")]))
}

/// Idempotent: clearing an absent cookie is still a success.
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.remove(session::removal_cookie()),
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    )
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SessionUser>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(SessionUser::from(user)))
}

#[instrument(skip(state))]
pub async fn admin_stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AdminStats>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if user.role != Role::Admin {
        return Err(ApiError::Forbidden("Admin access required".into()));
    }

    let total_users = state.users.count().await?;
    Ok(Json(AdminStats { total_users }))
}
