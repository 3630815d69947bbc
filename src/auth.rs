use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{Role, User, UserView, new_id};
use crate::store::Store;
use crate::validate;

/// Cookie carrying the session token for browser clients
pub const SESSION_COOKIE: &str = "session";

/// User session data
#[derive(Debug, Clone)]
pub struct Session {
    /// Id of the authenticated user
    pub user_id: String,

    /// Time when the session expires
    pub expires_at: SystemTime,
}

/// Active sessions, validated on every request
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        SessionStore {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Create a new session for `user_id` and return its token and expiry
    pub fn create(&self, user_id: &str) -> (String, SystemTime) {
        let token = Uuid::new_v4().to_string();
        let expires_at = SystemTime::now() + self.ttl;

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > SystemTime::now());
        sessions.insert(
            token.clone(),
            Session {
                user_id: user_id.to_string(),
                expires_at,
            },
        );

        (token, expires_at)
    }

    /// Returns the user id of a valid, unexpired session
    pub fn validate(&self, token: &str) -> Option<String> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(token)
            .filter(|s| s.expires_at > SystemTime::now())
            .map(|s| s.user_id.clone())
    }

    pub fn revoke(&self, token: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    /// Drops every session of a user, e.g. after a password change
    pub fn revoke_user(&self, user_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, s| s.user_id != user_id);
    }

    pub fn clear(&self) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Hash a password using Argon2 with a fresh random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AppError::PasswordHash)
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::PasswordHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Checks credentials and returns the matching active user
pub fn authenticate(store: &Store, username: &str, password: &str) -> AppResult<User> {
    let user = store
        .users
        .find(|u| u.username.eq_ignore_ascii_case(username.trim()))
        .filter(|u| u.active);

    match user {
        Some(user) if verify_password(password, &user.password_hash)? => Ok(user),
        _ => {
            log::warn!("rejected login for '{}'", username);
            Err(AppError::InvalidCredentials)
        }
    }
}

/// Creates the `admin` account when no user exists yet
///
/// Returns the generated password when none was configured.
pub fn bootstrap_admin(store: &Store, password: Option<&str>) -> AppResult<Option<String>> {
    if !store.users.is_empty() {
        return Ok(None);
    }

    let generated = password.is_none().then(|| {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect::<String>()
    });
    let password = password.or(generated.as_deref()).unwrap_or_default();

    store.users.insert(User {
        id: new_id(),
        username: "admin".to_string(),
        display_name: "Administrator".to_string(),
        email: "admin@localhost.localdomain".to_string(),
        role: Role::Admin,
        password_hash: hash_password(password)?,
        color: None,
        active: true,
        created_at: Utc::now(),
    })?;
    log::info!("created initial admin account");

    Ok(generated)
}

/// The user a request was authenticated as
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn require_admin(&self) -> AppResult<()> {
        if self.0.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("administrator role required".to_string()))
        }
    }

    /// Admins may act on anyone, other users only on themselves
    pub fn require_self_or_admin(&self, user_id: &str) -> AppResult<()> {
        if self.0.is_admin() || self.0.id == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden("not allowed for other users".to_string()))
        }
    }
}

fn request_token(jar: &CookieJar, request: &Request) -> Option<String> {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());

    bearer.or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

/// Authentication middleware
///
/// Accepts a bearer token or the session cookie, and makes the user
/// available to handlers as `Extension<CurrentUser>`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let user = request_token(&jar, &request)
        .and_then(|token| state.sessions.validate(&token))
        .and_then(|user_id| state.store.users.get(&user_id))
        .filter(|user| user.active);

    match user {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        None => AppError::Unauthorized.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(credentials): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<LoginResponse>)> {
    let user = authenticate(&state.store, &credentials.username, &credentials.password)?;
    let (token, expires_at) = state.sessions.create(&user.id);
    log::info!("user {} logged in", user.username);

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            expires_at: DateTime::<Utc>::from(expires_at),
            user: user.view(),
        }),
    ))
}

pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> (CookieJar, Json<serde_json::Value>) {
    if let Some(token) = request_token(&jar, &request) {
        state.sessions.revoke(&token);
    }
    (
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(serde_json::json!({"status": "ok"})),
    )
}

pub async fn handle_me(Extension(current): Extension<CurrentUser>) -> Json<UserView> {
    Json(current.0.view())
}

#[derive(Debug, Deserialize)]
pub struct PasswordChangeRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub async fn handle_change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(change): Json<PasswordChangeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if !verify_password(&change.old_password, &current.0.password_hash)? {
        return Err(AppError::bad_request("invalid old password"));
    }
    if change.new_password != change.confirm_password {
        return Err(AppError::bad_request("new passwords don't match"));
    }
    validate::password(&change.new_password)?;

    let hash = hash_password(&change.new_password)?;
    state.store.users.update(&current.0.id, |user, _| {
        user.password_hash = hash;
        Ok(())
    })?;
    state.sessions.revoke_user(&current.0.id);

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "Password changed, please log in again"
    })))
}
