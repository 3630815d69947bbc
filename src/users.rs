use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::{CurrentUser, hash_password};
use crate::error::{AppError, AppResult};
use crate::models::{Role, User, UserView, new_id};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub password: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub color: Option<String>,
}

fn default_role() -> Role {
    Role::Employee
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub color: Option<String>,
    pub active: Option<bool>,
}

/// Users in roster order: display name, then id
pub fn roster(users: Vec<User>) -> Vec<User> {
    let mut users = users;
    users.sort_by(|a, b| {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    users
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<UserView>> {
    let users = roster(state.store.users.list());
    Json(users.iter().map(User::view).collect())
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<UserView>> {
    Ok(Json(state.store.users.require(&id)?.view()))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    current.require_admin()?;

    let username = req.username.trim().to_string();
    validate::username(&username)?;
    validate::email(&req.email)?;
    validate::password(&req.password)?;
    if let Some(color) = &req.color {
        validate::color(color)?;
    }

    let user = User {
        id: new_id(),
        display_name: validate::optional(req.display_name).unwrap_or_else(|| username.clone()),
        username,
        email: req.email.trim().to_string(),
        role: req.role,
        password_hash: hash_password(&req.password)?,
        color: req.color,
        active: true,
        created_at: Utc::now(),
    };

    let created = state.store.users.insert_checked(user, |users| {
        for existing in users.values() {
            if existing.username.eq_ignore_ascii_case(&req.username.trim()) {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
            if existing.email.eq_ignore_ascii_case(req.email.trim()) {
                return Err(AppError::Conflict(
                    "Email address is already registered".to_string(),
                ));
            }
        }
        Ok(())
    })?;

    Ok((StatusCode::CREATED, Json(created.view())))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<UserView>> {
    current.require_self_or_admin(&id)?;
    if (req.role.is_some() || req.active.is_some()) && !current.0.is_admin() {
        return Err(AppError::Forbidden(
            "only administrators change roles or activation".to_string(),
        ));
    }
    if current.0.id == id && (req.active == Some(false) || req.role == Some(Role::Employee)) {
        return Err(AppError::Conflict(
            "you cannot deactivate or demote yourself".to_string(),
        ));
    }
    if let Some(email) = &req.email {
        validate::email(email)?;
    }
    if let Some(color) = &req.color {
        validate::color(color)?;
    }

    let updated = state.store.users.update(&id, |user, users| {
        if let Some(name) = validate::optional(req.display_name) {
            user.display_name = name;
        }
        if let Some(email) = req.email {
            let email = email.trim().to_string();
            if users
                .values()
                .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&email))
            {
                return Err(AppError::Conflict(
                    "Email address is already registered".to_string(),
                ));
            }
            user.email = email;
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(color) = req.color {
            user.color = Some(color);
        }
        if let Some(active) = req.active {
            user.active = active;
        }
        Ok(())
    })?;

    if !updated.active {
        state.sessions.revoke_user(&updated.id);
    }
    Ok(Json(updated.view()))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    current.require_admin()?;
    if current.0.id == id {
        return Err(AppError::Conflict("you cannot delete yourself".to_string()));
    }
    state.store.users.remove(&id)?;
    state.sessions.revoke_user(&id);
    Ok(StatusCode::NO_CONTENT)
}
