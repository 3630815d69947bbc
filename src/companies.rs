use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::models::{Company, Project, new_id};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct CompanyRequest {
    pub name: String,
    pub address: Option<String>,
    pub vat_number: Option<String>,
    pub contact_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub company_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    pub company: Option<String>,
}

fn checked_email(email: Option<String>) -> AppResult<Option<String>> {
    let email = validate::optional(email);
    if let Some(email) = &email {
        validate::email(email)?;
    }
    Ok(email)
}

pub async fn list_companies(State(state): State<Arc<AppState>>) -> Json<Vec<Company>> {
    let mut companies = state.store.companies.list();
    companies.sort_by_key(|c| c.name.to_lowercase());
    Json(companies)
}

pub async fn get_company(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Company>> {
    Ok(Json(state.store.companies.require(&id)?))
}

pub async fn create_company(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CompanyRequest>,
) -> AppResult<(StatusCode, Json<Company>)> {
    current.require_admin()?;
    let company = Company {
        id: new_id(),
        name: validate::required("name", &req.name)?,
        address: validate::optional(req.address),
        vat_number: validate::optional(req.vat_number),
        contact_email: checked_email(req.contact_email)?,
        created_at: Utc::now(),
    };

    let name = company.name.clone();
    let created = state.store.companies.insert_checked(company, |companies| {
        if companies.values().any(|c| c.name.eq_ignore_ascii_case(&name)) {
            Err(AppError::Conflict(format!("company '{}' already exists", name)))
        } else {
            Ok(())
        }
    })?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_company(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<CompanyRequest>,
) -> AppResult<Json<Company>> {
    current.require_admin()?;
    let name = validate::required("name", &req.name)?;
    let contact_email = checked_email(req.contact_email)?;

    let updated = state.store.companies.update(&id, |company, companies| {
        if companies
            .values()
            .any(|c| c.id != company.id && c.name.eq_ignore_ascii_case(&name))
        {
            return Err(AppError::Conflict(format!("company '{}' already exists", name)));
        }
        company.name = name;
        company.address = validate::optional(req.address);
        company.vat_number = validate::optional(req.vat_number);
        company.contact_email = contact_email;
        Ok(())
    })?;
    Ok(Json(updated))
}

pub async fn delete_company(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    current.require_admin()?;
    if state.store.projects.any(|p| p.company_id == id) {
        return Err(AppError::Conflict(
            "company still has projects; delete them first".to_string(),
        ));
    }
    state.store.companies.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProjectQuery>,
) -> Json<Vec<Project>> {
    let mut projects = match query.company {
        Some(company) => state.store.projects.filter(|p| p.company_id == company),
        None => state.store.projects.list(),
    };
    projects.sort_by_key(|p| p.name.to_lowercase());
    Json(projects)
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.store.projects.require(&id)?))
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<ProjectRequest>,
) -> AppResult<(StatusCode, Json<Project>)> {
    current.require_admin()?;
    state.store.companies.require(&req.company_id)?;

    let project = Project {
        id: new_id(),
        company_id: req.company_id,
        name: validate::required("name", &req.name)?,
        description: validate::optional(req.description),
        active: req.active,
        created_at: Utc::now(),
    };
    Ok((StatusCode::CREATED, Json(state.store.projects.insert(project)?)))
}

pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<ProjectRequest>,
) -> AppResult<Json<Project>> {
    current.require_admin()?;
    state.store.companies.require(&req.company_id)?;
    let name = validate::required("name", &req.name)?;

    let updated = state.store.projects.update(&id, |project, _| {
        project.company_id = req.company_id;
        project.name = name;
        project.description = validate::optional(req.description);
        project.active = req.active;
        Ok(())
    })?;
    Ok(Json(updated))
}

pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    current.require_admin()?;
    state.store.projects.require(&id)?;
    // routes keep their history, just without the project link
    for route in state.store.routes.filter(|r| r.project_id.as_deref() == Some(id.as_str())) {
        state.store.routes.update(&route.id, |r, _| {
            r.project_id = None;
            Ok(())
        })?;
    }
    state.store.projects.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
