//! Driven routes and the monthly kilometer map built from them.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::CurrentUser;
use crate::calendar::YearMonth;
use crate::error::{AppError, AppResult};
use crate::export;
use crate::models::{Project, Route, new_id};
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    /// Owner of the route; defaults to the caller, only admins may set another user
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub date: NaiveDate,
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub waypoints: Vec<String>,
    pub kilometers: f64,
    #[serde(default)]
    pub round_trip: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteQuery {
    pub user: Option<String>,
    pub month: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KilometerQuery {
    pub user: Option<String>,
}

/// One route as it appears on the kilometer map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLine {
    pub route_id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub origin: String,
    pub destination: String,
    pub waypoints: Vec<String>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    /// Driven distance, round trips counted twice
    pub kilometers: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub kilometers: f64,
    pub routes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectTotal {
    /// `None` collects the routes without a project
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub kilometers: f64,
}

/// Kilometers driven in one month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KilometerMap {
    pub year_month: YearMonth,
    pub user_id: Option<String>,
    /// Days with at least one route, ascending
    pub days: Vec<DayTotal>,
    pub projects: Vec<ProjectTotal>,
    pub routes: Vec<RouteLine>,
    pub total_kilometers: f64,
}

/// Builds the kilometer map of `year_month`
///
/// Routes outside the month, or of another user when `user_id` is given,
/// are ignored. Lines are ordered by date, then origin.
pub fn kilometer_map(
    year_month: YearMonth,
    user_id: Option<&str>,
    routes: &[Route],
    projects: &[Project],
) -> KilometerMap {
    let project_name = |id: &Option<String>| -> Option<String> {
        let id = id.as_deref()?;
        projects.iter().find(|p| p.id == id).map(|p| p.name.clone())
    };

    let mut lines: Vec<RouteLine> = routes
        .iter()
        .filter(|r| year_month.contains(r.date))
        .filter(|r| user_id.is_none_or(|u| r.user_id == u))
        .map(|r| RouteLine {
            route_id: r.id.clone(),
            user_id: r.user_id.clone(),
            date: r.date,
            origin: r.origin.clone(),
            destination: r.destination.clone(),
            waypoints: r.waypoints.clone(),
            project_id: r.project_id.clone(),
            project_name: project_name(&r.project_id),
            kilometers: r.driven_kilometers(),
        })
        .collect();
    lines.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.origin.cmp(&b.origin))
            .then_with(|| a.route_id.cmp(&b.route_id))
    });

    let mut per_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut per_project: BTreeMap<Option<String>, f64> = BTreeMap::new();
    for line in &lines {
        let day = per_day.entry(line.date).or_insert((0.0, 0));
        day.0 += line.kilometers;
        day.1 += 1;
        *per_project.entry(line.project_id.clone()).or_insert(0.0) += line.kilometers;
    }

    KilometerMap {
        year_month,
        user_id: user_id.map(str::to_string),
        days: per_day
            .into_iter()
            .map(|(date, (kilometers, routes))| DayTotal {
                date,
                kilometers,
                routes,
            })
            .collect(),
        projects: per_project
            .into_iter()
            .map(|(project_id, kilometers)| ProjectTotal {
                project_name: project_name(&project_id),
                project_id,
                kilometers,
            })
            .collect(),
        total_kilometers: lines.iter().map(|l| l.kilometers).sum(),
        routes: lines,
    }
}

fn checked_kilometers(value: f64) -> AppResult<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(AppError::bad_request("kilometers must be a number >= 0"))
    }
}

fn checked_project(state: &AppState, project_id: Option<String>) -> AppResult<Option<String>> {
    let project_id = validate::optional(project_id);
    if let Some(id) = &project_id {
        state.store.projects.require(id)?;
    }
    Ok(project_id)
}

/// The user whose data a request is about: the caller unless an admin asks for someone else
fn subject(current: &CurrentUser, requested: Option<String>) -> AppResult<Option<String>> {
    match validate::optional(requested) {
        Some(user) => {
            current.require_self_or_admin(&user)?;
            Ok(Some(user))
        }
        None if current.0.is_admin() => Ok(None),
        None => Ok(Some(current.0.id.clone())),
    }
}

pub async fn list_routes(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<RouteQuery>,
) -> AppResult<Json<Vec<Route>>> {
    let user = subject(&current, query.user)?;
    let month = match validate::optional(query.month) {
        Some(month) => Some(validate::year_month(&month)?),
        None => None,
    };

    let mut routes = state.store.routes.filter(|r| {
        user.as_deref().is_none_or(|u| r.user_id == u)
            && month.is_none_or(|m| m.contains(r.date))
    });
    routes.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.created_at.cmp(&b.created_at)));
    Ok(Json(routes))
}

pub async fn get_route(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Route>> {
    let route = state.store.routes.require(&id)?;
    current.require_self_or_admin(&route.user_id)?;
    Ok(Json(route))
}

pub async fn create_route(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<RouteRequest>,
) -> AppResult<(StatusCode, Json<Route>)> {
    let user_id = validate::optional(req.user_id).unwrap_or_else(|| current.0.id.clone());
    current.require_self_or_admin(&user_id)?;
    state.store.users.require(&user_id)?;

    let route = Route {
        id: new_id(),
        user_id,
        project_id: checked_project(&state, req.project_id)?,
        date: req.date,
        origin: validate::required("origin", &req.origin)?,
        destination: validate::required("destination", &req.destination)?,
        waypoints: req
            .waypoints
            .into_iter()
            .filter_map(|w| validate::optional(Some(w)))
            .collect(),
        kilometers: checked_kilometers(req.kilometers)?,
        round_trip: req.round_trip,
        notes: validate::optional(req.notes),
        created_at: Utc::now(),
    };
    Ok((StatusCode::CREATED, Json(state.store.routes.insert(route)?)))
}

pub async fn update_route(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<RouteRequest>,
) -> AppResult<Json<Route>> {
    let existing = state.store.routes.require(&id)?;
    current.require_self_or_admin(&existing.user_id)?;
    let user_id = validate::optional(req.user_id).unwrap_or(existing.user_id);
    current.require_self_or_admin(&user_id)?;
    state.store.users.require(&user_id)?;

    let project_id = checked_project(&state, req.project_id)?;
    let origin = validate::required("origin", &req.origin)?;
    let destination = validate::required("destination", &req.destination)?;
    let kilometers = checked_kilometers(req.kilometers)?;

    let updated = state.store.routes.update(&id, |route, _| {
        route.user_id = user_id;
        route.project_id = project_id;
        route.date = req.date;
        route.origin = origin;
        route.destination = destination;
        route.waypoints = req
            .waypoints
            .into_iter()
            .filter_map(|w| validate::optional(Some(w)))
            .collect();
        route.kilometers = kilometers;
        route.round_trip = req.round_trip;
        route.notes = validate::optional(req.notes);
        Ok(())
    })?;
    Ok(Json(updated))
}

pub async fn delete_route(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let route = state.store.routes.require(&id)?;
    current.require_self_or_admin(&route.user_id)?;
    state.store.routes.remove(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn month_map(
    state: &AppState,
    current: &CurrentUser,
    year: i32,
    month: u32,
    query: KilometerQuery,
) -> AppResult<KilometerMap> {
    let year_month = validate::path_month(year, month)?;
    let user = subject(current, query.user)?;
    Ok(kilometer_map(
        year_month,
        user.as_deref(),
        &state.store.routes.list(),
        &state.store.projects.list(),
    ))
}

pub async fn kilometers(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<KilometerQuery>,
) -> AppResult<Json<KilometerMap>> {
    Ok(Json(month_map(&state, &current, year, month, query)?))
}

pub async fn kilometers_xlsx(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<KilometerQuery>,
) -> AppResult<Response> {
    let map = month_map(&state, &current, year, month, query)?;
    let bytes = export::kilometer_xlsx(&map)?;
    let file_name = format!("kilometers-{}.xlsx", map.year_month);
    Ok(export::attachment(bytes, export::XLSX_CONTENT_TYPE, &file_name))
}

pub async fn kilometers_csv(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<KilometerQuery>,
) -> AppResult<Response> {
    let map = month_map(&state, &current, year, month, query)?;
    let file_name = format!("kilometers-{}.csv", map.year_month);
    Ok(export::attachment(
        export::kilometer_csv(&map).into_bytes(),
        "text/csv; charset=utf-8",
        &file_name,
    ))
}
