//! Holiday requests: submission, approval and the month calendar fed by them.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::CurrentUser;
use crate::calendar::{
    CalendarLayout, Day, OwnerHolidays, PreviewRequest, YearMonth, build_layout,
};
use crate::error::{AppError, AppResult};
use crate::export;
use crate::models::{HolidayRequest, HolidayStatus, User, new_id};
use crate::store::Store;
use crate::users::roster;
use crate::validate;

#[derive(Debug, Deserialize)]
pub struct HolidaySubmission {
    /// ISO dates, `YYYY-MM-DD`
    pub dates: Vec<String>,
    pub notes: Option<String>,
    /// Admins may file a request on behalf of another user
    pub user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HolidayQuery {
    pub user: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    /// Id of a holiday request to lay over the month
    pub preview: Option<String>,
}

/// Approved holiday days of one user in one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserHolidaySet {
    pub user_id: String,
    pub year_month: YearMonth,
    pub days: Vec<Day>,
    pub comments: BTreeMap<Day, String>,
    /// Approved requests that contributed days
    pub request_ids: Vec<String>,
}

/// Collects the approved days of `user_id` in `year_month`
///
/// A day covered by several requests keeps the notes of the first one.
pub fn holiday_set(
    requests: &[HolidayRequest],
    user_id: &str,
    year_month: YearMonth,
) -> UserHolidaySet {
    let mut approved: Vec<&HolidayRequest> = requests
        .iter()
        .filter(|r| r.user_id == user_id && r.status == HolidayStatus::Approved)
        .collect();
    approved.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut days: Vec<Day> = Vec::new();
    let mut comments = BTreeMap::new();
    let mut request_ids = Vec::new();
    for request in approved {
        let mut contributed = false;
        for day in request.dates.iter().filter_map(|d| year_month.day_of(*d)) {
            contributed = true;
            days.push(day);
            if let Some(notes) = &request.notes {
                comments.entry(day).or_insert_with(|| notes.clone());
            }
        }
        if contributed {
            request_ids.push(request.id.clone());
        }
    }
    days.sort_unstable();
    days.dedup();

    UserHolidaySet {
        user_id: user_id.to_string(),
        year_month,
        days,
        comments,
        request_ids,
    }
}

fn preview_of(request: &HolidayRequest, owner: Option<&User>) -> PreviewRequest {
    PreviewRequest {
        request_id: request.id.clone(),
        dates: request.dates.iter().map(|d| d.to_string()).collect(),
        owner_display_name: owner
            .map(|u| u.display_name.clone())
            .unwrap_or_else(|| request.user_id.clone()),
        notes: request.notes.clone(),
    }
}

/// Lays out the approved holidays of every user for one month
///
/// Users take lanes in roster order. `preview_id` names a request of any
/// status that is shown on top without moving anyone.
pub fn month_calendar(
    store: &Store,
    year_month: YearMonth,
    preview_id: Option<&str>,
) -> AppResult<CalendarLayout> {
    let requests = store.holidays.list();
    let users = roster(store.users.list());

    let owners: Vec<OwnerHolidays> = users
        .iter()
        .map(|user| {
            let set = holiday_set(&requests, &user.id, year_month);
            OwnerHolidays {
                owner_id: user.id.clone(),
                display_name: user.display_name.clone(),
                color: user.color.clone(),
                days: set.days,
                comments: set.comments,
            }
        })
        .collect();

    let preview = match preview_id {
        Some(id) => {
            let request = store.holidays.require(id)?;
            let owner = users.iter().find(|u| u.id == request.user_id);
            Some(preview_of(&request, owner))
        }
        None => None,
    };

    Ok(build_layout(year_month, &owners, preview.as_ref()))
}

pub async fn submit_holiday(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<HolidaySubmission>,
) -> AppResult<(StatusCode, Json<HolidayRequest>)> {
    let user_id = validate::optional(req.user_id).unwrap_or_else(|| current.0.id.clone());
    current.require_self_or_admin(&user_id)?;
    state.store.users.require(&user_id)?;

    if req.dates.is_empty() {
        return Err(AppError::bad_request("at least one date is required"));
    }
    let mut dates = Vec::with_capacity(req.dates.len());
    for raw in &req.dates {
        let date = crate::calendar::parse_iso_date(raw)
            .ok_or_else(|| AppError::bad_request(format!("invalid date '{}'", raw)))?;
        dates.push(date);
    }
    dates.sort_unstable();
    dates.dedup();

    let request = HolidayRequest {
        id: new_id(),
        user_id,
        dates,
        notes: validate::optional(req.notes),
        status: HolidayStatus::Pending,
        created_at: Utc::now(),
        decided_by: None,
        decided_at: None,
    };
    Ok((StatusCode::CREATED, Json(state.store.holidays.insert(request)?)))
}

pub async fn list_holidays(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<HolidayQuery>,
) -> AppResult<Json<Vec<HolidayRequest>>> {
    let user = if current.0.is_admin() {
        validate::optional(query.user)
    } else {
        Some(current.0.id.clone())
    };
    let status = match validate::optional(query.status) {
        Some(status) => Some(status.parse::<HolidayStatus>().map_err(AppError::BadRequest)?),
        None => None,
    };

    let mut requests = state.store.holidays.filter(|r| {
        user.as_deref().is_none_or(|u| r.user_id == u) && status.is_none_or(|s| r.status == s)
    });
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(requests))
}

pub async fn get_holiday(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<HolidayRequest>> {
    let request = state.store.holidays.require(&id)?;
    current.require_self_or_admin(&request.user_id)?;
    Ok(Json(request))
}

fn decide(
    state: &AppState,
    current: &CurrentUser,
    id: &str,
    status: HolidayStatus,
) -> AppResult<HolidayRequest> {
    current.require_admin()?;
    let decided = state.store.holidays.update(id, |request, _| {
        if request.status != HolidayStatus::Pending {
            return Err(AppError::Conflict(format!(
                "holiday request {} was already decided",
                request.id
            )));
        }
        request.status = status;
        request.decided_by = Some(current.0.id.clone());
        request.decided_at = Some(Utc::now());
        Ok(())
    })?;
    log::info!(
        "holiday request {} of {} {:?} by {}",
        decided.id,
        decided.user_id,
        status,
        current.0.username
    );
    Ok(decided)
}

pub async fn approve_holiday(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<HolidayRequest>> {
    Ok(Json(decide(&state, &current, &id, HolidayStatus::Approved)?))
}

pub async fn reject_holiday(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<HolidayRequest>> {
    Ok(Json(decide(&state, &current, &id, HolidayStatus::Rejected)?))
}

pub async fn delete_holiday(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.store.holidays.remove_checked(&id, |request| {
        if current.0.is_admin() {
            return Ok(());
        }
        current.require_self_or_admin(&request.user_id)?;
        if request.status != HolidayStatus::Pending {
            return Err(AppError::Conflict(
                "decided requests can only be removed by an administrator".to_string(),
            ));
        }
        Ok(())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_holiday_set(
    State(state): State<Arc<AppState>>,
    Path((user_id, year, month)): Path<(String, i32, u32)>,
) -> AppResult<Json<UserHolidaySet>> {
    let year_month = validate::path_month(year, month)?;
    state.store.users.require(&user_id)?;
    Ok(Json(holiday_set(&state.store.holidays.list(), &user_id, year_month)))
}

fn preview_param(current: &CurrentUser, query: CalendarQuery) -> AppResult<Option<String>> {
    let preview = validate::optional(query.preview);
    if preview.is_some() {
        current.require_admin()?;
    }
    Ok(preview)
}

pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<CalendarQuery>,
) -> AppResult<Json<CalendarLayout>> {
    let year_month = validate::path_month(year, month)?;
    let preview = preview_param(&current, query)?;
    Ok(Json(month_calendar(&state.store, year_month, preview.as_deref())?))
}

pub async fn calendar_xlsx(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path((year, month)): Path<(i32, u32)>,
    Query(query): Query<CalendarQuery>,
) -> AppResult<Response> {
    let year_month = validate::path_month(year, month)?;
    let preview = preview_param(&current, query)?;
    let layout = month_calendar(&state.store, year_month, preview.as_deref())?;
    let bytes = export::holiday_xlsx(&layout)?;
    let file_name = format!("holidays-{}.xlsx", year_month);
    Ok(export::attachment(bytes, export::XLSX_CONTENT_TYPE, &file_name))
}
