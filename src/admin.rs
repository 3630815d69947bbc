use axum::{
    Extension, Json,
    extract::{Multipart, State},
    response::Response,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::export;
use crate::snapshot::Snapshot;

#[derive(Debug, Serialize)]
pub struct RestoreSummary {
    pub status: String,
    pub users: usize,
    pub companies: usize,
    pub projects: usize,
    pub routes: usize,
    pub holidays: usize,
    pub templates: usize,
    /// Where the replaced state was saved
    pub backup: String,
}

/// Download a snapshot of the whole database
pub async fn backup(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Response> {
    current.require_admin()?;
    let bytes = Snapshot::capture(&state.store)?.encode()?;
    log::info!("{} downloaded a backup ({} bytes)", current.0.username, bytes.len());

    let file_name = format!("gleemanager-{}.bin.gz", Utc::now().format("%Y%m%d-%H%M%S"));
    Ok(export::attachment(bytes, "application/gzip", &file_name))
}

/// Replace the database with an uploaded snapshot
pub async fn restore(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> AppResult<Json<RestoreSummary>> {
    current.require_admin()?;

    let mut bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("snapshot") {
            bytes = Some(field.bytes().await?);
        }
    }
    let bytes = bytes.ok_or_else(|| AppError::bad_request("a snapshot file is required"))?;

    let snapshot = Snapshot::decode(&bytes)?;
    let summary = RestoreSummary {
        status: "ok".to_string(),
        users: snapshot.users.len(),
        companies: snapshot.companies.len(),
        projects: snapshot.projects.len(),
        routes: snapshot.routes.len(),
        holidays: snapshot.holidays.len(),
        templates: snapshot.templates.len(),
        backup: String::new(),
    };
    let backup = snapshot.restore(&state.store)?;
    // restored users may differ from the ones sessions were issued for
    state.sessions.clear();
    log::info!("{} restored a snapshot", current.0.username);

    Ok(Json(RestoreSummary {
        backup: backup.display().to_string(),
        ..summary
    }))
}
