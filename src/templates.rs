use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Response,
};
use chrono::Utc;
use std::fs;
use std::sync::Arc;

use crate::app::AppState;
use crate::auth::CurrentUser;
use crate::error::{AppError, AppResult};
use crate::export::{self, XLSX_CONTENT_TYPE};
use crate::models::{ExcelTemplate, TemplateKind, new_id};
use crate::validate;

/// Every .xlsx file is a zip archive
const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

#[derive(Debug, Default)]
struct Upload {
    name: Option<String>,
    kind: Option<String>,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> AppResult<Upload> {
    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => upload.name = Some(field.text().await?),
            "kind" => upload.kind = Some(field.text().await?),
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.bytes = field.bytes().await?.to_vec();
            }
            other => log::debug!("ignoring upload field '{}'", other),
        }
    }
    Ok(upload)
}

/// Checks an uploaded workbook and returns its file name
fn check_workbook(file_name: Option<&str>, bytes: &[u8]) -> AppResult<String> {
    let file_name = file_name
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| AppError::bad_request("a file is required"))?;
    validate::xlsx_file_name(file_name)?;
    if !bytes.starts_with(ZIP_SIGNATURE) {
        return Err(AppError::bad_request(format!(
            "'{}' is not a valid Excel workbook",
            file_name
        )));
    }
    Ok(file_name.to_string())
}

pub async fn list_templates(State(state): State<Arc<AppState>>) -> Json<Vec<ExcelTemplate>> {
    let mut templates = state.store.templates.list();
    templates.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    Json(templates)
}

pub async fn get_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ExcelTemplate>> {
    Ok(Json(state.store.templates.require(&id)?))
}

pub async fn upload_template(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ExcelTemplate>)> {
    current.require_admin()?;
    let upload = read_upload(multipart).await?;

    let file_name = check_workbook(upload.file_name.as_deref(), &upload.bytes)?;
    let kind: TemplateKind = upload
        .kind
        .as_deref()
        .unwrap_or_default()
        .parse()
        .map_err(AppError::BadRequest)?;
    let name = match validate::optional(upload.name) {
        Some(name) => name,
        None => file_name.trim_end_matches(".xlsx").to_string(),
    };

    let template = ExcelTemplate {
        id: new_id(),
        name,
        kind,
        file_name,
        size: upload.bytes.len() as u64,
        uploaded_by: current.0.id.clone(),
        uploaded_at: Utc::now(),
    };

    let path = state.store.template_path(&template.id);
    fs::write(&path, &upload.bytes)?;
    match state.store.templates.insert(template) {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(e) => {
            let _ = fs::remove_file(&path);
            Err(e)
        }
    }
}

pub async fn download_template(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let template = state.store.templates.require(&id)?;
    let bytes = fs::read(state.store.template_path(&template.id))?;
    Ok(export::attachment(bytes, XLSX_CONTENT_TYPE, &template.file_name))
}

pub async fn delete_template(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    current.require_admin()?;
    let removed = state.store.templates.remove(&id)?;
    let path = state.store.template_path(&removed.id);
    if let Err(e) = fs::remove_file(&path) {
        log::warn!("could not remove {}: {}", path.display(), e);
    }
    Ok(StatusCode::NO_CONTENT)
}
