//! Admin API Routes
//!
//! Password login, backup download and restore, field editing and formula
//! editing. Edits are refused until a backup of the current fields or
//! formulas has been downloaded in the same login; saving formulas logs the
//! admin out.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use formula_engine::FormulaSet;
use serde::{Deserialize, Serialize};
use valuation_admin::{AdminError, AdminStatus};
use valuation_core::{FieldDefinition, FieldRegistry, ValuationError};

use crate::export::{attachment, backup_file_name};
use crate::sessions::SessionId;
use crate::{ApiResponse, AppError, AppState};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct AdminStatusResponse {
    /// False when the server has no admin password configured.
    pub enabled: bool,
    #[serde(flatten)]
    pub status: AdminStatus,
}

#[derive(Deserialize)]
pub struct SaveFormulasRequest {
    pub formulas: FormulaSet,
}

#[derive(Serialize)]
pub struct DeleteFieldResponse {
    pub removed: bool,
    pub fields: FieldRegistry,
}

#[derive(Serialize)]
pub struct RestoreResponse {
    pub restored: usize,
    pub status: AdminStatus,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/admin/logout", post(logout))
        .route("/api/admin/status", get(status))
        .route("/api/admin/fields", get(list_fields).post(add_field))
        .route("/api/admin/fields/backup", get(backup_fields))
        .route("/api/admin/fields/restore", post(restore_fields))
        .route("/api/admin/fields/:key", delete(delete_field))
        .route("/api/admin/formulas", get(list_formulas).put(save_formulas))
        .route("/api/admin/formulas/backup", get(backup_formulas))
        .route("/api/admin/formulas/restore", post(restore_formulas))
}

/// HTTP status for each admin failure.
fn admin_error(err: AdminError) -> AppError {
    let status = match &err {
        AdminError::InvalidPassword | AdminError::NotAuthenticated => StatusCode::UNAUTHORIZED,
        AdminError::Disabled => StatusCode::FORBIDDEN,
        AdminError::BackupRequired => StatusCode::PRECONDITION_REQUIRED,
        AdminError::InvalidFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdminError::InvalidIndicator(_) => StatusCode::BAD_REQUEST,
        AdminError::Field(ValuationError::DuplicateField(_)) => StatusCode::CONFLICT,
        AdminError::Field(_) => StatusCode::BAD_REQUEST,
        AdminError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    AppError::new(status, err)
}

fn status_response(state: &AppState, status: AdminStatus) -> AdminStatusResponse {
    AdminStatusResponse {
        enabled: state.admin_secret.is_some(),
        status,
    }
}

async fn login(
    State(state): State<AppState>,
    id: SessionId,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<AdminStatusResponse>>, AppError> {
    let secret = state.admin_secret.as_deref();
    let status = state
        .session(&id, |s| s.login(&req.password, secret).map(|_| s.admin().status()))?
        .map_err(admin_error)?;
    Ok(Json(ApiResponse::success(status_response(&state, status))))
}

async fn logout(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Json<ApiResponse<AdminStatusResponse>>, AppError> {
    let status = state.session(&id, |s| {
        s.logout();
        s.admin().status()
    })?;
    Ok(Json(ApiResponse::success(status_response(&state, status))))
}

async fn status(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Json<ApiResponse<AdminStatusResponse>>, AppError> {
    let status = state.session(&id, |s| s.admin().status())?;
    Ok(Json(ApiResponse::success(status_response(&state, status))))
}

async fn list_fields(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Json<ApiResponse<FieldRegistry>>, AppError> {
    let fields = state
        .session(&id, |s| s.view_fields().cloned())?
        .map_err(admin_error)?;
    Ok(Json(ApiResponse::success(fields)))
}

async fn add_field(
    State(state): State<AppState>,
    id: SessionId,
    Json(field): Json<FieldDefinition>,
) -> Result<(StatusCode, Json<ApiResponse<FieldRegistry>>), AppError> {
    let fields = state
        .session(&id, |s| s.add_field(field).map(|_| s.fields().clone()))?
        .map_err(admin_error)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(fields))))
}

/// Deleting an absent key succeeds with `removed: false`.
async fn delete_field(
    State(state): State<AppState>,
    id: SessionId,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<DeleteFieldResponse>>, AppError> {
    let response = state
        .session(&id, |s| {
            s.delete_field(&key).map(|removed| DeleteFieldResponse {
                removed,
                fields: s.fields().clone(),
            })
        })?
        .map_err(admin_error)?;
    Ok(Json(ApiResponse::success(response)))
}

async fn backup_fields(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Response, AppError> {
    let bytes = state
        .session(&id, |s| s.export_fields())?
        .map_err(admin_error)?;
    Ok(attachment(
        "application/json",
        &backup_file_name("fields", Utc::now()),
        bytes,
    ))
}

async fn restore_fields(
    State(state): State<AppState>,
    id: SessionId,
    body: Bytes,
) -> Result<Json<ApiResponse<RestoreResponse>>, AppError> {
    let response = state
        .session(&id, |s| {
            s.restore_fields(&body).map(|_| RestoreResponse {
                restored: s.fields().len(),
                status: s.admin().status(),
            })
        })?
        .map_err(admin_error)?;
    Ok(Json(ApiResponse::success(response)))
}

async fn list_formulas(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Json<ApiResponse<FormulaSet>>, AppError> {
    let formulas = state
        .session(&id, |s| s.view_formulas().cloned())?
        .map_err(admin_error)?;
    Ok(Json(ApiResponse::success(formulas)))
}

/// Apply all submitted expressions at once. The admin is logged out
/// afterwards and must log in and back up again before the next edit.
async fn save_formulas(
    State(state): State<AppState>,
    id: SessionId,
    Json(req): Json<SaveFormulasRequest>,
) -> Result<Json<ApiResponse<AdminStatusResponse>>, AppError> {
    let edits: Vec<(String, String)> = req
        .formulas
        .iter()
        .map(|f| (f.name.clone(), f.expression.clone()))
        .collect();
    let status = state
        .session(&id, |s| s.save_formulas(edits).map(|_| s.admin().status()))?
        .map_err(admin_error)?;
    Ok(Json(ApiResponse::success(status_response(&state, status))))
}

async fn backup_formulas(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Response, AppError> {
    let bytes = state
        .session(&id, |s| s.export_formulas())?
        .map_err(admin_error)?;
    Ok(attachment(
        "application/json",
        &backup_file_name("formulas", Utc::now()),
        bytes,
    ))
}

async fn restore_formulas(
    State(state): State<AppState>,
    id: SessionId,
    body: Bytes,
) -> Result<Json<ApiResponse<RestoreResponse>>, AppError> {
    let response = state
        .session(&id, |s| {
            s.restore_formulas(&body).map(|_| RestoreResponse {
                restored: s.formulas().len(),
                status: s.admin().status(),
            })
        })?
        .map_err(admin_error)?;
    Ok(Json(ApiResponse::success(response)))
}
