//! Calculator API Routes
//!
//! Session creation, input entry, calculation and spreadsheet export.

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use formula_engine::CalculationReport;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use valuation_admin::CalculatorSession;
use valuation_core::ValuationError;

use crate::export::{attachment, build_workbook, format_indicator, workbook_file_name};
use crate::sessions::SessionId;
use crate::{ApiResponse, AppError, AppState};

#[derive(Serialize)]
pub struct SessionCreated {
    pub session_id: String,
}

/// A field with the raw text currently entered for it.
#[derive(Serialize)]
pub struct FieldView {
    pub name: String,
    pub key: String,
    pub required: bool,
    pub value: String,
}

#[derive(Deserialize)]
pub struct UpdateInputsRequest {
    pub values: HashMap<String, String>,
}

#[derive(Serialize)]
pub struct UpdateInputsResponse {
    pub updated: Vec<String>,
    pub ignored: Vec<String>,
}

#[derive(Serialize)]
pub struct IndicatorView {
    pub name: String,
    pub value: Option<f64>,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct CalculateResponse {
    /// False when required inputs are missing; nothing is computed then.
    pub complete: bool,
    pub missing_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub indicators: Vec<IndicatorView>,
}

pub fn calculator_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions", post(create_session))
        .route("/api/fields", get(list_fields))
        .route("/api/inputs", put(update_inputs).delete(clear_inputs))
        .route("/api/calculate", post(calculate))
        .route("/api/export", get(export_workbook))
}

fn field_views(session: &CalculatorSession) -> Vec<FieldView> {
    session
        .fields()
        .iter()
        .map(|f| FieldView {
            name: f.name.clone(),
            key: f.key.clone(),
            required: f.required,
            value: session.inputs().get(&f.key).to_string(),
        })
        .collect()
}

fn indicator_views(report: &CalculationReport) -> Vec<IndicatorView> {
    report
        .indicators
        .iter()
        .map(|r| IndicatorView {
            name: r.name.clone(),
            value: r.value,
            display: format_indicator(r.value),
            error: r.error.clone(),
        })
        .collect()
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<SessionCreated>>), AppError> {
    let session_id = state.sessions.create().ok_or_else(|| {
        AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            anyhow::anyhow!("Too many active sessions, try again later"),
        )
    })?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SessionCreated { session_id })),
    ))
}

async fn list_fields(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Json<ApiResponse<Vec<FieldView>>>, AppError> {
    let fields = state.session(&id, |s| field_views(s))?;
    Ok(Json(ApiResponse::success(fields)))
}

/// Store raw text for each known key. Unknown keys are reported, not stored.
async fn update_inputs(
    State(state): State<AppState>,
    id: SessionId,
    Json(req): Json<UpdateInputsRequest>,
) -> Result<Json<ApiResponse<UpdateInputsResponse>>, AppError> {
    let (mut updated, mut ignored) = state.session(&id, |s| {
        let mut updated = Vec::new();
        let mut ignored = Vec::new();
        for (key, raw) in req.values {
            if s.set_input(&key, raw) {
                updated.push(key);
            } else {
                ignored.push(key);
            }
        }
        (updated, ignored)
    })?;
    updated.sort();
    ignored.sort();

    if !ignored.is_empty() {
        tracing::debug!("Ignored unknown input keys: {}", ignored.join(", "));
    }

    Ok(Json(ApiResponse::success(UpdateInputsResponse {
        updated,
        ignored,
    })))
}

async fn clear_inputs(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Json<ApiResponse<Vec<FieldView>>>, AppError> {
    let fields = state.session(&id, |s| {
        s.clear_inputs();
        field_views(s)
    })?;
    Ok(Json(ApiResponse::success(fields)))
}

async fn calculate(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Json<ApiResponse<CalculateResponse>>, AppError> {
    let outcome = state.session(&id, |s| s.calculate())?;

    let response = match outcome {
        Ok(report) => CalculateResponse {
            complete: true,
            missing_fields: Vec::new(),
            message: None,
            indicators: indicator_views(&report),
        },
        Err(err) => {
            let missing_fields = match &err {
                ValuationError::MissingInputs(names) => names.clone(),
                _ => Vec::new(),
            };
            CalculateResponse {
                complete: false,
                missing_fields,
                message: Some(err.to_string()),
                indicators: Vec::new(),
            }
        }
    };

    Ok(Json(ApiResponse::success(response)))
}

/// Download the inputs and results as a two-sheet zip.
async fn export_workbook(
    State(state): State<AppState>,
    id: SessionId,
) -> Result<Response, AppError> {
    let workbook = state.session(&id, |s| {
        let report = s.calculate()?;
        Ok::<_, ValuationError>((s.fields().clone(), s.parsed_inputs(), report))
    })?;
    let (fields, inputs, report) =
        workbook.map_err(|e| AppError::new(StatusCode::UNPROCESSABLE_ENTITY, e))?;

    let bytes = build_workbook(&fields, &inputs, &report)?;
    tracing::info!("Exported workbook ({} bytes)", bytes.len());

    Ok(attachment(
        "application/zip",
        &workbook_file_name(Utc::now()),
        bytes,
    ))
}
