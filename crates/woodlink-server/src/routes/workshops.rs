use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use woodlink_core::entity::{require, validate_phone, Workshop};
use woodlink_core::store::Directory;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateWorkshopBody {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// GET /workshops
pub async fn list_workshops(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let list = tokio::task::spawn_blocking(move || db.list_workshops())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::to_value(list)?))
}

/// GET /workshops/:name: every workshop registered under `name`.
pub async fn find_workshops(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let list = tokio::task::spawn_blocking(move || db.find_workshops_by_name(&name))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::to_value(list)?))
}

/// POST /workshops: register a workshop.
pub async fn create_workshop(
    State(app): State<AppState>,
    Json(body): Json<CreateWorkshopBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let name = require("name", body.name.as_deref())?;
    let phone = validate_phone(&require("phone", body.phone.as_deref())?)?;
    let address = require("address", body.address.as_deref())?;
    let workshop = Workshop::new(name, phone, address, body.content);

    let db = app.db.clone();
    let stored = workshop.clone();
    tokio::task::spawn_blocking(move || db.insert_workshop(&stored))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    tracing::info!(workshop = %workshop.id, name = %workshop.name, "workshop registered");

    Ok((StatusCode::CREATED, Json(serde_json::to_value(workshop)?)))
}
