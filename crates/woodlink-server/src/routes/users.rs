use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use woodlink_core::entity::{normalize_phone, require, validate_phone, User, UserUpdate};
use woodlink_core::store::Directory;
use woodlink_core::WoodlinkError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// GET /users: all users.
pub async fn list_users(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let users = tokio::task::spawn_blocking(move || db.list_users())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::to_value(users)?))
}

/// POST /users: register a customer outside the claim flow.
pub async fn create_user(
    State(app): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let name = require("name", body.name.as_deref())?;
    let phone = validate_phone(&require("phone", body.phone.as_deref())?)?;
    let address = require("address", body.address.as_deref())?;
    let user = User::new(name, phone, address);

    let db = app.db.clone();
    let stored = user.clone();
    tokio::task::spawn_blocking(move || db.insert_user(&stored))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    tracing::info!(user = %user.id, "registered new customer");

    Ok((StatusCode::CREATED, Json(serde_json::to_value(user)?)))
}

/// GET /users/:phone: lookup by phone, dashes allowed.
pub async fn get_user(
    State(app): State<AppState>,
    Path(phone): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let phone = normalize_phone(&phone);
    let user = tokio::task::spawn_blocking(move || {
        db.find_user_by_phone(&phone)?
            .ok_or(WoodlinkError::UserNotFound(phone))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::to_value(user)?))
}

/// PUT /users/:phone: partial update. `"deleted": true` soft-deletes.
pub async fn update_user(
    State(app): State<AppState>,
    Path(phone): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let user = tokio::task::spawn_blocking(move || db.update_user(&phone, update))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    if user.deleted_at.is_some() {
        tracing::info!(user = %user.id, "customer marked deleted");
    }
    Ok(Json(serde_json::to_value(user)?))
}
