use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use woodlink_core::entity::{require, Item, ItemUpdate, NewItem};
use woodlink_core::store::{Directory, ItemStore};
use woodlink_core::WoodlinkError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemBody {
    #[serde(flatten)]
    pub fields: ItemUpdate,
    /// Accepted only to be refused: availability follows the claims.
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

/// GET /items?category=: items with the owning workshop's name.
pub async fn list_items(
    State(app): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let category = q.category.filter(|c| !c.is_empty());
    let result = tokio::task::spawn_blocking(move || {
        let mut list = Vec::new();
        for item in db.list_items()? {
            if category.as_deref().is_some_and(|c| c != item.category) {
                continue;
            }
            let workshop = db.get_workshop(item.workshop_id)?;
            let mut json = serde_json::to_value(&item)?;
            json["workshop_name"] = serde_json::json!(workshop.map(|w| w.name));
            list.push(json);
        }
        Ok::<_, WoodlinkError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /items: register an item; it always starts `available`.
pub async fn create_item(
    State(app): State<AppState>,
    Json(body): Json<NewItem>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    require("name", Some(body.name.as_str()))?;
    require("category", Some(body.category.as_str()))?;

    let db = app.db.clone();
    let item = tokio::task::spawn_blocking(move || {
        if db.get_workshop(body.workshop)?.is_none() {
            return Err(WoodlinkError::WorkshopNotFound(body.workshop));
        }
        let item = Item::from_new(body);
        db.insert_item(&item)?;
        Ok::<_, WoodlinkError>(item)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    tracing::info!(item = %item.id, name = %item.name, "item registered");

    Ok((StatusCode::CREATED, Json(serde_json::to_value(item)?)))
}

/// PUT /items/:id: partial update of everything but `status`.
pub async fn update_item(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateItemBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    if body.status.is_some() {
        return Err(AppError::bad_request(
            "status cannot be set directly; it follows the item's claims",
        ));
    }

    let db = app.db.clone();
    let item = tokio::task::spawn_blocking(move || {
        if let Some(workshop) = body.fields.workshop {
            if db.get_workshop(workshop)?.is_none() {
                return Err(WoodlinkError::WorkshopNotFound(workshop));
            }
        }
        db.update_item(id, body.fields)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    tracing::info!(item = %item.id, "item updated");

    Ok(Json(serde_json::to_value(item)?))
}
