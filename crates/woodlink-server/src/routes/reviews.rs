use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use woodlink_core::entity::{require, Review, ReviewUpdate};
use woodlink_core::store::{ClaimStore, Directory, ItemStore, WoodlinkDb};
use woodlink_core::WoodlinkError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewBody {
    pub claim_id: Uuid,
    pub content: Option<String>,
    #[serde(default)]
    pub img: String,
}

/// Reviews joined with user, item and workshop names, optionally narrowed to
/// one reviewer's name.
fn review_views(
    db: &WoodlinkDb,
    user_name: Option<&str>,
) -> Result<Vec<serde_json::Value>, WoodlinkError> {
    let mut list = Vec::new();
    for review in db.list_reviews()? {
        let user = db.get_user(review.user_id)?;
        let written_by = user.as_ref().map(|u| u.name.as_str());
        if user_name.is_some_and(|name| written_by != Some(name)) {
            continue;
        }
        let item = db.get_item(review.item_id)?;
        let workshop = match &item {
            Some(i) => db.get_workshop(i.workshop_id)?,
            None => None,
        };
        list.push(serde_json::json!({
            "id": review.id,
            "content": review.content,
            "img": review.img,
            "created_at": review.created_at,
            "user_name": user.map(|u| u.name),
            "item_name": item.map(|i| i.name),
            "workshop_name": workshop.map(|w| w.name),
        }));
    }
    Ok(list)
}

/// GET /reviews: reviews with user, item and workshop names.
pub async fn list_reviews(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let list = tokio::task::spawn_blocking(move || review_views(&db, None))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!(list)))
}

/// GET /reviews/:name: reviews written by customers named `name`.
pub async fn reviews_by_user(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let list = tokio::task::spawn_blocking(move || review_views(&db, Some(name.as_str())))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::json!(list)))
}

/// PUT /reviews/:id: edit content or image.
pub async fn update_review(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ReviewUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let review = tokio::task::spawn_blocking(move || db.update_review(id, update))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(serde_json::to_value(review)?))
}

/// POST /reviews: the reviewer and item are taken from the claim.
pub async fn create_review(
    State(app): State<AppState>,
    Json(body): Json<CreateReviewBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let content = require("content", body.content.as_deref())?;
    let db = app.db.clone();
    let review = tokio::task::spawn_blocking(move || {
        let claim = db
            .get_claim(body.claim_id)?
            .ok_or(WoodlinkError::ClaimNotFound(body.claim_id))?;
        let review = Review::new(claim.user_id, claim.item_id, content, body.img);
        db.insert_review(&review)?;
        Ok::<_, WoodlinkError>(review)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((StatusCode::CREATED, Json(serde_json::to_value(review)?)))
}
