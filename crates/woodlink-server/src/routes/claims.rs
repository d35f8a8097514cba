use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use woodlink_core::coordinator::{Processed, SubmitRequest};
use woodlink_core::store::{ClaimStore, Directory, ItemStore};
use woodlink_core::types::Initiator;
use woodlink_core::WoodlinkError;

use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Close-window page
// ---------------------------------------------------------------------------

/// Accept and cancel are reached from links inside KakaoTalk messages; the
/// response alerts and then closes the in-app browser.
fn close_window(message: &str) -> Html<String> {
    Html(format!(
        r#"<script>
  alert('{message}');
  let os = (window.navigator.userAgent || window.navigator.vendor || window.opera).toLowerCase();
  if (os.indexOf("android") > -1) {{
    location.href = "kakaotalk://inappbrowser/close";
  }} else if (os.indexOf("iphone") > -1 || os.indexOf("ipad") > -1) {{
    location.href = "kakaoweb://closeBrowser";
  }} else {{
    self.close();
  }}
</script>
"#
    ))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub detailed_address: Option<String>,
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub disable_sms: bool,
}

/// POST /claims: submit a claim for an available item.
pub async fn submit_claim(
    State(app): State<AppState>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = app
        .coordinator
        .submit_claim(SubmitRequest {
            name: body.name,
            phone: body.phone,
            address: body.address,
            detailed_address: body.detailed_address,
            item_id: body.item_id,
            disable_sms: body.disable_sms,
        })
        .await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

// ---------------------------------------------------------------------------
// Accept / cancel
// ---------------------------------------------------------------------------

/// GET /claims/accept/:id: workshop accepts the claim.
pub async fn accept_claim(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, AppError> {
    let outcome = app.coordinator.accept_claim(id).await?;
    Ok(close_window(match outcome.processed {
        Processed::Applied => "접수가 완료되었습니다.",
        Processed::AlreadyProcessed => "이미 접수된 신청입니다.",
    }))
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    #[serde(default)]
    pub by: Initiator,
}

/// GET /claims/cancel/:id?by=customer|workshop
pub async fn cancel_claim(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<CancelQuery>,
) -> Result<Html<String>, AppError> {
    let outcome = app.coordinator.cancel_claim(id, q.by).await?;
    Ok(close_window(match outcome.processed {
        Processed::Applied => "취소가 완료되었습니다.",
        Processed::AlreadyProcessed => "이미 취소된 신청입니다.",
    }))
}

// ---------------------------------------------------------------------------
// Change delivery
// ---------------------------------------------------------------------------

/// `name` and `phone` are sent by the web form but only the address changes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeBody {
    pub id: Uuid,
    pub address: Option<String>,
    pub detailed_address: Option<String>,
}

/// POST /claims/change: replace the delivery address.
pub async fn change_delivery(
    State(app): State<AppState>,
    Json(body): Json<ChangeBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let address = woodlink_core::entity::require("address", body.address.as_deref())?;
    let new_address = match body.detailed_address.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => format!("{address}, {d}"),
        _ => address,
    };
    let outcome = app.coordinator.change_delivery(body.id, &new_address).await?;
    Ok(Json(serde_json::json!({
        "message": "변경 완료",
        "claim": outcome.claim,
        "dispatches": outcome.dispatches,
    })))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /claims: every claim with user, item and workshop names resolved.
pub async fn list_claims(
    State(app): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut list = Vec::new();
        for claim in db.list_claims()? {
            let user = db.get_user(claim.user_id)?;
            let item = db.get_item(claim.item_id)?;
            let workshop = db.get_workshop(claim.workshop_id)?;
            list.push(serde_json::json!({
                "id": claim.id,
                "status": claim.status,
                "delivery_address": claim.delivery_address,
                "requested_at": claim.requested_at,
                "updated_at": claim.updated_at,
                "user_id": claim.user_id,
                "user_name": user.as_ref().map(|u| u.name.as_str()),
                "user_phone": user.as_ref().map(|u| u.phone.as_str()),
                "item_id": claim.item_id,
                "item_name": item.as_ref().map(|i| i.name.as_str()),
                "workshop_id": claim.workshop_id,
                "workshop_name": workshop.as_ref().map(|w| w.name.as_str()),
            }));
        }
        Ok::<_, WoodlinkError>(serde_json::json!(list))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /claims/:id
pub async fn get_claim(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = app.db.clone();
    let claim = tokio::task::spawn_blocking(move || {
        db.get_claim(id)?.ok_or(WoodlinkError::ClaimNotFound(id))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::to_value(claim)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_window_embeds_message_and_fallback_close() {
        let Html(page) = close_window("접수가 완료되었습니다.");
        assert!(page.contains("alert('접수가 완료되었습니다.')"));
        assert!(page.contains("kakaotalk://inappbrowser/close"));
        assert!(page.contains("self.close()"));
    }

    #[test]
    fn cancel_query_defaults_to_customer() {
        let q: CancelQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.by, Initiator::Customer);
        let q: CancelQuery = serde_json::from_str(r#"{"by":"workshop"}"#).unwrap();
        assert_eq!(q.by, Initiator::Workshop);
    }
}
