//! End-to-end claim transitions.
//!
//! Every operation runs the same four steps:
//!
//! ```text
//! load claim + user/item/workshop   (no writes; any failure aborts here)
//!     │
//!     ▼
//! state machine decides             (pure; illegal transitions abort here)
//!     │
//!     ▼
//! swap claim on expected status     (commit point)
//!     │
//!     ▼
//! write item status                 (guarded by the claim's status; failure
//!                                    logged, left to reconciliation)
//!     │
//!     ▼
//! dispatch notices concurrently     (failures logged, never surfaced)
//! ```
//!
//! A lost compare-and-swap means another request moved the claim first. If
//! it landed where this request was heading, the call is reported as
//! `AlreadyProcessed` and sends nothing.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::claim::{Applied, Audience, Claim, ItemEffect, Notice, Transition};
use crate::config::Links;
use crate::entity::{require, validate_phone, Item, User, Workshop};
use crate::error::{Result, WoodlinkError};
use crate::notify::{format_kst, DispatchResult, NotificationChannel, Variables};
use crate::store::{ClaimStore, Directory, ItemStore, Reserve, Swap};
use crate::types::{ClaimStatus, Initiator, ItemStatus, TemplateKind};

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Raw submission as received from the customer form.
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub detailed_address: Option<String>,
    pub item_id: Option<Uuid>,
    pub disable_sms: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Processed {
    Applied,
    AlreadyProcessed,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub template: TemplateKind,
    pub audience: Audience,
    pub result: DispatchResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub claim: Claim,
    pub processed: Processed,
    /// False when the claim committed but the item write did not; the
    /// reconciliation pass repairs the item.
    pub item_synced: bool,
    pub dispatches: Vec<DispatchReport>,
}

impl Outcome {
    fn already_processed(claim: Claim) -> Self {
        Self {
            claim,
            processed: Processed::AlreadyProcessed,
            item_synced: true,
            dispatches: Vec::new(),
        }
    }
}

const MAX_CANCEL_ATTEMPTS: u32 = 3;

/// A claim with the entities its messages are assembled from.
struct Loaded {
    claim: Claim,
    user: User,
    item: Item,
    workshop: Workshop,
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    claims: Arc<dyn ClaimStore>,
    items: Arc<dyn ItemStore>,
    directory: Arc<dyn Directory>,
    channel: Arc<dyn NotificationChannel>,
    links: Links,
    dispatch_timeout: Duration,
}

/// Run a blocking store call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WoodlinkError::StoreUnavailable(format!("task join error: {e}")))?
}

impl Coordinator {
    pub fn new(
        claims: Arc<dyn ClaimStore>,
        items: Arc<dyn ItemStore>,
        directory: Arc<dyn Directory>,
        channel: Arc<dyn NotificationChannel>,
        links: Links,
    ) -> Self {
        Self {
            claims,
            items,
            directory,
            channel,
            links,
            dispatch_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    // -----------------------------------------------------------------------
    // submit
    // -----------------------------------------------------------------------

    pub async fn submit_claim(&self, req: SubmitRequest) -> Result<Outcome> {
        let name = require("name", req.name.as_deref())?;
        let phone = validate_phone(&require("phone", req.phone.as_deref())?)?;
        let address = require("address", req.address.as_deref())?;
        let detailed = require("detailedAddress", req.detailed_address.as_deref())?;
        let item_id = req
            .item_id
            .ok_or_else(|| WoodlinkError::Validation("itemId is required".to_string()))?;
        let delivery_address = format!("{address}, {detailed}");

        // Reads only until every check has passed.
        let directory = self.directory.clone();
        let lookup_phone = phone.clone();
        let existing = blocking(move || directory.find_user_by_phone(&lookup_phone)).await?;
        if let Some(user) = &existing {
            if user.name != name {
                tracing::info!(phone = %phone, "rejected claim: phone registered under another name");
                return Err(WoodlinkError::IdentityMismatch { phone });
            }
        }
        let item = self.load_item(item_id).await?;
        let workshop = self.load_workshop(item.workshop_id).await?;
        Claim::ensure_claimable(item.id, item.status)?;

        let directory = self.directory.clone();
        let (n, p, a) = (name.clone(), phone.clone(), delivery_address.clone());
        let user = blocking(move || directory.find_or_create_user(&n, &p, &a)).await?;

        let applied = Claim::create(
            user.id,
            item.id,
            item.status,
            workshop.id,
            delivery_address,
        )?;
        let claims = self.claims.clone();
        let record = applied.claim.clone();
        blocking(move || claims.insert_claim(&record)).await?;
        tracing::info!(claim = %applied.claim.id, item = %item.id, "claim submitted");

        let loaded = Loaded {
            claim: applied.claim.clone(),
            user,
            item,
            workshop,
        };
        let dispatches = self
            .dispatch(&loaded, &applied.notices, None, !req.disable_sms)
            .await;
        Ok(Outcome {
            claim: applied.claim,
            processed: Processed::Applied,
            item_synced: true,
            dispatches,
        })
    }

    // -----------------------------------------------------------------------
    // accept
    // -----------------------------------------------------------------------

    pub async fn accept_claim(&self, claim_id: Uuid) -> Result<Outcome> {
        let loaded = self.load(claim_id).await?;
        let applied = match loaded.claim.accept()? {
            Transition::AlreadyProcessed(claim) => {
                tracing::debug!(claim = %claim.id, "accept ignored: already accepted");
                return Ok(Outcome::already_processed(claim));
            }
            Transition::Applied(applied) => applied,
        };
        if loaded.item.status == ItemStatus::Claimed {
            // A concurrent accept of this same claim may already have landed.
            let current = self.reload_claim(claim_id).await?;
            if current.status == ClaimStatus::Accepted {
                return Ok(Outcome::already_processed(current));
            }
            return Err(WoodlinkError::ItemUnavailable(loaded.item.id));
        }

        if let Some(outcome) = self.commit_claim(&applied, ClaimStatus::Accepted).await? {
            return Ok(outcome);
        }

        let items = self.items.clone();
        let item_id = loaded.item.id;
        let reserved = blocking(move || items.reserve_item(claim_id)).await;
        let item_synced = match reserved {
            Ok(Reserve::Reserved) => true,
            Ok(Reserve::ItemTaken) => {
                // Another claim took the item between our read and our write.
                self.compensate_accept(&applied).await;
                return Err(WoodlinkError::ItemUnavailable(item_id));
            }
            Ok(Reserve::ClaimMoved(status)) => {
                // Cancelled after our swap; the cancel owns the item from here.
                tracing::info!(claim = %claim_id, %status, "accept superseded before item write; nothing sent");
                return Err(WoodlinkError::InvalidTransition {
                    from: status.to_string(),
                    to: ClaimStatus::Accepted.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(claim = %claim_id, item = %item_id, error = %e,
                    "claim accepted but item write failed; reconciliation will repair");
                false
            }
        };

        let loaded = Loaded {
            claim: applied.claim.clone(),
            ..loaded
        };
        let dispatches = self.dispatch(&loaded, &applied.notices, None, true).await;
        Ok(Outcome {
            claim: applied.claim,
            processed: Processed::Applied,
            item_synced,
            dispatches,
        })
    }

    async fn compensate_accept(&self, applied: &Applied) {
        let mut reverted = applied.claim.clone();
        reverted.status = ClaimStatus::Submitted;
        let claims = self.claims.clone();
        let result = blocking(move || claims.swap_claim(ClaimStatus::Accepted, &reverted)).await;
        match result {
            Ok(Swap::Applied) => {
                tracing::warn!(claim = %applied.claim.id, "item already claimed elsewhere; accept reverted");
                // Free the item if the claim that held it went away meanwhile.
                self.release_item(&applied.claim).await;
            }
            Ok(Swap::Stale(status)) => {
                tracing::warn!(claim = %applied.claim.id, %status, "accept revert skipped: claim moved on")
            }
            Err(e) => {
                tracing::error!(claim = %applied.claim.id, error = %e, "accept revert failed")
            }
        }
    }

    // -----------------------------------------------------------------------
    // cancel
    // -----------------------------------------------------------------------

    pub async fn cancel_claim(&self, claim_id: Uuid, initiator: Initiator) -> Result<Outcome> {
        let mut attempt = 0;
        let (loaded, applied) = loop {
            attempt += 1;
            let loaded = self.load(claim_id).await?;
            let applied = match loaded.claim.cancel(initiator) {
                Transition::AlreadyProcessed(claim) => {
                    tracing::debug!(claim = %claim.id, "cancel ignored: already cancelled");
                    return Ok(Outcome::already_processed(claim));
                }
                Transition::Applied(applied) => applied,
            };
            match self.commit_claim(&applied, ClaimStatus::Cancelled).await {
                Ok(None) => break (loaded, applied),
                Ok(Some(outcome)) => return Ok(outcome),
                // Accepted under our feet; cancelling is still legal, decide again.
                Err(WoodlinkError::InvalidTransition { .. }) if attempt < MAX_CANCEL_ATTEMPTS => {
                    continue
                }
                Err(e) => return Err(e),
            }
        };

        let item_synced = match applied.item {
            Some(ItemEffect::Release) => self.release_item(&applied.claim).await,
            _ => true,
        };

        let loaded = Loaded {
            claim: applied.claim.clone(),
            ..loaded
        };
        let dispatches = self
            .dispatch(&loaded, &applied.notices, applied.initiator, true)
            .await;
        Ok(Outcome {
            claim: applied.claim,
            processed: Processed::Applied,
            item_synced,
            dispatches,
        })
    }

    /// Free the item unless some claim still holds it accepted.
    async fn release_item(&self, claim: &Claim) -> bool {
        let items = self.items.clone();
        let (claim_id, item_id) = (claim.id, claim.item_id);
        match blocking(move || items.release_item(item_id)).await {
            Ok(true) => true,
            Ok(false) => {
                tracing::info!(claim = %claim_id, item = %item_id,
                    "item stays claimed: held by another accepted claim");
                true
            }
            Err(e) => {
                tracing::error!(claim = %claim_id, item = %item_id, error = %e,
                    "item release failed; reconciliation will repair");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // change delivery
    // -----------------------------------------------------------------------

    pub async fn change_delivery(&self, claim_id: Uuid, new_address: &str) -> Result<Outcome> {
        let address = require("address", Some(new_address))?;
        let loaded = self.load(claim_id).await?;
        let applied = loaded.claim.change_delivery(address)?;

        let claims = self.claims.clone();
        let next = applied.claim.clone();
        let expected = applied.expected;
        match blocking(move || claims.swap_claim(expected, &next)).await? {
            Swap::Applied => {}
            Swap::Stale(status) => {
                return Err(WoodlinkError::InvalidTransition {
                    from: status.to_string(),
                    to: "delivery change".to_string(),
                });
            }
        }
        tracing::info!(claim = %claim_id, "delivery address changed");

        let loaded = Loaded {
            claim: applied.claim.clone(),
            ..loaded
        };
        let dispatches = self.dispatch(&loaded, &applied.notices, None, true).await;
        Ok(Outcome {
            claim: applied.claim,
            processed: Processed::Applied,
            item_synced: true,
            dispatches,
        })
    }

    // -----------------------------------------------------------------------
    // Shared steps
    // -----------------------------------------------------------------------

    /// Swap the claim to its next status. `Some(outcome)` means another
    /// request already moved it to `target` and nothing more should happen.
    async fn commit_claim(&self, applied: &Applied, target: ClaimStatus) -> Result<Option<Outcome>> {
        let claims = self.claims.clone();
        let next = applied.claim.clone();
        let expected = applied.expected;
        match blocking(move || claims.swap_claim(expected, &next)).await? {
            Swap::Applied => {
                tracing::info!(claim = %applied.claim.id, from = %expected, to = %target, "claim transitioned");
                Ok(None)
            }
            Swap::Stale(status) if status == target => {
                let current = self.reload_claim(applied.claim.id).await?;
                Ok(Some(Outcome::already_processed(current)))
            }
            Swap::Stale(status) => Err(WoodlinkError::InvalidTransition {
                from: status.to_string(),
                to: target.to_string(),
            }),
        }
    }

    async fn reload_claim(&self, claim_id: Uuid) -> Result<Claim> {
        let claims = self.claims.clone();
        blocking(move || claims.get_claim(claim_id))
            .await?
            .ok_or(WoodlinkError::ClaimNotFound(claim_id))
    }

    async fn load(&self, claim_id: Uuid) -> Result<Loaded> {
        let claim = self.reload_claim(claim_id).await?;
        let directory = self.directory.clone();
        let user_id = claim.user_id;
        let user = blocking(move || directory.get_user(user_id))
            .await?
            .ok_or_else(|| WoodlinkError::UserNotFound(user_id.to_string()))?;
        let item = self.load_item(claim.item_id).await?;
        let workshop = self.load_workshop(claim.workshop_id).await?;
        Ok(Loaded {
            claim,
            user,
            item,
            workshop,
        })
    }

    async fn load_item(&self, id: Uuid) -> Result<Item> {
        let items = self.items.clone();
        blocking(move || items.get_item(id))
            .await?
            .ok_or(WoodlinkError::ItemNotFound(id))
    }

    async fn load_workshop(&self, id: Uuid) -> Result<Workshop> {
        let directory = self.directory.clone();
        blocking(move || directory.get_workshop(id))
            .await?
            .ok_or(WoodlinkError::WorkshopNotFound(id))
    }

    /// Send every notice concurrently. One failing send never cancels another.
    async fn dispatch(
        &self,
        loaded: &Loaded,
        notices: &[Notice],
        initiator: Option<Initiator>,
        allow_fallback: bool,
    ) -> Vec<DispatchReport> {
        let sends = notices.iter().map(|notice| async move {
            let to = match notice.audience {
                Audience::Customer => loaded.user.contact(),
                Audience::Workshop => loaded.workshop.contact(),
            };
            let vars = self.variables(loaded, notice.template, initiator);
            let send = self.channel.send(&to, notice.template, &vars, allow_fallback);
            let result = match tokio::time::timeout(self.dispatch_timeout, send).await {
                Ok(result) => result,
                Err(_) => DispatchResult::Failed(format!(
                    "timed out after {}s",
                    self.dispatch_timeout.as_secs()
                )),
            };
            if let DispatchResult::Failed(reason) = &result {
                tracing::warn!(claim = %loaded.claim.id, template = %notice.template,
                    to = %to.phone, %reason, "notification failed");
            }
            DispatchReport {
                template: notice.template,
                audience: notice.audience,
                result,
            }
        });
        join_all(sends).await
    }

    fn variables(
        &self,
        loaded: &Loaded,
        template: TemplateKind,
        initiator: Option<Initiator>,
    ) -> Variables {
        let Loaded {
            claim,
            user,
            item,
            workshop,
        } = loaded;
        let date = format_kst(claim.requested_at);
        let pairs: Vec<(&str, String)> = match template {
            TemplateKind::ClaimSubmitted | TemplateKind::ClaimAccepted => vec![
                ("name", user.name.clone()),
                ("date", date),
                ("workshop", workshop.name.clone()),
                ("product", item.name.clone()),
                ("price", item.price_label()),
                ("LINK", self.links.cancel(claim.id)),
                ("LINK2", self.links.change_address(claim.id)),
            ],
            TemplateKind::ActionNeeded => vec![
                ("name", user.name.clone()),
                ("date", date),
                ("workshop", workshop.name.clone()),
                ("product", item.name.clone()),
                ("price", item.price_label()),
                ("phone", user.phone.clone()),
                ("LINK", self.links.accept(claim.id)),
            ],
            TemplateKind::ReadyForDelivery => vec![
                ("name", user.name.clone()),
                ("product", item.name.clone()),
                ("LINK", self.links.home()),
                ("LINK2", self.links.review(claim.id)),
            ],
            TemplateKind::DeliveryChanged => vec![
                ("name", user.name.clone()),
                ("date", date),
                ("workshop", workshop.name.clone()),
                ("product", item.name.clone()),
                ("price", item.price_label()),
                ("phone", user.phone.clone()),
                ("address", claim.delivery_address.clone()),
            ],
            TemplateKind::ClaimCancelled => vec![
                (
                    "initiate",
                    initiator.unwrap_or_default().label().to_string(),
                ),
                ("date", date),
                ("product", item.name.clone()),
                ("price", item.price_label()),
            ],
        };
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
