//! The claim record and its state machine.
//!
//! Transitions are pure: each operation takes the current claim and returns
//! either a [`Transition::Applied`] carrying the next record plus the side
//! effects the coordinator must carry out, or [`Transition::AlreadyProcessed`]
//! when the claim is already in the requested state.
//!
//! ```text
//! Submitted ──accept──► Accepted
//!     │                    │
//!     └──────cancel────────┴──► Cancelled
//! ```

use crate::error::{Result, WoodlinkError};
use crate::types::{ClaimStatus, Initiator, ItemStatus, TemplateKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Claim
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub workshop_id: Uuid,
    pub delivery_address: String,
    pub status: ClaimStatus,
    pub requested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Side-effect intents
// ---------------------------------------------------------------------------

/// What must happen to the referenced item once the claim write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemEffect {
    /// Available → Claimed.
    Reserve,
    /// Any → Available.
    Release,
}

/// Who a notice is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Customer,
    Workshop,
}

/// A message the coordinator must dispatch after the writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub template: TemplateKind,
    pub audience: Audience,
}

impl Notice {
    const fn new(template: TemplateKind, audience: Audience) -> Self {
        Self { template, audience }
    }
}

/// A legal transition: the next record, the status it must be swapped from,
/// and its side effects.
#[derive(Debug, Clone)]
pub struct Applied {
    pub claim: Claim,
    pub expected: ClaimStatus,
    pub item: Option<ItemEffect>,
    pub notices: Vec<Notice>,
    pub initiator: Option<Initiator>,
}

#[derive(Debug, Clone)]
pub enum Transition {
    Applied(Applied),
    AlreadyProcessed(Claim),
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl Claim {
    /// Start a claim against an item. Fails with `ItemUnavailable` when the
    /// item is already claimed.
    pub fn create(
        user_id: Uuid,
        item_id: Uuid,
        item_status: ItemStatus,
        workshop_id: Uuid,
        delivery_address: impl Into<String>,
    ) -> Result<Applied> {
        Self::ensure_claimable(item_id, item_status)?;
        let now = Utc::now();
        Ok(Applied {
            claim: Claim {
                id: Uuid::new_v4(),
                user_id,
                item_id,
                workshop_id,
                delivery_address: delivery_address.into(),
                status: ClaimStatus::Submitted,
                requested_at: now,
                updated_at: now,
            },
            expected: ClaimStatus::Submitted,
            item: None,
            notices: vec![
                Notice::new(TemplateKind::ClaimSubmitted, Audience::Customer),
                Notice::new(TemplateKind::ActionNeeded, Audience::Workshop),
            ],
            initiator: None,
        })
    }

    pub fn ensure_claimable(item_id: Uuid, item_status: ItemStatus) -> Result<()> {
        match item_status {
            ItemStatus::Available => Ok(()),
            ItemStatus::Claimed => Err(WoodlinkError::ItemUnavailable(item_id)),
        }
    }

    /// Submitted → Accepted. Repeated accepts report `AlreadyProcessed`;
    /// accepting a cancelled claim is an invalid transition.
    pub fn accept(&self) -> Result<Transition> {
        match self.status {
            ClaimStatus::Submitted => {
                let mut next = self.clone();
                next.status = ClaimStatus::Accepted;
                next.updated_at = Utc::now();
                Ok(Transition::Applied(Applied {
                    claim: next,
                    expected: ClaimStatus::Submitted,
                    item: Some(ItemEffect::Reserve),
                    notices: vec![
                        Notice::new(TemplateKind::ClaimAccepted, Audience::Customer),
                        Notice::new(TemplateKind::ReadyForDelivery, Audience::Customer),
                    ],
                    initiator: None,
                }))
            }
            ClaimStatus::Accepted => Ok(Transition::AlreadyProcessed(self.clone())),
            ClaimStatus::Cancelled => Err(self.invalid(ClaimStatus::Accepted)),
        }
    }

    /// Any non-cancelled status → Cancelled. Always releases the item.
    pub fn cancel(&self, initiator: Initiator) -> Transition {
        match self.status {
            ClaimStatus::Cancelled => Transition::AlreadyProcessed(self.clone()),
            from @ (ClaimStatus::Submitted | ClaimStatus::Accepted) => {
                let mut next = self.clone();
                next.status = ClaimStatus::Cancelled;
                next.updated_at = Utc::now();
                Transition::Applied(Applied {
                    claim: next,
                    expected: from,
                    item: Some(ItemEffect::Release),
                    notices: vec![Notice::new(
                        TemplateKind::ClaimCancelled,
                        Audience::Workshop,
                    )],
                    initiator: Some(initiator),
                })
            }
        }
    }

    /// Replace the delivery address. Status is unchanged; cancelled claims
    /// are frozen.
    pub fn change_delivery(&self, address: impl Into<String>) -> Result<Applied> {
        if self.status == ClaimStatus::Cancelled {
            return Err(WoodlinkError::InvalidTransition {
                from: self.status.to_string(),
                to: "delivery change".to_string(),
            });
        }
        let mut next = self.clone();
        next.delivery_address = address.into();
        next.updated_at = Utc::now();
        Ok(Applied {
            claim: next,
            expected: self.status,
            item: None,
            notices: vec![Notice::new(
                TemplateKind::DeliveryChanged,
                Audience::Workshop,
            )],
            initiator: None,
        })
    }

    fn invalid(&self, to: ClaimStatus) -> WoodlinkError {
        WoodlinkError::InvalidTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}
