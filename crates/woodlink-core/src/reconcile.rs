//! Re-derive item availability from claim status.
//!
//! The claim store is the source of truth: an item is `claimed` exactly when
//! some claim referencing it is `accepted`. Items whose stored status drifted
//! (an item write failed after its claim committed) are rewritten.

use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;
use crate::store::{ClaimStore, ItemStore};
use crate::types::{ClaimStatus, ItemStatus};

#[derive(Debug, Clone, Serialize)]
pub struct Repair {
    pub item_id: Uuid,
    pub from: ItemStatus,
    pub to: ItemStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub checked: usize,
    pub repaired: Vec<Repair>,
}

pub fn run(claims: &dyn ClaimStore, items: &dyn ItemStore) -> Result<ReconcileReport> {
    let held: HashSet<Uuid> = claims
        .list_claims()?
        .into_iter()
        .filter(|c| c.status == ClaimStatus::Accepted)
        .map(|c| c.item_id)
        .collect();

    let mut report = ReconcileReport::default();
    for item in items.list_items()? {
        report.checked += 1;
        let expected = if held.contains(&item.id) {
            ItemStatus::Claimed
        } else {
            ItemStatus::Available
        };
        if item.status != expected {
            items.set_item_status(item.id, expected)?;
            tracing::warn!(item = %item.id, from = %item.status, to = %expected, "repaired item status");
            report.repaired.push(Repair {
                item_id: item.id,
                from: item.status,
                to: expected,
            });
        }
    }
    Ok(report)
}
