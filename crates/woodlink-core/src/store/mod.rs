//! Storage contracts for claims, items and the reference entities.
//!
//! Each trait is object-safe and synchronous; the coordinator calls them from
//! `spawn_blocking`. `WoodlinkDb` implements all three over one redb file.

pub mod db;

pub use db::WoodlinkDb;

use crate::claim::Claim;
use crate::entity::{Item, ItemUpdate, Review, ReviewUpdate, User, UserUpdate, Workshop};
use crate::error::Result;
use crate::types::{ClaimStatus, ItemStatus};
use uuid::Uuid;

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swap {
    /// The stored value matched the expected status and was replaced.
    Applied,
    /// Another writer got there first; carries the status actually stored.
    Stale(ClaimStatus),
}

/// Outcome of reserving an item for an accepted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reserve {
    /// The item moved from `available` to `claimed`.
    Reserved,
    /// The item was already `claimed`.
    ItemTaken,
    /// The claim is no longer `accepted`; carries the status actually stored.
    ClaimMoved(ClaimStatus),
}

/// Exclusive owner of claim records.
pub trait ClaimStore: Send + Sync {
    fn insert_claim(&self, claim: &Claim) -> Result<()>;

    fn get_claim(&self, id: Uuid) -> Result<Option<Claim>>;

    /// All claims, oldest first.
    fn list_claims(&self) -> Result<Vec<Claim>>;

    /// Replace the stored claim with `next` only if its current status equals
    /// `expected`. Check and write happen atomically.
    fn swap_claim(&self, expected: ClaimStatus, next: &Claim) -> Result<Swap>;
}

/// Exclusive owner of item availability.
pub trait ItemStore: Send + Sync {
    fn insert_item(&self, item: &Item) -> Result<()>;

    fn get_item(&self, id: Uuid) -> Result<Option<Item>>;

    fn list_items(&self) -> Result<Vec<Item>>;

    /// Mark the item of `claim_id` as `claimed`, but only while that claim is
    /// still `accepted` and the item is still `available`. The claim check
    /// and the item write happen in one transaction.
    fn reserve_item(&self, claim_id: Uuid) -> Result<Reserve>;

    /// Mark the item `available` unless some claim still holds it
    /// `accepted`, checked in the same transaction as the write. Returns
    /// `false` when the item stays held.
    fn release_item(&self, item_id: Uuid) -> Result<bool>;

    /// Unconditional status write, used by reconciliation.
    fn set_item_status(&self, id: Uuid, next: ItemStatus) -> Result<()>;

    /// Apply a partial update to everything but the status.
    fn update_item(&self, id: Uuid, update: ItemUpdate) -> Result<Item>;
}

/// Read-mostly reference entities: customers, workshops, reviews.
pub trait Directory: Send + Sync {
    fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>>;

    /// Return the user registered under `phone`, creating it if absent.
    /// Fails with `IdentityMismatch` when the phone belongs to another name.
    fn find_or_create_user(&self, name: &str, phone: &str, address: &str) -> Result<User>;

    /// Register a user. Fails with `Validation` when the phone is taken.
    fn insert_user(&self, user: &User) -> Result<()>;

    /// Apply `update` to the user registered under `phone`, moving the phone
    /// index if the number changes.
    fn update_user(&self, phone: &str, update: UserUpdate) -> Result<User>;

    fn list_users(&self) -> Result<Vec<User>>;

    fn insert_workshop(&self, workshop: &Workshop) -> Result<()>;

    fn get_workshop(&self, id: Uuid) -> Result<Option<Workshop>>;

    fn list_workshops(&self) -> Result<Vec<Workshop>>;

    fn find_workshops_by_name(&self, name: &str) -> Result<Vec<Workshop>> {
        Ok(self
            .list_workshops()?
            .into_iter()
            .filter(|w| w.name == name)
            .collect())
    }

    fn insert_review(&self, review: &Review) -> Result<()>;

    fn update_review(&self, id: Uuid, update: ReviewUpdate) -> Result<Review>;

    /// All reviews, oldest first.
    fn list_reviews(&self) -> Result<Vec<Review>>;
}
