//! redb-backed implementation of every store trait.
//!
//! # Table design
//!
//! ```text
//! claims          uuid (16 bytes) → JSON Claim
//! items           uuid (16 bytes) → JSON Item
//! users           uuid (16 bytes) → JSON User
//! users_by_phone  phone (str)     → uuid (16 bytes)
//! workshops       uuid (16 bytes) → JSON Workshop
//! reviews         uuid (16 bytes) → JSON Review
//! ```
//!
//! redb admits one write transaction at a time, so a read-compare-write
//! inside a single write transaction is a compare-and-swap. Item
//! reservation and release read the claims table inside the item's write
//! transaction, so an item status never lags a claim that moved
//! concurrently.

use std::path::Path;

use redb::{Database, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::claim::Claim;
use crate::entity::{
    normalize_phone, Item, ItemUpdate, Review, ReviewUpdate, User, UserUpdate, Workshop,
};
use crate::error::{Result, WoodlinkError};
use crate::types::{ClaimStatus, ItemStatus};

use super::{ClaimStore, Directory, ItemStore, Reserve, Swap};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

type JsonTable = TableDefinition<'static, &'static [u8], &'static [u8]>;
type PhoneIndex = TableDefinition<'static, &'static str, &'static [u8]>;

const CLAIMS: JsonTable = TableDefinition::new("claims");
const ITEMS: JsonTable = TableDefinition::new("items");
const USERS: JsonTable = TableDefinition::new("users");
const WORKSHOPS: JsonTable = TableDefinition::new("workshops");
const REVIEWS: JsonTable = TableDefinition::new("reviews");
const USERS_BY_PHONE: PhoneIndex = TableDefinition::new("users_by_phone");

fn db_err(e: impl std::fmt::Display) -> WoodlinkError {
    WoodlinkError::StoreUnavailable(e.to_string())
}

fn get_json<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    id: Uuid,
) -> Result<Option<T>> {
    let guard = table.get(id.as_bytes().as_slice()).map_err(db_err)?;
    match guard {
        Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        None => Ok(None),
    }
}

fn put_json<T: Serialize>(
    table: &mut Table<'_, &'static [u8], &'static [u8]>,
    id: Uuid,
    value: &T,
) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    table
        .insert(id.as_bytes().as_slice(), bytes.as_slice())
        .map_err(db_err)?;
    Ok(())
}

fn indexed_user(
    index: &impl ReadableTable<&'static str, &'static [u8]>,
    phone: &str,
) -> Result<Option<Uuid>> {
    let guard = index.get(phone).map_err(db_err)?;
    match guard {
        Some(v) => Ok(Some(Uuid::from_slice(v.value()).map_err(db_err)?)),
        None => Ok(None),
    }
}

/// Whether any claim in `wt` holds `item_id` accepted.
fn item_held(wt: &WriteTransaction, item_id: Uuid) -> Result<bool> {
    let claims = wt.open_table(CLAIMS).map_err(db_err)?;
    for entry in claims.iter().map_err(db_err)? {
        let (_, v) = entry.map_err(db_err)?;
        let claim: Claim = serde_json::from_slice(v.value())?;
        if claim.item_id == item_id && claim.status == ClaimStatus::Accepted {
            return Ok(true);
        }
    }
    Ok(false)
}

// ---------------------------------------------------------------------------
// WoodlinkDb
// ---------------------------------------------------------------------------

pub struct WoodlinkDb {
    db: Database,
}

impl WoodlinkDb {
    /// Open or create the database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        for def in [CLAIMS, ITEMS, USERS, WORKSHOPS, REVIEWS] {
            wt.open_table(def).map_err(db_err)?;
        }
        wt.open_table(USERS_BY_PHONE).map_err(db_err)?;
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    fn read_one<T: DeserializeOwned>(&self, def: JsonTable, id: Uuid) -> Result<Option<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(def).map_err(db_err)?;
        get_json(&table, id)
    }

    fn read_all<T: DeserializeOwned>(&self, def: JsonTable) -> Result<Vec<T>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(def).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    fn write_one<T: Serialize>(&self, def: JsonTable, id: Uuid, value: &T) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut table = wt.open_table(def).map_err(db_err)?;
            put_json(&mut table, id, value)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    /// Read-modify-write of one record in a single write transaction.
    /// Returns `None` when the record does not exist.
    fn modify<T, F>(&self, def: JsonTable, id: Uuid, f: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> Result<()>,
    {
        let wt = self.db.begin_write().map_err(db_err)?;
        let updated = {
            let mut table = wt.open_table(def).map_err(db_err)?;
            match get_json::<T>(&table, id)? {
                Some(mut value) => {
                    f(&mut value)?;
                    put_json(&mut table, id, &value)?;
                    Some(value)
                }
                None => None,
            }
        };
        wt.commit().map_err(db_err)?;
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// ClaimStore
// ---------------------------------------------------------------------------

impl ClaimStore for WoodlinkDb {
    fn insert_claim(&self, claim: &Claim) -> Result<()> {
        self.write_one(CLAIMS, claim.id, claim)
    }

    fn get_claim(&self, id: Uuid) -> Result<Option<Claim>> {
        self.read_one(CLAIMS, id)
    }

    fn list_claims(&self) -> Result<Vec<Claim>> {
        let mut claims: Vec<Claim> = self.read_all(CLAIMS)?;
        claims.sort_by(|a, b| a.requested_at.cmp(&b.requested_at));
        Ok(claims)
    }

    fn swap_claim(&self, expected: ClaimStatus, next: &Claim) -> Result<Swap> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let outcome = {
            let mut table = wt.open_table(CLAIMS).map_err(db_err)?;
            match get_json::<Claim>(&table, next.id)? {
                None => return Err(WoodlinkError::ClaimNotFound(next.id)),
                Some(stored) if stored.status != expected => Swap::Stale(stored.status),
                Some(_) => {
                    put_json(&mut table, next.id, next)?;
                    Swap::Applied
                }
            }
        };
        wt.commit().map_err(db_err)?;
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// ItemStore
// ---------------------------------------------------------------------------

impl ItemStore for WoodlinkDb {
    fn insert_item(&self, item: &Item) -> Result<()> {
        self.write_one(ITEMS, item.id, item)
    }

    fn get_item(&self, id: Uuid) -> Result<Option<Item>> {
        self.read_one(ITEMS, id)
    }

    fn list_items(&self) -> Result<Vec<Item>> {
        self.read_all(ITEMS)
    }

    fn reserve_item(&self, claim_id: Uuid) -> Result<Reserve> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let outcome = {
            let claim: Claim = {
                let claims = wt.open_table(CLAIMS).map_err(db_err)?;
                get_json(&claims, claim_id)?.ok_or(WoodlinkError::ClaimNotFound(claim_id))?
            };
            if claim.status != ClaimStatus::Accepted {
                Reserve::ClaimMoved(claim.status)
            } else {
                let mut items = wt.open_table(ITEMS).map_err(db_err)?;
                let mut item: Item = get_json(&items, claim.item_id)?
                    .ok_or(WoodlinkError::ItemNotFound(claim.item_id))?;
                if item.status != ItemStatus::Available {
                    Reserve::ItemTaken
                } else {
                    item.status = ItemStatus::Claimed;
                    put_json(&mut items, item.id, &item)?;
                    Reserve::Reserved
                }
            }
        };
        wt.commit().map_err(db_err)?;
        Ok(outcome)
    }

    fn release_item(&self, item_id: Uuid) -> Result<bool> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let released = {
            let held = item_held(&wt, item_id)?;
            let mut items = wt.open_table(ITEMS).map_err(db_err)?;
            let mut item: Item =
                get_json(&items, item_id)?.ok_or(WoodlinkError::ItemNotFound(item_id))?;
            if held {
                false
            } else {
                if item.status != ItemStatus::Available {
                    item.status = ItemStatus::Available;
                    put_json(&mut items, item_id, &item)?;
                }
                true
            }
        };
        wt.commit().map_err(db_err)?;
        Ok(released)
    }

    fn set_item_status(&self, id: Uuid, next: ItemStatus) -> Result<()> {
        self.modify(ITEMS, id, |item: &mut Item| {
            item.status = next;
            Ok(())
        })?
        .map(|_| ())
        .ok_or(WoodlinkError::ItemNotFound(id))
    }

    fn update_item(&self, id: Uuid, update: ItemUpdate) -> Result<Item> {
        self.modify(ITEMS, id, |item: &mut Item| {
            item.apply(update);
            Ok(())
        })?
        .ok_or(WoodlinkError::ItemNotFound(id))
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

impl Directory for WoodlinkDb {
    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.read_one(USERS, id)
    }

    fn find_user_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let phone = normalize_phone(phone);
        let id = {
            let rt = self.db.begin_read().map_err(db_err)?;
            let index = rt.open_table(USERS_BY_PHONE).map_err(db_err)?;
            match indexed_user(&index, &phone)? {
                Some(id) => id,
                None => return Ok(None),
            }
        };
        self.get_user(id)
    }

    fn find_or_create_user(&self, name: &str, phone: &str, address: &str) -> Result<User> {
        let candidate = User::new(name, phone, address);
        let wt = self.db.begin_write().map_err(db_err)?;
        let user = {
            let mut index = wt.open_table(USERS_BY_PHONE).map_err(db_err)?;
            let mut users = wt.open_table(USERS).map_err(db_err)?;
            let existing: Option<User> = match indexed_user(&index, &candidate.phone)? {
                Some(id) => get_json(&users, id)?,
                None => None,
            };
            match existing {
                Some(user) if user.name != candidate.name => {
                    return Err(WoodlinkError::IdentityMismatch { phone: user.phone });
                }
                Some(user) => user,
                None => {
                    put_json(&mut users, candidate.id, &candidate)?;
                    index
                        .insert(
                            candidate.phone.as_str(),
                            candidate.id.as_bytes().as_slice(),
                        )
                        .map_err(db_err)?;
                    tracing::info!(user = %candidate.id, "registered new customer");
                    candidate
                }
            }
        };
        wt.commit().map_err(db_err)?;
        Ok(user)
    }

    fn insert_user(&self, user: &User) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut index = wt.open_table(USERS_BY_PHONE).map_err(db_err)?;
            let mut users = wt.open_table(USERS).map_err(db_err)?;
            if indexed_user(&index, &user.phone)?.is_some() {
                return Err(WoodlinkError::Validation(format!(
                    "phone {} is already registered",
                    user.phone
                )));
            }
            put_json(&mut users, user.id, user)?;
            index
                .insert(user.phone.as_str(), user.id.as_bytes().as_slice())
                .map_err(db_err)?;
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    fn update_user(&self, phone: &str, update: UserUpdate) -> Result<User> {
        let phone = normalize_phone(phone);
        let wt = self.db.begin_write().map_err(db_err)?;
        let user = {
            let mut index = wt.open_table(USERS_BY_PHONE).map_err(db_err)?;
            let mut users = wt.open_table(USERS).map_err(db_err)?;
            let mut user = match indexed_user(&index, &phone)? {
                Some(id) => get_json::<User>(&users, id)?,
                None => None,
            }
            .ok_or_else(|| WoodlinkError::UserNotFound(phone.clone()))?;
            user.apply(update)?;
            if user.phone != phone {
                if indexed_user(&index, &user.phone)?.is_some() {
                    return Err(WoodlinkError::Validation(format!(
                        "phone {} is already registered",
                        user.phone
                    )));
                }
                index.remove(phone.as_str()).map_err(db_err)?;
                index
                    .insert(user.phone.as_str(), user.id.as_bytes().as_slice())
                    .map_err(db_err)?;
            }
            put_json(&mut users, user.id, &user)?;
            user
        };
        wt.commit().map_err(db_err)?;
        Ok(user)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.read_all(USERS)?;
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        self.write_one(WORKSHOPS, workshop.id, workshop)
    }

    fn get_workshop(&self, id: Uuid) -> Result<Option<Workshop>> {
        self.read_one(WORKSHOPS, id)
    }

    fn list_workshops(&self) -> Result<Vec<Workshop>> {
        self.read_all(WORKSHOPS)
    }

    fn insert_review(&self, review: &Review) -> Result<()> {
        self.write_one(REVIEWS, review.id, review)
    }

    fn update_review(&self, id: Uuid, update: ReviewUpdate) -> Result<Review> {
        self.modify(REVIEWS, id, |review: &mut Review| {
            review.apply(update);
            Ok(())
        })?
        .ok_or(WoodlinkError::ReviewNotFound(id))
    }

    fn list_reviews(&self) -> Result<Vec<Review>> {
        let mut reviews: Vec<Review> = self.read_all(REVIEWS)?;
        reviews.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(reviews)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
