//! Reference entities the claim lifecycle reads from: customers, workshops,
//! donated items and reviews.

use crate::error::{Result, WoodlinkError};
use crate::types::ItemStatus;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

/// Name and phone of a message recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A customer. The phone number is the de-duplication key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            phone: normalize_phone(&phone.into()),
            address: address.into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn contact(&self) -> Contact {
        Contact {
            name: self.name.clone(),
            phone: self.phone.clone(),
        }
    }

    /// Apply a partial update. Blank fields keep the stored value; the first
    /// `deleted` request stamps `deleted_at`.
    pub fn apply(&mut self, update: UserUpdate) -> Result<()> {
        if let Some(name) = non_blank(update.name) {
            self.name = name;
        }
        if let Some(phone) = non_blank(update.phone) {
            self.phone = validate_phone(&phone)?;
        }
        if let Some(address) = non_blank(update.address) {
            self.address = address;
        }
        let now = Utc::now();
        if update.deleted && self.deleted_at.is_none() {
            self.deleted_at = Some(now);
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Soft delete: the record stays so existing claims keep resolving.
    #[serde(default)]
    pub deleted: bool,
}

// ---------------------------------------------------------------------------
// Workshop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workshop {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub content: Option<String>,
}

impl Workshop {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
        content: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: normalize_phone(&phone.into()),
            address: address.into(),
            content,
        }
    }

    pub fn contact(&self) -> Contact {
        Contact {
            name: self.name.clone(),
            phone: self.phone.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// A surplus good offered by a workshop. `status` is written only by the
/// coordinator and the reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub name: String,
    pub category: String,
    pub cost: u32,
    /// Asking price in units of 10,000 KRW.
    #[serde(default)]
    pub price: Option<u32>,
    pub size: Vec<String>,
    pub reason: String,
    pub img: Vec<String>,
    pub status: ItemStatus,
}

/// Fields needed to register a new item; status always starts `available`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub workshop: Uuid,
    pub name: String,
    pub category: String,
    pub cost: u32,
    #[serde(default)]
    pub price: Option<u32>,
    pub size: Vec<String>,
    pub reason: String,
    pub img: Vec<String>,
}

impl Item {
    pub fn from_new(new: NewItem) -> Self {
        Self {
            id: Uuid::new_v4(),
            workshop_id: new.workshop,
            name: new.name,
            category: new.category,
            cost: new.cost,
            price: new.price,
            size: new.size,
            reason: new.reason,
            img: new.img,
            status: ItemStatus::Available,
        }
    }

    /// Apply a partial update. `status` is not part of [`ItemUpdate`]; only
    /// the claim lifecycle moves it.
    pub fn apply(&mut self, update: ItemUpdate) {
        if let Some(workshop) = update.workshop {
            self.workshop_id = workshop;
        }
        if let Some(name) = non_blank(update.name) {
            self.name = name;
        }
        if let Some(category) = non_blank(update.category) {
            self.category = category;
        }
        if let Some(cost) = update.cost {
            self.cost = cost;
        }
        if update.price.is_some() {
            self.price = update.price;
        }
        if let Some(size) = update.size {
            self.size = size;
        }
        if let Some(reason) = non_blank(update.reason) {
            self.reason = reason;
        }
        if let Some(img) = update.img {
            self.img = img;
        }
    }

    /// Price as shown in messages, e.g. `"5만원"`; empty when unpriced.
    pub fn price_label(&self) -> String {
        self.price.map(|p| format!("{p}만원")).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemUpdate {
    pub workshop: Option<Uuid>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub cost: Option<u32>,
    pub price: Option<u32>,
    pub size: Option<Vec<String>>,
    pub reason: Option<String>,
    pub img: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub content: String,
    pub img: String,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn new(user_id: Uuid, item_id: Uuid, content: String, img: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            item_id,
            content,
            img,
            created_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, update: ReviewUpdate) {
        if let Some(content) = non_blank(update.content) {
            self.content = content;
        }
        if let Some(img) = non_blank(update.img) {
            self.img = img;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewUpdate {
    pub content: Option<String>,
    pub img: Option<String>,
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

/// Strip dashes and surrounding whitespace: `"010-1111-2222 "` → `"01011112222"`.
pub fn normalize_phone(phone: &str) -> String {
    phone.replace('-', "").trim().to_string()
}

/// Normalise and validate a phone number (9–11 digits).
pub fn validate_phone(phone: &str) -> Result<String> {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    let re = PHONE.get_or_init(|| Regex::new(r"^\d{9,11}$").expect("static regex"));
    let normalized = normalize_phone(phone);
    if re.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(WoodlinkError::Validation(format!(
            "invalid phone number '{phone}'"
        )))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Return the trimmed value or a validation error naming the missing field.
pub fn require(field: &str, value: Option<&str>) -> Result<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(WoodlinkError::Validation(format!("{field} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_phone_strips_dashes_and_spaces() {
        assert_eq!(normalize_phone(" 010-1111-2222 "), "01011112222");
    }

    #[test]
    fn validate_phone_rejects_letters() {
        assert!(validate_phone("010-abcd-2222").is_err());
        assert_eq!(validate_phone("010-1111-2222").unwrap(), "01011112222");
    }

    #[test]
    fn require_rejects_blank_values() {
        assert!(matches!(
            require("name", Some("   ")),
            Err(WoodlinkError::Validation(_))
        ));
        assert!(require("name", None).is_err());
        assert_eq!(require("name", Some(" Kim ")).unwrap(), "Kim");
    }

    #[test]
    fn user_update_keeps_blank_fields_and_stamps_deletion_once() {
        let mut user = User::new("Kim", "010-1111-2222", "Seoul");
        user.apply(UserUpdate {
            name: Some("  ".into()),
            address: Some("Busan".into()),
            deleted: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(user.name, "Kim");
        assert_eq!(user.address, "Busan");
        let deleted_at = user.deleted_at.unwrap();

        user.apply(UserUpdate {
            deleted: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(user.deleted_at, Some(deleted_at));
    }

    #[test]
    fn user_update_rejects_bad_phone() {
        let mut user = User::new("Kim", "010-1111-2222", "Seoul");
        let err = user
            .apply(UserUpdate {
                phone: Some("not-a-phone".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, WoodlinkError::Validation(_)));
        assert_eq!(user.phone, "01011112222");
    }

    #[test]
    fn price_label_is_empty_without_price() {
        let mut item = Item::from_new(NewItem {
            workshop: Uuid::new_v4(),
            name: "oak desk".into(),
            category: "desk".into(),
            cost: 10,
            price: None,
            size: vec!["120x60".into()],
            reason: "scratched top".into(),
            img: vec![],
        });
        assert_eq!(item.status, ItemStatus::Available);
        assert_eq!(item.price_label(), "");
        item.price = Some(5);
        assert_eq!(item.price_label(), "5만원");
    }
}
