use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ClaimStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Submitted,
    Accepted,
    Cancelled,
}

impl ClaimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::Accepted => "accepted",
            ClaimStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = crate::error::WoodlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(ClaimStatus::Submitted),
            "accepted" => Ok(ClaimStatus::Accepted),
            "cancelled" => Ok(ClaimStatus::Cancelled),
            _ => Err(crate::error::WoodlinkError::Validation(format!(
                "unknown claim status '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ItemStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Available,
    Claimed,
}

impl ItemStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Claimed => "claimed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Initiator
// ---------------------------------------------------------------------------

/// Who asked for a cancellation. Embedded in the workshop's notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initiator {
    #[default]
    Customer,
    Workshop,
}

impl Initiator {
    pub fn as_str(self) -> &'static str {
        match self {
            Initiator::Customer => "customer",
            Initiator::Workshop => "workshop",
        }
    }

    /// Label shown to the workshop in the cancellation message.
    pub fn label(self) -> &'static str {
        match self {
            Initiator::Customer => "고객",
            Initiator::Workshop => "공방",
        }
    }
}

impl fmt::Display for Initiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Initiator {
    type Err = crate::error::WoodlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Initiator::Customer),
            "workshop" => Ok(Initiator::Workshop),
            _ => Err(crate::error::WoodlinkError::Validation(format!(
                "unknown initiator '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateKind
// ---------------------------------------------------------------------------

/// The closed set of message templates the coordinator sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    ClaimSubmitted,
    ActionNeeded,
    ClaimAccepted,
    ReadyForDelivery,
    DeliveryChanged,
    ClaimCancelled,
}

impl TemplateKind {
    pub fn all() -> &'static [TemplateKind] {
        &[
            TemplateKind::ClaimSubmitted,
            TemplateKind::ActionNeeded,
            TemplateKind::ClaimAccepted,
            TemplateKind::ReadyForDelivery,
            TemplateKind::DeliveryChanged,
            TemplateKind::ClaimCancelled,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateKind::ClaimSubmitted => "claim_submitted",
            TemplateKind::ActionNeeded => "action_needed",
            TemplateKind::ClaimAccepted => "claim_accepted",
            TemplateKind::ReadyForDelivery => "ready_for_delivery",
            TemplateKind::DeliveryChanged => "delivery_changed",
            TemplateKind::ClaimCancelled => "claim_cancelled",
        }
    }

    /// Environment variable holding the provider template id.
    pub fn env_key(self) -> &'static str {
        match self {
            TemplateKind::ClaimSubmitted => "SOLAPI_APPLY_USER",
            TemplateKind::ActionNeeded => "SOLAPI_APPLY_WORKSHOP",
            TemplateKind::ClaimAccepted => "SOLAPI_APPLY_ACCEPTED",
            TemplateKind::ReadyForDelivery => "SOLAPI_APPLY_DELIVERED",
            TemplateKind::DeliveryChanged => "SOLAPI_APPLY_CHANGED",
            TemplateKind::ClaimCancelled => "SOLAPI_APPLY_CANCEL",
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_status_round_trips_through_str() {
        for s in [
            ClaimStatus::Submitted,
            ClaimStatus::Accepted,
            ClaimStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<ClaimStatus>().unwrap(), s);
        }
        assert!("접수됨".parse::<ClaimStatus>().is_err());
    }

    #[test]
    fn initiator_defaults_to_customer() {
        assert_eq!(Initiator::default(), Initiator::Customer);
        assert_eq!("workshop".parse::<Initiator>().unwrap().label(), "공방");
    }

    #[test]
    fn template_env_keys_are_distinct() {
        let mut keys: Vec<_> = TemplateKind::all().iter().map(|t| t.env_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), TemplateKind::all().len());
    }
}
