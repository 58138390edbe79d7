//! The Lead record — one prospect, unique per tenant.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::state::{FunnelState, Slot};

/// Messaging channel a lead can be reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Telegram,
    Instagram,
    Webchat,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Whatsapp => "whatsapp",
            Self::Telegram => "telegram",
            Self::Instagram => "instagram",
            Self::Webchat => "webchat",
        };
        write!(f, "{s}")
    }
}

/// Pipeline status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    Open,
    Won,
    Lost,
    Nurturing,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Nurturing => "nurturing",
        };
        write!(f, "{s}")
    }
}

/// Letter grade summarizing a lead's 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        };
        write!(f, "{s}")
    }
}

/// Buy vs rent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Buy,
    Rent,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Buy => "buy",
            Self::Rent => "rent",
        };
        write!(f, "{s}")
    }
}

/// Kind of property the lead is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    Villa,
    Townhouse,
    Office,
    Land,
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Apartment => "apartment",
            Self::Villa => "villa",
            Self::Townhouse => "townhouse",
            Self::Office => "office",
            Self::Land => "land",
        };
        write!(f, "{s}")
    }
}

/// Why the lead is in the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    Investment,
    Residence,
}

/// How the lead prefers to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPreference {
    Cash,
    Mortgage,
    Installments,
}

/// Conversation language, selected once at funnel entry and stored on the
/// lead. Switching mid-funnel is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    En,
    Ar,
    Fr,
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::En => "en",
            Self::Ar => "ar",
            Self::Fr => "fr",
        };
        write!(f, "{s}")
    }
}

/// One prospect. Identity keys are unique per tenant; score and grade are
/// derived from the other fields and never hand-edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub tenant_id: String,
    pub display_name: Option<String>,

    // Identity keys — at most one per channel kind, unique within tenant.
    pub profile_url: Option<String>,
    pub channel: Option<Channel>,
    pub channel_user_id: Option<String>,
    pub phone: Option<String>,

    // Qualification.
    pub transaction_type: Option<TransactionType>,
    pub property_type: Option<PropertyType>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub bedrooms_min: Option<u8>,
    pub bedrooms_max: Option<u8>,
    /// Preferred locations; ordering is irrelevant.
    pub locations: Vec<String>,
    pub purpose: Option<Purpose>,
    pub payment_preference: Option<PaymentPreference>,

    // Conversation.
    pub funnel_state: FunnelState,
    pub pending_slot: Option<Slot>,
    pub filled_slots: BTreeMap<Slot, bool>,
    pub language: Language,
    /// Free-form scratch data the funnel may stash between turns.
    pub transient_data: serde_json::Value,

    // Engagement.
    pub messages_sent: u32,
    pub messages_received: u32,
    pub last_active_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,

    // Follow-up pipeline. `next_followup_at == None` means "not in pipeline".
    pub next_followup_at: Option<DateTime<Utc>>,
    pub followup_count: u32,
    pub status: LeadStatus,

    // Derived.
    pub score: u8,
    pub grade: Grade,

    // Match bookkeeping.
    pub matched_property_ids: Vec<Uuid>,
    pub viewed_property_ids: Vec<Uuid>,
    pub favorited_property_ids: Vec<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Fresh lead for a tenant, at the top of the funnel, outside the
    /// follow-up pipeline.
    pub fn new(tenant_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            display_name: None,
            profile_url: None,
            channel: None,
            channel_user_id: None,
            phone: None,
            transaction_type: None,
            property_type: None,
            budget_min: None,
            budget_max: None,
            bedrooms_min: None,
            bedrooms_max: None,
            locations: Vec::new(),
            purpose: None,
            payment_preference: None,
            funnel_state: FunnelState::default(),
            pending_slot: None,
            filled_slots: BTreeMap::new(),
            language: Language::default(),
            transient_data: serde_json::json!({}),
            messages_sent: 0,
            messages_received: 0,
            last_active_at: None,
            last_contacted_at: None,
            next_followup_at: None,
            followup_count: 0,
            status: LeadStatus::Open,
            score: 0,
            grade: Grade::D,
            matched_property_ids: Vec::new(),
            viewed_property_ids: Vec::new(),
            favorited_property_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any outbound channel can reach this lead.
    ///
    /// Webchat user ids are transient session ids, not durable identities,
    /// so they do not count.
    pub fn has_channel_identity(&self) -> bool {
        if self.phone.is_some() {
            return true;
        }
        match self.channel {
            Some(Channel::Webchat) | None => false,
            Some(_) => self.channel_user_id.is_some(),
        }
    }

    /// Whether a qualification slot has been filled.
    pub fn slot_filled(&self, slot: Slot) -> bool {
        self.filled_slots.get(&slot).copied().unwrap_or(false)
    }

    /// The channel to deliver follow-ups on, if any.
    pub fn reachable_channel(&self) -> Option<Channel> {
        match (self.channel, &self.channel_user_id) {
            (Some(c), Some(_)) if c != Channel::Webchat => Some(c),
            _ => self.phone.as_ref().map(|_| Channel::Whatsapp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serde() {
        let channels = [
            Channel::Whatsapp,
            Channel::Telegram,
            Channel::Instagram,
            Channel::Webchat,
        ];
        for c in channels {
            assert_eq!(format!("\"{c}\""), serde_json::to_string(&c).unwrap());
        }
        let statuses = [
            LeadStatus::Open,
            LeadStatus::Won,
            LeadStatus::Lost,
            LeadStatus::Nurturing,
        ];
        for s in statuses {
            assert_eq!(format!("\"{s}\""), serde_json::to_string(&s).unwrap());
        }
        let langs = [Language::En, Language::Ar, Language::Fr];
        for l in langs {
            assert_eq!(format!("\"{l}\""), serde_json::to_string(&l).unwrap());
        }
    }

    #[test]
    fn new_lead_is_outside_pipeline() {
        let lead = Lead::new("tenant-1");
        assert!(lead.next_followup_at.is_none());
        assert_eq!(lead.followup_count, 0);
        assert_eq!(lead.status, LeadStatus::Open);
        assert!(!lead.has_channel_identity());
    }

    #[test]
    fn channel_identity_requires_id_or_phone() {
        let mut lead = Lead::new("t");
        lead.channel = Some(Channel::Telegram);
        // Channel without a user id is not reachable.
        assert!(!lead.has_channel_identity());
        lead.channel_user_id = Some("12345".into());
        assert!(lead.has_channel_identity());
        assert_eq!(lead.reachable_channel(), Some(Channel::Telegram));

        let mut phone_only = Lead::new("t");
        phone_only.phone = Some("+97150000000".into());
        assert!(phone_only.has_channel_identity());
        assert_eq!(phone_only.reachable_channel(), Some(Channel::Whatsapp));
    }

    #[test]
    fn webchat_session_id_is_not_an_identity() {
        let mut lead = Lead::new("t");
        lead.channel = Some(Channel::Webchat);
        lead.channel_user_id = Some("session-abc".into());
        assert!(!lead.has_channel_identity());
        assert!(lead.reachable_channel().is_none());
    }
}
