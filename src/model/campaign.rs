//! Declarative bulk follow-up campaigns.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lead::{Channel, Language, LeadStatus};

/// A bulk-targeting rule the scheduler runs ad hoc, in addition to the
/// default per-lead cadence. Filters are conjunctive; unset filters match
/// everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupCampaign {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub enabled: bool,
    pub status_filter: Option<LeadStatus>,
    pub min_score: Option<u8>,
    pub source_channel: Option<Channel>,
    /// Message body per language; falls back to English when a lead's
    /// language has no entry.
    pub body: BTreeMap<Language, String>,
    /// Channels the campaign may deliver on.
    pub channels: Vec<Channel>,
    /// Optional cron expression for recurring runs (parsed by the caller).
    pub schedule: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FollowupCampaign {
    pub fn new(tenant_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            name: name.into(),
            enabled: true,
            status_filter: None,
            min_score: None,
            source_channel: None,
            body: BTreeMap::new(),
            channels: Vec::new(),
            schedule: None,
            created_at: Utc::now(),
        }
    }

    /// Campaign text for a lead's language, falling back to English.
    pub fn body_for(&self, language: Language) -> Option<&str> {
        self.body
            .get(&language)
            .or_else(|| self.body.get(&Language::En))
            .map(String::as_str)
    }
}
