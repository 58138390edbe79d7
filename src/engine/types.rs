//! Inbound envelope, field updates, and the advance result.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::state::{FunnelState, Slot};
use crate::model::{
    Channel, Language, Lead, LeadStatus, PropertyType, Purpose, TransactionType,
};
use crate::outbound::OutboundRequest;

/// Normalized inbound message, produced by out-of-scope channel adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub channel: Channel,
    /// Channel-native user id (chat id, wa id, session id for webchat).
    pub external_user_id: String,
    pub display_name: Option<String>,
    pub text: Option<String>,
    /// Id of a tapped button/list option, if the adapter captured one.
    pub structured_choice_id: Option<String>,
    /// Opaque reference to attached media; the engine ignores content.
    pub media_ref: Option<String>,
}

impl InboundEnvelope {
    /// The body as logged in the interaction history.
    pub fn logged_body(&self) -> String {
        if let Some(id) = &self.structured_choice_id {
            format!("[choice:{id}]")
        } else {
            self.text.clone().unwrap_or_default()
        }
    }
}

/// Field updates requested by one `advance` call. Only the set fields are
/// written; slot bookkeeping is explicit so interrupts can leave it alone.
#[derive(Debug, Clone, Default)]
pub struct LeadPatch {
    pub display_name: Option<String>,
    pub language: Option<Language>,
    pub purpose: Option<Purpose>,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub property_type: Option<PropertyType>,
    pub transaction_type: Option<TransactionType>,
    pub phone: Option<String>,
    pub status: Option<LeadStatus>,
    /// Slots newly answered this turn.
    pub fill_slots: Vec<Slot>,
    /// `Some(x)` overwrites the pending slot with `x`; `None` leaves it.
    pub pending_slot: Option<Option<Slot>>,
    /// Schedule the next automated follow-up after this turn.
    pub keep_in_pipeline: bool,
    /// Remove the lead from the follow-up pipeline.
    pub leave_pipeline: bool,
}

/// Result of advancing the funnel by one inbound envelope.
#[derive(Debug)]
pub struct Advance {
    /// Messages to send back, in order.
    pub replies: Vec<OutboundRequest>,
    pub next_state: FunnelState,
    pub field_updates: LeadPatch,
    /// Non-message requests (reports, operator pings, contact share).
    pub side_effects: Vec<OutboundRequest>,
}

impl Advance {
    /// Apply this result to a lead record. Engagement counters, timestamps,
    /// follow-up scheduling, and the derived score are all refreshed here so
    /// callers persist a consistent row in one write.
    pub fn apply(&self, lead: &mut Lead, now: DateTime<Utc>, followup_interval: std::time::Duration) {
        let p = &self.field_updates;
        if let Some(name) = &p.display_name {
            lead.display_name = Some(name.clone());
        }
        if let Some(lang) = p.language {
            lead.language = lang;
        }
        if let Some(purpose) = p.purpose {
            lead.purpose = Some(purpose);
        }
        if let Some(min) = p.budget_min {
            lead.budget_min = Some(min);
        }
        if let Some(max) = p.budget_max {
            lead.budget_max = Some(max);
        }
        if let Some(pt) = p.property_type {
            lead.property_type = Some(pt);
        }
        if let Some(tx) = p.transaction_type {
            lead.transaction_type = Some(tx);
        }
        if let Some(phone) = &p.phone {
            lead.phone = Some(phone.clone());
        }
        if let Some(status) = p.status {
            lead.status = status;
        }
        for slot in &p.fill_slots {
            lead.filled_slots.insert(*slot, true);
        }
        if let Some(pending) = p.pending_slot {
            lead.pending_slot = pending;
        }

        lead.funnel_state = self.next_state;
        lead.messages_received += 1;
        let sent = self
            .replies
            .iter()
            .filter(|r| r.body_text().is_some())
            .count() as u32;
        lead.messages_sent += sent;
        lead.last_active_at = Some(now);
        if sent > 0 {
            lead.last_contacted_at = Some(now);
        }

        if p.leave_pipeline {
            lead.next_followup_at = None;
        } else if p.keep_in_pipeline && lead.status == LeadStatus::Open {
            let interval = ChronoDuration::from_std(followup_interval)
                .unwrap_or_else(|_| ChronoDuration::days(3));
            lead.next_followup_at = Some(now + interval);
        }

        lead.updated_at = now;
        crate::scoring::refresh_score(lead);
    }
}
