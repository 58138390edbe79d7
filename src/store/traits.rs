//! Backend-agnostic `LeadStore` trait.
//!
//! Every worker process talks to one shared relational store through this
//! interface; no correctness property depends on in-process memory
//! surviving between calls.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::model::{
    Channel, FollowupCampaign, Grade, Interaction, Lead, LeadStatus, Property,
    PropertyMatchRecord,
};

/// Filters for ad-hoc campaign targeting. Unset filters match everything.
#[derive(Debug, Clone, Default)]
pub struct CampaignTargetFilter {
    pub status: Option<LeadStatus>,
    pub min_score: Option<u8>,
    pub source_channel: Option<Channel>,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Leads ───────────────────────────────────────────────────────

    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError>;

    /// Persist the full lead row. Callers recompute score/grade first.
    async fn update_lead(&self, lead: &Lead) -> Result<(), DatabaseError>;

    /// Fetch by id; `DatabaseError::NotFound` when absent.
    async fn get_lead(&self, id: Uuid) -> Result<Lead, DatabaseError>;

    async fn find_by_profile_url(
        &self,
        tenant_id: &str,
        url: &str,
    ) -> Result<Option<Lead>, DatabaseError>;

    async fn find_by_channel_identity(
        &self,
        tenant_id: &str,
        channel: Channel,
        user_id: &str,
    ) -> Result<Option<Lead>, DatabaseError>;

    async fn find_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<Lead>, DatabaseError>;

    async fn list_leads(&self, tenant_id: &str) -> Result<Vec<Lead>, DatabaseError>;

    /// Leads matching a campaign's conjunctive filters.
    async fn list_campaign_targets(
        &self,
        tenant_id: &str,
        filter: &CampaignTargetFilter,
    ) -> Result<Vec<Lead>, DatabaseError>;

    // ── Follow-up pipeline ──────────────────────────────────────────

    /// Atomically claim up to `batch` due, open, under-cap leads for this
    /// worker. Rows claimed by another live worker are skipped silently;
    /// claims older than `claim_ttl` count as abandoned and are retaken.
    async fn claim_due_leads(
        &self,
        now: DateTime<Utc>,
        batch: usize,
        worker: &str,
        claim_ttl: Duration,
        max_followups: u32,
    ) -> Result<Vec<Lead>, DatabaseError>;

    /// Record a successful follow-up touch and release the claim. The new
    /// due timestamp is only written if the lead is still in the pipeline —
    /// a concurrent clear of `next_followup_at` is respected.
    #[allow(clippy::too_many_arguments)]
    async fn complete_followup(
        &self,
        lead_id: Uuid,
        new_count: u32,
        next_due: Option<DateTime<Utc>>,
        contacted_at: DateTime<Utc>,
        score: u8,
        grade: Grade,
    ) -> Result<(), DatabaseError>;

    /// Release a claim without advancing anything (failed delivery).
    async fn release_claim(&self, lead_id: Uuid) -> Result<(), DatabaseError>;

    /// Remove a lead from the automated pipeline. In-flight claims still
    /// complete but will not reschedule.
    async fn clear_followup(&self, lead_id: Uuid) -> Result<(), DatabaseError>;

    // ── Interactions ────────────────────────────────────────────────

    /// Append to the immutable interaction log.
    async fn log_interaction(&self, interaction: &Interaction) -> Result<(), DatabaseError>;

    async fn list_interactions(&self, lead_id: Uuid) -> Result<Vec<Interaction>, DatabaseError>;

    // ── Properties ──────────────────────────────────────────────────

    async fn insert_property(&self, property: &Property) -> Result<(), DatabaseError>;

    async fn get_property(&self, id: Uuid) -> Result<Property, DatabaseError>;

    async fn list_properties(&self, tenant_id: &str) -> Result<Vec<Property>, DatabaseError>;

    // ── Match records ───────────────────────────────────────────────

    /// Insert a match record under the unique (property, lead) constraint.
    /// Returns false when the pair already exists — the caller must not
    /// deliver in that case.
    async fn try_record_match(
        &self,
        record: &PropertyMatchRecord,
    ) -> Result<bool, DatabaseError>;

    async fn mark_match_notified(
        &self,
        property_id: Uuid,
        lead_id: Uuid,
    ) -> Result<(), DatabaseError>;

    // ── Campaigns ───────────────────────────────────────────────────

    async fn insert_campaign(&self, campaign: &FollowupCampaign) -> Result<(), DatabaseError>;

    async fn list_campaigns(&self, tenant_id: &str) -> Result<Vec<FollowupCampaign>, DatabaseError>;
}
