//! libSQL backend — async `LeadStore` implementation.
//!
//! Supports local file and in-memory databases. All enum values cross the
//! boundary through one canonical string mapping (the same strings serde
//! uses); timestamps are RFC 3339 text.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::engine::state::{FunnelState, Slot};
use crate::error::DatabaseError;
use crate::model::{
    Channel, Direction, FollowupCampaign, Grade, Interaction, Language, Lead, LeadStatus,
    PaymentPreference, Property, PropertyMatchRecord, PropertyType, Purpose, TransactionType,
};
use crate::store::migrations;
use crate::store::traits::{CampaignTargetFilter, LeadStore};

/// libSQL lead store.
///
/// Holds a single connection reused for all operations; `libsql::Connection`
/// is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Connection(format!("Failed to create database directory: {e}"))
            })?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to connect: {e}")))?;
        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        info!(path = %path.display(), "Lead store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("Failed to create memory db: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(format!("Failed to connect: {e}")))?;
        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn find_lead_where(
        &self,
        clause: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<Lead>, DatabaseError> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE {clause} LIMIT 1");
        let mut rows = self
            .conn
            .query(&sql, params)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        match rows.next().await.map_err(|e| DatabaseError::Query(e.to_string()))? {
            Some(row) => Ok(Some(row_to_lead(&row)?)),
            None => Ok(None),
        }
    }

    async fn collect_leads(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Lead>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let mut leads = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| DatabaseError::Query(e.to_string()))? {
            leads.push(row_to_lead(&row)?);
        }
        Ok(leads)
    }
}

// ── Boundary helpers ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_dt(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().map(parse_datetime)
}

fn dt_str(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn opt_dt_str(dt: &Option<DateTime<Utc>>) -> Option<String> {
    dt.as_ref().map(dt_str)
}

fn opt_decimal(s: &Option<String>) -> Option<Decimal> {
    s.as_deref().and_then(|v| Decimal::from_str(v).ok())
}

/// Parse a serde-canonical enum string via its JSON form. Unknown strings
/// become `None` rather than failing the whole row.
fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
}

fn json_or_default<T: serde::de::DeserializeOwned + Default>(s: &str) -> T {
    serde_json::from_str(s).unwrap_or_default()
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

const LEAD_COLUMNS: &str = "id, tenant_id, display_name, profile_url, channel, channel_user_id, \
     phone, transaction_type, property_type, budget_min, budget_max, bedrooms_min, bedrooms_max, \
     locations, purpose, payment_preference, funnel_state, pending_slot, filled_slots, language, \
     transient_data, messages_sent, messages_received, last_active_at, last_contacted_at, \
     next_followup_at, followup_count, status, score, grade, matched_property_ids, \
     viewed_property_ids, favorited_property_ids, created_at, updated_at";

/// Map a row (in `LEAD_COLUMNS` order) to a Lead.
fn row_to_lead(row: &libsql::Row) -> Result<Lead, DatabaseError> {
    let get_s = |i: i32| -> Result<String, DatabaseError> {
        row.get::<String>(i).map_err(|e| DatabaseError::Query(e.to_string()))
    };
    let get_os = |i: i32| -> Result<Option<String>, DatabaseError> {
        row.get::<Option<String>>(i)
            .map_err(|e| DatabaseError::Query(e.to_string()))
    };
    let get_i = |i: i32| -> Result<i64, DatabaseError> {
        row.get::<i64>(i).map_err(|e| DatabaseError::Query(e.to_string()))
    };
    let get_oi = |i: i32| -> Result<Option<i64>, DatabaseError> {
        row.get::<Option<i64>>(i)
            .map_err(|e| DatabaseError::Query(e.to_string()))
    };

    let filled_slots: BTreeMap<Slot, bool> = json_or_default(&get_s(18)?);
    Ok(Lead {
        id: Uuid::parse_str(&get_s(0)?).unwrap_or_else(|_| Uuid::nil()),
        tenant_id: get_s(1)?,
        display_name: get_os(2)?,
        profile_url: get_os(3)?,
        channel: get_os(4)?.as_deref().and_then(parse_enum::<Channel>),
        channel_user_id: get_os(5)?,
        phone: get_os(6)?,
        transaction_type: get_os(7)?.as_deref().and_then(parse_enum::<TransactionType>),
        property_type: get_os(8)?.as_deref().and_then(parse_enum::<PropertyType>),
        budget_min: opt_decimal(&get_os(9)?),
        budget_max: opt_decimal(&get_os(10)?),
        bedrooms_min: get_oi(11)?.map(|v| v as u8),
        bedrooms_max: get_oi(12)?.map(|v| v as u8),
        locations: json_or_default(&get_s(13)?),
        purpose: get_os(14)?.as_deref().and_then(parse_enum::<Purpose>),
        payment_preference: get_os(15)?
            .as_deref()
            .and_then(parse_enum::<PaymentPreference>),
        funnel_state: parse_enum::<FunnelState>(&get_s(16)?).unwrap_or_default(),
        pending_slot: get_os(17)?.as_deref().and_then(parse_enum::<Slot>),
        filled_slots,
        language: parse_enum::<Language>(&get_s(19)?).unwrap_or_default(),
        transient_data: serde_json::from_str(&get_s(20)?).unwrap_or_else(|_| serde_json::json!({})),
        messages_sent: get_i(21)? as u32,
        messages_received: get_i(22)? as u32,
        last_active_at: opt_dt(&get_os(23)?),
        last_contacted_at: opt_dt(&get_os(24)?),
        next_followup_at: opt_dt(&get_os(25)?),
        followup_count: get_i(26)? as u32,
        status: parse_enum::<LeadStatus>(&get_s(27)?).unwrap_or_default(),
        score: get_i(28)? as u8,
        grade: parse_enum::<Grade>(&get_s(29)?).unwrap_or(Grade::D),
        matched_property_ids: json_or_default(&get_s(30)?),
        viewed_property_ids: json_or_default(&get_s(31)?),
        favorited_property_ids: json_or_default(&get_s(32)?),
        created_at: parse_datetime(&get_s(33)?),
        updated_at: parse_datetime(&get_s(34)?),
    })
}

/// Enum → canonical string (identical to the serde form).
fn enum_str<T: std::fmt::Display>(v: &Option<T>) -> Option<String> {
    v.as_ref().map(|x| x.to_string())
}

fn row_to_interaction(row: &libsql::Row) -> Result<Interaction, DatabaseError> {
    let q = |e: libsql::Error| DatabaseError::Query(e.to_string());
    Ok(Interaction {
        id: Uuid::parse_str(&row.get::<String>(0).map_err(q)?).unwrap_or_else(|_| Uuid::nil()),
        lead_id: Uuid::parse_str(&row.get::<String>(1).map_err(q)?).unwrap_or_else(|_| Uuid::nil()),
        channel: parse_enum::<Channel>(&row.get::<String>(2).map_err(q)?)
            .unwrap_or(Channel::Webchat),
        direction: parse_enum::<Direction>(&row.get::<String>(3).map_err(q)?)
            .unwrap_or(Direction::Inbound),
        body: row.get::<String>(4).map_err(q)?,
        automated: row.get::<i64>(5).map_err(q)? != 0,
        delivered: row.get::<i64>(6).map_err(q)? != 0,
        created_at: parse_datetime(&row.get::<String>(7).map_err(q)?),
    })
}

fn row_to_property(row: &libsql::Row) -> Result<Property, DatabaseError> {
    let q = |e: libsql::Error| DatabaseError::Query(e.to_string());
    Ok(Property {
        id: Uuid::parse_str(&row.get::<String>(0).map_err(q)?).unwrap_or_else(|_| Uuid::nil()),
        tenant_id: row.get::<String>(1).map_err(q)?,
        title: row.get::<String>(2).map_err(q)?,
        price: opt_decimal(&row.get::<Option<String>>(3).map_err(q)?),
        property_type: row
            .get::<Option<String>>(4)
            .map_err(q)?
            .as_deref()
            .and_then(parse_enum::<PropertyType>),
        transaction_type: row
            .get::<Option<String>>(5)
            .map_err(q)?
            .as_deref()
            .and_then(parse_enum::<TransactionType>),
        location: row.get::<Option<String>>(6).map_err(q)?,
        bedrooms: row.get::<Option<i64>>(7).map_err(q)?.map(|v| v as u8),
        created_at: parse_datetime(&row.get::<String>(8).map_err(q)?),
    })
}

fn row_to_campaign(row: &libsql::Row) -> Result<FollowupCampaign, DatabaseError> {
    let q = |e: libsql::Error| DatabaseError::Query(e.to_string());
    Ok(FollowupCampaign {
        id: Uuid::parse_str(&row.get::<String>(0).map_err(q)?).unwrap_or_else(|_| Uuid::nil()),
        tenant_id: row.get::<String>(1).map_err(q)?,
        name: row.get::<String>(2).map_err(q)?,
        enabled: row.get::<i64>(3).map_err(q)? != 0,
        status_filter: row
            .get::<Option<String>>(4)
            .map_err(q)?
            .as_deref()
            .and_then(parse_enum::<LeadStatus>),
        min_score: row.get::<Option<i64>>(5).map_err(q)?.map(|v| v as u8),
        source_channel: row
            .get::<Option<String>>(6)
            .map_err(q)?
            .as_deref()
            .and_then(parse_enum::<Channel>),
        body: json_or_default(&row.get::<String>(7).map_err(q)?),
        channels: json_or_default(&row.get::<String>(8).map_err(q)?),
        schedule: row.get::<Option<String>>(9).map_err(q)?,
        created_at: parse_datetime(&row.get::<String>(10).map_err(q)?),
    })
}

#[async_trait]
impl LeadStore for LibSqlStore {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run(&self.conn).await
    }

    async fn insert_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO leads (id, tenant_id, display_name, profile_url, channel, \
                 channel_user_id, phone, transaction_type, property_type, budget_min, budget_max, \
                 bedrooms_min, bedrooms_max, locations, purpose, payment_preference, funnel_state, \
                 pending_slot, filled_slots, language, transient_data, messages_sent, \
                 messages_received, last_active_at, last_contacted_at, next_followup_at, \
                 followup_count, status, score, grade, matched_property_ids, viewed_property_ids, \
                 favorited_property_ids, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, \
                 ?33, ?34, ?35)",
                params![
                    lead.id.to_string(),
                    lead.tenant_id.clone(),
                    lead.display_name.clone(),
                    lead.profile_url.clone(),
                    enum_str(&lead.channel),
                    lead.channel_user_id.clone(),
                    lead.phone.clone(),
                    enum_str(&lead.transaction_type),
                    enum_str(&lead.property_type),
                    lead.budget_min.map(|d| d.to_string()),
                    lead.budget_max.map(|d| d.to_string()),
                    lead.bedrooms_min.map(|v| v as i64),
                    lead.bedrooms_max.map(|v| v as i64),
                    to_json(&lead.locations)?,
                    lead.purpose.map(|p| serde_variant_name(&p)).transpose()?,
                    lead.payment_preference
                        .map(|p| serde_variant_name(&p))
                        .transpose()?,
                    lead.funnel_state.to_string(),
                    enum_str(&lead.pending_slot),
                    to_json(&lead.filled_slots)?,
                    lead.language.to_string(),
                    to_json(&lead.transient_data)?,
                    lead.messages_sent as i64,
                    lead.messages_received as i64,
                    opt_dt_str(&lead.last_active_at),
                    opt_dt_str(&lead.last_contacted_at),
                    opt_dt_str(&lead.next_followup_at),
                    lead.followup_count as i64,
                    lead.status.to_string(),
                    lead.score as i64,
                    lead.grade.to_string(),
                    to_json(&lead.matched_property_ids)?,
                    to_json(&lead.viewed_property_ids)?,
                    to_json(&lead.favorited_property_ids)?,
                    dt_str(&lead.created_at),
                    dt_str(&lead.updated_at),
                ],
            )
            .await
            .map_err(map_constraint)?;
        Ok(())
    }

    async fn update_lead(&self, lead: &Lead) -> Result<(), DatabaseError> {
        let n = self
            .conn
            .execute(
                "UPDATE leads SET display_name = ?2, profile_url = ?3, channel = ?4, \
                 channel_user_id = ?5, phone = ?6, transaction_type = ?7, property_type = ?8, \
                 budget_min = ?9, budget_max = ?10, bedrooms_min = ?11, bedrooms_max = ?12, \
                 locations = ?13, purpose = ?14, payment_preference = ?15, funnel_state = ?16, \
                 pending_slot = ?17, filled_slots = ?18, language = ?19, transient_data = ?20, \
                 messages_sent = ?21, messages_received = ?22, last_active_at = ?23, \
                 last_contacted_at = ?24, next_followup_at = ?25, followup_count = ?26, \
                 status = ?27, score = ?28, grade = ?29, matched_property_ids = ?30, \
                 viewed_property_ids = ?31, favorited_property_ids = ?32, updated_at = ?33 \
                 WHERE id = ?1",
                params![
                    lead.id.to_string(),
                    lead.display_name.clone(),
                    lead.profile_url.clone(),
                    enum_str(&lead.channel),
                    lead.channel_user_id.clone(),
                    lead.phone.clone(),
                    enum_str(&lead.transaction_type),
                    enum_str(&lead.property_type),
                    lead.budget_min.map(|d| d.to_string()),
                    lead.budget_max.map(|d| d.to_string()),
                    lead.bedrooms_min.map(|v| v as i64),
                    lead.bedrooms_max.map(|v| v as i64),
                    to_json(&lead.locations)?,
                    lead.purpose.map(|p| serde_variant_name(&p)).transpose()?,
                    lead.payment_preference
                        .map(|p| serde_variant_name(&p))
                        .transpose()?,
                    lead.funnel_state.to_string(),
                    enum_str(&lead.pending_slot),
                    to_json(&lead.filled_slots)?,
                    lead.language.to_string(),
                    to_json(&lead.transient_data)?,
                    lead.messages_sent as i64,
                    lead.messages_received as i64,
                    opt_dt_str(&lead.last_active_at),
                    opt_dt_str(&lead.last_contacted_at),
                    opt_dt_str(&lead.next_followup_at),
                    lead.followup_count as i64,
                    lead.status.to_string(),
                    lead.score as i64,
                    lead.grade.to_string(),
                    to_json(&lead.matched_property_ids)?,
                    to_json(&lead.viewed_property_ids)?,
                    to_json(&lead.favorited_property_ids)?,
                    dt_str(&lead.updated_at),
                ],
            )
            .await
            .map_err(map_constraint)?;
        if n == 0 {
            return Err(DatabaseError::NotFound {
                entity: "lead".into(),
                id: lead.id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_lead(&self, id: Uuid) -> Result<Lead, DatabaseError> {
        self.find_lead_where("id = ?1", params![id.to_string()])
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "lead".into(),
                id: id.to_string(),
            })
    }

    async fn find_by_profile_url(
        &self,
        tenant_id: &str,
        url: &str,
    ) -> Result<Option<Lead>, DatabaseError> {
        self.find_lead_where(
            "tenant_id = ?1 AND profile_url = ?2",
            params![tenant_id, url],
        )
        .await
    }

    async fn find_by_channel_identity(
        &self,
        tenant_id: &str,
        channel: Channel,
        user_id: &str,
    ) -> Result<Option<Lead>, DatabaseError> {
        self.find_lead_where(
            "tenant_id = ?1 AND channel = ?2 AND channel_user_id = ?3",
            params![tenant_id, channel.to_string(), user_id],
        )
        .await
    }

    async fn find_by_phone(
        &self,
        tenant_id: &str,
        phone: &str,
    ) -> Result<Option<Lead>, DatabaseError> {
        self.find_lead_where("tenant_id = ?1 AND phone = ?2", params![tenant_id, phone])
            .await
    }

    async fn list_leads(&self, tenant_id: &str) -> Result<Vec<Lead>, DatabaseError> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE tenant_id = ?1");
        self.collect_leads(&sql, params![tenant_id]).await
    }

    async fn list_campaign_targets(
        &self,
        tenant_id: &str,
        filter: &CampaignTargetFilter,
    ) -> Result<Vec<Lead>, DatabaseError> {
        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE tenant_id = ?1 \
             AND (?2 IS NULL OR status = ?2) \
             AND (?3 IS NULL OR score >= ?3) \
             AND (?4 IS NULL OR channel = ?4)"
        );
        self.collect_leads(
            &sql,
            params![
                tenant_id,
                filter.status.map(|s| s.to_string()),
                filter.min_score.map(|s| s as i64),
                filter.source_channel.map(|c| c.to_string()),
            ],
        )
        .await
    }

    async fn claim_due_leads(
        &self,
        now: DateTime<Utc>,
        batch: usize,
        worker: &str,
        claim_ttl: Duration,
        max_followups: u32,
    ) -> Result<Vec<Lead>, DatabaseError> {
        let stale_cutoff = now - chrono::Duration::from_std(claim_ttl).unwrap_or_default();
        // One atomic statement: rows already claimed by a live worker fall
        // out of the subquery and are skipped without error.
        let sql = format!(
            "UPDATE leads SET claimed_by = ?1, claimed_at = ?2 WHERE id IN ( \
                 SELECT id FROM leads \
                 WHERE next_followup_at IS NOT NULL \
                   AND next_followup_at <= ?2 \
                   AND status = 'open' \
                   AND followup_count < ?3 \
                   AND (claimed_by IS NULL OR claimed_at IS NULL OR claimed_at < ?4) \
                 ORDER BY next_followup_at \
                 LIMIT ?5 \
             ) RETURNING {LEAD_COLUMNS}"
        );
        self.collect_leads(
            &sql,
            params![
                worker,
                dt_str(&now),
                max_followups as i64,
                dt_str(&stale_cutoff),
                batch as i64,
            ],
        )
        .await
    }

    async fn complete_followup(
        &self,
        lead_id: Uuid,
        new_count: u32,
        next_due: Option<DateTime<Utc>>,
        contacted_at: DateTime<Utc>,
        score: u8,
        grade: Grade,
    ) -> Result<(), DatabaseError> {
        // The CASE guard re-reads next_followup_at in the same statement: a
        // concurrent clear leaves NULL in place and the reschedule is lost,
        // which is exactly the contract.
        self.conn
            .execute(
                "UPDATE leads SET followup_count = ?2, \
                 next_followup_at = CASE WHEN next_followup_at IS NULL THEN NULL ELSE ?3 END, \
                 last_contacted_at = ?4, messages_sent = messages_sent + 1, \
                 score = ?5, grade = ?6, claimed_by = NULL, claimed_at = NULL, updated_at = ?4 \
                 WHERE id = ?1",
                params![
                    lead_id.to_string(),
                    new_count as i64,
                    opt_dt_str(&next_due),
                    dt_str(&contacted_at),
                    score as i64,
                    grade.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn release_claim(&self, lead_id: Uuid) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE leads SET claimed_by = NULL, claimed_at = NULL WHERE id = ?1",
                params![lead_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn clear_followup(&self, lead_id: Uuid) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE leads SET next_followup_at = NULL WHERE id = ?1",
                params![lead_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn log_interaction(&self, interaction: &Interaction) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO interactions (id, lead_id, channel, direction, body, automated, \
                 delivered, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    interaction.id.to_string(),
                    interaction.lead_id.to_string(),
                    interaction.channel.to_string(),
                    interaction.direction.to_string(),
                    interaction.body.clone(),
                    interaction.automated as i64,
                    interaction.delivered as i64,
                    dt_str(&interaction.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn list_interactions(&self, lead_id: Uuid) -> Result<Vec<Interaction>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, lead_id, channel, direction, body, automated, delivered, created_at \
                 FROM interactions WHERE lead_id = ?1 ORDER BY created_at",
                params![lead_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| DatabaseError::Query(e.to_string()))? {
            out.push(row_to_interaction(&row)?);
        }
        Ok(out)
    }

    async fn insert_property(&self, property: &Property) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO properties (id, tenant_id, title, price, property_type, \
                 transaction_type, location, bedrooms, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    property.id.to_string(),
                    property.tenant_id.clone(),
                    property.title.clone(),
                    property.price.map(|d| d.to_string()),
                    enum_str(&property.property_type),
                    enum_str(&property.transaction_type),
                    property.location.clone(),
                    property.bedrooms.map(|v| v as i64),
                    dt_str(&property.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn get_property(&self, id: Uuid) -> Result<Property, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, tenant_id, title, price, property_type, transaction_type, location, \
                 bedrooms, created_at FROM properties WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        match rows.next().await.map_err(|e| DatabaseError::Query(e.to_string()))? {
            Some(row) => row_to_property(&row),
            None => Err(DatabaseError::NotFound {
                entity: "property".into(),
                id: id.to_string(),
            }),
        }
    }

    async fn list_properties(&self, tenant_id: &str) -> Result<Vec<Property>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, tenant_id, title, price, property_type, transaction_type, location, \
                 bedrooms, created_at FROM properties WHERE tenant_id = ?1",
                params![tenant_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| DatabaseError::Query(e.to_string()))? {
            out.push(row_to_property(&row)?);
        }
        Ok(out)
    }

    async fn try_record_match(
        &self,
        record: &PropertyMatchRecord,
    ) -> Result<bool, DatabaseError> {
        let n = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO property_matches (property_id, lead_id, score, reason, \
                 notified, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.property_id.to_string(),
                    record.lead_id.to_string(),
                    record.score as i64,
                    record.reason.clone(),
                    record.notified as i64,
                    dt_str(&record.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(n > 0)
    }

    async fn mark_match_notified(
        &self,
        property_id: Uuid,
        lead_id: Uuid,
    ) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE property_matches SET notified = 1 WHERE property_id = ?1 AND lead_id = ?2",
                params![property_id.to_string(), lead_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        Ok(())
    }

    async fn insert_campaign(&self, campaign: &FollowupCampaign) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO campaigns (id, tenant_id, name, enabled, status_filter, min_score, \
                 source_channel, body, channels, schedule, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    campaign.id.to_string(),
                    campaign.tenant_id.clone(),
                    campaign.name.clone(),
                    campaign.enabled as i64,
                    campaign.status_filter.map(|s| s.to_string()),
                    campaign.min_score.map(|s| s as i64),
                    campaign.source_channel.map(|c| c.to_string()),
                    to_json(&campaign.body)?,
                    to_json(&campaign.channels)?,
                    campaign.schedule.clone(),
                    dt_str(&campaign.created_at),
                ],
            )
            .await
            .map_err(map_constraint)?;
        Ok(())
    }

    async fn list_campaigns(&self, tenant_id: &str) -> Result<Vec<FollowupCampaign>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, tenant_id, name, enabled, status_filter, min_score, source_channel, \
                 body, channels, schedule, created_at FROM campaigns \
                 WHERE tenant_id = ?1 AND enabled = 1",
                params![tenant_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| DatabaseError::Query(e.to_string()))? {
            out.push(row_to_campaign(&row)?);
        }
        Ok(out)
    }
}

/// Serialize a unit enum variant to its serde string.
fn serde_variant_name<T: serde::Serialize>(v: &T) -> Result<String, DatabaseError> {
    match serde_json::to_value(v).map_err(|e| DatabaseError::Serialization(e.to_string()))? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(DatabaseError::Serialization(format!(
            "expected string variant, got {other}"
        ))),
    }
}

fn map_constraint(e: libsql::Error) -> DatabaseError {
    let msg = e.to_string();
    if msg.contains("UNIQUE") || msg.contains("constraint") {
        DatabaseError::Constraint(msg)
    } else {
        DatabaseError::Query(msg)
    }
}
