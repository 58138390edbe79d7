//! Property read model and match bookkeeping.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lead::{PropertyType, TransactionType};

/// Minimal view of a catalog property, enough for criteria matching.
/// Catalog CRUD lives in another service; this crate only reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub tenant_id: String,
    pub title: String,
    pub price: Option<Decimal>,
    pub property_type: Option<PropertyType>,
    pub transaction_type: Option<TransactionType>,
    pub location: Option<String>,
    pub bedrooms: Option<u8>,
    pub created_at: DateTime<Utc>,
}

impl Property {
    pub fn new(tenant_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            title: title.into(),
            price: None,
            property_type: None,
            transaction_type: None,
            location: None,
            bedrooms: None,
            created_at: Utc::now(),
        }
    }
}

/// Cache row keyed by (property, lead), unique. Written by the matcher's
/// notifier before delivery so each pair is notified at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyMatchRecord {
    pub property_id: Uuid,
    pub lead_id: Uuid,
    pub score: u8,
    pub reason: String,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl PropertyMatchRecord {
    pub fn new(property_id: Uuid, lead_id: Uuid, score: u8, reason: impl Into<String>) -> Self {
        Self {
            property_id,
            lead_id,
            score,
            reason: reason.into(),
            notified: false,
            created_at: Utc::now(),
        }
    }
}
