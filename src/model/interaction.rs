//! Append-only interaction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::lead::Channel;

/// Message direction relative to us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbound => write!(f, "inbound"),
            Self::Outbound => write!(f, "outbound"),
        }
    }
}

/// One logged message exchange. Never mutated or deleted after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub channel: Channel,
    pub direction: Direction,
    pub body: String,
    /// True for engine/scheduler-generated messages, false for human agents.
    pub automated: bool,
    /// False when an automated outbound attempt exhausted its retries.
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}

impl Interaction {
    pub fn inbound(lead_id: Uuid, channel: Channel, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            channel,
            direction: Direction::Inbound,
            body: body.into(),
            automated: false,
            delivered: true,
            created_at: Utc::now(),
        }
    }

    pub fn outbound(lead_id: Uuid, channel: Channel, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lead_id,
            channel,
            direction: Direction::Outbound,
            body: body.into(),
            automated: true,
            delivered: true,
            created_at: Utc::now(),
        }
    }

    /// Mark this outbound attempt as undelivered (retries exhausted).
    pub fn failed(mut self) -> Self {
        self.delivered = false;
        self
    }
}
