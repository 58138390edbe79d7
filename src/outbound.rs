//! Outbound side-effect requests and collaborator seams.
//!
//! The engine and scheduler request side effects; out-of-scope senders and
//! renderers fulfil them. Requests are a closed variant set, never string
//! flags.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, ValidationError};
use crate::model::{Channel, Language, Lead};

/// Maximum options a button message may carry.
pub const MAX_BUTTONS: usize = 3;
/// Maximum options a list message may carry.
pub const MAX_LIST_OPTIONS: usize = 10;

/// One selectable option rendered to the lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub label: String,
}

/// Kind of report an external renderer can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    PropertyShortlist,
    MarketOverview,
}

/// A requested outbound action, fulfilled by out-of-scope collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundRequest {
    SendText {
        text: String,
    },
    /// Up to [`MAX_BUTTONS`] tappable options. Built via [`OutboundRequest::buttons`].
    SendButtons {
        text: String,
        options: Vec<ChoiceOption>,
    },
    /// Up to [`MAX_LIST_OPTIONS`] options. Built via [`OutboundRequest::list`].
    SendList {
        text: String,
        options: Vec<ChoiceOption>,
    },
    RequestContactShare,
    GenerateReport {
        report: ReportKind,
        params: serde_json::Value,
    },
    NotifyOperator {
        message: String,
    },
}

impl OutboundRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self::SendText { text: text.into() }
    }

    /// Button message; rejects more than [`MAX_BUTTONS`] options.
    pub fn buttons(
        text: impl Into<String>,
        options: Vec<ChoiceOption>,
    ) -> Result<Self, ValidationError> {
        if options.len() > MAX_BUTTONS {
            return Err(ValidationError::TooManyOptions {
                kind: "buttons",
                count: options.len(),
                max: MAX_BUTTONS,
            });
        }
        Ok(Self::SendButtons {
            text: text.into(),
            options,
        })
    }

    /// List message; rejects more than [`MAX_LIST_OPTIONS`] options.
    pub fn list(
        text: impl Into<String>,
        options: Vec<ChoiceOption>,
    ) -> Result<Self, ValidationError> {
        if options.len() > MAX_LIST_OPTIONS {
            return Err(ValidationError::TooManyOptions {
                kind: "list",
                count: options.len(),
                max: MAX_LIST_OPTIONS,
            });
        }
        Ok(Self::SendList {
            text: text.into(),
            options,
        })
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SendText { .. } => "send_text",
            Self::SendButtons { .. } => "send_buttons",
            Self::SendList { .. } => "send_list",
            Self::RequestContactShare => "request_contact_share",
            Self::GenerateReport { .. } => "generate_report",
            Self::NotifyOperator { .. } => "notify_operator",
        }
    }

    /// The human-readable body, for interaction logging.
    pub fn body_text(&self) -> Option<&str> {
        match self {
            Self::SendText { text }
            | Self::SendButtons { text, .. }
            | Self::SendList { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Delivers outbound requests on a concrete channel. Implemented by the
/// out-of-scope channel adapters; failures must be classified transient vs
/// permanent so retry policy can act on them.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn deliver(
        &self,
        lead: &Lead,
        channel: Channel,
        request: &OutboundRequest,
    ) -> Result<(), ChannelError>;
}

/// Answers an off-topic question during the funnel. Implemented by an
/// external knowledge service; the engine only needs text back.
#[async_trait]
pub trait KnowledgeResponder: Send + Sync {
    async fn answer(&self, question: &str, language: Language) -> Result<String, ChannelError>;
}

/// Sender that only logs — the default wiring for the worker binary when no
/// channel adapter is attached.
pub struct LogSender;

#[async_trait]
impl MessageSender for LogSender {
    async fn deliver(
        &self,
        lead: &Lead,
        channel: Channel,
        request: &OutboundRequest,
    ) -> Result<(), ChannelError> {
        tracing::info!(
            lead_id = %lead.id,
            %channel,
            request = request.label(),
            body = request.body_text().unwrap_or(""),
            "outbound (log-only)"
        );
        Ok(())
    }
}
