//! Inbound message processor — routing, resolution, funnel advance, and
//! persistence for one envelope, in that order.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::config::EngineConfig;
use crate::engine::types::InboundEnvelope;
use crate::engine::ConversationEngine;
use crate::error::Result;
use crate::model::{Interaction, Lead};
use crate::outbound::OutboundRequest;
use crate::resolver::{IdentityResolver, ObservedContact};
use crate::session::SessionRouter;
use crate::store::LeadStore;

/// The outcome of one routed, processed inbound message.
#[derive(Debug)]
pub struct ProcessedTurn {
    pub lead: Lead,
    pub replies: Vec<OutboundRequest>,
    pub side_effects: Vec<OutboundRequest>,
}

/// Glues the session router, identity resolver, and conversation engine
/// together. Channel adapters hand every normalized envelope here.
pub struct MessageProcessor {
    store: Arc<dyn LeadStore>,
    engine: ConversationEngine,
    router: Arc<SessionRouter>,
    resolver: IdentityResolver,
    config: EngineConfig,
}

impl MessageProcessor {
    pub fn new(
        store: Arc<dyn LeadStore>,
        engine: ConversationEngine,
        router: Arc<SessionRouter>,
        config: EngineConfig,
    ) -> Self {
        let resolver = IdentityResolver::new(store.clone());
        Self {
            store,
            engine,
            router,
            resolver,
            config,
        }
    }

    /// Process one inbound envelope end to end.
    ///
    /// Returns `None` when the message cannot be attributed to a tenant (no
    /// bootstrap token and no live session) — nothing is persisted in that
    /// case. A malformed token is a hard error so the adapter can surface it.
    #[instrument(skip(self, envelope), fields(channel = %envelope.channel))]
    pub async fn handle(&self, envelope: &InboundEnvelope) -> Result<Option<ProcessedTurn>> {
        let now = Utc::now();
        let text = envelope.text.as_deref().unwrap_or("");

        let Some(ctx) =
            self.router
                .route(envelope.channel, &envelope.external_user_id, text, now)?
        else {
            debug!(
                external_user_id = %envelope.external_user_id,
                "Dropping unroutable message (no token, no session)"
            );
            return Ok(None);
        };

        let observed = ObservedContact {
            channel: Some(envelope.channel),
            channel_user_id: Some(envelope.external_user_id.clone()),
            display_name: envelope.display_name.clone(),
            ..Default::default()
        };
        let (mut lead, created) = self.resolver.resolve(&ctx.tenant_id, &observed).await?;
        if created {
            debug!(lead_id = %lead.id, tenant_id = %ctx.tenant_id, "New lead entered funnel");
        }

        self.store
            .log_interaction(&Interaction::inbound(
                lead.id,
                envelope.channel,
                envelope.logged_body(),
            ))
            .await?;

        let advance = self.engine.advance(&lead, envelope).await?;
        advance.apply(&mut lead, now, self.config.followup_interval);
        self.store.update_lead(&lead).await?;

        for reply in &advance.replies {
            if let Some(body) = reply.body_text() {
                self.store
                    .log_interaction(&Interaction::outbound(lead.id, envelope.channel, body))
                    .await?;
            }
        }

        Ok(Some(ProcessedTurn {
            lead,
            replies: advance.replies,
            side_effects: advance.side_effects,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::model::{Channel, Direction, Language};
    use crate::outbound::KnowledgeResponder;
    use crate::store::LibSqlStore;
    use async_trait::async_trait;

    struct CannedResponder;

    #[async_trait]
    impl KnowledgeResponder for CannedResponder {
        async fn answer(
            &self,
            _question: &str,
            _language: Language,
        ) -> std::result::Result<String, ChannelError> {
            Ok("Our office is in the Marina.".to_string())
        }
    }

    async fn processor() -> (MessageProcessor, Arc<LibSqlStore>) {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let engine = ConversationEngine::new(Arc::new(CannedResponder));
        let router = Arc::new(SessionRouter::new(std::time::Duration::from_secs(3600)));
        let processor = MessageProcessor::new(
            store.clone(),
            engine,
            router,
            EngineConfig::default(),
        );
        (processor, store)
    }

    fn envelope(user: &str, text: &str) -> InboundEnvelope {
        InboundEnvelope {
            channel: Channel::Telegram,
            external_user_id: user.to_string(),
            display_name: Some("Dana".into()),
            text: Some(text.to_string()),
            structured_choice_id: None,
            media_ref: None,
        }
    }

    #[tokio::test]
    async fn unroutable_message_is_dropped_without_persisting() {
        let (processor, store) = processor().await;
        let turn = processor.handle(&envelope("u1", "hello")).await.unwrap();
        assert!(turn.is_none());
        assert!(store.list_leads("acme").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_message_creates_lead_and_opens_funnel() {
        let (processor, store) = processor().await;
        let turn = processor
            .handle(&envelope("u1", "start_realestate_acme"))
            .await
            .unwrap()
            .expect("routed");
        assert!(!turn.replies.is_empty());
        assert!(turn.lead.pending_slot.is_some());

        let leads = store.list_leads("acme").await.unwrap();
        assert_eq!(leads.len(), 1);
        let log = store.list_interactions(leads[0].id).await.unwrap();
        assert!(log.iter().any(|i| i.direction == Direction::Inbound));
        assert!(log.iter().any(|i| i.direction == Direction::Outbound));
    }

    #[tokio::test]
    async fn followup_message_routes_through_existing_session() {
        let (processor, store) = processor().await;
        processor
            .handle(&envelope("u1", "start_realestate_acme"))
            .await
            .unwrap();
        let turn = processor
            .handle(&envelope("u1", "English"))
            .await
            .unwrap()
            .expect("routed via session");
        assert_eq!(turn.lead.language, Language::En);

        let leads = store.list_leads("acme").await.unwrap();
        assert_eq!(leads.len(), 1, "same lead across turns");
    }

    #[tokio::test]
    async fn interrupt_is_logged_and_funnel_holds_position() {
        let (processor, _) = processor().await;
        processor
            .handle(&envelope("u1", "start_realestate_acme"))
            .await
            .unwrap();
        let before = processor
            .handle(&envelope("u1", "English"))
            .await
            .unwrap()
            .unwrap();
        let pending = before.lead.pending_slot;

        let turn = processor
            .handle(&envelope("u1", "where is your office?"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(turn.lead.pending_slot, pending, "interrupt must not move the funnel");
        assert!(turn
            .replies
            .iter()
            .any(|r| r.body_text().is_some_and(|b| b.contains("Marina"))));
    }
}
