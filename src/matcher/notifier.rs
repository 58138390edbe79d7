//! Match delivery with exactly-once semantics per (property, lead) pair.
//!
//! The match record is inserted before any delivery attempt; the unique key
//! on the pair makes re-running a notification pass safe.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::followup::retry;
use crate::matcher::{MatchOutcome, PropertyMatcher};
use crate::model::{Interaction, Lead, Property, PropertyMatchRecord};
use crate::outbound::{MessageSender, OutboundRequest};
use crate::store::LeadStore;

pub struct MatchNotifier {
    store: Arc<dyn LeadStore>,
    sender: Arc<dyn MessageSender>,
    matcher: PropertyMatcher,
    config: EngineConfig,
}

impl MatchNotifier {
    pub fn new(
        store: Arc<dyn LeadStore>,
        sender: Arc<dyn MessageSender>,
        config: EngineConfig,
    ) -> Self {
        let matcher = PropertyMatcher::new(store.clone());
        Self {
            store,
            sender,
            matcher,
            config,
        }
    }

    /// Notify every eligible lead matching a newly listed property. Returns
    /// how many notifications went out.
    #[instrument(skip(self, property), fields(property_id = %property.id))]
    pub async fn notify_for_property(&self, property: &Property) -> Result<usize> {
        let matches = self.matcher.match_for_property(property).await?;
        let mut delivered = 0;
        for (lead, outcome) in matches {
            if self.notify_one(property, &lead, &outcome).await? {
                delivered += 1;
            }
        }
        info!(delivered, "Property match notifications sent");
        Ok(delivered)
    }

    /// Notify one pair. Returns false when the pair was already recorded or
    /// delivery failed.
    pub async fn notify_one(
        &self,
        property: &Property,
        lead: &Lead,
        outcome: &MatchOutcome,
    ) -> Result<bool> {
        let record =
            PropertyMatchRecord::new(property.id, lead.id, outcome.score, outcome.reason.clone());
        if !self.store.try_record_match(&record).await? {
            debug!(lead_id = %lead.id, "Pair already recorded; skipping");
            return Ok(false);
        }

        let Some(channel) = lead.reachable_channel() else {
            // Recorded but undeliverable; the record still blocks re-sends
            // if the lead later becomes reachable through a fresh match run.
            warn!(lead_id = %lead.id, "Matched lead has no reachable channel");
            return Ok(false);
        };

        let body = notification_body(property, lead);
        let request = OutboundRequest::text(&body);
        let delivery =
            retry::with_backoff(self.config.send_attempts, self.config.backoff_base, || {
                self.sender.deliver(lead, channel, &request)
            })
            .await;

        match delivery {
            Ok(()) => {
                self.store.mark_match_notified(property.id, lead.id).await?;
                self.store
                    .log_interaction(&Interaction::outbound(lead.id, channel, body))
                    .await?;

                let mut updated = lead.clone();
                if !updated.matched_property_ids.contains(&property.id) {
                    updated.matched_property_ids.push(property.id);
                }
                updated.updated_at = Utc::now();
                crate::scoring::refresh_score(&mut updated);
                self.store.update_lead(&updated).await?;
                Ok(true)
            }
            Err(err) => {
                warn!(lead_id = %lead.id, %err, "Match notification failed");
                self.store
                    .log_interaction(&Interaction::outbound(lead.id, channel, body).failed())
                    .await?;
                Ok(false)
            }
        }
    }
}

fn notification_body(property: &Property, lead: &Lead) -> String {
    let name = lead.display_name.as_deref().unwrap_or("there");
    match property.price {
        Some(price) => format!(
            "Hi {name}! A new listing just came in that fits your search: {} at {price}. Want the details?",
            property.title
        ),
        None => format!(
            "Hi {name}! A new listing just came in that fits your search: {}. Want the details?",
            property.title
        ),
    }
}
