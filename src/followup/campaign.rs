//! Ad-hoc campaign runs — bulk messages to a filtered audience.
//!
//! Campaign touches are outside the per-lead cadence: they never consume a
//! follow-up count and never reschedule anything.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::followup::retry;
use crate::model::{FollowupCampaign, Interaction};
use crate::outbound::{MessageSender, OutboundRequest};
use crate::store::traits::CampaignTargetFilter;
use crate::store::LeadStore;

/// Per-run outcome counts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CampaignStats {
    pub targeted: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct CampaignRunner {
    store: Arc<dyn LeadStore>,
    sender: Arc<dyn MessageSender>,
    config: EngineConfig,
}

impl CampaignRunner {
    pub fn new(
        store: Arc<dyn LeadStore>,
        sender: Arc<dyn MessageSender>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            sender,
            config,
        }
    }

    /// Deliver one campaign to every lead its filters select. Leads without
    /// a reachable channel, with a channel outside the campaign's allow
    /// list, or with no body in any usable language are skipped.
    #[instrument(skip(self, campaign), fields(campaign = %campaign.name))]
    pub async fn run_campaign(&self, campaign: &FollowupCampaign) -> Result<CampaignStats> {
        let filter = CampaignTargetFilter {
            status: campaign.status_filter,
            min_score: campaign.min_score,
            source_channel: campaign.source_channel,
        };
        let targets = self
            .store
            .list_campaign_targets(&campaign.tenant_id, &filter)
            .await?;

        let mut stats = CampaignStats {
            targeted: targets.len(),
            ..Default::default()
        };

        for lead in targets {
            let Some(channel) = lead.reachable_channel() else {
                stats.skipped += 1;
                continue;
            };
            if !campaign.channels.is_empty() && !campaign.channels.contains(&channel) {
                stats.skipped += 1;
                continue;
            }
            let Some(body) = campaign.body_for(lead.language) else {
                stats.skipped += 1;
                continue;
            };

            let request = OutboundRequest::text(body);
            let delivery =
                retry::with_backoff(self.config.send_attempts, self.config.backoff_base, || {
                    self.sender.deliver(&lead, channel, &request)
                })
                .await;

            match delivery {
                Ok(()) => {
                    self.store
                        .log_interaction(&Interaction::outbound(lead.id, channel, body))
                        .await?;
                    stats.sent += 1;
                }
                Err(err) => {
                    warn!(lead_id = %lead.id, %err, "Campaign delivery failed");
                    self.store
                        .log_interaction(&Interaction::outbound(lead.id, channel, body).failed())
                        .await?;
                    stats.failed += 1;
                }
            }
        }

        info!(
            targeted = stats.targeted,
            sent = stats.sent,
            skipped = stats.skipped,
            failed = stats.failed,
            "Campaign run complete"
        );
        Ok(stats)
    }
}
