//! Follow-up scheduler — one stateless cycle over the shared store.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{info, instrument, warn};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::followup::{retry, stages};
use crate::model::{Interaction, Lead};
use crate::outbound::{MessageSender, OutboundRequest};
use crate::scoring;
use crate::store::LeadStore;

/// Outcome counts for one scheduler cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Claims due leads and sends the next stage message to each.
///
/// Carries no timer or queue state; everything it needs is read from the
/// store at cycle start, so concurrent workers and restarts are safe.
pub struct FollowupScheduler {
    store: Arc<dyn LeadStore>,
    sender: Arc<dyn MessageSender>,
    config: EngineConfig,
    worker_id: String,
}

impl FollowupScheduler {
    pub fn new(
        store: Arc<dyn LeadStore>,
        sender: Arc<dyn MessageSender>,
        config: EngineConfig,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sender,
            config,
            worker_id: worker_id.into(),
        }
    }

    /// Run one cycle at `now`. Per-lead failures release the claim and move
    /// on; they never abort the cycle.
    #[instrument(skip(self), fields(worker = %self.worker_id))]
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleStats> {
        let claimed = self
            .store
            .claim_due_leads(
                now,
                self.config.batch_size,
                &self.worker_id,
                self.config.claim_ttl,
                self.config.max_followups,
            )
            .await?;

        let mut stats = CycleStats {
            attempted: claimed.len(),
            ..Default::default()
        };

        for lead in claimed {
            match self.touch_lead(&lead, now).await {
                Ok(true) => stats.succeeded += 1,
                Ok(false) => stats.failed += 1,
                Err(err) => {
                    stats.failed += 1;
                    warn!(lead_id = %lead.id, %err, "Follow-up errored; claim released");
                    self.store.release_claim(lead.id).await.ok();
                }
            }
        }

        if stats.attempted > 0 {
            info!(
                attempted = stats.attempted,
                succeeded = stats.succeeded,
                failed = stats.failed,
                "Follow-up cycle complete"
            );
        }
        Ok(stats)
    }

    async fn touch_lead(&self, lead: &Lead, now: DateTime<Utc>) -> Result<bool> {
        let Some(channel) = lead.reachable_channel() else {
            // Nothing to deliver on; retire from the pipeline rather than
            // claiming the same dead row forever.
            warn!(lead_id = %lead.id, "Lead has no reachable channel; leaving pipeline");
            self.store.clear_followup(lead.id).await?;
            self.store.release_claim(lead.id).await?;
            return Ok(false);
        };

        let body = stages::stage_message(lead.followup_count, lead.language);
        let request = OutboundRequest::text(body);
        let delivery = retry::with_backoff(self.config.send_attempts, self.config.backoff_base, || {
            self.sender.deliver(lead, channel, &request)
        })
        .await;

        match delivery {
            Ok(()) => {
                let new_count = lead.followup_count + 1;
                let next_due = if new_count >= self.config.max_followups {
                    None
                } else {
                    let interval = ChronoDuration::from_std(self.config.followup_interval)
                        .unwrap_or_else(|_| ChronoDuration::days(3));
                    Some(now + interval)
                };

                // Project the touch onto a copy to derive the new score.
                let mut projected = lead.clone();
                projected.followup_count = new_count;
                projected.messages_sent += 1;
                projected.last_contacted_at = Some(now);
                scoring::refresh_score(&mut projected);

                self.store
                    .complete_followup(
                        lead.id,
                        new_count,
                        next_due,
                        now,
                        projected.score,
                        projected.grade,
                    )
                    .await?;
                self.store
                    .log_interaction(&Interaction::outbound(lead.id, channel, body))
                    .await?;
                info!(
                    lead_id = %lead.id,
                    stage = stages::stage_label(lead.followup_count),
                    count = new_count,
                    retired = next_due.is_none(),
                    "Follow-up sent"
                );
                Ok(true)
            }
            Err(err) => {
                warn!(lead_id = %lead.id, %err, "Follow-up delivery failed");
                self.store
                    .log_interaction(&Interaction::outbound(lead.id, channel, body).failed())
                    .await?;
                self.store.release_claim(lead.id).await?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use crate::model::{Channel, Direction};
    use crate::outbound::OutboundRequest;
    use crate::store::LibSqlStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(uuid::Uuid, String)>>,
        fail_transient: AtomicUsize,
        fail_permanent: bool,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn deliver(
            &self,
            lead: &Lead,
            channel: Channel,
            request: &OutboundRequest,
        ) -> std::result::Result<(), ChannelError> {
            if self.fail_permanent {
                return Err(ChannelError::Permanent {
                    channel: channel.to_string(),
                    reason: "blocked".into(),
                });
            }
            if self.fail_transient.load(Ordering::SeqCst) > 0 {
                self.fail_transient.fetch_sub(1, Ordering::SeqCst);
                return Err(ChannelError::Transient {
                    channel: channel.to_string(),
                    reason: "timeout".into(),
                });
            }
            self.sent
                .lock()
                .unwrap()
                .push((lead.id, request.body_text().unwrap_or_default().to_string()));
            Ok(())
        }
    }

    fn fast_config() -> EngineConfig {
        EngineConfig {
            backoff_base: std::time::Duration::from_millis(1),
            ..Default::default()
        }
    }

    async fn due_lead(store: &LibSqlStore, now: DateTime<Utc>, count: u32) -> Lead {
        let mut lead = Lead::new("t1");
        lead.channel = Some(Channel::Telegram);
        lead.channel_user_id = Some(uuid::Uuid::new_v4().to_string());
        lead.followup_count = count;
        lead.next_followup_at = Some(now - ChronoDuration::minutes(1));
        store.insert_lead(&lead).await.unwrap();
        lead
    }

    #[tokio::test]
    async fn cycle_sends_and_reschedules() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let sender = Arc::new(RecordingSender::default());
        let scheduler =
            FollowupScheduler::new(store.clone(), sender.clone(), fast_config(), "w1");
        let now = Utc::now();
        let lead = due_lead(&store, now, 0).await;

        let stats = scheduler.run_cycle(now).await.unwrap();
        assert_eq!(stats, CycleStats { attempted: 1, succeeded: 1, failed: 0 });
        assert_eq!(sender.sent.lock().unwrap().len(), 1);

        let after = store.get_lead(lead.id).await.unwrap();
        assert_eq!(after.followup_count, 1);
        let due = after.next_followup_at.expect("rescheduled");
        assert!(due > now + ChronoDuration::days(2));
        assert_eq!(after.last_contacted_at.map(|t| t.timestamp()), Some(now.timestamp()));
    }

    #[tokio::test]
    async fn final_touch_retires_the_lead() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let sender = Arc::new(RecordingSender::default());
        let scheduler =
            FollowupScheduler::new(store.clone(), sender.clone(), fast_config(), "w1");
        let now = Utc::now();
        let lead = due_lead(&store, now, 4).await;

        let stats = scheduler.run_cycle(now).await.unwrap();
        assert_eq!(stats.succeeded, 1);

        let after = store.get_lead(lead.id).await.unwrap();
        assert_eq!(after.followup_count, 5);
        assert!(after.next_followup_at.is_none(), "cap reached, no reschedule");

        // The retired lead never comes back in later cycles.
        let later = now + ChronoDuration::days(30);
        let stats = scheduler.run_cycle(later).await.unwrap();
        assert_eq!(stats.attempted, 0);
    }

    #[tokio::test]
    async fn transient_failures_retry_within_the_attempt() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let sender = Arc::new(RecordingSender::default());
        sender.fail_transient.store(2, Ordering::SeqCst);
        let scheduler =
            FollowupScheduler::new(store.clone(), sender.clone(), fast_config(), "w1");
        let now = Utc::now();
        due_lead(&store, now, 0).await;

        let stats = scheduler.run_cycle(now).await.unwrap();
        assert_eq!(stats.succeeded, 1);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_delivery_releases_claim_and_logs_undelivered() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let sender = Arc::new(RecordingSender {
            fail_permanent: true,
            ..Default::default()
        });
        let scheduler =
            FollowupScheduler::new(store.clone(), sender.clone(), fast_config(), "w1");
        let now = Utc::now();
        let lead = due_lead(&store, now, 0).await;

        let stats = scheduler.run_cycle(now).await.unwrap();
        assert_eq!(stats, CycleStats { attempted: 1, succeeded: 0, failed: 1 });

        let after = store.get_lead(lead.id).await.unwrap();
        assert_eq!(after.followup_count, 0, "failure must not consume a touch");

        let log = store.list_interactions(lead.id).await.unwrap();
        assert!(log.iter().any(|i| i.direction == Direction::Outbound && !i.delivered));

        // Claim was released; the next cycle picks it up again.
        let stats = scheduler.run_cycle(now + ChronoDuration::seconds(1)).await.unwrap();
        assert_eq!(stats.attempted, 1);
    }

    #[tokio::test]
    async fn unreachable_lead_is_retired_not_retried() {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let sender = Arc::new(RecordingSender::default());
        let scheduler =
            FollowupScheduler::new(store.clone(), sender.clone(), fast_config(), "w1");
        let now = Utc::now();

        // Webchat-only lead: due, but nothing to deliver on.
        let mut lead = Lead::new("t1");
        lead.channel = Some(Channel::Webchat);
        lead.channel_user_id = Some("session-1".into());
        lead.next_followup_at = Some(now - ChronoDuration::minutes(1));
        store.insert_lead(&lead).await.unwrap();

        let stats = scheduler.run_cycle(now).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert!(sender.sent.lock().unwrap().is_empty());

        let after = store.get_lead(lead.id).await.unwrap();
        assert!(after.next_followup_at.is_none());
    }
}
