//! The funnel advance function.
//!
//! `advance` is pure with respect to the lead's persisted fields plus the
//! envelope: it computes replies, the next state, and a field patch, and
//! requests side effects without executing them.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::engine::messages::{self, Choice, MessageId};
use crate::engine::state::{FunnelState, Slot};
use crate::engine::types::{Advance, InboundEnvelope, LeadPatch};
use crate::error::Result;
use crate::model::{Language, Lead, LeadStatus, PropertyType, Purpose, TransactionType};
use crate::outbound::{ChoiceOption, KnowledgeResponder, OutboundRequest, ReportKind};

/// Matches a phone number shared as free text at the contact gate.
fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9][0-9 \-]{6,14}$").expect("valid phone regex"))
}

/// Advances leads through the qualification funnel.
pub struct ConversationEngine {
    responder: Arc<dyn KnowledgeResponder>,
}

impl ConversationEngine {
    pub fn new(responder: Arc<dyn KnowledgeResponder>) -> Self {
        Self { responder }
    }

    /// Advance one lead by one inbound envelope.
    ///
    /// Input that does not match the pending slot's grammar is treated as an
    /// interrupt: it is answered via the knowledge responder and the same
    /// prompt is re-emitted, leaving `pending_slot` and `filled_slots`
    /// untouched.
    pub async fn advance(&self, lead: &Lead, envelope: &InboundEnvelope) -> Result<Advance> {
        let state = lead.funnel_state;
        let lang = lead.language;

        if state.is_terminal() {
            return Ok(Advance {
                replies: vec![OutboundRequest::text(messages::text(MessageId::DoneAck, lang))],
                next_state: state,
                field_updates: LeadPatch::default(),
                side_effects: Vec::new(),
            });
        }

        let slot = state
            .expected_slot()
            .expect("non-terminal state always has a slot");

        // First contact in this funnel: emit the opening prompt and wait.
        if lead.pending_slot.is_none() {
            let (replies, side_effects) = prompt_for(state, lang)?;
            return Ok(Advance {
                replies,
                next_state: state,
                field_updates: LeadPatch {
                    pending_slot: Some(Some(slot)),
                    keep_in_pipeline: true,
                    ..LeadPatch::default()
                },
                side_effects,
            });
        }

        match slot {
            Slot::Name => self.advance_name(lead, envelope).await,
            Slot::Contact => self.advance_contact(lead, envelope).await,
            _ => self.advance_structured(lead, envelope, slot).await,
        }
    }

    /// Name capture accepts any non-question free text.
    async fn advance_name(&self, lead: &Lead, envelope: &InboundEnvelope) -> Result<Advance> {
        let text = envelope.text.as_deref().map(str::trim).unwrap_or("");
        let looks_like_question = text.ends_with('?') || text.ends_with('؟');
        if text.is_empty() || looks_like_question {
            return self.interrupt(lead, envelope).await;
        }
        let mut patch = LeadPatch {
            display_name: Some(text.to_string()),
            ..LeadPatch::default()
        };
        self.transition(lead, FunnelState::ContactCapture, Slot::Name, &mut patch)
    }

    /// Contact gate: a phone-shaped message fills the slot.
    async fn advance_contact(&self, lead: &Lead, envelope: &InboundEnvelope) -> Result<Advance> {
        let text = envelope.text.as_deref().map(str::trim).unwrap_or("");
        if !phone_re().is_match(text) {
            return self.interrupt(lead, envelope).await;
        }
        let mut patch = LeadPatch {
            phone: Some(text.to_string()),
            ..LeadPatch::default()
        };
        self.transition(lead, FunnelState::ContactGate, Slot::Contact, &mut patch)
    }

    /// Slots with a fixed choice grammar.
    async fn advance_structured(
        &self,
        lead: &Lead,
        envelope: &InboundEnvelope,
        slot: Slot,
    ) -> Result<Advance> {
        let matched = messages::match_choice(
            slot,
            envelope.structured_choice_id.as_deref(),
            envelope.text.as_deref(),
        );
        let Some(choice) = matched else {
            return self.interrupt(lead, envelope).await;
        };

        let mut patch = LeadPatch::default();
        match slot {
            Slot::Language => patch.language = Some(language_for(choice)),
            Slot::Goal => patch.purpose = Some(purpose_for(choice)),
            Slot::Budget => {
                let (min, max) = budget_for(choice);
                patch.budget_min = min;
                patch.budget_max = max;
            }
            Slot::PropertyKind => patch.property_type = Some(property_type_for(choice)),
            Slot::Transaction => patch.transaction_type = Some(transaction_for(choice)),
            Slot::Interest => {
                if choice.id == "interest_no" {
                    return self.close_nurture(lead, slot);
                }
            }
            Slot::Schedule => {
                return self.close_won(lead, slot);
            }
            Slot::Name | Slot::Contact => unreachable!("free-text slots handled separately"),
        }
        self.transition(lead, lead.funnel_state, slot, &mut patch)
    }

    /// Fill `slot`, move to the next state, and emit its prompt.
    fn transition(
        &self,
        lead: &Lead,
        from: FunnelState,
        slot: Slot,
        patch: &mut LeadPatch,
    ) -> Result<Advance> {
        // The selected language applies to this turn's replies already.
        let lang = patch.language.unwrap_or(lead.language);
        let mut next = from.next().expect("non-terminal state has a successor");
        patch.fill_slots.push(slot);
        patch.keep_in_pipeline = true;

        // Contact gate entry: skip it when a phone is already on file, and
        // take the explicit cannot-proceed branch when the lead has no
        // reachable identity at all.
        if next == FunnelState::ContactGate {
            if lead.phone.is_some() || patch.phone.is_some() {
                patch.fill_slots.push(Slot::Contact);
                next = FunnelState::Scheduling;
            } else if !lead.has_channel_identity() {
                patch.pending_slot = Some(None);
                patch.leave_pipeline = true;
                patch.keep_in_pipeline = false;
                return Ok(Advance {
                    replies: vec![OutboundRequest::text(messages::text(
                        MessageId::CannotProceed,
                        lang,
                    ))],
                    next_state: FunnelState::Unreachable,
                    field_updates: std::mem::take(patch),
                    side_effects: vec![OutboundRequest::NotifyOperator {
                        message: format!("Lead {} hit the contact gate unreachable", lead.id),
                    }],
                });
            }
        }

        patch.pending_slot = Some(next.expected_slot());
        let (replies, side_effects) = prompt_for(next, lang)?;
        Ok(Advance {
            replies,
            next_state: next,
            field_updates: std::mem::take(patch),
            side_effects,
        })
    }

    /// "Not right now" at the value proposition: close politely, keep the
    /// lead for nurture campaigns, leave the automated cadence.
    fn close_nurture(&self, lead: &Lead, slot: Slot) -> Result<Advance> {
        Ok(Advance {
            replies: vec![OutboundRequest::text(messages::text(
                MessageId::ClosingNurture,
                lead.language,
            ))],
            next_state: FunnelState::Complete,
            field_updates: LeadPatch {
                status: Some(LeadStatus::Nurturing),
                fill_slots: vec![slot],
                pending_slot: Some(None),
                leave_pipeline: true,
                ..LeadPatch::default()
            },
            side_effects: Vec::new(),
        })
    }

    /// A scheduling choice completes the funnel: hand off to a human with a
    /// shortlist report.
    fn close_won(&self, lead: &Lead, slot: Slot) -> Result<Advance> {
        Ok(Advance {
            replies: vec![OutboundRequest::text(messages::text(
                MessageId::Closing,
                lead.language,
            ))],
            next_state: FunnelState::Complete,
            field_updates: LeadPatch {
                fill_slots: vec![slot],
                pending_slot: Some(None),
                leave_pipeline: true,
                ..LeadPatch::default()
            },
            side_effects: vec![
                OutboundRequest::GenerateReport {
                    report: ReportKind::PropertyShortlist,
                    params: serde_json::json!({ "lead_id": lead.id }),
                },
                OutboundRequest::NotifyOperator {
                    message: format!("Lead {} completed qualification", lead.id),
                },
            ],
        })
    }

    /// Off-topic input: answer it and re-ask the pending question. Slot
    /// bookkeeping is deliberately untouched so the funnel position holds.
    async fn interrupt(&self, lead: &Lead, envelope: &InboundEnvelope) -> Result<Advance> {
        let lang = lead.language;
        let question = envelope.text.as_deref().unwrap_or("").to_string();
        let answer = match self.responder.answer(&question, lang).await {
            Ok(a) if !a.trim().is_empty() => a,
            _ => messages::text(MessageId::Fallback, lang).to_string(),
        };

        let (mut replies, side_effects) = prompt_for(lead.funnel_state, lang)?;
        replies.insert(0, OutboundRequest::text(answer));
        Ok(Advance {
            replies,
            next_state: lead.funnel_state,
            field_updates: LeadPatch {
                keep_in_pipeline: true,
                ..LeadPatch::default()
            },
            side_effects,
        })
    }
}

/// The prompt (and any side effects) for entering a state.
fn prompt_for(
    state: FunnelState,
    lang: Language,
) -> Result<(Vec<OutboundRequest>, Vec<OutboundRequest>)> {
    let buttons = |id: MessageId, slot: Slot| -> Result<OutboundRequest> {
        Ok(OutboundRequest::buttons(
            messages::text(id, lang),
            options_for(slot, lang),
        )?)
    };
    let list = |id: MessageId, slot: Slot| -> Result<OutboundRequest> {
        Ok(OutboundRequest::list(
            messages::text(id, lang),
            options_for(slot, lang),
        )?)
    };

    let prompt = match state {
        FunnelState::LanguageSelect => vec![buttons(MessageId::Welcome, Slot::Language)?],
        FunnelState::GoalSelect => vec![buttons(MessageId::AskGoal, Slot::Goal)?],
        FunnelState::ContactCapture => {
            vec![OutboundRequest::text(messages::text(MessageId::AskName, lang))]
        }
        FunnelState::Budget => vec![list(MessageId::AskBudget, Slot::Budget)?],
        FunnelState::PropertyKind => vec![list(MessageId::AskPropertyKind, Slot::PropertyKind)?],
        FunnelState::Transaction => vec![buttons(MessageId::AskTransaction, Slot::Transaction)?],
        FunnelState::ValueProposition => vec![buttons(MessageId::ValueProp, Slot::Interest)?],
        FunnelState::ContactGate => {
            let replies = vec![OutboundRequest::text(messages::text(MessageId::AskContact, lang))];
            return Ok((replies, vec![OutboundRequest::RequestContactShare]));
        }
        FunnelState::Scheduling => vec![buttons(MessageId::AskSchedule, Slot::Schedule)?],
        FunnelState::Complete | FunnelState::Unreachable => Vec::new(),
    };
    Ok((prompt, Vec::new()))
}

fn options_for(slot: Slot, lang: Language) -> Vec<ChoiceOption> {
    messages::choices_for(slot)
        .iter()
        .map(|c| ChoiceOption {
            id: c.id.to_string(),
            label: c.label(lang).to_string(),
        })
        .collect()
}

fn language_for(choice: &Choice) -> Language {
    match choice.id {
        "lang_ar" => Language::Ar,
        "lang_fr" => Language::Fr,
        _ => Language::En,
    }
}

fn purpose_for(choice: &Choice) -> Purpose {
    match choice.id {
        "goal_invest" => Purpose::Investment,
        _ => Purpose::Residence,
    }
}

fn transaction_for(choice: &Choice) -> TransactionType {
    match choice.id {
        "tx_rent" => TransactionType::Rent,
        _ => TransactionType::Buy,
    }
}

fn property_type_for(choice: &Choice) -> PropertyType {
    match choice.id {
        "pt_villa" => PropertyType::Villa,
        "pt_townhouse" => PropertyType::Townhouse,
        "pt_office" => PropertyType::Office,
        "pt_land" => PropertyType::Land,
        _ => PropertyType::Apartment,
    }
}

fn budget_for(choice: &Choice) -> (Option<Decimal>, Option<Decimal>) {
    match choice.id {
        "budget_under_1m" => (None, Some(dec!(1_000_000))),
        "budget_1m_2_5m" => (Some(dec!(1_000_000)), Some(dec!(2_500_000))),
        "budget_2_5m_5m" => (Some(dec!(2_500_000)), Some(dec!(5_000_000))),
        _ => (Some(dec!(5_000_000)), None),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::ChannelError;
    use crate::model::Channel;

    struct CannedResponder(&'static str);

    #[async_trait]
    impl KnowledgeResponder for CannedResponder {
        async fn answer(&self, _q: &str, _l: Language) -> Result2<String> {
            Ok(self.0.to_string())
        }
    }

    type Result2<T> = std::result::Result<T, ChannelError>;

    struct FailingResponder;

    #[async_trait]
    impl KnowledgeResponder for FailingResponder {
        async fn answer(&self, _q: &str, _l: Language) -> Result2<String> {
            Err(ChannelError::Transient {
                channel: "knowledge".into(),
                reason: "timeout".into(),
            })
        }
    }

    fn engine() -> ConversationEngine {
        ConversationEngine::new(Arc::new(CannedResponder("The handover is Q3 next year.")))
    }

    fn envelope(text: &str) -> InboundEnvelope {
        InboundEnvelope {
            channel: Channel::Telegram,
            external_user_id: "tg-1".into(),
            display_name: None,
            text: Some(text.to_string()),
            structured_choice_id: None,
            media_ref: None,
        }
    }

    fn choice(id: &str) -> InboundEnvelope {
        InboundEnvelope {
            channel: Channel::Telegram,
            external_user_id: "tg-1".into(),
            display_name: None,
            text: None,
            structured_choice_id: Some(id.to_string()),
            media_ref: None,
        }
    }

    fn reachable_lead() -> Lead {
        let mut lead = Lead::new("t1");
        lead.channel = Some(Channel::Telegram);
        lead.channel_user_id = Some("tg-1".into());
        lead
    }

    #[tokio::test]
    async fn first_contact_emits_welcome_and_sets_pending_slot() {
        let lead = reachable_lead();
        let adv = engine().advance(&lead, &envelope("hi")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::LanguageSelect);
        assert_eq!(adv.field_updates.pending_slot, Some(Some(Slot::Language)));
        assert!(matches!(
            adv.replies[0],
            OutboundRequest::SendButtons { .. }
        ));
    }

    #[tokio::test]
    async fn valid_choice_fills_slot_and_advances() {
        let mut lead = reachable_lead();
        lead.pending_slot = Some(Slot::Language);
        let adv = engine().advance(&lead, &choice("lang_en")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::GoalSelect);
        assert_eq!(adv.field_updates.fill_slots, vec![Slot::Language]);
        assert_eq!(adv.field_updates.pending_slot, Some(Some(Slot::Goal)));
    }

    #[tokio::test]
    async fn interrupt_answers_and_reasks_without_touching_slots() {
        let mut lead = reachable_lead();
        lead.funnel_state = FunnelState::Budget;
        lead.pending_slot = Some(Slot::Budget);

        let adv = engine()
            .advance(&lead, &envelope("can I talk to a human?"))
            .await
            .unwrap();

        assert_eq!(adv.next_state, FunnelState::Budget);
        assert!(adv.field_updates.fill_slots.is_empty());
        assert!(adv.field_updates.pending_slot.is_none());
        // Answer first, then the repeated budget prompt.
        assert_eq!(adv.replies.len(), 2);
        match (&adv.replies[0], &adv.replies[1]) {
            (OutboundRequest::SendText { text }, OutboundRequest::SendList { .. }) => {
                assert_eq!(text, "The handover is Q3 next year.");
            }
            other => panic!("unexpected replies: {other:?}"),
        }
    }

    #[tokio::test]
    async fn interrupt_falls_back_when_responder_fails() {
        let eng = ConversationEngine::new(Arc::new(FailingResponder));
        let mut lead = reachable_lead();
        lead.funnel_state = FunnelState::Budget;
        lead.pending_slot = Some(Slot::Budget);

        let adv = eng.advance(&lead, &envelope("what about schools?")).await.unwrap();
        match &adv.replies[0] {
            OutboundRequest::SendText { text } => {
                assert_eq!(text, messages::text(MessageId::Fallback, Language::En));
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn budget_choice_sets_range_then_valid_choice_advances() {
        // Scenario C second half: after an interrupt, a valid budget choice
        // fills the slot and moves on.
        let mut lead = reachable_lead();
        lead.funnel_state = FunnelState::Budget;
        lead.pending_slot = Some(Slot::Budget);

        let adv = engine().advance(&lead, &choice("budget_1m_2_5m")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::PropertyKind);
        assert_eq!(adv.field_updates.budget_min, Some(dec!(1_000_000)));
        assert_eq!(adv.field_updates.budget_max, Some(dec!(2_500_000)));
        assert_eq!(adv.field_updates.fill_slots, vec![Slot::Budget]);
    }

    #[tokio::test]
    async fn contact_gate_without_identity_cannot_proceed() {
        let mut lead = Lead::new("t1");
        lead.channel = Some(Channel::Webchat);
        lead.channel_user_id = Some("session-1".into());
        lead.funnel_state = FunnelState::ValueProposition;
        lead.pending_slot = Some(Slot::Interest);

        let adv = engine().advance(&lead, &choice("interest_yes")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::Unreachable);
        assert!(adv.field_updates.leave_pipeline);
        assert!(matches!(
            adv.side_effects[0],
            OutboundRequest::NotifyOperator { .. }
        ));
    }

    #[tokio::test]
    async fn contact_gate_skipped_when_phone_on_file() {
        let mut lead = reachable_lead();
        lead.phone = Some("+971501234567".into());
        lead.funnel_state = FunnelState::ValueProposition;
        lead.pending_slot = Some(Slot::Interest);

        let adv = engine().advance(&lead, &choice("interest_yes")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::Scheduling);
        assert!(adv.field_updates.fill_slots.contains(&Slot::Contact));
    }

    #[tokio::test]
    async fn phone_text_fills_contact_gate() {
        let mut lead = reachable_lead();
        lead.funnel_state = FunnelState::ContactGate;
        lead.pending_slot = Some(Slot::Contact);

        let adv = engine().advance(&lead, &envelope("+971 50 123 4567")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::Scheduling);
        assert_eq!(adv.field_updates.phone.as_deref(), Some("+971 50 123 4567"));
    }

    #[tokio::test]
    async fn scheduling_choice_completes_with_report_and_operator_ping() {
        let mut lead = reachable_lead();
        lead.funnel_state = FunnelState::Scheduling;
        lead.pending_slot = Some(Slot::Schedule);

        let adv = engine().advance(&lead, &choice("sched_visit")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::Complete);
        assert!(adv.field_updates.leave_pipeline);
        assert_eq!(adv.side_effects.len(), 2);
        assert!(matches!(
            adv.side_effects[0],
            OutboundRequest::GenerateReport { .. }
        ));
    }

    #[tokio::test]
    async fn declining_interest_moves_to_nurture() {
        let mut lead = reachable_lead();
        lead.funnel_state = FunnelState::ValueProposition;
        lead.pending_slot = Some(Slot::Interest);

        let adv = engine().advance(&lead, &choice("interest_no")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::Complete);
        assert_eq!(adv.field_updates.status, Some(LeadStatus::Nurturing));
        assert!(adv.field_updates.leave_pipeline);
    }

    #[tokio::test]
    async fn terminal_lead_gets_ack_only() {
        let mut lead = reachable_lead();
        lead.funnel_state = FunnelState::Complete;
        let adv = engine().advance(&lead, &envelope("hello again")).await.unwrap();
        assert_eq!(adv.next_state, FunnelState::Complete);
        assert!(adv.field_updates.fill_slots.is_empty());
    }

    #[tokio::test]
    async fn apply_updates_counters_and_score() {
        let mut lead = reachable_lead();
        lead.pending_slot = Some(Slot::Language);
        let adv = engine().advance(&lead, &choice("lang_fr")).await.unwrap();
        let now = chrono::Utc::now();
        adv.apply(&mut lead, now, std::time::Duration::from_secs(3 * 24 * 3600));

        assert_eq!(lead.language, Language::Fr);
        assert_eq!(lead.funnel_state, FunnelState::GoalSelect);
        assert_eq!(lead.messages_received, 1);
        assert_eq!(lead.messages_sent, 1);
        assert!(lead.slot_filled(Slot::Language));
        assert_eq!(lead.pending_slot, Some(Slot::Goal));
        assert!(lead.next_followup_at.is_some());
        assert_eq!(lead.score, crate::scoring::score_lead(&lead));
    }
}
