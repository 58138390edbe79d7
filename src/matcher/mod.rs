//! Property-lead matching.
//!
//! `criteria_match` is pure: a criterion only constrains when both sides
//! state it, a stated-but-conflicting criterion vetoes the pair, and an
//! unstated one is a wildcard. The score reflects how much of the match is
//! actual signal rather than wildcards.

pub mod notifier;

use std::sync::Arc;

use crate::error::Result;
use crate::model::{Lead, LeadStatus, Property};
use crate::store::LeadStore;

pub use notifier::MatchNotifier;

/// Why and how strongly a property fits a lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// 0–100; the sum of the weights of criteria that matched on substance.
    pub score: u8,
    /// Comma-separated names of the matching criteria.
    pub reason: String,
}

const WEIGHT_BUDGET: u8 = 40;
const WEIGHT_PROPERTY_TYPE: u8 = 20;
const WEIGHT_TRANSACTION: u8 = 15;
const WEIGHT_LOCATION: u8 = 15;
const WEIGHT_BEDROOMS: u8 = 10;

/// Evaluate one (lead, property) pair. `None` means some stated criterion
/// conflicts; `Some` carries the score and reason for the rest.
pub fn criteria_match(lead: &Lead, property: &Property) -> Option<MatchOutcome> {
    let mut score = 0u8;
    let mut reasons: Vec<&str> = Vec::new();

    if let Some(price) = property.price {
        let below_min = lead.budget_min.is_some_and(|min| price < min);
        let above_max = lead.budget_max.is_some_and(|max| price > max);
        if below_min || above_max {
            return None;
        }
        if lead.budget_min.is_some() || lead.budget_max.is_some() {
            score += WEIGHT_BUDGET;
            reasons.push("budget");
        }
    }

    if let (Some(want), Some(have)) = (lead.property_type, property.property_type) {
        if want != have {
            return None;
        }
        score += WEIGHT_PROPERTY_TYPE;
        reasons.push("property_type");
    }

    if let (Some(want), Some(have)) = (lead.transaction_type, property.transaction_type) {
        if want != have {
            return None;
        }
        score += WEIGHT_TRANSACTION;
        reasons.push("transaction");
    }

    if let Some(location) = property.location.as_deref() {
        if !lead.locations.is_empty() {
            let wanted = lead
                .locations
                .iter()
                .any(|l| l.eq_ignore_ascii_case(location));
            if !wanted {
                return None;
            }
            score += WEIGHT_LOCATION;
            reasons.push("location");
        }
    }

    if let Some(bedrooms) = property.bedrooms {
        let below = lead.bedrooms_min.is_some_and(|min| bedrooms < min);
        let above = lead.bedrooms_max.is_some_and(|max| bedrooms > max);
        if below || above {
            return None;
        }
        if lead.bedrooms_min.is_some() || lead.bedrooms_max.is_some() {
            score += WEIGHT_BEDROOMS;
            reasons.push("bedrooms");
        }
    }

    Some(MatchOutcome {
        score,
        reason: reasons.join(","),
    })
}

/// Whether a lead can receive match notifications at all. Reachability is
/// the gate; nurturing leads stay in — "I'll reach out when something worth
/// your time comes up" is delivered through here. Won and lost deals are
/// done being sold to.
pub fn eligible(lead: &Lead) -> bool {
    matches!(lead.status, LeadStatus::Open | LeadStatus::Nurturing) && lead.has_channel_identity()
}

/// Store-backed matcher. All candidate scans are per tenant.
pub struct PropertyMatcher {
    store: Arc<dyn LeadStore>,
}

impl PropertyMatcher {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Eligible leads fitting a new property, best first.
    pub async fn match_for_property(
        &self,
        property: &Property,
    ) -> Result<Vec<(Lead, MatchOutcome)>> {
        let leads = self.store.list_leads(&property.tenant_id).await?;
        let mut matches: Vec<_> = leads
            .into_iter()
            .filter(eligible)
            .filter_map(|lead| criteria_match(&lead, property).map(|m| (lead, m)))
            .collect();
        matches.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        Ok(matches)
    }

    /// Catalog properties fitting one lead, best first.
    pub async fn match_for_lead(&self, lead: &Lead) -> Result<Vec<(Property, MatchOutcome)>> {
        let properties = self.store.list_properties(&lead.tenant_id).await?;
        let mut matches: Vec<_> = properties
            .into_iter()
            .filter_map(|p| criteria_match(lead, &p).map(|m| (p, m)))
            .collect();
        matches.sort_by(|a, b| b.1.score.cmp(&a.1.score));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, PropertyType, TransactionType};
    use rust_decimal_macros::dec;

    fn qualified_lead() -> Lead {
        let mut lead = Lead::new("t1");
        lead.channel = Some(Channel::Telegram);
        lead.channel_user_id = Some("u1".into());
        lead.budget_min = Some(dec!(1_000_000));
        lead.budget_max = Some(dec!(2_500_000));
        lead.property_type = Some(PropertyType::Apartment);
        lead.transaction_type = Some(TransactionType::Buy);
        lead.locations = vec!["Marina".into()];
        lead
    }

    fn listing() -> Property {
        let mut p = Property::new("t1", "Marina 2BR");
        p.price = Some(dec!(1_800_000));
        p.property_type = Some(PropertyType::Apartment);
        p.transaction_type = Some(TransactionType::Buy);
        p.location = Some("marina".into());
        p
    }

    #[test]
    fn full_match_scores_all_stated_criteria() {
        let outcome = criteria_match(&qualified_lead(), &listing()).unwrap();
        assert_eq!(
            outcome.score,
            WEIGHT_BUDGET + WEIGHT_PROPERTY_TYPE + WEIGHT_TRANSACTION + WEIGHT_LOCATION
        );
        assert_eq!(outcome.reason, "budget,property_type,transaction,location");
    }

    #[test]
    fn price_outside_budget_vetoes() {
        let mut p = listing();
        p.price = Some(dec!(3_000_000));
        assert!(criteria_match(&qualified_lead(), &p).is_none());
    }

    #[test]
    fn unstated_criteria_are_wildcards() {
        let mut lead = qualified_lead();
        lead.property_type = None;
        lead.locations.clear();
        let outcome = criteria_match(&lead, &listing()).unwrap();
        assert_eq!(outcome.score, WEIGHT_BUDGET + WEIGHT_TRANSACTION);
    }

    #[test]
    fn property_without_price_matches_any_budget() {
        let mut p = listing();
        p.price = None;
        let outcome = criteria_match(&qualified_lead(), &p).unwrap();
        assert!(!outcome.reason.contains("budget"));
    }

    #[test]
    fn location_comparison_ignores_case() {
        let mut lead = qualified_lead();
        lead.locations = vec!["MARINA".into()];
        assert!(criteria_match(&lead, &listing()).is_some());

        lead.locations = vec!["Downtown".into()];
        assert!(criteria_match(&lead, &listing()).is_none());
    }

    #[test]
    fn bedrooms_range_is_enforced_when_stated() {
        let mut lead = qualified_lead();
        lead.bedrooms_min = Some(3);
        let mut p = listing();
        p.bedrooms = Some(2);
        assert!(criteria_match(&lead, &p).is_none());

        p.bedrooms = Some(3);
        let outcome = criteria_match(&lead, &p).unwrap();
        assert!(outcome.reason.contains("bedrooms"));
    }

    #[test]
    fn leads_without_reachable_identity_are_ineligible() {
        let mut lead = qualified_lead();
        lead.channel = Some(Channel::Webchat);
        lead.channel_user_id = Some("session-1".into());
        lead.phone = None;
        assert!(!eligible(&lead));

        lead.phone = Some("+971500000001".into());
        assert!(eligible(&lead));
    }

    #[test]
    fn nurturing_leads_still_receive_matches() {
        // Declining the shortlist parks the lead in nurture with a promise
        // to reach out when something fitting appears.
        let mut lead = qualified_lead();
        lead.status = LeadStatus::Nurturing;
        assert!(eligible(&lead));
    }

    #[test]
    fn closed_leads_are_ineligible() {
        for status in [LeadStatus::Won, LeadStatus::Lost] {
            let mut lead = qualified_lead();
            lead.status = status;
            assert!(!eligible(&lead), "{status} should not be re-marketed");
        }
    }
}
