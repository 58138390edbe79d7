//! Lead scoring — a pure function of the lead's current fields.
//!
//! Score and grade are recomputed wholesale before every persist, never
//! patched incrementally, so they cannot drift from their source fields.

use crate::model::{Grade, Lead};

const CONTACT_WEIGHT: u32 = 30;
const ENGAGEMENT_WEIGHT: u32 = 20;
const QUALIFICATION_WEIGHT: u32 = 30;
const INTENT_WEIGHT: u32 = 20;

/// Compute the 0–100 score from the lead's fields. Deterministic: depends
/// only on the argument, never on the clock or prior stored score.
pub fn score_lead(lead: &Lead) -> u8 {
    let score = contact_bucket(lead)
        + engagement_bucket(lead)
        + qualification_bucket(lead)
        + intent_bucket(lead);
    score.min(100) as u8
}

/// Step function from score to letter grade.
pub fn grade_for(score: u8) -> Grade {
    match score {
        80..=100 => Grade::A,
        60..=79 => Grade::B,
        40..=59 => Grade::C,
        _ => Grade::D,
    }
}

/// Recompute and store score and grade on the lead.
pub fn refresh_score(lead: &mut Lead) {
    lead.score = score_lead(lead);
    lead.grade = grade_for(lead.score);
}

/// Contact completeness: can we actually reach and identify this person?
fn contact_bucket(lead: &Lead) -> u32 {
    let mut pts = 0;
    if lead.phone.is_some() {
        pts += 12;
    }
    if lead.reachable_channel().is_some() {
        pts += 8;
    }
    if lead.profile_url.is_some() {
        pts += 5;
    }
    if lead.display_name.is_some() {
        pts += 5;
    }
    pts.min(CONTACT_WEIGHT)
}

/// Engagement volume, capped so chattiness alone can't dominate.
fn engagement_bucket(lead: &Lead) -> u32 {
    let received = lead.messages_received.min(12);
    let sent = lead.messages_sent.min(8);
    (received + sent).min(ENGAGEMENT_WEIGHT)
}

/// Qualification completeness: six attributes, five points each.
fn qualification_bucket(lead: &Lead) -> u32 {
    let mut filled = 0;
    if lead.transaction_type.is_some() {
        filled += 1;
    }
    if lead.property_type.is_some() {
        filled += 1;
    }
    if lead.budget_min.is_some() || lead.budget_max.is_some() {
        filled += 1;
    }
    if !lead.locations.is_empty() {
        filled += 1;
    }
    if lead.purpose.is_some() {
        filled += 1;
    }
    if lead.payment_preference.is_some() {
        filled += 1;
    }
    (filled * 5).min(QUALIFICATION_WEIGHT)
}

/// Explicit intent: viewing and favoriting properties.
fn intent_bucket(lead: &Lead) -> u32 {
    let viewed = (lead.viewed_property_ids.len() as u32 * 2).min(8);
    let favorited = (lead.favorited_property_ids.len() as u32 * 4).min(12);
    (viewed + favorited).min(INTENT_WEIGHT)
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::model::{Channel, Lead, PropertyType, Purpose, TransactionType};

    #[test]
    fn empty_lead_scores_zero_grade_d() {
        let lead = Lead::new("t");
        assert_eq!(score_lead(&lead), 0);
        assert_eq!(grade_for(0), Grade::D);
    }

    #[test]
    fn score_is_pure() {
        let mut lead = Lead::new("t");
        lead.phone = Some("+97150".into());
        lead.transaction_type = Some(TransactionType::Buy);
        lead.messages_received = 4;

        let first = score_lead(&lead);
        // A stale stored score must not influence the computation.
        lead.score = 99;
        let second = score_lead(&lead);
        assert_eq!(first, second);
    }

    #[test]
    fn fully_loaded_lead_caps_at_100_and_grades_a() {
        let mut lead = Lead::new("t");
        lead.phone = Some("+97150".into());
        lead.channel = Some(Channel::Whatsapp);
        lead.channel_user_id = Some("wa-1".into());
        lead.profile_url = Some("https://example.com/p/1".into());
        lead.display_name = Some("Dana".into());
        lead.messages_received = 50;
        lead.messages_sent = 50;
        lead.transaction_type = Some(TransactionType::Buy);
        lead.property_type = Some(PropertyType::Apartment);
        lead.budget_min = Some(dec!(1_000_000));
        lead.budget_max = Some(dec!(2_500_000));
        lead.locations = vec!["Marina".into()];
        lead.purpose = Some(Purpose::Investment);
        lead.payment_preference = Some(crate::model::PaymentPreference::Cash);
        lead.viewed_property_ids = vec![Uuid::new_v4(); 10];
        lead.favorited_property_ids = vec![Uuid::new_v4(); 10];

        let score = score_lead(&lead);
        assert_eq!(score, 100);
        assert_eq!(grade_for(score), Grade::A);
    }

    #[test]
    fn grade_steps() {
        assert_eq!(grade_for(80), Grade::A);
        assert_eq!(grade_for(79), Grade::B);
        assert_eq!(grade_for(60), Grade::B);
        assert_eq!(grade_for(59), Grade::C);
        assert_eq!(grade_for(40), Grade::C);
        assert_eq!(grade_for(39), Grade::D);
    }

    #[test]
    fn refresh_keeps_score_and_grade_in_lockstep() {
        let mut lead = Lead::new("t");
        lead.phone = Some("+97150".into());
        lead.display_name = Some("Omar".into());
        lead.messages_received = 12;
        lead.messages_sent = 8;
        lead.transaction_type = Some(TransactionType::Rent);
        lead.property_type = Some(PropertyType::Villa);
        lead.budget_max = Some(dec!(200_000));
        lead.purpose = Some(Purpose::Residence);
        refresh_score(&mut lead);
        assert_eq!(lead.score, score_lead(&lead));
        assert_eq!(lead.grade, grade_for(lead.score));
    }
}
