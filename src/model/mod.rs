//! Durable data model shared by the funnel, scheduler, and matcher.

pub mod campaign;
pub mod interaction;
pub mod lead;
pub mod property;

pub use campaign::FollowupCampaign;
pub use interaction::{Direction, Interaction};
pub use lead::{
    Channel, Grade, Language, Lead, LeadStatus, PaymentPreference, PropertyType, Purpose,
    TransactionType,
};
pub use property::{Property, PropertyMatchRecord};
