//! Automated follow-up pipeline.
//!
//! A scheduler cycle claims due leads from the shared store, sends the next
//! stage message with bounded retries, and reschedules or retires each lead.
//! All state lives in the database; any worker can run any cycle.

pub mod campaign;
pub mod retry;
pub mod scheduler;
pub mod stages;

pub use campaign::CampaignRunner;
pub use scheduler::{CycleStats, FollowupScheduler};
