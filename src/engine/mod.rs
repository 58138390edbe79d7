//! Conversation engine — the qualification funnel.
//!
//! Advances one lead through a bounded sequence of slot-filling questions,
//! one inbound envelope at a time. Off-topic input is answered through the
//! external knowledge responder and the pending question is re-asked, so the
//! funnel position is never lost to a side conversation.

pub mod advance;
pub mod messages;
pub mod processor;
pub mod state;
pub mod types;

pub use advance::ConversationEngine;
pub use processor::MessageProcessor;
pub use state::{FunnelState, Slot};
pub use types::{Advance, InboundEnvelope, LeadPatch};
