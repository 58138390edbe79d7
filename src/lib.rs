//! Leadflow — multi-tenant lead engagement core.
//!
//! Qualifies, scores, and re-engages sales leads arriving through messaging
//! channels. Channel adapters, HTTP routing, billing, and rendering live in
//! sibling services; this crate owns the conversation funnel, lead identity,
//! follow-up scheduling, and property matching.

pub mod config;
pub mod engine;
pub mod error;
pub mod followup;
pub mod matcher;
pub mod model;
pub mod outbound;
pub mod resolver;
pub mod scoring;
pub mod session;
pub mod store;
