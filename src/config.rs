//! Engine configuration.

use std::time::Duration;

/// Tunables for the engagement engine. One instance is shared by the
/// scheduler, notifier, and session cache; all of them stay stateless across
/// invocations.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between successful follow-up touches.
    pub followup_interval: Duration,
    /// Maximum automated follow-up touches per lead.
    pub max_followups: u32,
    /// Delivery attempts per outbound send before deferring.
    pub send_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
    /// Age after which another worker's claim is treated as abandoned.
    pub claim_ttl: Duration,
    /// Routing-session idle expiry.
    pub session_ttl: Duration,
    /// Default number of leads claimed per scheduler cycle.
    pub batch_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            followup_interval: Duration::from_secs(3 * 24 * 3600), // 3 days
            max_followups: 5,
            send_attempts: 3,
            backoff_base: Duration::from_millis(500),
            claim_ttl: Duration::from_secs(600), // 10 minutes
            session_ttl: Duration::from_secs(24 * 3600),
            batch_size: 50,
        }
    }
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("LEADFLOW_FOLLOWUP_DAYS") {
            if let Ok(days) = v.parse::<u64>() {
                cfg.followup_interval = Duration::from_secs(days * 24 * 3600);
            }
        }
        if let Ok(v) = std::env::var("LEADFLOW_BATCH_SIZE") {
            if let Ok(n) = v.parse() {
                cfg.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var("LEADFLOW_SESSION_TTL_SECS") {
            if let Ok(secs) = v.parse() {
                cfg.session_ttl = Duration::from_secs(secs);
            }
        }
        cfg
    }
}
