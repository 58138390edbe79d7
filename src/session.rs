//! Routing sessions — map a channel identity to the tenant it is talking to.
//!
//! A conversation starts with a bootstrap token (`start_{vertical}_{tenant}`)
//! carried in the first message, usually injected by a deep link. The router
//! caches the mapping in memory with an idle TTL; messages with no token and
//! no live session are unroutable and dropped upstream.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::error::SessionError;
use crate::model::Channel;

/// Parsed bootstrap token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapToken {
    pub vertical: String,
    pub tenant_id: String,
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^start_([a-z]+)_([A-Za-z0-9-]+)$").unwrap())
}

/// Parse a bootstrap token out of a message body.
///
/// `Ok(None)` means the text is not a token at all; `Err` means it clearly
/// tried to be one and is malformed.
pub fn parse_token(text: &str) -> Result<Option<BootstrapToken>, SessionError> {
    let trimmed = text.trim();
    if let Some(caps) = token_re().captures(trimmed) {
        return Ok(Some(BootstrapToken {
            vertical: caps[1].to_string(),
            tenant_id: caps[2].to_string(),
        }));
    }
    if trimmed.starts_with("start_") {
        return Err(SessionError::MalformedToken(trimmed.to_string()));
    }
    Ok(None)
}

#[derive(Debug, Clone)]
struct Session {
    tenant_id: String,
    vertical: String,
    last_seen: DateTime<Utc>,
}

/// Resolved routing context for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingContext {
    pub tenant_id: String,
    pub vertical: String,
}

/// In-memory session cache keyed by (channel, external user id).
///
/// Sessions only affect routing; losing them is harmless beyond requiring a
/// fresh token, so a process restart wiping the map is acceptable.
pub struct SessionRouter {
    sessions: RwLock<HashMap<(Channel, String), Session>>,
    ttl: Duration,
}

impl SessionRouter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Route one inbound message. A token creates or retargets the session;
    /// any routed message refreshes the idle clock. Returns `None` when the
    /// message cannot be attributed to a tenant.
    pub fn route(
        &self,
        channel: Channel,
        external_user_id: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RoutingContext>, SessionError> {
        let key = (channel, external_user_id.to_string());

        if let Some(token) = parse_token(text)? {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            sessions.insert(
                key,
                Session {
                    tenant_id: token.tenant_id.clone(),
                    vertical: token.vertical.clone(),
                    last_seen: now,
                },
            );
            debug!(%channel, tenant_id = %token.tenant_id, "Session started from token");
            return Ok(Some(RoutingContext {
                tenant_id: token.tenant_id,
                vertical: token.vertical,
            }));
        }

        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(&key) {
            Some(session) if now - session.last_seen <= chrono::Duration::from_std(self.ttl).unwrap_or_default() => {
                session.last_seen = now;
                Ok(Some(RoutingContext {
                    tenant_id: session.tenant_id.clone(),
                    vertical: session.vertical.clone(),
                }))
            }
            Some(_) => {
                sessions.remove(&key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Drop sessions idle past the TTL.
    pub fn prune(&self, now: DateTime<Utc>) {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_default();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_seen <= ttl);
        let pruned = before - sessions.len();
        if pruned > 0 {
            debug!(pruned, "Pruned idle routing sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> SessionRouter {
        SessionRouter::new(Duration::from_secs(3600))
    }

    #[test]
    fn token_parses_vertical_and_tenant() {
        let token = parse_token("start_realestate_acme-1").unwrap().unwrap();
        assert_eq!(token.vertical, "realestate");
        assert_eq!(token.tenant_id, "acme-1");
    }

    #[test]
    fn malformed_token_is_an_error() {
        assert!(parse_token("start_").is_err());
        assert!(parse_token("start_realestate").is_err());
        assert!(parse_token("start_RealEstate_acme").is_err());
    }

    #[test]
    fn plain_text_is_not_a_token() {
        assert_eq!(parse_token("hello there").unwrap(), None);
        assert_eq!(parse_token("restart_please").unwrap(), None);
    }

    #[test]
    fn token_starts_session_and_later_messages_route() {
        let router = router();
        let now = Utc::now();
        let ctx = router
            .route(Channel::Telegram, "u1", "start_realestate_acme", now)
            .unwrap()
            .unwrap();
        assert_eq!(ctx.tenant_id, "acme");

        let later = now + chrono::Duration::minutes(5);
        let ctx = router
            .route(Channel::Telegram, "u1", "hello", later)
            .unwrap()
            .unwrap();
        assert_eq!(ctx.tenant_id, "acme");
    }

    #[test]
    fn tokenless_unknown_user_is_unroutable() {
        let router = router();
        let routed = router
            .route(Channel::Whatsapp, "stranger", "hi", Utc::now())
            .unwrap();
        assert!(routed.is_none());
    }

    #[test]
    fn expired_session_requires_new_token() {
        let router = SessionRouter::new(Duration::from_secs(60));
        let now = Utc::now();
        router
            .route(Channel::Telegram, "u1", "start_realestate_acme", now)
            .unwrap();
        let late = now + chrono::Duration::minutes(5);
        assert!(router.route(Channel::Telegram, "u1", "hello", late).unwrap().is_none());
    }

    #[test]
    fn activity_refreshes_the_idle_clock() {
        let router = SessionRouter::new(Duration::from_secs(60));
        let now = Utc::now();
        router
            .route(Channel::Telegram, "u1", "start_realestate_acme", now)
            .unwrap();
        let t1 = now + chrono::Duration::seconds(50);
        assert!(router.route(Channel::Telegram, "u1", "one", t1).unwrap().is_some());
        let t2 = t1 + chrono::Duration::seconds(50);
        assert!(router.route(Channel::Telegram, "u1", "two", t2).unwrap().is_some());
    }

    #[test]
    fn new_token_retargets_existing_session() {
        let router = router();
        let now = Utc::now();
        router
            .route(Channel::Telegram, "u1", "start_realestate_acme", now)
            .unwrap();
        let ctx = router
            .route(Channel::Telegram, "u1", "start_realestate_globex", now)
            .unwrap()
            .unwrap();
        assert_eq!(ctx.tenant_id, "globex");
    }

    #[test]
    fn prune_drops_only_idle_sessions() {
        let router = SessionRouter::new(Duration::from_secs(60));
        let now = Utc::now();
        router
            .route(Channel::Telegram, "idle", "start_realestate_acme", now)
            .unwrap();
        let later = now + chrono::Duration::seconds(90);
        router
            .route(Channel::Telegram, "fresh", "start_realestate_acme", later)
            .unwrap();
        router.prune(later);
        assert!(router.route(Channel::Telegram, "idle", "hi", later).unwrap().is_none());
        assert!(router.route(Channel::Telegram, "fresh", "hi", later).unwrap().is_some());
    }
}
