//! Identity resolution — every inbound contact observation maps to exactly
//! one lead per tenant.
//!
//! Lookup precedence is profile URL, then channel identity, then phone.
//! Merging is fill-only-empty: an existing value on the lead always wins
//! over a newly observed one, so resolving the same observation twice is a
//! no-op.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{Result, ValidationError};
use crate::model::{Channel, Lead};
use crate::scoring;
use crate::store::LeadStore;

/// What one inbound event tells us about the person behind it.
#[derive(Debug, Clone, Default)]
pub struct ObservedContact {
    pub profile_url: Option<String>,
    pub channel: Option<Channel>,
    pub channel_user_id: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
}

impl ObservedContact {
    fn channel_identity(&self) -> Option<(Channel, &str)> {
        match (self.channel, self.channel_user_id.as_deref()) {
            (Some(ch), Some(id)) if !id.is_empty() => Some((ch, id)),
            _ => None,
        }
    }

    fn has_identity_key(&self) -> bool {
        self.profile_url.as_deref().is_some_and(|u| !u.is_empty())
            || self.channel_identity().is_some()
            || self.phone.as_deref().is_some_and(|p| !p.is_empty())
    }
}

pub struct IdentityResolver {
    store: Arc<dyn LeadStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }

    /// Find or create the lead for an observation. Returns the lead and
    /// whether it was newly created.
    pub async fn resolve(
        &self,
        tenant_id: &str,
        observed: &ObservedContact,
    ) -> Result<(Lead, bool)> {
        if !observed.has_identity_key() {
            return Err(ValidationError::NoIdentity.into());
        }

        if let Some(mut lead) = self.lookup(tenant_id, observed).await? {
            let changed = merge(&mut lead, observed);
            if changed {
                lead.updated_at = Utc::now();
                scoring::refresh_score(&mut lead);
                self.store.update_lead(&lead).await?;
                debug!(lead_id = %lead.id, "Merged new contact details into lead");
            }
            return Ok((lead, false));
        }

        let mut lead = Lead::new(tenant_id);
        merge(&mut lead, observed);
        scoring::refresh_score(&mut lead);
        self.store.insert_lead(&lead).await?;
        info!(lead_id = %lead.id, tenant_id, "Created lead");
        Ok((lead, true))
    }

    async fn lookup(
        &self,
        tenant_id: &str,
        observed: &ObservedContact,
    ) -> Result<Option<Lead>> {
        if let Some(url) = observed.profile_url.as_deref().filter(|u| !u.is_empty()) {
            if let Some(lead) = self.store.find_by_profile_url(tenant_id, url).await? {
                return Ok(Some(lead));
            }
        }
        if let Some((channel, user_id)) = observed.channel_identity() {
            if let Some(lead) = self
                .store
                .find_by_channel_identity(tenant_id, channel, user_id)
                .await?
            {
                return Ok(Some(lead));
            }
        }
        if let Some(phone) = observed.phone.as_deref().filter(|p| !p.is_empty()) {
            if let Some(lead) = self.store.find_by_phone(tenant_id, phone).await? {
                return Ok(Some(lead));
            }
        }
        Ok(None)
    }
}

/// Copy observed fields onto the lead where the lead has none. Returns
/// whether anything changed.
fn merge(lead: &mut Lead, observed: &ObservedContact) -> bool {
    let mut changed = false;
    if lead.profile_url.is_none() && observed.profile_url.is_some() {
        lead.profile_url = observed.profile_url.clone();
        changed = true;
    }
    if lead.channel_user_id.is_none() {
        if let Some((channel, user_id)) = observed.channel_identity() {
            lead.channel = Some(channel);
            lead.channel_user_id = Some(user_id.to_string());
            changed = true;
        }
    }
    if lead.phone.is_none() && observed.phone.is_some() {
        lead.phone = observed.phone.clone();
        changed = true;
    }
    if lead.display_name.is_none() && observed.display_name.is_some() {
        lead.display_name = observed.display_name.clone();
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::LibSqlStore;

    async fn resolver() -> IdentityResolver {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        IdentityResolver::new(store)
    }

    fn telegram_contact(user_id: &str) -> ObservedContact {
        ObservedContact {
            channel: Some(Channel::Telegram),
            channel_user_id: Some(user_id.to_string()),
            display_name: Some("Dana".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn no_identity_key_is_rejected() {
        let resolver = resolver().await;
        let observed = ObservedContact {
            display_name: Some("Anonymous".into()),
            ..Default::default()
        };
        let err = resolver.resolve("t1", &observed).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NoIdentity)
        ));
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let resolver = resolver().await;
        let observed = telegram_contact("u1");

        let (first, created) = resolver.resolve("t1", &observed).await.unwrap();
        assert!(created);
        let (second, created) = resolver.resolve("t1", &observed).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(first.updated_at, second.updated_at, "no-op must not write");
    }

    #[tokio::test]
    async fn merge_fills_only_empty_fields() {
        let resolver = resolver().await;
        let (lead, _) = resolver.resolve("t1", &telegram_contact("u1")).await.unwrap();

        let richer = ObservedContact {
            channel: Some(Channel::Telegram),
            channel_user_id: Some("u1".into()),
            phone: Some("+971500000001".into()),
            display_name: Some("Someone Else".into()),
            ..Default::default()
        };
        let (merged, created) = resolver.resolve("t1", &richer).await.unwrap();
        assert!(!created);
        assert_eq!(merged.id, lead.id);
        assert_eq!(merged.phone.as_deref(), Some("+971500000001"));
        // Existing name wins.
        assert_eq!(merged.display_name.as_deref(), Some("Dana"));
    }

    #[tokio::test]
    async fn profile_url_takes_precedence_over_phone() {
        let resolver = resolver().await;
        let by_url = ObservedContact {
            profile_url: Some("https://example.com/p/dana".into()),
            phone: Some("+971500000002".into()),
            ..Default::default()
        };
        let (first, _) = resolver.resolve("t1", &by_url).await.unwrap();

        // A second lead owns a different URL but nothing else; the shared
        // phone must not pull the observation onto it.
        let (again, created) = resolver.resolve("t1", &by_url).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let resolver = resolver().await;
        let observed = telegram_contact("u1");
        let (a, _) = resolver.resolve("t1", &observed).await.unwrap();
        let (b, created) = resolver.resolve("t2", &observed).await.unwrap();
        assert!(created);
        assert_ne!(a.id, b.id);
    }
}
