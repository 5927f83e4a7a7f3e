//! Credential ticket registry.
//!
//! [`CredentialRegistry`] owns ticket issuance and fronts an external
//! [`CredentialStore`] for persistence. Unregistration fires the ticket's
//! one-shot change token so derived caches (see [`MemoCache`]) evict
//! themselves. [`MemoryCredentialStore`] is the in-process store used
//! standalone and in tests.

mod memo;

pub use memo::MemoCache;

use crate::clock;
use crate::error::AuthError;
use crate::identity::ClaimsIdentity;
use crate::ticket::CredentialTicket;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// External persistence for registered tickets.
///
/// Renewal and lookup reject expired tickets at read time; the store is not
/// expected to evict them in the background.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn register(&self, ticket: CredentialTicket) -> Result<(), AuthError>;

    /// Remove a ticket; returns it when it was present.
    async fn unregister(&self, credential_id: &str) -> Result<Option<CredentialTicket>, AuthError>;

    /// Exchange a live ticket plus its renewal token for a fresh ticket.
    /// `None` when the id is unknown, expired, or the token does not match.
    async fn renew(
        &self,
        credential_id: &str,
        renewal_token: &str,
    ) -> Result<Option<CredentialTicket>, AuthError>;

    /// Touch a live ticket, returning its current state.
    async fn refresh(&self, credential_id: &str) -> Result<Option<CredentialTicket>, AuthError>;

    /// Look up the ticket for a presented credential id.
    async fn get_principal(&self, credential_id: &str)
        -> Result<Option<CredentialTicket>, AuthError>;
}

/// Issues tickets and delegates their lifecycle to a [`CredentialStore`].
pub struct CredentialRegistry {
    store: Arc<dyn CredentialStore>,
}

impl CredentialRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Issue a ticket wrapping `identity`; the ticket is not yet persisted.
    ///
    /// # Errors
    /// Fails when the scenario is invalid (see [`CredentialTicket::new`]).
    pub fn issue(
        &self,
        identity: ClaimsIdentity,
        scenario: &str,
        validity: Option<Duration>,
    ) -> Result<CredentialTicket, AuthError> {
        CredentialTicket::new(identity, scenario, validity)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn register(&self, ticket: CredentialTicket) -> Result<(), AuthError> {
        let credential_id = ticket.credential_id().to_string();
        self.store.register(ticket).await?;
        info!(credential_id = %credential_id, "credential ticket registered");
        Ok(())
    }

    /// Unregister a ticket and fire its change token.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn unregister(
        &self,
        credential_id: &str,
    ) -> Result<Option<CredentialTicket>, AuthError> {
        let removed = self.store.unregister(credential_id).await?;
        if let Some(ticket) = &removed {
            ticket.invalidate();
            info!(credential_id = %credential_id, "credential ticket unregistered");
        }
        Ok(removed)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn renew(
        &self,
        credential_id: &str,
        renewal_token: &str,
    ) -> Result<Option<CredentialTicket>, AuthError> {
        let renewed = self.store.renew(credential_id, renewal_token).await?;
        match &renewed {
            Some(ticket) => {
                info!(
                    old = %credential_id,
                    new = %ticket.credential_id(),
                    "credential ticket renewed"
                );
            }
            None => debug!(credential_id = %credential_id, "renewal rejected"),
        }
        Ok(renewed)
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn refresh(
        &self,
        credential_id: &str,
    ) -> Result<Option<CredentialTicket>, AuthError> {
        self.store.refresh(credential_id).await
    }

    /// # Errors
    /// Propagates store failures.
    pub async fn get_principal(
        &self,
        credential_id: &str,
    ) -> Result<Option<CredentialTicket>, AuthError> {
        self.store.get_principal(credential_id).await
    }
}

/// In-memory [`CredentialStore`]. Not durable; single-process only.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, CredentialTicket>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn register(&self, ticket: CredentialTicket) -> Result<(), AuthError> {
        let mut entries = self.entries.write().await;
        entries.insert(ticket.credential_id().to_string(), ticket);
        Ok(())
    }

    async fn unregister(&self, credential_id: &str) -> Result<Option<CredentialTicket>, AuthError> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(credential_id))
    }

    async fn renew(
        &self,
        credential_id: &str,
        renewal_token: &str,
    ) -> Result<Option<CredentialTicket>, AuthError> {
        let now = clock::now_unix();
        let mut entries = self.entries.write().await;
        let Some(current) = entries.get(credential_id) else {
            return Ok(None);
        };
        if current.is_expired(now) || current.renewal_token() != renewal_token {
            return Ok(None);
        }
        let renewed = current.renew();
        // The old ticket stops existing; its watchers are told exactly once.
        if let Some(old) = entries.remove(credential_id) {
            old.invalidate();
        }
        entries.insert(renewed.credential_id().to_string(), renewed.clone());
        Ok(Some(renewed))
    }

    async fn refresh(&self, credential_id: &str) -> Result<Option<CredentialTicket>, AuthError> {
        self.get_principal(credential_id).await
    }

    async fn get_principal(
        &self,
        credential_id: &str,
    ) -> Result<Option<CredentialTicket>, AuthError> {
        let now = clock::now_unix();
        {
            let entries = self.entries.read().await;
            match entries.get(credential_id) {
                Some(ticket) if !ticket.is_expired(now) => return Ok(Some(ticket.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired at read time: evict and notify, then report absence.
        let mut entries = self.entries.write().await;
        if let Some(ticket) = entries.get(credential_id) {
            if ticket.is_expired(now) {
                if let Some(dead) = entries.remove(credential_id) {
                    dead.invalidate();
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn registry() -> CredentialRegistry {
        CredentialRegistry::new(Arc::new(MemoryCredentialStore::new()))
    }

    fn identity() -> ClaimsIdentity {
        ClaimsIdentity::new("alice").with_role("admins")
    }

    #[tokio::test]
    async fn issue_register_lookup() -> Result<()> {
        let registry = registry();
        let ticket = registry.issue(identity(), "Web", None)?;
        assert_eq!(ticket.scenario(), "web");

        registry.register(ticket.clone()).await?;
        let found = registry
            .get_principal(ticket.credential_id())
            .await?
            .expect("registered");
        assert_eq!(found, ticket);
        assert_eq!(found.identity().subject, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn unregister_fires_the_change_token() -> Result<()> {
        let registry = registry();
        let ticket = registry.issue(identity(), "web", None)?;
        let watcher = ticket.watch();
        registry.register(ticket.clone()).await?;

        let removed = registry.unregister(ticket.credential_id()).await?;
        assert!(removed.is_some());
        assert!(watcher.has_fired());
        assert!(registry
            .get_principal(ticket.credential_id())
            .await?
            .is_none());
        Ok(())
    }

    #[tokio::test]
    async fn renew_swaps_the_ticket_and_invalidates_the_old_one() -> Result<()> {
        let registry = registry();
        let ticket = registry.issue(identity(), "web", None)?;
        let watcher = ticket.watch();
        registry.register(ticket.clone()).await?;

        let renewed = registry
            .renew(ticket.credential_id(), ticket.renewal_token())
            .await?
            .expect("renewed");
        assert_ne!(renewed.credential_id(), ticket.credential_id());
        assert_eq!(renewed.identity(), ticket.identity());
        assert!(watcher.has_fired());

        assert!(registry
            .get_principal(ticket.credential_id())
            .await?
            .is_none());
        assert!(registry
            .get_principal(renewed.credential_id())
            .await?
            .is_some());
        Ok(())
    }

    #[tokio::test]
    async fn renew_rejects_a_wrong_token() -> Result<()> {
        let registry = registry();
        let ticket = registry.issue(identity(), "web", None)?;
        registry.register(ticket.clone()).await?;

        let renewed = registry.renew(ticket.credential_id(), "wrong").await?;
        assert!(renewed.is_none());
        // The original stays live.
        assert!(registry
            .get_principal(ticket.credential_id())
            .await?
            .is_some());
        Ok(())
    }

    #[tokio::test]
    async fn expired_tickets_are_rejected_at_read_time() -> Result<()> {
        let registry = registry();
        let ticket = registry.issue(identity(), "web", Some(Duration::ZERO))?;
        let watcher = ticket.watch();
        registry.register(ticket.clone()).await?;

        assert!(registry
            .get_principal(ticket.credential_id())
            .await?
            .is_none());
        assert!(watcher.has_fired(), "eviction notifies watchers");
        assert!(registry
            .renew(ticket.credential_id(), ticket.renewal_token())
            .await?
            .is_none());
        Ok(())
    }
}
