//! The end-to-end authentication flow.
//!
//! A caller presents a scheme plus raw credentials. The orchestrator looks
//! the scheme up in an explicit [`SchemeRegistry`] (constructed at process
//! start and passed around, never a global), delegates verification and
//! identity issuance to the scheme's [`SchemeAuthenticator`], wraps the
//! resulting claims identity in a credential ticket, runs every registered
//! [`Challenger`], registers the ticket and returns it. Listeners observe the
//! flow but cannot abort it.

pub mod password;
pub mod secret;

use crate::error::AuthError;
use crate::identity::{ClaimsIdentity, Parameters};
use crate::registry::CredentialRegistry;
use crate::ticket::CredentialTicket;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// What a scheme authenticator learned about the caller during verification,
/// consumed by its `issue` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub subject: String,
    pub roles: Vec<String>,
    pub attributes: HashMap<String, String>,
}

impl Verification {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
            attributes: HashMap::new(),
        }
    }
}

/// One authentication scheme: verification of raw credentials, then issuance
/// of the claims identity.
#[async_trait]
pub trait SchemeAuthenticator: Send + Sync {
    /// The scheme name this authenticator registers under.
    fn scheme(&self) -> &str;

    /// Verify raw credentials. This is where password or secret comparison
    /// and attempt-throttle consultation happen; failures are typed errors.
    async fn verify(
        &self,
        key: &str,
        data: &str,
        scenario: &str,
        parameters: &Parameters,
    ) -> Result<Verification, AuthError>;

    /// Turn a successful verification into a claims identity. `None` means
    /// the identity could not be established after all.
    async fn issue(
        &self,
        verification: Verification,
        scenario: &str,
        parameters: &Parameters,
    ) -> Result<Option<ClaimsIdentity>, AuthError>;
}

/// A post-issuance hook that may veto the login before registration.
#[async_trait]
pub trait Challenger: Send + Sync {
    async fn challenge(
        &self,
        ticket: &CredentialTicket,
        scenario: &str,
        parameters: &Parameters,
    ) -> Result<(), AuthError>;
}

/// Observability hook around the flow; cannot abort it.
pub trait AuthenticationListener: Send + Sync {
    fn authenticating(&self, _scheme: &str, _key: &str, _scenario: &str) {}
    fn authenticated(&self, _ticket: &CredentialTicket) {}
}

/// Scheme-keyed authenticator lookup, case-insensitive on the scheme name.
#[derive(Default)]
pub struct SchemeRegistry {
    schemes: HashMap<String, Arc<dyn SchemeAuthenticator>>,
}

impl SchemeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, authenticator: Arc<dyn SchemeAuthenticator>) -> Self {
        self.register(authenticator);
        self
    }

    pub fn register(&mut self, authenticator: Arc<dyn SchemeAuthenticator>) {
        self.schemes
            .insert(authenticator.scheme().to_lowercase(), authenticator);
    }

    #[must_use]
    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn SchemeAuthenticator>> {
        self.schemes.get(&scheme.trim().to_lowercase())
    }
}

/// Drives `verify -> issue -> wrap -> challenge -> register`.
pub struct Authenticator {
    schemes: SchemeRegistry,
    registry: CredentialRegistry,
    challengers: Vec<Arc<dyn Challenger>>,
    listeners: Vec<Arc<dyn AuthenticationListener>>,
}

impl Authenticator {
    #[must_use]
    pub fn new(schemes: SchemeRegistry, registry: CredentialRegistry) -> Self {
        Self {
            schemes,
            registry,
            challengers: Vec::new(),
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_challenger(mut self, challenger: Arc<dyn Challenger>) -> Self {
        self.challengers.push(challenger);
        self
    }

    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn AuthenticationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Authenticate `key` under `scheme` and return the registered ticket.
    ///
    /// # Errors
    /// - [`AuthError::InvalidArgument`] when no authenticator is registered
    ///   for the scheme.
    /// - [`AuthError::InvalidIdentity`] when issuance yields no identity.
    /// - Whatever the scheme authenticator, a challenger, or the credential
    ///   store raises; verification failures are never swallowed.
    pub async fn authenticate(
        &self,
        scheme: &str,
        key: &str,
        data: &str,
        scenario: &str,
        parameters: &Parameters,
    ) -> Result<CredentialTicket, AuthError> {
        for listener in &self.listeners {
            listener.authenticating(scheme, key, scenario);
        }
        debug!(scheme = %scheme, key = %key, scenario = %scenario, "authenticating");

        let authenticator = self.schemes.get(scheme).ok_or_else(|| {
            AuthError::InvalidArgument(format!("no authenticator for scheme: {scheme}"))
        })?;

        let verification = authenticator.verify(key, data, scenario, parameters).await?;
        let identity = authenticator
            .issue(verification, scenario, parameters)
            .await?
            .ok_or(AuthError::InvalidIdentity)?;

        let ticket = self.registry.issue(identity, scenario, None)?;
        for challenger in &self.challengers {
            challenger.challenge(&ticket, scenario, parameters).await?;
        }

        self.registry.register(ticket.clone()).await?;
        for listener in &self.listeners {
            listener.authenticated(&ticket);
        }
        info!(
            scheme = %scheme,
            credential_id = %ticket.credential_id(),
            scenario = %ticket.scenario(),
            "authenticated"
        );
        Ok(ticket)
    }

    #[must_use]
    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }
}
