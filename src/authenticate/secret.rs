//! The one-time-secret authentication scheme.
//!
//! Verifies a presented code against the vault entry for the caller's key and
//! consumes it on success, so each issued code authenticates at most once.

use super::{SchemeAuthenticator, Verification};
use crate::error::AuthError;
use crate::identity::{ClaimsIdentity, Parameters};
use crate::secret::SecretVault;
use async_trait::async_trait;
use std::sync::Arc;

pub const SCHEME: &str = "secret";

/// Attribute key under which a secret's bound extra payload is surfaced.
pub const EXTRA_ATTRIBUTE: &str = "secret.extra";

pub struct SecretAuthenticator {
    vault: Arc<SecretVault>,
    issuer: String,
}

impl SecretAuthenticator {
    #[must_use]
    pub fn new(vault: Arc<SecretVault>, issuer: impl Into<String>) -> Self {
        Self {
            vault,
            issuer: issuer.into(),
        }
    }

    /// The vault name a caller's one-time codes live under.
    #[must_use]
    pub fn secret_name(key: &str) -> String {
        format!("{SCHEME}:{key}")
    }
}

#[async_trait]
impl SchemeAuthenticator for SecretAuthenticator {
    fn scheme(&self) -> &str {
        SCHEME
    }

    async fn verify(
        &self,
        key: &str,
        data: &str,
        _scenario: &str,
        _parameters: &Parameters,
    ) -> Result<Verification, AuthError> {
        // Removal is the comparison: a match consumes the code.
        match self.vault.remove(&Self::secret_name(key), data).await? {
            Some(payload) => {
                let mut verification = Verification::new(key);
                if let Some(extra) = payload.extra {
                    verification
                        .attributes
                        .insert(EXTRA_ATTRIBUTE.to_string(), extra);
                }
                Ok(verification)
            }
            None => Err(AuthError::VerifyFailed),
        }
    }

    async fn issue(
        &self,
        verification: Verification,
        _scenario: &str,
        _parameters: &Parameters,
    ) -> Result<Option<ClaimsIdentity>, AuthError> {
        let mut identity =
            ClaimsIdentity::new(verification.subject).with_issuer(self.issuer.clone());
        identity.attributes = verification.attributes;
        Ok(Some(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use anyhow::Result;

    fn vault() -> Arc<SecretVault> {
        Arc::new(SecretVault::new(Arc::new(MemoryCache::new())))
    }

    #[tokio::test]
    async fn issued_code_authenticates_once() -> Result<()> {
        let vault = vault();
        let authenticator = SecretAuthenticator::new(Arc::clone(&vault), "portcullis");
        let code = vault
            .generate(&SecretAuthenticator::secret_name("alice"), "#6", None)
            .await?;

        let verification = authenticator
            .verify("alice", &code, "web", &Parameters::new())
            .await?;
        assert_eq!(verification.subject, "alice");

        // The code was consumed by the successful verification.
        let replay = authenticator
            .verify("alice", &code, "web", &Parameters::new())
            .await;
        assert!(matches!(replay, Err(AuthError::VerifyFailed)));
        Ok(())
    }

    #[tokio::test]
    async fn extra_payload_surfaces_as_an_attribute() -> Result<()> {
        let vault = vault();
        let authenticator = SecretAuthenticator::new(Arc::clone(&vault), "portcullis");
        let code = vault
            .generate(
                &SecretAuthenticator::secret_name("bob"),
                "#6",
                Some("enroll"),
            )
            .await?;

        let verification = authenticator
            .verify("bob", &code, "web", &Parameters::new())
            .await?;
        let identity = authenticator
            .issue(verification, "web", &Parameters::new())
            .await?
            .expect("identity");
        assert_eq!(
            identity.attributes.get(EXTRA_ATTRIBUTE).map(String::as_str),
            Some("enroll")
        );
        Ok(())
    }

    #[tokio::test]
    async fn wrong_code_is_a_verify_failure() -> Result<()> {
        let vault = vault();
        let authenticator = SecretAuthenticator::new(Arc::clone(&vault), "portcullis");
        vault
            .generate(&SecretAuthenticator::secret_name("alice"), "#6", None)
            .await?;

        let result = authenticator
            .verify("alice", "ABCDEF", "web", &Parameters::new())
            .await;
        assert!(matches!(result, Err(AuthError::VerifyFailed)));
        Ok(())
    }
}
