//! The password authentication scheme.
//!
//! Verifies a presented password against the stored [`PasswordBlob`] of a
//! user record, consulting the attempt throttle *before* the comparison so a
//! locked-out identity never reaches the PBKDF2 derivation.

use super::{SchemeAuthenticator, Verification};
use crate::error::AuthError;
use crate::identity::{ClaimsIdentity, Parameters};
use crate::password::PasswordBlob;
use crate::throttle::AttemptThrottle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

pub const SCHEME: &str = "password";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Approved,
    Unapproved,
    Suspended,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub subject: String,
    pub password: PasswordBlob,
    pub status: AccountStatus,
    pub roles: Vec<String>,
    pub attributes: HashMap<String, String>,
}

impl UserRecord {
    #[must_use]
    pub fn new(subject: impl Into<String>, password: PasswordBlob) -> Self {
        Self {
            subject: subject.into(),
            password,
            status: AccountStatus::Approved,
            roles: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: AccountStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }
}

/// Lookup of user records by login key.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, key: &str) -> Result<Option<UserRecord>, AuthError>;
}

/// In-memory [`UserStore`].
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: impl Into<String>, record: UserRecord) {
        let mut users = self.users.write().await;
        users.insert(key.into(), record);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user(&self, key: &str) -> Result<Option<UserRecord>, AuthError> {
        let users = self.users.read().await;
        Ok(users.get(key).cloned())
    }
}

pub struct PasswordAuthenticator {
    users: Arc<dyn UserStore>,
    throttle: Arc<dyn AttemptThrottle>,
    issuer: String,
}

impl PasswordAuthenticator {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        throttle: Arc<dyn AttemptThrottle>,
        issuer: impl Into<String>,
    ) -> Self {
        Self {
            users,
            throttle,
            issuer: issuer.into(),
        }
    }
}

#[async_trait]
impl SchemeAuthenticator for PasswordAuthenticator {
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
        let user = self
            .users
            .find_user(key)
            .await?
            .ok_or(AuthError::InvalidIdentity)?;

        match user.status {
            AccountStatus::Approved => {}
            AccountStatus::Unapproved => return Err(AuthError::AccountUnapproved),
            AccountStatus::Suspended => return Err(AuthError::AccountSuspended),
            AccountStatus::Disabled => return Err(AuthError::AccountDisabled),
        }

        // Lockout is checked first; a suspended identity never reaches the
        // password comparison at all.
        if !self.throttle.verify(key, Some(SCHEME)).await? {
            return Err(AuthError::AccountSuspended);
        }

        if user.password.verify(data) {
            self.throttle.done(key, Some(SCHEME)).await?;
            Ok(Verification {
                subject: user.subject,
                roles: user.roles,
                attributes: user.attributes,
            })
        } else {
            let locked_out = self.throttle.fail(key, Some(SCHEME)).await?;
            if locked_out {
                warn!(key = %key, "lockout threshold exceeded");
            }
            Err(AuthError::InvalidPassword)
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
        identity.roles = verification.roles;
        identity.attributes = verification.attributes;
        Ok(Some(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::NoopThrottle;
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingThrottle {
        allow: std::sync::atomic::AtomicBool,
        failures: AtomicUsize,
        cleared: AtomicUsize,
    }

    impl RecordingThrottle {
        fn allowing(allow: bool) -> Self {
            let throttle = Self::default();
            throttle.allow.store(allow, Ordering::SeqCst);
            throttle
        }
    }

    #[async_trait]
    impl AttemptThrottle for RecordingThrottle {
        async fn verify(
            &self,
            _identity: &str,
            _namespace: Option<&str>,
        ) -> Result<bool, AuthError> {
            Ok(self.allow.load(Ordering::SeqCst))
        }

        async fn done(&self, _identity: &str, _namespace: Option<&str>) -> Result<(), AuthError> {
            self.cleared.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn fail(&self, _identity: &str, _namespace: Option<&str>) -> Result<bool, AuthError> {
            Ok(self.failures.fetch_add(1, Ordering::SeqCst) >= 2)
        }
    }

    async fn store_with(key: &str, record: UserRecord) -> Arc<MemoryUserStore> {
        let store = Arc::new(MemoryUserStore::new());
        store.insert(key, record).await;
        store
    }

    #[tokio::test]
    async fn correct_password_verifies_and_clears_failures() -> Result<()> {
        let record = UserRecord::new("alice", PasswordBlob::generate("s3cret")).with_role("staff");
        let store = store_with("alice", record).await;
        let throttle = Arc::new(RecordingThrottle::allowing(true));
        let authenticator =
            PasswordAuthenticator::new(store, Arc::clone(&throttle) as _, "portcullis");

        let verification = authenticator
            .verify("alice", "s3cret", "web", &Parameters::new())
            .await?;
        assert_eq!(verification.subject, "alice");
        assert_eq!(verification.roles, vec!["staff".to_string()]);
        assert_eq!(throttle.cleared.load(Ordering::SeqCst), 1);

        let identity = authenticator
            .issue(verification, "web", &Parameters::new())
            .await?
            .expect("identity");
        assert_eq!(identity.issuer.as_deref(), Some("portcullis"));
        assert_eq!(identity.roles, vec!["staff".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_records_a_failure() -> Result<()> {
        let record = UserRecord::new("alice", PasswordBlob::generate("s3cret"));
        let store = store_with("alice", record).await;
        let throttle = Arc::new(RecordingThrottle::allowing(true));
        let authenticator =
            PasswordAuthenticator::new(store, Arc::clone(&throttle) as _, "portcullis");

        let result = authenticator
            .verify("alice", "wrong", "web", &Parameters::new())
            .await;
        assert!(matches!(result, Err(AuthError::InvalidPassword)));
        assert_eq!(throttle.failures.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn locked_out_identity_never_reaches_the_comparison() -> Result<()> {
        let record = UserRecord::new("alice", PasswordBlob::generate("s3cret"));
        let store = store_with("alice", record).await;
        let throttle = Arc::new(RecordingThrottle::allowing(false));
        let authenticator =
            PasswordAuthenticator::new(store, Arc::clone(&throttle) as _, "portcullis");

        // Even the correct password is rejected while locked out.
        let result = authenticator
            .verify("alice", "s3cret", "web", &Parameters::new())
            .await;
        assert!(matches!(result, Err(AuthError::AccountSuspended)));
        assert_eq!(throttle.cleared.load(Ordering::SeqCst), 0);
        assert_eq!(throttle.failures.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn account_status_maps_to_reason_codes() -> Result<()> {
        let cases = [
            (AccountStatus::Unapproved, "account.unapproved"),
            (AccountStatus::Suspended, "account.suspended"),
            (AccountStatus::Disabled, "account.disabled"),
        ];
        for (status, reason) in cases {
            let record =
                UserRecord::new("alice", PasswordBlob::generate("s3cret")).with_status(status);
            let store = store_with("alice", record).await;
            let authenticator =
                PasswordAuthenticator::new(store, Arc::new(NoopThrottle), "portcullis");
            let err = authenticator
                .verify("alice", "s3cret", "web", &Parameters::new())
                .await
                .expect_err("status blocks login");
            assert_eq!(err.reason().as_str(), reason);
        }
        Ok(())
    }

    #[tokio::test]
    async fn unknown_user_is_an_invalid_identity() {
        let store = Arc::new(MemoryUserStore::new());
        let authenticator = PasswordAuthenticator::new(store, Arc::new(NoopThrottle), "portcullis");
        let result = authenticator
            .verify("ghost", "whatever", "web", &Parameters::new())
            .await;
        assert!(matches!(result, Err(AuthError::InvalidIdentity)));
    }
}
