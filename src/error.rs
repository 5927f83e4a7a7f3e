//! Reason-coded failures shared by every authentication and authorization flow.

use std::collections::HashMap;
use thiserror::Error;

/// Symbolic reason code carried by every typed failure.
///
/// Reason codes are stable identifiers for front ends and audit logs; the
/// human-readable text is resolved separately through a [`MessageCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    Unknown,
    Forbidden,
    VerifyFailed,
    InvalidIdentity,
    InvalidPassword,
    InvalidArgument,
    AccountUnapproved,
    AccountSuspended,
    AccountDisabled,
    SecretTooFrequently,
}

impl Reason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::Unknown => "unknown",
            Reason::Forbidden => "forbidden",
            Reason::VerifyFailed => "verify.failed",
            Reason::InvalidIdentity => "invalid.identity",
            Reason::InvalidPassword => "invalid.password",
            Reason::InvalidArgument => "invalid.argument",
            Reason::AccountUnapproved => "account.unapproved",
            Reason::AccountSuspended => "account.suspended",
            Reason::AccountDisabled => "account.disabled",
            Reason::SecretTooFrequently => "secret.too-frequently",
        }
    }

    /// Canonical fallback text used when a catalog has no registered entry.
    #[must_use]
    pub fn default_text(self) -> &'static str {
        match self {
            Reason::Unknown => "the operation failed for an unknown reason",
            Reason::Forbidden => "the operation is forbidden",
            Reason::VerifyFailed => "verification failed",
            Reason::InvalidIdentity => "the identity does not exist or is invalid",
            Reason::InvalidPassword => "the password is incorrect",
            Reason::InvalidArgument => "an argument is missing or invalid",
            Reason::AccountUnapproved => "the account has not been approved",
            Reason::AccountSuspended => "the account is temporarily suspended",
            Reason::AccountDisabled => "the account has been disabled",
            Reason::SecretTooFrequently => "a secret was requested too frequently",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure surfaced by authentication and authorization operations.
///
/// Verification failures are never silently swallowed; they propagate to the
/// orchestrator's caller as one of these variants. Transient store/cache
/// failures pass through as [`AuthError::Store`] without retry or masking;
/// retry policy belongs to the external store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown failure")]
    Unknown,
    #[error("forbidden")]
    Forbidden,
    #[error("verification failed")]
    VerifyFailed,
    #[error("invalid identity")]
    InvalidIdentity,
    #[error("invalid password")]
    InvalidPassword,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("account pending approval")]
    AccountUnapproved,
    #[error("account suspended")]
    AccountSuspended,
    #[error("account disabled")]
    AccountDisabled,
    #[error("secret requested too frequently")]
    SecretTooFrequently,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn reason(&self) -> Reason {
        match self {
            AuthError::Unknown | AuthError::Store(_) => Reason::Unknown,
            AuthError::Forbidden => Reason::Forbidden,
            AuthError::VerifyFailed => Reason::VerifyFailed,
            AuthError::InvalidIdentity => Reason::InvalidIdentity,
            AuthError::InvalidPassword => Reason::InvalidPassword,
            AuthError::InvalidArgument(_) => Reason::InvalidArgument,
            AuthError::AccountUnapproved => Reason::AccountUnapproved,
            AuthError::AccountSuspended => Reason::AccountSuspended,
            AuthError::AccountDisabled => Reason::AccountDisabled,
            AuthError::SecretTooFrequently => Reason::SecretTooFrequently,
        }
    }
}

/// Lookup table resolving a [`Reason`] to registered human-readable text.
///
/// Falls back to [`Reason::default_text`] when no entry is registered, so a
/// partially populated catalog never produces an empty message.
#[derive(Debug, Default, Clone)]
pub struct MessageCatalog {
    messages: HashMap<Reason, String>,
}

impl MessageCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, reason: Reason, text: impl Into<String>) -> &mut Self {
        self.messages.insert(reason, text.into());
        self
    }

    #[must_use]
    pub fn resolve(&self, reason: Reason) -> &str {
        self.messages
            .get(&reason)
            .map_or_else(|| reason.default_text(), String::as_str)
    }
}
