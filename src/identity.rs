//! The claims identity record.
//!
//! A plain structured record rather than a platform principal type: every
//! transformation and challenger hook operates on this shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Context parameters threaded through authentication and authorization calls.
pub type Parameters = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsIdentity {
    /// Who the claims are about; empty means anonymous.
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
    /// Expiry claim as unix seconds; `None` means no identity-level expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl ClaimsIdentity {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            issuer: None,
            roles: Vec::new(),
            attributes: HashMap::new(),
            expires_at: None,
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new("")
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.subject.trim().is_empty()
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}
