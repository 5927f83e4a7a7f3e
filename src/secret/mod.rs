//! One-time secrets over an expiring key-value cache.
//!
//! A secret lives under a prefixed, case-normalized name. Its packed cache
//! value is `code|timestamp[|extra]`: the generated code, the issue time in
//! unix seconds, and an optional caller payload bound to the secret. The TTL
//! (`expiry`) bounds the secret's life; a second timer (`period`) is the
//! minimum re-issue interval, derived from the packed timestamp at read time.
//!
//! Lifecycle per name: absent, issued, then verified any number of times
//! (non-destructive) until removed or expired. [`SecretVault::remove`] is the
//! single-use consumption path.

mod pattern;

use crate::cache::ExpiringCache;
use crate::clock;
use crate::error::AuthError;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const KEY_PREFIX: &str = "secret:";

#[derive(Debug, Clone, Copy)]
pub struct SecretOptions {
    /// Cache TTL for issued secrets.
    pub expiry: Duration,
    /// Minimum interval between issues for the same name; zero disables it.
    pub period: Duration,
}

impl Default for SecretOptions {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(10 * 60),
            period: Duration::from_secs(60),
        }
    }
}

/// A matched secret: the stored code, its issue time, and any bound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretPayload {
    pub code: String,
    pub issued_at: i64,
    pub extra: Option<String>,
}

pub struct SecretVault {
    cache: Arc<dyn ExpiringCache>,
    options: SecretOptions,
}

impl SecretVault {
    #[must_use]
    pub fn new(cache: Arc<dyn ExpiringCache>) -> Self {
        Self::with_options(cache, SecretOptions::default())
    }

    #[must_use]
    pub fn with_options(cache: Arc<dyn ExpiringCache>, options: SecretOptions) -> Self {
        Self { cache, options }
    }

    /// Whether a live secret exists under `name`, and its age if so.
    ///
    /// # Errors
    /// Returns an error for an empty name or a cache failure.
    pub async fn exists(&self, name: &str) -> Result<Option<Duration>, AuthError> {
        let key = secret_key(name)?;
        let Some(value) = self.cache.try_get(&key).await? else {
            return Ok(None);
        };
        let now = clock::now_unix();
        Ok(unpack(&value).map(|payload| {
            let age = (now - payload.issued_at).max(0);
            Duration::from_secs(age as u64)
        }))
    }

    /// Issue a new secret under `name`, generated per `pattern`, optionally
    /// binding an `extra` payload returned again on verification.
    ///
    /// # Errors
    /// Fails with [`AuthError::SecretTooFrequently`] when a live secret was
    /// issued less than `period` ago, with [`AuthError::InvalidArgument`] for
    /// a bad name or pattern, and with [`AuthError::Store`] on cache failure.
    pub async fn generate(
        &self,
        name: &str,
        pattern: &str,
        extra: Option<&str>,
    ) -> Result<String, AuthError> {
        self.generate_at(name, pattern, extra, clock::now_unix())
            .await
    }

    async fn generate_at(
        &self,
        name: &str,
        pattern: &str,
        extra: Option<&str>,
        now: i64,
    ) -> Result<String, AuthError> {
        let key = secret_key(name)?;
        if !self.options.period.is_zero() {
            // A malformed previous value never blocks re-issue.
            if let Some(value) = self.cache.try_get(&key).await? {
                if let Some(previous) = unpack(&value) {
                    let elapsed = (now - previous.issued_at).max(0) as u64;
                    if elapsed < self.options.period.as_secs() {
                        return Err(AuthError::SecretTooFrequently);
                    }
                }
            }
        }

        let code = pattern::generate_code(pattern)?;
        self.cache
            .set(&key, pack(&code, now, extra), Some(self.options.expiry))
            .await?;
        debug!(name = %key, "issued one-time secret");
        Ok(code)
    }

    /// Check a code against the live secret without consuming it.
    ///
    /// Verification is repeatable within the TTL; the comparison is
    /// case-insensitive. A malformed cached value is a mismatch, not an error.
    ///
    /// # Errors
    /// Returns an error for an empty name or a cache failure.
    pub async fn verify(&self, name: &str, code: &str) -> Result<Option<SecretPayload>, AuthError> {
        let key = secret_key(name)?;
        let Some(value) = self.cache.try_get(&key).await? else {
            return Ok(None);
        };
        Ok(matched(&value, code))
    }

    /// Check a code and consume the secret on success (single use).
    ///
    /// # Errors
    /// Returns an error for an empty name or a cache failure.
    pub async fn remove(&self, name: &str, code: &str) -> Result<Option<SecretPayload>, AuthError> {
        let key = secret_key(name)?;
        let Some(value) = self.cache.try_get(&key).await? else {
            return Ok(None);
        };
        match matched(&value, code) {
            Some(payload) => {
                self.cache.remove(&key).await?;
                debug!(name = %key, "consumed one-time secret");
                Ok(Some(payload))
            }
            None => Ok(None),
        }
    }
}

fn secret_key(name: &str) -> Result<String, AuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthError::InvalidArgument(
            "secret name must not be empty".to_string(),
        ));
    }
    Ok(format!("{KEY_PREFIX}{}", name.to_lowercase()))
}

fn pack(code: &str, issued_at: i64, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{code}|{issued_at}|{extra}"),
        None => format!("{code}|{issued_at}"),
    }
}

fn unpack(value: &str) -> Option<SecretPayload> {
    let mut parts = value.splitn(3, '|');
    let code = parts.next()?;
    let issued_at = parts.next()?.parse::<i64>().ok()?;
    if code.is_empty() {
        return None;
    }
    Some(SecretPayload {
        code: code.to_string(),
        issued_at,
        extra: parts.next().map(str::to_string),
    })
}

fn matched(value: &str, code: &str) -> Option<SecretPayload> {
    let payload = unpack(value)?;
    if !code.is_empty() && payload.code.eq_ignore_ascii_case(code) {
        Some(payload)
    } else {
        None
    }
}
