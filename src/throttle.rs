//! Brute-force protection seam.
//!
//! The core only consumes this interface; counting and lockout state live in
//! an external service keyed by `(identity, namespace)`.

use crate::error::AuthError;
use async_trait::async_trait;

/// Per-identity failure counting and lockout.
///
/// `verify` followed later by `fail`/`done` is two separate calls with no
/// atomic check-and-increment; under high concurrency for the same key this
/// can under-count failures. Implementations needing stronger guarantees
/// should expose an atomic check-and-record operation behind `verify`.
#[async_trait]
pub trait AttemptThrottle: Send + Sync {
    /// Whether the identity may attempt authentication at all.
    async fn verify(&self, identity: &str, namespace: Option<&str>) -> Result<bool, AuthError>;

    /// Clear recorded failures after a successful attempt.
    async fn done(&self, identity: &str, namespace: Option<&str>) -> Result<(), AuthError>;

    /// Record a failed attempt; returns whether the lockout threshold is now
    /// exceeded.
    async fn fail(&self, identity: &str, namespace: Option<&str>) -> Result<bool, AuthError>;
}

/// Throttle that never locks anyone out, for assemblies without brute-force
/// protection and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopThrottle;

#[async_trait]
impl AttemptThrottle for NoopThrottle {
    async fn verify(&self, _identity: &str, _namespace: Option<&str>) -> Result<bool, AuthError> {
        Ok(true)
    }

    async fn done(&self, _identity: &str, _namespace: Option<&str>) -> Result<(), AuthError> {
        Ok(())
    }

    async fn fail(&self, _identity: &str, _namespace: Option<&str>) -> Result<bool, AuthError> {
        Ok(false)
    }
}
