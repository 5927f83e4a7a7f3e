//! # Portcullis (Identity & Access Control Core)
//!
//! `portcullis` answers "is this caller allowed to do X" for any front end
//! (web, RPC, CLI). It issues and manages short-lived **credential tickets**
//! (authenticated sessions), evaluates **hierarchical privileges** for
//! authorization decisions, and produces/verifies **one-time secrets** and
//! **salted password blobs** used during authentication.
//!
//! ## What lives here
//!
//! - [`password`]: the packed PBKDF2 password-blob format and its verifier.
//! - [`secret`]: one-time secrets with re-issue rate limiting and a small
//!   generation-pattern language, stored in an expiring key-value cache.
//! - [`ticket`] / [`registry`]: credential tickets, their wire format,
//!   clone-based renewal, and a derived-identity memo cache invalidated by
//!   one-shot change tokens.
//! - [`privilege`]: ancestor closure over the role hierarchy and the ordered
//!   grant/deny evaluator that resolves a subject's final privilege set.
//! - [`authenticate`]: the end-to-end login flow over a scheme-keyed
//!   authenticator registry, with challengers and observability hooks.
//!
//! ## What does not
//!
//! Transport framing, persistence engines, certificate chain validation and
//! CLI/UI surfaces are out of scope. Stores, caches and the brute-force
//! throttle are traits ([`cache::ExpiringCache`], [`registry::CredentialStore`],
//! [`privilege::RoleStore`], [`throttle::AttemptThrottle`]); in-memory
//! implementations are provided for standalone use and tests.

pub mod authenticate;
pub mod cache;
pub mod error;
pub mod identity;
pub mod password;
pub mod privilege;
pub mod registry;
pub mod secret;
pub mod throttle;
pub mod ticket;

pub use error::{AuthError, MessageCatalog, Reason};
pub use identity::ClaimsIdentity;
pub use password::PasswordBlob;
pub use ticket::CredentialTicket;

pub(crate) mod clock {
    use time::OffsetDateTime;

    /// Current time as unix seconds. Pure helpers take `now` explicitly;
    /// public entry points capture it here.
    pub(crate) fn now_unix() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    pub(crate) fn now_unix_nanos() -> i128 {
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    }
}
