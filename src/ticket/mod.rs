//! Credential tickets: issued, revocable session records.
//!
//! A ticket binds an unguessable credential id and renewal token to an
//! embedded claims identity, a lower-cased scenario tag and a validity
//! window. Tickets are never partially updated: renewal clones the ticket
//! with a fresh id and renewal token while keeping the claims. Each ticket
//! carries a one-shot [`ChangeToken`] that unregistration fires exactly once,
//! letting derived caches evict themselves.

mod watch;

pub use watch::{ChangeToken, ChangeWatcher};

use crate::clock;
use crate::error::AuthError;
use crate::identity::ClaimsIdentity;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use std::time::Duration;

const WIRE_MAGIC: [u8; 2] = *b"CT";
const WIRE_VERSION: u8 = 1;
const WIRE_HEADER_LEN: usize = 2 + 1 + 8 + 4;

/// Default validity window for issued tickets.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone)]
pub struct CredentialTicket {
    credential_id: String,
    renewal_token: String,
    scenario: String,
    validity: Duration,
    identity: ClaimsIdentity,
    issued_at: i64,
    change_token: Arc<ChangeToken>,
}

impl CredentialTicket {
    /// Issue a new ticket wrapping `identity` for `scenario`.
    ///
    /// The scenario is trimmed and lower-cased. The credential id and renewal
    /// token are generated from the current time plus random suffixes from
    /// the OS generator.
    ///
    /// # Errors
    /// Fails with [`AuthError::InvalidArgument`] when the scenario contains
    /// `|`, which the wire trailer reserves as its field delimiter.
    pub fn new(
        identity: ClaimsIdentity,
        scenario: &str,
        validity: Option<Duration>,
    ) -> Result<Self, AuthError> {
        let scenario = normalize_scenario(scenario)?;
        let now = clock::now_unix();
        Ok(Self {
            credential_id: new_credential_id(now),
            renewal_token: new_renewal_token(now),
            scenario,
            validity: validity.unwrap_or(DEFAULT_VALIDITY),
            identity,
            issued_at: now,
            change_token: Arc::new(ChangeToken::new()),
        })
    }

    /// Clone this ticket for renewal: a fresh credential id, renewal token,
    /// issue time and change token, with the same claims, scenario and
    /// validity. The original is untouched.
    #[must_use]
    pub fn renew(&self) -> Self {
        let now = clock::now_unix();
        Self {
            credential_id: new_credential_id(now),
            renewal_token: new_renewal_token(now),
            scenario: self.scenario.clone(),
            validity: self.validity,
            identity: self.identity.clone(),
            issued_at: now,
            change_token: Arc::new(ChangeToken::new()),
        }
    }

    #[must_use]
    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    #[must_use]
    pub fn renewal_token(&self) -> &str {
        &self.renewal_token
    }

    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    #[must_use]
    pub fn validity(&self) -> Duration {
        self.validity
    }

    #[must_use]
    pub fn identity(&self) -> &ClaimsIdentity {
        &self.identity
    }

    #[must_use]
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.issued_at + self.validity.as_secs() as i64
    }

    /// Expiry is evaluated against a caller-supplied timestamp: an expired
    /// but not-yet-evicted ticket must be rejected at read time.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    /// Observe this ticket's one-shot invalidation token.
    #[must_use]
    pub fn watch(&self) -> ChangeWatcher {
        self.change_token.watch()
    }

    /// Fire the invalidation token. Idempotent; not re-armable.
    pub fn invalidate(&self) {
        self.change_token.fire();
    }

    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.change_token.has_fired()
    }

    /// Serialize to the self-describing wire form: a fixed header, the claims
    /// identity as a JSON block, then the ASCII trailer
    /// `credentialId|renewalToken|scenario|validitySeconds`.
    ///
    /// # Errors
    /// Fails when the claims identity cannot be encoded.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AuthError> {
        let claims = serde_json::to_vec(&self.identity)
            .map_err(|err| AuthError::InvalidArgument(format!("claims encoding failed: {err}")))?;
        let trailer = format!(
            "{}|{}|{}|{}",
            self.credential_id,
            self.renewal_token,
            self.scenario,
            self.validity.as_secs()
        );
        let mut bytes = Vec::with_capacity(WIRE_HEADER_LEN + claims.len() + trailer.len());
        bytes.extend_from_slice(&WIRE_MAGIC);
        bytes.push(WIRE_VERSION);
        bytes.extend_from_slice(&self.issued_at.to_le_bytes());
        bytes.extend_from_slice(&(claims.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&claims);
        bytes.extend_from_slice(trailer.as_bytes());
        Ok(bytes)
    }

    /// Reconstruct a ticket from its wire form. The change token starts
    /// fresh: invalidation state does not travel with the bytes.
    ///
    /// # Errors
    /// Fails with [`AuthError::InvalidArgument`] on any structural defect.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthError> {
        let malformed = |what: &str| AuthError::InvalidArgument(format!("bad ticket: {what}"));

        if bytes.len() < WIRE_HEADER_LEN || bytes[..2] != WIRE_MAGIC {
            return Err(malformed("header"));
        }
        if bytes[2] != WIRE_VERSION {
            return Err(malformed("version"));
        }
        let issued_at = i64::from_le_bytes(
            bytes[3..11]
                .try_into()
                .map_err(|_| malformed("timestamp"))?,
        );
        let claims_len = u32::from_le_bytes(
            bytes[11..WIRE_HEADER_LEN]
                .try_into()
                .map_err(|_| malformed("claims length"))?,
        ) as usize;
        let claims_end = WIRE_HEADER_LEN
            .checked_add(claims_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| malformed("claims length"))?;

        let identity: ClaimsIdentity = serde_json::from_slice(&bytes[WIRE_HEADER_LEN..claims_end])
            .map_err(|_| malformed("claims"))?;

        let trailer =
            std::str::from_utf8(&bytes[claims_end..]).map_err(|_| malformed("trailer"))?;
        let mut fields = trailer.split('|');
        let credential_id = fields.next().filter(|id| !id.is_empty());
        let renewal_token = fields.next().filter(|token| !token.is_empty());
        let scenario = fields.next();
        let validity_seconds = fields.next().and_then(|text| text.parse::<u64>().ok());
        if fields.next().is_some() {
            return Err(malformed("trailer"));
        }
        match (credential_id, renewal_token, scenario, validity_seconds) {
            (Some(credential_id), Some(renewal_token), Some(scenario), Some(validity_seconds)) => {
                Ok(Self {
                    credential_id: credential_id.to_string(),
                    renewal_token: renewal_token.to_string(),
                    scenario: scenario.to_string(),
                    validity: Duration::from_secs(validity_seconds),
                    identity,
                    issued_at,
                    change_token: Arc::new(ChangeToken::new()),
                })
            }
            _ => Err(malformed("trailer")),
        }
    }
}

/// Equality is by credential id only.
impl PartialEq for CredentialTicket {
    fn eq(&self, other: &Self) -> bool {
        self.credential_id == other.credential_id
    }
}

impl Eq for CredentialTicket {}

impl std::hash::Hash for CredentialTicket {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.credential_id.hash(state);
    }
}

fn normalize_scenario(scenario: &str) -> Result<String, AuthError> {
    let scenario = scenario.trim().to_lowercase();
    if scenario.contains('|') {
        return Err(AuthError::InvalidArgument(
            "scenario must not contain '|'".to_string(),
        ));
    }
    Ok(scenario)
}

fn new_credential_id(now: i64) -> String {
    let mut suffix = [0u8; 8];
    OsRng.fill_bytes(&mut suffix);
    format!(
        "{:x}{}",
        now as u64,
        Base64UrlUnpadded::encode_string(&suffix)
    )
}

fn new_renewal_token(now: i64) -> String {
    let days = (now / 86_400) as u64;
    let ticks = clock::now_unix_nanos() as u64 & 0xffff_ffff;
    let mut suffix = [0u8; 8];
    OsRng.fill_bytes(&mut suffix);
    format!(
        "{days:x}{ticks:x}{}",
        Base64UrlUnpadded::encode_string(&suffix)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashMap;

    fn identity() -> ClaimsIdentity {
        ClaimsIdentity::new("alice")
            .with_issuer("portcullis")
            .with_role("admins")
            .with_attribute("tenant", "acme")
    }

    #[test]
    fn issue_normalizes_scenario() -> Result<()> {
        let ticket = CredentialTicket::new(identity(), "  Web ", None)?;
        assert_eq!(ticket.scenario(), "web");
        assert_eq!(ticket.validity(), DEFAULT_VALIDITY);
        Ok(())
    }

    #[test]
    fn scenario_with_pipe_is_rejected() {
        let result = CredentialTicket::new(identity(), "a|b", None);
        assert!(matches!(result, Err(AuthError::InvalidArgument(_))));
    }

    #[test]
    fn renew_keeps_claims_but_not_identifiers() -> Result<()> {
        let original = CredentialTicket::new(identity(), "web", None)?;
        let renewed = original.renew();
        assert_ne!(original.credential_id(), renewed.credential_id());
        assert_ne!(original.renewal_token(), renewed.renewal_token());
        assert_eq!(original.identity(), renewed.identity());
        assert_eq!(original.scenario(), renewed.scenario());
        assert!(original != renewed, "equality is by credential id");
        Ok(())
    }

    #[test]
    fn wire_round_trip_is_lossless() -> Result<()> {
        let ticket =
            CredentialTicket::new(identity(), "mobile", Some(Duration::from_secs(900)))?;
        let bytes = ticket.to_bytes()?;
        let back = CredentialTicket::from_bytes(&bytes)?;
        assert_eq!(back.credential_id(), ticket.credential_id());
        assert_eq!(back.renewal_token(), ticket.renewal_token());
        assert_eq!(back.scenario(), ticket.scenario());
        assert_eq!(back.validity(), ticket.validity());
        assert_eq!(back.issued_at(), ticket.issued_at());
        assert_eq!(back.identity(), ticket.identity());
        // Byte-for-byte reconstructible.
        assert_eq!(back.to_bytes()?, bytes);
        Ok(())
    }

    #[test]
    fn malformed_wire_forms_are_rejected() -> Result<()> {
        let ticket = CredentialTicket::new(identity(), "web", None)?;
        let bytes = ticket.to_bytes()?;

        assert!(CredentialTicket::from_bytes(&[]).is_err());
        assert!(CredentialTicket::from_bytes(&bytes[..WIRE_HEADER_LEN]).is_err());

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        assert!(CredentialTicket::from_bytes(&wrong_magic).is_err());

        let mut wrong_version = bytes.clone();
        wrong_version[2] = 9;
        assert!(CredentialTicket::from_bytes(&wrong_version).is_err());

        let mut truncated_claims = bytes.clone();
        truncated_claims.truncate(WIRE_HEADER_LEN + 2);
        assert!(CredentialTicket::from_bytes(&truncated_claims).is_err());
        Ok(())
    }

    #[test]
    fn identifiers_never_contain_the_trailer_delimiter() -> Result<()> {
        for _ in 0..32 {
            let ticket = CredentialTicket::new(identity(), "web", None)?;
            assert!(!ticket.credential_id().contains('|'));
            assert!(!ticket.renewal_token().contains('|'));
        }
        Ok(())
    }

    #[test]
    fn expiry_is_a_timestamp_comparison() -> Result<()> {
        let ticket = CredentialTicket::new(identity(), "web", Some(Duration::from_secs(60)))?;
        assert!(!ticket.is_expired(ticket.issued_at()));
        assert!(!ticket.is_expired(ticket.issued_at() + 59));
        assert!(ticket.is_expired(ticket.issued_at() + 60));
        Ok(())
    }

    #[test]
    fn invalidation_fires_the_change_token_once() -> Result<()> {
        let ticket = CredentialTicket::new(identity(), "web", None)?;
        let watcher = ticket.watch();
        assert!(!watcher.has_fired());
        ticket.invalidate();
        ticket.invalidate();
        assert!(ticket.is_invalidated());
        assert!(watcher.has_fired());
        Ok(())
    }

    #[test]
    fn equality_ignores_everything_but_the_id() -> Result<()> {
        let ticket = CredentialTicket::new(identity(), "web", None)?;
        let bytes = ticket.to_bytes()?;
        let twin = CredentialTicket::from_bytes(&bytes)?;
        assert_eq!(ticket, twin);

        let mut set: HashMap<CredentialTicket, ()> = HashMap::new();
        set.insert(ticket, ());
        assert!(set.contains_key(&twin));
        Ok(())
    }
}
