//! Packed salted password blobs.
//!
//! A blob is a single byte sequence laid out as
//! `[2B magic][1B algorithm id][1B exponent][1B nonce length][nonce][digest]`
//! where the digest is `PBKDF2(password, nonce, 2^exponent)` over the selected
//! hash. The format is self-describing: verification reads the algorithm,
//! iteration exponent and nonce back out of the blob, so stored credentials
//! survive changes to the generation defaults.

use md5::Md5;
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

const MAGIC: [u8; 2] = *b"PH";
const HEADER_LEN: usize = 5;
const NONCE_LEN: usize = 8;

/// Hash primitive selected by the blob's algorithm id byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            HashAlgorithm::Md5 => 0,
            HashAlgorithm::Sha1 => 1,
            HashAlgorithm::Sha256 => 2,
            HashAlgorithm::Sha384 => 3,
            HashAlgorithm::Sha512 => 4,
        }
    }

    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(HashAlgorithm::Md5),
            1 => Some(HashAlgorithm::Sha1),
            2 => Some(HashAlgorithm::Sha256),
            3 => Some(HashAlgorithm::Sha384),
            4 => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    /// Parse a case-insensitive algorithm name such as `"SHA1"` or `"sha-256"`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Some(HashAlgorithm::Md5),
            "sha1" => Some(HashAlgorithm::Sha1),
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    #[must_use]
    pub fn digest_len(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

/// An immutable packed password hash.
///
/// Equality is full byte-sequence comparison. Anything shorter than
/// [`PasswordBlob::MIN_LEN`] is treated as the empty blob, which verifies
/// only against the empty password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordBlob {
    bytes: Vec<u8>,
}

impl PasswordBlob {
    /// Shortest well-formed blob; below this the value is "empty".
    pub const MIN_LEN: usize = 22;

    pub const DEFAULT_EXPONENT: u8 = 10;
    pub const DEFAULT_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha1;

    #[must_use]
    pub fn empty() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Wrap stored bytes without validation; malformed input behaves as empty
    /// or fails verification, it never panics.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.len() < Self::MIN_LEN
    }

    /// Generate a blob with the default exponent (10) and algorithm (SHA-1).
    ///
    /// An empty password yields the empty blob.
    #[must_use]
    pub fn generate(password: &str) -> Self {
        Self::generate_with(password, Self::DEFAULT_EXPONENT, Self::DEFAULT_ALGORITHM)
    }

    /// Generate a blob with an explicit iteration exponent and hash algorithm.
    ///
    /// The exponent is clamped to `[8, 31]`; the PBKDF2 iteration count is
    /// `2^exponent`. The nonce is 8 random bytes from the OS generator.
    #[must_use]
    pub fn generate_with(password: &str, exponent: u8, algorithm: HashAlgorithm) -> Self {
        if password.is_empty() {
            return Self::empty();
        }
        let exponent = exponent.clamp(8, 31);
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let digest = derive(password.as_bytes(), &nonce, exponent, algorithm);

        let mut bytes = Vec::with_capacity(HEADER_LEN + NONCE_LEN + digest.len());
        bytes.extend_from_slice(&MAGIC);
        bytes.push(algorithm.id());
        bytes.push(exponent);
        bytes.push(NONCE_LEN as u8);
        bytes.extend_from_slice(&nonce);
        bytes.extend_from_slice(&digest);
        Self { bytes }
    }

    /// Verify a password against this blob.
    ///
    /// The empty blob matches only the empty password. Otherwise the same
    /// derivation is recomputed from the embedded algorithm, exponent and
    /// nonce and compared against the embedded digest. Structurally invalid
    /// blobs never match.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        if self.is_empty() {
            return password.is_empty();
        }
        if password.is_empty() {
            return false;
        }
        let Some((algorithm, exponent, nonce, digest)) = self.unpack() else {
            return false;
        };
        // Comparison is over server-side material; the attacker never times it.
        derive(password.as_bytes(), nonce, exponent, algorithm) == digest
    }

    #[must_use]
    pub fn algorithm(&self) -> Option<HashAlgorithm> {
        self.unpack().map(|(algorithm, ..)| algorithm)
    }

    #[must_use]
    pub fn exponent(&self) -> Option<u8> {
        self.unpack().map(|(_, exponent, ..)| exponent)
    }

    #[must_use]
    pub fn nonce(&self) -> Option<&[u8]> {
        self.unpack().map(|(_, _, nonce, _)| nonce)
    }

    /// Split the blob into its parts, or `None` when structurally invalid.
    fn unpack(&self) -> Option<(HashAlgorithm, u8, &[u8], &[u8])> {
        if self.is_empty() || self.bytes[..2] != MAGIC {
            return None;
        }
        let algorithm = HashAlgorithm::from_id(self.bytes[2])?;
        let exponent = self.bytes[3];
        if !(8..=31).contains(&exponent) {
            return None;
        }
        let nonce_len = self.bytes[4] as usize;
        // The total length must account for every declared field exactly.
        if self.bytes.len() != HEADER_LEN + nonce_len + algorithm.digest_len() {
            return None;
        }
        let nonce = &self.bytes[HEADER_LEN..HEADER_LEN + nonce_len];
        let digest = &self.bytes[HEADER_LEN + nonce_len..];
        Some((algorithm, exponent, nonce, digest))
    }
}

fn derive(password: &[u8], nonce: &[u8], exponent: u8, algorithm: HashAlgorithm) -> Vec<u8> {
    let rounds = 1u32 << exponent;
    let mut out = vec![0u8; algorithm.digest_len()];
    match algorithm {
        HashAlgorithm::Md5 => pbkdf2_hmac::<Md5>(password, nonce, rounds, &mut out),
        HashAlgorithm::Sha1 => pbkdf2_hmac::<Sha1>(password, nonce, rounds, &mut out),
        HashAlgorithm::Sha256 => pbkdf2_hmac::<Sha256>(password, nonce, rounds, &mut out),
        HashAlgorithm::Sha384 => pbkdf2_hmac::<Sha384>(password, nonce, rounds, &mut out),
        HashAlgorithm::Sha512 => pbkdf2_hmac::<Sha512>(password, nonce, rounds, &mut out),
    }
    out
}
