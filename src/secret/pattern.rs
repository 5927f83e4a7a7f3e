//! The secret generation-pattern mini-language.
//!
//! - `guid` / `uuid` (case-insensitive): a v4 UUID as 32 hex characters
//! - `#N`: N random decimal digits
//! - `?N` / `*N`: N random alphanumeric characters
//! - empty: 6 random alphanumeric characters
//! - anything else: used verbatim, rejected if it contains `:` or `|`

use crate::error::AuthError;
use rand::{rngs::OsRng, Rng};
use uuid::Uuid;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const DEFAULT_LEN: usize = 6;
const MAX_LEN: usize = 64;

pub(crate) fn generate_code(pattern: &str) -> Result<String, AuthError> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Ok(random_alphanumeric(DEFAULT_LEN));
    }
    if pattern.eq_ignore_ascii_case("guid") || pattern.eq_ignore_ascii_case("uuid") {
        return Ok(Uuid::new_v4().simple().to_string());
    }
    if let Some(rest) = pattern.strip_prefix('#') {
        return Ok(random_digits(parse_count(rest)?));
    }
    if let Some(rest) = pattern
        .strip_prefix('?')
        .or_else(|| pattern.strip_prefix('*'))
    {
        return Ok(random_alphanumeric(parse_count(rest)?));
    }
    // A literal becomes the code itself; the pack/verify delimiters are
    // reserved so the cached value stays parseable.
    if pattern.contains(':') || pattern.contains('|') {
        return Err(AuthError::InvalidArgument(format!(
            "secret pattern must not contain ':' or '|': {pattern}"
        )));
    }
    Ok(pattern.to_string())
}

fn parse_count(text: &str) -> Result<usize, AuthError> {
    match text.parse::<usize>() {
        Ok(count) if (1..=MAX_LEN).contains(&count) => Ok(count),
        _ => Err(AuthError::InvalidArgument(format!(
            "secret pattern length must be 1..={MAX_LEN}: {text}"
        ))),
    }
}

fn random_digits(count: usize) -> String {
    let mut rng = OsRng;
    (0..count)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn random_alphanumeric(count: usize) -> String {
    let mut rng = OsRng;
    (0..count)
        .map(|_| char::from(ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())]))
        .collect()
}
