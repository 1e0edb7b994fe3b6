//! Prefixed random identifiers: `s_` sessions, `c_` tool calls, `ref_`
//! reference-sidecar handles, `k_` miscellaneous keys.
//!
//! Each suffix carries at least 120 bits of randomness, encoded with a
//! URL-safe alphabet so IDs can be dropped straight into a `cancelUrl` or a
//! query string without escaping.

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

/// Alphabet deliberately excludes characters that need percent-encoding.
const ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Number of alphabet characters in the random suffix.
///
/// `ALPHABET` has 64 symbols (6 bits/char), so 21 chars gives 126 bits of
/// entropy, comfortably over the 120-bit floor.
const SUFFIX_LEN: usize = 21;

fn random_suffix() -> String {
    let dist = Uniform::from(0..ALPHABET.len());
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| ALPHABET[dist.sample(&mut rng)] as char)
        .collect()
}

fn prefixed(prefix: &str) -> String {
    format!("{prefix}{}", random_suffix())
}

/// A new globally-unique session ID: `s_<21 url-safe chars>`.
pub fn new_session_id() -> String {
    prefixed("s_")
}

/// A new tool-call ID: `c_<21 url-safe chars>`.
pub fn new_call_id() -> String {
    prefixed("c_")
}

/// A new reference-sidecar ID: `ref_<21 url-safe chars>`.
pub fn new_reference_id() -> String {
    prefixed("ref_")
}

/// A new miscellaneous key ID: `k_<21 url-safe chars>`.
pub fn new_key_id() -> String {
    prefixed("k_")
}

/// Characters allowed in a prefixed ID's random suffix.
pub fn is_url_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Validates that a candidate ID matches `<prefix><non-empty url-safe suffix>`.
pub fn has_valid_shape(id: &str, prefix: &str) -> bool {
    match id.strip_prefix(prefix) {
        Some(rest) => !rest.is_empty() && rest.chars().all(is_url_safe_char),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_have_expected_prefix_and_shape() {
        let id = new_session_id();
        assert!(id.starts_with("s_"));
        assert!(has_valid_shape(&id, "s_"));
    }

    #[test]
    fn call_ids_are_unique() {
        let a = new_call_id();
        let b = new_call_id();
        assert_ne!(a, b);
        assert!(has_valid_shape(&a, "c_"));
        assert!(has_valid_shape(&b, "c_"));
    }

    #[test]
    fn reference_and_key_ids_use_their_own_prefixes() {
        assert!(new_reference_id().starts_with("ref_"));
        assert!(new_key_id().starts_with("k_"));
    }

    #[test]
    fn rejects_ids_with_wrong_prefix_or_empty_suffix() {
        assert!(!has_valid_shape("s_", "s_"));
        assert!(!has_valid_shape("c_abc", "s_"));
        assert!(!has_valid_shape("s_has space", "s_"));
    }
}
