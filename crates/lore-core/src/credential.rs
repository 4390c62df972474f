//! API-key secret minting, hashing, and the constant-time comparison used
//! by the Credential Resolver's defense-in-depth check (§4.2).

use constant_time_eq::constant_time_eq;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Fixed prefix that discriminates opaque API keys from JWTs (§4.2, §6).
pub const KEY_PREFIX: &str = "lore_sk_";

/// Length of the human-visible prefix shown in listings: `lore_sk_` plus
/// the first 4 hex characters of the secret (§6).
const DISPLAY_PREFIX_LEN: usize = 12;

/// Mint a fresh raw secret: `lore_sk_` followed by `byte_len * 2` hex chars.
/// The bootstrap path (§4.10) uses 16 bytes (32 hex chars); explicit key
/// creation (§4.6) uses 32 bytes (64 hex chars) — both are accepted back by
/// the resolver, which validates on prefix and hash, not fixed length.
pub fn generate_secret(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{KEY_PREFIX}{}", hex::encode(bytes))
}

/// SHA-256 hex digest of a raw secret, the only form ever persisted.
pub fn hash_secret(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// The 12-character discriminator safe to log or display.
pub fn display_prefix(raw: &str) -> String {
    raw.chars().take(DISPLAY_PREFIX_LEN).collect()
}

/// `true` if `raw` looks like an opaque API key rather than a JWT.
pub fn looks_like_api_key(raw: &str) -> bool {
    raw.starts_with(KEY_PREFIX)
}

/// Constant-time comparison of two hash hex strings. Used as defense in
/// depth after an indexed database lookup has already matched the hash.
pub fn hashes_match(stored: &str, computed: &str) -> bool {
    constant_time_eq(stored.as_bytes(), computed.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_has_the_fixed_prefix_and_expected_length() {
        let secret = generate_secret(16);
        assert!(secret.starts_with(KEY_PREFIX));
        assert_eq!(secret.len(), KEY_PREFIX.len() + 32);

        let secret = generate_secret(32);
        assert_eq!(secret.len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn hash_is_deterministic() {
        let secret = generate_secret(16);
        assert_eq!(hash_secret(&secret), hash_secret(&secret));
    }

    #[test]
    fn display_prefix_is_twelve_characters() {
        let secret = generate_secret(32);
        assert_eq!(display_prefix(&secret).len(), 12);
        assert!(secret.starts_with(&display_prefix(&secret)));
    }

    #[test]
    fn looks_like_api_key_discriminates_from_jwts() {
        assert!(looks_like_api_key("lore_sk_deadbeef"));
        assert!(!looks_like_api_key("eyJhbGciOiJSUzI1NiJ9.payload.sig"));
    }

    #[test]
    fn hashes_match_is_symmetric_and_rejects_mismatches() {
        let a = hash_secret("lore_sk_aaaa");
        let b = hash_secret("lore_sk_bbbb");
        assert!(hashes_match(&a, &a));
        assert!(!hashes_match(&a, &b));
    }
}
