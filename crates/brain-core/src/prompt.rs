//! Prompt fingerprints, logged at startup so persona changes are traceable.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Stable SHA-256 hex digest of a prompt.
pub fn hash_prompt(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{byte:02x}");
        hex
    })
}

/// First 12 hex characters of [`hash_prompt`].
pub fn short_fingerprint(prompt: &str) -> String {
    let mut hash = hash_prompt(prompt);
    hash.truncate(12);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_distinct() {
        assert_eq!(hash_prompt("persona"), hash_prompt("persona"));
        assert_ne!(hash_prompt("persona"), hash_prompt("other persona"));
        assert_eq!(hash_prompt("").len(), 64);
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_prompt("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(short_fingerprint("abc"), "ba7816bf8f01");
    }
}
