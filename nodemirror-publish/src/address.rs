//! Content addressing of published payloads.

use sha2::{Digest, Sha256};

/// Maps a unit's absolute storage path to its published file name: the
/// SHA-256 hex digest of the path's UTF-8 bytes.
///
/// Republishing the same path always yields the same name.
pub fn encode(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            encode(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let name = encode("/var/lib/content/rpm/zsh-5.9.rpm");
        assert_eq!(name.len(), 64);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
