//! Block digests
//!
//! A digest is the SHA-256 of a block's bytes, rendered as 64 lower-case hex
//! characters. It doubles as the block's storage key, so parsing is strict:
//! anything else is rejected before it can reach a filesystem path or URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use super::types::BlockError;

/// Length of a rendered digest (SHA-256 = 32 bytes = 64 hex chars)
pub const DIGEST_HEX_LEN: usize = 64;

/// Content digest of a block
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Compute the digest of `data`
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hex::encode(hasher.finalize()))
    }

    /// Parse and validate a rendered digest
    pub fn parse(value: &str) -> Result<Self, BlockError> {
        if value.len() != DIGEST_HEX_LEN
            || !value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        {
            return Err(BlockError::InvalidDigest(value.to_string()));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character fan-out prefix used by the filesystem layout
    pub fn prefix(&self) -> &str {
        &self.0[..2]
    }

    /// Check that `data` hashes to this digest
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Digest {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = BlockError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert_eq!(
            Digest::of(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            Digest::of(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_is_deterministic_lowercase_hex() {
        let a = Digest::of(b"Hello, World!");
        let b = Digest::of(b"Hello, World!");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), DIGEST_HEX_LEN);
        assert!(a.as_str().chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_ne!(a, Digest::of(b"Hello, World?"));
    }

    #[test]
    fn test_parse_round_trips_rendered_digest() {
        let digest = Digest::of(b"chunk");
        let parsed: Digest = digest.to_string().parse().unwrap();
        assert_eq!(parsed, digest);
        assert!(parsed.matches(b"chunk"));
        assert_eq!(parsed.prefix(), &digest.as_str()[..2]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let bad_values: Vec<String> = vec![
            String::new(),
            "abc".to_string(),
            "../../etc/passwd".to_string(),
            Digest::of(b"x").as_str().to_uppercase(),
            "g".repeat(DIGEST_HEX_LEN),
            "a".repeat(DIGEST_HEX_LEN + 1),
        ];
        for bad in &bad_values {
            assert!(
                matches!(Digest::parse(bad), Err(BlockError::InvalidDigest(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_serde_validates() {
        let digest = Digest::of(b"serde");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
        assert!(serde_json::from_str::<Digest>("\"not-a-digest\"").is_err());
    }
}
