use serde::{Deserialize, Serialize};

/// A validated SHA-256 checksum (64 hex characters).
///
/// Validation happens at construction and deserialization time so invalid
/// hex strings never propagate into the download pipeline. Comparison
/// against a computed digest is constant-time: the downloaded archive's
/// content must not influence how quickly a mismatch is detected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Create a validated checksum. Accepts an optional `sha256:` prefix.
    pub fn parse(s: &str) -> Result<Self, String> {
        let hex = s.strip_prefix("sha256:").unwrap_or(s);
        if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(hex.to_ascii_lowercase()))
        } else {
            Err(format!(
                "invalid SHA-256 checksum: expected 64 hex characters, got '{s}'"
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a raw 32-byte digest.
    pub fn matches(&self, digest: &[u8]) -> bool {
        // Infallible: the hex is validated at construction.
        let expected = match hex::decode(&self.0) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        if expected.len() != digest.len() {
            return false;
        }
        expected
            .iter()
            .zip(digest)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Hash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Sha256Hash {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl std::str::FromStr for Sha256Hash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    const GCN_ARM: &str = "1acfc2b7a7537e6956603f72ae7c39c95e3b9c7a1574684f63b2cc315e9d770d";

    #[test]
    fn accepts_valid_hex() {
        let hash = Sha256Hash::parse(GCN_ARM).unwrap();
        assert_eq!(hash.as_str(), GCN_ARM);
    }

    #[test]
    fn strips_prefix_and_lowercases() {
        let upper = GCN_ARM.to_ascii_uppercase();
        let hash = Sha256Hash::parse(&format!("sha256:{upper}")).unwrap();
        assert_eq!(hash.as_str(), GCN_ARM);
    }

    #[test]
    fn rejects_short_and_non_hex() {
        assert!(Sha256Hash::parse("abc123").is_err());
        assert!(Sha256Hash::parse(&"z".repeat(64)).is_err());
    }

    #[test]
    fn matches_computed_digest() {
        let digest = Sha256::digest(b"hello keg");
        let hash = Sha256Hash::parse(&hex::encode(digest)).unwrap();
        assert!(hash.matches(&digest));

        let other = Sha256::digest(b"hello kog");
        assert!(!hash.matches(&other));
    }
}
