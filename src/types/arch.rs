use serde::{Deserialize, Serialize};

/// Logical CPU-architecture tag used by manifests to select a binary variant.
///
/// Manifests declare per-tag data (platform path segments, checksums); the
/// tag for the running host is detected from `std::env::consts::ARCH` unless
/// overridden on the command line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// Apple Silicon (aarch64).
    Arm,
    /// Intel (x86_64).
    Intel,
}

impl Arch {
    /// Detect the tag for the running host, or `None` for architectures
    /// no manifest can describe.
    pub fn detect() -> Option<Self> {
        Self::from_host(std::env::consts::ARCH)
    }

    /// Map a host architecture identifier to a logical tag.
    pub fn from_host(host: &str) -> Option<Self> {
        match host {
            "aarch64" => Some(Self::Arm),
            "x86_64" => Some(Self::Intel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Intel => "intel",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "arm" => Ok(Self::Arm),
            "intel" => Ok(Self::Intel),
            other => Err(format!("unknown architecture tag '{other}' (expected arm or intel)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_host_identifiers() {
        assert_eq!(Arch::from_host("aarch64"), Some(Arch::Arm));
        assert_eq!(Arch::from_host("x86_64"), Some(Arch::Intel));
        assert_eq!(Arch::from_host("riscv64"), None);
    }

    #[test]
    fn parses_logical_tags() {
        assert_eq!("arm".parse::<Arch>(), Ok(Arch::Arm));
        assert_eq!("intel".parse::<Arch>(), Ok(Arch::Intel));
        assert!("x86_64".parse::<Arch>().is_err());
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(Arch::Arm.to_string(), "arm");
        assert_eq!(Arch::Intel.to_string(), "intel");
    }
}
