//! Microservice versions and the rules that select them.

use crate::DiscoveryError;
use std::fmt;
use std::str::FromStr;

/// A dotted version with up to four numeric components, e.g. `1.2.0`.
///
/// Missing components count as zero, so `1.2` and `1.2.0.0` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version([u32; 4]);

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self([major, minor, patch, 0])
    }
}

impl FromStr for Version {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = [0u32; 4];
        let mut count = 0;
        for part in s.trim().split('.') {
            if count == parts.len() {
                return Err(());
            }
            parts[count] = part.parse().map_err(|_| ())?;
            count += 1;
        }
        Ok(Self(parts))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [major, minor, patch, build] = self.0;
        if build == 0 {
            write!(f, "{}.{}.{}", major, minor, patch)
        } else {
            write!(f, "{}.{}.{}.{}", major, minor, patch, build)
        }
    }
}

/// Selects which versions of a microservice a consumer accepts.
///
/// ```
/// use meshroute::{Version, VersionRule};
///
/// let rule: VersionRule = "1.0.0+".parse().unwrap();
/// assert!(rule.matches(Version::new(1, 2, 0), None));
/// assert!(!rule.matches(Version::new(0, 9, 0), None));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRule {
    /// Only the highest version currently registered.
    Latest,
    /// The given version or anything newer, written `1.0.0+`.
    AtOrAbove(Version),
    /// `from` inclusive up to `to` exclusive, written `1.0.0-2.0.0`.
    Range { from: Version, to: Version },
    /// Exactly one version.
    Fixed(Version),
}

impl VersionRule {
    /// Whether `version` is accepted. `latest` is the highest version among the
    /// candidates and is only consulted by [`VersionRule::Latest`].
    pub fn matches(&self, version: Version, latest: Option<Version>) -> bool {
        match self {
            VersionRule::Latest => latest == Some(version),
            VersionRule::AtOrAbove(from) => version >= *from,
            VersionRule::Range { from, to } => version >= *from && version < *to,
            VersionRule::Fixed(fixed) => version == *fixed,
        }
    }
}

impl FromStr for VersionRule {
    type Err = DiscoveryError;

    fn from_str(rule: &str) -> Result<Self, Self::Err> {
        let invalid = || DiscoveryError::InvalidVersionRule {
            rule: rule.to_string(),
        };
        let trimmed = rule.trim();

        if trimmed.eq_ignore_ascii_case("latest") {
            return Ok(VersionRule::Latest);
        }
        if let Some(from) = trimmed.strip_suffix('+') {
            return from.parse().map(VersionRule::AtOrAbove).map_err(|_| invalid());
        }
        if let Some((from, to)) = trimmed.split_once('-') {
            let from = from.parse().map_err(|_| invalid())?;
            let to = to.parse().map_err(|_| invalid())?;
            return Ok(VersionRule::Range { from, to });
        }
        trimmed.parse().map(VersionRule::Fixed).map_err(|_| invalid())
    }
}

impl fmt::Display for VersionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRule::Latest => f.write_str("latest"),
            VersionRule::AtOrAbove(from) => write!(f, "{}+", from),
            VersionRule::Range { from, to } => write!(f, "{}-{}", from, to),
            VersionRule::Fixed(version) => write!(f, "{}", version),
        }
    }
}
