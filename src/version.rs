//! Runtime version parsing.
//!
//! Versions are compared numerically component by component, so `3.10.0`
//! sorts after `3.9.9`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)$").expect("valid regex")
});

/// Errors raised while parsing a runtime version.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("malformed version '{input}': expected MAJOR.MINOR.PATCH")]
    Malformed { input: String },
}

/// A `major.minor.patch` runtime version.
///
/// Field order matters: the derived ordering compares `major`, then `minor`,
/// then `patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl RuntimeVersion {
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a version string such as `3.4.0`.
    ///
    /// Surrounding whitespace is ignored. Two-component or pre-release forms
    /// are rejected rather than guessed at.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Malformed`] when `input` is not three
    /// dot-separated decimal numbers.
    ///
    /// # Examples
    ///
    /// ```
    /// use rubystep::version::RuntimeVersion;
    ///
    /// let v = RuntimeVersion::parse("3.4.1").expect("valid version");
    /// assert_eq!(v, RuntimeVersion::new(3, 4, 1));
    /// assert!(RuntimeVersion::parse("3.4").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let malformed = || VersionError::Malformed {
            input: input.to_string(),
        };
        let caps = VERSION_RE.captures(input.trim()).ok_or_else(malformed)?;
        let component = |name: &str| -> Result<u64, VersionError> {
            caps.name(name)
                .and_then(|m| m.as_str().parse().ok())
                .ok_or_else(malformed)
        };
        Ok(Self::new(
            component("major")?,
            component("minor")?,
            component("patch")?,
        ))
    }
}

impl FromStr for RuntimeVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl<'de> Deserialize<'de> for RuntimeVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
