//! Version-gated gem installation policy.
//!
//! Newer Ruby releases stop shipping some standard-library gems by default.
//! The policy is a table of rules, each naming the first runtime version
//! that no longer bundles a set of gems. Planning for a version unions the
//! gems of every rule that applies to it.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::exec::Invocation;
use crate::version::{RuntimeVersion, VersionError};

const BUILTIN_POLICY: &str = include_str!("../data/unbundled_gems.json");

/// Errors raised while loading a policy table.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed policy at {path}: {message}")]
    Parse { path: String, message: String },
    #[error("policy rule for {since} lists invalid gem name {name:?}")]
    InvalidGemName { since: RuntimeVersion, name: String },
}

/// Gems that stopped being bundled as of `since`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UnbundlingRule {
    pub since: RuntimeVersion,
    pub gems: Vec<String>,
}

/// Ordered table of [`UnbundlingRule`]s.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UnbundlingPolicy {
    rules: Vec<UnbundlingRule>,
}

/// Gems to install, sorted by name with no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallPlan {
    gems: Vec<String>,
}

impl InstallPlan {
    #[must_use]
    pub fn gems(&self) -> &[String] {
        &self.gems
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gems.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.gems.len()
    }

    /// One `install` invocation per planned gem, in plan order.
    #[must_use]
    pub fn invocations(&self, gem_command: &str) -> Vec<Invocation> {
        self.gems
            .iter()
            .map(|gem| install_invocation(gem_command, gem))
            .collect()
    }
}

impl UnbundlingPolicy {
    #[must_use]
    pub const fn new(rules: Vec<UnbundlingRule>) -> Self {
        Self { rules }
    }

    /// The policy table shipped with the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded table is malformed, which the unit tests rule
    /// out.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_POLICY).expect("embedded policy table is valid")
    }

    /// Parse a policy table from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Parse`] naming the offending JSON path, or
    /// [`PolicyError::InvalidGemName`] for names that are blank, carry
    /// surrounding whitespace or would be read as an option.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let de = &mut serde_json::Deserializer::from_str(json);
        let policy: Self = serde_path_to_error::deserialize(de).map_err(|e| {
            let path = e.path().to_string();
            PolicyError::Parse {
                path,
                message: e.into_inner().to_string(),
            }
        })?;
        for rule in &policy.rules {
            if let Some(name) = rule.gems.iter().find(|g| !is_valid_gem_name(g)) {
                return Err(PolicyError::InvalidGemName {
                    since: rule.since,
                    name: name.clone(),
                });
            }
        }
        Ok(policy)
    }

    /// Read and parse a policy table from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Io`] when the file cannot be read, otherwise
    /// the errors of [`UnbundlingPolicy::from_json`].
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let json = fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn rules(&self) -> &[UnbundlingRule] {
        &self.rules
    }

    /// Gems that must be installed explicitly on `version`.
    ///
    /// # Examples
    ///
    /// ```
    /// use rubystep::policy::UnbundlingPolicy;
    /// use rubystep::version::RuntimeVersion;
    ///
    /// let policy = UnbundlingPolicy::builtin();
    /// assert!(policy.plan(&RuntimeVersion::new(3, 3, 9)).is_empty());
    /// assert_eq!(policy.plan(&RuntimeVersion::new(3, 4, 0)).gems()[0], "bigdecimal");
    /// ```
    #[must_use]
    pub fn plan(&self, version: &RuntimeVersion) -> InstallPlan {
        let gems: BTreeSet<&str> = self
            .rules
            .iter()
            .filter(|rule| rule.since <= *version)
            .flat_map(|rule| rule.gems.iter().map(String::as_str))
            .collect();
        InstallPlan {
            gems: gems.into_iter().map(str::to_string).collect(),
        }
    }

    /// Parse `version` and plan for it.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::Malformed`] for unparseable input; there is no
    /// fallback version.
    pub fn plan_for(&self, version: &str) -> Result<InstallPlan, VersionError> {
        Ok(self.plan(&RuntimeVersion::parse(version)?))
    }
}

// Names land verbatim in the `install` argv.
fn is_valid_gem_name(name: &str) -> bool {
    !name.is_empty() && name.trim() == name && !name.starts_with('-')
}

/// The command line that installs `gem`.
#[must_use]
pub fn install_invocation(gem_command: &str, gem: &str) -> Invocation {
    Invocation::new(gem_command, ["install", gem, "--no-document"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const RUBY_34_GEMS: [&str; 40] = [
        "bigdecimal",
        "cgi",
        "csv",
        "drb",
        "fcntl",
        "fileutils",
        "find",
        "ftools",
        "getoptlong",
        "io-console",
        "io-nonblock",
        "io-wait",
        "irb",
        "logger",
        "mutex_m",
        "net-ftp",
        "net-http",
        "net-imap",
        "net-pop",
        "net-protocol",
        "open-uri",
        "optparse",
        "pp",
        "prettyprint",
        "rdoc",
        "readline",
        "reline",
        "resolv",
        "rinda",
        "securerandom",
        "set",
        "tempfile",
        "time",
        "tmpdir",
        "tracer",
        "un",
        "uri",
        "weakref",
        "win32ole",
        "yaml",
    ];

    #[rstest]
    #[case("3.4.0")]
    #[case("3.4.1")]
    #[case("3.5.0")]
    #[case("3.10.0")]
    #[case("4.0.0")]
    fn at_or_above_threshold_installs_full_set(#[case] version: &str) {
        let plan = UnbundlingPolicy::builtin()
            .plan_for(version)
            .expect("valid version");
        assert_eq!(plan.gems(), RUBY_34_GEMS);
    }

    #[rstest]
    #[case("3.3.0")]
    #[case("3.3.99")]
    #[case("2.7.8")]
    #[case("0.0.0")]
    fn below_threshold_installs_nothing(#[case] version: &str) {
        let plan = UnbundlingPolicy::builtin()
            .plan_for(version)
            .expect("valid version");
        assert!(plan.is_empty());
    }

    #[test]
    fn plan_is_pure() {
        let policy = UnbundlingPolicy::builtin();
        let v = RuntimeVersion::new(3, 4, 2);
        assert_eq!(policy.plan(&v), policy.plan(&v));
    }

    #[test]
    fn malformed_version_is_rejected() {
        let err = UnbundlingPolicy::builtin()
            .plan_for("3.4")
            .expect_err("malformed");
        assert!(matches!(err, VersionError::Malformed { .. }));
    }

    #[test]
    fn later_rules_add_to_earlier_ones() {
        let policy = UnbundlingPolicy::from_json(
            r#"{"rules": [
                {"since": "3.4.0", "gems": ["csv", "base64"]},
                {"since": "3.5.0", "gems": ["ostruct", "csv"]}
            ]}"#,
        )
        .expect("policy");
        assert_eq!(
            policy.plan(&RuntimeVersion::new(3, 4, 9)).gems(),
            ["base64", "csv"]
        );
        assert_eq!(
            policy.plan(&RuntimeVersion::new(3, 5, 0)).gems(),
            ["base64", "csv", "ostruct"]
        );
    }

    #[rstest]
    #[case(r#"{"rules": [{"since": "3.4", "gems": []}]}"#, "rules[0].since")]
    #[case(r#"{"rules": [{"since": "3.4.0", "gems": [1]}]}"#, "rules[0].gems[0]")]
    fn parse_errors_name_the_path(#[case] json: &str, #[case] path: &str) {
        match UnbundlingPolicy::from_json(json) {
            Err(PolicyError::Parse { path: got, .. }) => assert_eq!(got, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[rstest]
    #[case("")]
    #[case(" ")]
    #[case(" csv")]
    #[case("csv\n")]
    #[case("--force")]
    #[case("-v")]
    fn invalid_gem_names_are_rejected(#[case] name: &str) {
        let json = serde_json::json!({"rules": [{"since": "3.4.0", "gems": ["uri", name]}]});
        match UnbundlingPolicy::from_json(&json.to_string()) {
            Err(PolicyError::InvalidGemName { since, name: got }) => {
                assert_eq!(since, RuntimeVersion::new(3, 4, 0));
                assert_eq!(got, name);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rules_built_in_code_plan_like_loaded_ones() {
        let policy = UnbundlingPolicy::new(vec![UnbundlingRule {
            since: RuntimeVersion::new(3, 5, 0),
            gems: vec!["ostruct".into(), "benchmark".into()],
        }]);
        assert!(policy.plan(&RuntimeVersion::new(3, 4, 9)).is_empty());
        assert_eq!(
            policy.plan(&RuntimeVersion::new(3, 5, 0)).gems(),
            ["benchmark", "ostruct"]
        );
    }

    #[test]
    fn invocations_follow_plan_order() {
        let plan = UnbundlingPolicy::builtin()
            .plan_for("3.4.0")
            .expect("plan");
        let lines: Vec<String> = plan
            .invocations("gem")
            .iter()
            .map(Invocation::command_line)
            .collect();
        assert_eq!(lines.len(), RUBY_34_GEMS.len());
        assert_eq!(
            lines.first().map(String::as_str),
            Some("gem install bigdecimal --no-document")
        );
        assert_eq!(
            lines.last().map(String::as_str),
            Some("gem install yaml --no-document")
        );
    }
}
