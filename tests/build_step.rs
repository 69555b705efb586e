//! End-to-end scenarios for the build step.
//!
//! Each case sets the detected runtime version through the environment and
//! lists every `gem install` the step must run, in order.

use rstest::rstest;
use rubystep::harness::{self, HarnessFailure, Scenario};
use rubystep::mockprocess::CommandPattern;
use rubystep::step::{self, RUNTIME_VERSION_ENV};
use rubystep::{ExecError, StepError};
use serial_test::serial;

const RUBY_34_UNBUNDLED: &[&str] = &[
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

fn gem_install(name: &str) -> CommandPattern {
    CommandPattern::new(&format!(r"gem install {}\b", regex::escape(name))).expect("valid pattern")
}

fn installs(names: &[&str]) -> Vec<CommandPattern> {
    names.iter().copied().map(gem_install).collect()
}

#[rstest]
#[case("ruby 3.4.0 installs bundled gems", "3.4.0", installs(RUBY_34_UNBUNDLED))]
#[case("ruby 3.4.5 installs bundled gems", "3.4.5", installs(RUBY_34_UNBUNDLED))]
#[case("ruby 3.10.0 installs bundled gems", "3.10.0", installs(RUBY_34_UNBUNDLED))]
#[case("ruby 3.3.0 does not install bundled gems", "3.3.0", Vec::new())]
#[case("ruby 2.7.8 does not install bundled gems", "2.7.8", Vec::new())]
#[serial]
fn build(#[case] name: &str, #[case] ruby_version: &str, #[case] want: Vec<CommandPattern>) {
    let scenario = Scenario::new(name)
        .with_env(RUNTIME_VERSION_ENV, ruby_version)
        .with_exec_mock(want);
    harness::assert_build(&scenario, step::build);
}

#[test]
#[serial]
fn missing_gem_fails_the_scenario() {
    let mut names = RUBY_34_UNBUNDLED.to_vec();
    names.retain(|n| *n != "yaml");
    let scenario = Scenario::new("yaml dropped")
        .with_env(RUNTIME_VERSION_ENV, "3.4.0")
        .with_exec_mock(installs(&names));
    let err = harness::run(&scenario, step::build).expect_err("extra install of yaml");
    assert!(matches!(
        err.failure,
        HarnessFailure::Build(StepError::Exec(ExecError::UnexpectedInvocation { .. }))
    ));
}

#[test]
#[serial]
fn swapped_order_fails_the_scenario() {
    let mut names = RUBY_34_UNBUNDLED.to_vec();
    names.swap(0, 1);
    let scenario = Scenario::new("cgi before bigdecimal")
        .with_env(RUNTIME_VERSION_ENV, "3.4.0")
        .with_exec_mock(installs(&names));
    let err = harness::run(&scenario, step::build).expect_err("order violation");
    match err.failure {
        HarnessFailure::Build(StepError::Exec(ExecError::WrongCommand { expected, actual })) => {
            assert_eq!(expected, r"gem install cgi\b");
            assert_eq!(actual, "gem install bigdecimal --no-document");
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

#[test]
#[serial]
fn any_install_fails_a_pre_threshold_scenario() {
    let scenario = Scenario::new("3.3.0 expecting csv")
        .with_env(RUNTIME_VERSION_ENV, "3.3.0")
        .with_exec_mock([gem_install("csv")]);
    let err = harness::run(&scenario, step::build).expect_err("csv never installed");
    assert!(matches!(err.failure, HarnessFailure::Verify(_)));
    assert!(err.to_string().contains("gem install csv"), "{err}");
}

#[test]
#[serial]
fn unset_version_is_a_detection_error() {
    let scenario = Scenario::new("no version").without_env(RUNTIME_VERSION_ENV);
    let err = harness::run(&scenario, step::build).expect_err("no version");
    assert!(matches!(
        err.failure,
        HarnessFailure::Build(StepError::VersionNotDetected { .. })
    ));
}

#[test]
#[serial]
fn failed_install_stops_the_build() {
    let scenario = Scenario::new("csv install fails")
        .with_env(RUNTIME_VERSION_ENV, "3.4.0")
        .with_exec_mock([
            gem_install("bigdecimal"),
            gem_install("cgi"),
            gem_install("csv").with_exit_code(1),
        ]);
    let err = harness::run(&scenario, step::build).expect_err("csv fails");
    assert!(matches!(
        err.failure,
        HarnessFailure::Build(StepError::CommandFailed { exit_code: 1, .. })
    ));
}
