//! Integration tests for the probe executable and the synchronous probe.
//!
//! Test processes have no terminal on stdin, so the executable always
//! answers `unknown` here; the parent side is exercised against it and
//! against deliberately broken children.

use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;
use termhue::probe::{ProbeCommand, TerminalPolicy};
use termhue::{EnvSnapshot, ProbeOptions, Theme, probe_theme_sync};

/// Get the binary to test
fn termhue_cmd() -> Command {
    Command::cargo_bin("termhue").unwrap()
}

fn options(command: ProbeCommand) -> ProbeOptions {
    ProbeOptions {
        theme: None,
        env: EnvSnapshot::from_vars([("TERM", "xterm-kitty")], true, true),
        policy: TerminalPolicy::default(),
        command,
        timeout: Duration::from_millis(1500),
    }
}

#[test]
fn test_prints_unknown_without_terminal() {
    termhue_cmd()
        .assert()
        .success()
        .stdout(predicate::eq("unknown\n"));
}

#[test]
fn test_debug_output_stays_on_stderr() {
    termhue_cmd()
        .env("DEBUG", "1")
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stdout(predicate::eq("unknown\n"))
        .stderr(predicate::str::contains("stdin is not a terminal"));
}

#[test]
fn test_sync_probe_runs_bundled_executable() {
    let command = ProbeCommand::new(env!("CARGO_BIN_EXE_termhue"));
    assert_eq!(probe_theme_sync(&options(command)), Theme::Unknown);
}

#[test]
fn test_sync_probe_reads_child_token() {
    let command = ProbeCommand::new("sh").arg("-c").arg("echo light");
    assert_eq!(probe_theme_sync(&options(command)), Theme::Light);
}

#[test]
fn test_sync_probe_never_fails() {
    let failing = [
        ProbeCommand::new("sh").arg("-c").arg("exit 1"),
        ProbeCommand::new("sh").arg("-c").arg("kill -9 $$"),
        ProbeCommand::new("/definitely/not/here"),
    ];
    for command in failing {
        assert_eq!(probe_theme_sync(&options(command)), Theme::Unknown);
    }
}

#[test]
fn test_sync_probe_outer_timeout() {
    let mut slow = options(ProbeCommand::new("sleep").arg("10"));
    slow.timeout = Duration::from_millis(100);

    let started = Instant::now();
    assert_eq!(probe_theme_sync(&slow), Theme::Unknown);
    assert!(started.elapsed() < Duration::from_secs(5));
}
