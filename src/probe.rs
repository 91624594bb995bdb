//! Synchronous background probe running in a throwaway child process.
//!
//! The parent never touches its own terminal modes: a child process enters
//! raw mode, performs one OSC 11 exchange and prints a single token. If the
//! child misbehaves, hangs or cannot be started, the answer is simply
//! [`Theme::Unknown`].

use std::ffi::OsString;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::debug;
use wait_timeout::ChildExt;

use crate::env::EnvSnapshot;
use crate::osc::QuerierOptions;
use crate::theme::Theme;

/// Default upper bound on how long the parent waits for the child.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Name of the executable that implements the child side.
pub const PROBE_BIN: &str = "termhue";

/// Which part of the environment a policy entry looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalKey {
    /// `TERM_PROGRAM` equals this value (ASCII case-insensitive).
    TermProgram(String),
    /// `TERM` starts with this value (ASCII case-insensitive).
    Term(String),
    /// `VTE_VERSION` is set, i.e. a VTE-based terminal.
    Vte,
    /// `WT_SESSION` is set, i.e. Windows Terminal.
    WindowsTerminal,
}

impl TerminalKey {
    fn matches(&self, env: &EnvSnapshot) -> bool {
        match self {
            Self::TermProgram(name) => env
                .term_program
                .as_deref()
                .is_some_and(|p| p.eq_ignore_ascii_case(name)),
            Self::Term(prefix) => env
                .term
                .as_deref()
                .and_then(|t| t.get(..prefix.len()))
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
            Self::Vte => env.vte_version.is_some(),
            Self::WindowsTerminal => env.wt_session.is_some(),
        }
    }
}

/// One row of the allowlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    /// What to match.
    pub key: TerminalKey,
    /// Whether a matching terminal is expected to answer OSC 11.
    pub supported: bool,
}

/// Terminals known to answer (or ignore) OSC 11 queries.
///
/// Entries are checked in order and the first match decides; a terminal
/// matching nothing is not probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalPolicy {
    entries: Vec<PolicyEntry>,
}

const KNOWN_TERM_PROGRAMS: [(&str, bool); 8] = [
    ("WezTerm", true),
    ("iTerm.app", true),
    ("Apple_Terminal", true),
    ("ghostty", true),
    ("vscode", true),
    ("rio", true),
    ("tmux", false),
    ("Jetbrains.Fleet", false),
];

const KNOWN_TERMS: [(&str, bool); 6] = [
    ("xterm-kitty", true),
    ("xterm-ghostty", true),
    ("alacritty", true),
    ("foot", true),
    ("wezterm", true),
    ("linux", false),
];

impl Default for TerminalPolicy {
    fn default() -> Self {
        let programs = KNOWN_TERM_PROGRAMS
            .iter()
            .map(|(name, supported)| PolicyEntry {
                key: TerminalKey::TermProgram((*name).to_owned()),
                supported: *supported,
            });
        let terms = KNOWN_TERMS.iter().map(|(name, supported)| PolicyEntry {
            key: TerminalKey::Term((*name).to_owned()),
            supported: *supported,
        });
        let others = [
            PolicyEntry {
                key: TerminalKey::WindowsTerminal,
                supported: true,
            },
            PolicyEntry {
                key: TerminalKey::Vte,
                supported: true,
            },
        ];

        Self {
            entries: programs.chain(terms).chain(others).collect(),
        }
    }
}

impl TerminalPolicy {
    /// A policy that matches nothing, so no terminal is ever probed.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an entry that takes precedence over the existing ones.
    #[must_use]
    pub fn with_entry(mut self, key: TerminalKey, supported: bool) -> Self {
        self.entries.insert(0, PolicyEntry { key, supported });
        self
    }

    /// The entries, in evaluation order.
    #[must_use]
    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    /// Whether the terminal described by `env` is worth probing.
    #[must_use]
    pub fn allows(&self, env: &EnvSnapshot) -> bool {
        self.entries
            .iter()
            .find(|entry| entry.key.matches(env))
            .is_some_and(|entry| entry.supported)
    }
}

/// The child process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    /// Executable path or name.
    pub program: PathBuf,
    /// Arguments; the bundled probe takes none.
    pub args: Vec<OsString>,
}

impl ProbeCommand {
    /// Run `program` with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Default for ProbeCommand {
    /// The bundled probe executable: next to the current executable if it
    /// is there, otherwise looked up on `PATH`.
    fn default() -> Self {
        let sibling = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(PROBE_BIN)))
            .filter(|path| path.is_file());

        Self::new(sibling.unwrap_or_else(|| PathBuf::from(PROBE_BIN)))
    }
}

/// Inputs of [`probe_theme_sync`].
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Skip detection and return this theme.
    pub theme: Option<Theme>,
    /// Environment used for the TTY check and the allowlist.
    pub env: EnvSnapshot,
    /// Which terminals are worth probing.
    pub policy: TerminalPolicy,
    /// Child process implementing the probe contract.
    ///
    /// Defaults to a `termhue` executable next to the current one, then to
    /// `termhue` on `PATH`. Programs embedding the library without shipping
    /// that executable should set this explicitly; a missing executable is
    /// only visible as [`Theme::Unknown`].
    pub command: ProbeCommand,
    /// Upper bound on the wait for the child.
    pub timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            theme: None,
            env: EnvSnapshot::capture(),
            policy: TerminalPolicy::default(),
            command: ProbeCommand::default(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Determine the terminal background without any async machinery.
///
/// Blocks for at most `options.timeout`. Never fails: every problem,
/// including a child that cannot be spawned, exits nonzero, prints something
/// unexpected or runs too long, yields [`Theme::Unknown`].
///
/// With the default [`ProbeCommand`] the `termhue` executable must be
/// installed next to the current executable or on `PATH`; otherwise the
/// spawn fails and the result is always [`Theme::Unknown`]. Set
/// [`ProbeOptions::command`] when embedding.
#[must_use]
pub fn probe_theme_sync(options: &ProbeOptions) -> Theme {
    if let Some(theme) = options.theme {
        debug!(%theme, "using theme override");
        return theme;
    }

    if !options.env.stdout_tty {
        debug!("stdout is not a terminal, not probing");
        return Theme::Unknown;
    }

    if !options.policy.allows(&options.env) {
        debug!(
            term = ?options.env.term,
            term_program = ?options.env.term_program,
            "terminal not known to answer OSC 11, not probing"
        );
        return Theme::Unknown;
    }

    match run_probe(&options.command, options.timeout) {
        Ok(theme) => theme,
        Err(err) => {
            debug!("probe failed: {err:#}");
            Theme::Unknown
        }
    }
}

/// Spawn the probe and read its single token.
///
/// The child's exit and its stdout share one deadline: a child that exits
/// while a descendant keeps the pipe open still gives up at `timeout`.
fn run_probe(command: &ProbeCommand, timeout: Duration) -> Result<Theme> {
    let deadline = Instant::now() + timeout;

    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("Failed to spawn probe {}", command.program.display()))?;

    let Some(mut stdout) = child.stdout.take() else {
        let _ = child.kill();
        let _ = child.wait();
        bail!("probe stdout was not captured");
    };

    // The reader is detached: if the pipe never closes it stays blocked, the
    // caller does not.
    let (tx, rx) = mpsc::channel();
    let reader = thread::Builder::new()
        .name("termhue-probe-stdout".into())
        .spawn(move || {
            let mut output = String::new();
            let result = stdout.read_to_string(&mut output).map(|_| output);
            let _ = tx.send(result);
        });
    if let Err(err) = reader {
        let _ = child.kill();
        let _ = child.wait();
        return Err(err).context("Failed to start probe reader");
    }

    let Some(status) = child
        .wait_timeout(deadline.saturating_duration_since(Instant::now()))
        .context("Failed to wait for probe")?
    else {
        // Timeout - kill the process and reap it
        let _ = child.kill();
        let _ = child.wait();
        bail!("probe timed out after {timeout:?}");
    };

    if !status.success() {
        bail!("probe exited with {status}");
    }

    let remaining = deadline.saturating_duration_since(Instant::now());
    let output = match rx.recv_timeout(remaining) {
        Ok(read) => read.context("Failed to read probe output")?,
        Err(RecvTimeoutError::Timeout) => {
            bail!("probe output still open after {timeout:?}")
        }
        Err(RecvTimeoutError::Disconnected) => bail!("probe reader stopped"),
    };

    parse_probe_output(&output)
}

/// Accept exactly one token line, with or without the trailing newline.
fn parse_probe_output(output: &str) -> Result<Theme> {
    let line = output.strip_suffix('\n').unwrap_or(output);
    if line.contains('\n') {
        bail!("probe printed more than one line: {output:?}");
    }
    line.parse::<Theme>().map_err(Into::into)
}

/// Child side of the probe contract.
///
/// Runs one OSC 11 exchange against the controlling terminal on a private
/// single-threaded runtime and returns the theme to print. Anything that
/// goes wrong, starting with an input that is not a terminal, is
/// [`Theme::Unknown`].
#[must_use]
pub fn run_child(options: QuerierOptions) -> Theme {
    if !std::io::stdin().is_terminal() {
        debug!("stdin is not a terminal");
        return Theme::Unknown;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            debug!(%err, "failed to start runtime");
            return Theme::Unknown;
        }
    };

    runtime
        .block_on(crate::query_theme_async(options))
        .unwrap_or_else(|err| {
            debug!(%err, "query failed");
            Theme::Unknown
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wezterm() -> EnvSnapshot {
        EnvSnapshot::from_vars([("TERM_PROGRAM", "WezTerm")], true, true)
    }

    fn shell(script: &str) -> ProbeOptions {
        ProbeOptions {
            theme: None,
            env: wezterm(),
            policy: TerminalPolicy::default(),
            command: ProbeCommand::new("sh").arg("-c").arg(script),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[test]
    fn test_policy_defaults() {
        let policy = TerminalPolicy::default();
        let env =
            |vars: &[(&str, &str)]| EnvSnapshot::from_vars(vars.iter().copied(), true, true);

        assert!(policy.allows(&env(&[("TERM_PROGRAM", "WezTerm")])));
        assert!(policy.allows(&env(&[("TERM_PROGRAM", "iterm.app")])));
        assert!(policy.allows(&env(&[("TERM_PROGRAM", "Apple_Terminal")])));
        assert!(policy.allows(&env(&[("TERM", "xterm-kitty")])));
        assert!(policy.allows(&env(&[("TERM", "xterm-ghostty")])));
        assert!(policy.allows(&env(&[("TERM", "alacritty")])));
        assert!(policy.allows(&env(&[("TERM", "xterm-256color"), ("VTE_VERSION", "7600")])));
        assert!(policy.allows(&env(&[("WT_SESSION", "abc")])));

        assert!(!policy.allows(&env(&[])));
        assert!(!policy.allows(&env(&[("TERM", "xterm-256color")])));
        assert!(!policy.allows(&env(&[("TERM", "linux"), ("VTE_VERSION", "7600")])));
        assert!(!policy.allows(&env(&[("TERM_PROGRAM", "tmux"), ("TERM", "xterm-kitty")])));
    }

    #[test]
    fn test_policy_extension_wins() {
        let env = EnvSnapshot::from_vars([("TERM", "xterm-256color")], true, true);
        let policy = TerminalPolicy::default().with_entry(TerminalKey::Term("xterm".into()), true);
        assert!(policy.allows(&env));

        let policy = TerminalPolicy::default()
            .with_entry(TerminalKey::TermProgram("WezTerm".into()), false);
        assert!(!policy.allows(&wezterm()));
        assert!(!TerminalPolicy::empty().allows(&wezterm()));
    }

    #[test]
    fn test_default_command_falls_back_to_path() {
        // unit tests run from target/*/deps, where no probe executable lives
        let command = ProbeCommand::default();
        assert_eq!(command.program, PathBuf::from(PROBE_BIN));
        assert!(command.args.is_empty());
    }

    #[test]
    fn test_parse_probe_output() {
        assert_eq!(parse_probe_output("dark\n").ok(), Some(Theme::Dark));
        assert_eq!(parse_probe_output("light").ok(), Some(Theme::Light));
        assert_eq!(parse_probe_output("unknown\n").ok(), Some(Theme::Unknown));
        assert!(parse_probe_output("").is_err());
        assert!(parse_probe_output("dark\nlight\n").is_err());
        assert!(parse_probe_output("Dark\n").is_err());
        assert!(parse_probe_output("dark\n\n").is_err());
    }

    #[test]
    fn test_override_skips_everything() {
        let options = ProbeOptions {
            theme: Some(Theme::Light),
            env: EnvSnapshot::default(),
            command: ProbeCommand::new("/nonexistent/termhue"),
            ..shell("exit 1")
        };
        assert_eq!(probe_theme_sync(&options), Theme::Light);
    }

    #[test]
    fn test_not_a_tty_is_unknown() {
        let options = ProbeOptions {
            env: EnvSnapshot::from_vars([("TERM_PROGRAM", "WezTerm")], true, false),
            ..shell("echo dark")
        };
        assert_eq!(probe_theme_sync(&options), Theme::Unknown);
    }

    #[test]
    fn test_unlisted_terminal_is_not_probed() {
        let options = ProbeOptions {
            policy: TerminalPolicy::empty(),
            ..shell("echo dark")
        };
        assert_eq!(probe_theme_sync(&options), Theme::Unknown);
    }

    #[test]
    fn test_child_answer_is_used() {
        assert_eq!(probe_theme_sync(&shell("echo dark")), Theme::Dark);
        assert_eq!(probe_theme_sync(&shell("printf light")), Theme::Light);
        assert_eq!(probe_theme_sync(&shell("echo unknown")), Theme::Unknown);
    }

    #[test]
    fn test_nonzero_exit_is_unknown() {
        assert_eq!(probe_theme_sync(&shell("echo dark; exit 3")), Theme::Unknown);
    }

    #[test]
    fn test_malformed_output_is_unknown() {
        assert_eq!(probe_theme_sync(&shell("echo dark; echo extra")), Theme::Unknown);
        assert_eq!(probe_theme_sync(&shell("echo purple")), Theme::Unknown);
    }

    #[test]
    fn test_spawn_failure_is_unknown() {
        let options = ProbeOptions {
            command: ProbeCommand::new("/nonexistent/termhue"),
            ..shell("")
        };
        assert_eq!(probe_theme_sync(&options), Theme::Unknown);
    }

    #[test]
    fn test_lingering_descendant_does_not_block() {
        // the shell exits at once, its background child keeps stdout open
        let options = ProbeOptions {
            timeout: Duration::from_millis(200),
            ..shell("sleep 3 & echo dark")
        };

        let started = Instant::now();
        assert_eq!(probe_theme_sync(&options), Theme::Unknown);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_outer_timeout_is_unknown() {
        let options = ProbeOptions {
            timeout: Duration::from_millis(200),
            ..shell("sleep 5; echo dark")
        };

        let started = Instant::now();
        assert_eq!(probe_theme_sync(&options), Theme::Unknown);
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
