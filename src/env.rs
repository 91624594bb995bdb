//! Environment snapshot used by the detector and the probe.
//!
//! The snapshot is taken once and never refreshed; callers that want to see
//! a changed environment build a new one.

use std::ffi::OsString;
use std::io::IsTerminal;

/// Environment variables consulted by the color level rules and the
/// terminal allowlist.
pub const ENV_VARS: [&str; 9] = [
    "NO_COLOR",
    "FORCE_COLOR",
    "TERM",
    "COLORTERM",
    "CLICOLOR",
    "CLICOLOR_FORCE",
    "WT_SESSION",
    "TERM_PROGRAM",
    "VTE_VERSION",
];

/// Immutable view of the color-related environment of a process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    /// `NO_COLOR`
    pub no_color: Option<String>,
    /// `FORCE_COLOR`
    pub force_color: Option<String>,
    /// `TERM`
    pub term: Option<String>,
    /// `COLORTERM`
    pub colorterm: Option<String>,
    /// `CLICOLOR`
    pub clicolor: Option<String>,
    /// `CLICOLOR_FORCE`
    pub clicolor_force: Option<String>,
    /// `WT_SESSION`
    pub wt_session: Option<String>,
    /// `TERM_PROGRAM`
    pub term_program: Option<String>,
    /// `VTE_VERSION`
    pub vte_version: Option<String>,
    /// Whether standard input is attached to a terminal.
    pub stdin_tty: bool,
    /// Whether standard output is attached to a terminal.
    pub stdout_tty: bool,
}

impl EnvSnapshot {
    /// Capture the current process environment and stdio TTY state.
    #[must_use]
    pub fn capture() -> Self {
        Self::from_os_vars(
            ENV_VARS
                .iter()
                .filter_map(|name| std::env::var_os(name).map(|v| (*name, v))),
            std::io::stdin().is_terminal(),
            std::io::stdout().is_terminal(),
        )
    }

    /// Like [`from_vars`](Self::from_vars), for raw OS values.
    ///
    /// Values that are not valid UTF-8 are kept lossily rather than dropped,
    /// so a set variable always counts as present.
    pub fn from_os_vars<I, K>(vars: I, stdin_tty: bool, stdout_tty: bool) -> Self
    where
        I: IntoIterator<Item = (K, OsString)>,
        K: AsRef<str>,
    {
        Self::from_vars(
            vars.into_iter()
                .map(|(name, value)| (name, value.to_string_lossy().into_owned())),
            stdin_tty,
            stdout_tty,
        )
    }

    /// Build a snapshot from arbitrary `(name, value)` pairs.
    ///
    /// Names outside [`ENV_VARS`] are ignored; a later pair for the same name
    /// wins.
    ///
    /// # Examples
    ///
    /// ```
    /// # use termhue::EnvSnapshot;
    /// let env = EnvSnapshot::from_vars([("TERM", "xterm-256color")], true, true);
    /// assert_eq!(env.term.as_deref(), Some("xterm-256color"));
    /// assert!(env.no_color.is_none());
    /// ```
    pub fn from_vars<I, K, V>(vars: I, stdin_tty: bool, stdout_tty: bool) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut env = Self {
            stdin_tty,
            stdout_tty,
            ..Self::default()
        };

        for (name, value) in vars {
            let slot = match name.as_ref() {
                "NO_COLOR" => &mut env.no_color,
                "FORCE_COLOR" => &mut env.force_color,
                "TERM" => &mut env.term,
                "COLORTERM" => &mut env.colorterm,
                "CLICOLOR" => &mut env.clicolor,
                "CLICOLOR_FORCE" => &mut env.clicolor_force,
                "WT_SESSION" => &mut env.wt_session,
                "TERM_PROGRAM" => &mut env.term_program,
                "VTE_VERSION" => &mut env.vte_version,
                _ => continue,
            };
            *slot = Some(value.into());
        }

        env
    }

    /// `CLICOLOR_FORCE` is set to something other than `"0"`.
    #[must_use]
    pub fn is_color_forced(&self) -> bool {
        self.clicolor_force.as_deref().is_some_and(|v| v != "0")
    }
}
