//! Color level detection from environment signals.
//!
//! The rules are evaluated top to bottom and the first match wins. Palette
//! selection downstream relies on this exact order.

use std::fmt;

use crate::env::EnvSnapshot;

/// Color rendering capability of an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColorLevel {
    /// No color escape sequences at all.
    NoColor = 0,
    /// The 16 basic ANSI colors.
    Ansi16 = 1,
    /// The xterm 256-color palette.
    Ansi256 = 2,
    /// 24-bit RGB.
    TrueColor = 3,
}

impl ColorLevel {
    /// Detect the color level of the current process.
    #[must_use]
    pub fn detect() -> Self {
        detect(&EnvSnapshot::capture())
    }

    /// Level for a numeric `FORCE_COLOR` value, if it is in range.
    #[must_use]
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(Self::NoColor),
            1 => Some(Self::Ansi16),
            2 => Some(Self::Ansi256),
            3 => Some(Self::TrueColor),
            _ => None,
        }
    }

    /// Whether any color output is possible.
    #[must_use]
    pub fn has_color(self) -> bool {
        self > Self::NoColor
    }
}

impl fmt::Display for ColorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoColor => "none",
            Self::Ansi16 => "ansi16",
            Self::Ansi256 => "ansi256",
            Self::TrueColor => "truecolor",
        };
        f.write_str(name)
    }
}

const TRUECOLOR_TERMS: [&str; 3] = ["xterm-kitty", "xterm-ghostty", "wezterm"];
const ANSI_TERM_PREFIXES: [&str; 5] = ["screen", "xterm", "vt100", "vt220", "rxvt"];
const ANSI_TERM_FRAGMENTS: [&str; 4] = ["color", "ansi", "cygwin", "linux"];

fn force_color_level(value: &str) -> ColorLevel {
    match value {
        "0" | "false" => ColorLevel::NoColor,
        "1" | "true" => ColorLevel::Ansi16,
        other => other
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(ColorLevel::from_number)
            .unwrap_or(ColorLevel::Ansi16),
    }
}

fn term_level(term: &str) -> Option<ColorLevel> {
    if TRUECOLOR_TERMS.contains(&term) || term.ends_with("-truecolor") {
        return Some(ColorLevel::TrueColor);
    }

    let lower = term.to_ascii_lowercase();
    if lower.ends_with("-256") || lower.ends_with("-256color") {
        return Some(ColorLevel::Ansi256);
    }

    if ANSI_TERM_PREFIXES.iter().any(|p| lower.starts_with(p))
        || ANSI_TERM_FRAGMENTS.iter().any(|f| lower.contains(f))
    {
        return Some(ColorLevel::Ansi16);
    }

    None
}

/// Map an environment snapshot to a color level.
///
/// This never fails: the last rule is a catch-all.
///
/// # Examples
///
/// ```
/// # use termhue::{ColorLevel, EnvSnapshot, detect};
/// let env = EnvSnapshot::from_vars([("TERM", "xterm-256color")], true, true);
/// assert_eq!(detect(&env), ColorLevel::Ansi256);
/// ```
#[must_use]
pub fn detect(env: &EnvSnapshot) -> ColorLevel {
    if env.no_color.as_deref().is_some_and(|v| !v.is_empty()) {
        return ColorLevel::NoColor;
    }

    if let Some(force) = env.force_color.as_deref() {
        return force_color_level(force);
    }

    let forced = env.is_color_forced();
    if !env.stdout_tty && !forced {
        return ColorLevel::NoColor;
    }

    let term = env.term.as_deref().unwrap_or_default();
    if term == "dumb" {
        return ColorLevel::NoColor;
    }

    let colorterm = env.colorterm.as_deref().unwrap_or_default();
    if colorterm == "truecolor" || colorterm == "24bit" {
        return ColorLevel::TrueColor;
    }

    if env.wt_session.is_some() {
        return ColorLevel::TrueColor;
    }

    if let Some(level) = term_level(term) {
        return level;
    }

    if !colorterm.is_empty() {
        return ColorLevel::Ansi16;
    }

    if env.clicolor.as_deref().is_some_and(|v| v != "0") {
        return ColorLevel::Ansi16;
    }

    if env.stdout_tty || forced {
        ColorLevel::Ansi16
    } else {
        ColorLevel::NoColor
    }
}
