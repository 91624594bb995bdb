//! ANSI rendering at a given color level.
//!
//! [`Painter`] turns hex colors into escape sequences for one level;
//! [`ColorSupport`] bundles a detected level with a theme and remembers
//! whether it already told the user that color is unavailable.

use tracing::warn;

use crate::color::{hex_gradient, hex_to_ansi16, hex_to_ansi256, hex_to_rgb, rgb_to_ansi256};
use crate::env::EnvSnapshot;
use crate::level::{ColorLevel, detect};
use crate::probe::{ProbeOptions, probe_theme_sync};
use crate::theme::Theme;

/// SGR reset.
pub const RESET: &str = "\x1b[0m";

/// Renders colored text for one [`ColorLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Painter {
    level: ColorLevel,
}

impl Painter {
    /// Create a painter for `level`.
    #[must_use]
    pub const fn new(level: ColorLevel) -> Self {
        Self { level }
    }

    /// The level this painter renders for.
    #[must_use]
    pub const fn level(self) -> ColorLevel {
        self.level
    }

    /// Foreground escape sequence for `hex`, empty when color is off.
    ///
    /// # Examples
    ///
    /// ```
    /// # use termhue::{ColorLevel, paint::Painter};
    /// assert_eq!(Painter::new(ColorLevel::TrueColor).prefix("#ff8000"), "\x1b[38;2;255;128;0m");
    /// assert_eq!(Painter::new(ColorLevel::Ansi256).prefix("#ff8000"), "\x1b[38;5;214m");
    /// assert_eq!(Painter::new(ColorLevel::Ansi16).prefix("#ff8000"), "\x1b[93m");
    /// assert_eq!(Painter::new(ColorLevel::NoColor).prefix("#ff8000"), "");
    /// ```
    #[must_use]
    pub fn prefix(self, hex: &str) -> String {
        match self.level {
            ColorLevel::NoColor => String::new(),
            ColorLevel::Ansi16 => format!("\x1b[{}m", hex_to_ansi16(hex)),
            ColorLevel::Ansi256 => format!("\x1b[38;5;{}m", hex_to_ansi256(hex)),
            ColorLevel::TrueColor => {
                let rgb = hex_to_rgb(hex);
                format!("\x1b[38;2;{};{};{}m", rgb.r, rgb.g, rgb.b)
            }
        }
    }

    /// Wrap `text` in the color for `hex` followed by a reset.
    #[must_use]
    pub fn colorize(self, text: &str, hex: &str) -> String {
        let prefix = self.prefix(hex);
        if prefix.is_empty() {
            return text.to_owned();
        }
        format!("{prefix}{text}{RESET}")
    }

    /// Color each character of `text` along a gradient from `start_hex` to
    /// `end_hex`.
    ///
    /// Needs at least 256 colors; below that the text is returned as is.
    #[must_use]
    pub fn gradient(self, text: &str, start_hex: &str, end_hex: &str) -> String {
        if self.level < ColorLevel::Ansi256 {
            return text.to_owned();
        }

        let chars: Vec<char> = text.chars().collect();
        let colors = hex_gradient(start_hex, end_hex, chars.len());

        let mut out = String::with_capacity(text.len() * 20);
        for (ch, rgb) in chars.iter().zip(colors) {
            if self.level == ColorLevel::TrueColor {
                out.push_str(&format!("\x1b[38;2;{};{};{}m", rgb.r, rgb.g, rgb.b));
            } else {
                out.push_str(&format!("\x1b[38;5;{}m", rgb_to_ansi256(rgb)));
            }
            out.push(*ch);
        }
        out.push_str(RESET);
        out
    }
}

/// Detected color capabilities of one output stream.
///
/// The "already warned" state lives here rather than in a global, so two
/// independent instances each warn at most once.
#[derive(Debug, Clone)]
pub struct ColorSupport {
    env: EnvSnapshot,
    level: ColorLevel,
    theme: Theme,
    warnings_enabled: bool,
    warned: bool,
}

impl ColorSupport {
    /// Detect the color level from `options.env` and resolve the theme with
    /// the synchronous probe.
    #[must_use]
    pub fn detect(options: &ProbeOptions) -> Self {
        Self::from_parts(options.env.clone(), probe_theme_sync(options))
    }

    /// Build from a snapshot and an already known theme.
    #[must_use]
    pub fn from_parts(env: EnvSnapshot, theme: Theme) -> Self {
        let level = detect(&env);
        Self {
            env,
            level,
            theme,
            warnings_enabled: true,
            warned: false,
        }
    }

    /// Turn the "no color support" warning on or off.
    #[must_use]
    pub fn with_warnings(mut self, enabled: bool) -> Self {
        self.warnings_enabled = enabled;
        self
    }

    /// The snapshot the level was computed from.
    #[must_use]
    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    /// Detected color level.
    #[must_use]
    pub fn level(&self) -> ColorLevel {
        self.level
    }

    /// Resolved background theme.
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    /// A painter for the detected level.
    #[must_use]
    pub fn painter(&self) -> Painter {
        Painter::new(self.level)
    }

    /// Warn once if stdout is a terminal yet no color will be emitted.
    ///
    /// Returns `true` if the warning was emitted by this call.
    pub fn warn_if_unsupported(&mut self) -> bool {
        if self.warned || !self.warnings_enabled {
            return false;
        }
        if self.level.has_color() || !self.env.stdout_tty {
            return false;
        }

        self.warned = true;
        warn!(
            term = ?self.env.term,
            "No ANSI color support detected in this terminal; set FORCE_COLOR to enable it"
        );
        true
    }
}
