//! Background theme classification.

use std::fmt;
use std::str::FromStr;

use crate::color::Rgb;

/// Threshold for determining if a color is dark or light based on luminance.
/// Colors with luminance below this value are considered dark.
const DARK_THRESHOLD: f64 = 0.5;

/// Whether the terminal background is dark or light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    /// Dark background, light text.
    Dark,
    /// Light background, dark text.
    Light,
    /// The background could not be determined.
    #[default]
    Unknown,
}

impl Theme {
    /// The token written by the child probe for this theme.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::Unknown => "unknown",
        }
    }

    /// Classify a background color.
    ///
    /// # Examples
    ///
    /// ```
    /// # use termhue::{Theme, color::Rgb};
    /// assert_eq!(Theme::from_background(Rgb::new(10, 11, 12)), Theme::Dark);
    /// assert_eq!(Theme::from_background(Rgb::new(255, 250, 241)), Theme::Light);
    /// ```
    #[must_use]
    pub fn from_background(rgb: Rgb) -> Self {
        if luminance(rgb) < DARK_THRESHOLD {
            Self::Dark
        } else {
            Self::Light
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a token is not `dark`, `light` or `unknown`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized theme token: {0:?}")]
pub struct ParseThemeError(String);

impl FromStr for Theme {
    type Err = ParseThemeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            "unknown" => Ok(Self::Unknown),
            other => Err(ParseThemeError(other.to_owned())),
        }
    }
}

/// Perceived brightness of a color, between 0.0 (black) and 1.0 (white).
///
/// Uses the Rec. 601 luma weights directly on the gamma-encoded channels:
///
/// L = (0.299 × R + 0.587 × G + 0.114 × B) / 255
#[must_use]
pub fn luminance(rgb: Rgb) -> f64 {
    (0.299 * f64::from(rgb.r) + 0.587 * f64::from(rgb.g) + 0.114 * f64::from(rgb.b)) / 255.0
}
