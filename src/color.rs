//! Color conversion utilities.
//!
//! This module provides functions for:
//! - Parsing hex color strings, permissively
//! - Converting RGB, HSL and RGBA values to ANSI 16 and ANSI 256 codes
//! - Interpolating colors for gradients
//!
//! Nothing in here fails: malformed input degrades to black so that a bad
//! user-supplied color can never break a logging call.

use once_cell::sync::Lazy;
use regex::Regex;

static HEX_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-f0-9]{6}|[a-f0-9]{3}").expect("hex run pattern is valid")
});

/// RGB color representation with red, green, and blue components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    /// Red component (0-255)
    pub r: u8,
    /// Green component (0-255)
    pub g: u8,
    /// Blue component (0-255)
    pub b: u8,
}

impl Rgb {
    /// Create a new RGB color from individual components.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a new RGB color from a tuple.
    #[must_use]
    pub fn from_tuple(rgb: (u8, u8, u8)) -> Self {
        Self::new(rgb.0, rgb.1, rgb.2)
    }

    /// Convert RGB color to a tuple.
    #[must_use]
    pub fn to_tuple(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

/// HSL color: hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    /// Hue (0-360)
    pub h: f64,
    /// Saturation (0-100)
    pub s: f64,
    /// Lightness (0-100)
    pub l: f64,
}

impl Hsl {
    /// Create a new HSL color.
    #[must_use]
    pub const fn new(h: f64, s: f64, l: f64) -> Self {
        Self { h, s, l }
    }
}

/// RGB color with an alpha channel in the 0-1 range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    /// Red component (0-255)
    pub r: u8,
    /// Green component (0-255)
    pub g: u8,
    /// Blue component (0-255)
    pub b: u8,
    /// Alpha (0-1)
    pub a: f64,
}

impl Rgba {
    /// Create a new RGBA color.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

/// Rounds and clamps a channel value into the 0-255 range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Parse a hex color out of arbitrary text.
///
/// The first run of six hex digits (or, failing that at a given position,
/// three) found anywhere in `text` is used, so `#ff8000`, `ff8000` and
/// `color: #F80;` all parse. Three-digit shorthand is expanded by doubling
/// each digit.
///
/// # Returns
///
/// The parsed color, or black when no hex run is present.
///
/// # Examples
///
/// ```
/// # use termhue::color::{Rgb, hex_to_rgb};
/// assert_eq!(hex_to_rgb("#ff8000"), Rgb::new(255, 128, 0));
/// assert_eq!(hex_to_rgb("#f00"), Rgb::new(255, 0, 0));
/// assert_eq!(hex_to_rgb("not a color"), Rgb::new(0, 0, 0));
/// ```
#[must_use]
pub fn hex_to_rgb(text: &str) -> Rgb {
    let Some(found) = HEX_RUN.find(text) else {
        return Rgb::default();
    };

    let digits = found.as_str();
    let expanded: String = if digits.len() == 3 {
        digits.chars().flat_map(|c| [c, c]).collect()
    } else {
        digits.to_owned()
    };

    let Ok(n) = u32::from_str_radix(&expanded, 16) else {
        return Rgb::default();
    };

    #[allow(clippy::cast_possible_truncation)]
    Rgb::new((n >> 16) as u8, (n >> 8) as u8, n as u8)
}

/// Convert an HSL color to RGB.
///
/// A saturation of zero short-circuits to a gray of the given lightness.
#[must_use]
pub fn hsl_to_rgb(hsl: Hsl) -> Rgb {
    let h = hsl.h / 360.0;
    let s = hsl.s / 100.0;
    let l = hsl.l / 100.0;

    if s == 0.0 {
        let v = channel(l * 255.0);
        return Rgb::new(v, v, v);
    }

    let t2 = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let t1 = 2.0 * l - t2;

    let component = |offset: f64| -> u8 {
        let mut t3 = h + offset;
        if t3 < 0.0 {
            t3 += 1.0;
        }
        if t3 > 1.0 {
            t3 -= 1.0;
        }

        let v = if 6.0 * t3 < 1.0 {
            t1 + (t2 - t1) * 6.0 * t3
        } else if 2.0 * t3 < 1.0 {
            t2
        } else if 3.0 * t3 < 2.0 {
            t1 + (t2 - t1) * (2.0 / 3.0 - t3) * 6.0
        } else {
            t1
        };
        channel(v * 255.0)
    };

    Rgb::new(
        component(1.0 / 3.0),
        component(0.0),
        component(-1.0 / 3.0),
    )
}

/// Drop the alpha channel of an RGBA color.
#[must_use]
pub fn rgba_to_rgb(rgba: Rgba) -> Rgb {
    Rgb::new(rgba.r, rgba.g, rgba.b)
}

/// Map an RGB color onto the xterm 256-color palette.
///
/// Grays use the 24-step ramp (232-255) with black and white snapping to the
/// cube corners; everything else lands in the 6x6x6 cube (16-231).
#[must_use]
pub fn rgb_to_ansi256(rgb: Rgb) -> u8 {
    let Rgb { r, g, b } = rgb;

    if r == g && g == b {
        if r < 8 {
            return 16;
        }
        if r > 248 {
            return 231;
        }
        let step = ((f64::from(r) - 8.0) / 247.0 * 24.0).round();
        return 232 + channel(step);
    }

    let scale = |c: u8| channel(f64::from(c) / 255.0 * 5.0);
    16 + 36 * scale(r) + 6 * scale(g) + scale(b)
}

/// The HSV value (brightness) of a color, in percent.
fn hsv_value(rgb: Rgb) -> f64 {
    f64::from(rgb.r.max(rgb.g).max(rgb.b)) / 255.0 * 100.0
}

/// Map an RGB color onto the 16 basic ANSI foreground codes (30-37, 90-97).
#[must_use]
pub fn rgb_to_ansi16(rgb: Rgb) -> u8 {
    let bucket = (hsv_value(rgb) / 50.0).round();
    if bucket == 0.0 {
        return 30;
    }

    let bit = |c: u8| channel(f64::from(c) / 255.0);
    let mut code = 30 + ((bit(rgb.b) << 2) | (bit(rgb.g) << 1) | bit(rgb.r));
    if bucket >= 2.0 {
        code += 60;
    }
    code
}

/// Convert a hex color string to an ANSI 16 foreground code.
#[must_use]
pub fn hex_to_ansi16(hex: &str) -> u8 {
    rgb_to_ansi16(hex_to_rgb(hex))
}

/// Convert a hex color string to an ANSI 256 palette index.
#[must_use]
pub fn hex_to_ansi256(hex: &str) -> u8 {
    rgb_to_ansi256(hex_to_rgb(hex))
}

/// Convert an HSL color to an ANSI 16 foreground code.
#[must_use]
pub fn hsl_to_ansi16(hsl: Hsl) -> u8 {
    rgb_to_ansi16(hsl_to_rgb(hsl))
}

/// Convert an HSL color to an ANSI 256 palette index.
#[must_use]
pub fn hsl_to_ansi256(hsl: Hsl) -> u8 {
    rgb_to_ansi256(hsl_to_rgb(hsl))
}

/// Convert an RGBA color to an ANSI 16 foreground code, ignoring alpha.
#[must_use]
pub fn rgba_to_ansi16(rgba: Rgba) -> u8 {
    rgb_to_ansi16(rgba_to_rgb(rgba))
}

/// Convert an RGBA color to an ANSI 256 palette index, ignoring alpha.
#[must_use]
pub fn rgba_to_ansi256(rgba: Rgba) -> u8 {
    rgb_to_ansi256(rgba_to_rgb(rgba))
}

/// Linearly interpolate `steps` colors from `start` to `end`, inclusive.
///
/// # Returns
///
/// - `[start]` when `steps <= 1`
/// - `[start, end]` when `steps == 2`
/// - otherwise one color per step at ratio `i / (steps - 1)`
#[must_use]
pub fn interpolate_rgb(start: Rgb, end: Rgb, steps: usize) -> Vec<Rgb> {
    match steps {
        0 | 1 => return vec![start],
        2 => return vec![start, end],
        _ => {}
    }

    let lerp = |a: u8, b: u8, ratio: f64| -> u8 {
        channel(f64::from(a) + (f64::from(b) - f64::from(a)) * ratio)
    };

    #[allow(clippy::cast_precision_loss)]
    let last = (steps - 1) as f64;

    (0..steps)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let ratio = i as f64 / last;
            Rgb::new(
                lerp(start.r, end.r, ratio),
                lerp(start.g, end.g, ratio),
                lerp(start.b, end.b, ratio),
            )
        })
        .collect()
}

/// Interpolate a gradient between two hex colors.
#[must_use]
pub fn hex_gradient(start_hex: &str, end_hex: &str, steps: usize) -> Vec<Rgb> {
    interpolate_rgb(hex_to_rgb(start_hex), hex_to_rgb(end_hex), steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb("#000000"), Rgb::new(0, 0, 0));
        assert_eq!(hex_to_rgb("#ff0000"), Rgb::new(255, 0, 0));
        assert_eq!(hex_to_rgb("#AbC123"), Rgb::new(171, 193, 35));
        assert_eq!(hex_to_rgb("#001122"), Rgb::new(0, 17, 34));
        assert_eq!(hex_to_rgb("  ff8000  "), Rgb::new(255, 128, 0));
        assert_eq!(hex_to_rgb("color: #00ff00;"), Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_hex_to_rgb_shorthand() {
        assert_eq!(hex_to_rgb("#f00"), hex_to_rgb("#ff0000"));
        assert_eq!(hex_to_rgb("#f00"), Rgb::new(255, 0, 0));
        assert_eq!(hex_to_rgb("#AbC"), Rgb::new(170, 187, 204));
        // four digits: only the leading three form a run
        assert_eq!(hex_to_rgb("#1234"), Rgb::new(17, 34, 51));
    }

    #[test]
    fn test_hex_to_rgb_invalid_is_black() {
        assert_eq!(hex_to_rgb(""), Rgb::new(0, 0, 0));
        assert_eq!(hex_to_rgb("#gg"), Rgb::new(0, 0, 0));
        assert_eq!(hex_to_rgb("xyz"), Rgb::new(0, 0, 0));
        assert_eq!(hex_to_rgb("#12"), Rgb::new(0, 0, 0));
    }

    #[test]
    fn test_hsl_to_rgb() {
        assert_eq!(hsl_to_rgb(Hsl::new(0.0, 100.0, 50.0)), Rgb::new(255, 0, 0));
        assert_eq!(hsl_to_rgb(Hsl::new(120.0, 100.0, 50.0)), Rgb::new(0, 255, 0));
        assert_eq!(hsl_to_rgb(Hsl::new(240.0, 100.0, 50.0)), Rgb::new(0, 0, 255));
        assert_eq!(hsl_to_rgb(Hsl::new(60.0, 100.0, 50.0)), Rgb::new(255, 255, 0));
        assert_eq!(hsl_to_rgb(Hsl::new(0.0, 0.0, 100.0)), Rgb::new(255, 255, 255));
        assert_eq!(hsl_to_rgb(Hsl::new(200.0, 0.0, 50.0)), Rgb::new(128, 128, 128));
    }

    #[test]
    fn test_rgba_drops_alpha() {
        let rgba = Rgba::new(10, 20, 30, 0.5);
        assert_eq!(rgba_to_rgb(rgba), Rgb::new(10, 20, 30));
        assert_eq!(rgba_to_ansi256(rgba), rgb_to_ansi256(Rgb::new(10, 20, 30)));
        assert_eq!(rgba_to_ansi16(rgba), 30);
    }

    #[test]
    fn test_rgb_to_ansi256_gray_ramp() {
        for r in 0..=255u8 {
            let expected = if r < 8 {
                16
            } else if r > 248 {
                231
            } else {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let step = ((f64::from(r) - 8.0) / 247.0 * 24.0).round() as u8;
                232 + step
            };
            assert_eq!(rgb_to_ansi256(Rgb::new(r, r, r)), expected, "gray {r}");
        }
    }

    #[test]
    fn test_rgb_to_ansi256_cube() {
        assert_eq!(rgb_to_ansi256(Rgb::new(255, 0, 0)), 196);
        assert_eq!(rgb_to_ansi256(Rgb::new(0, 255, 0)), 46);
        assert_eq!(rgb_to_ansi256(Rgb::new(0, 0, 255)), 21);
        assert_eq!(rgb_to_ansi256(Rgb::new(255, 128, 0)), 214);
        assert_eq!(hex_to_ansi256("#ff00ff"), 201);
    }

    #[test]
    fn test_rgb_to_ansi16() {
        assert_eq!(rgb_to_ansi16(Rgb::new(0, 0, 0)), 30);
        assert_eq!(rgb_to_ansi16(Rgb::new(40, 40, 40)), 30);
        assert_eq!(rgb_to_ansi16(Rgb::new(255, 0, 0)), 91);
        assert_eq!(rgb_to_ansi16(Rgb::new(128, 0, 0)), 31);
        assert_eq!(rgb_to_ansi16(Rgb::new(0, 128, 0)), 32);
        assert_eq!(rgb_to_ansi16(Rgb::new(255, 255, 255)), 97);
        assert_eq!(rgb_to_ansi16(Rgb::new(128, 128, 128)), 37);
        assert_eq!(hex_to_ansi16("#0000ff"), 94);
        assert_eq!(hsl_to_ansi16(Hsl::new(120.0, 100.0, 50.0)), 92);
        assert_eq!(hsl_to_ansi256(Hsl::new(0.0, 100.0, 50.0)), 196);
    }

    #[test]
    fn test_interpolate_rgb_edges() {
        let a = Rgb::new(0, 0, 0);
        let b = Rgb::new(255, 255, 255);
        assert_eq!(interpolate_rgb(a, b, 0), vec![a]);
        assert_eq!(interpolate_rgb(a, b, 1), vec![a]);
        assert_eq!(interpolate_rgb(a, b, 2), vec![a, b]);

        let c = Rgb::new(12, 200, 99);
        for n in 1..10 {
            assert_eq!(interpolate_rgb(c, c, n), vec![c; n]);
        }
    }

    #[test]
    fn test_interpolate_rgb_midpoints() {
        let steps = interpolate_rgb(Rgb::new(0, 0, 0), Rgb::new(255, 100, 10), 3);
        assert_eq!(
            steps,
            vec![Rgb::new(0, 0, 0), Rgb::new(128, 50, 5), Rgb::new(255, 100, 10)]
        );

        let down = interpolate_rgb(Rgb::new(200, 0, 0), Rgb::new(0, 0, 0), 5);
        assert_eq!(down.first(), Some(&Rgb::new(200, 0, 0)));
        assert_eq!(down[2], Rgb::new(100, 0, 0));
        assert_eq!(down.last(), Some(&Rgb::new(0, 0, 0)));
    }

    #[test]
    fn test_hex_gradient() {
        let colors = hex_gradient("#ff0000", "#0000ff", 4);
        assert_eq!(colors.len(), 4);
        assert_eq!(colors[0], Rgb::new(255, 0, 0));
        assert_eq!(colors[1], Rgb::new(170, 0, 85));
        assert_eq!(colors[3], Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_rgb_struct() {
        let rgb = Rgb::new(100, 150, 200);
        assert_eq!(rgb.to_tuple(), (100, 150, 200));
        assert_eq!(Rgb::from_tuple((255, 128, 0)), Rgb::new(255, 128, 0));
        assert_eq!(Rgb::from([1, 2, 3]), Rgb::new(1, 2, 3));
    }
}
