//! Terminal color capability and background detection library.
//!
//! Two questions are answered here:
//! - How many colors can the output stream render? [`detect`] maps an
//!   [`EnvSnapshot`] to a [`ColorLevel`] with no I/O at all.
//! - Is the terminal background dark or light? Either ask the terminal with
//!   OSC 11 from async code ([`query_theme_async`], or a long-lived
//!   [`ThemeQuerier`] for caching), or use [`probe_theme_sync`] during
//!   startup, which runs the exchange in a disposable child process.
//!
//! The [`color`] module converts hex colors to escape codes for a given
//! level, and [`paint`] renders text with them.

pub mod color;
pub mod env;
pub mod error;
pub mod level;
pub mod logs;
pub mod osc;
pub mod paint;
pub mod probe;
pub mod terminal;
pub mod theme;

use tracing::debug;

pub use color::{Rgb, hex_to_ansi16, hex_to_ansi256, hex_to_rgb};
pub use env::EnvSnapshot;
pub use error::QueryError;
pub use level::{ColorLevel, detect};
pub use osc::{QuerierOptions, ThemeQuerier};
pub use probe::{ProbeOptions, probe_theme_sync};
pub use theme::Theme;

use terminal::TtyStream;

/// Ask the controlling terminal for its background, once.
///
/// Opens `/dev/tty`, runs a single OSC 11 exchange and restores the terminal.
/// Nothing is cached between calls; keep a [`ThemeQuerier`] around for that.
/// Must be called from within a tokio runtime with I/O and time enabled.
///
/// # Errors
///
/// Returns [`QueryError::NotATty`] if there is no usable controlling
/// terminal, and otherwise whatever [`ThemeQuerier::query`] returns.
pub async fn query_theme_async(options: QuerierOptions) -> Result<Theme, QueryError> {
    let stream = TtyStream::open().map_err(|err| {
        debug!("cannot open terminal: {err:#}");
        QueryError::NotATty
    })?;

    ThemeQuerier::with_options(stream, options).query().await
}

/// One interpolated color per step between two hex colors.
///
/// Used to give each character of a string its own color.
///
/// # Examples
///
/// ```
/// # use termhue::{Rgb, gradient_colors};
/// let colors = gradient_colors("#000000", "#ffffff", 3);
/// assert_eq!(colors, vec![Rgb::new(0, 0, 0), Rgb::new(128, 128, 128), Rgb::new(255, 255, 255)]);
/// ```
#[must_use]
pub fn gradient_colors(start_hex: &str, end_hex: &str, steps: usize) -> Vec<Rgb> {
    color::hex_gradient(start_hex, end_hex, steps)
}
