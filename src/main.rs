//! Terminal background probe.
//!
//! Queries the controlling terminal for its background color using an OSC 11
//! escape sequence and prints exactly one line:
//! - `"light"` - for light backgrounds (luminance >= 0.5)
//! - `"dark"` - for dark backgrounds (luminance < 0.5)
//! - `"unknown"` - when the background color cannot be determined
//!
//! The exit code is 0 in all three cases; anything else tells the parent
//! process that the probe itself failed.
//!
//! # Environment Variables
//!
//! - `DEBUG`: When set, enables debug output to stderr showing the query
//!   response, parsed RGB values and the resulting theme.

use std::io::Write;

use anyhow::{Context, Result};

use termhue::logs;
use termhue::osc::QuerierOptions;
use termhue::probe::run_child;

fn main() -> Result<()> {
    logs::init();

    let theme = run_child(QuerierOptions::default());
    tracing::debug!(%theme, "probe finished");

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{theme}").context("Failed to write theme to stdout")?;
    stdout.flush().context("Failed to flush stdout")
}
