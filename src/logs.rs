//! Logging and debug utilities.
//!
//! Diagnostics go through `tracing`. Nothing is printed unless the `DEBUG`
//! environment variable is set, and output always goes to stderr: stdout
//! carries the probe's answer.

use std::env;

use tracing_subscriber::EnvFilter;

/// Whether the `DEBUG` environment variable asks for diagnostics.
#[must_use]
pub fn debug_enabled() -> bool {
    env::var_os("DEBUG").is_some()
}

/// Install a stderr subscriber if `DEBUG` is set.
///
/// `RUST_LOG` refines the filter; without it everything at `debug` and above
/// from this crate is shown. Calling this more than once, or after another
/// subscriber was installed, is harmless.
///
/// # Examples
///
/// ```
/// termhue::logs::init();
/// tracing::debug!("query response received");
/// ```
pub fn init() {
    if !debug_enabled() {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}=debug", env!("CARGO_CRATE_NAME"))));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        // These should not panic regardless of DEBUG setting
        init();
        init();
        tracing::debug!("Test debug message");
    }
}
