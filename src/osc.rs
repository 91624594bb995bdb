//! OSC (Operating System Command) 11 query handling.
//!
//! This module provides:
//! - The OSC 11 query bytes and the parser for the terminal's reply
//! - [`ThemeQuerier`], which runs the exchange over a [`TerminalStream`]
//!   with a timeout, caches successful answers and shares one in-flight
//!   exchange between concurrent callers
//!
//! Bytes read from the terminal that are not part of the reply (keys typed
//! while the query was pending, other reports) are kept and handed out by
//! [`ThemeQuerier::take_unconsumed`] instead of being dropped.

use std::ops::{Deref, DerefMut, Range};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tracing::debug;

use crate::color::Rgb;
use crate::error::QueryError;
use crate::terminal::TerminalStream;
use crate::theme::Theme;

/// OSC 11 background color query, ST-terminated.
pub const OSC11_QUERY: &[u8] = b"\x1b]11;?\x1b\\";

/// Default time to wait for the terminal's reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(300);

/// Default lifetime of a cached answer.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

const READ_CHUNK: usize = 64;

static OSC11_REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\x1b\]11;rgb:([0-9a-fA-F]{1,4})/([0-9a-fA-F]{1,4})/([0-9a-fA-F]{1,4})(?:\x1b\\|\x07)",
    )
    .expect("OSC 11 reply pattern is valid")
});

/// A recognized OSC 11 reply inside a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Background color reported by the terminal.
    pub rgb: Rgb,
    /// Where the reply sits in the buffer it was found in.
    pub span: Range<usize>,
}

/// Normalize a 1-4 digit hex channel sample to 8 bits.
///
/// The sample is right-padded with `'0'` to four digits and its top byte is
/// kept, so `f` reads as `0xf0` and `abcd` as `0xab`.
fn normalize_channel(hex: &[u8]) -> Option<u8> {
    let mut padded = [b'0'; 4];
    let len = hex.len().min(4);
    padded[..len].copy_from_slice(&hex[..len]);

    let top = std::str::from_utf8(&padded[..2]).ok()?;
    u8::from_str_radix(top, 16).ok()
}

/// Find an OSC 11 reply anywhere in `buf`.
///
/// The reply must look like `ESC ] 11 ; rgb : R/G/B` followed by either
/// `ESC \` or BEL, with one to four hex digits per channel. Anything around
/// it is ignored.
///
/// # Returns
///
/// - `Some(Reply)` with the normalized color and the reply's byte range
/// - `None` if no complete reply is present
#[must_use]
pub fn parse_response(buf: &[u8]) -> Option<Reply> {
    let caps = OSC11_REPLY.captures(buf)?;
    let span = caps.get(0)?.range();

    let r = normalize_channel(caps.get(1)?.as_bytes())?;
    let g = normalize_channel(caps.get(2)?.as_bytes())?;
    let b = normalize_channel(caps.get(3)?.as_bytes())?;

    Some(Reply {
        rgb: Rgb::new(r, g, b),
        span,
    })
}

/// Whether `buf` contains a control-sequence terminator (BEL or ST).
fn has_terminator(buf: &[u8]) -> bool {
    buf.contains(&b'\x07') || buf.windows(2).any(|w| w == b"\x1b\\")
}

/// Tuning knobs for a [`ThemeQuerier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerierOptions {
    /// How long to wait for the terminal to answer.
    pub timeout: Duration,
    /// How long a successful answer is reused.
    pub cache_ttl: Duration,
}

impl Default for QuerierOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    theme: Theme,
    captured_at: Instant,
}

type Outcome = Option<Result<Theme, QueryError>>;

#[derive(Default)]
struct State {
    cache: Option<CacheEntry>,
    inflight: Option<watch::Receiver<Outcome>>,
}

struct Exchange<S> {
    stream: S,
    unconsumed: Vec<u8>,
}

/// Restores the raw-mode flag when the exchange ends, however it ends.
struct RawModeGuard<'a, S: TerminalStream> {
    stream: &'a mut S,
    prior: bool,
}

impl<S: TerminalStream> Deref for RawModeGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stream
    }
}

impl<S: TerminalStream> DerefMut for RawModeGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stream
    }
}

impl<S: TerminalStream> Drop for RawModeGuard<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.stream.set_raw_mode(self.prior) {
            debug!(%err, prior = self.prior, "failed to restore raw mode");
        }
    }
}

/// Asks a terminal for its background color with OSC 11.
///
/// One querier owns one stream. Answers are cached for
/// [`QuerierOptions::cache_ttl`]; failures are not cached. Calls made while
/// an exchange is pending wait for that exchange instead of starting another
/// one on the same stream.
pub struct ThemeQuerier<S> {
    options: QuerierOptions,
    state: Mutex<State>,
    exchange: Mutex<Exchange<S>>,
}

impl<S: TerminalStream> ThemeQuerier<S> {
    /// Create a querier with the default 300 ms timeout and one hour cache.
    pub fn new(stream: S) -> Self {
        Self::with_options(stream, QuerierOptions::default())
    }

    /// Create a querier with explicit options.
    pub fn with_options(stream: S, options: QuerierOptions) -> Self {
        Self {
            options,
            state: Mutex::new(State::default()),
            exchange: Mutex::new(Exchange {
                stream,
                unconsumed: Vec::new(),
            }),
        }
    }

    /// The options this querier was built with.
    pub fn options(&self) -> QuerierOptions {
        self.options
    }

    /// Determine whether the terminal background is dark or light.
    ///
    /// # Errors
    ///
    /// - [`QueryError::NotATty`] if the stream is not a terminal or refuses
    ///   raw mode; nothing is written in that case
    /// - [`QueryError::Timeout`] if no reply arrives in time
    /// - [`QueryError::NoMatch`] if the terminal answered with something else
    /// - [`QueryError::Io`] if reading or writing the stream fails
    pub async fn query(&self) -> Result<Theme, QueryError> {
        loop {
            let tx = {
                let mut state = self.state.lock().await;

                if let Some(entry) = state.cache {
                    if entry.captured_at.elapsed() < self.options.cache_ttl {
                        debug!(theme = %entry.theme, "serving cached theme");
                        return Ok(entry.theme);
                    }
                    state.cache = None;
                }

                // a closed channel means the leading caller was cancelled
                let pending = state
                    .inflight
                    .as_ref()
                    .filter(|rx| rx.has_changed().is_ok())
                    .cloned();

                if let Some(mut rx) = pending {
                    drop(state);
                    debug!("joining in-flight OSC 11 query");
                    if let Ok(outcome) = rx.wait_for(Option::is_some).await {
                        if let Some(result) = (*outcome).clone() {
                            return result;
                        }
                    }
                    continue;
                }

                let (tx, rx) = watch::channel(None);
                state.inflight = Some(rx);
                tx
            };

            let result = self.exchange().await;

            let mut state = self.state.lock().await;
            state.inflight = None;
            if let Ok(theme) = result {
                state.cache = Some(CacheEntry {
                    theme,
                    captured_at: Instant::now(),
                });
            }
            drop(state);

            tx.send_replace(Some(result.clone()));
            return result;
        }
    }

    /// Drain the bytes read from the terminal that were not part of a reply.
    pub async fn take_unconsumed(&self) -> Vec<u8> {
        std::mem::take(&mut self.exchange.lock().await.unconsumed)
    }

    /// Run one write/read cycle against the stream.
    async fn exchange(&self) -> Result<Theme, QueryError> {
        let mut exchange = self.exchange.lock().await;
        let Exchange { stream, unconsumed } = &mut *exchange;

        if !stream.is_terminal() {
            debug!("output is not a terminal, skipping OSC 11 query");
            return Err(QueryError::NotATty);
        }

        let prior = stream.is_raw_mode();
        if let Err(err) = stream.set_raw_mode(true) {
            debug!(%err, "cannot enter raw mode, skipping OSC 11 query");
            return Err(QueryError::NotATty);
        }

        let mut guard = RawModeGuard { stream, prior };
        let mut buf = Vec::new();

        let outcome: Result<Reply, QueryError> = async {
            guard.write_all(OSC11_QUERY).await?;
            debug!("sent OSC 11 query");
            let read =
                tokio::time::timeout(self.options.timeout, read_reply(&mut *guard, &mut buf))
                    .await;
            match read {
                Ok(result) => result,
                Err(_elapsed) if has_terminator(&buf) => Err(QueryError::NoMatch(buf.len())),
                Err(_elapsed) => Err(QueryError::Timeout(self.options.timeout.as_millis())),
            }
        }
        .await;

        drop(guard);
        debug!(buf = ?String::from_utf8_lossy(&buf), "terminal response");

        match outcome {
            Ok(reply) => {
                unconsumed.extend_from_slice(&buf[..reply.span.start]);
                unconsumed.extend_from_slice(&buf[reply.span.end..]);
                let theme = Theme::from_background(reply.rgb);
                debug!(rgb = ?reply.rgb, %theme, "parsed OSC 11 reply");
                Ok(theme)
            }
            Err(err) => {
                unconsumed.extend_from_slice(&buf);
                debug!(%err, "OSC 11 query failed");
                Err(err)
            }
        }
    }
}

/// Accumulate chunks into `buf` until it holds a complete reply.
async fn read_reply<S>(stream: &mut S, buf: &mut Vec<u8>) -> Result<Reply, QueryError>
where
    S: TerminalStream + ?Sized,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = stream.read_chunk(&mut chunk).await?;
        if n == 0 {
            debug!("got EOF");
            return Err(QueryError::NoMatch(buf.len()));
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(reply) = parse_response(buf) {
            return Ok(reply);
        }
    }
}
