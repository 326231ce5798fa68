//! # Watermark Signature Text
//!
//! The burned-in signature carries the token and the second it belongs to:
//!
//! ```text
//! TST-H:4556 | T:19700101-000140
//!       ────   ─────────────────
//!       token  UTC second, %Y%m%d-%H%M%S
//! ```
//!
//! [`parse_watermark`] reverses [`format_watermark`] for text recovered
//! from captured footage. It tolerates surrounding noise and irregular
//! spacing around the separators, which OCR output tends to have.

use crate::error::{Result, TokenError};
use crate::token::WatermarkToken;
use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const TIME_FORMAT: &str = "%Y%m%d-%H%M%S";

static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"TST-H:\s*(?P<token>\d{4})\s*\|\s*T:\s*(?P<time>\d{8}-\d{6})")
        .expect("signature regex is valid")
});

/// One token read from a feed at a known second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Observation {
    /// Second the token claims to belong to.
    pub unix_second: i64,
    /// Token as read.
    pub token: WatermarkToken,
}

impl Observation {
    /// Pairs a second with a token.
    #[must_use]
    pub const fn new(unix_second: i64, token: WatermarkToken) -> Self {
        Self { unix_second, token }
    }

    /// Parses a `(second, "dddd")` pair.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidToken`] if `token` is not four digits.
    pub fn parse(unix_second: i64, token: &str) -> Result<Self> {
        Ok(Self::new(unix_second, token.trim().parse()?))
    }
}

/// Renders the signature text for `token` issued at `unix_second`.
///
/// Seconds outside chrono's representable range fall back to the raw
/// number, which [`parse_watermark`] will reject.
#[must_use]
pub fn format_watermark(token: WatermarkToken, unix_second: i64) -> String {
    let time = DateTime::from_timestamp(unix_second, 0).map_or_else(
        || unix_second.to_string(),
        |dt| dt.format(TIME_FORMAT).to_string(),
    );
    format!("TST-H:{token} | T:{time}")
}

/// Extracts the token and its second from signature text.
///
/// # Errors
///
/// Returns [`TokenError::InvalidWatermarkText`] if no signature is found or
/// its timestamp is not a real date.
///
/// # Example
///
/// ```rust
/// use aegis_token::parse_watermark;
///
/// let obs = parse_watermark("cam-3  TST-H:4556 |T: 19700101-000140 ")?;
/// assert_eq!(obs.unix_second, 100);
/// assert_eq!(obs.token.to_string(), "4556");
/// # Ok::<(), aegis_token::TokenError>(())
/// ```
pub fn parse_watermark(text: &str) -> Result<Observation> {
    let invalid = |reason: &str| TokenError::InvalidWatermarkText {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let caps = SIGNATURE
        .captures(text)
        .ok_or_else(|| invalid("no TST-H signature found"))?;
    let token: WatermarkToken = caps["token"].parse()?;
    let time = NaiveDateTime::parse_from_str(&caps["time"], TIME_FORMAT)
        .map_err(|err| invalid(&format!("bad timestamp: {err}")))?;

    Ok(Observation::new(time.and_utc().timestamp(), token))
}
