//! # Token Derivation
//!
//! ```text
//! token(k, t) = u16_be(last 2 bytes of HMAC-SHA256(k, decimal(t))) mod 10000
//! ```
//!
//! `decimal(t)` is the plain base-10 rendering of the Unix second (a leading
//! `-` for negative values, no padding). The last two digest bytes are the
//! last four hex digits of the hex digest, so the token matches any other
//! implementation that truncates the hex string.
//!
//! ## Security Notes
//!
//! - Four decimal digits give a 1/10000 chance that a replayed token
//!   happens to equal the expected one at any single second. The protocol
//!   relies on the next second catching it.
//! - The key never leaves [`SecretKey`]; its `Debug` output is redacted and
//!   only a SHA-256 fingerprint is ever logged.

use crate::error::{Result, TokenError};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;

/// Shared secret for token derivation.
///
/// Keyed once at construction, so deriving a token never fails.
#[derive(Clone)]
pub struct SecretKey {
    mac: HmacSha256,
    fingerprint: String,
}

impl SecretKey {
    /// Uses `bytes` as the raw key.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::EmptySecret`] for an empty key.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(bytes).map_err(|err| {
            TokenError::InvalidConfig(format!("HMAC rejected the key: {err}"))
        })?;
        let digest = Sha256::digest(bytes);
        Ok(Self {
            mac,
            fingerprint: hex::encode(&digest[..8]),
        })
    }

    /// Decodes a hex-encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidSecretEncoding`] for malformed hex and
    /// [`TokenError::EmptySecret`] for an empty string.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim()).map_err(|err| TokenError::InvalidSecretEncoding {
            encoding: "hex",
            reason: err.to_string(),
        })?;
        Self::new(&bytes)
    }

    /// First 8 bytes of SHA-256 over the key, hex-encoded.
    ///
    /// Identifies which key is in use without revealing it.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Derives the token for `unix_second`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use aegis_token::SecretKey;
    ///
    /// let key = SecretKey::new(b"aegis-test-secret")?;
    /// assert_eq!(key.token_at(100).to_string(), "4556");
    /// # Ok::<(), aegis_token::TokenError>(())
    /// ```
    #[must_use]
    pub fn token_at(&self, unix_second: i64) -> WatermarkToken {
        let mut mac = self.mac.clone();
        mac.update(unix_second.to_string().as_bytes());
        let digest = mac.finalize().into_bytes();
        let n = digest.len();
        let tail = u16::from_be_bytes([digest[n - 2], digest[n - 1]]);
        WatermarkToken(tail % 10_000)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

/// Derives the token for `unix_second` under `key`.
#[must_use]
pub fn derive_token(key: &SecretKey, unix_second: i64) -> WatermarkToken {
    key.token_at(unix_second)
}

/// A four-digit watermark token, `0000` to `9999`.
///
/// Displays zero-padded; parses only from exactly four ASCII digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatermarkToken(u16);

impl WatermarkToken {
    /// Largest token value.
    pub const MAX: u16 = 9_999;

    /// Wraps a numeric value.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidToken`] above [`WatermarkToken::MAX`].
    pub fn new(value: u16) -> Result<Self> {
        if value > Self::MAX {
            return Err(TokenError::InvalidToken(value.to_string()));
        }
        Ok(Self(value))
    }

    /// Numeric value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for WatermarkToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl FromStr for WatermarkToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenError::InvalidToken(s.to_string()));
        }
        s.parse::<u16>()
            .map(Self)
            .map_err(|_| TokenError::InvalidToken(s.to_string()))
    }
}

impl TryFrom<String> for WatermarkToken {
    type Error = TokenError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<WatermarkToken> for String {
    fn from(token: WatermarkToken) -> Self {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretKey {
        SecretKey::new(b"aegis-test-secret").unwrap()
    }

    #[test]
    fn test_known_answers() {
        let key = key();
        let expected = [
            (100, "4556"),
            (101, "6512"),
            (102, "9001"),
            (103, "9224"),
            (104, "0189"),
            (105, "3581"),
            (110, "8350"),
            (0, "8948"),
            (-5, "6677"),
        ];
        for (t, token) in expected {
            assert_eq!(key.token_at(t).to_string(), token, "t = {t}");
        }
    }

    #[test]
    fn test_known_answer_long_key() {
        let key = SecretKey::new(b"YourUnbreakableWatermarkSecretKey12345").unwrap();
        assert_eq!(derive_token(&key, 1_700_000_000).to_string(), "1374");
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(SecretKey::new(b"").unwrap_err(), TokenError::EmptySecret);
        assert_eq!(SecretKey::from_hex("").unwrap_err(), TokenError::EmptySecret);
    }

    #[test]
    fn test_hex_key_matches_raw_key() {
        let hexed = SecretKey::from_hex("61656769732d746573742d736563726574").unwrap();
        assert_eq!(hexed.token_at(105), key().token_at(105));
        assert_eq!(hexed.fingerprint(), key().fingerprint());
    }

    #[test]
    fn test_bad_hex_rejected() {
        assert!(matches!(
            SecretKey::from_hex("zz"),
            Err(TokenError::InvalidSecretEncoding { encoding: "hex", .. })
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", key());
        assert!(!debug.contains("aegis-test-secret"));
        assert!(debug.contains("e48e15daff433c26"));
    }

    #[test]
    fn test_token_parsing() {
        assert_eq!("0042".parse::<WatermarkToken>().unwrap().value(), 42);
        for bad in ["42", "00042", "12a4", "-123", " 123", ""] {
            assert!(bad.parse::<WatermarkToken>().is_err(), "{bad:?}");
        }
        assert!(WatermarkToken::new(10_000).is_err());
    }

    #[test]
    fn test_token_serde_as_string() {
        let token = WatermarkToken::new(7).unwrap();
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"0007\"");
        let back: WatermarkToken = serde_json::from_str("\"0007\"").unwrap();
        assert_eq!(back, token);
        assert!(serde_json::from_str::<WatermarkToken>("\"7\"").is_err());
    }
}
