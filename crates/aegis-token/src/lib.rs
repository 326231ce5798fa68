//! # AEGIS Token Protocol
//!
//! Time-bound watermark tokens that prove a frame was produced at a given
//! second by a holder of the shared secret. Recorded or looped footage
//! carries tokens for the wrong seconds and fails validation on its first
//! replayed frame.
//!
//! ## Protocol Flow
//!
//! ```text
//! ┌───────────── camera side ─────────────┐      ┌────────── validator side ──────────┐
//! │                                       │      │                                    │
//! │ clock ─▶ t ─▶ HMAC-SHA256(k, "t")     │      │ (t, token) read from footage       │
//! │                 │ last 2 bytes mod 1e4│      │        │                           │
//! │                 ▼                     │      │        ▼                           │
//! │        "TST-H:dddd | T:YYYYmmdd-HHMMSS"────▶ │ expected(k, t±s) == token ?        │
//! │         opacity 1.0 / 0.2 every 10 s  │      │   yes ─▶ Match   no ─▶ Mismatch    │
//! └───────────────────────────────────────┘      └────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`SecretKey`] | Keyed HMAC, redacted `Debug`, SHA-256 fingerprint |
//! | [`WatermarkIssuer`] | Per-second cached token, text and opacity |
//! | [`TokenValidator`] | Skew-tolerant checking over an [`ExpectedTokenWindow`] |
//! | [`format_watermark`] / [`parse_watermark`] | Signature text codec |
//!
//! ## Security Notes
//!
//! - A single mismatch is conclusive; the validator never waits for
//!   corroboration.
//! - Clock skew is tolerated only within an explicit symmetric window
//!   (default ±2 s, zero for strict deployments).
//! - The key is injected at construction and never mutated or logged.

mod clock;
mod config;
mod error;
mod issuer;
mod token;
mod validator;
mod watermark;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SecretEncoding, TokenConfig, VISIBILITY_FLIP_INTERVAL};
pub use error::{Result, TokenError};
pub use issuer::{IssuedWatermark, VisibilitySchedule, WatermarkIssuer};
pub use token::{derive_token, SecretKey, WatermarkToken};
pub use validator::{
    ExpectedTokenWindow, Inconclusive, TokenCheck, TokenMismatch, TokenValidator,
    ValidationReport,
};
pub use watermark::{format_watermark, parse_watermark, Observation};
