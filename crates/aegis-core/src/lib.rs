//! # AEGIS Core
//!
//! Feed integrity facade for unattended camera streams.
//! Orchestrates signal extraction, temporal tracking and the watermark
//! token protocol into one verdict per frame.
//!
//! ## Threat Coverage
//!
//! AEGIS answers two questions about every stream: is it *authentic*, and is
//! the camera *undisturbed*?
//!
//! | Layer | Component | Threats Detected |
//! |-------|-----------|------------------|
//! | Authenticity | Token Validator | Replayed footage, looped clips, forged watermarks |
//! | Optics | Signal Extractor | Defocus, smeared or covered lens, glare blinding |
//! | Mount | Signal Extractor + Temporal Tracker | Shake, knocks, slow re-aiming |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          AEGIS CORE                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   frame ──▶ ┌────────────────┐     ┌─────────────────┐          │
//! │             │    Signal      │────▶│    Temporal     │          │
//! │             │   Extractor    │     │    Tracker      │          │
//! │             └───────┬────────┘     └────────┬────────┘          │
//! │                     │ signals               │ reposition        │
//! │                     ▼                       ▼                   │
//! │             ┌─────────────────────────────────────┐             │
//! │             │       Tamper Decision Engine        │             │
//! │             └─────────────────┬───────────────────┘             │
//! │                               │ visual verdict                  │
//! │   (second, token) ──▶ ┌───────▼────────┐                        │
//! │   Token Validator ───▶│  Integrity     │──▶ Assessment ──▶ sinks│
//! │                       │  Coordinator   │──▶ remediation         │
//! │                       └────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aegis_core::{AegisConfig, IntegrityCoordinator, Verdict};
//!
//! let config = AegisConfig::from_json_file("aegis.json")?;
//! let mut coordinator = IntegrityCoordinator::new(&config)?;
//!
//! for frame in camera {
//!     let assessment = coordinator.process_frame(&frame)?;
//!     match assessment.verdict {
//!         Verdict::Nominal => {}
//!         Verdict::Tampered { reason } => raise_alarm(reason),
//!         other => notify_operator(other, &assessment.signals),
//!     }
//! }
//! ```
//!
//! ## Security Notes
//!
//! - One coordinator per stream; coordinators share no mutable state
//! - A single token mismatch is conclusive; it is never averaged away
//! - Observations outside the validator window are inconclusive, not tampered
//! - Single-frame visual anomalies below the reposition criteria are tolerated
//! - The shared secret is never logged, only its fingerprint

mod config;
mod coordinator;
mod engine;
mod error;
mod remediation;
mod sink;
mod verdict;

pub use config::{AegisConfig, GlobalConfig};
pub use coordinator::IntegrityCoordinator;
pub use engine::{merge_authenticity, Decision, TamperDecisionEngine};
pub use error::AegisError;
pub use remediation::{RemediationKind, Remediator};
pub use sink::{AssessmentSink, MemorySink, TracingSink};
pub use verdict::{Assessment, TamperReason, Verdict};

// Re-export component types for convenience
pub use aegis_monitor::{RepositionCheck, TemporalTracker, TrackerConfig};
pub use aegis_signals::{FrameSample, GlareConfig, GlareReading, SignalConfig, SignalExtractor, SignalVector};
pub use aegis_token::{
    Observation, TokenCheck, TokenConfig, TokenMismatch, TokenValidator, ValidationReport,
    WatermarkIssuer, WatermarkToken,
};

/// Core result type for AEGIS operations.
pub type Result<T> = std::result::Result<T, AegisError>;
