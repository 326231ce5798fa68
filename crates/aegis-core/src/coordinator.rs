//! The per-stream integrity coordinator.
//!
//! One [`IntegrityCoordinator`] watches one stream. It owns everything that
//! accumulates across frames (tracker history, previous luminance plane,
//! token window, authenticity state) so independent streams share nothing.

use crate::{
    config::{AegisConfig, GlobalConfig},
    engine::{merge_authenticity, Decision, TamperDecisionEngine},
    remediation::{RemediationKind, Remediator},
    sink::{AssessmentSink, TracingSink},
    verdict::{Assessment, Verdict},
    Result,
};

use aegis_monitor::{RepositionCheck, TemporalTracker};
use aegis_signals::{image::GrayImage, FrameSample, SignalExtractor, SignalVector};
use aegis_token::{
    parse_watermark, Clock, Observation, SystemClock, TokenCheck, TokenError, TokenMismatch,
    TokenValidator,
};

use tracing::{debug, info, warn};
use uuid::Uuid;

/// Orchestrates per-frame checks and token authenticity for one stream.
///
/// # Pipeline
///
/// For each frame, in order:
/// 1. Signal extraction against the previous frame's luminance
/// 2. Tracker update (skipped on cold start)
/// 3. Visual decision, then authenticity merge
/// 4. Optional remediation
/// 5. Sinks
///
/// Token observations arrive separately through
/// [`IntegrityCoordinator::observe_token`] at second granularity. The
/// latest conclusive result is latched: after a mismatch every frame is
/// `Tampered` until a later observation matches again.
///
/// Signature text read off a frame goes through
/// [`IntegrityCoordinator::observe_watermark`], which judges the token at
/// the coordinator's receipt clock. The `T:` field is attacker-controlled
/// and is only cross-checked.
///
/// # Example
///
/// ```rust
/// use aegis_core::{AegisConfig, FrameSample, IntegrityCoordinator, Observation, Verdict};
/// use aegis_signals::image::{GrayImage, Luma};
///
/// let config = AegisConfig::default().with_secret("aegis-test-secret");
/// let mut coordinator = IntegrityCoordinator::new(&config)?;
///
/// let checkerboard = GrayImage::from_fn(64, 64, |x, y| {
///     Luma([if (x / 8 + y / 8) % 2 == 0 { 30 } else { 220 }])
/// });
/// let frame = FrameSample::from_luma(checkerboard)?;
///
/// let first = coordinator.process_frame(&frame)?;
/// assert!(first.cold_start);
/// assert_eq!(first.verdict, Verdict::Nominal);
///
/// // Second 110 carrying the token from 105: a replay.
/// coordinator.observe_token(&Observation::parse(110, "3581")?)?;
/// assert!(coordinator.process_frame(&frame)?.verdict.is_tampered());
/// # Ok::<(), aegis_core::AegisError>(())
/// ```
pub struct IntegrityCoordinator {
    session_id: Uuid,
    global: GlobalConfig,
    extractor: SignalExtractor,
    tracker: TemporalTracker,
    engine: TamperDecisionEngine,
    validator: Option<TokenValidator>,
    clock: Box<dyn Clock>,
    previous: Option<GrayImage>,
    frame_index: u64,
    authenticity: Option<TokenMismatch>,
    remediator: Option<Box<dyn Remediator>>,
    sinks: Vec<Box<dyn AssessmentSink>>,
}

impl IntegrityCoordinator {
    /// Create a coordinator for a new stream session.
    ///
    /// Token validation is enabled only when a secret is configured;
    /// without one, frames are still assessed visually.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails [`AegisConfig::validate`]
    /// - The secret is set but cannot be decoded
    pub fn new(config: &AegisConfig) -> Result<Self> {
        config.validate()?;

        let validator = if config.token.secret.is_empty() {
            None
        } else {
            Some(TokenValidator::new(&config.token)?)
        };

        let extractor = SignalExtractor::new(config.signals);
        let tracker = TemporalTracker::new(config.tracker)?;
        let engine = TamperDecisionEngine::from_config(&config.tracker);

        let mut sinks: Vec<Box<dyn AssessmentSink>> = Vec::new();
        if config.global.audit_logging {
            sinks.push(Box::new(TracingSink));
        }

        let session_id = Uuid::new_v4();
        info!(
            session = %session_id,
            authenticity = validator.is_some(),
            glare = extractor.glare_strategy(),
            threshold_shift = engine.threshold_shift(),
            "integrity coordinator ready"
        );

        Ok(Self {
            session_id,
            global: config.global.clone(),
            extractor,
            tracker,
            engine,
            validator,
            clock: Box::new(SystemClock),
            previous: None,
            frame_index: 0,
            authenticity: None,
            remediator: None,
            sinks,
        })
    }

    /// Replaces the token validator, e.g. with one that has a reference
    /// clock.
    #[must_use]
    pub fn with_validator(mut self, validator: TokenValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Sets the clock that stamps watermark receipt time.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Sets the remediation collaborator.
    #[must_use]
    pub fn with_remediator(mut self, remediator: impl Remediator + 'static) -> Self {
        self.remediator = Some(Box::new(remediator));
        self
    }

    /// Adds an assessment sink.
    #[must_use]
    pub fn with_sink(mut self, sink: impl AssessmentSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Session identifier, attached to every log line.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Frames successfully assessed so far.
    #[must_use]
    pub const fn frames_processed(&self) -> u64 {
        self.frame_index
    }

    /// The stream's tracker.
    #[must_use]
    pub const fn tracker(&self) -> &TemporalTracker {
        &self.tracker
    }

    /// The latched token mismatch, if the feed is currently judged
    /// inauthentic.
    #[must_use]
    pub const fn authenticity(&self) -> Option<&TokenMismatch> {
        self.authenticity.as_ref()
    }

    /// Returns true if token validation is enabled.
    #[must_use]
    pub const fn validates_tokens(&self) -> bool {
        self.validator.is_some()
    }

    /// Assess one frame.
    ///
    /// A frame of a different size from its predecessor starts a new
    /// baseline when `rebaseline_on_resize` is set; otherwise it fails with
    /// a dimension mismatch.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AegisError::Signal`] for a malformed frame. The
    /// error is local to this frame: session state is left untouched and the
    /// next frame is compared against the last good one.
    pub fn process_frame(&mut self, frame: &FrameSample) -> Result<Assessment> {
        let rebaseline = self.needs_rebaseline(frame);
        let baseline = if rebaseline { None } else { self.previous.as_ref() };

        let extraction = self.extractor.extract(frame, baseline)?;
        if rebaseline {
            self.start_new_baseline(frame);
        }
        let signals = extraction.signals;
        let cold_start = !extraction.motion_measured;
        self.frame_index += 1;

        let Decision {
            verdict: visual,
            reposition,
        } = if cold_start {
            Decision {
                verdict: TamperDecisionEngine::classify(&signals, false),
                reposition: RepositionCheck::default(),
            }
        } else {
            self.tracker
                .update(signals.shift_magnitude, signals.shift_x, signals.shift_y);
            self.engine.decide(&signals, &self.tracker)
        };

        let verdict = merge_authenticity(visual.clone(), self.authenticity.as_ref());
        let remediated = self.remediate(&verdict, &signals, frame);
        self.previous = Some(frame.luma().clone());

        let assessment = Assessment {
            session_id: self.session_id,
            frame_index: self.frame_index,
            verdict,
            visual_verdict: visual,
            signals,
            reposition,
            cold_start,
            glare: extraction.glare,
            remediated,
        };
        for sink in &mut self.sinks {
            sink.record(&assessment);
        }
        Ok(assessment)
    }

    fn needs_rebaseline(&self, frame: &FrameSample) -> bool {
        self.global.rebaseline_on_resize
            && self
                .previous
                .as_ref()
                .is_some_and(|previous| previous.dimensions() != frame.dimensions())
    }

    fn start_new_baseline(&mut self, frame: &FrameSample) {
        info!(
            session = %self.session_id,
            from = ?self.previous.as_ref().map(|previous| previous.dimensions()),
            to = ?frame.dimensions(),
            "frame size changed, starting a new baseline"
        );
        self.previous = None;
        self.tracker.reset();
    }

    fn remediate(
        &self,
        verdict: &Verdict,
        signals: &SignalVector,
        frame: &FrameSample,
    ) -> Option<FrameSample> {
        if !self.global.remediation {
            return None;
        }
        let remediator = self.remediator.as_ref()?;
        let kind = RemediationKind::for_frame(verdict, signals)?;
        match remediator.remediate(kind, frame) {
            Ok(enhanced) => {
                debug!(session = %self.session_id, kind = kind.as_str(), "frame remediated");
                Some(enhanced)
            }
            Err(err) => {
                warn!(
                    session = %self.session_id,
                    kind = kind.as_str(),
                    error = %err,
                    "remediation failed, reporting unremediated frame"
                );
                None
            }
        }
    }

    /// Check one token observation and update the authenticity state.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::EmptySecret`] (wrapped) if the coordinator was
    /// built without a secret.
    pub fn observe_token(&mut self, observation: &Observation) -> Result<TokenCheck> {
        let validator = self.validator.as_ref().ok_or(TokenError::EmptySecret)?;
        let check = validator.check(observation);
        match check {
            TokenCheck::Mismatch(mismatch) => {
                if self.authenticity.is_none() {
                    warn!(session = %self.session_id, %mismatch, "feed marked tampered");
                }
                self.authenticity = Some(mismatch);
            }
            TokenCheck::Match { .. } => {
                if self.authenticity.take().is_some() {
                    info!(
                        session = %self.session_id,
                        second = observation.unix_second,
                        "token matched again, tamper latch cleared"
                    );
                }
            }
            TokenCheck::Inconclusive(_) => {}
        }
        Ok(check)
    }

    /// Parse burned-in signature text and check its token at receipt time.
    ///
    /// The token is judged at the coordinator clock's current second, so a
    /// looped or replayed signature fails even though its own `T:` field
    /// agrees with its token. The `T:` field is only compared against
    /// receipt time and logged when it drifts past the skew tolerance.
    ///
    /// # Errors
    ///
    /// Returns a token error if the text holds no valid signature, or as
    /// [`IntegrityCoordinator::observe_token`].
    pub fn observe_watermark(&mut self, text: &str) -> Result<TokenCheck> {
        let stamped = parse_watermark(text)?;
        let received = Observation::new(self.clock.now_unix(), stamped.token);
        let check = self.observe_token(&received)?;

        let tolerance = self.validator.as_ref().map_or(0, TokenValidator::tolerance);
        if stamped.unix_second.abs_diff(received.unix_second) > tolerance.unsigned_abs() {
            warn!(
                session = %self.session_id,
                stamped = stamped.unix_second,
                received = received.unix_second,
                "signature timestamp disagrees with receipt time"
            );
        }
        Ok(check)
    }

    /// Start the session over: history, baseline, token window and
    /// authenticity state are cleared. The session id is kept.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.previous = None;
        self.frame_index = 0;
        self.authenticity = None;
        if let Some(validator) = &self.validator {
            validator.reset();
        }
        debug!(session = %self.session_id, "session reset");
    }
}

impl std::fmt::Debug for IntegrityCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityCoordinator")
            .field("session_id", &self.session_id)
            .field("global", &self.global)
            .field("extractor", &self.extractor)
            .field("tracker", &self.tracker)
            .field("engine", &self.engine)
            .field("validator", &self.validator)
            .field("clock", &self.clock)
            .field("frame_index", &self.frame_index)
            .field("authenticity", &self.authenticity)
            .field("remediator", &self.remediator.is_some())
            .field("sinks", &self.sinks.len())
            .finish_non_exhaustive()
    }
}
