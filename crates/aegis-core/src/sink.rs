//! Assessment sinks.
//!
//! Storage and display collaborators receive every assessment through
//! [`AssessmentSink`]. No response is expected from them.

use crate::verdict::Assessment;
use tracing::{debug, warn};

/// Receives each frame's assessment.
pub trait AssessmentSink: Send {
    /// Records one assessment.
    fn record(&mut self, assessment: &Assessment);
}

/// Logs assessments: debug for nominal frames, warn for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AssessmentSink for TracingSink {
    fn record(&mut self, assessment: &Assessment) {
        let s = &assessment.signals;
        if assessment.verdict.is_nominal() {
            debug!(
                session = %assessment.session_id,
                frame = assessment.frame_index,
                cold_start = assessment.cold_start,
                blur = s.blur_variance,
                shake = s.shake_magnitude,
                glare = s.glare_pct,
                "frame nominal"
            );
        } else {
            warn!(
                session = %assessment.session_id,
                frame = assessment.frame_index,
                verdict = %assessment.verdict,
                blur = s.blur_variance,
                shake = s.shake_magnitude,
                glare = s.glare_pct,
                shift = s.shift_magnitude,
                "feed integrity alert"
            );
        }
    }
}

/// Keeps every assessment in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<Assessment>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Recorded assessments, oldest first.
    #[must_use]
    pub fn records(&self) -> &[Assessment] {
        &self.records
    }

    /// Takes the recorded assessments, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<Assessment> {
        std::mem::take(&mut self.records)
    }
}

impl AssessmentSink for MemorySink {
    fn record(&mut self, assessment: &Assessment) {
        self.records.push(assessment.clone());
    }
}

impl<S: AssessmentSink> AssessmentSink for std::sync::Arc<std::sync::Mutex<S>> {
    fn record(&mut self, assessment: &Assessment) {
        self.lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .record(assessment);
    }
}
