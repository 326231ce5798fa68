//! Remediation hook.
//!
//! Pixel-level enhancement lives outside this crate. The coordinator only
//! decides *when* a frame needs help and hands it to a [`Remediator`]; a
//! failing remediator is logged and the assessment is reported anyway.

use crate::verdict::Verdict;
use crate::Result;
use aegis_signals::{FrameSample, SignalVector};
use serde::{Deserialize, Serialize};

/// Which enhancement a frame needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationKind {
    /// Highlight suppression and contrast recovery for a glare frame.
    GlareRescue,
    /// Brightening for a dark frame.
    LowLightEnhance,
}

impl RemediationKind {
    /// Picks the remediation for a frame, if any.
    ///
    /// Only a `Glare` primary verdict requests glare rescue; low light is
    /// requested whenever the frame is dark and nothing more severe than glare
    /// was found.
    #[must_use]
    pub fn for_frame(verdict: &Verdict, signals: &SignalVector) -> Option<Self> {
        match verdict {
            Verdict::Glare => Some(Self::GlareRescue),
            Verdict::Nominal if signals.is_low_light => Some(Self::LowLightEnhance),
            _ => None,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GlareRescue => "glare_rescue",
            Self::LowLightEnhance => "low_light_enhance",
        }
    }
}

/// An external image enhancement collaborator.
///
/// Implementations must not assume they are called for every frame.
pub trait Remediator: Send {
    /// Produces an enhanced copy of `frame`.
    ///
    /// # Errors
    ///
    /// Any error; the coordinator logs it and carries on.
    fn remediate(&self, kind: RemediationKind, frame: &FrameSample) -> Result<FrameSample>;
}

impl<F> Remediator for F
where
    F: Fn(RemediationKind, &FrameSample) -> Result<FrameSample> + Send,
{
    fn remediate(&self, kind: RemediationKind, frame: &FrameSample) -> Result<FrameSample> {
        self(kind, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_selection() {
        let dark = SignalVector {
            is_low_light: true,
            ..SignalVector::default()
        };
        let bright = SignalVector::default();

        assert_eq!(
            RemediationKind::for_frame(&Verdict::Glare, &bright),
            Some(RemediationKind::GlareRescue)
        );
        assert_eq!(
            RemediationKind::for_frame(&Verdict::Nominal, &dark),
            Some(RemediationKind::LowLightEnhance)
        );
        assert_eq!(RemediationKind::for_frame(&Verdict::Nominal, &bright), None);
        assert_eq!(RemediationKind::for_frame(&Verdict::Shaken, &dark), None);
        assert_eq!(RemediationKind::for_frame(&Verdict::Blurred, &bright), None);
    }

    #[test]
    fn test_closure_remediator() {
        use aegis_signals::image::{GrayImage, Luma};

        let frame = FrameSample::from_luma(GrayImage::from_pixel(4, 4, Luma([10]))).unwrap();
        let brighten = |_: RemediationKind, f: &FrameSample| -> Result<FrameSample> {
            let mut luma = f.luma().clone();
            luma.pixels_mut().for_each(|p| p.0[0] = p.0[0].saturating_add(100));
            Ok(FrameSample::from_luma(luma)?)
        };
        let out = brighten.remediate(RemediationKind::LowLightEnhance, &frame).unwrap();
        assert_eq!(out.luma().get_pixel(0, 0).0[0], 110);
    }
}
