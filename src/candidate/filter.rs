//! Objectness gate, class selection and confidence thresholding.

use crate::bbox::CenterBox;
use crate::tensor::Candidate;
use crate::trace::{trace_event, trace_span};
use crate::util::math::{argmax_first, clamp_unit};
use crate::util::{DetDecodeError, DetDecodeResult};
use serde::Serialize;

/// Candidates below this objectness are dropped before any class work.
pub const OBJECTNESS_FLOOR: f32 = 0.1;

/// Default cutoff for `objectness * class_score`.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;

/// Candidate that survived class selection and thresholding.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detection {
    /// Normalized center-form box.
    pub bbox: CenterBox,
    /// `objectness * class_confidence`, within `[0, 1]`.
    pub confidence: f32,
    /// Index of the best class score.
    pub class_id: u32,
    pub objectness: f32,
    /// Score of the selected class.
    pub class_confidence: f32,
    /// Batch the source anchor belongs to.
    pub batch: usize,
}

/// Per-candidate scoring with a caller-configured confidence threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateFilter {
    confidence_threshold: f32,
}

impl Default for CandidateFilter {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

impl CandidateFilter {
    /// Creates a filter; the threshold must be a finite value in `[0, 1]`.
    pub fn new(confidence_threshold: f32) -> DetDecodeResult<Self> {
        if !confidence_threshold.is_finite() || !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(DetDecodeError::InvalidConfig(
                "confidence_threshold must be within [0, 1]",
            ));
        }
        Ok(Self {
            confidence_threshold,
        })
    }

    /// Returns the confidence cutoff.
    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Scores a single candidate, returning `None` when it is rejected.
    pub fn score(&self, candidate: &Candidate<'_>) -> Option<Detection> {
        // NaN objectness falls through here and is rejected by the threshold.
        if candidate.objectness < OBJECTNESS_FLOOR {
            return None;
        }
        let (class_idx, class_confidence) = argmax_first(candidate.class_scores)?;
        let confidence = candidate.objectness * class_confidence;
        if confidence.is_nan() || confidence <= self.confidence_threshold {
            return None;
        }
        Some(Detection {
            bbox: candidate.bbox(),
            confidence: clamp_unit(confidence),
            class_id: class_idx as u32,
            objectness: candidate.objectness,
            class_confidence,
            batch: candidate.batch,
        })
    }

    /// Scores every candidate and keeps the survivors in input order.
    pub fn filter<'a, I>(&self, candidates: I) -> Vec<Detection>
    where
        I: IntoIterator<Item = Candidate<'a>>,
    {
        let _span = trace_span!("filter", threshold = self.confidence_threshold).entered();
        let mut seen = 0usize;
        let out: Vec<Detection> = candidates
            .into_iter()
            .inspect(|_| seen += 1)
            .filter_map(|c| self.score(&c))
            .collect();
        trace_event!("filtered", candidates = seen, kept = out.len());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(objectness: f32, scores: &[f32]) -> Candidate<'_> {
        Candidate {
            batch: 0,
            anchor: 0,
            center_x: 0.5,
            center_y: 0.5,
            width: 0.2,
            height: 0.3,
            objectness,
            class_scores: scores,
        }
    }

    #[test]
    fn low_objectness_is_gated_before_scoring() {
        let filter = CandidateFilter::new(0.0).unwrap();
        assert!(filter.score(&candidate(0.09, &[1.0])).is_none());
        assert!(filter.score(&candidate(0.1, &[1.0])).is_some());
    }

    #[test]
    fn confidence_must_exceed_threshold() {
        let filter = CandidateFilter::default();
        assert!(filter.score(&candidate(0.5, &[0.5])).is_none());
        let det = filter.score(&candidate(0.9, &[0.1, 0.8, 0.8])).unwrap();
        assert_eq!(det.class_id, 1);
        assert!((det.confidence - 0.72).abs() < 1e-6);
        assert!((det.class_confidence - 0.8).abs() < 1e-6);
        assert!((det.objectness - 0.9).abs() < 1e-6);
    }

    #[test]
    fn confidence_equal_to_threshold_is_rejected() {
        let filter = CandidateFilter::new(0.6f32 * 0.5).unwrap();
        assert!(filter.score(&candidate(0.6, &[0.5])).is_none());
        assert!(filter.score(&candidate(0.6, &[0.51])).is_some());
    }

    #[test]
    fn confidence_is_clamped_into_unit_range() {
        let filter = CandidateFilter::default();
        let det = filter.score(&candidate(1.5, &[2.0])).unwrap();
        assert_eq!(det.confidence, 1.0);
    }

    #[test]
    fn nan_scores_are_rejected() {
        let filter = CandidateFilter::default();
        assert!(filter.score(&candidate(f32::NAN, &[0.9])).is_none());
        assert!(filter.score(&candidate(0.9, &[f32::NAN])).is_none());
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        assert!(CandidateFilter::new(1.2).is_err());
        assert!(CandidateFilter::new(f32::NAN).is_err());
    }

    #[test]
    fn filter_keeps_input_order() {
        let a = [0.9f32];
        let b = [0.3f32];
        let c = [0.95f32];
        let rows = vec![candidate(0.9, &a), candidate(0.9, &b), candidate(0.8, &c)];
        let kept = CandidateFilter::default().filter(rows);
        assert_eq!(kept.len(), 2);
        assert!(kept[0].confidence > kept[1].confidence);
    }
}
