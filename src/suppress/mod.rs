//! Greedy non-maximum suppression over scored detections.
//!
//! Boxes are compared in corner form without clamping to the frame. The
//! default mode suppresses across classes; `PerClass` only lets boxes of the
//! same class suppress each other.

use crate::bbox::Corners;
use crate::candidate::Detection;
use crate::trace::{trace_event, trace_span};
use crate::util::{DetDecodeError, DetDecodeResult};
use std::cmp::Ordering;
use std::str::FromStr;

/// Default IoU at or above which a lower-confidence box is dropped.
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Default cap on the number of returned detections.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Keeps the IoU denominator positive for degenerate boxes.
pub const IOU_EPSILON: f32 = 1e-6;

/// Which detections are allowed to suppress each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SuppressionMode {
    /// Any overlapping pair, regardless of class.
    #[default]
    ClassAgnostic,
    /// Only pairs that share a class id.
    PerClass,
}

impl FromStr for SuppressionMode {
    type Err = DetDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class_agnostic" | "agnostic" => Ok(SuppressionMode::ClassAgnostic),
            "per_class" => Ok(SuppressionMode::PerClass),
            _ => Err(DetDecodeError::InvalidConfig(
                "suppression must be class_agnostic or per_class",
            )),
        }
    }
}

/// Suppression parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuppressConfig {
    /// Overlap at which the weaker box is dropped.
    pub iou_threshold: f32,
    /// Maximum detections kept after suppression.
    pub max_results: usize,
    pub mode: SuppressionMode,
}

impl Default for SuppressConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
            mode: SuppressionMode::ClassAgnostic,
        }
    }
}

impl SuppressConfig {
    /// Checks that the IoU threshold is a finite value in `[0, 1]`.
    pub fn validate(&self) -> DetDecodeResult<()> {
        if !self.iou_threshold.is_finite() || !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(DetDecodeError::InvalidConfig(
                "iou_threshold must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Intersection over union of two corner-form boxes.
///
/// Inverted or empty extents contribute zero intersection. The result is
/// symmetric in its arguments.
pub fn iou(a: &Corners, b: &Corners) -> f32 {
    let iw = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let ih = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = iw * ih;
    inter / (a.area() + b.area() - inter + IOU_EPSILON)
}

fn confidence_desc(a: &Detection, b: &Detection) -> Ordering {
    b.confidence.total_cmp(&a.confidence)
}

/// Sorts detections by descending confidence, keeping the input order of ties.
pub fn sort_by_confidence(detections: &mut [Detection]) {
    detections.sort_by(confidence_desc);
}

/// Greedy NMS returning the kept detections by descending confidence.
///
/// Each iteration keeps the strongest remaining detection and drops every
/// remaining one whose IoU with it is at least `iou_threshold`.
pub fn non_maximum_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
    mode: SuppressionMode,
) -> Vec<Detection> {
    let _span = trace_span!("suppress", input = detections.len()).entered();
    if detections.is_empty() {
        return detections;
    }

    sort_by_confidence(&mut detections);
    let corners: Vec<Corners> = detections
        .iter()
        .map(|det| Corners::from_center(&det.bbox))
        .collect();
    let mut suppressed = vec![false; detections.len()];
    let mut kept = Vec::with_capacity(detections.len());

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(detections[i]);
        for j in (i + 1)..detections.len() {
            if suppressed[j] {
                continue;
            }
            if mode == SuppressionMode::PerClass && detections[j].class_id != detections[i].class_id
            {
                continue;
            }
            if iou(&corners[i], &corners[j]) >= iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    trace_event!("suppressed", kept = kept.len(), dropped = detections.len() - kept.len());
    kept
}

/// Sorts by descending confidence and keeps at most `max_results`.
pub fn select_top(mut detections: Vec<Detection>, max_results: usize) -> Vec<Detection> {
    sort_by_confidence(&mut detections);
    detections.truncate(max_results);
    detections
}

/// Runs suppression followed by top-k selection.
pub fn suppress(detections: Vec<Detection>, cfg: &SuppressConfig) -> Vec<Detection> {
    let kept = non_maximum_suppression(detections, cfg.iou_threshold, cfg.mode);
    select_top(kept, cfg.max_results)
}
