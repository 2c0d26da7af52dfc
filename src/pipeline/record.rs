//! Result records handed to overlay, publishing and muxing consumers.

use crate::bbox::{CenterBox, Corners};
use crate::transform::{to_pixels, OutputBox, PixelBox};
use crate::util::{ErrorKind, Stage};
use serde::Serialize;

/// Color attached to metamux rectangles (opaque green, ARGB).
pub const METAMUX_COLOR: u32 = 0xFF00_FF00;

/// Externally visible detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinalDetection {
    /// Resolved display name.
    pub class_name: String,
    /// Box in the configured representation, adjustments applied.
    pub bbox: OutputBox,
    /// Within `[0, 1]`.
    pub confidence: f32,
    pub class_id: u32,
    /// `id_base + rank` within the frame.
    pub id: u32,
    /// Unadjusted normalized center box as decoded.
    pub source_box: CenterBox,
    /// Batch the detection came from.
    pub batch: usize,
}

/// Frame-level metadata attached to every record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metadata {
    /// Microseconds since the pipeline was created (monotonic).
    pub timestamp_us: u64,
    /// Per-pipeline frame counter, starting at 1.
    pub sequence_index: u64,
    pub model: String,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_results: usize,
    pub input_width: u32,
    pub input_height: u32,
}

/// Outcome of processing one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultRecord {
    /// Detections ordered by descending confidence.
    Success {
        detections: Vec<FinalDetection>,
        metadata: Metadata,
    },
    /// A stage failed; the frame yields no detections.
    Failure {
        stage: Stage,
        kind: ErrorKind,
        message: String,
        metadata: Metadata,
    },
}

impl ResultRecord {
    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, ResultRecord::Success { .. })
    }

    /// Returns the detections, empty on failure.
    pub fn detections(&self) -> &[FinalDetection] {
        match self {
            ResultRecord::Success { detections, .. } => detections,
            ResultRecord::Failure { .. } => &[],
        }
    }

    /// Returns the frame metadata.
    pub fn metadata(&self) -> &Metadata {
        match self {
            ResultRecord::Success { metadata, .. } | ResultRecord::Failure { metadata, .. } => {
                metadata
            }
        }
    }

    /// Builds the corner-format view expected by a metadata muxer.
    pub fn to_metamux(&self) -> MetamuxFrame {
        let metadata = self.metadata();
        let sequence = (metadata.sequence_index & 0xFF) as u32;
        let bounding_boxes = self
            .detections()
            .iter()
            .enumerate()
            .map(|(index, det)| MetamuxBox {
                name: det.class_name.clone(),
                id: pack_detection_id(det.batch as u32, sequence, index as u32),
                confidence: det.confidence,
                color: METAMUX_COLOR,
                rectangle: Corners::from_center(&det.source_box).to_array(),
            })
            .collect();
        MetamuxFrame {
            timestamp_us: metadata.timestamp_us,
            sequence_index: metadata.sequence_index,
            bounding_boxes,
        }
    }

    /// Converts detections to pixel-space center boxes for a bus publisher.
    ///
    /// With `class_filter` set, only detections of that class name are kept.
    pub fn pixel_detections(
        &self,
        width: u32,
        height: u32,
        class_filter: Option<&str>,
    ) -> Vec<PixelDetection> {
        self.detections()
            .iter()
            .filter(|det| class_filter.map_or(true, |name| det.class_name == name))
            .map(|det| PixelDetection {
                id: format!("{}_{}", det.class_name, det.id),
                class_id: det.class_id,
                score: det.confidence,
                bbox: to_pixels(&det.source_box, width, height),
            })
            .collect()
    }
}

/// Packs batch, sequence and index into one id: `batch << 24 | seq << 16 | index`.
///
/// Batch and sequence keep their low 8 bits, index its low 16 bits.
pub fn pack_detection_id(batch: u32, sequence: u32, index: u32) -> u32 {
    ((batch & 0xFF) << 24) | ((sequence & 0xFF) << 16) | (index & 0xFFFF)
}

/// One rectangle for the metadata muxer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetamuxBox {
    pub name: String,
    pub id: u32,
    pub confidence: f32,
    pub color: u32,
    /// `[x1, y1, x2, y2]`, normalized.
    pub rectangle: [f32; 4],
}

/// Metadata muxer payload for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetamuxFrame {
    pub timestamp_us: u64,
    pub sequence_index: u64,
    pub bounding_boxes: Vec<MetamuxBox>,
}

/// Pixel-space detection for an external message bus.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PixelDetection {
    /// `"<class_name>_<id>"`.
    pub id: String,
    pub class_id: u32,
    pub score: f32,
    pub bbox: PixelBox,
}
