//! Frame-level pipeline: decode, filter, suppress, transform, assemble.
//!
//! `Pipeline::process` is the boundary towards real-time media callers. It
//! always returns a `ResultRecord`: stage errors and panics are captured and
//! reported as `Failure` records tagged with the stage that raised them.

pub mod record;

pub use record::{
    pack_detection_id, FinalDetection, Metadata, MetamuxBox, MetamuxFrame, PixelDetection,
    ResultRecord, METAMUX_COLOR,
};

use crate::candidate::{CandidateFilter, Detection, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::labels::{LabelCache, LabelNaming, LabelSource};
use crate::suppress::{
    suppress, SuppressConfig, SuppressionMode, DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_RESULTS,
};
use crate::tensor::{decode, TensorDescriptor};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::transform::{transform_box, BoxAdjust, BoxFormat, OutputBox};
use crate::util::{DetDecodeError, DetDecodeResult, Stage};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Identifier of the first detection in each frame.
pub const DEFAULT_ID_BASE: u32 = 256;

/// Model name reported in metadata by default.
pub const DEFAULT_MODEL: &str = "yolov5m";

/// Configuration for a decode pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Cutoff for `objectness * class_score`.
    pub confidence_threshold: f32,
    /// IoU at which suppression drops the weaker box.
    pub iou_threshold: f32,
    /// Maximum detections per frame.
    pub max_results: usize,
    /// Whether suppression crosses class boundaries.
    pub suppression: SuppressionMode,
    /// Representation of `FinalDetection::bbox`.
    pub output_format: BoxFormat,
    /// Adjustments applied before conversion.
    pub adjust: BoxAdjust,
    pub label_source: LabelSource,
    pub label_naming: LabelNaming,
    /// Model identifier copied into metadata.
    pub model: String,
    /// Id of the highest-ranked detection; later ones count up.
    pub id_base: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
            suppression: SuppressionMode::ClassAgnostic,
            output_format: BoxFormat::Center,
            adjust: BoxAdjust::default(),
            label_source: LabelSource::BuiltIn,
            label_naming: LabelNaming::Dotted,
            model: DEFAULT_MODEL.to_string(),
            id_base: DEFAULT_ID_BASE,
        }
    }
}

impl PipelineConfig {
    fn suppress_config(&self) -> SuppressConfig {
        SuppressConfig {
            iou_threshold: self.iou_threshold,
            max_results: self.max_results,
            mode: self.suppression,
        }
    }

    /// Checks thresholds and adjustments.
    pub fn validate(&self) -> DetDecodeResult<()> {
        CandidateFilter::new(self.confidence_threshold)?;
        self.suppress_config().validate()?;
        self.adjust.validate()
    }
}

/// Decode pipeline bound to one configuration and label cache.
///
/// `Pipeline` is `Sync`; independent frames may be processed from several
/// threads at once.
#[derive(Debug)]
pub struct Pipeline {
    cfg: PipelineConfig,
    filter: CandidateFilter,
    suppress: SuppressConfig,
    labels: LabelCache,
    epoch: Instant,
    sequence: AtomicU64,
}

impl Pipeline {
    /// Validates `cfg` and loads labels from its source.
    pub fn new(cfg: PipelineConfig) -> DetDecodeResult<Self> {
        let labels = LabelCache::new(cfg.label_source.clone());
        Self::with_labels(cfg, labels)
    }

    /// Builds a pipeline around an existing label cache.
    pub fn with_labels(cfg: PipelineConfig, labels: LabelCache) -> DetDecodeResult<Self> {
        cfg.validate()?;
        let filter = CandidateFilter::new(cfg.confidence_threshold)?;
        let suppress = cfg.suppress_config();
        // Load before the first frame so no file I/O happens while decoding.
        let _ = labels.table();
        Ok(Self {
            cfg,
            filter,
            suppress,
            labels,
            epoch: Instant::now(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Returns the label cache.
    pub fn labels(&self) -> &LabelCache {
        &self.labels
    }

    /// Forces the label table to be reloaded from its source.
    pub fn reload_labels(&mut self) {
        self.labels.invalidate();
        let _ = self.labels.table();
    }

    /// Decodes, filters and suppresses one tensor without assembling a record.
    pub fn detect(&self, desc: &TensorDescriptor<'_>) -> DetDecodeResult<Vec<Detection>> {
        let decoded = decode(desc)?;
        let detections = self.filter.filter(decoded.candidates());
        Ok(suppress(detections, &self.suppress))
    }

    /// Processes one frame. Never fails: errors become `Failure` records.
    pub fn process(&self, desc: &TensorDescriptor<'_>) -> ResultRecord {
        let sequence_index = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let _span = trace_span!("process", sequence = sequence_index).entered();
        let metadata = self.metadata(desc, sequence_index);

        match self.run(desc) {
            Ok(detections) => {
                trace_event!("frame_done", detections = detections.len());
                ResultRecord::Success {
                    detections,
                    metadata,
                }
            }
            Err((stage, err)) => {
                trace_warn!("frame_failed", stage = stage, error = err);
                ResultRecord::Failure {
                    stage,
                    kind: err.kind(),
                    message: err.to_string(),
                    metadata,
                }
            }
        }
    }

    /// Processes frames one after another, in order.
    pub fn process_frames(&self, frames: &[TensorDescriptor<'_>]) -> Vec<ResultRecord> {
        frames.iter().map(|desc| self.process(desc)).collect()
    }

    /// Processes frames in parallel; records keep the input order.
    #[cfg(feature = "rayon")]
    pub fn process_frames_par(&self, frames: &[TensorDescriptor<'_>]) -> Vec<ResultRecord> {
        frames.par_iter().map(|desc| self.process(desc)).collect()
    }

    fn run(&self, desc: &TensorDescriptor<'_>) -> StageResult<Vec<FinalDetection>> {
        let decoded = guard(Stage::Decode, || decode(desc))?;
        let detections = guard(Stage::Filter, || {
            Ok(self.filter.filter(decoded.candidates()))
        })?;
        let kept = guard(Stage::Suppress, || Ok(suppress(detections, &self.suppress)))?;
        let boxes = guard(Stage::Transform, || {
            Ok(kept
                .iter()
                .map(|det| transform_box(&det.bbox, self.cfg.output_format, &self.cfg.adjust))
                .collect::<Vec<_>>())
        })?;
        guard(Stage::Assemble, || self.assemble(&kept, boxes))
    }

    fn assemble(
        &self,
        kept: &[Detection],
        boxes: Vec<OutputBox>,
    ) -> DetDecodeResult<Vec<FinalDetection>> {
        if kept.len() > self.cfg.max_results {
            return Err(DetDecodeError::StageFailed {
                stage: Stage::Assemble,
                message: format!(
                    "{} detections exceed max_results {}",
                    kept.len(),
                    self.cfg.max_results
                ),
            });
        }
        let table = self.labels.table();
        Ok(kept
            .iter()
            .zip(boxes)
            .enumerate()
            .map(|(rank, (det, bbox))| FinalDetection {
                class_name: table
                    .resolve(det.class_id, self.cfg.label_naming)
                    .into_owned(),
                bbox,
                confidence: det.confidence,
                class_id: det.class_id,
                id: self.cfg.id_base.saturating_add(rank as u32),
                source_box: det.bbox,
                batch: det.batch,
            })
            .collect())
    }

    fn metadata(&self, desc: &TensorDescriptor<'_>, sequence_index: u64) -> Metadata {
        Metadata {
            timestamp_us: self.epoch.elapsed().as_micros() as u64,
            sequence_index,
            model: self.cfg.model.clone(),
            confidence_threshold: self.cfg.confidence_threshold,
            iou_threshold: self.cfg.iou_threshold,
            max_results: self.cfg.max_results,
            input_width: desc.input_width,
            input_height: desc.input_height,
        }
    }
}

type StageResult<T> = Result<T, (Stage, DetDecodeError)>;

/// Runs one stage, converting its error or panic into a tagged failure.
fn guard<T>(stage: Stage, f: impl FnOnce() -> DetDecodeResult<T>) -> StageResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err((stage, err)),
        Err(payload) => Err((
            stage,
            DetDecodeError::StageFailed {
                stage,
                message: panic_message(payload.as_ref()),
            },
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "stage panicked".to_string()
    }
}
