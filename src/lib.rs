//! detdecode turns raw single-stage detector output into labelled boxes.
//!
//! The pipeline reinterprets a flat output tensor as anchor candidates,
//! gates them on objectness and class confidence, runs greedy IoU
//! suppression, converts boxes into the requested representation and
//! assembles a typed result record. Label names come from a load-once cache.
//! Frame-level parallelism is available via the `rayon` feature.

pub mod bbox;
pub mod candidate;
pub mod labels;
pub mod pipeline;
pub mod suppress;
pub mod tensor;
mod trace;
pub mod transform;
pub mod util;

pub use bbox::{CenterBox, Corners};
pub use candidate::{CandidateFilter, Detection, OBJECTNESS_FLOOR};
pub use labels::{LabelCache, LabelNaming, LabelOrigin, LabelSource, LabelTable};
pub use pipeline::{
    FinalDetection, Metadata, MetamuxFrame, Pipeline, PipelineConfig, PixelDetection,
    ResultRecord,
};
pub use suppress::{iou, non_maximum_suppression, SuppressConfig, SuppressionMode};
pub use tensor::{
    decode, Candidate, DecodedTensor, TensorData, TensorDescriptor, TensorFormat, TensorShape,
};
pub use transform::{transform_box, BoxAdjust, BoxFormat, OutputBox, PixelBox};
pub use util::{DetDecodeError, DetDecodeResult, ErrorKind, Stage};
