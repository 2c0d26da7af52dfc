//! Candidate scoring and pruning.
//!
//! Turns raw anchor rows into scored detections ahead of suppression.

pub mod filter;

pub use filter::{CandidateFilter, Detection, DEFAULT_CONFIDENCE_THRESHOLD, OBJECTNESS_FLOOR};
