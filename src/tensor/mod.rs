//! Detector output tensors and their descriptors.
//!
//! A `TensorDescriptor` borrows the output buffer produced by the inference
//! collaborator together with its declared `(batches, anchors, values)` shape.
//! Each anchor row holds `cx, cy, w, h, objectness` followed by one score per
//! class, so `values = 5 + num_classes`.

use crate::util::{DetDecodeError, DetDecodeResult};
use std::fmt;
use std::str::FromStr;

pub mod decode;

pub use decode::{decode, Candidate, Candidates, DecodedTensor};

/// Number of leading values per anchor before the class scores.
pub const BOX_VALUES: usize = 5;

/// Element type names negotiated for neural-network tensors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorFormat {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float16,
    Float32,
}

impl TensorFormat {
    /// Returns the canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            TensorFormat::Int8 => "INT8",
            TensorFormat::UInt8 => "UINT8",
            TensorFormat::Int16 => "INT16",
            TensorFormat::UInt16 => "UINT16",
            TensorFormat::Int32 => "INT32",
            TensorFormat::UInt32 => "UINT32",
            TensorFormat::Float16 => "FLOAT16",
            TensorFormat::Float32 => "FLOAT32",
        }
    }

    /// Returns true when buffers of this type carry packed `f32` values.
    ///
    /// `UINT8` buffers are raw byte views over a float tensor.
    pub fn is_decodable(self) -> bool {
        matches!(self, TensorFormat::Float32 | TensorFormat::UInt8)
    }
}

impl fmt::Display for TensorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TensorFormat {
    type Err = DetDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_uppercase().as_str() {
            "INT8" => TensorFormat::Int8,
            "UINT8" => TensorFormat::UInt8,
            "INT16" => TensorFormat::Int16,
            "UINT16" => TensorFormat::UInt16,
            "INT32" => TensorFormat::Int32,
            "UINT32" => TensorFormat::UInt32,
            "FLOAT16" => TensorFormat::Float16,
            "FLOAT32" => TensorFormat::Float32,
            _ => return Err(DetDecodeError::UnknownFormat(s.to_string())),
        };
        Ok(format)
    }
}

/// Declared `(batches, anchors, values)` shape of a detection tensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TensorShape {
    batches: usize,
    anchors: usize,
    values: usize,
}

impl TensorShape {
    /// Creates a shape, rejecting layouts without class scores.
    pub fn new(batches: usize, anchors: usize, values: usize) -> DetDecodeResult<Self> {
        let invalid = |reason| DetDecodeError::InvalidShape {
            batches,
            anchors,
            values,
            reason,
        };
        if batches == 0 || anchors == 0 {
            return Err(invalid("batches and anchors must be non-zero"));
        }
        if values <= BOX_VALUES {
            return Err(invalid("values must include at least one class score"));
        }
        batches
            .checked_mul(anchors)
            .and_then(|rows| rows.checked_mul(values))
            .ok_or_else(|| invalid("element count overflows usize"))?;
        Ok(Self {
            batches,
            anchors,
            values,
        })
    }

    /// Returns the batch count.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Returns the anchor count per batch.
    pub fn anchors(&self) -> usize {
        self.anchors
    }

    /// Returns the number of values per anchor.
    pub fn values(&self) -> usize {
        self.values
    }

    /// Returns the number of class scores per anchor.
    pub fn num_classes(&self) -> usize {
        self.values - BOX_VALUES
    }

    /// Returns the number of candidates the tensor encodes.
    pub fn num_candidates(&self) -> usize {
        self.batches * self.anchors
    }

    /// Returns the number of `f32` elements the shape requires.
    pub fn expected_len(&self) -> usize {
        self.num_candidates() * self.values
    }
}

/// Borrowed tensor storage.
#[derive(Clone, Copy, Debug)]
pub enum TensorData<'a> {
    /// Raw bytes as mapped from the media buffer.
    Bytes(&'a [u8]),
    /// Already-typed float values.
    F32(&'a [f32]),
}

/// Output tensor handed over by the inference collaborator.
#[derive(Clone, Copy, Debug)]
pub struct TensorDescriptor<'a> {
    /// Tensor storage.
    pub data: TensorData<'a>,
    /// Width of the frame fed to the network.
    pub input_width: u32,
    /// Height of the frame fed to the network.
    pub input_height: u32,
    /// Negotiated element type name, e.g. `"FLOAT32"`.
    pub input_format: &'a str,
    /// Declared output shape.
    pub shape: TensorShape,
}

impl<'a> TensorDescriptor<'a> {
    /// Describes a float tensor.
    pub fn from_f32(values: &'a [f32], shape: TensorShape) -> Self {
        Self {
            data: TensorData::F32(values),
            input_width: 0,
            input_height: 0,
            input_format: TensorFormat::Float32.as_str(),
            shape,
        }
    }

    /// Describes a raw byte buffer with the given format name.
    pub fn from_bytes(bytes: &'a [u8], input_format: &'a str, shape: TensorShape) -> Self {
        Self {
            data: TensorData::Bytes(bytes),
            input_width: 0,
            input_height: 0,
            input_format,
            shape,
        }
    }

    /// Sets the network input size.
    pub fn with_input_size(mut self, width: u32, height: u32) -> Self {
        self.input_width = width;
        self.input_height = height;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_parse_case_insensitively() {
        assert_eq!("float32".parse::<TensorFormat>().unwrap(), TensorFormat::Float32);
        assert_eq!(" UINT8 ".parse::<TensorFormat>().unwrap(), TensorFormat::UInt8);
        assert_eq!(
            "NV12".parse::<TensorFormat>().unwrap_err(),
            DetDecodeError::UnknownFormat("NV12".into())
        );
    }

    #[test]
    fn only_float_carrying_formats_decode() {
        assert!(TensorFormat::Float32.is_decodable());
        assert!(TensorFormat::UInt8.is_decodable());
        assert!(!TensorFormat::Float16.is_decodable());
        assert!(!TensorFormat::Int8.is_decodable());
    }

    #[test]
    fn shape_reports_derived_sizes() {
        let shape = TensorShape::new(1, 6300, 85).unwrap();
        assert_eq!(shape.num_classes(), 80);
        assert_eq!(shape.num_candidates(), 6300);
        assert_eq!(shape.expected_len(), 6300 * 85);
    }

    #[test]
    fn shape_rejects_missing_class_scores() {
        let err = TensorShape::new(1, 10, 5).unwrap_err();
        assert!(matches!(err, DetDecodeError::InvalidShape { values: 5, .. }));
        assert!(TensorShape::new(0, 10, 85).is_err());
        assert!(TensorShape::new(usize::MAX, 2, 85).is_err());
    }
}
