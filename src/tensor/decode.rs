//! Reinterprets a flat tensor buffer as a sequence of anchor candidates.

use crate::bbox::CenterBox;
use crate::tensor::{TensorData, TensorDescriptor, TensorFormat, TensorShape, BOX_VALUES};
use crate::trace::{trace_event, trace_span};
use crate::util::math::f32_from_le_bytes;
use crate::util::{DetDecodeError, DetDecodeResult};
use std::borrow::Cow;

/// One anchor row of the detector output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate<'a> {
    /// Batch the anchor belongs to.
    pub batch: usize,
    /// Anchor index within its batch.
    pub anchor: usize,
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    /// Probability that the anchor holds any object.
    pub objectness: f32,
    /// Per-class scores, indexed by class id.
    pub class_scores: &'a [f32],
}

impl Candidate<'_> {
    /// Returns the candidate box in center form.
    pub fn bbox(&self) -> CenterBox {
        CenterBox::new(self.center_x, self.center_y, self.width, self.height)
    }
}

/// Tensor values validated against their declared shape.
///
/// Float input is borrowed; byte input is copied once while reinterpreting.
#[derive(Clone, Debug)]
pub struct DecodedTensor<'a> {
    values: Cow<'a, [f32]>,
    shape: TensorShape,
}

impl<'a> DecodedTensor<'a> {
    /// Wraps values that already match `shape`, truncating any padding.
    pub fn from_values(values: Cow<'a, [f32]>, shape: TensorShape) -> DetDecodeResult<Self> {
        let needed = shape.expected_len();
        if values.len() < needed {
            return Err(DetDecodeError::BufferTooSmall {
                needed,
                got: values.len(),
            });
        }
        let values = match values {
            Cow::Borrowed(slice) => Cow::Borrowed(&slice[..needed]),
            Cow::Owned(mut vec) => {
                vec.truncate(needed);
                Cow::Owned(vec)
            }
        };
        Ok(Self { values, shape })
    }

    /// Returns the declared shape.
    pub fn shape(&self) -> TensorShape {
        self.shape
    }

    /// Returns the flat values, exactly `shape.expected_len()` long.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Iterates over all `batches * anchors` candidates in row order.
    pub fn candidates(&self) -> Candidates<'_> {
        Candidates {
            values: &self.values,
            shape: self.shape,
            next: 0,
        }
    }

    /// Returns the candidate at a flat row index.
    pub fn candidate(&self, row: usize) -> Option<Candidate<'_>> {
        candidate_at(&self.values, self.shape, row)
    }
}

fn candidate_at(values: &[f32], shape: TensorShape, row: usize) -> Option<Candidate<'_>> {
    if row >= shape.num_candidates() {
        return None;
    }
    let start = row * shape.values();
    let data = values.get(start..start + shape.values())?;
    Some(Candidate {
        batch: row / shape.anchors(),
        anchor: row % shape.anchors(),
        center_x: data[0],
        center_y: data[1],
        width: data[2],
        height: data[3],
        objectness: data[4],
        class_scores: &data[BOX_VALUES..],
    })
}

/// Iterator over the candidates of a decoded tensor.
#[derive(Clone, Debug)]
pub struct Candidates<'t> {
    values: &'t [f32],
    shape: TensorShape,
    next: usize,
}

impl<'t> Iterator for Candidates<'t> {
    type Item = Candidate<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let candidate = candidate_at(self.values, self.shape, self.next)?;
        self.next += 1;
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.shape.num_candidates().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Candidates<'_> {}

/// Decodes a tensor descriptor into a shape-checked candidate source.
///
/// Byte buffers are read as little-endian `f32`. Buffers shorter than the
/// declared shape fail with `BufferTooSmall`; longer buffers are truncated.
pub fn decode<'a>(desc: &TensorDescriptor<'a>) -> DetDecodeResult<DecodedTensor<'a>> {
    let shape = desc.shape;
    let _span = trace_span!(
        "decode",
        anchors = shape.anchors(),
        values = shape.values()
    )
    .entered();

    let format: TensorFormat = desc.input_format.parse()?;
    if !format.is_decodable() {
        return Err(DetDecodeError::UnsupportedFormat(format.as_str()));
    }

    let needed = shape.expected_len();
    let values = match desc.data {
        TensorData::F32(values) => {
            if format != TensorFormat::Float32 {
                return Err(DetDecodeError::FormatMismatch(
                    "float buffer declared with a byte format",
                ));
            }
            Cow::Borrowed(values)
        }
        TensorData::Bytes(bytes) => {
            let available = bytes.len() / 4;
            if available < needed {
                return Err(DetDecodeError::BufferTooSmall {
                    needed,
                    got: available,
                });
            }
            Cow::Owned(f32_from_le_bytes(bytes, needed))
        }
    };

    let decoded = DecodedTensor::from_values(values, shape)?;
    trace_event!("decoded", candidates = shape.num_candidates());
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(anchors: usize, values: usize) -> TensorShape {
        TensorShape::new(1, anchors, values).unwrap()
    }

    #[test]
    fn float_input_is_borrowed_and_truncated() {
        let mut data: Vec<f32> = (0..14).map(|v| v as f32).collect();
        data.push(99.0);
        let desc = TensorDescriptor::from_f32(&data, shape(2, 7));
        let decoded = decode(&desc).unwrap();
        assert_eq!(decoded.values().len(), 14);
        assert!(matches!(decoded.values, Cow::Borrowed(_)));

        let rows: Vec<_> = decoded.candidates().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].anchor, 1);
        assert_eq!(rows[1].center_x, 7.0);
        assert_eq!(rows[1].objectness, 11.0);
        assert_eq!(rows[1].class_scores, &[12.0, 13.0]);
    }

    #[test]
    fn byte_input_is_reinterpreted() {
        let floats = [0.5f32, 0.5, 0.2, 0.3, 0.9, 0.8];
        let bytes: Vec<u8> = floats.iter().flat_map(|v| v.to_le_bytes()).collect();
        let desc = TensorDescriptor::from_bytes(&bytes, "UINT8", shape(1, 6));
        let decoded = decode(&desc).unwrap();
        let c = decoded.candidate(0).unwrap();
        assert_eq!(c.bbox(), CenterBox::new(0.5, 0.5, 0.2, 0.3));
        assert_eq!(c.class_scores, &[0.8]);
    }

    #[test]
    fn short_buffers_fail_with_needed_count() {
        let data = vec![0.0f32; 100 * 85 - 1];
        let desc = TensorDescriptor::from_f32(&data, shape(100, 85));
        let err = decode(&desc).unwrap_err();
        assert_eq!(
            err,
            DetDecodeError::BufferTooSmall {
                needed: 8500,
                got: 8499,
            }
        );

        let bytes = vec![0u8; 4 * 6 - 1];
        let desc = TensorDescriptor::from_bytes(&bytes, "FLOAT32", shape(1, 6));
        assert_eq!(
            decode(&desc).unwrap_err(),
            DetDecodeError::BufferTooSmall { needed: 6, got: 5 }
        );
    }

    #[test]
    fn unsupported_formats_are_rejected() {
        let data = vec![0u8; 64];
        let desc = TensorDescriptor::from_bytes(&data, "FLOAT16", shape(1, 6));
        assert_eq!(
            decode(&desc).unwrap_err(),
            DetDecodeError::UnsupportedFormat("FLOAT16")
        );

        let desc = TensorDescriptor::from_bytes(&data, "RGB", shape(1, 6));
        assert!(matches!(
            decode(&desc).unwrap_err(),
            DetDecodeError::UnknownFormat(_)
        ));

        let floats = vec![0.0f32; 6];
        let mut desc = TensorDescriptor::from_f32(&floats, shape(1, 6));
        desc.input_format = "UINT8";
        assert!(matches!(
            decode(&desc).unwrap_err(),
            DetDecodeError::FormatMismatch(_)
        ));
    }

    #[test]
    fn candidate_count_covers_every_batch() {
        let s = TensorShape::new(2, 3, 6).unwrap();
        let data = vec![0.0f32; s.expected_len()];
        let decoded = decode(&TensorDescriptor::from_f32(&data, s)).unwrap();
        let candidates = decoded.candidates();
        assert_eq!(candidates.len(), 6);
        let last = candidates.last().unwrap();
        assert_eq!((last.batch, last.anchor), (1, 2));
    }
}
