//! Numeric helpers shared by the decode stages.

/// Returns the index and value of the largest element.
///
/// Ties resolve to the lowest index. Later NaN values are skipped, but a NaN
/// at index 0 is always returned since nothing compares greater than it.
pub(crate) fn argmax_first(values: &[f32]) -> Option<(usize, f32)> {
    let (first, rest) = values.split_first()?;
    let mut best_idx = 0usize;
    let mut best = *first;
    for (offset, &value) in rest.iter().enumerate() {
        if value > best {
            best = value;
            best_idx = offset + 1;
        }
    }
    Some((best_idx, best))
}

/// Clamps a score into `[0, 1]`, passing NaN through.
pub(crate) fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Reads little-endian `f32` words from a byte slice.
///
/// A trailing partial word is ignored.
pub(crate) fn f32_from_le_bytes(bytes: &[u8], max_values: usize) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .take(max_values)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{argmax_first, clamp_unit, f32_from_le_bytes};

    #[test]
    fn argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax_first(&[0.2, 0.7, 0.7, 0.1]), Some((1, 0.7)));
        assert_eq!(argmax_first(&[]), None);
    }

    #[test]
    fn argmax_skips_nan() {
        let (idx, value) = argmax_first(&[0.1, f32::NAN, 0.3]).unwrap();
        assert_eq!(idx, 2);
        assert!((value - 0.3).abs() < 1e-6);
    }

    #[test]
    fn leading_nan_wins() {
        let (idx, value) = argmax_first(&[f32::NAN, 0.9]).unwrap();
        assert_eq!(idx, 0);
        assert!(value.is_nan());
    }

    #[test]
    fn clamp_unit_bounds_scores() {
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert!(clamp_unit(f32::NAN).is_nan());
    }

    #[test]
    fn le_bytes_round_trip_and_ignore_tail() {
        let mut bytes = Vec::new();
        for v in [0.5f32, -2.0, 3.25] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0xAB);
        assert_eq!(f32_from_le_bytes(&bytes, usize::MAX), vec![0.5, -2.0, 3.25]);
        assert_eq!(f32_from_le_bytes(&bytes, 2), vec![0.5, -2.0]);
    }
}
