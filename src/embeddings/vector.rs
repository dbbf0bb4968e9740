//! Vector math shared by the embedding service and the room catalog.
//!
//! Every vector that reaches the catalog is L2-normalized, so the cosine and
//! Euclidean distances computed here are both bounded by `[0, 2]`.

use ndarray::ArrayView1;

use crate::config::SimilarityMetric;

/// Tolerance used when checking that a vector has unit length.
const UNIT_NORM_TOLERANCE: f64 = 1e-3;

/// Euclidean norm of `v`.
pub fn l2_norm(v: &[f32]) -> f64 {
    let view = ArrayView1::from(v);
    f64::from(view.dot(&view)).sqrt()
}

/// Scale `v` to unit length in place.
///
/// Returns `false` (leaving `v` untouched) when the vector has zero or
/// non-finite length and cannot be normalized.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if !norm.is_finite() || norm <= f64::EPSILON {
        return false;
    }
    for x in v.iter_mut() {
        *x = (f64::from(*x) / norm) as f32;
    }
    true
}

pub fn is_unit_vector(v: &[f32]) -> bool {
    !v.is_empty() && (l2_norm(v) - 1.0).abs() <= UNIT_NORM_TOLERANCE
}

/// Distance between two unit vectors under `metric`.
///
/// Returns `None` when the dimensions differ.
pub fn distance(metric: SimilarityMetric, a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);

    let d = match metric {
        SimilarityMetric::Cosine => 1.0 - f64::from(a.dot(&b)),
        SimilarityMetric::L2 => {
            let diff = &a - &b;
            f64::from(diff.dot(&diff)).sqrt()
        }
    };
    // Rounding can push a self-distance slightly below zero.
    Some(d.clamp(0.0, 2.0))
}

/// Map a distance between unit vectors to a similarity score in `[0, 1]`.
///
/// The mapping is linear, `1 - d / 2`, and strictly decreasing in `d` for
/// both supported metrics.
pub fn distance_to_score(distance: f64) -> f64 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Encode a vector as little-endian `f32` bytes for storage.
pub fn encode_f32_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian `f32` blob. Returns `None` when the blob length is
/// not a whole number of floats.
pub fn decode_f32_blob(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % std::mem::size_of::<f32>() != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
