//! Projection of a magnitude spectrum through one filter row.

use crate::constants::LOG_EPSILON;

/// `log10(sum_k spectrum[k] * weights[k] + 1e-6)`.
#[inline]
#[must_use]
pub fn project_band(spectrum: &[f32], weights: &[f32]) -> f32 {
    debug_assert_eq!(spectrum.len(), weights.len());
    let energy: f32 = spectrum.iter().zip(weights).map(|(&m, &w)| m * w).sum();
    (energy + LOG_EPSILON).log10()
}
