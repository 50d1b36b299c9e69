//! Hamming framing of a sample buffer.

use std::f32::consts::PI;

/// Hamming coefficient `0.54 - 0.46 * cos(2*pi*n / (len - 1))`.
#[inline]
#[must_use]
pub fn hamming(n: usize, len: usize) -> f32 {
    debug_assert!(len >= 2);
    let angle = 2.0 * PI * (n as f32) / ((len - 1) as f32);
    0.54 - 0.46 * angle.cos()
}

#[must_use]
pub fn hamming_window(len: usize) -> Vec<f32> {
    (0..len).map(|n| hamming(n, len)).collect()
}

/// Write windowed frame `frame_index` of `samples` into `out`.
///
/// The frame starts at `frame_index * hop_size` and spans `window.len()`
/// samples; positions past the end of `samples` are zero (no reflection).
pub fn window_frame(
    samples: &[f32],
    frame_index: usize,
    hop_size: usize,
    window: &[f32],
    out: &mut [f32],
) {
    debug_assert_eq!(window.len(), out.len());

    let start = frame_index.saturating_mul(hop_size);
    let available = samples.get(start..).unwrap_or(&[]);
    let n_real = available.len().min(out.len());

    for ((o, &x), &w) in out[..n_real].iter_mut().zip(available).zip(window) {
        *o = x * w;
    }
    out[n_real..].fill(0.0);
}
