//! Mel spectrogram front-end for small keyword-spotting / wake-word models.
//!
//! The crate provides:
//! - Triangular mel filter-bank construction
//! - Hamming framing with tail zero-padding
//! - Log-compressed mel projection over an injected spectral transform
//! - A single-buffer orchestrator with scoped large-buffer allocation and
//!   cooperative yields
//! - WAV input and safetensors feature export helpers

pub mod alloc;
pub mod audio;
pub mod config;
pub mod constants;
pub mod cooperative;
pub mod features;
pub mod filterbank;
pub mod project;
pub mod spectral;
pub mod spectrogram;
pub mod window;

pub use alloc::{BufferAllocator, HeapAllocator, RegionAllocator, ScopedBuffer};
pub use config::{ConfigError, FilterBankConfig, Framing, SpectrogramConfig};
pub use cooperative::{CooperativeYield, FnYield, NoYield, ThreadYield};
pub use filterbank::MelFilterBank;
pub use spectral::{DirectDft, RustFftMagnitude, SpectralTransform};
pub use spectrogram::{
    AudioBuffer, MelSpectrogram, MelSpectrogramExtractor, SpectrogramError,
    compute_mel_spectrogram_into,
};
