//! Safetensors export of computed features.
//!
//! A feature file holds one F32 tensor `mel` of shape `[mel_bands, frames]`
//! and the JSON-encoded [`SpectrogramConfig`] in the header metadata, so a
//! downstream model can check it was fed the front-end it was trained on.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use memmap2::MmapOptions;
use safetensors::tensor::{Dtype, SafeTensorError, View, serialize_to_file};
use thiserror::Error;
use tracing::debug;

use crate::config::SpectrogramConfig;
use crate::spectrogram::MelSpectrogram;

pub const MEL_TENSOR: &str = "mel";
pub const CONFIG_KEY: &str = "config";

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("safetensors error: {0}")]
    SafeTensors(#[from] SafeTensorError),
    #[error("config metadata error: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("feature file has no `{CONFIG_KEY}` metadata")]
    MissingConfig,
    #[error("feature file has no `{0}` tensor")]
    MissingTensor(String),
    #[error("unsupported dtype for {name}: {dtype:?}")]
    UnsupportedDtype { name: String, dtype: Dtype },
    #[error("tensor {name} has shape {shape:?}, expected [bands, frames]")]
    BadShape { name: String, shape: Vec<usize> },
}

struct MelView {
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl View for MelView {
    fn dtype(&self) -> Dtype {
        Dtype::F32
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.data)
    }

    fn data_len(&self) -> usize {
        self.data.len()
    }
}

/// Write `mel` and its `config` to a safetensors file at `path`.
pub fn save_spectrogram(
    path: impl AsRef<Path>,
    mel: &MelSpectrogram,
    config: &SpectrogramConfig,
) -> Result<(), FeatureError> {
    let mut data = Vec::with_capacity(mel.as_slice().len() * 4);
    for v in mel.as_slice() {
        data.extend_from_slice(&v.to_le_bytes());
    }
    let view = MelView {
        shape: vec![mel.bands(), mel.frames()],
        data,
    };

    let metadata = HashMap::from([(CONFIG_KEY.to_string(), serde_json::to_string(config)?)]);
    serialize_to_file([(MEL_TENSOR, view)], &Some(metadata), path.as_ref())?;
    debug!(
        path = %path.as_ref().display(),
        bands = mel.bands(),
        frames = mel.frames(),
        "features saved"
    );
    Ok(())
}

/// Memory-mapped, read-only feature file.
#[derive(Debug)]
pub struct FeatureStore {
    mmap: memmap2::Mmap,
}

impl FeatureStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let file = std::fs::File::open(path)?;
        // SAFETY: read-only mapping; the file is not modified while mapped.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { mmap })
    }

    pub fn config(&self) -> Result<SpectrogramConfig, FeatureError> {
        let (_, header) = safetensors::SafeTensors::read_metadata(&self.mmap)?;
        let json = header
            .metadata()
            .as_ref()
            .and_then(|m| m.get(CONFIG_KEY))
            .ok_or(FeatureError::MissingConfig)?;
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_spectrogram(&self) -> Result<MelSpectrogram, FeatureError> {
        let st = safetensors::SafeTensors::deserialize(&self.mmap)?;
        let tv = st.tensor(MEL_TENSOR).map_err(|e| match e {
            SafeTensorError::TensorNotFound(name) => FeatureError::MissingTensor(name),
            other => other.into(),
        })?;

        if tv.dtype() != Dtype::F32 {
            return Err(FeatureError::UnsupportedDtype {
                name: MEL_TENSOR.to_string(),
                dtype: tv.dtype(),
            });
        }
        let bad_shape = || FeatureError::BadShape {
            name: MEL_TENSOR.to_string(),
            shape: tv.shape().to_vec(),
        };
        let &[bands, frames] = tv.shape() else {
            return Err(bad_shape());
        };

        let data = tv
            .data()
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        MelSpectrogram::from_band_major(bands, frames, data).ok_or_else(bad_shape)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use safetensors::tensor::serialize_to_file;

    use super::{FeatureError, FeatureStore, MelView, save_spectrogram};
    use crate::config::{Framing, SpectrogramConfig};
    use crate::spectrogram::MelSpectrogram;

    fn tmp_file(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        p.push(format!("melspec-features-test-{name}-{nanos}.safetensors"));
        p
    }

    #[test]
    fn saves_matrix_and_config() {
        let cfg = SpectrogramConfig {
            mel_bands: 3,
            sample_rate: 16_000,
            framing: Framing::PadTail,
            ..SpectrogramConfig::default()
        };
        let values: Vec<f32> = (0..12).map(|i| i as f32 * 0.5 - 6.0).collect();
        let mel = MelSpectrogram::from_band_major(3, 4, values).expect("shape");

        let path = tmp_file("basic");
        save_spectrogram(&path, &mel, &cfg).expect("save");

        let store = FeatureStore::open(&path).expect("open");
        assert_eq!(store.config().expect("config"), cfg);
        let loaded = store.load_spectrogram().expect("load");
        assert_eq!(loaded, mel);
        assert_eq!(loaded.get(2, 3), mel.get(2, 3));

        drop(store);
        std::fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn file_without_mel_tensor_or_config() {
        let view = MelView {
            shape: vec![1, 2],
            data: [1.0f32, 2.0].iter().flat_map(|v| v.to_le_bytes()).collect(),
        };
        let path = tmp_file("foreign");
        serialize_to_file([("logits", view)], &None, &path).expect("write");

        let store = FeatureStore::open(&path).expect("open");
        match store.load_spectrogram() {
            Err(FeatureError::MissingTensor(name)) => assert_eq!(name, "mel"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(store.config(), Err(FeatureError::MissingConfig)));

        drop(store);
        std::fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FeatureStore::open(tmp_file("missing")).expect_err("no file");
        assert!(matches!(err, FeatureError::Io(_)));
    }
}
