use std::path::Path;

use hound::{SampleFormat, WavReader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read wav file: {0}")]
    Wav(#[from] hound::Error),

    #[error("frame length must be non-zero")]
    EmptyFrame,
}

/// One labelled feature frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Example<'a> {
    pub label: f64,
    pub features: &'a [f64],
}

/// Source of fixed-length feature frames.
pub trait Dataset {
    fn num_features(&self) -> usize;

    fn num_examples(&self) -> usize;

    fn example(&self, index: usize) -> Option<Example<'_>>;

    fn examples(&self) -> Box<dyn Iterator<Item = Example<'_>> + '_> {
        Box::new((0..self.num_examples()).filter_map(move |i| self.example(i)))
    }
}

/// Copies `features` into a frame of exactly `size` elements, zero-padding
/// short input and truncating long input.
pub fn pad_frame(features: &[f64], size: usize) -> Vec<f64> {
    let mut frame = vec![0.0; size];
    let len = features.len().min(size);
    frame[..len].copy_from_slice(&features[..len]);
    frame
}

/// In-memory dataset of equal-length frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameDataset {
    num_features: usize,
    labels: Vec<f64>,
    data: Vec<f64>,
}

impl FrameDataset {
    pub fn new(num_features: usize) -> Self {
        Self {
            num_features,
            ..Default::default()
        }
    }

    /// Appends a row, padded or truncated to `num_features`.
    pub fn push(&mut self, label: f64, features: &[f64]) {
        self.labels.push(label);
        self.data.extend(pad_frame(features, self.num_features));
    }

    /// Splits the first channel of a wav file into unlabelled frames of
    /// `frame_len` samples normalised to [-1, 1]. The last frame is
    /// zero-padded.
    pub fn from_wav(path: impl AsRef<Path>, frame_len: usize) -> Result<Self, DatasetError> {
        if frame_len == 0 {
            return Err(DatasetError::EmptyFrame);
        }
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let samples: Vec<f64> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .step_by(channels)
                .map(|s| s.map(f64::from))
                .collect::<Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f64;
                reader
                    .samples::<i32>()
                    .step_by(channels)
                    .map(|s| s.map(|v| v as f64 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        let mut dataset = Self::new(frame_len);
        for chunk in samples.chunks(frame_len) {
            dataset.push(0.0, chunk);
        }
        Ok(dataset)
    }
}

impl Dataset for FrameDataset {
    fn num_features(&self) -> usize {
        self.num_features
    }

    fn num_examples(&self) -> usize {
        self.labels.len()
    }

    fn example(&self, index: usize) -> Option<Example<'_>> {
        let label = *self.labels.get(index)?;
        let start = index * self.num_features;
        Some(Example {
            label,
            features: &self.data[start..start + self.num_features],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    #[test]
    fn test_pad_frame() {
        assert_eq!(pad_frame(&[1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(pad_frame(&[1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    }

    #[test]
    fn test_push_pads_short_rows() {
        let mut dataset = FrameDataset::new(3);
        dataset.push(1.0, &[0.5]);
        dataset.push(0.0, &[1.0, 2.0, 3.0, 4.0]);

        assert_eq!(dataset.num_examples(), 2);
        let first = dataset.example(0).unwrap();
        assert_eq!(first.label, 1.0);
        assert_eq!(first.features, &[0.5, 0.0, 0.0]);
        assert_eq!(dataset.example(1).unwrap().features, &[1.0, 2.0, 3.0]);
        assert!(dataset.example(2).is_none());
        assert_eq!(dataset.examples().count(), 2);
    }

    #[test]
    fn test_from_wav_frames_first_channel() {
        let path = std::env::temp_dir().join(format!("sigmap-dataset-{}.wav", std::process::id()));
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        {
            let mut writer = WavWriter::create(&path, spec).unwrap();
            for sample in [0i16, 8192, 16384, 24576, i16::MIN] {
                writer.write_sample(sample).unwrap();
                writer.write_sample(-1i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let dataset = FrameDataset::from_wav(&path, 2).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(dataset.num_features(), 2);
        assert_eq!(dataset.num_examples(), 3);
        assert_eq!(dataset.example(0).unwrap().features, &[0.0, 0.25]);
        assert_eq!(dataset.example(1).unwrap().features, &[0.5, 0.75]);
        assert_eq!(dataset.example(2).unwrap().features, &[-1.0, 0.0]);
    }

    #[test]
    fn test_from_wav_rejects_empty_frames() {
        assert!(matches!(
            FrameDataset::from_wav("unused.wav", 0),
            Err(DatasetError::EmptyFrame)
        ));
    }
}
