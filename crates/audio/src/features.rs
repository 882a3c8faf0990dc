use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

use ndarray::{s, Array2, Array3, Axis};
use realfft::{RealFftPlanner, RealToComplex};
use tracing::{debug, instrument};

use veriwave_domain::{DetectError, FeatureConfig};

use crate::gate::noise_gate;
use crate::io::{AudioClip, AudioDecoder};

/// Per-channel scaling applied after the image is assembled, matching the
/// classifier's training-time preprocessing (ImageNet convention). Using any
/// other convention silently skews confidence values.
const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

const DB_FLOOR: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Turns a decoded waveform into the fixed-shape feature tensor the
/// classifier expects. The Hann window, mel filterbank, and FFT plan are
/// built once per extractor.
pub struct FeatureExtractor {
    config: FeatureConfig,
    hann: Vec<f32>,
    mel_filters: Vec<Vec<f32>>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        let hann = build_hann_window(config.window_size);
        let mel_filters = build_mel_filters(
            config.window_size,
            config.sample_rate,
            config.mel_bands,
            0.0,
            config.sample_rate as f32 / 2.0,
        );
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(config.window_size);
        Self {
            config,
            hann,
            mel_filters,
            fft,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Decode the file and extract its feature tensor. Output shape is always
    /// exactly `(image_size, image_size, channels)` for accepted inputs.
    #[instrument(skip(self))]
    pub fn extract(&self, path: &Path) -> Result<Array3<f32>, DetectError> {
        let clip = AudioDecoder::open(
            path,
            self.config.sample_rate,
            self.config.max_duration_seconds,
        )?;
        self.extract_from_clip(clip)
    }

    pub fn extract_from_clip(&self, mut clip: AudioClip) -> Result<Array3<f32>, DetectError> {
        if clip.samples.len() < self.config.min_samples() {
            return Err(DetectError::EmptyOrTooShortInput {
                seconds: clip.duration_seconds(),
                min_seconds: self.config.min_duration_seconds,
            });
        }

        let stats = noise_gate(&mut clip.samples, clip.sample_rate);
        debug!(
            mean = stats.mean,
            std_dev = stats.std_dev,
            threshold = stats.threshold,
            "noise gate applied"
        );

        let coeffs = self.cepstral_coefficients(&clip.samples)?;
        log_stage("cepstral", coeffs.iter().copied(), coeffs.shape());

        let fixed = fix_frame_count(&coeffs, self.config.target_frames);
        let image = cycle_fill(&fixed, self.config.image_size);
        let mut tensor = replicate_channels(&image, self.config.channels);
        log_stage("stacked", tensor.iter().copied(), tensor.shape());

        self.scale_channels(&mut tensor);
        log_stage("scaled", tensor.iter().copied(), tensor.shape());

        Ok(tensor)
    }

    /// Cepstral coefficient matrix, `coefficient_count` rows by one column per
    /// analysis frame: centered STFT -> power spectrum -> mel filterbank ->
    /// dB -> orthonormal DCT-II along the mel axis.
    fn cepstral_coefficients(&self, samples: &[f32]) -> Result<Array2<f32>, DetectError> {
        let n_fft = self.config.window_size;
        let hop = self.config.hop_size;
        let n_bins = n_fft / 2 + 1;
        let n_mels = self.config.mel_bands;

        let padded = reflect_pad(samples, n_fft / 2);
        let frames = samples.len() / hop + 1;

        let mut mel_spec = Array2::<f32>::zeros((n_mels, frames));
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        for frame in 0..frames {
            let start = frame * hop;
            for (i, slot) in input.iter_mut().enumerate() {
                *slot = padded[start + i] * self.hann[i];
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .map_err(|err| DetectError::extraction(format!("fft: {err}")))?;
            for (m, filter) in self.mel_filters.iter().enumerate() {
                let mut energy = 0.0f32;
                for k in 0..n_bins {
                    energy += filter[k] * spectrum[k].norm_sqr();
                }
                mel_spec[[m, frame]] = energy;
            }
        }

        // power to dB with an 80 dB dynamic-range floor below the peak
        mel_spec.mapv_inplace(|v| 10.0 * v.max(DB_FLOOR).log10());
        let max_db = mel_spec.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        mel_spec.mapv_inplace(|v| v.max(max_db - TOP_DB));

        let n_coeffs = self.config.coefficient_count;
        let mut coeffs = Array2::<f32>::zeros((n_coeffs, frames));
        let scale_first = (1.0 / n_mels as f32).sqrt();
        let scale_rest = (2.0 / n_mels as f32).sqrt();
        for frame in 0..frames {
            for c in 0..n_coeffs {
                let mut acc = 0.0f32;
                for m in 0..n_mels {
                    acc += mel_spec[[m, frame]]
                        * (PI / n_mels as f32 * (m as f32 + 0.5) * c as f32).cos();
                }
                coeffs[[c, frame]] = acc * if c == 0 { scale_first } else { scale_rest };
            }
        }
        Ok(coeffs)
    }

    fn scale_channels(&self, tensor: &mut Array3<f32>) {
        for (c, mut plane) in tensor.axis_iter_mut(Axis(2)).enumerate() {
            let mean = CHANNEL_MEAN[c % CHANNEL_MEAN.len()];
            let std = CHANNEL_STD[c % CHANNEL_STD.len()];
            plane.mapv_inplace(|v| (v / 255.0 - mean) / std);
        }
    }
}

/// Zero-pad on the right or truncate to exactly `target` frames.
fn fix_frame_count(matrix: &Array2<f32>, target: usize) -> Array2<f32> {
    let (rows, cols) = matrix.dim();
    let mut out = Array2::<f32>::zeros((rows, target));
    let keep = cols.min(target);
    out.slice_mut(s![.., ..keep])
        .assign(&matrix.slice(s![.., ..keep]));
    out
}

/// Fill a `size`x`size` matrix by cycling the row-major flattening of the
/// input. Repetition, not interpolation: the training pipeline reshaped this
/// way and the classifier only sees parity-correct features if we do too.
fn cycle_fill(matrix: &Array2<f32>, size: usize) -> Array2<f32> {
    let flat: Vec<f32> = matrix.iter().copied().collect();
    if flat.is_empty() {
        return Array2::zeros((size, size));
    }
    let mut out = Vec::with_capacity(size * size);
    for i in 0..size * size {
        out.push(flat[i % flat.len()]);
    }
    Array2::from_shape_vec((size, size), out).expect("cycle_fill dims")
}

fn replicate_channels(image: &Array2<f32>, channels: usize) -> Array3<f32> {
    let (h, w) = image.dim();
    let mut out = Array3::<f32>::zeros((h, w, channels));
    for ((y, x), &value) in image.indexed_iter() {
        for c in 0..channels {
            out[[y, x, c]] = value;
        }
    }
    out
}

fn log_stage(stage: &str, values: impl Iterator<Item = f32>, shape: &[usize]) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0usize;
    for v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v as f64;
        sum_sq += (v as f64) * (v as f64);
        count += 1;
    }
    if count == 0 {
        return;
    }
    let mean = sum / count as f64;
    let std = (sum_sq / count as f64 - mean * mean).max(0.0).sqrt();
    debug!(stage, ?shape, min, max, mean, std, "feature stage");
}

fn build_hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
        .collect()
}

/// Triangular mel filterbank with Slaney-style band normalization.
fn build_mel_filters(
    fft_size: usize,
    sample_rate: u32,
    n_mels: usize,
    fmin: f32,
    fmax: f32,
) -> Vec<Vec<f32>> {
    let n_bins = fft_size / 2 + 1;
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);

    let mel_points: Vec<f32> = (0..=(n_mels + 1))
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32)
        .collect();
    let hz_points: Vec<f32> = mel_points.iter().map(|&m| mel_to_hz(m)).collect();
    let bin_freqs: Vec<f32> = (0..n_bins)
        .map(|k| k as f32 * sample_rate as f32 / fft_size as f32)
        .collect();

    let mut filters = vec![vec![0.0f32; n_bins]; n_mels];
    for (m, filter) in filters.iter_mut().enumerate() {
        let lower = hz_points[m];
        let center = hz_points[m + 1];
        let upper = hz_points[m + 2];
        let rise = (center - lower).max(1e-10);
        let fall = (upper - center).max(1e-10);
        let band_norm = 2.0 / (upper - lower).max(1e-10);

        for (k, &freq) in bin_freqs.iter().enumerate() {
            let weight = if freq >= lower && freq <= center {
                (freq - lower) / rise
            } else if freq > center && freq <= upper {
                (upper - freq) / fall
            } else {
                0.0
            };
            filter[k] = (weight * band_norm).max(0.0);
        }
    }
    filters
}

fn hz_to_mel(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f32).ln() / 27.0;
    if hz >= min_log_hz {
        min_log_mel + (hz / min_log_hz).ln() / logstep
    } else {
        hz / f_sp
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1_000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f32).ln() / 27.0;
    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        mel * f_sp
    }
}

fn reflect_pad(samples: &[f32], pad: usize) -> Vec<f32> {
    if pad == 0 {
        return samples.to_vec();
    }
    if samples.is_empty() {
        return vec![0.0; pad * 2];
    }
    if samples.len() == 1 {
        return vec![samples[0]; 1 + pad * 2];
    }
    let n = samples.len() as isize;
    let mut out = Vec::with_capacity(samples.len() + 2 * pad);
    for i in -(pad as isize)..(n + pad as isize) {
        out.push(samples[reflect_index(i, samples.len())]);
    }
    out
}

fn reflect_index(mut i: isize, len: usize) -> usize {
    let max = len as isize - 1;
    while i < 0 || i > max {
        if i < 0 {
            i = -i;
        } else {
            i = 2 * max - i;
        }
    }
    i as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sine_clip(seconds: f32, frequency: f32) -> AudioClip {
        let sample_rate = 16_000u32;
        let total = (sample_rate as f32 * seconds) as usize;
        let samples = (0..total)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                0.5 * (2.0 * PI * frequency * t).sin()
            })
            .collect();
        AudioClip {
            samples,
            sample_rate,
        }
    }

    #[test]
    fn extraction_yields_the_configured_shape() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        for seconds in [0.15f32, 1.0, 5.0] {
            let tensor = extractor.extract_from_clip(sine_clip(seconds, 440.0)).unwrap();
            assert_eq!(tensor.shape(), &[128, 128, 3]);
        }
    }

    #[test]
    fn short_input_is_rejected() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let result = extractor.extract_from_clip(sine_clip(0.05, 440.0));
        assert!(matches!(
            result,
            Err(DetectError::EmptyOrTooShortInput { .. })
        ));
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let a = extractor.extract_from_clip(sine_clip(1.0, 330.0)).unwrap();
        let b = extractor.extract_from_clip(sine_clip(1.0, 330.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn channels_carry_the_same_image_before_scaling() {
        // Per-channel scaling shifts each channel differently; undoing it must
        // recover identical planes.
        let extractor = FeatureExtractor::new(FeatureConfig::default());
        let tensor = extractor.extract_from_clip(sine_clip(0.5, 440.0)).unwrap();
        for ((y, x), _) in tensor.index_axis(Axis(2), 0).indexed_iter() {
            let c0 = tensor[[y, x, 0]] * CHANNEL_STD[0] + CHANNEL_MEAN[0];
            let c1 = tensor[[y, x, 1]] * CHANNEL_STD[1] + CHANNEL_MEAN[1];
            let c2 = tensor[[y, x, 2]] * CHANNEL_STD[2] + CHANNEL_MEAN[2];
            assert_relative_eq!(c0, c1, epsilon = 1e-4);
            assert_relative_eq!(c1, c2, epsilon = 1e-4);
        }
    }

    #[test]
    fn fix_frame_count_pads_and_truncates() {
        let matrix = Array2::from_shape_fn((4, 10), |(r, c)| (r * 10 + c) as f32);
        let padded = fix_frame_count(&matrix, 16);
        assert_eq!(padded.dim(), (4, 16));
        assert_eq!(padded[[2, 9]], 29.0);
        assert_eq!(padded[[2, 15]], 0.0);

        let truncated = fix_frame_count(&matrix, 6);
        assert_eq!(truncated.dim(), (4, 6));
        assert_eq!(truncated[[3, 5]], 35.0);
    }

    #[test]
    fn cycle_fill_repeats_row_major_order() {
        let matrix = Array2::from_shape_vec((1, 3), vec![1.0, 2.0, 3.0]).unwrap();
        let filled = cycle_fill(&matrix, 2);
        assert_eq!(filled[[0, 0]], 1.0);
        assert_eq!(filled[[0, 1]], 2.0);
        assert_eq!(filled[[1, 0]], 3.0);
        assert_eq!(filled[[1, 1]], 1.0);
    }

    #[test]
    fn mel_filters_cover_the_spectrum() {
        let filters = build_mel_filters(2048, 16_000, 128, 0.0, 8_000.0);
        assert_eq!(filters.len(), 128);
        assert_eq!(filters[0].len(), 1025);
        for filter in &filters {
            assert!(filter.iter().any(|&w| w > 0.0));
            assert!(filter.iter().all(|&w| w >= 0.0));
        }
    }

    #[test]
    fn hz_mel_round_trip() {
        for hz in [0.0f32, 100.0, 440.0, 1_000.0, 4_000.0, 8_000.0] {
            assert_relative_eq!(mel_to_hz(hz_to_mel(hz)), hz, epsilon = 0.5);
        }
    }

    #[test]
    fn reflect_pad_mirrors_edges() {
        let padded = reflect_pad(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_eq!(padded, vec![3.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 2.0]);
    }
}
