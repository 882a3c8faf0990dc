use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use veriwave_domain::DetectError;

/// A decoded mono waveform at the pipeline sample rate. Ephemeral: consumed
/// by feature extraction and dropped.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    /// Decode `path` to mono f32, resample to `target_rate`, and truncate to
    /// `max_duration_seconds`. Any probe/decode failure (including a missing
    /// file) is reported as `ExtractionFailed`.
    pub fn open<P: AsRef<Path>>(
        path: P,
        target_rate: u32,
        max_duration_seconds: f32,
    ) -> Result<AudioClip, DetectError> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref).map_err(|err| {
            DetectError::extraction(format!("open {}: {err}", path_ref.display()))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|err| {
                DetectError::extraction(format!("probe {}: {err}", path_ref.display()))
            })?;
        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| DetectError::extraction("no default audio track"))?;
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|err| DetectError::extraction(format!("create decoder: {err}")))?;
        let source_rate = track.codec_params.sample_rate.unwrap_or(48_000);
        // Decode at most the window we keep after resampling.
        let needed = (source_rate as f32 * max_duration_seconds).ceil() as usize;

        let mut mono = Vec::new();
        loop {
            if mono.len() >= needed {
                break;
            }
            match format.next_packet() {
                Ok(packet) => {
                    let decoded = match decoder.decode(&packet) {
                        Ok(decoded) => decoded,
                        Err(symphonia::core::errors::Error::DecodeError(_)) => {
                            // skip undecodable packet
                            continue;
                        }
                        Err(err) => {
                            return Err(DetectError::extraction(format!("decode: {err}")));
                        }
                    };
                    let spec = *decoded.spec();
                    let frames = decoded.frames() as u64;
                    let mut buf = SampleBuffer::<f32>::new(frames, spec);
                    buf.copy_interleaved_ref(decoded);
                    let channel_count = spec.channels.count().max(1);
                    for frame in buf.samples().chunks_exact(channel_count) {
                        let sum: f32 = frame.iter().sum();
                        mono.push(sum / channel_count as f32);
                    }
                }
                Err(err) => {
                    use symphonia::core::errors::Error as SymphError;
                    match err {
                        SymphError::IoError(e)
                            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                        {
                            break;
                        }
                        SymphError::DecodeError(_) => {
                            // skip undecodable packet
                        }
                        _ => {
                            return Err(DetectError::extraction(format!("read packet: {err}")));
                        }
                    }
                }
            }
        }
        mono.truncate(needed);

        let mut samples = resample_linear(&mono, source_rate, target_rate);
        let max_samples = (target_rate as f32 * max_duration_seconds) as usize;
        samples.truncate(max_samples);
        debug!(
            source_rate,
            target_rate,
            sample_count = samples.len(),
            "decoded audio clip"
        );

        Ok(AudioClip {
            samples,
            sample_rate: target_rate,
        })
    }
}

/// Linear-interpolation resampler. Good enough for a classification frontend;
/// the classifier was trained on features from identically resampled audio.
fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }
    let step = from as f64 / to as f64;
    let out_len = (samples.len() as f64 / step).floor() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let a = samples[idx];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}
