/// Statistics measured over the noise-estimation window, kept for diagnostic
/// logging only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GateStats {
    pub mean: f32,
    pub std_dev: f32,
    pub threshold: f32,
}

/// Window over which the noise floor is estimated, in seconds.
const NOISE_WINDOW_SECONDS: f32 = 0.1;
/// Threshold is `mean + THRESHOLD_SIGMA * std_dev` of the window.
const THRESHOLD_SIGMA: f32 = 3.0;
/// Samples below the threshold keep this fraction of their amplitude.
const ATTENUATION: f32 = 0.1;

/// Adaptive noise gate: estimate the noise floor over the first 100 ms and
/// attenuate every sample whose magnitude falls strictly below
/// `mean + 3 * std_dev` to 10% of its value. The constants are a parity
/// requirement with the classifier's training preprocessing.
pub fn noise_gate(samples: &mut [f32], sample_rate: u32) -> GateStats {
    let window = ((sample_rate as f32 * NOISE_WINDOW_SECONDS) as usize).min(samples.len());
    if window == 0 {
        return GateStats {
            mean: 0.0,
            std_dev: 0.0,
            threshold: 0.0,
        };
    }

    let head = &samples[..window];
    let mean = head.iter().sum::<f32>() / window as f32;
    let variance = head.iter().map(|s| (s - mean) * (s - mean)).sum::<f32>() / window as f32;
    let std_dev = variance.sqrt();
    let threshold = mean + THRESHOLD_SIGMA * std_dev;

    for sample in samples.iter_mut() {
        if sample.abs() < threshold {
            *sample *= ATTENUATION;
        }
    }

    GateStats {
        mean,
        std_dev,
        threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gate_measures_window_statistics() {
        // 100ms at 40Hz = 4 samples of noise floor, then loud content
        let mut samples = vec![0.01, -0.01, 0.01, -0.01, 0.9, -0.9, 0.005];
        let stats = noise_gate(&mut samples, 40);

        assert_relative_eq!(stats.mean, 0.0, epsilon = 1e-6);
        assert_relative_eq!(stats.std_dev, 0.01, epsilon = 1e-6);
        assert_relative_eq!(stats.threshold, 0.03, epsilon = 1e-6);

        // loud samples untouched, quiet samples attenuated to 10%
        assert_relative_eq!(samples[4], 0.9, epsilon = 1e-6);
        assert_relative_eq!(samples[5], -0.9, epsilon = 1e-6);
        assert_relative_eq!(samples[0], 0.001, epsilon = 1e-6);
        assert_relative_eq!(samples[6], 0.0005, epsilon = 1e-6);
    }

    #[test]
    fn attenuated_samples_stay_below_the_original_threshold() {
        let mut samples: Vec<f32> = (0..800)
            .map(|i| 0.02 * (i as f32 * 0.37).sin() + if i > 400 { 0.5 } else { 0.0 })
            .collect();
        let original = samples.clone();
        let stats = noise_gate(&mut samples, 4_000);

        for (before, after) in original.iter().zip(samples.iter()) {
            if before.abs() < stats.threshold {
                assert!(after.abs() < stats.threshold);
                assert_relative_eq!(*after, before * 0.1, epsilon = 1e-6);
            } else {
                assert_relative_eq!(*after, *before, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn negative_threshold_leaves_signal_untouched() {
        // A strongly negative window mean with near-zero deviation puts the
        // threshold below zero; no magnitude can be below it.
        let mut samples = vec![-0.5; 100];
        let before = samples.clone();
        let stats = noise_gate(&mut samples, 1_000);
        assert!(stats.threshold < 0.0);
        assert_eq!(samples, before);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut samples: Vec<f32> = Vec::new();
        let stats = noise_gate(&mut samples, 16_000);
        assert_eq!(stats.threshold, 0.0);
    }
}
