use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

const ONSET_GAIN: f32 = 12.0;

/// Audio-reactive features of a single set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SetFeatures {
    pub rms: f32,
    pub peak: f32,
    /// Normalised [0, 1] spectral centroid where 1.0 corresponds to the
    /// Nyquist bin of the set.
    pub spectral_centroid: f32,
    /// Clamped rise in RMS since the previously analysed set.
    pub onset: f32,
}

/// Computes [`SetFeatures`] for the newest set of each snapshot. Runs on the
/// frame loop, never inside the audio callback.
///
/// The centroid is measured in bins relative to Nyquist, so the analyzer
/// needs no sample rate.
pub struct SetAnalyzer {
    last_rms: f32,
    planner: RealFftPlanner<f32>,
    plan: Option<SpectrumPlan>,
}

impl SetAnalyzer {
    pub fn new() -> Self {
        Self {
            last_rms: 0.0,
            planner: RealFftPlanner::new(),
            plan: None,
        }
    }

    pub fn analyze(&mut self, samples: &[f32]) -> Result<SetFeatures> {
        if samples.len() < 2 {
            return Err(VisualiserError::InvalidInput(
                "analysis requires sets with at least two samples",
            ));
        }

        let (energy, peak) = samples
            .iter()
            .fold((0.0_f32, 0.0_f32), |(energy, peak), &s| {
                (energy + s * s, peak.max(s.abs()))
            });
        let rms = (energy / samples.len() as f32).sqrt();
        let onset = ((rms - self.last_rms).max(0.0) * ONSET_GAIN).clamp(0.0, 1.0);
        self.last_rms = rms;

        let spectral_centroid = self.plan_for(samples.len()).centroid(samples)?;

        Ok(SetFeatures {
            rms,
            peak,
            spectral_centroid,
            onset,
        })
    }

    fn plan_for(&mut self, len: usize) -> &mut SpectrumPlan {
        let planner = &mut self.planner;
        let plan = self.plan.get_or_insert_with(|| SpectrumPlan::new(planner, len));
        if plan.window.len() != len {
            *plan = SpectrumPlan::new(planner, len);
        }
        plan
    }
}

/// FFT plan, Hann window and work buffers for one set length.
struct SpectrumPlan {
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    windowed: Vec<f32>,
    bins: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumPlan {
    fn new(planner: &mut RealFftPlanner<f32>, len: usize) -> Self {
        let fft = planner.plan_fft_forward(len);
        let span = (len - 1) as f32;
        let window = (0..len)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / span).cos())
            .collect();
        Self {
            window,
            windowed: fft.make_input_vec(),
            bins: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
        }
    }

    /// Magnitude-weighted mean bin, scaled so the Nyquist bin maps to 1.0.
    fn centroid(&mut self, samples: &[f32]) -> Result<f32> {
        for ((out, &sample), &w) in self.windowed.iter_mut().zip(samples).zip(&self.window) {
            *out = sample * w;
        }
        self.fft
            .process_with_scratch(&mut self.windowed, &mut self.bins, &mut self.scratch)?;

        let (total, moment) = self
            .bins
            .iter()
            .enumerate()
            .fold((0.0_f32, 0.0_f32), |(total, moment), (bin, value)| {
                let magnitude = value.norm();
                (total + magnitude, moment + magnitude * bin as f32)
            });
        if total <= f32::EPSILON {
            return Ok(0.0);
        }

        let nyquist_bin = self.window.len() as f32 * 0.5;
        Ok((moment / total / nyquist_bin).clamp(0.0, 1.0))
    }
}

impl Default for SetAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SetAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetAnalyzer")
            .field("last_rms", &self.last_rms)
            .field("set_len", &self.plan.as_ref().map(|plan| plan.window.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn silence_has_no_features() {
        let mut analyzer = SetAnalyzer::new();
        let features = analyzer.analyze(&[0.0; 480]).unwrap();

        assert_eq!(features, SetFeatures::default());
    }

    #[test]
    fn rejects_tiny_sets() {
        let mut analyzer = SetAnalyzer::new();
        assert!(matches!(
            analyzer.analyze(&[1.0]),
            Err(VisualiserError::InvalidInput(_))
        ));
    }

    #[test]
    fn brighter_tone_has_higher_centroid() {
        let mut analyzer = SetAnalyzer::new();
        let low = analyzer.analyze(&sine(300.0, 48_000, 480)).unwrap();
        let high = analyzer.analyze(&sine(9_000.0, 48_000, 480)).unwrap();

        assert!(high.spectral_centroid > low.spectral_centroid);
        assert!((low.rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.05);
        assert!(low.peak <= 1.0 && low.peak > 0.9);
    }

    #[test]
    fn tone_at_half_nyquist_centers_the_spectrum() {
        let mut analyzer = SetAnalyzer::new();
        let features = analyzer.analyze(&sine(12_000.0, 48_000, 480)).unwrap();
        assert!((features.spectral_centroid - 0.5).abs() < 0.02);
    }

    #[test]
    fn onset_fires_on_rising_level_only() {
        let mut analyzer = SetAnalyzer::new();
        let quiet = analyzer.analyze(&[0.0; 64]).unwrap();
        let loud = analyzer.analyze(&[0.5; 64]).unwrap();
        let steady = analyzer.analyze(&[0.5; 64]).unwrap();

        assert_eq!(quiet.onset, 0.0);
        assert_eq!(loud.onset, 1.0);
        assert_eq!(steady.onset, 0.0);
    }

    #[test]
    fn replans_when_set_size_changes() {
        let mut analyzer = SetAnalyzer::new();
        analyzer.analyze(&[0.1; 32]).unwrap();
        analyzer.analyze(&[0.1; 48]).unwrap();
        assert_eq!(analyzer.plan.as_ref().map(|plan| plan.window.len()), Some(48));
    }
}
