//! Spectrum analysis that turns raw samples into the byte buffers objects
//! receive each pass.

pub mod features;
mod smoothing;

use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

pub use smoothing::SmoothedValue;

use crate::config::AudioConfig;
use crate::Result;

/// Rolling analyser over the most recent `fft_size` samples.
///
/// Frequency bytes follow the usual analyser-node mapping: Hann window,
/// forward FFT, magnitudes smoothed over time, converted to decibels and
/// scaled from `[min_decibels, max_decibels]` onto `0..=255`. Time-domain
/// bytes map a sample `s` to `128 + 128 * s`.
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    history: Vec<f32>,
    smoothed: Vec<f32>,
    processed_samples: u64,
    fft: FftResources,
}

impl SpectrumAnalyser {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fft_size: config.fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            history: vec![0.0; config.fft_size],
            smoothed: vec![0.0; config.fft_size / 2],
            processed_samples: 0,
            fft: FftResources::plan(config.fft_size),
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Length of every buffer the analyser produces.
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Total samples pushed since the last reset.
    pub fn processed_samples(&self) -> u64 {
        self.processed_samples
    }

    /// Clears history and smoothing state while preserving configuration.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.processed_samples = 0;
    }

    /// Appends samples, keeping only the most recent `fft_size`.
    pub fn push_samples(&mut self, samples: &[f32]) {
        self.processed_samples += samples.len() as u64;
        if samples.len() >= self.fft_size {
            let tail = &samples[samples.len() - self.fft_size..];
            self.history.copy_from_slice(tail);
            return;
        }
        self.history.rotate_left(samples.len());
        let start = self.fft_size - samples.len();
        self.history[start..].copy_from_slice(samples);
    }

    /// Replaces the analysed window with `window`, zero-padding at the front
    /// when it is shorter than `fft_size`. Used for seekable sources.
    pub fn load_window(&mut self, window: &[f32]) {
        self.history.fill(0.0);
        self.push_samples(window);
    }

    /// Fills `out` with `bin_count` frequency-domain bytes.
    pub fn frequency_bytes(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let len = self.fft_size;
        let fft = &mut self.fft;

        for (index, value) in self.history.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let range = self.max_decibels - self.min_decibels;
        out.clear();
        out.reserve(self.smoothed.len());
        for (bin, previous) in fft.spectrum.iter().zip(self.smoothed.iter_mut()) {
            let magnitude = bin.norm() / len as f32;
            *previous = self.smoothing * *previous + (1.0 - self.smoothing) * magnitude;
            let decibels = if *previous > 0.0 {
                20.0 * previous.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (decibels - self.min_decibels) / range;
            out.push(scaled.clamp(0.0, 255.0) as u8);
        }
        Ok(())
    }

    /// Fills `out` with the latest `bin_count` samples as bytes.
    pub fn time_bytes(&self, out: &mut Vec<u8>) {
        out.clear();
        let start = self.history.len() - self.bin_count();
        out.extend(
            self.history[start..]
                .iter()
                .map(|sample| (128.0 + 128.0 * sample).clamp(0.0, 255.0) as u8),
        );
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(size: usize) -> Self {
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        Self {
            size,
            plan,
            scratch,
            spectrum,
            input,
        }
    }
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .field("processed_samples", &self.processed_samples)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser(fft_size: usize, smoothing: f32) -> SpectrumAnalyser {
        SpectrumAnalyser::new(&AudioConfig {
            fft_size,
            smoothing,
            max_decibels: 0.0,
            ..AudioConfig::default()
        })
        .unwrap()
    }

    fn tone(frequency: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut analyser = analyser(256, 0.0);
        let mut out = Vec::new();

        analyser.frequency_bytes(&mut out).unwrap();
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|byte| *byte == 0));

        analyser.time_bytes(&mut out);
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|byte| *byte == 128));
    }

    #[test]
    fn tone_peaks_in_its_bin() {
        // 1 kHz at 8 kHz with 256 bins of 31.25 Hz lands on bin 32.
        let mut analyser = analyser(256, 0.0);
        analyser.push_samples(&tone(1_000.0, 8_000.0, 256));

        let mut out = Vec::new();
        analyser.frequency_bytes(&mut out).unwrap();

        let peak = out
            .iter()
            .enumerate()
            .max_by_key(|(_, byte)| **byte)
            .map(|(index, _)| index);
        assert_eq!(peak, Some(32));
        assert!(out[32] > 200);
    }

    #[test]
    fn smoothing_carries_energy_into_silence() {
        let mut analyser = analyser(256, 0.8);
        let mut out = Vec::new();
        analyser.push_samples(&tone(1_000.0, 8_000.0, 256));
        analyser.frequency_bytes(&mut out).unwrap();
        let loud = out[32];

        analyser.push_samples(&[0.0; 256]);
        analyser.frequency_bytes(&mut out).unwrap();
        assert!(out[32] > 0);
        assert!(out[32] <= loud);
    }

    #[test]
    fn history_keeps_only_the_latest_window() {
        let mut analyser = analyser(32, 0.0);
        analyser.push_samples(&[0.5; 40]);
        analyser.push_samples(&[-1.0; 4]);

        let mut out = Vec::new();
        analyser.time_bytes(&mut out);
        assert_eq!(out.len(), 16);
        assert_eq!(out[0], 192);
        assert_eq!(out[15], 0);
        assert_eq!(analyser.processed_samples(), 44);
    }
}
