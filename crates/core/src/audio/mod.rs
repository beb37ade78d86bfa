use std::sync::{Arc, Mutex, MutexGuard};

use crate::analysis::SpectrumAnalyser;
use crate::config::AudioConfig;
use crate::props::Domain;
use crate::timeline::PlaybackClock;
use crate::{Result, VisualiserError};

/// What the scheduler pulls audio data from each pass.
pub trait AudioSource {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Length of the buffers [`read`](Self::read) produces.
    fn bin_count(&self) -> usize;

    /// Fills `out` with `bin_count` bytes for `domain`.
    fn read(&mut self, domain: Domain, out: &mut Vec<u8>) -> Result<()>;

    /// Moves playback to `time`. Only seekable sources support this.
    fn seek(&mut self, _time: f64) -> Result<()> {
        Err(VisualiserError::AudioUnavailable(
            "audio source is not seekable".to_string(),
        ))
    }

    /// Total length, for sources that know it.
    fn duration(&self) -> Option<f64> {
        None
    }
}

/// Mode enum describes how the audio subsystem operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    /// Samples arrive through an [`AudioFeed`]; time advances with them.
    Live,
    /// A whole track is loaded up front and played back by seeking.
    Precomputed,
}

/// High level audio engine façade.
#[derive(Debug)]
pub struct AudioEngine {
    mode: AudioMode,
    sample_rate: u32,
    analysis: Arc<Mutex<SpectrumAnalyser>>,
    track: Vec<f32>,
    clock: PlaybackClock,
}

impl AudioEngine {
    /// Creates a new audio engine instance in the requested mode.
    pub fn new(mode: AudioMode, config: &AudioConfig) -> Result<Self> {
        let analysis = SpectrumAnalyser::new(config)?;
        Ok(Self {
            mode,
            sample_rate: config.sample_rate,
            analysis: Arc::new(Mutex::new(analysis)),
            track: Vec::new(),
            clock: PlaybackClock::default(),
        })
    }

    /// Precomputed engine over a decoded mono track.
    pub fn with_track(config: &AudioConfig, samples: Vec<f32>) -> Result<Self> {
        let mut engine = Self::new(AudioMode::Precomputed, config)?;
        engine.track = samples;
        Ok(engine)
    }

    /// Returns the currently configured audio mode.
    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    /// Returns the sample rate the engine operates at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Resets analysis and playback, returning a handle live capture uses to
    /// push samples from any thread.
    pub fn start(&mut self) -> Result<AudioFeed> {
        self.lock_analysis()?.reset();
        self.clock.reset();
        Ok(AudioFeed {
            shared: Arc::clone(&self.analysis),
        })
    }

    /// Feeds a block of samples directly. Only meaningful in live mode.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut engine = self.lock_analysis()?;
        engine.push_samples(samples);
        Ok(())
    }

    /// Loads the analysis window that ends at the current playback time.
    fn load_track_window(&self, analysis: &mut SpectrumAnalyser) {
        let end = ((self.clock.time_seconds * f64::from(self.sample_rate)).round() as usize)
            .min(self.track.len());
        let start = end.saturating_sub(analysis.fft_size());
        analysis.load_window(&self.track[start..end]);
    }

    fn lock_analysis(&self) -> Result<MutexGuard<'_, SpectrumAnalyser>> {
        self.analysis
            .lock()
            .map_err(|_| VisualiserError::msg("spectrum analyser has been poisoned"))
    }
}

impl AudioSource for AudioEngine {
    fn current_time(&self) -> f64 {
        match self.mode {
            AudioMode::Precomputed => self.clock.time_seconds,
            AudioMode::Live => self
                .lock_analysis()
                .map(|analysis| analysis.processed_samples() as f64 / f64::from(self.sample_rate))
                .unwrap_or(0.0),
        }
    }

    fn bin_count(&self) -> usize {
        self.lock_analysis()
            .map(|analysis| analysis.bin_count())
            .unwrap_or(0)
    }

    fn read(&mut self, domain: Domain, out: &mut Vec<u8>) -> Result<()> {
        let mut analysis = self.lock_analysis()?;
        if self.mode == AudioMode::Precomputed {
            if self.track.is_empty() {
                return Err(VisualiserError::AudioUnavailable(
                    "no track loaded".to_string(),
                ));
            }
            self.load_track_window(&mut analysis);
        }

        match domain {
            Domain::Frequency => analysis.frequency_bytes(out),
            Domain::Time => {
                analysis.time_bytes(out);
                Ok(())
            }
        }
    }

    fn seek(&mut self, time: f64) -> Result<()> {
        match self.mode {
            AudioMode::Precomputed => {
                self.clock.seek(time);
                Ok(())
            }
            AudioMode::Live => Err(VisualiserError::AudioUnavailable(
                "live audio cannot seek".to_string(),
            )),
        }
    }

    fn duration(&self) -> Option<f64> {
        match self.mode {
            AudioMode::Precomputed => Some(self.track.len() as f64 / f64::from(self.sample_rate)),
            AudioMode::Live => None,
        }
    }
}

/// Shared, thread-safe handle live capture uses to push samples.
#[derive(Clone)]
pub struct AudioFeed {
    shared: Arc<Mutex<SpectrumAnalyser>>,
}

impl AudioFeed {
    pub fn push(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        self.lock()?.push_samples(samples);
        Ok(())
    }

    /// Samples pushed since the engine was started.
    pub fn pushed_samples(&self) -> Result<u64> {
        Ok(self.lock()?.processed_samples())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SpectrumAnalyser>> {
        self.shared
            .lock()
            .map_err(|_| VisualiserError::msg("spectrum analyser has been poisoned"))
    }
}

impl std::fmt::Debug for AudioFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFeed").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AudioConfig {
        AudioConfig {
            sample_rate: 1_000,
            fft_size: 64,
            smoothing: 0.0,
            ..AudioConfig::default()
        }
    }

    #[test]
    fn live_time_follows_pushed_samples() {
        let mut audio = AudioEngine::new(AudioMode::Live, &config()).unwrap();
        let feed = audio.start().unwrap();

        feed.push(&[0.25; 500]).unwrap();
        audio.push_samples(&[0.25; 250]).unwrap();

        assert_eq!(audio.current_time(), 0.75);
        assert_eq!(feed.pushed_samples().unwrap(), 750);
        assert!(audio.seek(1.0).is_err());
        assert_eq!(audio.duration(), None);

        let mut out = Vec::new();
        audio.read(Domain::Time, &mut out).unwrap();
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|byte| *byte == 160));

        audio.start().unwrap();
        assert_eq!(audio.current_time(), 0.0);
    }

    #[test]
    fn feed_can_be_driven_from_a_capture_thread() {
        let mut audio = AudioEngine::new(AudioMode::Live, &config()).unwrap();
        let feed = audio.start().unwrap();

        std::thread::spawn(move || feed.push(&[0.0; 100]))
            .join()
            .unwrap()
            .unwrap();
        assert_eq!(audio.current_time(), 0.1);
    }

    #[test]
    fn precomputed_reads_the_window_at_the_seek_position() {
        let mut track = vec![0.0_f32; 1_000];
        track[500..].fill(-0.5);
        let mut audio = AudioEngine::with_track(&config(), track).unwrap();
        assert_eq!(audio.duration(), Some(1.0));

        let mut out = Vec::new();
        audio.seek(0.25).unwrap();
        audio.read(Domain::Time, &mut out).unwrap();
        assert!(out.iter().all(|byte| *byte == 128));

        audio.seek(0.9).unwrap();
        assert_eq!(audio.current_time(), 0.9);
        audio.read(Domain::Time, &mut out).unwrap();
        assert!(out.iter().all(|byte| *byte == 64));
    }

    #[test]
    fn precomputed_without_track_is_unavailable() {
        let mut audio = AudioEngine::new(AudioMode::Precomputed, &config()).unwrap();
        let err = audio.read(Domain::Frequency, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, VisualiserError::AudioUnavailable(_)));
    }
}
