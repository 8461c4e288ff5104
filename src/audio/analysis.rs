use std::time::Duration;

use serde::Serialize;

use super::beats::BeatTracker;
use super::decode::{decode_with_timeout, SampleBuffer, SourceHint};
use super::features::{BeatSequence, TempoEstimate};
use super::onset::OnsetExtractor;
use super::tempo::TempoEstimator;
use crate::config::Config;
use crate::deviation::{find_deviations, DeviationSet};
use crate::error::AnalysisError;

/// Where a pipeline run currently is. Any stage may jump to `Failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Stage {
    Idle,
    Decoding,
    EnvelopeExtraction,
    TempoEstimation,
    BeatTracking,
    Ready,
    Failed(String),
}

/// Everything one run derives from a clip.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub tempo: TempoEstimate,
    pub beats: BeatSequence,
    pub deviations: DeviationSet,
    pub duration: f32,
    pub sample_rate: u32,
}

impl Analysis {
    /// Re-derive deviations for a new expected tempo; beats and tempo are
    /// left untouched.
    pub fn set_expected_tempo(&mut self, expected_bpm: Option<f32>, tolerance_secs: f32) {
        self.deviations = find_deviations(self.beats.times(), expected_bpm, tolerance_secs);
    }
}

/// bytes -> samples -> onset envelope -> tempo -> beats -> deviations.
pub struct Pipeline {
    config: Config,
    extractor: OnsetExtractor,
    estimator: TempoEstimator,
    tracker: BeatTracker,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let extractor = OnsetExtractor::new(config.onset.window_size, config.onset.hop_size);
        let estimator = TempoEstimator::new(&config.tempo);
        let tracker = BeatTracker::new(&config.beats);
        Self {
            config,
            extractor,
            estimator,
            tracker,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyze(
        &self,
        bytes: Vec<u8>,
        hint: &SourceHint,
        expected_bpm: Option<f32>,
    ) -> Result<Analysis, AnalysisError> {
        self.analyze_observed(bytes, hint, expected_bpm, |_| {})
    }

    /// Like [`Pipeline::analyze`], reporting each stage to `observer` as it
    /// starts, then `Ready` or `Failed`.
    pub fn analyze_observed<F>(
        &self,
        bytes: Vec<u8>,
        hint: &SourceHint,
        expected_bpm: Option<f32>,
        mut observer: F,
    ) -> Result<Analysis, AnalysisError>
    where
        F: FnMut(Stage),
    {
        observer(Stage::Decoding);
        let ceiling = Duration::from_secs_f32(self.config.decode.timeout_secs);
        let audio = match decode_with_timeout(bytes, hint.clone(), ceiling) {
            Ok(audio) => audio,
            Err(e) => {
                let err = AnalysisError::from(e);
                observer(Stage::Failed(err.user_message()));
                return Err(err);
            }
        };
        self.analyze_samples(&audio, expected_bpm, observer)
    }

    /// Run the stages after decoding on an already decoded clip.
    pub fn analyze_samples<F>(
        &self,
        audio: &SampleBuffer,
        expected_bpm: Option<f32>,
        mut observer: F,
    ) -> Result<Analysis, AnalysisError>
    where
        F: FnMut(Stage),
    {
        let result = self.run_stages(audio, expected_bpm, &mut observer);
        match &result {
            Ok(_) => observer(Stage::Ready),
            Err(err) => {
                log::warn!("Analysis failed: {}", err);
                observer(Stage::Failed(err.user_message()));
            }
        }
        result
    }

    fn run_stages<F>(
        &self,
        audio: &SampleBuffer,
        expected_bpm: Option<f32>,
        observer: &mut F,
    ) -> Result<Analysis, AnalysisError>
    where
        F: FnMut(Stage),
    {
        let duration = audio.duration();
        let required = self
            .config
            .decode
            .min_duration_secs
            .max(self.extractor.window_size() as f32 / audio.sample_rate() as f32);

        observer(Stage::EnvelopeExtraction);
        if duration < required {
            return Err(AnalysisError::InsufficientAudio { duration, required });
        }
        let envelope = self.extractor.extract(audio);
        if envelope.is_empty() {
            return Err(AnalysisError::InsufficientAudio { duration, required });
        }

        observer(Stage::TempoEstimation);
        let tempo = self.estimator.estimate(&envelope)?;

        observer(Stage::BeatTracking);
        let beats = self.tracker.track(&envelope, &tempo, duration)?;

        let deviations = find_deviations(
            beats.times(),
            expected_bpm,
            self.config.deviation.tolerance_secs,
        );

        log::info!(
            "Analysis: {:.2}s clip, {:.1} BPM, {} beats, {} off",
            duration,
            tempo.bpm,
            beats.len(),
            deviations.len()
        );

        Ok(Analysis {
            tempo,
            beats,
            deviations,
            duration,
            sample_rate: audio.sample_rate(),
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Analyze a clip with the default configuration.
pub fn analyze(
    bytes: Vec<u8>,
    hint: &SourceHint,
    expected_bpm: Option<f32>,
) -> Result<Analysis, AnalysisError> {
    Pipeline::default().analyze(bytes, hint, expected_bpm)
}
