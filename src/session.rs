//! Per-view analysis state shared with a playback/UI collaborator.
//!
//! Each loaded clip bumps a generation counter. Stage updates and results
//! carrying an older generation are dropped, so a slow analysis of a
//! previous clip can never overwrite the current one.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use serde::Serialize;

use crate::audio::analysis::{Analysis, Pipeline, Stage};
use crate::audio::decode::SourceHint;
use crate::error::AnalysisError;
use crate::timeline::Timeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
pub struct Session {
    generation: Generation,
    stage: Stage,
    analysis: Option<Analysis>,
    expected_tempo: Option<f32>,
    tolerance_secs: f32,
    playback_secs: f32,
}

impl Session {
    pub fn new(tolerance_secs: f32) -> Self {
        Self {
            generation: Generation(0),
            stage: Stage::Idle,
            analysis: None,
            expected_tempo: None,
            tolerance_secs,
            playback_secs: 0.0,
        }
    }

    /// Start a new clip: drop everything derived from the previous one and
    /// return the generation its results must carry.
    pub fn begin(&mut self) -> Generation {
        self.generation = Generation(self.generation.0 + 1);
        self.stage = Stage::Idle;
        self.analysis = None;
        self.expected_tempo = None;
        self.playback_secs = 0.0;
        log::debug!("Session generation {}", self.generation.0);
        self.generation
    }

    /// [`Session::begin`], then adopt the deviation tolerance `pipeline` is
    /// configured with.
    fn begin_for(&mut self, pipeline: &Pipeline) -> Generation {
        self.tolerance_secs = pipeline.config().deviation.tolerance_secs;
        self.begin()
    }

    pub fn tolerance_secs(&self) -> f32 {
        self.tolerance_secs
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    /// Record stage progress. Returns `false` (and changes nothing) for a
    /// stale generation.
    pub fn advance(&mut self, generation: Generation, stage: Stage) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.stage = stage;
        true
    }

    /// Publish the outcome of a run. Returns `false` for a stale generation.
    pub fn finish(
        &mut self,
        generation: Generation,
        result: Result<Analysis, AnalysisError>,
    ) -> bool {
        if !self.is_current(generation) {
            log::warn!(
                "Discarding result of generation {} (current is {})",
                generation.0,
                self.generation.0
            );
            return false;
        }
        match result {
            Ok(mut analysis) => {
                analysis.set_expected_tempo(self.expected_tempo, self.tolerance_secs);
                self.analysis = Some(analysis);
                self.stage = Stage::Ready;
            }
            Err(err) => {
                self.analysis = None;
                self.stage = Stage::Failed(err.user_message());
            }
        }
        true
    }

    /// Begin a new generation and run `pipeline` on `bytes` in place.
    pub fn load(
        &mut self,
        pipeline: &Pipeline,
        bytes: Vec<u8>,
        hint: &SourceHint,
    ) -> Result<(), AnalysisError> {
        let generation = self.begin_for(pipeline);
        let result = pipeline.analyze_observed(bytes, hint, None, |stage| {
            self.stage = stage;
        });
        match result {
            Ok(analysis) => {
                self.finish(generation, Ok(analysis));
                Ok(())
            }
            Err(err) => {
                self.analysis = None;
                self.stage = Stage::Failed(err.user_message());
                Err(err)
            }
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    pub fn expected_tempo(&self) -> Option<f32> {
        self.expected_tempo
    }

    pub fn playback_secs(&self) -> f32 {
        self.playback_secs
    }

    pub fn on_playback_time(&mut self, seconds: f32) {
        if seconds.is_finite() {
            self.playback_secs = seconds.max(0.0);
        }
    }

    /// Re-derive deviations from the cached beats; nothing is re-decoded.
    pub fn on_expected_tempo_changed(&mut self, bpm: Option<f32>) {
        self.expected_tempo = bpm;
        if let Some(analysis) = self.analysis.as_mut() {
            analysis.set_expected_tempo(bpm, self.tolerance_secs);
        }
    }

    /// Markers and cursor for the current clip, or `None` if there is no
    /// result yet or the clip has zero duration.
    pub fn timeline(&self) -> Option<Timeline> {
        let analysis = self.analysis.as_ref()?;
        Timeline::build(
            analysis.beats.times(),
            &analysis.deviations,
            analysis.duration,
            self.playback_secs,
        )
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(crate::deviation::DEFAULT_TOLERANCE_SECS)
    }
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    // A panicked worker leaves state that is still internally consistent.
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Start a new generation and analyze `bytes` on a worker thread. The lock is
/// only held to publish stages and the result. The join handle yields whether
/// the result was accepted.
pub fn spawn_analysis(
    session: &Arc<Mutex<Session>>,
    pipeline: Arc<Pipeline>,
    bytes: Vec<u8>,
    hint: SourceHint,
) -> std::io::Result<(Generation, JoinHandle<bool>)> {
    let generation = lock(session).begin_for(&pipeline);
    let session = Arc::clone(session);

    let handle = thread::Builder::new()
        .name(format!("beatcheck-analysis-{}", generation.0))
        .spawn(move || {
            let result = pipeline.analyze_observed(bytes, &hint, None, |stage| {
                lock(&session).advance(generation, stage);
            });
            lock(&session).finish(generation, result)
        })?;

    Ok((generation, handle))
}
