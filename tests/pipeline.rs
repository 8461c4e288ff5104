mod common;

use beatcheck::{analyze, find_deviations, AnalysisError, Pipeline, SourceHint};
use common::*;

fn wav_hint() -> SourceHint {
    SourceHint::extension("wav")
}

#[test]
fn steady_click_track_matches_expected_tempo() {
    let bytes = click_track_wav(120.0, 10.0);
    let analysis = analyze(bytes, &wav_hint(), Some(120.0)).unwrap();

    assert!(
        (analysis.tempo.bpm - 120.0).abs() <= 2.0,
        "tempo {}",
        analysis.tempo.bpm
    );
    assert!(analysis.tempo.confidence > 0.0 && analysis.tempo.confidence <= 1.0);
    assert!(analysis.deviations.is_empty(), "{:?}", analysis.deviations);
    assert!(analysis.beats.len() >= 15, "only {} beats", analysis.beats.len());
    assert_eq!(analysis.sample_rate, SR);
}

#[test]
fn delayed_clicks_are_flagged() {
    let duration = 10.0;
    let times = click_times(duration, 0.25, 0.5, 0.15, |k| k % 4 == 3);
    let bytes = wav_bytes(&render_clicks(&times, duration), 1);
    let analysis = analyze(bytes, &wav_hint(), Some(120.0)).unwrap();

    // Every click should be found once, close to where it was placed.
    let beats = analysis.beats.times();
    assert_eq!(beats.len(), times.len(), "beats {:?}", beats);
    let offset = beats[0] - times[0];
    for (beat, click) in beats.iter().zip(&times) {
        assert!((beat - offset - click).abs() < 0.03, "{beat} vs {click}");
    }

    let delayed: Vec<usize> = (0..times.len()).filter(|k| k % 4 == 3).collect();
    assert!(!delayed.is_empty());
    assert_eq!(analysis.deviations.indices(), delayed.as_slice());
}

#[test]
fn clip_shorter_than_minimum_is_rejected() {
    let samples = vec![0.3f32; (0.2 * SR as f32) as usize];
    let err = analyze(wav_bytes(&samples, 1), &wav_hint(), Some(120.0)).unwrap_err();
    assert!(
        matches!(err, AnalysisError::InsufficientAudio { .. }),
        "{err:?}"
    );
}

#[test]
fn no_expected_tempo_means_no_deviations() {
    let duration = 8.0;
    let times = click_times(duration, 0.25, 0.5, 0.15, |k| k % 3 == 2);
    let bytes = wav_bytes(&render_clicks(&times, duration), 1);
    let analysis = analyze(bytes, &wav_hint(), None).unwrap();
    assert!(analysis.deviations.is_empty());
    assert!(find_deviations(analysis.beats.times(), None, 0.0).is_empty());
}

#[test]
fn identical_stereo_channels_match_mono() {
    let duration = 6.0;
    let samples = render_clicks(&click_times(duration, 0.25, 0.5, 0.0, |_| false), duration);
    let mono = analyze(wav_bytes(&samples, 1), &wav_hint(), Some(110.0)).unwrap();
    let stereo = analyze(wav_bytes(&samples, 2), &wav_hint(), Some(110.0)).unwrap();
    assert_eq!(mono, stereo);
}

#[test]
fn beats_are_ordered_spaced_and_inside_the_clip() {
    let pipeline = Pipeline::default();
    let floor = pipeline.config().beats.min_beat_gap_secs;
    for bpm in [72.0, 100.0, 135.0, 170.0] {
        let duration = 8.0;
        let analysis = pipeline
            .analyze(click_track_wav(bpm, duration), &wav_hint(), None)
            .unwrap();
        let times = analysis.beats.times();
        assert!(times.len() >= 2);
        for pair in times.windows(2) {
            assert!(pair[1] > pair[0]);
            assert!(pair[1] - pair[0] >= floor - 1e-6);
        }
        assert!(times.iter().all(|&t| (0.0..=duration).contains(&t)));
    }
}

#[test]
fn deviations_are_idempotent_and_skip_first_beat() {
    let analysis = analyze(click_track_wav(120.0, 6.0), &wav_hint(), None).unwrap();
    let beats = analysis.beats.times();
    let once = find_deviations(beats, Some(95.0), 0.1);
    let twice = find_deviations(beats, Some(95.0), 0.1);
    assert_eq!(once, twice);
    assert!(!once.contains(0));
    assert_eq!(once.len(), beats.len() - 1);
}

#[test]
fn silence_yields_no_clear_tempo() {
    let samples = vec![0.0f32; 3 * SR as usize];
    let err = analyze(wav_bytes(&samples, 1), &wav_hint(), None).unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::TempoEstimation(_) | AnalysisError::BeatTracking { .. }
    ));
    assert_eq!(err.user_message(), "Could not detect a clear tempo.");
}
