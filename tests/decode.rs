mod common;

use std::time::Duration;

use beatcheck::{decode_bytes, decode_file, decode_with_timeout, DecodeError, SourceHint};
use common::*;

#[test]
fn wav_is_decoded_to_mono() {
    let samples = render_clicks(&[0.1, 0.6], 1.0);
    let buffer = decode_bytes(wav_bytes(&samples, 2), &SourceHint::extension("wav")).unwrap();
    assert_eq!(buffer.sample_rate(), SR);
    assert_eq!(buffer.len(), samples.len());
    assert!((buffer.duration() - 1.0).abs() < 1e-3);
    assert!(buffer.samples().iter().all(|s| (-1.0..=1.0).contains(s)));
}

#[test]
fn format_is_probed_without_a_hint() {
    let samples = render_clicks(&[0.1], 0.5);
    let buffer = decode_bytes(wav_bytes(&samples, 1), &SourceHint::default()).unwrap();
    assert_eq!(buffer.len(), samples.len());
}

#[test]
fn garbage_is_not_audio() {
    let bytes = b"definitely not a riff header, just text".repeat(20);
    let err = decode_bytes(bytes, &SourceHint::mime("audio/wav")).unwrap_err();
    assert!(
        matches!(err, DecodeError::Unsupported(_) | DecodeError::Corrupt(_)),
        "{err:?}"
    );
}

#[test]
fn empty_payload_is_rejected() {
    let err = decode_bytes(Vec::new(), &SourceHint::extension("mp3")).unwrap_err();
    assert!(matches!(err, DecodeError::Empty));
}

#[test]
fn wav_without_samples_has_no_audio() {
    let bytes = wav_bytes(&[], 1);
    let err = decode_bytes(bytes, &SourceHint::extension("wav")).unwrap_err();
    assert!(
        matches!(
            err,
            DecodeError::NoAudio | DecodeError::Corrupt(_) | DecodeError::Unsupported(_)
        ),
        "{err:?}"
    );
}

#[test]
fn timeout_wrapper_passes_results_through() {
    let samples = render_clicks(&[0.1], 0.5);
    let buffer = decode_with_timeout(
        wav_bytes(&samples, 1),
        SourceHint::extension("wav"),
        Duration::from_secs(30),
    )
    .unwrap();
    assert_eq!(buffer.len(), samples.len());

    let err = decode_with_timeout(Vec::new(), SourceHint::default(), Duration::from_secs(30))
        .unwrap_err();
    assert!(matches!(err, DecodeError::Empty));
}

#[test]
fn files_are_read_with_extension_hint() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("take.WAV");
    std::fs::write(&path, wav_bytes(&render_clicks(&[0.2], 0.5), 1)).unwrap();
    let buffer = decode_file(&path).unwrap();
    assert_eq!(buffer.sample_rate(), SR);

    let missing = decode_file(&dir.path().join("missing.wav")).unwrap_err();
    assert!(matches!(missing, DecodeError::Io(_)));
}

#[test]
fn slow_decode_times_out() {
    let samples = render_clicks(&click_times(5.0, 0.25, 0.5, 0.0, |_| false), 5.0);
    let err = decode_with_timeout(
        wav_bytes(&samples, 2),
        SourceHint::extension("wav"),
        Duration::ZERO,
    )
    .unwrap_err();
    assert!(matches!(err, DecodeError::TimedOut(d) if d == Duration::ZERO), "{err:?}");
}
