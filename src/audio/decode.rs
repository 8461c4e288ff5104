use std::io::Cursor;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Container hint passed along with the encoded bytes.
#[derive(Clone, Debug, Default)]
pub struct SourceHint {
    pub mime_type: Option<String>,
    pub extension: Option<String>,
}

impl SourceHint {
    pub fn mime(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            extension: None,
        }
    }

    pub fn extension(extension: impl Into<String>) -> Self {
        Self {
            mime_type: None,
            extension: Some(extension.into()),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self {
            mime_type: None,
            extension: path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase()),
        }
    }

    fn to_probe_hint(&self) -> Hint {
        let mut hint = Hint::new();
        if let Some(ext) = &self.extension {
            hint.with_extension(ext);
        }
        if let Some(mime) = &self.mime_type {
            hint.mime_type(mime);
        }
        hint
    }
}

/// Mono samples in [-1, 1] at a fixed sample rate. Never empty.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(mut samples: Vec<f32>, sample_rate: u32) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::UnknownSampleRate);
        }
        if samples.is_empty() {
            return Err(DecodeError::NoAudio);
        }
        for s in samples.iter_mut() {
            *s = if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 };
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Average interleaved frames of `channels` samples into mono.
    pub fn from_interleaved(
        interleaved: &[f32],
        channels: usize,
        sample_rate: u32,
    ) -> Result<Self, DecodeError> {
        let channels = channels.max(1);
        let mono = if channels == 1 {
            interleaved.to_vec()
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };
        Self::new(mono, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Decode an in-memory audio payload into a mono [`SampleBuffer`].
///
/// Multi-channel audio is averaged sample-wise into one channel. This is
/// lossy: phase-cancelling content between channels disappears.
pub fn decode_bytes(bytes: Vec<u8>, hint: &SourceHint) -> Result<SampleBuffer, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let payload_len = bytes.len();
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint.to_probe_hint(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| match e {
            // The probe runs off the end of short payloads it cannot identify.
            SymphoniaError::IoError(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                DecodeError::Unsupported("no suitable format reader found".into())
            }
            other => other.into(),
        })?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudio)?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut mono: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet: {}", msg);
                skipped_packets += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);

        let mut pcm = PcmBuffer::<f32>::new(decoded.capacity() as u64, spec);
        pcm.copy_interleaved_ref(decoded);

        let samples = pcm.samples();
        if channels == 1 {
            mono.extend_from_slice(samples);
        } else {
            mono.extend(
                samples
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    let buffer = SampleBuffer::new(mono, sample_rate)?;

    log::info!(
        "Decoded audio: {} bytes -> {} samples, {}Hz, {:.2}s{}",
        payload_len,
        buffer.len(),
        sample_rate,
        buffer.duration(),
        if skipped_packets > 0 {
            format!(" ({} packets skipped)", skipped_packets)
        } else {
            String::new()
        }
    );

    Ok(buffer)
}

/// Run [`decode_bytes`] on a worker thread, giving up after `ceiling`.
///
/// The worker is detached on timeout; its result is dropped when it finishes.
pub fn decode_with_timeout(
    bytes: Vec<u8>,
    hint: SourceHint,
    ceiling: Duration,
) -> Result<SampleBuffer, DecodeError> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("beatcheck-decode".into())
        .spawn(move || {
            let _ = tx.send(decode_bytes(bytes, &hint));
        })?;

    match rx.recv_timeout(ceiling) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Decoding exceeded {:?}, abandoning", ceiling);
            Err(DecodeError::TimedOut(ceiling))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(DecodeError::Corrupt("decoder thread exited without a result".into()))
        }
    }
}

pub fn decode_file(path: &Path) -> Result<SampleBuffer, DecodeError> {
    let bytes = std::fs::read(path)?;
    decode_bytes(bytes, &SourceHint::from_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_rejected() {
        let err = decode_bytes(Vec::new(), &SourceHint::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Empty));
    }

    #[test]
    fn stereo_frames_are_averaged() {
        let buf = SampleBuffer::from_interleaved(&[0.5, 0.1, -0.2, -0.4], 2, 8000).unwrap();
        assert_eq!(buf.len(), 2);
        assert!((buf.samples()[0] - 0.3).abs() < 1e-6);
        assert!((buf.samples()[1] + 0.3).abs() < 1e-6);
    }

    #[test]
    fn samples_are_clamped_and_sanitised() {
        let buf = SampleBuffer::new(vec![1.5, -2.0, f32::NAN, 0.25], 100).unwrap();
        assert_eq!(buf.samples(), &[1.0, -1.0, 0.0, 0.25]);
        assert!((buf.duration() - 0.04).abs() < 1e-6);
    }

    #[test]
    fn buffer_invariants_are_enforced() {
        assert!(matches!(SampleBuffer::new(vec![], 44100), Err(DecodeError::NoAudio)));
        assert!(matches!(
            SampleBuffer::new(vec![0.0], 0),
            Err(DecodeError::UnknownSampleRate)
        ));
    }

    #[test]
    fn hint_from_path_lowercases_extension() {
        let hint = SourceHint::from_path(Path::new("take-3.WAV"));
        assert_eq!(hint.extension.as_deref(), Some("wav"));
        assert!(hint.mime_type.is_none());
    }
}
