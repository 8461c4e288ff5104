#![allow(dead_code)]

use std::io::Cursor;

pub const SR: u32 = 44100;

/// Click onsets at `period` seconds, starting at `start`, stopping short of
/// the clip end. `extra_delay` is inserted before every click whose index
/// satisfies `delayed`, shifting the rest of the track with it.
pub fn click_times(
    duration: f32,
    start: f32,
    period: f32,
    extra_delay: f32,
    delayed: impl Fn(usize) -> bool,
) -> Vec<f32> {
    let mut times = Vec::new();
    let mut t = start;
    let mut k = 0;
    loop {
        if delayed(k) {
            t += extra_delay;
        }
        if t > duration - 0.3 {
            break;
        }
        times.push(t);
        t += period;
        k += 1;
    }
    times
}

/// Mono samples with a short decaying 1 kHz burst at each of `times`.
pub fn render_clicks(times: &[f32], duration: f32) -> Vec<f32> {
    let mut samples = vec![0.0f32; (duration * SR as f32) as usize];
    let burst = (0.03 * SR as f32) as usize;
    for &t in times {
        let start = (t * SR as f32).round() as usize;
        for (i, s) in samples.iter_mut().skip(start).take(burst).enumerate() {
            let phase = 2.0 * std::f32::consts::PI * 1000.0 * i as f32 / SR as f32;
            *s = 0.8 * phase.sin() * (-(i as f32) / (0.005 * SR as f32)).exp();
        }
    }
    samples
}

/// 16-bit PCM WAV in memory; every channel carries the same signal.
pub fn wav_bytes(samples: &[f32], channels: u16) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: SR,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    bytes
}

pub fn click_track_wav(bpm: f32, duration: f32) -> Vec<u8> {
    let times = click_times(duration, 0.25, 60.0 / bpm, 0.0, |_| false);
    wav_bytes(&render_clicks(&times, duration), 1)
}
