use std::sync::Arc;

use approx::assert_abs_diff_eq;
use wavecut::audio::AudioBuffer;
use wavecut::wave;

fn ramp(frames: usize, sr: u32) -> Arc<AudioBuffer> {
    let mono: Vec<f32> = (0..frames).map(|i| i as f32 / frames as f32).collect();
    Arc::new(AudioBuffer::from_mono(mono, sr))
}

#[test]
fn trim_converts_seconds_to_sample_bounds() {
    let buf = ramp(1000, 1000); // 1s at 1kHz
    let t = wave::trim(&buf, 0.25, 0.75);
    assert_eq!(t.len(), 500);
    assert_abs_diff_eq!(t.channels[0][0], 0.25, epsilon = 1e-4);

    // out-of-range bounds clamp to the buffer
    let t = wave::trim(&buf, -5.0, 99.0);
    assert_eq!(t.len(), 1000);
}

#[test]
fn degenerate_trim_still_yields_one_frame() {
    let buf = ramp(1000, 1000);
    assert_eq!(wave::trim(&buf, 0.5, 0.5).len(), 1);
    assert_eq!(wave::trim(&buf, 2.0, 3.0).len(), 1);
    // reversed bounds are swapped rather than collapsed
    assert_eq!(wave::trim(&buf, 0.9, 0.2).len(), 700);
}

#[test]
fn merge_concatenates_and_upmixes_to_widest() {
    let mono = Arc::new(AudioBuffer::from_mono(vec![0.5; 100], 1000));
    let stereo = Arc::new(AudioBuffer::from_channels(
        vec![vec![0.1; 200], vec![0.2; 200]],
        1000,
    ));
    let out = wave::merge(&[mono, stereo]).unwrap();
    assert_eq!(out.channel_count(), 2);
    assert_eq!(out.len(), 300);
    // the mono source repeats its last channel into the extra lane
    assert_abs_diff_eq!(out.channels[1][50], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(out.channels[1][150], 0.2, epsilon = 1e-6);
}

#[test]
fn merge_resamples_to_the_first_buffer_rate() {
    let a = Arc::new(AudioBuffer::from_mono(vec![0.3; 1000], 1000));
    let b = Arc::new(AudioBuffer::from_mono(vec![0.3; 500], 500)); // also 1s long
    let out = wave::merge(&[a, b]).unwrap();
    assert_eq!(out.sample_rate, 1000);
    assert_abs_diff_eq!(out.duration(), 2.0, epsilon = 1e-2);
}

#[test]
fn merge_of_nothing_is_an_error() {
    assert!(matches!(
        wave::merge(&[]),
        Err(wavecut::EditError::EmptyInput)
    ));
}

#[test]
fn mix_pads_short_inputs_and_normalizes_only_when_clipping() {
    // 5s and 3s constant signals; the overlap sums to 0.9 (no clipping),
    // the trailing 2s carry the long input alone
    let a = Arc::new(AudioBuffer::from_mono(vec![0.5; 5000], 1000));
    let b = Arc::new(AudioBuffer::from_mono(vec![0.4; 3000], 1000));
    let out = wave::mix(&[a.clone(), b]).unwrap();
    assert_eq!(out.len(), 5000);
    assert_abs_diff_eq!(out.channels[0][1000], 0.9, epsilon = 1e-6);
    assert_abs_diff_eq!(out.channels[0][4000], 0.5, epsilon = 1e-6);

    // sums above 1.0 scale the whole channel by 1/peak
    let c = Arc::new(AudioBuffer::from_mono(vec![0.8; 3000], 1000));
    let out = wave::mix(&[a, c]).unwrap();
    let peak = wave::peak(&out.channels[0]);
    assert_abs_diff_eq!(peak, 1.0, epsilon = 1e-5);
    // the quiet tail is scaled by the same factor, not re-normalized
    assert_abs_diff_eq!(out.channels[0][4000], 0.5 / 1.3, epsilon = 1e-5);
}

#[test]
fn exported_wav_reads_back_with_same_shape() {
    let mut dir = std::env::temp_dir();
    dir.push(format!("wavecut_wave_ops_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    let dst = dir.join("ramp.wav");

    let buf = ramp(800, 8000);
    wave::export_buffer_wav(&buf, &dst).expect("export");

    let mut reader = hound::WavReader::open(&dst).expect("reopen");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 8000);
    let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), 800);
    assert_abs_diff_eq!(
        samples[400] as f32 / i16::MAX as f32,
        0.5,
        epsilon = 2e-3
    );

    let _ = std::fs::remove_dir_all(&dir);
}
