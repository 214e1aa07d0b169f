use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use wavecut::audio_io;
use wavecut::wave;

fn temp_dir(tag: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("wavecut_audio_io_{tag}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp test dir");
    dir
}

fn synth_stereo(sr: u32, secs: f32) -> Vec<Vec<f32>> {
    let frames = ((sr as f32) * secs).max(1.0) as usize;
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for i in 0..frames {
        let t = (i as f32) / (sr as f32);
        left.push((t * 220.0 * std::f32::consts::TAU).sin() * 0.30);
        right.push((t * 440.0 * std::f32::consts::TAU).sin() * 0.25);
    }
    vec![left, right]
}

#[test]
fn extension_filter_matches_decodable_formats() {
    assert!(audio_io::is_supported_extension("wav"));
    assert!(audio_io::is_supported_extension("WAV"));
    assert!(audio_io::is_supported_extension("mp3"));
    assert!(!audio_io::is_supported_extension("txt"));
    assert!(audio_io::is_supported_audio_path(std::path::Path::new(
        "x/y.ogg"
    )));
    assert!(!audio_io::is_supported_audio_path(std::path::Path::new(
        "x/y"
    )));
}

#[test]
fn wav_written_here_decodes_back() {
    let dir = temp_dir("roundtrip");
    let path = dir.join("tone.wav");
    let chans = synth_stereo(8000, 0.5);
    wave::export_channels_wav(&chans, 8000, &path).expect("export");

    let buf = audio_io::load_buffer(&path).expect("decode");
    assert_eq!(buf.sample_rate, 8000);
    assert_eq!(buf.channel_count(), 2);
    assert_eq!(buf.len(), 4000);
    // 16-bit quantization bounds the error
    assert_abs_diff_eq!(buf.channels[0][1000], chans[0][1000], epsilon = 1e-3);
    assert_abs_diff_eq!(buf.channels[1][1000], chans[1][1000], epsilon = 1e-3);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn in_memory_bytes_decode_with_extension_hint() {
    let dir = temp_dir("bytes");
    let path = dir.join("tone.wav");
    wave::export_channels_wav(&synth_stereo(8000, 0.25), 8000, &path).expect("export");
    let bytes = std::fs::read(&path).expect("read back");

    let buf = audio_io::load_bytes(bytes, Some("wav")).expect("decode bytes");
    assert_eq!(buf.len(), 2000);
    assert_eq!(buf.channel_count(), 2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unreadable_input_reports_a_decode_error() {
    let dir = temp_dir("garbage");
    let path = dir.join("noise.wav");
    std::fs::write(&path, b"this is not audio").expect("write garbage");

    let err = audio_io::load_buffer(&path).expect_err("must not decode");
    assert!(matches!(err, wavecut::EditError::Decode(_)));

    let _ = std::fs::remove_dir_all(&dir);
}
