use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::audio::AudioBuffer;
use crate::error::EditError;

/// Extract `[start_s, end_s)` seconds from a buffer, clamped to its extent.
/// The result always holds at least one frame, even for a degenerate request;
/// downstream duration math divides by segment lengths and an empty buffer
/// would poison it.
pub fn trim(buf: &AudioBuffer, start_s: f32, end_s: f32) -> AudioBuffer {
    let sr = buf.sample_rate.max(1);
    let len = buf.len();
    if len == 0 {
        return AudioBuffer::from_channels(vec![vec![0.0]; buf.channel_count()], sr);
    }
    let dur = buf.duration();
    let start_s = start_s.clamp(0.0, dur);
    let end_s = end_s.clamp(0.0, dur);
    let mut s = (start_s * sr as f32).floor() as usize;
    let mut e = (end_s * sr as f32).floor() as usize;
    if e < s {
        std::mem::swap(&mut s, &mut e);
    }
    let s = s.min(len.saturating_sub(1));
    let e = e.clamp(s + 1, len);
    let channels = buf.channels.iter().map(|ch| ch[s..e].to_vec()).collect();
    AudioBuffer::from_channels(channels, sr)
}

/// Concatenate buffers in order. The result's channel count is the max across
/// inputs; a buffer with fewer channels contributes its last channel to the
/// extra ones (mono material upmixes by repetition). Inputs at a different
/// sample rate than the first are resampled to match before concatenation.
pub fn merge(buffers: &[Arc<AudioBuffer>]) -> Result<AudioBuffer, EditError> {
    let first = buffers.first().ok_or(EditError::EmptyInput)?;
    let out_sr = first.sample_rate.max(1);
    let out_channels = buffers.iter().map(|b| b.channel_count()).max().unwrap_or(1);
    let total: usize = buffers
        .iter()
        .map(|b| frames_at_rate(b.len(), b.sample_rate, out_sr))
        .sum();
    let mut channels: Vec<Vec<f32>> = vec![Vec::with_capacity(total); out_channels];
    for buf in buffers {
        for (ci, out_ch) in channels.iter_mut().enumerate() {
            let src = source_channel(buf, ci);
            if buf.sample_rate == out_sr {
                out_ch.extend_from_slice(src);
            } else {
                out_ch.extend(resample_linear(src, buf.sample_rate, out_sr));
            }
        }
    }
    Ok(AudioBuffer::from_channels(channels, out_sr))
}

/// Sum buffers sample-for-sample, aligned at time zero. The result spans the
/// longest input (shorter inputs are zero past their end). If any summed
/// sample exceeds +/-1.0 the whole channel is scaled by 1/peak, so relative
/// dynamics within a channel survive the reduction.
pub fn mix(buffers: &[Arc<AudioBuffer>]) -> Result<AudioBuffer, EditError> {
    if buffers.is_empty() {
        return Err(EditError::EmptyInput);
    }
    let out_sr = buffers.iter().map(|b| b.sample_rate).max().unwrap_or(1).max(1);
    let out_channels = buffers.iter().map(|b| b.channel_count()).max().unwrap_or(1);
    let out_len = buffers
        .iter()
        .map(|b| frames_at_rate(b.len(), b.sample_rate, out_sr))
        .max()
        .unwrap_or(0);
    let mut channels: Vec<Vec<f32>> = vec![vec![0.0; out_len]; out_channels];
    for buf in buffers {
        for (ci, out_ch) in channels.iter_mut().enumerate() {
            let src = source_channel(buf, ci);
            if buf.sample_rate == out_sr {
                for (dst, &v) in out_ch.iter_mut().zip(src.iter()) {
                    *dst += v;
                }
            } else {
                let resampled = resample_linear(src, buf.sample_rate, out_sr);
                for (dst, &v) in out_ch.iter_mut().zip(resampled.iter()) {
                    *dst += v;
                }
            }
        }
    }
    for ch in channels.iter_mut() {
        let pk = peak(ch);
        if pk > 1.0 {
            let g = 1.0 / pk;
            for v in ch.iter_mut() {
                *v *= g;
            }
        }
    }
    Ok(AudioBuffer::from_channels(channels, out_sr))
}

pub fn peak(samples: &[f32]) -> f32 {
    let mut pk = 0.0f32;
    for &v in samples {
        let a = v.abs();
        if a > pk {
            pk = a;
        }
    }
    pk
}

fn source_channel(buf: &AudioBuffer, ci: usize) -> &[f32] {
    // channels beyond the source's count repeat its last channel
    let idx = ci.min(buf.channel_count().saturating_sub(1));
    buf.channels.get(idx).map(|c| c.as_slice()).unwrap_or(&[])
}

fn frames_at_rate(len: usize, in_sr: u32, out_sr: u32) -> usize {
    if in_sr == out_sr || in_sr == 0 {
        return len;
    }
    ((len as f64) * (out_sr as f64) / (in_sr as f64)).ceil() as usize
}

pub fn resample_linear(mono: &[f32], in_sr: u32, out_sr: u32) -> Vec<f32> {
    if in_sr == out_sr || mono.is_empty() {
        return mono.to_vec();
    }
    if in_sr == 0 || out_sr == 0 {
        return mono.to_vec();
    }
    let ratio = out_sr as f64 / in_sr as f64;
    let out_len = ((mono.len() as f64) * ratio).ceil() as usize;
    if out_len == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(out_len);
    let len = mono.len();
    for i in 0..out_len {
        let src_pos = (i as f64) / ratio;
        let i0 = src_pos.floor() as usize;
        if i0 >= len {
            out.push(mono[len - 1]);
            continue;
        }
        let i1 = (i0 + 1).min(len.saturating_sub(1));
        let t = (src_pos - i0 as f64).clamp(0.0, 1.0) as f32;
        out.push(mono[i0] * (1.0 - t) + mono[i1] * t);
    }
    out
}

/// Min/max amplitude bins for waveform rendering.
pub fn build_minmax(out: &mut Vec<(f32, f32)>, samples: &[f32], bins: usize) {
    out.clear();
    if samples.is_empty() || bins == 0 {
        return;
    }
    let len = samples.len();
    let step = (len as f32 / bins as f32).max(1.0);
    let mut pos = 0.0f32;
    for _ in 0..bins {
        let start = pos as usize;
        let end = ((pos + step) as usize).min(len);
        if start >= end {
            out.push((0.0, 0.0));
        } else {
            let (mut mn, mut mx) = (f32::INFINITY, f32::NEG_INFINITY);
            for &v in &samples[start..end] {
                if v < mn {
                    mn = v;
                }
                if v > mx {
                    mx = v;
                }
            }
            if !mn.is_finite() || !mx.is_finite() {
                out.push((0.0, 0.0));
            } else {
                out.push((mn, mx));
            }
        }
        pos += step;
        if (pos as usize) >= len {
            break;
        }
    }
}

/// Write a merged buffer out as 16-bit PCM WAV.
pub fn export_channels_wav(chans: &[Vec<f32>], sample_rate: u32, dst: &Path) -> Result<()> {
    let ch = chans.len().max(1) as u16;
    let frames = chans.get(0).map(|c| c.len()).unwrap_or(0);
    let mut writer = hound::WavWriter::create(
        dst,
        hound::WavSpec {
            channels: ch,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
    )?;
    for i in 0..frames {
        for ci in 0..(ch as usize) {
            let v = chans
                .get(ci)
                .and_then(|c| c.get(i))
                .copied()
                .unwrap_or(0.0)
                .clamp(-1.0, 1.0);
            writer.write_sample::<i16>((v * i16::MAX as f32) as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

pub fn export_buffer_wav(buf: &AudioBuffer, dst: &Path) -> Result<()> {
    export_channels_wav(&buf.channels, buf.sample_rate, dst)
}
