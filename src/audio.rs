use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use atomic_float::AtomicF32;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

#[derive(Debug)]
pub struct AudioBuffer {
    pub channels: Vec<Vec<f32>>, // per-channel samples in [-1, 1]
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn from_mono(mono: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            channels: vec![mono],
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let channels = if channels.is_empty() {
            vec![Vec::new()]
        } else {
            channels
        };
        Self {
            channels,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Frame count (length of the first channel).
    pub fn len(&self) -> usize {
        self.channels.get(0).map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len().max(1)
    }

    pub fn duration(&self) -> f32 {
        self.len() as f32 / self.sample_rate as f32
    }
}

/// One playable source. At most one voice per track is registered with the
/// engine at a time; stopping a voice before starting a replacement is how
/// the single shared output resource stays consistent.
pub struct Voice {
    pub samples: Arc<AudioBuffer>,
    pub playing: AtomicBool,
    pub pos_f: AtomicF32, // fractional read position in source frames
    pub gain: AtomicF32,
}

impl Voice {
    pub fn new(samples: Arc<AudioBuffer>, start_frame: usize) -> Arc<Self> {
        let start = (start_frame.min(samples.len())) as f32;
        Arc::new(Self {
            samples,
            playing: AtomicBool::new(true),
            pos_f: AtomicF32::new(start),
            gain: AtomicF32::new(1.0),
        })
    }

    pub fn halt(&self) {
        self.playing.store(false, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }
}

pub struct SharedAudio {
    pub voices: ArcSwap<Vec<Arc<Voice>>>,
    pub vol: AtomicF32, // 0.0..1.0 linear gain
    pub frames_written: AtomicU64,
    #[allow(dead_code)]
    pub _out_channels: usize,
    pub out_sample_rate: u32,
}

impl SharedAudio {
    /// Audio clock in seconds, derived from frames the callback has emitted.
    pub fn clock_seconds(&self) -> f64 {
        self.frames_written.load(Ordering::Relaxed) as f64 / self.out_sample_rate.max(1) as f64
    }
}

pub struct AudioEngine {
    _stream: Option<cpal::Stream>,
    pub shared: Arc<SharedAudio>,
}

impl AudioEngine {
    fn new_shared(out_channels: usize, out_sample_rate: u32) -> Arc<SharedAudio> {
        Arc::new(SharedAudio {
            voices: ArcSwap::from_pointee(Vec::new()),
            vol: AtomicF32::new(1.0),
            frames_written: AtomicU64::new(0),
            _out_channels: out_channels,
            out_sample_rate,
        })
    }

    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .context("No default output device")?;
        let cfg = device
            .default_output_config()
            .context("No default output config")?;

        let shared = Self::new_shared(cfg.channels() as usize, cfg.sample_rate());

        let stream = match cfg.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &cfg.into(), shared.clone())?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &cfg.into(), shared.clone())?
            }
            _ => anyhow::bail!("Unsupported sample format"),
        };

        Ok(Self {
            _stream: Some(stream),
            shared,
        })
    }

    pub fn new_for_test() -> Self {
        let shared = Self::new_shared(2, 48_000);
        Self {
            _stream: None,
            shared,
        }
    }

    fn build_stream<T>(
        device: &cpal::Device,
        cfg: &cpal::StreamConfig,
        shared: Arc<SharedAudio>,
    ) -> Result<cpal::Stream>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let channels = cfg.channels as usize;
        let out_sr = shared.out_sample_rate.max(1);
        let err_fn = |e| log::warn!("cpal stream error: {e}");
        let stream = device.build_output_stream(
            cfg,
            move |data: &mut [T], _| {
                let voices = shared.voices.load();
                let vol = shared.vol.load(Ordering::Relaxed);
                let mut acc = [0.0f32; 32];
                let acc = &mut acc[..channels.min(32)];
                for frame in data.chunks_mut(channels) {
                    acc.fill(0.0);
                    for voice in voices.iter() {
                        if !voice.playing.load(Ordering::Relaxed) {
                            continue;
                        }
                        let samples = voice.samples.as_ref();
                        let len = samples.len();
                        if len == 0 {
                            voice.playing.store(false, Ordering::Relaxed);
                            continue;
                        }
                        let mut pos_f = voice.pos_f.load(Ordering::Relaxed);
                        if !pos_f.is_finite() || pos_f < 0.0 {
                            pos_f = 0.0;
                        }
                        if pos_f.floor() as usize >= len {
                            voice.playing.store(false, Ordering::Relaxed);
                            continue;
                        }
                        let src_channels = samples.channel_count();
                        let gain = voice.gain.load(Ordering::Relaxed);
                        // fractional sample accessor (per channel)
                        let sample_at = |ch_idx: usize, pf: f32| -> f32 {
                            let channel = samples
                                .channels
                                .get(ch_idx)
                                .unwrap_or_else(|| &samples.channels[0]);
                            if channel.is_empty() {
                                return 0.0;
                            }
                            let i0 = pf.floor() as usize;
                            let i1 = (i0 + 1).min(channel.len().saturating_sub(1));
                            let i0 = i0.min(channel.len().saturating_sub(1));
                            let t = (pf - i0 as f32).clamp(0.0, 1.0);
                            channel[i0] * (1.0 - t) + channel[i1] * t
                        };
                        for (out_ch, slot) in acc.iter_mut().enumerate() {
                            let src_ch = if src_channels == 1 {
                                0
                            } else if out_ch < src_channels {
                                out_ch
                            } else {
                                src_channels - 1
                            };
                            *slot += sample_at(src_ch, pos_f) * gain;
                        }
                        // advance at the source's own rate
                        let step = samples.sample_rate as f32 / out_sr as f32;
                        voice.pos_f.store(pos_f + step, Ordering::Relaxed);
                    }
                    write_frame(frame, acc, vol);
                }
                let frames = (data.len() / channels.max(1)) as u64;
                shared.frames_written.fetch_add(frames, Ordering::Relaxed);
            },
            err_fn,
            None,
        )?;
        stream.play()?;
        Ok(stream)
    }

    /// Replace the active voice set. The previous voices are halted first so
    /// the callback never sums a stale source alongside its replacement.
    pub fn set_voices(&self, voices: Vec<Arc<Voice>>) {
        let old = self.shared.voices.swap(Arc::new(voices));
        for v in old.iter() {
            v.halt();
        }
    }

    pub fn clear_voices(&self) {
        self.set_voices(Vec::new());
    }

    pub fn set_volume(&self, v: f32) {
        self.shared.vol.store(v.clamp(0.0, 1.0), Ordering::Relaxed);
    }
}

/// Write one mixed frame to the device buffer. Every output channel is
/// written: channels beyond the accumulator's width get silence, since cpal
/// does not guarantee zeroed output buffers.
fn write_frame<T>(frame: &mut [T], acc: &[f32], vol: f32)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    for (ch, out_sample) in frame.iter_mut().enumerate() {
        let v = acc.get(ch).copied().unwrap_or(0.0);
        *out_sample = T::from_sample((v * vol).clamp(-1.0, 1.0));
    }
}
