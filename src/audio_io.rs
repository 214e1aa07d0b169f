use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::audio::AudioBuffer;
use crate::error::EditError;

pub const SUPPORTED_EXTS: &[&str] = &["wav", "mp3", "m4a", "ogg"];

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTS.iter().any(|e| ext.eq_ignore_ascii_case(e))
}

pub fn is_supported_audio_path(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(is_supported_extension)
        .unwrap_or(false)
}

/// Decode a file into a multi-channel buffer at its native sample rate.
/// Unsupported or corrupt input surfaces as `EditError::Decode`.
pub fn load_buffer(path: &Path) -> Result<Arc<AudioBuffer>, EditError> {
    let (chans, sample_rate) =
        decode_audio_multi(path).map_err(|e| EditError::Decode(format!("{e:#}")))?;
    Ok(Arc::new(AudioBuffer::from_channels(chans, sample_rate)))
}

/// Decode raw bytes (e.g. a dropped file still in memory). The extension
/// hint, when present, is tried first; on probe failure the bytes are probed
/// again without it.
pub fn load_bytes(bytes: Vec<u8>, ext_hint: Option<&str>) -> Result<Arc<AudioBuffer>, EditError> {
    let (chans, sample_rate) =
        decode_bytes_multi(bytes, ext_hint).map_err(|e| EditError::Decode(format!("{e:#}")))?;
    Ok(Arc::new(AudioBuffer::from_channels(chans, sample_rate)))
}

type OpenedDecoder = (
    Box<dyn symphonia::core::formats::FormatReader>,
    Box<dyn symphonia::core::codecs::Decoder>,
    u32,
    u32,
);

fn open_decoder(path: &Path) -> Result<OpenedDecoder> {
    let ext_hint = path.extension().and_then(|s| s.to_str());
    let probe_once = |hint_ext: Option<&str>| -> Result<_> {
        let file = File::open(path).with_context(|| format!("open audio: {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        probe_stream(mss, hint_ext)
    };
    let probed = match probe_once(ext_hint) {
        Ok(v) => v,
        Err(first_err) => {
            if ext_hint.is_some() {
                probe_once(None).with_context(|| {
                    format!(
                        "open decoder probe failed with and without hint: {}",
                        path.display()
                    )
                })?
            } else {
                return Err(first_err);
            }
        }
    };
    make_decoder(probed)
}

fn open_decoder_bytes(bytes: Vec<u8>, ext_hint: Option<&str>) -> Result<OpenedDecoder> {
    let probed = {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.clone())), Default::default());
        match probe_stream(mss, ext_hint) {
            Ok(v) => v,
            Err(first_err) => {
                if ext_hint.is_some() {
                    let mss =
                        MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
                    probe_stream(mss, None)
                        .context("probe bytes failed with and without hint")
                        .map_err(|_| first_err)?
                } else {
                    return Err(first_err);
                }
            }
        }
    };
    make_decoder(probed)
}

fn probe_stream(
    mss: MediaSourceStream,
    hint_ext: Option<&str>,
) -> Result<symphonia::core::probe::ProbeResult> {
    let mut hint = Hint::new();
    if let Some(ext) = hint_ext {
        hint.with_extension(ext);
    }
    get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(Into::into)
}

fn make_decoder(probed: symphonia::core::probe::ProbeResult) -> Result<OpenedDecoder> {
    let format = probed.format;
    let track = format.default_track().context("no default track")?.clone();
    let decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let sample_rate_hint = track.codec_params.sample_rate.unwrap_or(0);
    Ok((format, decoder, track.id, sample_rate_hint))
}

pub fn decode_audio_multi(path: &Path) -> Result<(Vec<Vec<f32>>, u32)> {
    let opened = open_decoder(path)?;
    drain_decoder(opened)
}

pub fn decode_bytes_multi(bytes: Vec<u8>, ext_hint: Option<&str>) -> Result<(Vec<Vec<f32>>, u32)> {
    let opened = open_decoder_bytes(bytes, ext_hint)?;
    drain_decoder(opened)
}

fn drain_decoder(opened: OpenedDecoder) -> Result<(Vec<Vec<f32>>, u32)> {
    let (mut format, mut decoder, track_id, mut sample_rate) = opened;
    let mut chans: Vec<Vec<f32>> = Vec::new();
    let mut decode_errors = 0u32;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::DecodeError(_)) => {
                decode_errors = decode_errors.saturating_add(1);
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(err.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => {
                decode_errors += 1;
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err.into()),
        };
        if sample_rate == 0 {
            sample_rate = decoded.spec().rate;
        }
        let channels = decoded.spec().channels.count().max(1);
        if chans.is_empty() {
            chans = vec![Vec::new(); channels];
        }
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        for frame in buf.samples().chunks(channels) {
            for (ci, &v) in frame.iter().enumerate() {
                if let Some(chan) = chans.get_mut(ci) {
                    chan.push(v);
                }
            }
        }
    }
    if sample_rate == 0 {
        anyhow::bail!("unknown sample rate");
    }
    if chans.iter().all(|c| c.is_empty()) {
        anyhow::bail!("no decodable audio frames");
    }
    if decode_errors > 0 {
        log::debug!("decode finished with {decode_errors} recoverable packet errors");
    }
    Ok((chans, sample_rate))
}
