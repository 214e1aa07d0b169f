use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::{SharedAudio, Voice};

/// Monotonic playback clock in seconds. Production uses the engine's frame
/// counter; tests drive a `ManualClock`.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Clock derived from frames the audio callback has actually emitted.
pub struct EngineClock {
    shared: Arc<SharedAudio>,
}

impl EngineClock {
    pub fn new(shared: Arc<SharedAudio>) -> Self {
        Self { shared }
    }
}

impl Clock for EngineClock {
    fn now(&self) -> f64 {
        self.shared.clock_seconds()
    }
}

#[derive(Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, secs: f64) {
        self.bits.store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Playing,
    Paused,
}

/// Per-track transport. The logical playhead is never stored while playing;
/// it is reconstructed on demand from two anchors captured at play time:
/// `pos_at_start + (clock.now() - clock_at_start)`, clamped to the track.
pub struct TrackTransport {
    clock: Arc<dyn Clock>,
    duration: f32,
    state: TransportState,
    clock_at_start: f64,
    pos_at_start: f32,
    resting: f32,
    voice: Option<Arc<Voice>>,
}

impl TrackTransport {
    pub fn new(clock: Arc<dyn Clock>, duration: f32) -> Self {
        Self {
            clock,
            duration: duration.max(0.0),
            state: TransportState::Stopped,
            clock_at_start: 0.0,
            pos_at_start: 0.0,
            resting: 0.0,
            voice: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Adjust for a re-merged track; the resting playhead is clamped into
    /// the new extent.
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = duration.max(0.0);
        self.resting = self.resting.min(self.duration);
    }

    /// Start playing from the resting position. A transport that was left at
    /// the very end rewinds first. Any active voice from a previous play is
    /// halted before the new one is attached. Restarting while already
    /// playing cancels the previous run but keeps the position it reached.
    pub fn play(&mut self, voice: Option<Arc<Voice>>) {
        if self.state == TransportState::Playing {
            self.resting = self.position();
        }
        let from = if self.resting >= self.duration {
            0.0
        } else {
            self.resting
        };
        self.play_from(from, voice);
    }

    pub fn play_from(&mut self, offset: f32, voice: Option<Arc<Voice>>) {
        self.halt_voice();
        let offset = offset.clamp(0.0, self.duration);
        self.play_anchored(self.clock.now(), offset, voice);
    }

    /// Start with an externally supplied clock anchor. Multi-track playback
    /// shares one `clock_at_start` across tracks while each keeps its own
    /// start offset.
    pub fn play_anchored(&mut self, clock_at_start: f64, offset: f32, voice: Option<Arc<Voice>>) {
        self.halt_voice();
        self.clock_at_start = clock_at_start;
        self.pos_at_start = offset.clamp(0.0, self.duration);
        self.resting = self.pos_at_start;
        self.voice = voice;
        self.state = TransportState::Playing;
    }

    /// Logical playhead, derived lazily from the anchors.
    pub fn position(&self) -> f32 {
        match self.state {
            TransportState::Playing => {
                let elapsed = (self.clock.now() - self.clock_at_start) as f32;
                (self.pos_at_start + elapsed).clamp(0.0, self.duration)
            }
            _ => self.resting,
        }
    }

    /// Advance the state machine one display frame. Detects natural end of
    /// playback: the playhead clamps to the duration, the transport stops,
    /// and the resting position resets to zero so the next play replays from
    /// the start. (A user-initiated pause/stop preserves position instead.)
    pub fn tick(&mut self) -> f32 {
        if self.state != TransportState::Playing {
            return self.resting;
        }
        let pos = self.position();
        if pos >= self.duration {
            self.halt_voice();
            self.state = TransportState::Stopped;
            self.resting = 0.0;
            return self.duration;
        }
        pos
    }

    /// Pause, persisting the derived position as the new resting point.
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.resting = self.position();
            self.state = TransportState::Paused;
        }
        self.halt_voice();
    }

    /// Stop. Unlike a natural end this keeps the playhead where it was, so
    /// the next play resumes rather than replays.
    pub fn stop(&mut self) {
        if self.state == TransportState::Playing {
            self.resting = self.position();
        }
        self.state = TransportState::Stopped;
        self.halt_voice();
    }

    pub fn seek(&mut self, pos: f32) {
        let pos = pos.clamp(0.0, self.duration);
        if self.state == TransportState::Playing {
            // re-anchor in place
            self.clock_at_start = self.clock.now();
            self.pos_at_start = pos;
        }
        self.resting = pos;
    }

    fn halt_voice(&mut self) {
        if let Some(v) = self.voice.take() {
            v.halt();
        }
    }
}

/// Aggregate transport over a set of tracks. Tracks are not forced to a
/// common position: "play all" resumes each from wherever it was left, all
/// anchored to one shared start clock. The reported aggregate time is the
/// maximum of the per-track playheads, and the aggregate only ends once
/// every track has ended.
pub struct MultiTransport {
    clock: Arc<dyn Clock>,
    tracks: Vec<TrackTransport>,
}

impl MultiTransport {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tracks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn push_track(&mut self, duration: f32) {
        self.tracks
            .push(TrackTransport::new(self.clock.clone(), duration));
    }

    pub fn remove_track(&mut self, idx: usize) {
        if idx < self.tracks.len() {
            let mut t = self.tracks.remove(idx);
            t.stop();
        }
    }

    pub fn track(&self, idx: usize) -> Option<&TrackTransport> {
        self.tracks.get(idx)
    }

    pub fn track_mut(&mut self, idx: usize) -> Option<&mut TrackTransport> {
        self.tracks.get_mut(idx)
    }

    pub fn set_durations(&mut self, durations: &[f32]) {
        while self.tracks.len() < durations.len() {
            self.push_track(0.0);
        }
        self.tracks.truncate(durations.len());
        for (t, &d) in self.tracks.iter_mut().zip(durations.iter()) {
            t.set_duration(d);
        }
    }

    /// Start every track from its own resting position, sharing one clock
    /// anchor. Any previous playback (solo or aggregate) is torn down first;
    /// at most one playback mode is active at a time.
    pub fn play_all(&mut self, mut voices: Vec<Option<Arc<Voice>>>) {
        self.stop_all();
        voices.resize_with(self.tracks.len(), || None);
        let anchor = self.clock.now();
        for (track, voice) in self.tracks.iter_mut().zip(voices.into_iter()) {
            let from = if track.resting >= track.duration {
                0.0
            } else {
                track.resting
            };
            track.play_anchored(anchor, from, voice);
        }
    }

    /// Play a single track, stopping all others first.
    pub fn play_solo(&mut self, idx: usize, voice: Option<Arc<Voice>>) {
        self.stop_all();
        if let Some(track) = self.tracks.get_mut(idx) {
            track.play(voice);
        }
    }

    pub fn pause_all(&mut self) {
        for t in self.tracks.iter_mut() {
            t.pause();
        }
    }

    pub fn stop_all(&mut self) {
        for t in self.tracks.iter_mut() {
            t.stop();
        }
    }

    /// Advance every track one frame and report the aggregate playhead: the
    /// position of whichever track is furthest along.
    pub fn tick(&mut self) -> f32 {
        let mut max = 0.0f32;
        for t in self.tracks.iter_mut() {
            let p = t.tick();
            if p > max {
                max = p;
            }
        }
        max
    }

    /// Aggregate playhead without advancing state.
    pub fn current_time(&self) -> f32 {
        self.tracks
            .iter()
            .map(|t| t.position())
            .fold(0.0f32, f32::max)
    }

    pub fn any_playing(&self) -> bool {
        self.tracks.iter().any(|t| t.is_playing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioEngine;

    #[test]
    fn engine_clock_reads_the_frame_counter() {
        let engine = AudioEngine::new_for_test();
        let clock = EngineClock::new(engine.shared.clone());
        assert_eq!(clock.now(), 0.0);
        engine
            .shared
            .frames_written
            .store(48_000, Ordering::Relaxed);
        assert_eq!(clock.now(), 1.0);
    }
}
