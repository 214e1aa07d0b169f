use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{AudioBuffer, AudioEngine, Voice};
use crate::coalesce::{Debouncer, Throttle};
use crate::error::EditError;
use crate::history::{EditHistory, DEFAULT_HISTORY_CAP};
use crate::segment::{self, Segment, SegmentEdge};
use crate::transport::{Clock, MultiTransport, TrackTransport};
use crate::wave;

#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub history_cap: usize,
    /// Quiet period before a segment-list change triggers the expensive
    /// re-merge / re-mix.
    pub remerge_debounce: Duration,
    /// Minimum spacing between accepted resize-drag updates.
    pub resize_throttle: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            remerge_debounce: Duration::from_millis(300),
            resize_throttle: Duration::from_millis(50),
        }
    }
}

/// Full editable state of the cutter, as pushed onto history. Selection is
/// deliberately not part of this: highlighting a segment is ephemeral UI
/// state and must not generate undo steps.
#[derive(Clone)]
pub struct ClipSnapshot {
    pub segments: Vec<Segment>,
    pub zoom: f32,
}

/// Single-track cutter. One ordered segment list over one source file;
/// cut/delete/resize transform the list, the merged buffer is re-derived
/// debounced, and every committed mutation pushes a history snapshot.
pub struct ClipEditor {
    cfg: EditorConfig,
    segments: Vec<Segment>,
    merged: Arc<AudioBuffer>,
    zoom: f32,
    history: EditHistory<ClipSnapshot>,
    selected: Option<u64>,
    remerge: Debouncer<()>,
    resize_throttle: Throttle,
    drag_dirty: bool,
    transport: TrackTransport,
    waveform_cache: HashMap<(usize, usize), Arc<Vec<(f32, f32)>>>,
}

impl ClipEditor {
    pub fn new(buffer: Arc<AudioBuffer>, clock: Arc<dyn Clock>, cfg: EditorConfig) -> Self {
        let segments = vec![Segment::from_buffer(buffer.clone())];
        let duration = segment::total_duration(&segments);
        let history = EditHistory::new(
            ClipSnapshot {
                segments: segments.clone(),
                zoom: 1.0,
            },
            cfg.history_cap,
        );
        let remerge = Debouncer::new(cfg.remerge_debounce);
        let resize_throttle = Throttle::new(cfg.resize_throttle);
        Self {
            cfg,
            segments,
            merged: buffer,
            zoom: 1.0,
            history,
            selected: None,
            remerge,
            resize_throttle,
            drag_dirty: false,
            transport: TrackTransport::new(clock, duration),
            waveform_cache: HashMap::new(),
        }
    }

    /// Swap in a newly loaded file. History restarts from scratch; undo
    /// entries for a different source are meaningless.
    pub fn load(&mut self, buffer: Arc<AudioBuffer>) {
        self.transport.stop();
        self.segments = vec![Segment::from_buffer(buffer.clone())];
        self.merged = buffer;
        self.zoom = 1.0;
        self.selected = None;
        self.waveform_cache.clear();
        let _ = self.remerge.flush();
        self.transport
            .set_duration(segment::total_duration(&self.segments));
        self.history.reset(self.snapshot());
    }

    pub fn config(&self) -> &EditorConfig {
        &self.cfg
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn merged(&self) -> &Arc<AudioBuffer> {
        &self.merged
    }

    pub fn duration(&self) -> f32 {
        segment::total_duration(&self.segments)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom.clamp(0.125, 64.0);
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    /// Ephemeral selection; never recorded in history.
    pub fn select(&mut self, id: Option<u64>) {
        self.selected = id.filter(|id| self.segments.iter().any(|s| s.id == *id));
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn snapshot(&self) -> ClipSnapshot {
        ClipSnapshot {
            segments: self.segments.clone(),
            zoom: self.zoom,
        }
    }

    /// Split the segment containing `t`. Returns false when the cut falls on
    /// an existing boundary or outside the track (a no-op, not an error).
    pub fn cut_at(&mut self, t: f32, now: Instant) -> bool {
        match segment::cut_at(&self.segments, t) {
            Some(list) => {
                self.commit(list, now);
                true
            }
            None => false,
        }
    }

    /// Remove a segment. Deleting the last remaining segment is rejected;
    /// a cutter must always keep at least one.
    pub fn delete(&mut self, id: u64, now: Instant) -> Result<(), EditError> {
        let list = segment::delete(&self.segments, id)?;
        self.commit(list, now);
        Ok(())
    }

    pub fn delete_selected(&mut self, now: Instant) -> Result<(), EditError> {
        let id = self.selected.ok_or(EditError::InvalidRange)?;
        self.delete(id, now)
    }

    /// Discrete resize: apply and push one history entry.
    pub fn resize_edge(
        &mut self,
        id: u64,
        edge: SegmentEdge,
        target: f32,
        now: Instant,
    ) -> Result<(), EditError> {
        let list = segment::resize_edge(&self.segments, id, edge, target)?;
        self.commit(list, now);
        Ok(())
    }

    /// Pointer-driven resize: throttled, applied without a history push so a
    /// drag does not spray intermediate undo steps. Returns false when the
    /// update was dropped by the throttle. Call `finish_resize_drag` on
    /// release to record the final state.
    pub fn resize_drag(
        &mut self,
        id: u64,
        edge: SegmentEdge,
        target: f32,
        now: Instant,
    ) -> Result<bool, EditError> {
        if !self.resize_throttle.ready(now) {
            return Ok(false);
        }
        let mut list = segment::resize_edge(&self.segments, id, edge, target)?;
        segment::retile(&mut list);
        self.segments = list;
        self.drag_dirty = true;
        self.transport
            .set_duration(segment::total_duration(&self.segments));
        self.remerge.submit((), now);
        Ok(true)
    }

    /// Record the final drag state as one history entry. A release with no
    /// accepted update in between pushes nothing.
    pub fn finish_resize_drag(&mut self, now: Instant) {
        if !self.drag_dirty {
            return;
        }
        self.drag_dirty = false;
        self.history.push(self.snapshot());
        self.remerge.submit((), now);
    }

    /// Commit a fully computed segment list: retile, replace, snapshot,
    /// schedule the re-merge. Nothing here can fail half-way; the list was
    /// built before any state changed.
    fn commit(&mut self, mut list: Vec<Segment>, now: Instant) {
        segment::retile(&mut list);
        self.segments = list;
        if let Some(sel) = self.selected {
            if !self.segments.iter().any(|s| s.id == sel) {
                self.selected = None;
            }
        }
        self.transport
            .set_duration(segment::total_duration(&self.segments));
        self.history.push(self.snapshot());
        self.remerge.submit((), now);
    }

    pub fn undo(&mut self, now: Instant) -> bool {
        let Some(snap) = self.history.undo() else {
            return false;
        };
        let snap = snap.clone();
        self.restore(snap, now);
        true
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        let Some(snap) = self.history.redo() else {
            return false;
        };
        let snap = snap.clone();
        self.restore(snap, now);
        true
    }

    fn restore(&mut self, snap: ClipSnapshot, now: Instant) {
        self.segments = snap.segments;
        self.zoom = snap.zoom;
        if let Some(sel) = self.selected {
            if !self.segments.iter().any(|s| s.id == sel) {
                self.selected = None;
            }
        }
        self.transport
            .set_duration(segment::total_duration(&self.segments));
        self.remerge.submit((), now);
    }

    /// Drive pending debounced work. Returns true when a re-merge ran (the
    /// host should refresh waveforms).
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.remerge.poll(now).is_some() {
            self.do_remerge();
            return true;
        }
        false
    }

    /// Force any pending re-merge through immediately (before play/export).
    pub fn flush(&mut self) {
        if self.remerge.flush().is_some() {
            self.do_remerge();
        }
    }

    fn do_remerge(&mut self) {
        match wave::merge(&segment::buffers(&self.segments)) {
            Ok(buf) => {
                self.merged = Arc::new(buf);
                self.waveform_cache.clear();
                self.transport.set_duration(self.merged.duration());
            }
            Err(e) => {
                // keep the previous merged buffer; the segment list itself
                // is already committed and consistent
                log::warn!("re-merge failed: {e}");
            }
        }
    }

    /// Mono min/max bins for the waveform renderer, memoized per merged
    /// buffer + bin count. Entries die with the buffer they describe.
    pub fn waveform(&mut self, bins: usize) -> Arc<Vec<(f32, f32)>> {
        let key = (Arc::as_ptr(&self.merged) as usize, bins);
        if let Some(hit) = self.waveform_cache.get(&key) {
            return hit.clone();
        }
        let mono = mono_mixdown(&self.merged);
        let mut out = Vec::new();
        wave::build_minmax(&mut out, &mono, bins);
        let out = Arc::new(out);
        self.waveform_cache.insert(key, out.clone());
        out
    }

    pub fn export_wav(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        self.flush();
        wave::export_buffer_wav(&self.merged, path)
    }

    /// Start playback from the resting playhead. With no engine attached the
    /// transport still runs logically (tests, headless hosts). Engine-side
    /// failures must not crash the editor; playback just does not start.
    pub fn play(&mut self, engine: Option<&AudioEngine>) {
        self.flush();
        let voice = engine.map(|e| {
            // same rewind rule as the transport: resting at the end replays
            let resting = self.transport.position();
            let from = if resting >= self.transport.duration() {
                0.0
            } else {
                resting
            };
            let start = (from * self.merged.sample_rate as f32) as usize;
            let v = Voice::new(self.merged.clone(), start);
            e.set_voices(vec![v.clone()]);
            v
        });
        self.transport.play(voice);
    }

    pub fn pause(&mut self) {
        self.transport.pause();
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    pub fn seek(&mut self, pos: f32) {
        self.transport.seek(pos);
    }

    pub fn playhead(&mut self) -> f32 {
        self.transport.tick()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }
}

fn mono_mixdown(buf: &AudioBuffer) -> Vec<f32> {
    let len = buf.len();
    let chn = buf.channel_count() as f32;
    let mut mono = vec![0.0f32; len];
    for ch in &buf.channels {
        for (dst, &v) in mono.iter_mut().zip(ch.iter()) {
            *dst += v;
        }
    }
    for v in &mut mono {
        *v /= chn;
    }
    mono
}

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// A named sequence of segments plus its derived merged buffer. The buffer
/// is always the concatenation of the segments in order; it is recomputed
/// after every segment mutation, never edited directly.
#[derive(Clone)]
pub struct Track {
    pub id: u64,
    pub name: String,
    pub buffer: Arc<AudioBuffer>,
    pub duration: f32,
    pub segments: Vec<Segment>,
}

impl Track {
    pub fn from_buffer(name: impl Into<String>, buffer: Arc<AudioBuffer>) -> Self {
        let segments = vec![Segment::from_buffer(buffer.clone())];
        Self {
            id: NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            duration: buffer.duration(),
            buffer,
            segments,
        }
    }

    /// Rebuild this track from an already-retiled segment list. Built fully
    /// before being swapped in so a failed merge leaves the old track alone.
    fn rebuilt(&self, segments: Vec<Segment>) -> Result<Track, EditError> {
        let merged = wave::merge(&segment::buffers(&segments))
            .map_err(|e| EditError::OperationFailed(format!("track re-merge: {e}")))?;
        let buffer = Arc::new(merged);
        Ok(Track {
            id: self.id,
            name: self.name.clone(),
            duration: segment::total_duration(&segments),
            buffer,
            segments,
        })
    }
}

/// Multi-track joiner. Each track carries its own segment list and derived
/// buffer; the cross-track preview mix is recomputed debounced. History
/// snapshots are the whole track list; selection stays ephemeral.
pub struct JoinEditor {
    cfg: EditorConfig,
    tracks: Vec<Track>,
    mix: Option<Arc<AudioBuffer>>,
    history: EditHistory<Vec<Track>>,
    selected: Option<(u64, u64)>, // (track id, segment id)
    remix: Debouncer<()>,
    resize_throttle: Throttle,
    drag_dirty: bool,
    transport: MultiTransport,
}

impl JoinEditor {
    pub fn new(clock: Arc<dyn Clock>, cfg: EditorConfig) -> Self {
        let history = EditHistory::new(Vec::new(), cfg.history_cap);
        let remix = Debouncer::new(cfg.remerge_debounce);
        let resize_throttle = Throttle::new(cfg.resize_throttle);
        Self {
            cfg,
            tracks: Vec::new(),
            mix: None,
            history,
            selected: None,
            remix,
            resize_throttle,
            drag_dirty: false,
            transport: MultiTransport::new(clock),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.cfg
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn mix(&self) -> Option<&Arc<AudioBuffer>> {
        self.mix.as_ref()
    }

    pub fn selected(&self) -> Option<(u64, u64)> {
        self.selected
    }

    pub fn select(&mut self, sel: Option<(u64, u64)>) {
        self.selected = sel.filter(|(tid, sid)| {
            self.tracks
                .iter()
                .find(|t| t.id == *tid)
                .map(|t| t.segments.iter().any(|s| s.id == *sid))
                .unwrap_or(false)
        });
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn add_track(
        &mut self,
        name: impl Into<String>,
        buffer: Arc<AudioBuffer>,
        now: Instant,
    ) -> u64 {
        let track = Track::from_buffer(name, buffer);
        let id = track.id;
        self.tracks.push(track);
        self.after_structural_change(now);
        id
    }

    pub fn remove_track(&mut self, id: u64, now: Instant) -> Result<(), EditError> {
        let idx = self
            .tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(EditError::InvalidRange)?;
        self.tracks.remove(idx);
        self.transport.remove_track(idx);
        self.after_structural_change(now);
        Ok(())
    }

    /// Cut one track's timeline at `t`. Boundary hits are no-ops.
    pub fn cut_at(&mut self, track_id: u64, t: f32, now: Instant) -> Result<bool, EditError> {
        let idx = self.track_index(track_id)?;
        let Some(list) = segment::cut_at(&self.tracks[idx].segments, t) else {
            return Ok(false);
        };
        let rebuilt = self.tracks[idx].rebuilt(list)?;
        self.tracks[idx] = rebuilt;
        self.after_structural_change(now);
        Ok(true)
    }

    /// Delete a segment. Deleting a track's last segment cascades to
    /// removing the whole track.
    pub fn delete_segment(
        &mut self,
        track_id: u64,
        segment_id: u64,
        now: Instant,
    ) -> Result<(), EditError> {
        let idx = self.track_index(track_id)?;
        match segment::delete(&self.tracks[idx].segments, segment_id) {
            Ok(list) => {
                let rebuilt = self.tracks[idx].rebuilt(list)?;
                self.tracks[idx] = rebuilt;
                self.after_structural_change(now);
                Ok(())
            }
            Err(EditError::LastSegment) => {
                self.tracks.remove(idx);
                self.transport.remove_track(idx);
                self.after_structural_change(now);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn resize_edge(
        &mut self,
        track_id: u64,
        segment_id: u64,
        edge: SegmentEdge,
        target: f32,
        now: Instant,
    ) -> Result<(), EditError> {
        let idx = self.track_index(track_id)?;
        let mut list = segment::resize_edge(&self.tracks[idx].segments, segment_id, edge, target)?;
        segment::retile(&mut list);
        let rebuilt = self.tracks[idx].rebuilt(list)?;
        self.tracks[idx] = rebuilt;
        self.after_structural_change(now);
        Ok(())
    }

    /// Throttled drag variant; no history push until `finish_resize_drag`.
    pub fn resize_drag(
        &mut self,
        track_id: u64,
        segment_id: u64,
        edge: SegmentEdge,
        target: f32,
        now: Instant,
    ) -> Result<bool, EditError> {
        if !self.resize_throttle.ready(now) {
            return Ok(false);
        }
        let idx = self.track_index(track_id)?;
        let mut list = segment::resize_edge(&self.tracks[idx].segments, segment_id, edge, target)?;
        segment::retile(&mut list);
        let rebuilt = self.tracks[idx].rebuilt(list)?;
        self.tracks[idx] = rebuilt;
        self.drag_dirty = true;
        self.sync_transport();
        self.remix.submit((), now);
        Ok(true)
    }

    /// Record the final drag state as one history entry. A release with no
    /// accepted update in between pushes nothing.
    pub fn finish_resize_drag(&mut self, now: Instant) {
        if !self.drag_dirty {
            return;
        }
        self.drag_dirty = false;
        self.history.push(self.tracks.clone());
        self.remix.submit((), now);
    }

    fn track_index(&self, track_id: u64) -> Result<usize, EditError> {
        self.tracks
            .iter()
            .position(|t| t.id == track_id)
            .ok_or(EditError::InvalidRange)
    }

    fn after_structural_change(&mut self, now: Instant) {
        if let Some((tid, sid)) = self.selected {
            let alive = self
                .tracks
                .iter()
                .find(|t| t.id == tid)
                .map(|t| t.segments.iter().any(|s| s.id == sid))
                .unwrap_or(false);
            if !alive {
                self.selected = None;
            }
        }
        self.sync_transport();
        self.history.push(self.tracks.clone());
        self.remix.submit((), now);
    }

    fn sync_transport(&mut self) {
        let durations: Vec<f32> = self.tracks.iter().map(|t| t.duration).collect();
        self.transport.set_durations(&durations);
    }

    pub fn undo(&mut self, now: Instant) -> bool {
        let Some(tracks) = self.history.undo() else {
            return false;
        };
        let tracks = tracks.clone();
        self.restore(tracks, now);
        true
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        let Some(tracks) = self.history.redo() else {
            return false;
        };
        let tracks = tracks.clone();
        self.restore(tracks, now);
        true
    }

    fn restore(&mut self, tracks: Vec<Track>, now: Instant) {
        self.tracks = tracks;
        if let Some((tid, sid)) = self.selected {
            let alive = self
                .tracks
                .iter()
                .find(|t| t.id == tid)
                .map(|t| t.segments.iter().any(|s| s.id == sid))
                .unwrap_or(false);
            if !alive {
                self.selected = None;
            }
        }
        self.sync_transport();
        self.remix.submit((), now);
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if self.remix.poll(now).is_some() {
            self.do_remix();
            return true;
        }
        false
    }

    pub fn flush(&mut self) {
        if self.remix.flush().is_some() {
            self.do_remix();
        }
    }

    fn do_remix(&mut self) {
        if self.tracks.is_empty() {
            self.mix = None;
            return;
        }
        let buffers: Vec<Arc<AudioBuffer>> = self.tracks.iter().map(|t| t.buffer.clone()).collect();
        match wave::mix(&buffers) {
            Ok(buf) => self.mix = Some(Arc::new(buf)),
            Err(e) => log::warn!("re-mix failed: {e}"),
        }
    }

    /// Start every track from its own resting playhead, one shared clock
    /// anchor across all of them. Tears down any solo playback first.
    pub fn play_all(&mut self, engine: Option<&AudioEngine>) {
        self.flush();
        let voices: Vec<Option<Arc<Voice>>> = match engine {
            Some(e) => {
                let vs: Vec<Arc<Voice>> = self
                    .tracks
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let resting = self
                            .transport
                            .track(i)
                            .map(|tr| {
                                if tr.position() >= tr.duration() {
                                    0.0
                                } else {
                                    tr.position()
                                }
                            })
                            .unwrap_or(0.0);
                        let start = (resting * t.buffer.sample_rate as f32) as usize;
                        Voice::new(t.buffer.clone(), start)
                    })
                    .collect();
                e.set_voices(vs.clone());
                vs.into_iter().map(Some).collect()
            }
            None => vec![None; self.tracks.len()],
        };
        self.transport.play_all(voices);
    }

    /// Play one track alone, tearing down any aggregate playback first.
    pub fn play_track(&mut self, track_id: u64, engine: Option<&AudioEngine>) {
        self.flush();
        let Ok(idx) = self.track_index(track_id) else {
            return;
        };
        let voice = engine.map(|e| {
            let track = &self.tracks[idx];
            let resting = self
                .transport
                .track(idx)
                .map(|tr| {
                    if tr.position() >= tr.duration() {
                        0.0
                    } else {
                        tr.position()
                    }
                })
                .unwrap_or(0.0);
            let start = (resting * track.buffer.sample_rate as f32) as usize;
            let v = Voice::new(track.buffer.clone(), start);
            e.set_voices(vec![v.clone()]);
            v
        });
        self.transport.play_solo(idx, voice);
    }

    pub fn pause_all(&mut self) {
        self.transport.pause_all();
    }

    pub fn stop_all(&mut self) {
        self.transport.stop_all();
    }

    /// Advance all transports one frame; the aggregate playhead tracks
    /// whichever track is furthest along.
    pub fn playhead(&mut self) -> f32 {
        self.transport.tick()
    }

    pub fn current_time(&self) -> f32 {
        self.transport.current_time()
    }

    pub fn any_playing(&self) -> bool {
        self.transport.any_playing()
    }

    pub fn transport(&self) -> &MultiTransport {
        &self.transport
    }

    pub fn export_mix_wav(&mut self, path: &std::path::Path) -> anyhow::Result<()> {
        self.flush();
        if self.mix.is_none() {
            self.do_remix();
        }
        let Some(mix) = self.mix.as_ref() else {
            anyhow::bail!("nothing to export: no tracks loaded");
        };
        wave::export_buffer_wav(mix, path)
    }
}
