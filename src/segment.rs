use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::AudioBuffer;
use crate::error::EditError;
use crate::wave;

/// Cut requests closer than this to an existing boundary are no-ops.
pub const CUT_EPSILON: f32 = 0.01;
/// A resize may not shrink a segment below this duration.
pub const MIN_SEGMENT_SECS: f32 = 0.1;
/// Tolerance for the tiling check (positions accumulate float rounding).
pub const TILING_EPSILON: f32 = 0.05;

static NEXT_SEGMENT_ID: AtomicU64 = AtomicU64::new(1);

fn next_segment_id() -> u64 {
    NEXT_SEGMENT_ID.fetch_add(1, Ordering::Relaxed)
}

/// One contiguous slice of a track's timeline, backed by its own immutable
/// buffer. `start_time`/`end_time` are absolute positions; they are derived
/// from accumulated actual buffer durations, never from requested cut/resize
/// targets, so sample rounding cannot open gaps between neighbours.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: u64,
    pub buffer: Arc<AudioBuffer>,
    pub start_time: f32,
    pub end_time: f32,
}

impl Segment {
    /// Wrap a freshly loaded buffer as a single segment spanning the whole file.
    pub fn from_buffer(buffer: Arc<AudioBuffer>) -> Self {
        let dur = buffer.duration();
        Self {
            id: next_segment_id(),
            buffer,
            start_time: 0.0,
            end_time: dur,
        }
    }

    pub fn duration(&self) -> f32 {
        self.end_time - self.start_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentEdge {
    Start,
    End,
}

/// Rederive every segment's absolute position from accumulated buffer
/// durations, left to right. Runs after each structural mutation and before
/// a re-merge; O(n) is fine at tens of segments.
pub fn retile(segments: &mut [Segment]) {
    let mut t = 0.0f32;
    for seg in segments.iter_mut() {
        seg.start_time = t;
        seg.end_time = t + seg.buffer.duration();
        t = seg.end_time;
    }
}

pub fn total_duration(segments: &[Segment]) -> f32 {
    segments.last().map(|s| s.end_time).unwrap_or(0.0)
}

/// Check the tiling invariant: sorted segments cover [0, duration) without
/// gaps or overlaps.
pub fn is_tiled(segments: &[Segment]) -> bool {
    let mut expected = 0.0f32;
    for seg in segments {
        if (seg.start_time - expected).abs() > TILING_EPSILON {
            return false;
        }
        if seg.end_time < seg.start_time {
            return false;
        }
        expected = seg.end_time;
    }
    segments
        .first()
        .map(|s| s.start_time.abs() <= TILING_EPSILON)
        .unwrap_or(true)
}

/// Split the segment strictly containing `cut_time` into two. Returns `None`
/// when the cut lands on an existing boundary (within `CUT_EPSILON`) or
/// outside the track; callers treat that as a no-op, not an error.
pub fn cut_at(segments: &[Segment], cut_time: f32) -> Option<Vec<Segment>> {
    let idx = segments.iter().position(|s| {
        cut_time > s.start_time + CUT_EPSILON && cut_time < s.end_time - CUT_EPSILON
    })?;
    let target = &segments[idx];
    let local = cut_time - target.start_time;
    let head = wave::trim(&target.buffer, 0.0, local);
    let tail = wave::trim(&target.buffer, local, target.buffer.duration());
    let mut out = Vec::with_capacity(segments.len() + 1);
    out.extend_from_slice(&segments[..idx]);
    out.push(Segment {
        id: next_segment_id(),
        buffer: Arc::new(head),
        start_time: 0.0,
        end_time: 0.0,
    });
    out.push(Segment {
        id: next_segment_id(),
        buffer: Arc::new(tail),
        start_time: 0.0,
        end_time: 0.0,
    });
    out.extend_from_slice(&segments[idx + 1..]);
    retile(&mut out);
    Some(out)
}

/// Remove a segment. Rejected with `LastSegment` when it would leave the
/// list empty; multi-track callers catch that and remove the whole track
/// instead.
pub fn delete(segments: &[Segment], id: u64) -> Result<Vec<Segment>, EditError> {
    let idx = segments
        .iter()
        .position(|s| s.id == id)
        .ok_or(EditError::InvalidRange)?;
    if segments.len() == 1 {
        return Err(EditError::LastSegment);
    }
    let mut out = Vec::with_capacity(segments.len() - 1);
    out.extend_from_slice(&segments[..idx]);
    out.extend_from_slice(&segments[idx + 1..]);
    retile(&mut out);
    Ok(out)
}

/// Re-trim one segment's buffer toward `target_time`, holding the opposite
/// edge fixed. The fixed edge is copied verbatim; the moving edge is derived
/// from the actual trimmed buffer length so the requested target is only ever
/// approximate. The caller retiles the full list before re-merging.
pub fn resize_edge(
    segments: &[Segment],
    id: u64,
    edge: SegmentEdge,
    target_time: f32,
) -> Result<Vec<Segment>, EditError> {
    let idx = segments
        .iter()
        .position(|s| s.id == id)
        .ok_or(EditError::InvalidRange)?;
    let seg = &segments[idx];
    let track_end = total_duration(segments);
    let mut out = segments.to_vec();
    match edge {
        SegmentEdge::Start => {
            let hi = (seg.end_time - MIN_SEGMENT_SECS).max(0.0);
            let target = target_time.clamp(0.0, hi);
            let offset = target - seg.start_time;
            let buffer = wave::trim(&seg.buffer, offset.max(0.0), seg.buffer.duration());
            let new = &mut out[idx];
            new.buffer = Arc::new(buffer);
            // end copied, start derived from what the trim actually produced
            new.start_time = new.end_time - new.buffer.duration();
        }
        SegmentEdge::End => {
            let lo = seg.start_time + MIN_SEGMENT_SECS;
            let target = target_time.clamp(lo, track_end.max(lo));
            let local_end = target - seg.start_time;
            let buffer = wave::trim(&seg.buffer, 0.0, local_end);
            let new = &mut out[idx];
            new.buffer = Arc::new(buffer);
            new.end_time = new.start_time + new.buffer.duration();
        }
    }
    Ok(out)
}

/// Collect the segment buffers in timeline order for a re-merge.
pub fn buffers(segments: &[Segment]) -> Vec<Arc<AudioBuffer>> {
    segments.iter().map(|s| s.buffer.clone()).collect()
}
