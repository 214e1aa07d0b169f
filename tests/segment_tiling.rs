use std::sync::Arc;

use approx::assert_abs_diff_eq;
use wavecut::audio::AudioBuffer;
use wavecut::segment::{self, SegmentEdge};

fn synth_mono(sr: u32, secs: f32) -> Arc<AudioBuffer> {
    let frames = ((sr as f32) * secs).max(1.0) as usize;
    let mono: Vec<f32> = (0..frames)
        .map(|i| {
            let t = (i as f32) / (sr as f32);
            (t * 220.0 * std::f32::consts::TAU).sin() * 0.30
        })
        .collect();
    Arc::new(AudioBuffer::from_mono(mono, sr))
}

#[test]
fn cuts_and_delete_keep_timeline_tiled() {
    let buf = synth_mono(1000, 10.0);
    let segs = vec![segment::Segment::from_buffer(buf)];
    assert!(segment::is_tiled(&segs));

    let segs = segment::cut_at(&segs, 4.0).expect("cut inside the segment");
    assert_eq!(segs.len(), 2);
    assert!(segment::is_tiled(&segs));
    assert_abs_diff_eq!(segs[0].start_time, 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(segs[0].end_time, 4.0, epsilon = 1e-3);
    assert_abs_diff_eq!(segs[1].start_time, 4.0, epsilon = 1e-3);
    assert_abs_diff_eq!(segs[1].end_time, 10.0, epsilon = 1e-3);

    let segs = segment::cut_at(&segs, 7.0).expect("cut the tail segment");
    assert_eq!(segs.len(), 3);
    assert!(segment::is_tiled(&segs));
    assert_abs_diff_eq!(segment::total_duration(&segs), 10.0, epsilon = 1e-3);

    // deleting the middle closes the gap; the tail shifts left
    let middle = segs[1].id;
    let segs = segment::delete(&segs, middle).expect("delete middle");
    assert_eq!(segs.len(), 2);
    assert!(segment::is_tiled(&segs));
    assert_abs_diff_eq!(segs[1].start_time, 4.0, epsilon = 1e-3);
    assert_abs_diff_eq!(segment::total_duration(&segs), 7.0, epsilon = 1e-3);
}

#[test]
fn cut_on_existing_boundary_is_a_no_op() {
    let buf = synth_mono(1000, 10.0);
    let segs = segment::cut_at(&[segment::Segment::from_buffer(buf)], 4.0).unwrap();

    assert!(segment::cut_at(&segs, 4.0).is_none());
    assert!(segment::cut_at(&segs, 4.005).is_none()); // within epsilon of the seam
    assert!(segment::cut_at(&segs, 0.0).is_none());
    assert!(segment::cut_at(&segs, 10.0).is_none());
    assert!(segment::cut_at(&segs, 12.0).is_none());
}

#[test]
fn delete_of_last_segment_is_rejected() {
    let buf = synth_mono(1000, 2.0);
    let segs = vec![segment::Segment::from_buffer(buf)];
    let id = segs[0].id;
    assert!(matches!(
        segment::delete(&segs, id),
        Err(wavecut::EditError::LastSegment)
    ));
}

#[test]
fn resize_holds_the_opposite_edge_exactly() {
    let buf = synth_mono(1000, 10.0);
    let segs = segment::cut_at(&[segment::Segment::from_buffer(buf)], 4.0).unwrap();
    let tail = segs[1].id;

    // start edge moves right; the end must be copied verbatim, the start
    // derived from what the trim actually produced
    let resized = segment::resize_edge(&segs, tail, SegmentEdge::Start, 5.0).unwrap();
    let end_before = segs[1].end_time;
    assert_eq!(resized[1].end_time, end_before);
    assert_abs_diff_eq!(resized[1].start_time, 5.0, epsilon = 1e-3);
    assert_abs_diff_eq!(resized[1].duration(), 5.0, epsilon = 1e-3);

    // end edge moves left; now the start is the fixed one
    let resized = segment::resize_edge(&segs, tail, SegmentEdge::End, 7.0).unwrap();
    assert_eq!(resized[1].start_time, segs[1].start_time);
    assert_abs_diff_eq!(resized[1].end_time, 7.0, epsilon = 1e-3);
}

#[test]
fn resize_clamps_to_minimum_duration() {
    let buf = synth_mono(1000, 10.0);
    let segs = segment::cut_at(&[segment::Segment::from_buffer(buf)], 4.0).unwrap();
    let tail = segs[1].id;

    // dragging the end all the way back to the start leaves 0.1s
    let resized = segment::resize_edge(&segs, tail, SegmentEdge::End, 4.0).unwrap();
    assert_abs_diff_eq!(resized[1].duration(), 0.1, epsilon = 1e-3);

    // dragging the start past the end leaves 0.1s as well
    let resized = segment::resize_edge(&segs, tail, SegmentEdge::Start, 20.0).unwrap();
    assert_abs_diff_eq!(resized[1].duration(), 0.1, epsilon = 1e-3);
}
