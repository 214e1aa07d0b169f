use approx::assert_abs_diff_eq;
use wavecut::transport::{ManualClock, MultiTransport, TrackTransport, TransportState};

#[test]
fn position_is_derived_from_the_clock_anchor() {
    let clock = ManualClock::new();
    let mut t = TrackTransport::new(clock.clone(), 10.0);
    t.play(None);
    clock.advance(2.5);
    assert_abs_diff_eq!(t.position(), 2.5, epsilon = 1e-4);
    assert_abs_diff_eq!(t.tick(), 2.5, epsilon = 1e-4);
    assert_eq!(t.state(), TransportState::Playing);
}

#[test]
fn pause_preserves_position_and_resume_continues() {
    let clock = ManualClock::new();
    let mut t = TrackTransport::new(clock.clone(), 10.0);
    t.play(None);
    clock.advance(3.0);
    t.pause();
    assert_eq!(t.state(), TransportState::Paused);
    assert_abs_diff_eq!(t.position(), 3.0, epsilon = 1e-4);

    // wall time passing while paused must not move the playhead
    clock.advance(100.0);
    assert_abs_diff_eq!(t.position(), 3.0, epsilon = 1e-4);

    t.play(None);
    clock.advance(1.0);
    assert_abs_diff_eq!(t.position(), 4.0, epsilon = 1e-4);
}

#[test]
fn restarting_play_resumes_from_the_live_position() {
    let clock = ManualClock::new();
    let mut t = TrackTransport::new(clock.clone(), 10.0);
    t.play(None);
    clock.advance(2.0);

    // play while already playing: the previous run is cancelled but the
    // elapsed time is kept, same as a stop-then-play
    t.play(None);
    clock.advance(1.0);
    assert_abs_diff_eq!(t.position(), 3.0, epsilon = 1e-4);
}

#[test]
fn natural_end_stops_and_rewinds_to_zero() {
    let clock = ManualClock::new();
    let mut t = TrackTransport::new(clock.clone(), 3.0);
    t.play(None);
    clock.advance(5.0);
    // the frame that detects the end reports the full duration once
    assert_abs_diff_eq!(t.tick(), 3.0, epsilon = 1e-4);
    assert_eq!(t.state(), TransportState::Stopped);
    assert_abs_diff_eq!(t.position(), 0.0, epsilon = 1e-4);

    // the next play starts from the top
    t.play(None);
    clock.advance(1.0);
    assert_abs_diff_eq!(t.position(), 1.0, epsilon = 1e-4);
}

#[test]
fn explicit_stop_keeps_the_playhead() {
    let clock = ManualClock::new();
    let mut t = TrackTransport::new(clock.clone(), 10.0);
    t.play(None);
    clock.advance(6.0);
    t.stop();
    assert_eq!(t.state(), TransportState::Stopped);
    assert_abs_diff_eq!(t.position(), 6.0, epsilon = 1e-4);
}

#[test]
fn seek_reanchors_while_playing() {
    let clock = ManualClock::new();
    let mut t = TrackTransport::new(clock.clone(), 10.0);
    t.play(None);
    clock.advance(2.0);
    t.seek(7.0);
    clock.advance(1.0);
    assert_abs_diff_eq!(t.position(), 8.0, epsilon = 1e-4);
}

#[test]
fn play_all_shares_one_anchor_with_per_track_offsets() {
    let clock = ManualClock::new();
    let mut m = MultiTransport::new(clock.clone());
    m.set_durations(&[10.0, 10.0]);
    m.track_mut(0).unwrap().seek(2.0);

    m.play_all(Vec::new());
    clock.advance(1.0);
    assert_abs_diff_eq!(m.track(0).unwrap().position(), 3.0, epsilon = 1e-4);
    assert_abs_diff_eq!(m.track(1).unwrap().position(), 1.0, epsilon = 1e-4);
    // aggregate time follows the furthest track
    assert_abs_diff_eq!(m.current_time(), 3.0, epsilon = 1e-4);
}

#[test]
fn aggregate_runs_until_the_last_track_ends() {
    let clock = ManualClock::new();
    let mut m = MultiTransport::new(clock.clone());
    m.set_durations(&[5.0, 3.0]);
    m.play_all(Vec::new());

    clock.advance(4.0);
    assert_abs_diff_eq!(m.tick(), 4.0, epsilon = 1e-4);
    // the short track ended and rewound, the long one is still going
    assert!(!m.track(1).unwrap().is_playing());
    assert!(m.any_playing());

    clock.advance(2.0);
    assert_abs_diff_eq!(m.tick(), 5.0, epsilon = 1e-4);
    assert!(!m.any_playing());
}

#[test]
fn solo_playback_stops_the_aggregate_first() {
    let clock = ManualClock::new();
    let mut m = MultiTransport::new(clock.clone());
    m.set_durations(&[10.0, 10.0]);
    m.play_all(Vec::new());
    clock.advance(1.0);

    m.play_solo(1, None);
    assert!(!m.track(0).unwrap().is_playing());
    assert!(m.track(1).unwrap().is_playing());
    // the stopped track kept the position it had reached
    assert_abs_diff_eq!(m.track(0).unwrap().position(), 1.0, epsilon = 1e-4);
}

#[test]
fn play_all_rewinds_tracks_resting_at_their_end() {
    let clock = ManualClock::new();
    let mut m = MultiTransport::new(clock.clone());
    m.set_durations(&[4.0]);
    m.track_mut(0).unwrap().seek(4.0);

    m.play_all(Vec::new());
    clock.advance(1.0);
    assert_abs_diff_eq!(m.track(0).unwrap().position(), 1.0, epsilon = 1e-4);
}
