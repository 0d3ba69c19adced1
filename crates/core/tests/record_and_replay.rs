use std::sync::{Arc, Mutex};

use rewind_core::{Mode, PlaybackClock, Playable, PropertyTarget, Recorder, TrackHooks};

/// Stand-in for a game object with named numeric fields.
#[derive(Debug, Default)]
struct Sprite {
    x: f64,
    y: f64,
}

impl PropertyTarget for Sprite {
    fn property(&self, name: &str) -> Option<f64> {
        match name {
            "x" => Some(self.x),
            "y" => Some(self.y),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f64) -> bool {
        match name {
            "x" => self.x = value,
            "y" => self.y = value,
            _ => return false,
        }
        true
    }
}

fn record_diagonal(recorder: &mut Recorder, sprite: &Arc<Mutex<Sprite>>, steps: usize) {
    recorder.set_recording(true);
    recorder.update(0.0).unwrap();
    for step in 1..=steps {
        {
            let mut sprite = sprite.lock().unwrap();
            sprite.x = step as f64 * 10.0;
            sprite.y = step as f64 * -5.0;
        }
        recorder.tick(1.0).unwrap();
    }
}

#[test]
fn replays_recorded_positions_discretely() {
    let sprite = Arc::new(Mutex::new(Sprite::default()));
    let mut recorder = Recorder::new();
    recorder
        .start_track("character", sprite.clone(), ["x", "y"], TrackHooks::new())
        .unwrap();
    record_diagonal(&mut recorder, &sprite, 4);

    recorder.set_playing(true);
    assert_eq!(recorder.mode(), Mode::Playing);
    assert_eq!(recorder.duration(), 4.0);

    recorder.tick(2.5).unwrap();
    let sprite = sprite.lock().unwrap();
    assert_eq!((sprite.x, sprite.y), (20.0, -10.0));
}

#[test]
fn replays_recorded_positions_smoothly() {
    let sprite = Arc::new(Mutex::new(Sprite::default()));
    let mut recorder = Recorder::new().smooth(true);
    recorder
        .start_track("character", sprite.clone(), ["x"], TrackHooks::new())
        .unwrap();
    record_diagonal(&mut recorder, &sprite, 4);

    recorder.set_playing(true);
    recorder.tick(0.5).unwrap();
    assert!((sprite.lock().unwrap().x - 5.0).abs() < 1e-9);
    recorder.tick(1.0).unwrap();
    assert!((sprite.lock().unwrap().x - 15.0).abs() < 1e-9);
    // y was not declared, so playback leaves it alone.
    assert_eq!(sprite.lock().unwrap().y, -20.0);
}

#[test]
fn windowed_replay_starts_at_retained_history() {
    let sprite = Arc::new(Mutex::new(Sprite::default()));
    let entered = Arc::new(Mutex::new(0));
    let counter = entered.clone();
    let hooks = TrackHooks::new().on_enter(move || *counter.lock().unwrap() += 1);

    let mut recorder = Recorder::new().max_recording_duration(5.0);
    recorder
        .start_track("character", sprite.clone(), ["x"], hooks)
        .unwrap();
    record_diagonal(&mut recorder, &sprite, 7);
    assert_eq!(recorder.slack_time(), 2.0);

    recorder.set_playing(true);
    assert_eq!(recorder.duration(), 5.0);
    assert_eq!(recorder.clock().time(), 0.0);

    // Absolute time 2.5 still precedes the first retained record.
    recorder.tick(0.5).unwrap();
    assert_eq!(*entered.lock().unwrap(), 0);

    recorder.tick(1.0).unwrap();
    assert_eq!(*entered.lock().unwrap(), 1);
    assert_eq!(sprite.lock().unwrap().x, 30.0);
}

#[test]
fn custom_clock_receives_duration_changes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let clock = PlaybackClock::new().on_duration_changed(move |d| sink.lock().unwrap().push(d));
    let mut recorder = Recorder::with_clock(clock);

    recorder.set_recording(true);
    recorder.tick(3.0).unwrap();
    recorder.set_playing(true);

    assert_eq!(*seen.lock().unwrap(), vec![f64::INFINITY, 3.0]);
}
