//! Clock abstraction the recorder is driven by.

use std::fmt;

/// Narrow view of the external clock a [`Recorder`](crate::Recorder)
/// composes: local time, rate, loop count, start offset and a duration
/// change notification.
pub trait Playable {
    /// Local elapsed time since `start_time`, scaled by speed.
    fn time(&self) -> f64;

    fn speed(&self) -> f64;

    fn iterations(&self) -> f64;

    /// Player time at which local time is zero.
    fn start_time(&self) -> f64;

    fn set_start_time(&mut self, start_time: f64);

    /// Restarts the playable so that local time is zero at `start_time`.
    fn go_to_beginning(&mut self, start_time: f64) {
        self.set_start_time(start_time);
    }

    /// Called whenever the reported duration of the playable changes.
    fn duration_changed(&mut self, duration: f64);
}

/// Listener notified with the new duration.
pub type DurationListener = Box<dyn FnMut(f64) + Send>;

/// Default [`Playable`] driven by explicit `advance` calls.
pub struct PlaybackClock {
    player_time: f64,
    start_time: f64,
    speed: f64,
    iterations: f64,
    listener: Option<DurationListener>,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            player_time: 0.0,
            start_time: 0.0,
            speed: 1.0,
            iterations: 1.0,
            listener: None,
        }
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_iterations(mut self, iterations: f64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn on_duration_changed(mut self, listener: impl FnMut(f64) + Send + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Time on the owning player's timeline.
    pub fn player_time(&self) -> f64 {
        self.player_time
    }

    /// Moves the player forward by `delta` wall-clock seconds and returns the
    /// resulting local `dt`.
    pub fn advance(&mut self, delta: f64) -> f64 {
        self.player_time += delta;
        delta * self.speed
    }
}

impl Playable for PlaybackClock {
    fn time(&self) -> f64 {
        (self.player_time - self.start_time) * self.speed
    }

    fn speed(&self) -> f64 {
        self.speed
    }

    fn iterations(&self) -> f64 {
        self.iterations
    }

    fn start_time(&self) -> f64 {
        self.start_time
    }

    fn set_start_time(&mut self, start_time: f64) {
        self.start_time = start_time;
    }

    fn duration_changed(&mut self, duration: f64) {
        if let Some(listener) = self.listener.as_mut() {
            listener(duration);
        }
    }
}

impl fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("player_time", &self.player_time)
            .field("start_time", &self.start_time)
            .field("speed", &self.speed)
            .field("iterations", &self.iterations)
            .finish()
    }
}
