//! Session controller fanning capture and playback out to every track.

use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::timeline::{PlaybackClock, Playable};
use crate::track::{Callback, Presence, PropertyTarget, SharedTarget, Track, TrackHooks};
use crate::{RecorderConfig, Result};

/// What the recorder does on each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Neither capturing nor replaying.
    Idle,
    Recording,
    Playing,
}

#[derive(Default)]
struct ModeHooks {
    on_start_recording: Option<Callback>,
    on_stop_recording: Option<Callback>,
    on_start_playing: Option<Callback>,
    on_stop_playing: Option<Callback>,
}

fn fire(hook: &mut Option<Callback>) {
    if let Some(hook) = hook.as_mut() {
        hook();
    }
}

/// Records labelled targets over time and plays them back.
///
/// Times written into tracks are absolute: the clock's local time plus the
/// slack accumulated each time the recording window overflowed.
pub struct Recorder<C = PlaybackClock> {
    clock: C,
    tracks: IndexMap<String, Track>,
    capturing: Vec<String>,
    mode: Mode,
    max_recording_duration: f64,
    slack_time: f64,
    duration: f64,
    smooth: bool,
    hooks: ModeHooks,
}

impl<C: Playable> Recorder<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            tracks: IndexMap::new(),
            capturing: Vec::new(),
            mode: Mode::Idle,
            max_recording_duration: f64::INFINITY,
            slack_time: 0.0,
            duration: f64::INFINITY,
            smooth: false,
            hooks: ModeHooks::default(),
        }
    }

    pub fn with_config(clock: C, config: &RecorderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_clock(clock)
            .max_recording_duration(config.window())
            .smooth(config.smooth))
    }

    /// Toggles interpolation between records during playback.
    pub fn smooth(mut self, smooth: bool) -> Self {
        self.smooth = smooth;
        self
    }

    pub fn set_smooth(&mut self, smooth: bool) {
        self.smooth = smooth;
    }

    /// Longest span of history kept while recording.
    pub fn max_recording_duration(mut self, seconds: f64) -> Self {
        self.max_recording_duration = seconds;
        self
    }

    pub fn on_start_recording(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.hooks.on_start_recording = Some(Box::new(hook));
        self
    }

    pub fn on_stop_recording(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.hooks.on_stop_recording = Some(Box::new(hook));
        self
    }

    pub fn on_start_playing(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.hooks.on_start_playing = Some(Box::new(hook));
        self
    }

    pub fn on_stop_playing(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.hooks.on_stop_playing = Some(Box::new(hook));
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_recording(&self) -> bool {
        self.mode == Mode::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.mode == Mode::Playing
    }

    pub fn is_smooth(&self) -> bool {
        self.smooth
    }

    /// Offset between the clock's local time and recorded times.
    pub fn slack_time(&self) -> f64 {
        self.slack_time
    }

    /// Length of one replay pass as seen from outside, unbounded unless
    /// playing.
    pub fn duration(&self) -> f64 {
        let duration = if self.is_playing() {
            self.duration.min(self.max_recording_duration)
        } else {
            f64::INFINITY
        };
        duration * self.clock.iterations() / self.clock.speed()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn track(&self, label: &str) -> Option<&Track> {
        self.tracks.get(label)
    }

    /// Labels of every track holding history, in registration order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }

    /// Labels of the tracks captured on each recording tick.
    pub fn capturing_labels(&self) -> &[String] {
        &self.capturing
    }

    /// Starts recording `properties` of `target` under `label`.
    ///
    /// An existing track with the same label is discarded, history included,
    /// and the new track moves to the end of the iteration order.
    pub fn start_track<T, I, S>(
        &mut self,
        label: impl Into<String>,
        target: Arc<Mutex<T>>,
        properties: I,
        hooks: TrackHooks,
    ) -> Result<()>
    where
        T: PropertyTarget + Send + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let label = label.into();
        let target: SharedTarget = target;
        let properties = properties.into_iter().map(Into::into).collect();
        let track = Track::new(label.clone(), target, properties, hooks)?;

        if self.tracks.shift_remove(&label).is_some() {
            warn!(label = %label, "replacing recorded track, previous history discarded");
        }
        self.capturing.retain(|existing| *existing != label);
        self.capturing.push(label.clone());
        self.tracks.insert(label.clone(), track);
        debug!(label = %label, "track started");
        Ok(())
    }

    /// Stops capturing `label` while keeping its history for playback.
    /// Returns `false` when the label is not being captured.
    pub fn stop_track(&mut self, label: &str) -> bool {
        let Some(index) = self.capturing.iter().position(|existing| existing == label) else {
            warn!(label, "trying to stop a track that is not being recorded");
            return false;
        };
        self.capturing.remove(index);
        debug!(label, "track stopped");
        true
    }

    /// Discards `label` and its history. Returns `false` for unknown labels.
    pub fn remove_track(&mut self, label: &str) -> bool {
        self.capturing.retain(|existing| existing != label);
        if self.tracks.shift_remove(label).is_none() {
            warn!(label, "trying to remove a track that was never recorded");
            return false;
        }
        debug!(label, "track removed");
        true
    }

    /// Drops every track.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.capturing.clear();
        debug!("recorder reset");
    }

    pub fn set_recording(&mut self, recording: bool) {
        if self.is_recording() == recording {
            return;
        }

        if recording {
            if self.is_playing() {
                self.mode = Mode::Idle;
                fire(&mut self.hooks.on_stop_playing);
            }
            self.mode = Mode::Recording;
            // Start time is kept so recording resumes where the play head is.
            self.duration = f64::INFINITY;
            let duration = self.duration();
            self.clock.duration_changed(duration);
            debug!("recording started");
            fire(&mut self.hooks.on_start_recording);
        } else {
            self.mode = Mode::Idle;
            debug!("recording stopped");
            fire(&mut self.hooks.on_stop_recording);
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.is_playing() == playing {
            return;
        }

        if playing {
            if self.is_recording() {
                self.mode = Mode::Idle;
                fire(&mut self.hooks.on_stop_recording);
            }
            self.mode = Mode::Playing;
            // Rewinding past the origin leaves nothing to replay.
            let elapsed = self.clock.time();
            self.duration = elapsed.max(0.0);
            let start_time = self.clock.start_time() + self.to_player_time(elapsed);
            self.clock.go_to_beginning(start_time);
            let duration = self.duration();
            self.clock.duration_changed(duration);
            debug!(duration = self.duration, "playing started");
            fire(&mut self.hooks.on_start_playing);
        } else {
            self.mode = Mode::Idle;
            debug!("playing stopped");
            fire(&mut self.hooks.on_stop_playing);
        }
    }

    /// Runs one tick at the clock's current time. `dt` is the local time
    /// elapsed since the previous tick.
    ///
    /// Every track is visited even when one of them fails; the first error
    /// is returned once the tick has completed.
    pub fn update(&mut self, dt: f64) -> Result<()> {
        let time = self.slack_time + self.clock.time();
        match self.mode {
            Mode::Recording => self.record_tick(time, dt),
            Mode::Playing => self.play_tick(time, dt),
            Mode::Idle => Ok(()),
        }
    }

    fn record_tick(&mut self, time: f64, dt: f64) -> Result<()> {
        let elapsed = self.clock.time();
        // Forward: drop everything up to the window's trailing edge.
        // Backward: drop whatever lies before the time origin.
        let (overflow, erase_range) = if dt > 0.0 {
            let overflow = elapsed - self.max_recording_duration;
            let edge = self.slack_time + overflow;
            (
                overflow.max(0.0),
                (overflow > 0.0).then_some((f64::NEG_INFINITY, edge)),
            )
        } else {
            (0.0, (elapsed < 0.0).then_some((time, self.slack_time)))
        };

        let mut first_error = None;
        for label in &self.capturing {
            let Some(track) = self.tracks.get_mut(label) else {
                debug_assert!(false, "capturing label `{label}` has no track");
                continue;
            };
            if let Err(err) = track.capture(time, dt) {
                warn!(label = %label, error = %err, "capture failed");
                first_error.get_or_insert(err);
            }
            if let Some((from, to)) = erase_range {
                let removed = track.erase(from, to);
                trace!(label = %label, removed, "evicted records outside the recording window");
            }
        }

        if overflow > 0.0 {
            self.slack_time += overflow;
            let start_time = self.clock.start_time() + self.to_player_time(overflow);
            self.clock.set_start_time(start_time);
            let duration = self.duration();
            self.clock.duration_changed(duration);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn play_tick(&mut self, time: f64, dt: f64) -> Result<()> {
        let mut first_error = None;
        for (label, track) in self.tracks.iter_mut() {
            if track.is_empty() {
                continue;
            }
            match track.play(time, dt, self.smooth) {
                Ok(presence @ (Presence::Entered | Presence::Exited)) => {
                    trace!(label = %label, ?presence, time, "play head crossed track boundary");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(label = %label, error = %err, "playback failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn to_player_time(&self, local: f64) -> f64 {
        let speed = self.clock.speed();
        if speed == 0.0 {
            0.0
        } else {
            local / speed
        }
    }
}

impl Recorder<PlaybackClock> {
    /// Creates an idle recorder driven by a fresh [`PlaybackClock`].
    pub fn new() -> Self {
        Self::with_clock(PlaybackClock::new())
    }

    /// Advances the owned clock by `delta` seconds and runs [`update`].
    ///
    /// [`update`]: Recorder::update
    pub fn tick(&mut self, delta: f64) -> Result<()> {
        let dt = self.clock.advance(delta);
        self.update(dt)
    }
}

impl Default for Recorder<PlaybackClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: fmt::Debug> fmt::Debug for Recorder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("clock", &self.clock)
            .field("tracks", &self.tracks.values().collect::<Vec<_>>())
            .field("capturing", &self.capturing)
            .field("mode", &self.mode)
            .field("max_recording_duration", &self.max_recording_duration)
            .field("slack_time", &self.slack_time)
            .field("smooth", &self.smooth)
            .finish()
    }
}
