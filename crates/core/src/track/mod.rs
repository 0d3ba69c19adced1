//! Per-object capture and playback.
//!
//! A [`Track`] owns the time-ordered history of one target object and a
//! cursor into that history. Capture, erase, seek and playback all start
//! from the cursor, so sequential calls near the previous position stay
//! cheap regardless of how long the history is.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::record::{Iter, Record, RecordHandle, RecordList};
use crate::{Result, RewindError};

/// Anything exposing named numeric properties.
pub trait PropertyTarget {
    /// Current value of `name`, or `None` when the property does not exist.
    fn property(&self, name: &str) -> Option<f64>;

    /// Overwrites `name`. Returns `false` when the property does not exist.
    fn set_property(&mut self, name: &str, value: f64) -> bool;
}

impl PropertyTarget for HashMap<String, f64> {
    fn property(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }

    fn set_property(&mut self, name: &str, value: f64) -> bool {
        match self.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl PropertyTarget for BTreeMap<String, f64> {
    fn property(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }

    fn set_property(&mut self, name: &str, value: f64) -> bool {
        match self.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// Target shared between the caller and the track that records it.
pub type SharedTarget = Arc<Mutex<dyn PropertyTarget + Send>>;

/// Zero-argument callback fired on playback edges and mode changes.
pub type Callback = Box<dyn FnMut() + Send>;

/// Enter/exit callbacks attached to a track.
#[derive(Default)]
pub struct TrackHooks {
    on_enter: Option<Callback>,
    on_exit: Option<Callback>,
}

impl TrackHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired when the play head moves into the recorded interval.
    pub fn on_enter(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_enter = Some(Box::new(hook));
        self
    }

    /// Fired when the play head leaves the recorded interval, after the
    /// boundary values have been applied.
    pub fn on_exit(mut self, hook: impl FnMut() + Send + 'static) -> Self {
        self.on_exit = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for TrackHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackHooks")
            .field("on_enter", &self.on_enter.is_some())
            .field("on_exit", &self.on_exit.is_some())
            .finish()
    }
}

/// Containment transition reported by [`Track::play`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// The play head just moved into the recorded interval.
    Entered,
    /// The play head was and still is inside.
    Inside,
    /// The play head just left the recorded interval.
    Exited,
    /// The play head was and still is outside; nothing was applied.
    Outside,
}

impl Presence {
    pub fn is_inside(self) -> bool {
        matches!(self, Presence::Entered | Presence::Inside)
    }
}

/// Recorded history of one target object.
pub struct Track {
    label: String,
    target: SharedTarget,
    properties: Vec<String>,
    records: RecordList,
    cursor: Option<RecordHandle>,
    is_active: bool,
    hooks: TrackHooks,
}

impl Track {
    /// Creates an empty track. Every property must be readable on `target`.
    pub fn new(
        label: impl Into<String>,
        target: SharedTarget,
        properties: Vec<String>,
        hooks: TrackHooks,
    ) -> Result<Self> {
        let track = Self {
            label: label.into(),
            target,
            properties,
            records: RecordList::new(),
            cursor: None,
            is_active: false,
            hooks,
        };
        track.read_values()?;
        Ok(track)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> Iter<'_> {
        self.records.iter()
    }

    /// Record under the cursor, `None` while the track is empty.
    pub fn cursor_record(&self) -> Option<&Record> {
        self.cursor.and_then(|handle| self.records.get(handle))
    }

    /// Whether the play head currently lies inside the recorded interval.
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Times of the first and last records.
    pub fn time_span(&self) -> Option<(f64, f64)> {
        let first = self.time_of(self.records.first()?)?;
        let last = self.time_of(self.records.last()?)?;
        Some((first, last))
    }

    /// Snapshots the target's properties at `time`.
    ///
    /// The cursor first walks to the latest record at or before `time`. A
    /// record already sitting at `time` is overwritten; otherwise the new
    /// record goes right after the cursor, or before it when every record is
    /// later. The cursor then rests on the written record. Capturing twice
    /// at the same instant with `dt == 0` is a no-op.
    pub fn capture(&mut self, time: f64, dt: f64) -> Result<()> {
        let cursor_time = self.cursor.and_then(|handle| self.time_of(handle));
        if dt == 0.0 && cursor_time == Some(time) {
            return Ok(());
        }

        let values = self.read_values()?;
        self.seek_to(time);
        let anchor = self
            .cursor
            .and_then(|handle| Some((handle, self.time_of(handle)?)));

        let written = match anchor {
            Some((handle, current)) if current == time => {
                if let Some(record) = self.records.get_mut(handle) {
                    record.values = values;
                }
                Some(handle)
            }
            Some((handle, current)) if current < time => {
                self.records.insert_after(handle, Record::new(time, values))
            }
            Some((handle, _)) => self.records.insert_before(handle, Record::new(time, values)),
            None => {
                debug_assert!(self.records.is_empty(), "cursor lost on a non-empty track");
                Some(self.records.push_back(Record::new(time, values)))
            }
        };
        self.cursor = written;
        Ok(())
    }

    /// Removes every record whose time lies in the closed interval between
    /// `t0` and `t1` (in either order). Returns how many were removed.
    ///
    /// The sweep starts from the tail when the interval reaches the last
    /// record and from the head otherwise. A removed cursor is re-anchored
    /// on the record bordering the erased range.
    pub fn erase(&mut self, t0: f64, t1: f64) -> usize {
        let (t0, t1) = if t1 < t0 { (t1, t0) } else { (t0, t1) };
        let Some(last) = self.records.last() else {
            return 0;
        };

        let mut removed = 0;
        let border = if self.time_of(last).is_some_and(|time| time <= t1) {
            let mut node = Some(last);
            while let Some(handle) = node {
                if !self.time_of(handle).is_some_and(|time| time >= t0) {
                    break;
                }
                node = self.records.previous(handle);
                self.records.remove(handle);
                removed += 1;
            }
            node
        } else {
            let mut node = self.records.first();
            while let Some(handle) = node {
                let Some(time) = self.time_of(handle).filter(|time| *time <= t1) else {
                    break;
                };
                node = self.records.next(handle);
                if time >= t0 {
                    self.records.remove(handle);
                    removed += 1;
                }
            }
            node
        };

        if self
            .cursor
            .is_some_and(|handle| !self.records.contains(handle))
        {
            self.cursor = border;
        }
        debug_assert_eq!(self.cursor.is_none(), self.records.is_empty());
        removed
    }

    /// Moves the cursor onto the latest record at or before `time`, or onto
    /// the first record when all of them are later.
    pub fn seek_to(&mut self, time: f64) {
        let Some(mut cursor) = self.cursor else {
            return;
        };

        while self.time_of(cursor).is_some_and(|current| current < time) {
            match self.records.next(cursor) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        while self.time_of(cursor).is_some_and(|current| time < current) {
            match self.records.previous(cursor) {
                Some(previous) => cursor = previous,
                None => break,
            }
        }
        self.cursor = Some(cursor);
    }

    /// Writes the recorded state at `time` back onto the target.
    ///
    /// Containment uses hysteresis: once inside, both boundaries are
    /// exclusive; while outside, they are inclusive. With `dt == 0` the
    /// previous containment is kept as-is. Nothing is applied while the play
    /// head stays outside.
    pub fn play(&mut self, time: f64, dt: f64, smooth: bool) -> Result<Presence> {
        let Some((first, last)) = self.time_span() else {
            debug_assert!(false, "track `{}` played without records", self.label);
            return Ok(Presence::Outside);
        };

        let inside = if dt == 0.0 {
            self.is_active
        } else if self.is_active {
            first < time && time < last
        } else {
            first <= time && time <= last
        };

        let presence = match (self.is_active, inside) {
            (false, true) => Presence::Entered,
            (true, true) => Presence::Inside,
            (true, false) => Presence::Exited,
            (false, false) => return Ok(Presence::Outside),
        };
        self.is_active = inside;

        if presence == Presence::Entered {
            if let Some(hook) = self.hooks.on_enter.as_mut() {
                hook();
            }
        }

        self.seek_to(time);
        self.apply(time, smooth)?;

        if presence == Presence::Exited {
            if let Some(hook) = self.hooks.on_exit.as_mut() {
                hook();
            }
        }
        Ok(presence)
    }

    fn apply(&self, time: f64, smooth: bool) -> Result<()> {
        let Some(low_handle) = self.cursor else {
            return Ok(());
        };
        let Some(low) = self.records.get(low_handle) else {
            return Ok(());
        };
        let high = self
            .records
            .next(low_handle)
            .and_then(|handle| self.records.get(handle));

        let mut target = self.lock_target()?;
        match high {
            Some(high) if smooth && time > low.time && high.time > low.time => {
                // Lerp from the lower record: alpha 0 reproduces `low`, 1
                // reproduces `high`. Swapping the weights is only right at
                // the midpoint.
                let alpha = ((time - low.time) / (high.time - low.time)).min(1.0);
                let values = low
                    .values
                    .iter()
                    .zip(&high.values)
                    .map(|(from, to)| from + (to - from) * alpha);
                write_values(&mut *target, &self.properties, values)
            }
            _ => write_values(&mut *target, &self.properties, low.values.iter().copied()),
        }
    }

    fn read_values(&self) -> Result<Vec<f64>> {
        let target = self.lock_target()?;
        self.properties
            .iter()
            .map(|property| {
                target
                    .property(property)
                    .ok_or_else(|| RewindError::unknown_property(property))
            })
            .collect()
    }

    fn time_of(&self, handle: RecordHandle) -> Option<f64> {
        self.records.get(handle).map(|record| record.time)
    }

    fn lock_target(&self) -> Result<MutexGuard<'_, dyn PropertyTarget + Send + 'static>> {
        self.target
            .lock()
            .map_err(|_| RewindError::TargetPoisoned {
                label: self.label.clone(),
            })
    }
}

fn write_values<T: PropertyTarget + ?Sized>(
    target: &mut T,
    properties: &[String],
    values: impl Iterator<Item = f64>,
) -> Result<()> {
    for (property, value) in properties.iter().zip(values) {
        if !target.set_property(property, value) {
            return Err(RewindError::unknown_property(property));
        }
    }
    Ok(())
}

impl fmt::Debug for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Track")
            .field("label", &self.label)
            .field("properties", &self.properties)
            .field("records", &self.records.len())
            .field("cursor", &self.cursor_record().map(|record| record.time))
            .field("is_active", &self.is_active)
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    use super::*;

    type Dot = Arc<Mutex<HashMap<String, f64>>>;

    fn dot(x: f64) -> Dot {
        Arc::new(Mutex::new(HashMap::from([("x".to_string(), x)])))
    }

    fn track_on(target: &Dot, hooks: TrackHooks) -> Track {
        Track::new("dot", target.clone(), vec!["x".to_string()], hooks).unwrap()
    }

    fn capture_at(track: &mut Track, target: &Dot, time: f64, x: f64) {
        target.lock().unwrap().insert("x".to_string(), x);
        track.capture(time, 1.0).unwrap();
    }

    fn times(track: &Track) -> Vec<f64> {
        track.records().map(|record| record.time).collect()
    }

    fn x(target: &Dot) -> f64 {
        target.lock().unwrap()["x"]
    }

    /// Records at 0, 1, 2 holding 0, 10, 20.
    fn ramp(target: &Dot, hooks: TrackHooks) -> Track {
        let mut track = track_on(target, hooks);
        for step in 0..3 {
            capture_at(&mut track, target, step as f64, step as f64 * 10.0);
        }
        track
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = count.clone();
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn rejects_unknown_property() {
        let target = dot(0.0);
        let err = Track::new("dot", target, vec!["y".to_string()], TrackHooks::new()).unwrap_err();
        assert!(matches!(err, RewindError::UnknownProperty { ref property } if property == "y"));
    }

    #[test]
    fn captures_in_time_order() {
        let target = dot(0.0);
        let mut track = track_on(&target, TrackHooks::new());
        capture_at(&mut track, &target, 3.0, 30.0);
        capture_at(&mut track, &target, 1.0, 10.0);
        capture_at(&mut track, &target, 2.0, 20.0);

        assert_eq!(times(&track), vec![1.0, 2.0, 3.0]);
        assert_eq!(track.cursor_record().unwrap().values, vec![20.0]);
    }

    #[test]
    fn recapturing_backward_overwrites_in_place() {
        let target = dot(0.0);
        let mut track = track_on(&target, TrackHooks::new());
        for step in 0..5 {
            capture_at(&mut track, &target, step as f64, step as f64);
        }
        for step in (-1..5).rev() {
            target.lock().unwrap().insert("x".to_string(), step as f64 * 100.0);
            track.capture(step as f64, -1.0).unwrap();
            assert_eq!(track.cursor_record().unwrap().time, step as f64);
        }

        let recorded = times(&track);
        assert_eq!(recorded, vec![-1.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(recorded.windows(2).all(|pair| pair[0] < pair[1]));
        let values: Vec<f64> = track.records().map(|record| record.values[0]).collect();
        assert_eq!(values, vec![-100.0, 0.0, 100.0, 200.0, 300.0, 400.0]);

        assert_eq!(track.erase(0.5, 2.5), 2);
        assert_eq!(times(&track), vec![-1.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn same_instant_capture_is_idempotent() {
        let target = dot(4.0);
        let mut track = track_on(&target, TrackHooks::new());
        track.capture(1.0, 1.0).unwrap();
        track.capture(1.0, 0.0).unwrap();
        track.capture(1.0, 0.0).unwrap();

        assert_eq!(track.len(), 1);
    }

    #[test]
    fn erase_from_head_reanchors_cursor() {
        let target = dot(0.0);
        let mut track = track_on(&target, TrackHooks::new());
        for step in 0..5 {
            capture_at(&mut track, &target, step as f64, 0.0);
        }
        track.seek_to(1.0);

        assert_eq!(track.erase(2.0, 0.0), 3);
        assert_eq!(times(&track), vec![3.0, 4.0]);
        assert_eq!(track.cursor_record().unwrap().time, 3.0);
    }

    #[test]
    fn erase_from_tail_reanchors_cursor() {
        let target = dot(0.0);
        let mut track = track_on(&target, TrackHooks::new());
        for step in 0..5 {
            capture_at(&mut track, &target, step as f64, 0.0);
        }

        assert_eq!(track.erase(2.5, 10.0), 2);
        assert_eq!(times(&track), vec![0.0, 1.0, 2.0]);
        assert_eq!(track.cursor_record().unwrap().time, 2.0);
    }

    #[test]
    fn erasing_everything_clears_cursor() {
        let target = dot(0.0);
        let mut track = ramp(&target, TrackHooks::new());

        assert_eq!(track.erase(-1.0, 5.0), 3);
        assert!(track.is_empty());
        assert!(track.cursor_record().is_none());
        assert_eq!(track.erase(0.0, 1.0), 0);

        capture_at(&mut track, &target, 7.0, 70.0);
        assert_eq!(times(&track), vec![7.0]);
    }

    #[test]
    fn seek_lands_on_latest_record_at_or_before() {
        let target = dot(0.0);
        let mut track = ramp(&target, TrackHooks::new());

        track.seek_to(1.5);
        assert_eq!(track.cursor_record().unwrap().time, 1.0);
        track.seek_to(2.0);
        assert_eq!(track.cursor_record().unwrap().time, 2.0);
        track.seek_to(-3.0);
        assert_eq!(track.cursor_record().unwrap().time, 0.0);
        track.seek_to(9.0);
        assert_eq!(track.cursor_record().unwrap().time, 2.0);
    }

    #[test]
    fn discrete_play_snaps_to_previous_record() {
        let target = dot(0.0);
        let mut track = ramp(&target, TrackHooks::new());

        assert_eq!(track.play(1.5, 0.1, false).unwrap(), Presence::Entered);
        assert_eq!(x(&target), 10.0);
        track.play(1.0, -0.5, false).unwrap();
        assert_eq!(x(&target), 10.0);
    }

    #[test]
    fn smooth_play_interpolates_between_neighbours() {
        let target = dot(0.0);
        let mut track = ramp(&target, TrackHooks::new());

        track.play(1.5, 0.1, true).unwrap();
        assert!((x(&target) - 15.0).abs() < 1e-9);
        track.play(1.25, -0.25, true).unwrap();
        assert!((x(&target) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn smooth_play_on_single_record_copies_it() {
        let target = dot(0.0);
        let mut track = track_on(&target, TrackHooks::new());
        capture_at(&mut track, &target, 2.0, 42.0);
        target.lock().unwrap().insert("x".to_string(), 0.0);

        assert_eq!(track.play(2.0, 0.1, true).unwrap(), Presence::Entered);
        assert_eq!(x(&target), 42.0);
    }

    #[test]
    fn containment_hysteresis_fires_each_edge_once() {
        let target = dot(0.0);
        let (entered, on_enter) = counter();
        let (exited, on_exit) = counter();
        let mut track = track_on(&target, TrackHooks::new().on_enter(on_enter).on_exit(on_exit));
        for step in 1..4 {
            capture_at(&mut track, &target, step as f64, step as f64);
        }

        let presence = track.play(1.0, 0.1, false).unwrap();
        assert_eq!(presence, Presence::Entered);
        assert!(presence.is_inside());
        assert!(track.is_active());
        assert_eq!(track.play(1.0, 0.1, false).unwrap(), Presence::Exited);
        assert!(!track.is_active());
        assert_eq!(track.play(0.5, 0.1, false).unwrap(), Presence::Outside);

        assert_eq!(entered.load(Ordering::SeqCst), 1);
        assert_eq!(exited.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn paused_tick_keeps_previous_containment() {
        let target = dot(0.0);
        let mut track = ramp(&target, TrackHooks::new());

        assert_eq!(track.play(1.0, 0.0, false).unwrap(), Presence::Outside);
        assert_eq!(track.play(1.0, 0.1, false).unwrap(), Presence::Entered);
        assert_eq!(track.play(5.0, 0.0, false).unwrap(), Presence::Inside);
        assert_eq!(x(&target), 20.0);
    }

    #[test]
    fn exit_applies_boundary_values() {
        let target = dot(0.0);
        let mut track = ramp(&target, TrackHooks::new());
        track.play(1.0, 0.1, false).unwrap();

        assert_eq!(track.play(2.5, 1.5, false).unwrap(), Presence::Exited);
        assert_eq!(x(&target), 20.0);
    }

    proptest! {
        #[test]
        fn erase_removes_exactly_the_closed_interval(
            stamps in prop::collection::btree_set(0u32..200, 1..40),
            a in 0.0f64..200.0,
            b in 0.0f64..200.0,
        ) {
            let target = dot(0.0);
            let mut track = track_on(&target, TrackHooks::new());
            for stamp in &stamps {
                capture_at(&mut track, &target, *stamp as f64, *stamp as f64);
            }

            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let expected: Vec<f64> = stamps
                .iter()
                .map(|stamp| *stamp as f64)
                .filter(|time| *time < low || *time > high)
                .collect();

            let removed = track.erase(a, b);
            prop_assert_eq!(removed, stamps.len() - expected.len());
            prop_assert_eq!(times(&track), expected.clone());
            for record in track.records() {
                prop_assert_eq!(record.values[0], record.time);
            }
            prop_assert_eq!(track.cursor_record().is_none(), expected.is_empty());
        }
    }
}
