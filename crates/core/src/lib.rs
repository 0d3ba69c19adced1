//! Core library for the Rewind recording engine.
//!
//! Rewind captures numeric properties of arbitrary objects over time and
//! replays them later, either snapping to the recorded samples or
//! interpolating between them. A [`Recorder`] owns one [`Track`] per labelled
//! object and drives every track once per tick; each track keeps its history
//! in a time-ordered [`RecordList`] and walks it with a cursor so that
//! sequential ticks stay cheap.

pub mod config;
pub mod error;
pub mod record;
pub mod session;
pub mod timeline;
pub mod track;

pub use config::RecorderConfig;
pub use error::{Result, RewindError};
pub use record::{Record, RecordHandle, RecordList};
pub use session::{Mode, Recorder};
pub use timeline::{PlaybackClock, Playable};
pub use track::{Callback, Presence, PropertyTarget, SharedTarget, Track, TrackHooks};
