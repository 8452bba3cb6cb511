//! Playback engine for Chirp
//!
//! The engine owns the beat clock: it re-reads the live score every
//! pass, parses one line per beat, synthesizes the notes, and hands the
//! buffers to an audio sink without waiting for them to finish sounding.
//! A controller talks to it over two unbounded channels: commands in
//! (play/pause/stop), line-index status out.

mod scheduler;
mod sink;

pub use scheduler::{channels, EngineCommand, EngineEvent, PlaybackState, Scheduler};
pub use sink::{AudioSink, CpalSink, SinkError};
