//! Waveform synthesis for Chirp
//!
//! This crate is the DSP leaf of the workspace:
//! - Notes: note-name to frequency lookup (12-TET, A4 = 440 Hz)
//! - Waveform: periodic oscillators with click suppression
//!
//! Everything here is pure and deterministic; the same inputs always
//! produce bit-identical buffers.

mod notes;
mod waveform;

pub use notes::note_frequency;
pub use waveform::{synthesize, Instrument, AMPLITUDE};
