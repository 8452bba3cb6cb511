//! Score line parser
//!
//! One line of the score describes one beat. Whitespace-separated tokens
//! are simultaneous notes (a chord slot); each token is
//! `NOTE[*MULTIPLIER[*INSTRUMENT]]` with `*` as the field separator.
//! An empty line is a rest.

use chirp_synth::{note_frequency, Instrument};
use tracing::warn;

/// One note to trigger within a beat.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Note name as written in the score (e.g. "C4", "f#3")
    pub name: String,
    /// Resolved frequency in Hz
    pub frequency: f32,
    /// Beat-duration multiplier (> 0, default 1.0)
    pub multiplier: f32,
    /// Waveform for this token
    pub instrument: Instrument,
}

/// Parse one score line into its note events.
///
/// Recovery is per-token: an unknown note name drops that token, a
/// malformed or non-positive multiplier falls back to 1.0, an unknown
/// instrument name falls back to sine. All are warned, none abort the
/// line. An empty or whitespace-only line yields no events (a rest).
pub fn parse_line(raw: &str, default_instrument: Instrument) -> Vec<NoteEvent> {
    raw.split_whitespace()
        .filter_map(|token| parse_token(token, default_instrument))
        .collect()
}

fn parse_token(token: &str, default_instrument: Instrument) -> Option<NoteEvent> {
    let mut fields = token.split('*');

    // split always yields at least one field
    let name = fields.next().unwrap_or_default();
    let frequency = match note_frequency(name) {
        Some(f) => f,
        None => {
            warn!(token, "unknown note name, skipping");
            return None;
        }
    };

    let multiplier = match fields.next() {
        Some(field) => match field.parse::<f32>() {
            Ok(m) if m > 0.0 => m,
            _ => {
                warn!(token, field, "bad duration multiplier, using 1.0");
                1.0
            }
        },
        None => 1.0,
    };

    let instrument = match fields.next() {
        Some(field) => Instrument::from_name(field).unwrap_or_else(|| {
            warn!(token, field, "unknown instrument, using sine");
            Instrument::Sine
        }),
        None => default_instrument,
    };

    if fields.next().is_some() {
        warn!(token, "extra fields ignored");
    }

    Some(NoteEvent {
        name: name.to_string(),
        frequency,
        multiplier,
        instrument,
    })
}
