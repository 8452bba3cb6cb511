//! Note-name to frequency lookup
//!
//! Twelve-tone equal temperament anchored at A4 = 440 Hz. Names follow
//! scientific pitch notation: a letter A-G, an optional sharp, and an
//! octave digit ("C4", "F#3", "a#5"). Lookup is case-insensitive.

/// Semitone offset of each natural note within an octave, relative to C.
fn letter_semitone(letter: char) -> Option<i32> {
    match letter {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Look up the frequency in Hz for a note name.
///
/// Returns `None` for anything that is not `letter ['#'] octave`, where
/// the octave is a single digit 0-8. The table therefore spans well past
/// the three octaves the notation needs in practice.
pub fn note_frequency(name: &str) -> Option<f32> {
    let mut chars = name.chars();

    let letter = chars.next()?.to_ascii_uppercase();
    let semitone = letter_semitone(letter)?;

    let mut next = chars.next()?;
    let mut semitone = semitone;
    if next == '#' {
        semitone += 1;
        next = chars.next()?;
    }

    let octave = next.to_digit(10)? as i32;
    if octave > 8 || chars.next().is_some() {
        return None;
    }

    // MIDI numbering: C-1 = 0, A4 = 69.
    let midi = (octave + 1) * 12 + semitone;
    Some(440.0 * 2f32.powf((midi - 69) as f32 / 12.0))
}
