//! Oscillators and buffer rendering
//!
//! `synthesize` renders one note as interleaved stereo i16 PCM. The
//! amplitude constant and sample format match what consumer audio
//! hardware expects from a simple software synth; the output sink
//! rescales to its native float range when mixing.

use std::f32::consts::TAU;
use std::fmt;

/// Fixed peak amplitude for every voice, in i16 sample units.
pub const AMPLITUDE: f32 = 4096.0;

/// Linear fade applied to each end of a buffer to suppress clicks.
const FADE_SECS: f32 = 0.01;

/// Waveform shape selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Instrument {
    #[default]
    Sine,
    Square,
    Sawtooth,
}

impl Instrument {
    /// Parse an instrument name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sine" => Some(Instrument::Sine),
            "square" => Some(Instrument::Square),
            "sawtooth" => Some(Instrument::Sawtooth),
            _ => None,
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instrument::Sine => "sine",
            Instrument::Square => "square",
            Instrument::Sawtooth => "sawtooth",
        };
        write!(f, "{}", name)
    }
}

/// Render one note as interleaved stereo i16 PCM.
///
/// The buffer holds `round(duration * sample_rate)` frames with identical
/// left/right samples. A 10 ms linear fade is applied to each end unless
/// the buffer is too short to fade both ends without overlap (< 20 ms),
/// in which case no fade is applied at all.
pub fn synthesize(
    frequency: f32,
    duration: f32,
    instrument: Instrument,
    sample_rate: u32,
) -> Vec<i16> {
    let frames = (duration * sample_rate as f32).round() as usize;
    let fade_frames = (FADE_SECS * sample_rate as f32) as usize;
    let fade = fade_frames > 0 && frames >= fade_frames * 2;

    let mut out = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        // Phase within the current period, 0.0..1.0
        let phase = (t * frequency).fract();
        let wave = match instrument {
            Instrument::Sine => (TAU * frequency * t).sin(),
            Instrument::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Instrument::Sawtooth => 2.0 * phase - 1.0,
        };

        let mut sample = AMPLITUDE * wave;
        if fade {
            if i < fade_frames {
                sample *= i as f32 / fade_frames as f32;
            } else if i >= frames - fade_frames {
                sample *= (frames - 1 - i) as f32 / fade_frames as f32;
            }
        }

        let sample = sample.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        out.push(sample);
        out.push(sample);
    }
    out
}
