//! Audio output sink
//!
//! `AudioSink` is the engine's one-way door to the audio hardware:
//! `play` drops a finished stereo buffer in and returns immediately.
//! `CpalSink` keeps the in-flight buffers as voices and mixes them in
//! the cpal output callback, so overlapping triggers (chords, long
//! multipliers) sound together without the engine managing mixing.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{trace, warn};

/// i16 -> f32 rescale factor for the float output stream
const I16_SCALE: f32 = i16::MAX as f32;

/// Errors while bringing up the audio output.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no audio output device found")]
    NoDevice,
    #[error("failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Fire-and-forget audio output.
///
/// Buffers are interleaved stereo i16 at the sink's sample rate. `play`
/// must not block the caller on audio completion.
pub trait AudioSink {
    fn sample_rate(&self) -> u32;
    fn play(&self, frames: Vec<i16>);
}

/// One sounding buffer inside the output callback.
struct Voice {
    frames: Vec<i16>,
    pos: usize,
}

/// cpal-backed sink mixing all in-flight voices.
///
/// The output callback uses `try_lock` on the voice list; on contention
/// (a trigger landing at the same instant) it emits silence for that
/// callback rather than blocking the real-time audio thread.
pub struct CpalSink {
    sample_rate: u32,
    voices: Arc<Mutex<Vec<Voice>>>,
    // Keeps the stream alive; dropping it stops audio.
    _stream: cpal::Stream,
}

impl CpalSink {
    /// Open the default output device and start a float stream.
    pub fn new() -> Result<Self, SinkError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(SinkError::NoDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        let voices: Arc<Mutex<Vec<Voice>>> = Arc::new(Mutex::new(Vec::new()));
        let voices_cb = voices.clone();

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                data.fill(0.0);
                let Some(mut voices) = voices_cb.try_lock() else {
                    // Contention is rare; a silent callback beats a glitchy
                    // blocked audio thread.
                    return;
                };

                for frame in data.chunks_mut(channels) {
                    let mut left = 0.0f32;
                    let mut right = 0.0f32;
                    for voice in voices.iter_mut() {
                        if voice.pos + 1 < voice.frames.len() {
                            left += voice.frames[voice.pos] as f32 / I16_SCALE;
                            right += voice.frames[voice.pos + 1] as f32 / I16_SCALE;
                            voice.pos += 2;
                        }
                    }

                    if channels == 1 {
                        frame[0] = ((left + right) * 0.5).clamp(-1.0, 1.0);
                    } else {
                        frame[0] = left.clamp(-1.0, 1.0);
                        frame[1] = right.clamp(-1.0, 1.0);
                        // Surround layouts get silence on the extra channels
                    }
                }

                voices.retain(|v| v.pos + 1 < v.frames.len());
            },
            |err| {
                warn!(error = %err, "audio stream error");
            },
            None,
        )?;

        stream.play()?;

        Ok(Self {
            sample_rate,
            voices,
            _stream: stream,
        })
    }
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&self, frames: Vec<i16>) {
        trace!(frames = frames.len() / 2, "voice triggered");
        self.voices.lock().push(Voice { frames, pos: 0 });
    }
}
