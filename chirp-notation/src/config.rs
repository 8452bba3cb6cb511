//! Startup configuration for Chirp
//!
//! A small key=value document read once at startup. Missing keys use
//! defaults, unknown keys are ignored, malformed values fall back per
//! key. The engine never reloads it; changing the tempo means a restart.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chirp_synth::Instrument;
use tracing::warn;

/// Engine configuration, immutable for the engine's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Tempo in beats per minute
    pub tempo: f32,
    /// Path of the live score file
    pub file: PathBuf,
    /// Default instrument for tokens that don't name one
    pub instrument: Instrument,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tempo: 120.0,
            file: PathBuf::from("live.mc"),
            instrument: Instrument::Sine,
        }
    }
}

impl Config {
    /// Load config from a path, using defaults if the file is unreadable.
    pub fn load(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                match key {
                    "tempo" => match value.parse::<f32>() {
                        Ok(tempo) if tempo > 0.0 => config.tempo = tempo,
                        _ => warn!(value, "bad tempo, keeping {}", config.tempo),
                    },
                    "file" => {
                        if !value.is_empty() {
                            config.file = PathBuf::from(value);
                        }
                    }
                    "instrument" => match Instrument::from_name(value) {
                        Some(instrument) => config.instrument = instrument,
                        None => warn!(value, "unknown instrument, keeping {}", config.instrument),
                    },
                    _ => {} // Ignore unknown keys
                }
            }
        }

        config
    }

    /// Duration of one beat in seconds (60 / tempo).
    pub fn beat_secs(&self) -> f32 {
        60.0 / self.tempo
    }
}
