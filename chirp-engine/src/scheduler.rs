//! Beat scheduler - the engine's control loop
//!
//! One score line is one beat. Each pass re-reads the whole file, so
//! edits saved during playback become audible on the next pass with no
//! watcher infrastructure. The loop paces itself by sleeping out the
//! remainder of each beat; if triggering overruns the beat, the next
//! beat simply starts late (drift is accepted, not corrected).

use std::fmt;
use std::fs;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

use chirp_notation::{parse_line, Config};
use chirp_synth::synthesize;

use crate::sink::AudioSink;

/// Backoff before retrying an unreadable score file.
const FILE_RETRY: Duration = Duration::from_secs(5);

/// Inbound control command. Wire form is the literal lowercase word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    Play,
    Pause,
    Stop,
}

#[derive(Debug, Error)]
#[error("unknown command: {0:?}")]
pub struct UnknownCommand(String);

impl FromStr for EngineCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" => Ok(EngineCommand::Play),
            "pause" => Ok(EngineCommand::Pause),
            "stop" => Ok(EngineCommand::Stop),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            EngineCommand::Play => "play",
            EngineCommand::Pause => "pause",
            EngineCommand::Stop => "stop",
        };
        write!(f, "{}", word)
    }
}

/// Outbound status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Published once per line played (or rested)
    Line { index: usize },
}

/// Playback state, owned exclusively by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Stopped,
    #[default]
    Playing,
    Paused,
}

/// Create the control-channel pair: commands in, status out.
///
/// Both are unbounded FIFO queues; a slow controller accumulates status
/// messages rather than stalling the beat clock.
pub fn channels() -> (
    Sender<EngineCommand>,
    Receiver<EngineCommand>,
    Sender<EngineEvent>,
    Receiver<EngineEvent>,
) {
    let (cmd_tx, cmd_rx) = unbounded();
    let (evt_tx, evt_rx) = unbounded();
    (cmd_tx, cmd_rx, evt_tx, evt_rx)
}

/// The beat-scheduling loop. Owns tempo, playback state, and the
/// current line index; all mutation arrives through the command channel
/// at defined checkpoints.
pub struct Scheduler<S: AudioSink> {
    config: Config,
    beat: Duration,
    state: PlaybackState,
    line_index: usize,
    commands: Receiver<EngineCommand>,
    status: Sender<EngineEvent>,
    sink: S,
}

impl<S: AudioSink> Scheduler<S> {
    pub fn new(
        config: Config,
        commands: Receiver<EngineCommand>,
        status: Sender<EngineEvent>,
        sink: S,
    ) -> Self {
        let beat = Duration::from_secs_f32(config.beat_secs());
        Self {
            config,
            beat,
            state: PlaybackState::default(),
            line_index: 0,
            commands,
            status,
            sink,
        }
    }

    /// Run until a `stop` command arrives (or the controller goes away).
    pub fn run(&mut self) {
        info!(
            tempo = self.config.tempo,
            file = %self.config.file.display(),
            instrument = %self.config.instrument,
            "engine started"
        );
        while self.state != PlaybackState::Stopped {
            self.play_pass();
        }
        info!("engine stopped");
    }

    /// One pass over the score file: read it whole, play every line.
    fn play_pass(&mut self) {
        let source = match fs::read_to_string(&self.config.file) {
            Ok(source) => source,
            Err(e) => {
                warn!(
                    file = %self.config.file.display(),
                    error = %e,
                    "score unreadable, retrying in {}s",
                    FILE_RETRY.as_secs()
                );
                self.wait(FILE_RETRY);
                return;
            }
        };
        let lines: Vec<&str> = source.lines().collect();

        if lines.is_empty() {
            // An empty score is one beat of silence per pass; without the
            // wait this would spin on re-reads and starve the stop check.
            self.checkpoint();
            if self.state != PlaybackState::Stopped {
                self.wait(self.beat);
            }
            return;
        }

        while self.line_index < lines.len() {
            self.checkpoint();
            if self.state == PlaybackState::Stopped {
                return;
            }

            let start = Instant::now();
            self.play_line(lines[self.line_index]);
            let _ = self.status.send(EngineEvent::Line {
                index: self.line_index,
            });
            self.line_index += 1;

            let elapsed = start.elapsed();
            if elapsed < self.beat {
                thread::sleep(self.beat - elapsed);
            }
        }

        // A completed pass restarts at the top; the index only carries
        // across read-failure retries mid-pass.
        self.line_index = 0;
    }

    /// Trigger every note of one line, fire-and-forget.
    fn play_line(&mut self, line: &str) {
        let events = parse_line(line, self.config.instrument);
        for event in &events {
            let duration = self.beat.as_secs_f32() * event.multiplier;
            let buffer = synthesize(
                event.frequency,
                duration,
                event.instrument,
                self.sink.sample_rate(),
            );
            self.sink.play(buffer);
        }
        debug!(index = self.line_index, notes = events.len(), "beat");
    }

    /// Per-line command checkpoint: drain pending commands, then block
    /// while paused. Stop wins from any state.
    fn checkpoint(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.apply(cmd);
        }
        while self.state == PlaybackState::Paused {
            match self.commands.recv() {
                Ok(cmd) => self.apply(cmd),
                // Controller gone: nobody can ever resume us
                Err(_) => self.state = PlaybackState::Stopped,
            }
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        // Stopped is terminal; late commands can't resurrect the loop
        if self.state == PlaybackState::Stopped {
            return;
        }
        let next = match cmd {
            EngineCommand::Play => PlaybackState::Playing,
            EngineCommand::Pause => PlaybackState::Paused,
            EngineCommand::Stop => PlaybackState::Stopped,
        };
        if next != self.state {
            debug!(command = %cmd, from = ?self.state, to = ?next, "state change");
            self.state = next;
        }
    }

    /// Sleep that stays responsive to commands: a stop arriving during
    /// the file backoff (or an empty-score beat) still terminates.
    fn wait(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || self.state == PlaybackState::Stopped {
                return;
            }
            match self.commands.recv_timeout(remaining) {
                Ok(cmd) => self.apply(cmd),
                Err(RecvTimeoutError::Timeout) => return,
                Err(RecvTimeoutError::Disconnected) => {
                    self.state = PlaybackState::Stopped;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_synth::Instrument;
    use parking_lot::Mutex;
    use std::path::PathBuf;
    use std::sync::Arc;

    const SR: u32 = 8000;

    #[derive(Clone)]
    struct TestSink {
        triggers: Arc<Mutex<Vec<Vec<i16>>>>,
    }

    impl TestSink {
        fn new() -> Self {
            Self {
                triggers: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl AudioSink for TestSink {
        fn sample_rate(&self) -> u32 {
            SR
        }

        fn play(&self, frames: Vec<i16>) {
            self.triggers.lock().push(frames);
        }
    }

    struct Engine {
        // Holds the score directory alive for the test's duration
        dir: tempfile::TempDir,
        cmd_tx: Sender<EngineCommand>,
        evt_rx: Receiver<EngineEvent>,
        triggers: Arc<Mutex<Vec<Vec<i16>>>>,
        handle: thread::JoinHandle<()>,
    }

    impl Engine {
        fn score_path(&self) -> PathBuf {
            self.dir.path().join("live.mc")
        }

        fn stop(self) {
            let _ = self.cmd_tx.send(EngineCommand::Stop);
            self.handle.join().unwrap();
        }
    }

    fn start_engine(score: &str, tempo: f32) -> Engine {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.mc");
        fs::write(&path, score).unwrap();

        let config = Config {
            tempo,
            file: path,
            instrument: Instrument::Sine,
        };
        let (cmd_tx, cmd_rx, evt_tx, evt_rx) = channels();
        let sink = TestSink::new();
        let triggers = sink.triggers.clone();
        let handle = thread::spawn(move || Scheduler::new(config, cmd_rx, evt_tx, sink).run());

        Engine {
            dir,
            cmd_tx,
            evt_rx,
            triggers,
            handle,
        }
    }

    fn recv_line(engine: &Engine) -> usize {
        match engine.evt_rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            EngineEvent::Line { index } => index,
        }
    }

    /// Estimate the frequency of a stereo sine buffer by counting
    /// zero crossings on the left channel.
    fn estimate_frequency(frames: &[i16], sample_rate: u32) -> f32 {
        let left: Vec<i16> = frames.iter().step_by(2).copied().collect();
        let crossings = left
            .windows(2)
            .filter(|w| (w[0] >= 0) != (w[1] >= 0))
            .count();
        let duration = left.len() as f32 / sample_rate as f32;
        crossings as f32 / 2.0 / duration
    }

    #[test]
    fn test_command_wire_format() {
        assert_eq!("play".parse::<EngineCommand>().unwrap(), EngineCommand::Play);
        assert_eq!("pause".parse::<EngineCommand>().unwrap(), EngineCommand::Pause);
        assert_eq!("stop".parse::<EngineCommand>().unwrap(), EngineCommand::Stop);
        assert_eq!(" Stop ".parse::<EngineCommand>().unwrap(), EngineCommand::Stop);
        assert!("rewind".parse::<EngineCommand>().is_err());

        assert_eq!(EngineCommand::Play.to_string(), "play");
        assert_eq!(EngineCommand::Pause.to_string(), "pause");
        assert_eq!(EngineCommand::Stop.to_string(), "stop");
    }

    #[test]
    fn test_lines_play_in_order_and_loop() {
        // beat = 50ms
        let engine = start_engine("C4\nE4\n", 1200.0);
        let indices: Vec<usize> = (0..5).map(|_| recv_line(&engine)).collect();
        // Passes restart at line 0 after the last line
        assert_eq!(indices, [0, 1, 0, 1, 0]);
        engine.stop();
    }

    #[test]
    fn test_beat_cadence() {
        // beat = 200ms; rest lines so triggering cost is nil
        let engine = start_engine("\n\n\n\n\n\n", 300.0);
        recv_line(&engine);
        let t0 = Instant::now();
        recv_line(&engine);
        let gap = t0.elapsed();
        assert!(gap >= Duration::from_millis(180), "gap {:?} too short", gap);
        assert!(gap <= Duration::from_millis(600), "gap {:?} too long", gap);
        engine.stop();
    }

    #[test]
    fn test_pause_halts_and_play_resumes() {
        // beat = 50ms, plenty of rest lines
        let engine = start_engine(&"\n".repeat(100), 1200.0);
        recv_line(&engine);

        engine.cmd_tx.send(EngineCommand::Pause).unwrap();
        // Let the line in flight (and at most the next checkpoint) settle
        thread::sleep(Duration::from_millis(200));
        while engine.evt_rx.try_recv().is_ok() {}

        // No status while paused
        thread::sleep(Duration::from_millis(250));
        assert!(engine.evt_rx.try_recv().is_err());

        // Resumes on play
        engine.cmd_tx.send(EngineCommand::Play).unwrap();
        recv_line(&engine);
        engine.stop();
    }

    #[test]
    fn test_stop_terminates_loop() {
        let engine = start_engine(&"\n".repeat(100), 1200.0);
        recv_line(&engine);
        engine.cmd_tx.send(EngineCommand::Stop).unwrap();
        engine.handle.join().unwrap();
        // Status sender is dropped with the scheduler; once the leftovers
        // are drained the channel reports disconnection
        while engine.evt_rx.try_recv().is_ok() {}
        assert!(engine.evt_rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_while_paused() {
        let engine = start_engine(&"\n".repeat(100), 1200.0);
        recv_line(&engine);
        engine.cmd_tx.send(EngineCommand::Pause).unwrap();
        thread::sleep(Duration::from_millis(150));
        engine.cmd_tx.send(EngineCommand::Stop).unwrap();
        engine.handle.join().unwrap();
    }

    #[test]
    fn test_stop_during_file_backoff() {
        let config = Config {
            tempo: 120.0,
            file: PathBuf::from("/nonexistent/score.mc"),
            instrument: Instrument::Sine,
        };
        let (cmd_tx, cmd_rx, evt_tx, _evt_rx) = channels();
        let handle = thread::spawn(move || {
            Scheduler::new(config, cmd_rx, evt_tx, TestSink::new()).run()
        });

        thread::sleep(Duration::from_millis(100));
        let start = Instant::now();
        cmd_tx.send(EngineCommand::Stop).unwrap();
        handle.join().unwrap();
        // Well under the 5s backoff: the wait is command-responsive
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_end_to_end_two_lines() {
        // beat = 200ms: C4 for one beat, then E4 for two
        let engine = start_engine("C4\nE4*2", 300.0);
        assert_eq!(recv_line(&engine), 0);
        assert_eq!(recv_line(&engine), 1);
        let triggers = engine.triggers.clone();
        engine.stop();

        let triggers = triggers.lock();
        assert!(triggers.len() >= 2);

        let beat_frames = (0.2 * SR as f32).round() as usize;
        assert_eq!(triggers[0].len(), beat_frames * 2);
        assert_eq!(triggers[1].len(), beat_frames * 4);

        let f0 = estimate_frequency(&triggers[0], SR);
        let f1 = estimate_frequency(&triggers[1], SR);
        assert!((f0 - 261.63).abs() < 10.0, "C4 estimate {}", f0);
        assert!((f1 - 329.63).abs() < 10.0, "E4 estimate {}", f1);
    }

    #[test]
    fn test_live_edit_visible_next_pass() {
        // beat = 50ms, single line loops quickly
        let engine = start_engine("C4\n", 1200.0);
        recv_line(&engine);

        fs::write(engine.score_path(), "C4\nE4\n").unwrap();

        // The appended line shows up on a later pass
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut saw_second_line = false;
        while Instant::now() < deadline {
            if recv_line(&engine) == 1 {
                saw_second_line = true;
                break;
            }
        }
        assert!(saw_second_line);
        engine.stop();
    }

    #[test]
    fn test_bad_tokens_do_not_stall_the_beat() {
        // A line full of garbage still occupies exactly one beat
        let engine = start_engine("Zx9 C4*bogus*kazoo\nE4\n", 1200.0);
        assert_eq!(recv_line(&engine), 0);
        assert_eq!(recv_line(&engine), 1);
        let triggers = engine.triggers.clone();
        engine.stop();

        // Zx9 was dropped, C4 still triggered despite its bad fields
        let triggers = triggers.lock();
        let f = estimate_frequency(&triggers[0], SR);
        assert!((f - 261.63).abs() < 10.0, "C4 estimate {}", f);
    }
}
