//! Chirp - live-coding music player
//!
//! Runs the playback engine on its own thread and drives it from stdin:
//! type `play`, `pause`, or `stop` while editing the score file in any
//! editor. The engine picks up saved edits on its next pass over the
//! file.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chirp_engine::{channels, CpalSink, EngineCommand, EngineEvent, Scheduler};
use chirp_notation::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("chirp.conf"));
    let config = Config::load(&config_path);

    let (cmd_tx, cmd_rx, evt_tx, evt_rx) = channels();

    // cpal streams aren't Send, so the sink is built on the engine thread
    let engine_handle = thread::spawn(move || match CpalSink::new() {
        Ok(sink) => Scheduler::new(config, cmd_rx, evt_tx, sink).run(),
        Err(e) => error!(error = %e, "audio output unavailable"),
    });

    // Status printer: the original UI polled this to show "Playing Line: N"
    thread::spawn(move || {
        for event in evt_rx {
            let EngineEvent::Line { index } = event;
            info!(line = index, "playing");
        }
    });

    info!("commands: play | pause | stop");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<EngineCommand>() {
            Ok(cmd) => {
                let stop = cmd == EngineCommand::Stop;
                let _ = cmd_tx.send(cmd);
                if stop {
                    break;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }

    // EOF without an explicit stop still shuts the engine down
    let _ = cmd_tx.send(EngineCommand::Stop);
    drop(cmd_tx);

    engine_handle
        .join()
        .map_err(|_| anyhow::anyhow!("engine thread panicked"))?;
    Ok(())
}
