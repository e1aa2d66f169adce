// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! `eglstream connect`: run one end of a cross-process stream.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use eglstream::{
    CapabilityTable, DisplayContext, EglPlatform, PollOutcome, StatePoller, Stream, StreamConfig,
    StreamRole,
};

pub struct ConnectArgs {
    pub role: StreamRole,
    pub socket: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub watch: bool,
}

/// File, then environment. Flags are applied by the caller.
fn load_config(path: Option<&Path>) -> Result<StreamConfig> {
    let config = match path {
        Some(path) => StreamConfig::load(path)?,
        None => StreamConfig::load_or_default(Path::new(StreamConfig::FILE_NAME)),
    };
    config
        .apply_env_overrides()
        .context("Invalid EGLSTREAM_* environment override")
}

pub fn run(platform: Arc<dyn EglPlatform>, args: ConnectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let socket = args.socket.unwrap_or_else(|| config.socket_path.clone());
    let role = args.role;

    let display = DisplayContext::open(platform).context("Failed to open the EGL display")?;
    let caps = CapabilityTable::for_streams(display.platform())
        .context("EGL stream extensions unavailable")?;

    if role.is_listener() {
        println!("Waiting for a producer on {}", socket.display());
    }
    let stream = Stream::connect(&caps, &display, &socket, role, &config)
        .with_context(|| format!("Failed to connect {} stream via {}", role, socket.display()))?;

    let mut poller = StatePoller::from_config(&config);
    if let Some(secs) = args.timeout {
        poller = poller.with_deadline(Duration::from_secs(secs));
    }

    match poller.wait_ready(&stream, role) {
        PollOutcome::Reached(state) => {
            println!("{} ready: {} (stream {:?})", role, state, stream.raw_handle());
        }
        PollOutcome::Disconnected => bail!("Peer disconnected before the stream was ready"),
        PollOutcome::TimedOut(state) => bail!(
            "Stream not ready {}s after the peer connected (last state: {})",
            args.timeout.unwrap_or_default(),
            state
        ),
    }

    if args.watch {
        StatePoller::from_config(&config).watch(&stream, |state| match stream.frame_counters() {
            Ok(frames) => println!(
                "{} (producer frames {}, consumer frames {})",
                state, frames.producer, frames.consumer
            ),
            Err(_) => println!("{}", state),
        });
        println!("Peer disconnected");
    }

    stream.destroy();
    Ok(())
}
