// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Initiating peer for the cross-process tests.
//!
//! ```text
//! handshake_peer handshake <socket>            # rendezvous only
//! handshake_peer stream <socket> [hold-ms]     # stub-backed producer stream
//! ```
//!
//! Reports on stdout, one line per milestone, so the parent test can assert
//! on what this process observed.

#![allow(clippy::disallowed_macros)]

use std::sync::Arc;
use std::time::Duration;

use eglstream::{
    CapabilityTable, ConnectRetry, DisplayContext, EglStreamError, EndpointChannel,
    PollOutcome, StatePoller, Stream, StreamConfig, StreamRole, StubPlatform,
};

const RETRY: ConnectRetry = ConnectRetry {
    attempts: 500,
    interval: Duration::from_millis(10),
};

fn main() -> eglstream::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (mode, socket) = match args.as_slice() {
        [mode, socket, ..] => (mode.as_str(), socket.clone()),
        _ => {
            return Err(EglStreamError::Configuration(
                "usage: handshake_peer <handshake|stream> <socket> [hold-ms]".into(),
            ));
        }
    };

    match mode {
        "handshake" => {
            let channel = EndpointChannel::connect_with_retry(&socket, RETRY)?;
            println!("connected {:?}", channel.role());
            Ok(())
        }
        "stream" => {
            let hold_ms: u64 = match args.get(2) {
                Some(v) => v.parse().map_err(|e| {
                    EglStreamError::Configuration(format!("hold-ms '{}': {}", v, e))
                })?,
                None => 0,
            };
            run_producer(&socket, Duration::from_millis(hold_ms))
        }
        other => Err(EglStreamError::Configuration(format!(
            "unknown mode '{}'",
            other
        ))),
    }
}

fn run_producer(socket: &str, hold: Duration) -> eglstream::Result<()> {
    let config = StreamConfig {
        connect_attempts: RETRY.attempts,
        connect_retry_interval_ms: RETRY.interval.as_millis() as u64,
        poll_interval_ms: 5,
        ..StreamConfig::default()
    };

    let stub = Arc::new(StubPlatform::new());
    let display = DisplayContext::open(stub.clone())?;
    let caps = CapabilityTable::for_streams(display.platform())?;
    let stream = Stream::connect(&caps, &display, socket, StreamRole::Producer, &config)?;
    println!("created");

    let outcome = StatePoller::from_config(&config)
        .with_deadline(Duration::from_secs(10))
        .wait_ready(&stream, StreamRole::Producer);
    match outcome {
        PollOutcome::Reached(state) => println!("ready {}", state),
        PollOutcome::Disconnected => println!("disconnected"),
        PollOutcome::TimedOut(state) => println!("timeout {}", state),
    }

    std::thread::sleep(hold);
    stream.destroy();
    println!("destroyed");
    Ok(())
}
