// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! eglstream CLI
//!
//! Inspect the local EGL stream support and run one end of a cross-process
//! stream from the shell.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use eglstream::{EglPlatform, LibEgl, StreamRole, StubPlatform};

mod commands;

#[derive(Parser)]
#[command(name = "eglstream")]
#[command(author, version, about = "Cross-process EGL stream rendezvous", long_about = None)]
struct Cli {
    /// Use the in-process stub platform instead of libEGL
    #[arg(long, global = true)]
    stub: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the display, log diagnostics and report stream entry points
    Probe,

    /// Rendezvous with a peer and create one end of the stream
    Connect {
        /// Which end of the stream this process is
        #[arg(long, value_enum)]
        role: RoleArg,

        /// Rendezvous socket path (default: from config, then /tmp/egl-stream.sock)
        #[arg(long, value_name = "PATH")]
        socket: Option<PathBuf>,

        /// Stream configuration file (default: ./eglstream.toml if present)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Give up if the stream is not ready this many seconds after the peer
        /// connected (waiting for the peer to connect is not bounded)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Keep polling and print state changes until the peer disconnects
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Producer,
    Consumer,
}

impl From<RoleArg> for StreamRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Producer => StreamRole::Producer,
            RoleArg::Consumer => StreamRole::Consumer,
        }
    }
}

fn open_platform(stub: bool) -> Result<Arc<dyn EglPlatform>> {
    if stub {
        tracing::info!("Using the stub EGL platform");
        return Ok(Arc::new(StubPlatform::new()));
    }
    let lib = LibEgl::load().context("Failed to load the EGL client library")?;
    tracing::info!("Loaded {}", lib.library_name());
    Ok(Arc::new(lib))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let platform = open_platform(cli.stub)?;

    match cli.command {
        Commands::Probe => commands::probe::run(platform),
        Commands::Connect {
            role,
            socket,
            config,
            timeout,
            watch,
        } => commands::connect::run(
            platform,
            commands::connect::ConnectArgs {
                role: role.into(),
                socket,
                config,
                timeout,
                watch,
            },
        ),
    }
}
